//! Profile codec behavior on synthetic profiles

use cmm_tests::profiles::{self, reopen, with_tag_size};
use cmm_tests::registry_with;
use oxcmm_core::icc::{ColorSpace, TagSignature, TextData, read_directory};
use oxcmm_core::tag::TagStatus;
use oxcmm_core::{NameKind, Tag};

#[test]
fn test_rewrite_reproduces_header_and_directory() -> anyhow::Result<()> {
    let original = profiles::srgb().to_memory();
    let reopened = reopen(&original)?;

    // replacing a tag with itself forces a fresh serialization
    let desc = reopened.tag_by_signature(TagSignature::DESC).expect("desc present");
    reopened.add_tag(desc, None);
    let rewritten = reopened.to_memory();

    assert_eq!(&rewritten[..128], &original[..128]);
    assert_eq!(read_directory(&rewritten)?, read_directory(&original)?);
    assert_eq!(rewritten, original);
    Ok(())
}

#[test]
fn test_hash_follows_bytes() -> anyhow::Result<()> {
    let profile = reopen(&profiles::srgb().to_memory())?;
    let first = profile.hash();
    assert_eq!(profile.hash(), first);

    let desc = profile.tag_by_signature(TagSignature::DESC).expect("desc present");
    profile.add_tag(Tag::new(TagSignature::DESC, TextData::new("renamed").encode_mluc()), None);
    let renamed = profile.hash();
    assert_ne!(renamed, first);

    profile.add_tag(desc, None);
    assert_eq!(profile.hash(), first);
    Ok(())
}

#[test]
fn test_corrupted_entry_keeps_other_tags() -> anyhow::Result<()> {
    let source = profiles::srgb();
    let bytes = source.to_memory();
    let directory = read_directory(&bytes)?;
    let index = directory
        .iter()
        .position(|e| e.signature == TagSignature::MEDIA_WHITE)
        .expect("wtpt in directory");

    let broken = with_tag_size(&source, index, 0x00FF_FFFF);
    let profile = reopen(&broken)?;
    assert_eq!(profile.color_space()?, ColorSpace::Rgb);
    assert!(profile.tag_count() > 0);

    let white = profile.tag_by_signature(TagSignature::MEDIA_WHITE).expect("tag kept");
    assert_eq!(white.status(), TagStatus::Corrupted);
    let desc = profile.tag_by_signature(TagSignature::DESC).expect("desc kept");
    assert_eq!(desc.status(), TagStatus::Ok);
    assert_eq!(profile.text(NameKind::Name), "sRGB synthetic");

    let registry = registry_with([]);
    assert_eq!(desc.value(&registry)?.as_text(), Some("sRGB synthetic"));
    assert!(white.value(&registry).is_err());
    Ok(())
}

#[test]
fn test_gray_profile() -> anyhow::Result<()> {
    let gray = reopen(&profiles::gray(2.2).to_memory())?;
    assert_eq!(gray.color_space()?, ColorSpace::Gray);
    assert_eq!(gray.channel_count(), 1);
    assert!(gray.tag_by_signature(TagSignature::GRAY_TRC).is_some());
    Ok(())
}
