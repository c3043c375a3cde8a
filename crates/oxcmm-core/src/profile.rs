//! ICC color profiles
//!
//! A [`Profile`] wraps the raw bytes it was opened from. The tag directory
//! is indexed on open, but payloads are copied out only when a tag is
//! first accessed. Any mutation drops the raw buffer; [`Profile::to_memory`]
//! writes a fresh one and the content hash follows the new bytes.
//!
//! Profiles opened from memory are shared through the profile-by-hash
//! cache, profiles opened from disk through the profile-by-file cache. A
//! shared profile that gets mutated leaves its cache, so the key keeps
//! describing the bytes it was computed from.

use std::fmt;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::cache::{self, CacheKey};
use crate::config;
use crate::error::{Error, Result};
use crate::hash::{self, ContentHash};
use crate::icc::{
    ColorSpace, IccHeader, MIN_PROFILE_SIZE, ProfileClass, SignatureField, TagEntry, TagSignature,
    TagValue, TextData, XyzNumber, XyzTagData, read_directory, write_profile,
};
use crate::message::report;
use crate::object::{DeepCopy, NameKind, Object, ObjectKind, Struct};
use crate::tag::{Tag, TagStatus};

/// Open flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct ProfileFlags(u32);

impl ProfileFlags {
    pub const NONE: Self = Self(0);
    /// Bypass the profile caches
    pub const NO_CACHE: Self = Self(1);

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ProfileFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Well-known default profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileDefault {
    EditingXyz,
    EditingLab,
    EditingRgb,
    EditingCmyk,
    EditingGray,
    AssumedXyz,
    AssumedLab,
    AssumedRgb,
    AssumedWeb,
    AssumedCmyk,
    AssumedGray,
}

impl ProfileDefault {
    pub fn color_space(self) -> ColorSpace {
        match self {
            Self::EditingXyz | Self::AssumedXyz => ColorSpace::Xyz,
            Self::EditingLab | Self::AssumedLab => ColorSpace::Lab,
            Self::EditingRgb | Self::AssumedRgb | Self::AssumedWeb => ColorSpace::Rgb,
            Self::EditingCmyk | Self::AssumedCmyk => ColorSpace::Cmyk,
            Self::EditingGray | Self::AssumedGray => ColorSpace::Gray,
        }
    }
}

/// Cache a profile was shared through
#[derive(Debug, Clone, Copy)]
enum CachedAs {
    Hash(CacheKey),
    File(CacheKey),
}

#[derive(Debug, Clone)]
struct ProfileState {
    header: IccHeader,
    raw: Option<Arc<[u8]>>,
    directory: Vec<TagEntry>,
    /// Tags copied out of `raw`, in directory order
    tags: Vec<Tag>,
    tags_loaded: bool,
    hash: ContentHash,
    file_name: Option<PathBuf>,
    default: Option<ProfileDefault>,
    cached_as: Option<CachedAs>,
}

/// ICC profile handle
pub struct Profile {
    object: Object,
    state: Mutex<ProfileState>,
}

impl Struct for Profile {
    fn object(&self) -> &Object {
        &self.object
    }
}

impl Profile {
    fn with_state(state: ProfileState) -> Self {
        Self {
            object: Object::new(ObjectKind::Profile),
            state: Mutex::new(state),
        }
    }

    /// Parse and index a profile buffer without copying tag payloads
    fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < MIN_PROFILE_SIZE {
            return Err(Error::InvalidProfile(format!(
                "{} bytes is below the minimum profile size",
                data.len()
            )));
        }
        let header = IccHeader::parse(data)?;
        header.validate(data.len())?;
        let directory = read_directory(data)?;
        let hash = ContentHash::of(data);
        tracing::debug!(%hash, tags = directory.len(), "indexed profile");
        Ok(Self::with_state(ProfileState {
            header,
            raw: Some(Arc::from(data)),
            directory,
            tags: Vec::new(),
            tags_loaded: false,
            hash,
            file_name: None,
            default: None,
            cached_as: None,
        }))
    }

    /// Open a profile from a byte buffer
    pub fn from_memory(data: &[u8], flags: ProfileFlags) -> Result<Arc<Profile>> {
        if flags.contains(ProfileFlags::NO_CACHE) {
            return Self::parse(data).map(Arc::new);
        }
        let key = CacheKey::from(ContentHash::of(data));
        cache::service().profiles_by_hash.get_or_try_insert_with(key, || -> Result<Arc<Profile>> {
            let profile = Self::parse(data)?;
            profile.state.lock().cached_as = Some(CachedAs::Hash(key));
            Ok(Arc::new(profile))
        })
    }

    /// Open a profile file
    pub fn from_file(path: impl AsRef<Path>, flags: ProfileFlags) -> Result<Arc<Profile>> {
        let path = path.as_ref();
        let key = CacheKey::from_hash_text(&path.to_string_lossy());
        let cached = !flags.contains(ProfileFlags::NO_CACHE);
        let load = || -> Result<Arc<Profile>> {
            let data = std::fs::read(path)?;
            let profile = Self::parse(&data)?;
            {
                let mut state = profile.state.lock();
                state.file_name = Some(path.to_path_buf());
                state.cached_as = cached.then_some(CachedAs::File(key));
            }
            profile
                .object
                .set_name(NameKind::Nick, path.display().to_string());
            Ok(Arc::new(profile))
        };
        if !cached {
            return load();
        }
        cache::service().profiles_by_file.get_or_try_insert_with(key, load)
    }

    /// Header-only profile describing a bare color space
    pub fn from_signature(color_space: ColorSpace) -> Arc<Profile> {
        let header = IccHeader::new(ProfileClass::ColorSpace, color_space, ColorSpace::Xyz);
        Arc::new(Self::from_header(header, Vec::new()))
    }

    fn from_header(header: IccHeader, tags: Vec<Tag>) -> Self {
        Self::with_state(ProfileState {
            header,
            raw: None,
            directory: Vec::new(),
            tags,
            tags_loaded: true,
            hash: ContentHash::default(),
            file_name: None,
            default: None,
            cached_as: None,
        })
    }

    /// Open one of the well-known defaults.
    ///
    /// The profile file comes from the configuration. Lab and XYZ defaults
    /// without a configured file are synthesized.
    pub fn from_std(which: ProfileDefault, flags: ProfileFlags) -> Result<Arc<Profile>> {
        let config = config::current();
        if let Some(path) = config.default_profiles.get(&which) {
            let profile = Self::from_file(path, flags)?;
            profile.state.lock().default = Some(which);
            return Ok(profile);
        }
        let (space, description) = match which.color_space() {
            ColorSpace::Lab => (ColorSpace::Lab, "CIE*Lab"),
            ColorSpace::Xyz => (ColorSpace::Xyz, "CIE*XYZ"),
            _ => {
                return Err(Error::InvalidProfile(format!(
                    "no profile file configured for {which:?}"
                )));
            }
        };
        let header = IccHeader::new(ProfileClass::Abstract, space, space);
        let tags = vec![
            Tag::new(TagSignature::DESC, TextData::new(description).encode_mluc()),
            Tag::new(
                TagSignature::MEDIA_WHITE,
                XyzTagData {
                    values: vec![XyzNumber::D50],
                }
                .encode(),
            ),
        ];
        let profile = Self::from_header(header, tags);
        profile.state.lock().default = Some(which);
        profile.object.set_name(NameKind::Nick, description);
        Ok(Arc::new(profile))
    }

    /// Copy every tag payload out of the raw buffer, once.
    fn load_tags(&self, state: &mut ProfileState) {
        if state.tags_loaded {
            return;
        }
        state.tags_loaded = true;
        let Some(raw) = state.raw.clone() else {
            return;
        };
        for entry in &state.directory {
            let tag = Tag::from_entry(entry, &raw);
            if tag.status() == TagStatus::Corrupted {
                report!(
                    Warning,
                    Some(&self.object),
                    "tag {} at offset {} size {} exceeds the {} byte profile",
                    entry.signature,
                    entry.offset,
                    entry.size,
                    raw.len()
                );
            }
            state.tags.push(tag);
        }
    }

    /// Drop the buffer after a change; it is rewritten on demand.
    ///
    /// Returns the cache the profile has to leave.
    #[must_use]
    fn invalidate(state: &mut ProfileState) -> Option<CachedAs> {
        state.raw = None;
        state.directory.clear();
        state.hash = ContentHash::default();
        state.cached_as.take()
    }

    /// Remove this profile from the cache it was shared through
    fn leave_cache(&self, cached: Option<CachedAs>) {
        let service = cache::service();
        let (cache, key) = match cached {
            Some(CachedAs::Hash(key)) => (&service.profiles_by_hash, key),
            Some(CachedAs::File(key)) => (&service.profiles_by_file, key),
            None => return,
        };
        if cache.remove_if(key, |p| std::ptr::eq(Arc::as_ptr(p), self)).is_some() {
            tracing::debug!(id = self.object.id(), ?key, "mutated profile left the cache");
        }
    }

    pub fn tag_count(&self) -> usize {
        let mut state = self.state.lock();
        self.load_tags(&mut state);
        state.tags.len()
    }

    pub fn tag_by_index(&self, index: usize) -> Option<Tag> {
        let mut state = self.state.lock();
        self.load_tags(&mut state);
        state.tags.get(index).cloned()
    }

    pub fn tag_by_signature(&self, signature: TagSignature) -> Option<Tag> {
        let mut state = self.state.lock();
        self.load_tags(&mut state);
        state.tags.iter().find(|t| t.signature() == signature).cloned()
    }

    pub fn tags(&self) -> Vec<Tag> {
        let mut state = self.state.lock();
        self.load_tags(&mut state);
        state.tags.clone()
    }

    /// Insert a tag at `position` (end if `None`), replacing one with the same signature
    pub fn add_tag(&self, tag: Tag, position: Option<usize>) {
        let cached = {
            let mut state = self.state.lock();
            self.load_tags(&mut state);
            if let Some(existing) = state.tags.iter_mut().find(|t| t.signature() == tag.signature()) {
                *existing = tag;
            } else {
                let at = position.unwrap_or(state.tags.len()).min(state.tags.len());
                state.tags.insert(at, tag);
            }
            Self::invalidate(&mut state)
        };
        self.leave_cache(cached);
    }

    pub fn remove_tag(&self, signature: TagSignature) -> Option<Tag> {
        let (tag, cached) = {
            let mut state = self.state.lock();
            self.load_tags(&mut state);
            let index = state.tags.iter().position(|t| t.signature() == signature)?;
            let tag = state.tags.remove(index);
            (tag, Self::invalidate(&mut state))
        };
        self.leave_cache(cached);
        Some(tag)
    }

    /// Header field in host order
    pub fn signature(&self, field: SignatureField) -> u32 {
        self.state.lock().header.signature(field)
    }

    /// Set a header field given in host order
    pub fn set_signature(&self, field: SignatureField, value: u32) {
        self.modify_header(|header| header.set_signature(field, value));
    }

    pub fn header(&self) -> IccHeader {
        self.state.lock().header.clone()
    }

    /// Edit the header, e.g. the creation date or the illuminant
    pub fn modify_header(&self, edit: impl FnOnce(&mut IccHeader)) {
        let cached = {
            let mut state = self.state.lock();
            self.load_tags(&mut state);
            edit(&mut state.header);
            Self::invalidate(&mut state)
        };
        self.leave_cache(cached);
    }

    /// Serialize, reusing the buffer when nothing changed since the last write
    pub fn to_memory(&self) -> Vec<u8> {
        let mut state = self.state.lock();
        if let Some(raw) = &state.raw {
            return raw.to_vec();
        }
        self.serialize(&mut state)
    }

    /// Write the tags and header into a fresh buffer and index it
    fn serialize(&self, state: &mut ProfileState) -> Vec<u8> {
        self.load_tags(state);

        let tags: Vec<(TagSignature, &[u8])> = state
            .tags
            .iter()
            .map(|t| (t.signature(), t.payload()))
            .collect();
        let mut data = write_profile(&state.header, &tags);
        let id = hash::profile_id(&data);
        data[84..100].copy_from_slice(&id.0);

        let directory = read_directory(&data).unwrap_or_default();
        for tag in state.tags.iter_mut() {
            if let Some(entry) = directory.iter().find(|e| e.signature == tag.signature()) {
                tag.set_location(entry.offset, entry.size);
            }
        }
        state.tags.retain(|t| !t.payload().is_empty());
        if let Ok(header) = IccHeader::parse(&data) {
            state.header = header;
        }
        state.hash = ContentHash::of(&data);
        state.directory = directory;
        state.raw = Some(Arc::from(data.as_slice()));
        tracing::debug!(hash = %state.hash, size = data.len(), "serialized profile");
        data
    }

    /// MD5 of the current bytes, serializing first if needed
    pub fn hash(&self) -> ContentHash {
        let mut state = self.state.lock();
        if state.raw.is_none() {
            self.serialize(&mut state);
        }
        state.hash
    }

    /// ICC profile ID of the current bytes
    pub fn profile_id(&self) -> ContentHash {
        hash::profile_id(&self.to_memory())
    }

    pub fn equal(&self, other: &Profile) -> bool {
        std::ptr::eq(self, other) || self.hash() == other.hash()
    }

    pub fn file_name(&self) -> Option<PathBuf> {
        self.state.lock().file_name.clone()
    }

    pub fn default_kind(&self) -> Option<ProfileDefault> {
        self.state.lock().default
    }

    pub fn color_space(&self) -> Result<ColorSpace> {
        Ok(self.state.lock().header.color_space()?)
    }

    pub fn pcs(&self) -> Result<ColorSpace> {
        Ok(self.state.lock().header.pcs()?)
    }

    pub fn device_class(&self) -> Result<ProfileClass> {
        Ok(self.state.lock().header.device_class()?)
    }

    /// Channels of the data color space, 0 when it is unknown
    pub fn channel_count(&self) -> usize {
        self.color_space().map(|cs| cs.channels()).unwrap_or(0)
    }

    pub fn channel_names(&self) -> Vec<String> {
        self.color_space()
            .map(|cs| cs.channel_names())
            .unwrap_or_default()
    }

    fn tag_text(&self, signature: TagSignature) -> Option<String> {
        let tag = self.tag_by_signature(signature)?;
        match TagValue::decode(tag.payload()) {
            Ok(value) => value.as_text().map(str::to_string),
            Err(e) => {
                report!(Debug, Some(&self.object), "tag {} unreadable: {}", signature, e);
                None
            }
        }
    }

    /// Text for a name kind.
    ///
    /// `Nick` is the file name or the hash, `Name` the `desc` text and
    /// `Description` adds the copyright.
    pub fn text(&self, kind: NameKind) -> String {
        let nick = || {
            self.object
                .name(NameKind::Nick)
                .unwrap_or_else(|| self.hash().to_hex())
        };
        match kind {
            NameKind::Nick => nick(),
            NameKind::Name => self.tag_text(TagSignature::DESC).unwrap_or_else(nick),
            NameKind::Description => {
                let name = self.tag_text(TagSignature::DESC).unwrap_or_else(nick);
                match self.tag_text(TagSignature::COPYRIGHT) {
                    Some(copyright) => format!("{name}\n{copyright}"),
                    None => name,
                }
            }
        }
    }
}

impl DeepCopy for Profile {
    fn deep_copy(&self) -> Self {
        Self {
            object: self.object.duplicate(),
            state: Mutex::new(ProfileState {
                cached_as: None,
                ..self.state.lock().clone()
            }),
        }
    }
}

impl fmt::Debug for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Profile")
            .field("id", &self.object.id())
            .field("hash", &state.hash)
            .field("file_name", &state.file_name)
            .field("tags", &state.tags.len().max(state.directory.len()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bytes::write_u32;
    use crate::icc::{MIN_PROFILE_SIZE, RenderingIntent};

    fn rgb_profile_bytes() -> Vec<u8> {
        let header = IccHeader::new(ProfileClass::Display, ColorSpace::Rgb, ColorSpace::Xyz);
        let desc = TextData::new("Test RGB").encode_mluc();
        let wtpt = XyzTagData {
            values: vec![XyzNumber::D50],
        }
        .encode();
        write_profile(
            &header,
            &[(TagSignature::DESC, &desc), (TagSignature::MEDIA_WHITE, &wtpt)],
        )
    }

    #[test]
    fn test_from_memory_indexes_tags() {
        let data = rgb_profile_bytes();
        let profile = Profile::from_memory(&data, ProfileFlags::NO_CACHE).unwrap();
        assert_eq!(profile.tag_count(), 2);
        assert_eq!(profile.color_space().unwrap(), ColorSpace::Rgb);
        assert_eq!(profile.channel_count(), 3);
        assert_eq!(profile.text(NameKind::Name), "Test RGB");
        assert_eq!(profile.hash(), ContentHash::of(&data));
        assert_eq!(profile.to_memory(), data);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut data = rgb_profile_bytes();
        data[36] = b'x';
        assert!(Profile::from_memory(&data, ProfileFlags::NO_CACHE).is_err());
        assert!(Profile::from_memory(&data[..MIN_PROFILE_SIZE - 1], ProfileFlags::NO_CACHE).is_err());
    }

    #[test]
    fn test_corrupted_tag_does_not_stop_parsing() {
        let mut data = rgb_profile_bytes();
        // second entry: point the wtpt offset past the end
        let entry = MIN_PROFILE_SIZE + 12;
        let past_end = data.len() as u32 + 64;
        write_u32(&mut data, entry + 4, past_end);

        let profile = Profile::from_memory(&data, ProfileFlags::NO_CACHE).unwrap();
        assert_eq!(profile.tag_count(), 2);
        let wtpt = profile.tag_by_signature(TagSignature::MEDIA_WHITE).unwrap();
        assert_eq!(wtpt.status(), TagStatus::Corrupted);
        let desc = profile.tag_by_signature(TagSignature::DESC).unwrap();
        assert_eq!(desc.status(), TagStatus::Ok);
    }

    #[test]
    fn test_mutation_rehashes() {
        let data = rgb_profile_bytes();
        let profile = Profile::from_memory(&data, ProfileFlags::NO_CACHE).unwrap();
        let before = profile.hash();

        profile.set_signature(SignatureField::Intent, RenderingIntent::Saturation.to_u32());
        let after = profile.hash();
        assert_ne!(before, after);
        assert_eq!(profile.signature(SignatureField::Intent), 2);
        // the profile ID ignores the intent field
        assert_eq!(profile.profile_id(), hash::profile_id(&data));

        let written = profile.to_memory();
        assert_eq!(ContentHash::of(&written), after);
        assert_eq!(profile.hash(), after);
    }

    #[test]
    fn test_add_and_remove_tag() {
        let profile = Profile::from_signature(ColorSpace::Cmyk);
        assert_eq!(profile.tag_count(), 0);
        profile.add_tag(
            Tag::new(TagSignature::COPYRIGHT, TextData::new("none").encode_text()),
            None,
        );
        profile.add_tag(
            Tag::new(TagSignature::DESC, TextData::new("CMYK").encode_text()),
            Some(0),
        );
        assert_eq!(profile.tag_by_index(0).map(|t| t.signature()), Some(TagSignature::DESC));

        let data = profile.to_memory();
        let reopened = Profile::from_memory(&data, ProfileFlags::NO_CACHE).unwrap();
        assert_eq!(reopened.tag_count(), 2);
        assert_eq!(reopened.text(NameKind::Description), "CMYK\nnone");

        assert!(profile.remove_tag(TagSignature::COPYRIGHT).is_some());
        assert!(profile.remove_tag(TagSignature::COPYRIGHT).is_none());
        assert_eq!(profile.tag_count(), 1);
    }

    #[test]
    fn test_memory_cache_shares_handle() {
        let mut data = rgb_profile_bytes();
        // make the bytes unique to this test
        data[48..52].copy_from_slice(b"mcsh");
        let a = Profile::from_memory(&data, ProfileFlags::NONE).unwrap();
        let b = Profile::from_memory(&data, ProfileFlags::NONE).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        let c = Profile::from_memory(&data, ProfileFlags::NO_CACHE).unwrap();
        assert!(!Arc::ptr_eq(&a, &c));
        assert!(a.equal(&c));
    }

    #[test]
    fn test_mutated_profile_leaves_cache() {
        let mut data = rgb_profile_bytes();
        data[48..52].copy_from_slice(b"mlvc");
        let shared = Profile::from_memory(&data, ProfileFlags::NONE).unwrap();
        let before = shared.hash();
        assert_eq!(before, ContentHash::of(&data));

        shared.set_signature(SignatureField::Manufacturer, u32::from_be_bytes(*b"edit"));
        let after = shared.hash();
        assert_ne!(after, before);
        assert_eq!(after, ContentHash::of(&shared.to_memory()));

        // the original bytes open a fresh, unmodified profile
        let fresh = Profile::from_memory(&data, ProfileFlags::NONE).unwrap();
        assert!(!Arc::ptr_eq(&shared, &fresh));
        assert_eq!(fresh.hash(), before);
        assert_eq!(
            cache::service().profiles_by_hash.get(CacheKey::from(before)).map(|p| Arc::ptr_eq(&p, &fresh)),
            Some(true)
        );
    }

    #[test]
    fn test_synthesized_lab_default() {
        let lab = Profile::from_std(ProfileDefault::EditingLab, ProfileFlags::NONE).unwrap();
        assert_eq!(lab.color_space().unwrap(), ColorSpace::Lab);
        assert_eq!(lab.default_kind(), Some(ProfileDefault::EditingLab));
        assert_eq!(lab.text(NameKind::Name), "CIE*Lab");
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let data = rgb_profile_bytes();
        let profile = Profile::from_memory(&data, ProfileFlags::NO_CACHE).unwrap();
        let copy = profile.deep_copy();
        copy.remove_tag(TagSignature::DESC);
        assert_eq!(profile.tag_count(), 2);
        assert_eq!(copy.tag_count(), 1);
        assert_ne!(copy.object().id(), profile.object().id());
    }
}
