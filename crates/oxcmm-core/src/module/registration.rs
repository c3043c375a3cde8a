//! Registration string matching
//!
//! A registration such as `org/oxcmm/imaging/icc_color.moxc` is a list of
//! slash separated segments, each holding dot separated keys. Patterns use
//! the same shape; an empty pattern segment matches any segment. Pattern
//! keys may carry a prefix:
//!
//! - `_key` is optional and only adds to the rank when present
//! - `-key` must not be present
//! - `4+key` (or `4_key`, `4-key`) only applies to API kind 4
//!
//! Comma separated keys (`lcm2,moxc`) are alternatives. A pattern without a
//! slash is compared against every key of the registration.

use super::ApiKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyMode {
    Required,
    Optional,
    Excluded,
}

struct PatternKey<'a> {
    mode: KeyMode,
    api: Option<u32>,
    alternatives: Vec<&'a str>,
}

impl<'a> PatternKey<'a> {
    fn parse(text: &'a str) -> Self {
        let mut rest = text;
        let mut api = None;
        let mut mode = KeyMode::Required;

        let mut chars = rest.chars();
        if let (Some(digit @ '1'..='9'), Some(kind @ ('+' | '_' | '-'))) = (chars.next(), chars.next()) {
            api = digit.to_digit(10);
            mode = mode_of(kind);
            rest = &rest[2..];
        } else if let Some(kind @ ('_' | '-')) = rest.chars().next() {
            mode = mode_of(kind);
            rest = &rest[1..];
        }

        Self {
            mode,
            api,
            alternatives: rest.split(',').collect(),
        }
    }

    fn matches(&self, key: &str) -> bool {
        self.alternatives.iter().any(|alt| alt.is_empty() || *alt == key)
    }
}

fn mode_of(c: char) -> KeyMode {
    match c {
        '_' => KeyMode::Optional,
        '-' => KeyMode::Excluded,
        _ => KeyMode::Required,
    }
}

/// Strip an API or mode prefix from a registration key
fn bare_key(key: &str) -> &str {
    let bytes = key.as_bytes();
    match bytes {
        [b'1'..=b'9', b'+' | b'_' | b'-', ..] => &key[2..],
        [b'_' | b'-', ..] => &key[1..],
        _ => key,
    }
}

/// Rank keys of one pattern segment against registration keys.
///
/// `None` means the segment rejects the registration.
fn match_keys(pattern: &str, keys: &[&str], api: Option<u32>) -> Option<u32> {
    let mut rank = 0;
    for text in pattern.split('.').filter(|k| !k.is_empty()) {
        let key = PatternKey::parse(text);
        if key.api.is_some() && key.api != api {
            continue;
        }
        let found = keys.iter().any(|k| key.matches(bare_key(k)));
        match (key.mode, found) {
            (KeyMode::Excluded, true) => return None,
            (KeyMode::Excluded, false) => {}
            (KeyMode::Required, false) => return None,
            (_, true) => rank += 1,
            (KeyMode::Optional, false) => {}
        }
    }
    Some(rank)
}

/// Match a registration against a pattern; 0 means no match.
///
/// Higher values are better matches. A pattern that matches without any
/// key hit, e.g. `//`, ranks 1.
pub fn registration_match(registration: &str, pattern: &str, api_kind: Option<ApiKind>) -> u32 {
    let api = api_kind.map(ApiKind::number);
    let segments: Vec<&str> = registration.split('/').collect();

    let rank = if !pattern.contains('/') {
        let keys: Vec<&str> = segments.iter().flat_map(|s| s.split('.')).collect();
        match_keys(pattern, &keys, api)
    } else {
        pattern
            .split('/')
            .enumerate()
            .try_fold(0, |rank, (i, part)| {
                if part.is_empty() {
                    return Some(rank);
                }
                let keys: Vec<&str> = segments.get(i)?.split('.').collect();
                Some(rank + match_keys(part, &keys, api)?)
            })
    };

    match rank {
        Some(0) => 1,
        Some(rank) => rank,
        None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_segment_pattern() {
        assert_eq!(registration_match("a.b.colour.x", "a.b.colour", None), 3);
        assert_eq!(registration_match("a.c.colour.y", "a.b.colour", None), 0);
        assert_eq!(registration_match("org/oxcmm/imaging/root", "root", None), 1);
    }

    #[test]
    fn test_segment_by_segment() {
        let reg = "org/oxcmm/imaging/icc_color.moxc";
        assert!(registration_match(reg, "//imaging/icc_color", None) > 0);
        assert_eq!(registration_match(reg, "//imaging/root", None), 0);
        assert_eq!(registration_match(reg, "//colour", None), 0);
        // pattern deeper than the registration
        assert_eq!(registration_match(reg, "////x", None), 0);
        assert_eq!(registration_match(reg, "//", None), 1);
    }

    #[test]
    fn test_key_prefixes() {
        let reg = "org/oxcmm/imaging/icc_color.moxc";
        let plain = registration_match(reg, "//imaging/icc_color", None);
        assert_eq!(registration_match(reg, "//imaging/icc_color._moxc", None), plain + 1);
        assert_eq!(registration_match(reg, "//imaging/icc_color._lcm2", None), plain);
        assert_eq!(registration_match(reg, "//imaging/icc_color.-moxc", None), 0);
        assert_eq!(registration_match(reg, "//imaging/icc_color.-lcm2", None), plain);
        assert!(registration_match(reg, "//imaging/icc_color.lcm2,moxc", None) > plain);
    }

    #[test]
    fn test_api_number_keys() {
        let reg = "org/oxcmm/imaging/icc_color.moxc";
        let filter = Some(ApiKind::FilterFactory);
        let cmm = Some(ApiKind::ProfileTransform);
        assert_eq!(registration_match(reg, "//imaging/4+lcm2", filter), 0);
        // does not apply to other kinds
        assert!(registration_match(reg, "//imaging/4+lcm2", cmm) > 0);
        assert!(registration_match(reg, "//imaging/4+moxc", filter) > 0);
    }

    #[test]
    fn test_registration_prefixes_ignored() {
        assert_eq!(registration_match("org/oxcmm/x._advanced", "advanced", None), 1);
    }
}
