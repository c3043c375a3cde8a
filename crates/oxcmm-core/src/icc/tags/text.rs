//! Text Tag Types
//!
//! ICC profiles can contain text in several formats:
//! - text: Simple ASCII text
//! - desc: Profile description (v2 format)
//! - mluc: Multi-localized Unicode (v4 format)
//!
//! See ICC.1:2022 Sections 10.24 (text), 10.14 (desc), 10.15 (mluc)

use crate::bytes::{pad4, push_u16, push_u32, read_u32};
use crate::icc::error::IccError;
use crate::icc::types::TypeSignature;

/// Text tag data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextData {
    /// Primary text content (English or default)
    pub text: String,
    /// Localized versions (language-country -> text)
    pub localized: Vec<(String, String)>,
}

impl TextData {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            localized: Vec::new(),
        }
    }

    /// Parse 'text' type (simple ASCII)
    pub fn parse_text(data: &[u8]) -> Result<Self, IccError> {
        Ok(Self::new(ascii_until_nul(data)))
    }

    /// Parse 'desc' type (v2 profile description)
    pub fn parse_desc(data: &[u8]) -> Result<Self, IccError> {
        let ascii_count = read_u32(data, 0)
            .ok_or_else(|| IccError::CorruptedData("Description tag too small".into()))?
            as usize;

        let ascii = data
            .get(4..4usize.saturating_add(ascii_count))
            .ok_or_else(|| IccError::CorruptedData("Description ASCII data truncated".into()))?;

        // desc also carries Unicode and ScriptCode variants; real profiles
        // rarely fill them correctly, so only the ASCII part is read.
        Ok(Self::new(ascii_until_nul(ascii)))
    }

    /// Parse 'mluc' type (multi-localized Unicode)
    pub fn parse_mluc(data: &[u8]) -> Result<Self, IccError> {
        let (Some(record_count), Some(record_size)) = (read_u32(data, 0), read_u32(data, 4)) else {
            return Err(IccError::CorruptedData("mluc tag too small".into()));
        };
        let (record_count, record_size) = (record_count as usize, record_size as usize);
        if record_size < 12 {
            return Err(IccError::CorruptedData("mluc record size too small".into()));
        }

        let mut localized = Vec::with_capacity(record_count.min(64));
        for i in 0..record_count {
            let at = 8 + i * record_size;
            let Some(record) = data.get(at..at + 12) else {
                break;
            };
            let locale = format!(
                "{}{}-{}{}",
                record[0] as char, record[1] as char, record[2] as char, record[3] as char
            );
            let (Some(len), Some(offset)) = (read_u32(record, 4), read_u32(record, 8)) else {
                break;
            };
            // Offsets count from the start of the tag, which includes the
            // 8-byte type header that the caller stripped.
            let start = (offset as usize).saturating_sub(8);
            if let Some(text) = data
                .get(start..start.saturating_add(len as usize))
                .and_then(decode_utf16be)
            {
                localized.push((locale, text));
            }
        }

        let text = localized
            .iter()
            .find(|(locale, _)| locale.starts_with("en"))
            .or(localized.first())
            .map(|(_, t)| t.clone())
            .unwrap_or_default();
        Ok(Self { text, localized })
    }

    /// Get text for a specific language prefix
    pub fn get_locale(&self, lang: &str) -> Option<&str> {
        self.localized
            .iter()
            .find(|(locale, _)| locale.starts_with(lang))
            .map(|(_, text)| text.as_str())
    }

    /// Encode as a complete 'text' payload including the type header
    pub fn encode_text(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8 + self.text.len() + 1);
        push_u32(&mut out, TypeSignature::TEXT.0);
        push_u32(&mut out, 0);
        out.extend(self.text.chars().map(|c| if c.is_ascii() { c as u8 } else { b'?' }));
        out.push(0);
        out
    }

    /// Encode as a complete 'mluc' payload including the type header.
    ///
    /// Without localized entries the primary text is written as en-US.
    pub fn encode_mluc(&self) -> Vec<u8> {
        let records: Vec<(&str, &str)> = if self.localized.is_empty() {
            vec![("en-US", self.text.as_str())]
        } else {
            self.localized
                .iter()
                .map(|(l, t)| (l.as_str(), t.as_str()))
                .collect()
        };

        let mut out = Vec::new();
        push_u32(&mut out, TypeSignature::MLUC.0);
        push_u32(&mut out, 0);
        push_u32(&mut out, records.len() as u32);
        push_u32(&mut out, 12);

        let mut strings = Vec::new();
        let strings_start = 16 + records.len() * 12;
        for (locale, text) in &records {
            let code: Vec<u8> = locale.bytes().filter(|b| *b != b'-').chain([b' '; 4]).take(4).collect();
            out.extend_from_slice(&code);
            let offset = strings_start + strings.len();
            let units: Vec<u16> = text.encode_utf16().collect();
            push_u32(&mut out, (units.len() * 2) as u32);
            push_u32(&mut out, offset as u32);
            for unit in units {
                push_u16(&mut strings, unit);
            }
        }
        out.extend_from_slice(&strings);
        pad4(&mut out);
        out
    }
}

fn ascii_until_nul(data: &[u8]) -> String {
    data.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

/// Decode UTF-16BE bytes to String
fn decode_utf16be(data: &[u8]) -> Option<String> {
    if data.len() % 2 != 0 {
        return None;
    }

    let utf16: Vec<u16> = data
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .take_while(|&c| c != 0)
        .collect();

    String::from_utf16(&utf16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_text() {
        let data = b"Hello, World!\0";
        let text = TextData::parse_text(data).unwrap();
        assert_eq!(text.text, "Hello, World!");
    }

    #[test]
    fn test_parse_desc() {
        // Count = 6 (including null)
        let mut data = vec![0, 0, 0, 6];
        data.extend_from_slice(b"sRGB\0\0");

        let text = TextData::parse_desc(&data).unwrap();
        assert_eq!(text.text, "sRGB");

        assert!(TextData::parse_desc(&[0, 0, 0, 40, b'x']).is_err());
    }

    #[test]
    fn test_parse_mluc() {
        // 1 record, 12 bytes each
        let mut data = vec![
            0, 0, 0, 1, // record count = 1
            0, 0, 0, 12, // record size = 12
        ];
        data.extend_from_slice(&[
            b'e', b'n', // language
            b'U', b'S', // country
            0, 0, 0, 8, // string length = 8 bytes
            0, 0, 0, 28, // string offset from tag start
        ]);
        data.extend_from_slice(&[0x00, b'T', 0x00, b'e', 0x00, b's', 0x00, b't']);

        let text = TextData::parse_mluc(&data).unwrap();
        assert_eq!(text.text, "Test");
        assert_eq!(text.get_locale("en"), Some("Test"));
    }

    #[test]
    fn test_mluc_encode_parse() {
        let original = TextData::new("Display P3 ✓");
        let payload = original.encode_mluc();
        assert_eq!(&payload[0..4], b"mluc");
        assert_eq!(payload.len() % 4, 0);

        let parsed = TextData::parse_mluc(&payload[8..]).unwrap();
        assert_eq!(parsed.text, "Display P3 ✓");
        assert_eq!(parsed.localized[0].0, "en-US");
    }

    #[test]
    fn test_text_encode() {
        let payload = TextData::new("No copyright").encode_text();
        assert_eq!(&payload[0..4], b"text");
        assert_eq!(TextData::parse_text(&payload[8..]).unwrap().text, "No copyright");
    }

    #[test]
    fn test_decode_utf16be() {
        let data = [0x00, 0x48, 0x00, 0x65, 0x00, 0x6C, 0x00, 0x6C, 0x00, 0x6F];
        assert_eq!(decode_utf16be(&data).unwrap(), "Hello");
        assert_eq!(decode_utf16be(&data[..3]), None);
    }
}
