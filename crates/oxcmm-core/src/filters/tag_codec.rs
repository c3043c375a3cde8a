use crate::error::Result;
use crate::icc::TagValue;
use crate::module::{Capability, TagCodecApi};

use super::TAG_CODEC_REGISTRATION;

/// Decodes the tag types of [`TagValue::DECODABLE`]
pub struct BuiltinTagCodec;

impl TagCodecApi for BuiltinTagCodec {
    fn registration(&self) -> &str {
        TAG_CODEC_REGISTRATION
    }

    fn can_handle(&self, query: Capability) -> bool {
        match query {
            Capability::TagTypeRead(sig) => TagValue::DECODABLE.contains(&sig),
            Capability::ProfileFormat(major) => (2..=4).contains(&major),
            _ => false,
        }
    }

    fn decode(&self, payload: &[u8]) -> Result<TagValue> {
        Ok(TagValue::decode(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::icc::{TextData, TypeSignature};

    #[test]
    fn test_builtin_codec() {
        let codec = BuiltinTagCodec;
        assert!(codec.can_handle(Capability::TagTypeRead(TypeSignature::MLUC)));
        assert!(!codec.can_handle(Capability::TagTypeRead(TypeSignature::from_bytes(*b"zzzz"))));
        let value = codec.decode(&TextData::new("hello").encode_text()).unwrap();
        assert_eq!(value.as_text(), Some("hello"));
        assert!(codec.decode(&[0; 4]).is_err());
    }
}
