//! Profile tags
//!
//! A [`Tag`] keeps the raw payload it was read with, type header
//! included. Decoding into a [`TagValue`] goes through a tag codec module
//! so that modules can add types the core does not know.

use crate::error::{Error, Result};
use crate::icc::{TagEntry, TagSignature, TagValue, TypeSignature};
use crate::module::{ApiKind, Capability, ModuleCode, ModuleRegistry};

/// Health of a tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagStatus {
    /// Payload is present and its type is understood
    Ok,
    /// Payload lies (partly) outside the profile or is truncated
    Corrupted,
    /// Payload is present but no built-in decoder knows the type
    Unchecked,
}

/// One tag owned by a profile
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    signature: TagSignature,
    type_sig: Option<TypeSignature>,
    status: TagStatus,
    payload: Vec<u8>,
    origin: Option<ModuleCode>,
    offset: u32,
    size: u32,
}

impl Tag {
    /// Tag from a complete payload (type signature, reserved bytes, data)
    pub fn new(signature: TagSignature, payload: Vec<u8>) -> Self {
        let type_sig = TypeSignature::of_payload(&payload);
        let status = classify(type_sig, payload.len());
        let size = payload.len() as u32;
        Self {
            signature,
            type_sig,
            status,
            payload,
            origin: None,
            offset: 0,
            size,
        }
    }

    /// Copy a directory entry's payload out of a profile buffer.
    ///
    /// An entry reaching past the buffer yields a `Corrupted` tag holding
    /// whatever bytes were inside.
    pub fn from_entry(entry: &TagEntry, data: &[u8]) -> Self {
        let (payload, status) = match entry.payload(data) {
            Ok(bytes) => {
                let type_sig = TypeSignature::of_payload(bytes);
                (bytes.to_vec(), classify(type_sig, bytes.len()))
            }
            Err(_) => {
                let start = (entry.offset as usize).min(data.len());
                let end = start.saturating_add(entry.size as usize).min(data.len());
                (data[start..end].to_vec(), TagStatus::Corrupted)
            }
        };
        Self {
            signature: entry.signature,
            type_sig: TypeSignature::of_payload(&payload),
            status,
            payload,
            origin: None,
            offset: entry.offset,
            size: entry.size,
        }
    }

    pub fn with_origin(mut self, code: ModuleCode) -> Self {
        self.origin = Some(code);
        self
    }

    pub fn signature(&self) -> TagSignature {
        self.signature
    }

    pub fn type_signature(&self) -> Option<TypeSignature> {
        self.type_sig
    }

    pub fn status(&self) -> TagStatus {
        self.status
    }

    /// Raw payload, type header included
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Code of the module that produced the tag, if any
    pub fn origin(&self) -> Option<ModuleCode> {
        self.origin
    }

    /// Offset in the buffer the tag was read from
    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Size declared by the directory entry
    pub fn size(&self) -> u32 {
        self.size
    }

    pub(crate) fn set_location(&mut self, offset: u32, size: u32) {
        self.offset = offset;
        self.size = size;
    }

    /// Decode through the first tag codec that can read this type.
    ///
    /// The codec of the tag's originating module is preferred.
    pub fn value(&self, registry: &ModuleRegistry) -> Result<TagValue> {
        if self.status == TagStatus::Corrupted {
            return Err(Error::InvalidProfile(format!(
                "tag {} is corrupted",
                self.signature
            )));
        }
        let type_sig = self
            .type_sig
            .ok_or_else(|| Error::InvalidProfile(format!("tag {} has no type", self.signature)))?;
        let api = registry
            .get_api_with(
                ApiKind::TagCodec,
                self.origin,
                None,
                &[Capability::TagTypeRead(type_sig)],
            )
            .ok_or_else(|| Error::ApiNotFound(format!("a tag codec for '{type_sig}'")))?;
        let codec = api
            .as_tag_codec()
            .ok_or_else(|| Error::ApiNotFound(format!("a tag codec for '{type_sig}'")))?;
        codec.decode(&self.payload)
    }
}

fn classify(type_sig: Option<TypeSignature>, len: usize) -> TagStatus {
    match type_sig {
        _ if len < 8 => TagStatus::Corrupted,
        Some(sig) if TagValue::DECODABLE.contains(&sig) => TagStatus::Ok,
        _ => TagStatus::Unchecked,
    }
}
