// provider_traits.rs — Provider traits blob
//
// Layout (all integers little-endian):
//   u16  total size of the blob, this field included
//   u8[] provider name, UTF-8, NUL-terminated (empty unless requested)
//   optional group trait: u16 size (19), u8 type (1), 16-byte group GUID
//
// The blob rides in descriptor slot 0 of every write. Providers with neither
// a name trait nor a control GUID have no blob.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::CodegenError;
use crate::schema::Provider;

const GROUP_TRAIT_TYPE: u8 = 1;
const GROUP_TRAIT_SIZE: u16 = 2 + 1 + 16;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderTraits {
    pub bytes: Vec<u8>,
}

impl ProviderTraits {
    pub fn for_provider(provider: &Provider) -> Result<Option<Self>, CodegenError> {
        if !provider.include_name_in_traits && provider.control_guid.is_none() {
            return Ok(None);
        }
        let name = if provider.include_name_in_traits {
            provider.name.as_bytes()
        } else {
            &[]
        };
        let group_len = if provider.control_guid.is_some() {
            usize::from(GROUP_TRAIT_SIZE)
        } else {
            0
        };
        let size = 2 + name.len() + 1 + group_len;
        let total = u16::try_from(size).map_err(|_| CodegenError::TraitsTooLarge {
            provider: provider.name.clone(),
            size,
        })?;

        let mut bytes = Vec::with_capacity(size);
        bytes.extend_from_slice(&total.to_le_bytes());
        bytes.extend_from_slice(name);
        bytes.push(0);
        if let Some(group) = provider.control_guid {
            bytes.extend_from_slice(&GROUP_TRAIT_SIZE.to_le_bytes());
            bytes.push(GROUP_TRAIT_TYPE);
            bytes.extend_from_slice(&group.to_bytes_le());
        }
        Ok(Some(ProviderTraits { bytes }))
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// C string literal body (without quotes).
    pub fn c_literal(&self) -> String {
        escape_bytes(&self.bytes)
    }
}

/// Escape bytes for a C string literal. Printable ASCII passes through;
/// everything else becomes a three-digit octal escape, which never absorbs
/// a following digit.
pub fn escape_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        match b {
            b'"' => out.push_str("\\\""),
            b'\\' => out.push_str("\\\\"),
            // Avoid trigraphs.
            b'?' => out.push_str("\\?"),
            0x20..=0x7e => out.push(char::from(b)),
            _ => {
                let _ = write!(out, "\\{:03o}", b);
            }
        }
    }
    out
}
