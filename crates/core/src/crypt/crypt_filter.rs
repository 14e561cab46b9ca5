//! Version 4 crypt-filter dispatch.

use rustc_hash::FxHashMap;

use super::{Decrypt, Decrypter};
use crate::error::{PdfError, Result};
use crate::model::objects::{Name, ObjectId};

/// Routes streams and strings to named sub-decrypters.
///
/// The `Identity` filter is always present and always a pass-through.
#[derive(Debug, Clone)]
pub struct CryptFilterDecrypter {
    filters: FxHashMap<Name, Decrypter>,
    stream_filter: Name,
    string_filter: Name,
}

impl CryptFilterDecrypter {
    pub fn new(
        mut filters: FxHashMap<Name, Decrypter>,
        stream_filter: Name,
        string_filter: Name,
    ) -> Result<Self> {
        filters.insert(Name::new("Identity"), Decrypter::Identity);
        for default in [&stream_filter, &string_filter] {
            if !filters.contains_key(default) {
                return Err(PdfError::format(
                    0,
                    format!("default crypt filter {default:?} is not defined in /CF"),
                ));
            }
        }
        Ok(Self {
            filters,
            stream_filter,
            string_filter,
        })
    }

    pub fn filter(&self, name: &Name) -> Result<&Decrypter> {
        self.filters
            .get(name)
            .ok_or_else(|| PdfError::format(0, format!("unknown crypt filter {name:?}")))
    }

    pub const fn stream_filter(&self) -> &Name {
        &self.stream_filter
    }

    pub const fn string_filter(&self) -> &Name {
        &self.string_filter
    }
}

impl Decrypt for CryptFilterDecrypter {
    fn decrypt_buffer(
        &self,
        filter: Option<Name>,
        owner: Option<ObjectId>,
        buf: bytes::Bytes,
    ) -> Result<bytes::Bytes> {
        match filter {
            // A filter named in the stream's own /DecodeParms is applied with
            // the general key.
            Some(name) => self.filter(&name)?.decrypt_buffer(None, None, buf),
            None => self.filter(&self.stream_filter)?.decrypt_buffer(None, owner, buf),
        }
    }

    fn decrypt_string(&self, owner: ObjectId, bytes: Vec<u8>) -> Result<Vec<u8>> {
        self.filter(&self.string_filter)?.decrypt_string(owner, bytes)
    }

    fn is_encrypted(&self) -> bool {
        self.filters.values().any(Decrypt::is_encrypted)
    }

    fn is_encrypted_with(&self, filter: Name) -> Result<bool> {
        Ok(self.filter(&filter)?.is_encrypted())
    }

    fn is_owner_authorised(&self) -> bool {
        self.filters.values().any(Decrypt::is_owner_authorised)
    }
}
