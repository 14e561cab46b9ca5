//! Document decryption.
//!
//! A [`Decrypter`] is built once from the trailer's `/Encrypt` dictionary
//! and then consulted for every string and stream read from an indirect
//! object. Documents without `/Encrypt` get [`Decrypter::Identity`].

pub mod crypt_filter;
pub mod password;
pub mod standard;

use bytes::Bytes;
use rustc_hash::FxHashMap;

pub use crypt_filter::CryptFilterDecrypter;
pub use password::Password;
pub use standard::{Algorithm, StandardDecrypter, StandardParams};

use crate::error::{PdfError, Result};
use crate::model::objects::{Dictionary, Name, ObjectId, PdfObject, dict_get};

/// Password padding string from the standard security handler.
pub const PASSWORD_PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Operations every decryption scheme supports.
pub trait Decrypt: Send + Sync {
    /// Decrypt a stream payload.
    ///
    /// `filter` is the crypt filter named by the stream's own `/Crypt`
    /// decode step, if any. `owner` is the indirect object the stream was
    /// read from; `None` means the general key is used unsalted.
    fn decrypt_buffer(&self, filter: Option<Name>, owner: Option<ObjectId>, buf: Bytes)
    -> Result<Bytes>;

    /// Decrypt a string found inside indirect object `owner`.
    fn decrypt_string(&self, owner: ObjectId, bytes: Vec<u8>) -> Result<Vec<u8>>;

    fn is_encrypted(&self) -> bool;

    /// Whether the named crypt filter actually transforms data.
    fn is_encrypted_with(&self, filter: Name) -> Result<bool>;

    fn is_owner_authorised(&self) -> bool;
}

#[derive(Debug, Clone)]
pub enum Decrypter {
    Identity,
    Standard(StandardDecrypter),
    CryptFilter(CryptFilterDecrypter),
}

/// Shared pass-through decrypter for objects read in the clear.
pub static IDENTITY: Decrypter = Decrypter::Identity;

impl Default for Decrypter {
    fn default() -> Self {
        Self::Identity
    }
}

impl Decrypt for Decrypter {
    fn decrypt_buffer(
        &self,
        filter: Option<Name>,
        owner: Option<ObjectId>,
        buf: Bytes,
    ) -> Result<Bytes> {
        match self {
            Self::Identity => match filter {
                Some(name) => Err(PdfError::format(
                    0,
                    format!("crypt filter {name:?} named in an unencrypted document"),
                )),
                None => Ok(buf),
            },
            Self::Standard(std) => {
                if let Some(name) = filter {
                    return Err(PdfError::format(
                        0,
                        format!("crypt filter {name:?} named without a /CF dictionary"),
                    ));
                }
                std.decrypt(owner, &buf).map(Bytes::from)
            }
            Self::CryptFilter(cf) => cf.decrypt_buffer(filter, owner, buf),
        }
    }

    fn decrypt_string(&self, owner: ObjectId, bytes: Vec<u8>) -> Result<Vec<u8>> {
        match self {
            Self::Identity => Ok(bytes),
            Self::Standard(std) => std.decrypt(Some(owner), &bytes),
            Self::CryptFilter(cf) => cf.decrypt_string(owner, bytes),
        }
    }

    fn is_encrypted(&self) -> bool {
        match self {
            Self::Identity => false,
            Self::Standard(_) => true,
            Self::CryptFilter(cf) => cf.is_encrypted(),
        }
    }

    fn is_encrypted_with(&self, filter: Name) -> Result<bool> {
        match self {
            Self::Identity => Ok(false),
            Self::Standard(_) => Ok(true),
            Self::CryptFilter(cf) => cf.is_encrypted_with(filter),
        }
    }

    fn is_owner_authorised(&self) -> bool {
        match self {
            Self::Identity => false,
            Self::Standard(std) => std.is_owner_authorised(),
            Self::CryptFilter(cf) => cf.is_owner_authorised(),
        }
    }
}

/// Result of reading `/Encrypt`: the decrypter plus the flags the document
/// exposes.
#[derive(Debug, Clone)]
pub struct Security {
    pub decrypter: Decrypter,
    /// Raw `/P` value, when present.
    pub permissions: Option<i32>,
    pub encrypt_metadata: bool,
}

impl Security {
    pub fn none() -> Self {
        Self {
            decrypter: Decrypter::Identity,
            permissions: None,
            encrypt_metadata: true,
        }
    }
}

fn get_int(encrypt: &Dictionary, key: &str) -> Result<Option<i64>> {
    dict_get(encrypt, key).map(PdfObject::as_int).transpose()
}

fn get_name(encrypt: &Dictionary, key: &str) -> Result<Option<Name>> {
    dict_get(encrypt, key).map(PdfObject::as_name).transpose()
}

fn get_bytes(encrypt: &Dictionary, key: &str) -> Result<Vec<u8>> {
    let bytes = dict_get(encrypt, key)
        .ok_or_else(|| PdfError::format(0, format!("/Encrypt is missing /{key}")))?
        .as_string()?;
    if bytes.len() != 32 {
        return Err(PdfError::format(
            0,
            format!("/Encrypt /{key} is {} bytes, expected 32", bytes.len()),
        ));
    }
    Ok(bytes.to_vec())
}

/// Build the decrypter for a document.
///
/// `encrypt` is the trailer's `/Encrypt` dictionary with its direct entries
/// resolved; `id0` is the first element of the trailer `/ID`.
pub fn create_decrypter(
    encrypt: Option<&Dictionary>,
    id0: Option<&[u8]>,
    password: &Password,
) -> Result<Security> {
    let Some(encrypt) = encrypt else {
        return Ok(Security::none());
    };

    let filter = get_name(encrypt, "Filter")?
        .ok_or_else(|| PdfError::format(0, "/Encrypt has no /Filter"))?;
    if filter != "Standard" {
        return Err(PdfError::unsupported(format!("security handler {filter:?}")));
    }

    let v = get_int(encrypt, "V")?.unwrap_or(0);
    let length = get_int(encrypt, "Length")?;
    let revision = get_int(encrypt, "R")?
        .ok_or_else(|| PdfError::format(0, "/Encrypt has no /R"))?;
    if !(2..=4).contains(&revision) {
        return Err(PdfError::unsupported(format!("standard handler revision {revision}")));
    }
    let p = get_int(encrypt, "P")?.ok_or_else(|| PdfError::format(0, "/Encrypt has no /P"))?;
    let encrypt_metadata = match dict_get(encrypt, "EncryptMetadata") {
        Some(obj) => obj.as_bool()?,
        None => true,
    };

    let params = StandardParams {
        revision,
        key_bits: 0,
        o: get_bytes(encrypt, "O")?,
        u: get_bytes(encrypt, "U")?,
        // /P is a signed 32-bit field; some writers store it unsigned.
        p: p as i32,
        id0: id0.map(<[u8]>::to_vec).unwrap_or_default(),
        encrypt_metadata,
    };
    let candidates = password.candidates();

    let decrypter = match v {
        1 | 2 => {
            let params = StandardParams {
                key_bits: length.unwrap_or(40) as usize,
                ..params
            };
            Decrypter::Standard(StandardDecrypter::new(Algorithm::Rc4, &params, &candidates)?)
        }
        4 => Decrypter::CryptFilter(create_crypt_filters(encrypt, length, &params, &candidates)?),
        other => {
            return Err(PdfError::unsupported(format!("encryption version /V {other}")));
        }
    };
    tracing::debug!(v, revision, owner = decrypter.is_owner_authorised(), "decrypter ready");

    Ok(Security {
        decrypter,
        permissions: Some(p as i32),
        encrypt_metadata,
    })
}

fn create_crypt_filters(
    encrypt: &Dictionary,
    length: Option<i64>,
    params: &StandardParams,
    candidates: &[Vec<u8>],
) -> Result<CryptFilterDecrypter> {
    let cf = dict_get(encrypt, "CF")
        .ok_or_else(|| PdfError::format(0, "/V 4 encryption requires /CF"))?
        .as_dict()?;

    let mut filters = FxHashMap::default();
    for (name, entry) in cf {
        let entry = entry.as_dict()?;
        let method = get_name(entry, "CFM")?;
        let algorithm = match method.as_ref().map_or("None", Name::as_str) {
            "None" => {
                filters.insert(name.clone(), Decrypter::Identity);
                continue;
            }
            "V2" => Algorithm::Rc4,
            "AESV2" => Algorithm::AesV2,
            other => return Err(PdfError::unsupported(format!("crypt filter method /{other}"))),
        };
        let key_bits = match get_int(entry, "Length")? {
            // /Length in a crypt filter is in bytes; a few writers put bits.
            Some(n) if n <= 32 => n * 8,
            Some(n) => n,
            None => match (length, algorithm) {
                (Some(n), _) => n,
                (None, Algorithm::AesV2) => 128,
                (None, Algorithm::Rc4) => 40,
            },
        };
        let params = StandardParams {
            key_bits: key_bits as usize,
            ..params.clone()
        };
        let sub = StandardDecrypter::new(algorithm, &params, candidates)?;
        filters.insert(name.clone(), Decrypter::Standard(sub));
    }

    let identity = || Name::new("Identity");
    let stream_filter = get_name(encrypt, "StmF")?.unwrap_or_else(identity);
    let string_filter = get_name(encrypt, "StrF")?.unwrap_or_else(identity);
    CryptFilterDecrypter::new(filters, stream_filter, string_filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::objects::dictionary;

    const ID0: [u8; 16] = [
        101, 26, 148, 254, 235, 120, 104, 211, 18, 169, 123, 55, 114, 112, 134, 14,
    ];
    const RC4_128_O: [u8; 32] = [
        208, 72, 209, 82, 158, 83, 93, 24, 132, 205, 56, 86, 54, 123, 24, 75, 74, 144, 223, 1,
        230, 55, 209, 110, 202, 6, 91, 175, 78, 100, 144, 11,
    ];
    const RC4_128_U: [u8; 32] = [
        9, 52, 18, 54, 59, 157, 50, 124, 122, 197, 1, 68, 199, 199, 85, 241, 0, 0, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0,
    ];
    // Owner "bar", user "foo", /R 4, /P -4.
    const AES_O: [u8; 32] = [
        133, 218, 253, 213, 15, 81, 121, 160, 170, 207, 88, 217, 197, 156, 52, 171, 85, 39, 79,
        56, 200, 90, 11, 45, 154, 230, 134, 6, 236, 210, 144, 190,
    ];
    const AES_U: [u8; 32] = [
        37, 29, 194, 206, 246, 125, 184, 71, 222, 155, 27, 64, 168, 104, 227, 137, 0, 0, 0, 0, 0,
        0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0,
    ];

    fn rc4_128_dict() -> Dictionary {
        dictionary([
            ("Filter", PdfObject::name("Standard")),
            ("V", PdfObject::Int(2)),
            ("R", PdfObject::Int(3)),
            ("P", PdfObject::Int(-4)),
            ("Length", PdfObject::Int(128)),
            ("O", PdfObject::String(RC4_128_O.to_vec())),
            ("U", PdfObject::String(RC4_128_U.to_vec())),
        ])
    }

    fn aes_dict() -> Dictionary {
        let std_cf = dictionary([
            ("CFM", PdfObject::name("AESV2")),
            ("Length", PdfObject::Int(16)),
        ]);
        dictionary([
            ("Filter", PdfObject::name("Standard")),
            ("V", PdfObject::Int(4)),
            ("R", PdfObject::Int(4)),
            ("P", PdfObject::Int(-4)),
            ("O", PdfObject::String(AES_O.to_vec())),
            ("U", PdfObject::String(AES_U.to_vec())),
            ("CF", PdfObject::Dict(dictionary([("StdCF", PdfObject::Dict(std_cf))]))),
            ("StmF", PdfObject::name("StdCF")),
            ("StrF", PdfObject::name("StdCF")),
        ])
    }

    #[test]
    fn test_no_encrypt_dict_is_identity() {
        let sec = create_decrypter(None, None, &Password::empty()).unwrap();
        assert!(matches!(sec.decrypter, Decrypter::Identity));
        assert!(!sec.decrypter.is_encrypted());
    }

    #[test]
    fn test_rc4_128_owner_password() {
        let sec = create_decrypter(Some(&rc4_128_dict()), Some(&ID0), &"foo".into()).unwrap();
        let Decrypter::Standard(std) = &sec.decrypter else {
            panic!("expected standard decrypter");
        };
        assert!(std.is_owner_authorised());
        assert_eq!(
            hex::encode(std.general_key()),
            "c2a59ca0a50e5b4ccff13e4bcf0e3b18"
        );
        assert_eq!(sec.permissions, Some(-4));
    }

    #[test]
    fn test_rc4_128_string_decryption() {
        let sec = create_decrypter(Some(&rc4_128_dict()), Some(&ID0), &"baz".into()).unwrap();
        let plain = sec
            .decrypter
            .decrypt_string(ObjectId::new(4, 0), hex::decode("7f3f04a832").unwrap())
            .unwrap();
        assert_eq!(plain, b"Hello");
    }

    #[test]
    fn test_missing_filter_is_format_error() {
        let mut dict = rc4_128_dict();
        dict.remove(&Name::new("Filter"));
        let err = create_decrypter(Some(&dict), Some(&ID0), &Password::empty()).unwrap_err();
        assert!(matches!(err, PdfError::Format { .. }));
    }

    #[test]
    fn test_public_key_handler_is_unsupported() {
        let mut dict = rc4_128_dict();
        dict.insert(Name::new("Filter"), PdfObject::name("Adobe.PubSec"));
        let err = create_decrypter(Some(&dict), Some(&ID0), &Password::empty()).unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedFeature(_)));
    }

    #[test]
    fn test_revision_five_is_unsupported() {
        let mut dict = rc4_128_dict();
        dict.insert(Name::new("R"), PdfObject::Int(5));
        let err = create_decrypter(Some(&dict), Some(&ID0), &Password::empty()).unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedFeature(_)));
    }

    #[test]
    fn test_short_o_value_is_format_error() {
        let mut dict = rc4_128_dict();
        dict.insert(Name::new("O"), PdfObject::String(vec![0; 31]));
        let err = create_decrypter(Some(&dict), Some(&ID0), &Password::empty()).unwrap_err();
        assert!(matches!(err, PdfError::Format { .. }));
    }

    #[test]
    fn test_wrong_password_fails_authentication() {
        let err = create_decrypter(Some(&rc4_128_dict()), Some(&ID0), &"wrong".into()).unwrap_err();
        assert!(matches!(err, PdfError::Authentication));
    }

    #[test]
    fn test_crypt_filter_aes_user_and_owner() {
        let sec = create_decrypter(Some(&aes_dict()), Some(&ID0), &"foo".into()).unwrap();
        assert!(matches!(sec.decrypter, Decrypter::CryptFilter(_)));
        assert!(sec.decrypter.is_encrypted());
        assert!(!sec.decrypter.is_owner_authorised());
        assert!(!sec.decrypter.is_encrypted_with(Name::new("Identity")).unwrap());
        assert!(sec.decrypter.is_encrypted_with(Name::new("StdCF")).unwrap());

        let owner = create_decrypter(Some(&aes_dict()), Some(&ID0), &"bar".into()).unwrap();
        assert!(owner.decrypter.is_owner_authorised());
    }

    #[test]
    fn test_crypt_filter_aes_stream_round_trip() {
        let sec = create_decrypter(Some(&aes_dict()), Some(&ID0), &"foo".into()).unwrap();
        let Decrypter::CryptFilter(cf) = &sec.decrypter else {
            panic!("expected crypt filter decrypter");
        };
        let Decrypter::Standard(std) = cf.filter(&Name::new("StdCF")).unwrap() else {
            panic!("expected standard sub-filter");
        };
        assert_eq!(hex::encode(std.general_key()), "0a43267e0e7fcde048ec5cc6c0fce575");

        let id = ObjectId::new(9, 0);
        let key = std.object_key(id);
        let payload = crate::codec::aes::encrypt_with_iv(&key, &[7u8; 16], b"q 1 0 0 1 0 0 cm Q").unwrap();
        let plain = sec
            .decrypter
            .decrypt_buffer(None, Some(id), Bytes::from(payload))
            .unwrap();
        assert_eq!(&plain[..], b"q 1 0 0 1 0 0 cm Q");
    }

    #[test]
    fn test_identity_cfm_and_identity_default() {
        let mut dict = aes_dict();
        dict.insert(Name::new("StmF"), PdfObject::name("Identity"));
        let sec = create_decrypter(Some(&dict), Some(&ID0), &"foo".into()).unwrap();
        let out = sec
            .decrypter
            .decrypt_buffer(None, Some(ObjectId::new(1, 0)), Bytes::from_static(b"plain"))
            .unwrap();
        assert_eq!(&out[..], b"plain");
    }

    #[test]
    fn test_aesv3_is_unsupported() {
        let mut dict = aes_dict();
        let cf = dictionary([(
            "StdCF",
            PdfObject::Dict(dictionary([("CFM", PdfObject::name("AESV3"))])),
        )]);
        dict.insert(Name::new("CF"), PdfObject::Dict(cf));
        let err = create_decrypter(Some(&dict), Some(&ID0), &"foo".into()).unwrap_err();
        assert!(matches!(err, PdfError::UnsupportedFeature(_)));
    }

    #[test]
    fn test_standard_rejects_named_filter() {
        let sec = create_decrypter(Some(&rc4_128_dict()), Some(&ID0), &"foo".into()).unwrap();
        let err = sec
            .decrypter
            .decrypt_buffer(Some(Name::new("StdCF")), None, Bytes::new())
            .unwrap_err();
        assert!(matches!(err, PdfError::Format { .. }));
    }

    #[test]
    fn test_identity_rejects_named_filter() {
        let err = Decrypter::Identity
            .decrypt_buffer(Some(Name::new("StdCF")), None, Bytes::from_static(b"x"))
            .unwrap_err();
        assert!(matches!(err, PdfError::Format { .. }));
        let out = Decrypter::Identity
            .decrypt_buffer(None, Some(ObjectId::new(3, 0)), Bytes::from_static(b"x"))
            .unwrap();
        assert_eq!(&out[..], b"x");
    }
}
