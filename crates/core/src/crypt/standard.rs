//! Standard security handler, revisions 2 to 4, with RC4 or AESV2.

use super::PASSWORD_PADDING;
use crate::codec::aes::{decrypt_with_iv, check_key};
use crate::codec::arcfour::Arcfour;
use crate::error::{PdfError, Result};
use crate::model::objects::ObjectId;

/// Cipher applied to strings and streams once a key is derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Rc4,
    AesV2,
}

/// The `/Encrypt` values the standard handler needs, already validated.
#[derive(Debug, Clone)]
pub struct StandardParams {
    pub revision: i64,
    pub key_bits: usize,
    pub o: Vec<u8>,
    pub u: Vec<u8>,
    pub p: i32,
    pub id0: Vec<u8>,
    pub encrypt_metadata: bool,
}

/// A standard-handler decrypter holding an authenticated general key.
#[derive(Debug, Clone)]
pub struct StandardDecrypter {
    algorithm: Algorithm,
    key: Vec<u8>,
    owner_authorised: bool,
}

impl StandardDecrypter {
    /// Authenticate `candidates` against the document and derive the key.
    ///
    /// Each candidate is tried as the owner password first, then as the
    /// user password.
    pub fn new(algorithm: Algorithm, params: &StandardParams, candidates: &[Vec<u8>]) -> Result<Self> {
        if params.key_bits < 40 || params.key_bits > 128 || params.key_bits % 8 != 0 {
            return Err(PdfError::format(
                0,
                format!("invalid encryption key length {}", params.key_bits),
            ));
        }
        let key_len = params.key_len();
        self_test_cipher(algorithm, key_len)?;

        for pw in candidates {
            if let Some(key) = params.check_owner_password(pw)? {
                tracing::debug!(revision = params.revision, "authenticated with owner password");
                return Ok(Self {
                    algorithm,
                    key,
                    owner_authorised: true,
                });
            }
            if let Some(key) = params.check_user_password(pw)? {
                tracing::debug!(revision = params.revision, "authenticated with user password");
                return Ok(Self {
                    algorithm,
                    key,
                    owner_authorised: false,
                });
            }
        }
        Err(PdfError::Authentication)
    }

    pub const fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The document-wide key derived from the authenticated password.
    pub fn general_key(&self) -> &[u8] {
        &self.key
    }

    pub const fn is_owner_authorised(&self) -> bool {
        self.owner_authorised
    }

    /// Key for one object: the general key salted with the object number
    /// and generation.
    pub fn object_key(&self, id: ObjectId) -> Vec<u8> {
        let mut context = md5::Context::new();
        context.consume(&self.key);
        context.consume(&id.num.to_le_bytes()[..3]);
        context.consume(id.generation.to_le_bytes());
        if self.algorithm == Algorithm::AesV2 {
            context.consume(b"sAlT");
        }
        let digest = context.finalize();
        let n = (self.key.len() + 5).min(16);
        digest.0[..n].to_vec()
    }

    /// Decrypt `data` for `owner`, or with the general key when there is no
    /// owning object.
    pub fn decrypt(&self, owner: Option<ObjectId>, data: &[u8]) -> Result<Vec<u8>> {
        let key = match owner {
            Some(id) => self.object_key(id),
            None => self.key.clone(),
        };
        match self.algorithm {
            Algorithm::Rc4 => Ok(Arcfour::new(&key)?.process(data)),
            Algorithm::AesV2 => decrypt_with_iv(&key, data),
        }
    }
}

fn self_test_cipher(algorithm: Algorithm, key_len: usize) -> Result<()> {
    let key = vec![0u8; key_len];
    match algorithm {
        Algorithm::Rc4 => Arcfour::new(&key).map(|_| ()),
        Algorithm::AesV2 => check_key(&key),
    }
}

fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PASSWORD_PADDING[..32 - len]);
    padded
}

fn xor_key(key: &[u8], i: u8) -> Vec<u8> {
    key.iter().map(|b| b ^ i).collect()
}

impl StandardParams {
    pub const fn key_len(&self) -> usize {
        if self.revision == 2 { 5 } else { self.key_bits / 8 }
    }

    /// Algorithm 3.2: the general key for a user password.
    pub fn compute_general_key(&self, password: &[u8]) -> Vec<u8> {
        let mut context = md5::Context::new();
        context.consume(pad_password(password));
        context.consume(&self.o);
        context.consume(self.p.to_le_bytes());
        context.consume(&self.id0);
        if self.revision >= 4 && !self.encrypt_metadata {
            context.consume([0xffu8; 4]);
        }
        let mut hash = context.finalize().0.to_vec();

        let n = self.key_len();
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = md5::compute(&hash[..n]).0.to_vec();
            }
        }
        hash.truncate(n);
        hash
    }

    /// Algorithms 3.4 and 3.5: the expected `/U` value for `key`.
    fn compute_u_value(&self, key: &[u8]) -> Result<Vec<u8>> {
        if self.revision == 2 {
            return Ok(Arcfour::new(key)?.process(&PASSWORD_PADDING));
        }
        let mut context = md5::Context::new();
        context.consume(PASSWORD_PADDING);
        context.consume(&self.id0);
        let hash = context.finalize();
        let mut result = Arcfour::new(key)?.process(&hash.0);
        for i in 1..=19u8 {
            result = Arcfour::new(&xor_key(key, i))?.process(&result);
        }
        Ok(result)
    }

    pub fn check_user_password(&self, password: &[u8]) -> Result<Option<Vec<u8>>> {
        let key = self.compute_general_key(password);
        let u = self.compute_u_value(&key)?;
        // Revisions 3 and 4 only define the first 16 bytes of /U.
        let matches = if self.revision == 2 {
            self.u.len() >= 32 && u[..] == self.u[..32]
        } else {
            self.u.len() >= 16 && u[..16] == self.u[..16]
        };
        Ok(matches.then_some(key))
    }

    /// Algorithm 3.7: recover the user password from `/O` and check it.
    pub fn check_owner_password(&self, password: &[u8]) -> Result<Option<Vec<u8>>> {
        let mut hash = md5::compute(pad_password(password)).0.to_vec();
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = md5::compute(&hash).0.to_vec();
            }
        }
        let key = &hash[..self.key_len()];

        let user_password = if self.revision == 2 {
            Arcfour::new(key)?.process(&self.o)
        } else {
            let mut data = self.o.clone();
            for i in (0..=19u8).rev() {
                data = Arcfour::new(&xor_key(key, i))?.process(&data);
            }
            data
        };
        self.check_user_password(&user_password)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID0: [u8; 16] = [
        101, 26, 148, 254, 235, 120, 104, 211, 18, 169, 123, 55, 114, 112, 134, 14,
    ];
    const RC4_40_O: [u8; 32] = [
        1, 169, 240, 206, 242, 141, 0, 248, 223, 176, 37, 143, 94, 240, 197, 92, 157, 247, 200,
        22, 149, 143, 54, 49, 0, 175, 119, 236, 2, 38, 36, 84,
    ];
    const RC4_40_U: [u8; 32] = [
        105, 75, 157, 162, 248, 9, 199, 124, 114, 119, 140, 251, 202, 194, 4, 129, 178, 114, 5,
        208, 231, 211, 34, 98, 54, 130, 131, 100, 102, 106, 151, 8,
    ];

    fn rc4_40() -> StandardParams {
        StandardParams {
            revision: 2,
            key_bits: 40,
            o: RC4_40_O.to_vec(),
            u: RC4_40_U.to_vec(),
            p: -4,
            id0: ID0.to_vec(),
            encrypt_metadata: true,
        }
    }

    #[test]
    fn test_owner_password_authenticates_as_owner() {
        let d = StandardDecrypter::new(Algorithm::Rc4, &rc4_40(), &[b"foo".to_vec()]).unwrap();
        assert!(d.is_owner_authorised());
        assert_eq!(d.general_key(), [0x11, 0x5e, 0x6a, 0xfd, 0xa4]);
    }

    #[test]
    fn test_user_password_derives_same_key() {
        let d = StandardDecrypter::new(Algorithm::Rc4, &rc4_40(), &[b"baz".to_vec()]).unwrap();
        assert!(!d.is_owner_authorised());
        assert_eq!(d.general_key(), [0x11, 0x5e, 0x6a, 0xfd, 0xa4]);
    }

    #[test]
    fn test_wrong_passwords_fail() {
        let err = StandardDecrypter::new(
            Algorithm::Rc4,
            &rc4_40(),
            &[Vec::new(), b"wrong".to_vec()],
        )
        .unwrap_err();
        assert!(matches!(err, PdfError::Authentication));
    }

    #[test]
    fn test_one_bit_flipped_passwords_fail() {
        for password in [b"ba{", b"fon", b"caz"] {
            let err = StandardDecrypter::new(Algorithm::Rc4, &rc4_40(), &[password.to_vec()]).unwrap_err();
            assert!(matches!(err, PdfError::Authentication));
        }
    }

    #[test]
    fn test_later_candidate_can_succeed() {
        let d = StandardDecrypter::new(Algorithm::Rc4, &rc4_40(), &[b"nope".to_vec(), b"baz".to_vec()]);
        assert!(d.is_ok());
    }

    #[test]
    fn test_object_key_length_is_capped() {
        let d = StandardDecrypter::new(Algorithm::Rc4, &rc4_40(), &[b"baz".to_vec()]).unwrap();
        assert_eq!(d.object_key(ObjectId::new(4, 0)).len(), 10);
    }

    #[test]
    fn test_invalid_key_length_is_format_error() {
        let mut params = rc4_40();
        params.revision = 3;
        params.key_bits = 44;
        let err = StandardDecrypter::new(Algorithm::Rc4, &params, &[Vec::new()]).unwrap_err();
        assert!(matches!(err, PdfError::Format { .. }));
    }

    #[test]
    fn test_aes_with_short_key_is_platform_limitation() {
        let mut params = rc4_40();
        params.revision = 4;
        params.key_bits = 40;
        let err = StandardDecrypter::new(Algorithm::AesV2, &params, &[Vec::new()]).unwrap_err();
        assert!(matches!(err, PdfError::PlatformLimitation(_)));
    }

    #[test]
    fn test_rc4_round_trip_with_object_key() {
        let d = StandardDecrypter::new(Algorithm::Rc4, &rc4_40(), &[b"baz".to_vec()]).unwrap();
        let id = ObjectId::new(7, 0);
        let cipher = Arcfour::new(&d.object_key(id)).unwrap().process(b"secret");
        assert_eq!(d.decrypt(Some(id), &cipher).unwrap(), b"secret");
    }
}
