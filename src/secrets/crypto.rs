//! Fernet-style authenticated encryption token.
//!
//! Wire format (bit-exact, see `SPEC_FULL.md` §4.3):
//!
//! ```text
//! token = 0x80 || timestamp:8 (big-endian) || iv:16 || ciphertext || hmac:32
//! hmac  = HMAC-SHA256(signing_key, token[..len-32])
//! ```
//!
//! The 32-byte key is split `signing_key = key[0..16]`, `encryption_key =
//! key[16..32]`. Payload encryption is AES-128-CBC with PKCS7 padding. Every
//! failure mode — bad version byte, short token, bad HMAC, bad padding —
//! collapses to [`SecretsError::AuthenticationFailure`] so a caller can never
//! distinguish *why* a token failed to authenticate.

use aes::Aes128;
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use subtle::ConstantTimeEq;

use super::error::{SecretsError, Result};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type HmacSha256 = Hmac<Sha256>;

const VERSION: u8 = 0x80;
/// version(1) + ts(8) + iv(16) + ciphertext(>=16, one PKCS7 block minimum) + hmac(32).
const MIN_TOKEN_LEN: usize = 1 + 8 + 16 + 16 + 32;

/// A 32-byte AES/HMAC key pair, split per the Fernet convention.
pub struct FernetKey {
    signing_key: [u8; 16],
    encryption_key: [u8; 16],
}

impl FernetKey {
    pub fn from_bytes(key: &[u8; 32]) -> Self {
        let mut signing_key = [0u8; 16];
        let mut encryption_key = [0u8; 16];
        signing_key.copy_from_slice(&key[0..16]);
        encryption_key.copy_from_slice(&key[16..32]);
        Self { signing_key, encryption_key }
    }

    pub fn generate() -> [u8; 32] {
        let mut key = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut key);
        key
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Vec<u8> {
        self.encrypt_at(plaintext, chrono::Utc::now().timestamp() as u64)
    }

    fn encrypt_at(&self, plaintext: &[u8], timestamp: u64) -> Vec<u8> {
        let mut iv = [0u8; 16];
        rand::rngs::OsRng.fill_bytes(&mut iv);

        let ciphertext = Aes128CbcEnc::new(&self.encryption_key.into(), &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

        let mut token = Vec::with_capacity(MIN_TOKEN_LEN + ciphertext.len());
        token.push(VERSION);
        token.extend_from_slice(&timestamp.to_be_bytes());
        token.extend_from_slice(&iv);
        token.extend_from_slice(&ciphertext);

        let mut mac = HmacSha256::new_from_slice(&self.signing_key).expect("hmac accepts any key length");
        mac.update(&token);
        let tag = mac.finalize().into_bytes();
        token.extend_from_slice(&tag);

        token
    }

    pub fn decrypt(&self, token: &[u8]) -> Result<Vec<u8>> {
        if token.len() < MIN_TOKEN_LEN {
            return Err(SecretsError::AuthenticationFailure);
        }
        if token[0] != VERSION {
            return Err(SecretsError::AuthenticationFailure);
        }

        let (body, expected_tag) = token.split_at(token.len() - 32);

        let mut mac = HmacSha256::new_from_slice(&self.signing_key).expect("hmac accepts any key length");
        mac.update(body);
        let actual_tag = mac.finalize().into_bytes();

        if actual_tag.ct_eq(expected_tag).unwrap_u8() != 1 {
            return Err(SecretsError::AuthenticationFailure);
        }

        let iv = &body[9..25];
        let ciphertext = &body[25..];

        let mut iv_arr = [0u8; 16];
        iv_arr.copy_from_slice(iv);

        Aes128CbcDec::new(&self.encryption_key.into(), &iv_arr.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| SecretsError::AuthenticationFailure)
    }
}

/// Encodes a 32-byte key as URL-safe base64 for storage/transport.
pub fn encode_key(key: &[u8; 32]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(key)
}

/// Decodes a URL-safe base64 key back to 32 raw bytes.
pub fn decode_key(encoded: &str) -> Result<[u8; 32]> {
    use base64::Engine;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| SecretsError::AuthenticationFailure)?;
    if bytes.len() != 32 {
        return Err(SecretsError::AuthenticationFailure);
    }
    let mut arr = [0u8; 32];
    arr.copy_from_slice(&bytes);
    Ok(arr)
}

/// Encodes a ciphertext token as URL-safe base64 for storage as a string field.
pub fn encode_token(token: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(token)
}

pub fn decode_token(encoded: &str) -> Result<Vec<u8>> {
    use base64::Engine;
    base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(encoded)
        .map_err(|_| SecretsError::AuthenticationFailure)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_plaintext() {
        let key = FernetKey::from_bytes(&FernetKey::generate());
        let token = key.encrypt(b"hunter2");
        let plaintext = key.decrypt(&token).unwrap();
        assert_eq!(plaintext, b"hunter2");
    }

    #[test]
    fn rejects_tampered_ciphertext() {
        let key = FernetKey::from_bytes(&FernetKey::generate());
        let mut token = key.encrypt(b"hunter2");
        let last = token.len() - 40;
        token[last] ^= 0xFF;
        assert!(matches!(key.decrypt(&token), Err(SecretsError::AuthenticationFailure)));
    }

    #[test]
    fn rejects_wrong_key() {
        let key_a = FernetKey::from_bytes(&FernetKey::generate());
        let key_b = FernetKey::from_bytes(&FernetKey::generate());
        let token = key_a.encrypt(b"hunter2");
        assert!(matches!(key_b.decrypt(&token), Err(SecretsError::AuthenticationFailure)));
    }

    #[test]
    fn rejects_short_token() {
        let key = FernetKey::from_bytes(&FernetKey::generate());
        assert!(matches!(key.decrypt(&[0x80, 1, 2, 3]), Err(SecretsError::AuthenticationFailure)));
    }

    #[test]
    fn rejects_token_shorter_than_73_bytes() {
        let key = FernetKey::from_bytes(&FernetKey::generate());
        let short = vec![0u8; 72];
        assert!(matches!(key.decrypt(&short), Err(SecretsError::AuthenticationFailure)));
    }

    #[test]
    fn rejects_bad_version_byte() {
        let key = FernetKey::from_bytes(&FernetKey::generate());
        let mut token = key.encrypt(b"hunter2");
        token[0] = 0x7F;
        assert!(matches!(key.decrypt(&token), Err(SecretsError::AuthenticationFailure)));
    }

    #[test]
    fn key_encoding_roundtrips() {
        let key = FernetKey::generate();
        let encoded = encode_key(&key);
        let decoded = decode_key(&encoded).unwrap();
        assert_eq!(key, decoded);
    }
}
