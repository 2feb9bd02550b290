//! Envelope-encrypted secret storage: master keys, per-tenant data keys,
//! per-secret ciphertexts, plus the resolver and masker the worker uses to
//! materialize and redact secret values at job run time.

pub mod crypto;
pub mod error;
pub mod keyvault;
pub mod local_file;
pub mod masker;
pub mod resolver;
pub mod secret_store;

pub use error::{Result, SecretsError};
pub use keyvault::KeyVault;
pub use local_file::LocalFileVault;
pub use masker::Masker;
pub use resolver::{resolve_env, ResolvedEnv};
pub use secret_store::SecretStore;

/// Parses the `REACTORCIDE_MASTER_KEYS` format: `name1:base64key1,name2:base64key2,...`.
/// The first entry becomes primary on first boot. Empty input yields an
/// empty vec, which tells [`KeyVault::bootstrap`] to auto-generate keys if
/// the store has no existing master key metadata.
pub fn parse_master_keys(raw: &str) -> Result<Vec<(String, [u8; 32])>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    raw.split(',')
        .map(|entry| {
            let (name, encoded) = entry.trim().split_once(':').ok_or_else(|| {
                SecretsError::InvalidIdentifier(format!("malformed master key entry: {entry:?}"))
            })?;
            let key = crypto::decode_key(encoded)?;
            Ok((name.to_string(), key))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_key_list() {
        let a = crypto::encode_key(&FernetKeyFixture::a());
        let b = crypto::encode_key(&FernetKeyFixture::b());
        let raw = format!("primary:{a},secondary:{b}");
        let parsed = parse_master_keys(&raw).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].0, "primary");
        assert_eq!(parsed[1].0, "secondary");
    }

    #[test]
    fn empty_input_yields_empty_vec() {
        assert!(parse_master_keys("").unwrap().is_empty());
        assert!(parse_master_keys("   ").unwrap().is_empty());
    }

    #[test]
    fn rejects_entry_without_colon() {
        assert!(parse_master_keys("noColonHere").is_err());
    }

    struct FernetKeyFixture;
    impl FernetKeyFixture {
        fn a() -> [u8; 32] {
            [1u8; 32]
        }
        fn b() -> [u8; 32] {
            [2u8; 32]
        }
    }
}
