//! Tenant-scoped secret CRUD, encrypting values under the tenant's
//! data-encryption key before they ever reach the store.

use chrono::Utc;
use uuid::Uuid;

use crate::store::{Secret, Store};

use super::crypto::{decode_token, encode_token, FernetKey};
use super::error::{Result, SecretsError};
use super::keyvault::KeyVault;

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | '_' | '-')
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-')
}

fn validate_path(value: &str) -> Result<()> {
    if value.is_empty() || !value.chars().all(is_path_char) {
        return Err(SecretsError::InvalidIdentifier(format!("invalid path: {value:?}")));
    }
    Ok(())
}

fn validate_key(value: &str) -> Result<()> {
    if value.is_empty() || !value.chars().all(is_key_char) {
        return Err(SecretsError::InvalidIdentifier(format!("invalid key: {value:?}")));
    }
    Ok(())
}

pub struct SecretStore<'a> {
    store: &'a Store,
    vault: &'a KeyVault,
}

impl<'a> SecretStore<'a> {
    pub fn new(store: &'a Store, vault: &'a KeyVault) -> Self {
        Self { store, vault }
    }

    pub fn put(&self, tenant_user_id: Uuid, path: &str, key: &str, plaintext: &[u8]) -> Result<()> {
        validate_path(path)?;
        validate_key(key)?;

        let dek = self.vault.tenant_key(self.store, tenant_user_id)?;
        let cipher = FernetKey::from_bytes(&dek);
        let ciphertext = encode_token(&cipher.encrypt(plaintext));

        let now = Utc::now();
        let existing = self.store.get_secret(tenant_user_id, path, key)?;
        let secret = Secret {
            id: existing.as_ref().map(|s| s.id).unwrap_or_else(Uuid::now_v7),
            tenant_user_id,
            path: path.to_string(),
            key: key.to_string(),
            ciphertext,
            created_at: existing.map(|s| s.created_at).unwrap_or(now),
            updated_at: now,
        };
        self.store.upsert_secret(&secret)?;
        Ok(())
    }

    pub fn get(&self, tenant_user_id: Uuid, path: &str, key: &str) -> Result<Vec<u8>> {
        validate_path(path)?;
        validate_key(key)?;

        let secret = self
            .store
            .get_secret(tenant_user_id, path, key)?
            .ok_or_else(|| SecretsError::NotFound { path: path.to_string(), key: key.to_string() })?;

        let dek = self.vault.tenant_key(self.store, tenant_user_id)?;
        let cipher = FernetKey::from_bytes(&dek);
        let token = decode_token(&secret.ciphertext)?;
        cipher.decrypt(&token)
    }

    /// Deletes the secret at `(path, key)` if present. Returns whether a row
    /// actually existed, so callers can distinguish a no-op delete from a
    /// real one (spec.md §8: `Delete(p,k) == true` then `== false`).
    pub fn delete(&self, tenant_user_id: Uuid, path: &str, key: &str) -> Result<bool> {
        validate_path(path)?;
        validate_key(key)?;

        let existed = self.store.get_secret(tenant_user_id, path, key)?.is_some();
        if existed {
            self.store.delete_secret(tenant_user_id, path, key)?;
        }
        Ok(existed)
    }

    /// Keys present at `path`, without decrypting any values — used to
    /// populate listing endpoints and overlay-merge lookups.
    pub fn list_keys(&self, tenant_user_id: Uuid, path: &str) -> Result<Vec<String>> {
        validate_path(path)?;
        Ok(self
            .store
            .list_secrets_for_path(tenant_user_id, path)?
            .into_iter()
            .map(|s| s.key)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open() -> (Store, TempDir) {
        let dir = TempDir::new().unwrap();
        (Store::open(dir.path().join("store")).unwrap(), dir)
    }

    #[test]
    fn put_then_get_round_trips() {
        let (store, _dir) = open();
        let vault = KeyVault::bootstrap(&store, vec![]).unwrap();
        let secrets = SecretStore::new(&store, &vault);
        let tenant = Uuid::now_v7();

        secrets.put(tenant, "ci/github", "token", b"ghp_abc123").unwrap();
        let value = secrets.get(tenant, "ci/github", "token").unwrap();
        assert_eq!(value, b"ghp_abc123");
    }

    #[test]
    fn missing_secret_is_not_found() {
        let (store, _dir) = open();
        let vault = KeyVault::bootstrap(&store, vec![]).unwrap();
        let secrets = SecretStore::new(&store, &vault);
        let result = secrets.get(Uuid::now_v7(), "ci/github", "token");
        assert!(matches!(result, Err(SecretsError::NotFound { .. })));
    }

    #[test]
    fn rejects_path_traversal() {
        let (store, _dir) = open();
        let vault = KeyVault::bootstrap(&store, vec![]).unwrap();
        let secrets = SecretStore::new(&store, &vault);
        let result = secrets.put(Uuid::now_v7(), "../etc/passwd", "token", b"x");
        assert!(matches!(result, Err(SecretsError::InvalidIdentifier(_))));
    }

    #[test]
    fn get_delete_and_list_keys_reject_invalid_path_or_key_before_touching_the_store() {
        let (store, _dir) = open();
        let vault = KeyVault::bootstrap(&store, vec![]).unwrap();
        let secrets = SecretStore::new(&store, &vault);
        let tenant = Uuid::now_v7();

        assert!(matches!(secrets.get(tenant, "", "token"), Err(SecretsError::InvalidIdentifier(_))));
        assert!(matches!(secrets.get(tenant, "../etc/passwd", "token"), Err(SecretsError::InvalidIdentifier(_))));
        assert!(matches!(secrets.get(tenant, "ci/github", ""), Err(SecretsError::InvalidIdentifier(_))));

        assert!(matches!(secrets.delete(tenant, "", "token"), Err(SecretsError::InvalidIdentifier(_))));
        assert!(matches!(secrets.delete(tenant, "ci/github", "bad key"), Err(SecretsError::InvalidIdentifier(_))));

        assert!(matches!(secrets.list_keys(tenant, ""), Err(SecretsError::InvalidIdentifier(_))));
        assert!(matches!(secrets.list_keys(tenant, "../etc"), Err(SecretsError::InvalidIdentifier(_))));
    }

    #[test]
    fn delete_reports_whether_a_secret_existed() {
        let (store, _dir) = open();
        let vault = KeyVault::bootstrap(&store, vec![]).unwrap();
        let secrets = SecretStore::new(&store, &vault);
        let tenant = Uuid::now_v7();

        secrets.put(tenant, "ci/github", "token", b"ghp_abc123").unwrap();
        assert!(secrets.delete(tenant, "ci/github", "token").unwrap());
        assert!(matches!(
            secrets.get(tenant, "ci/github", "token"),
            Err(SecretsError::NotFound { .. })
        ));
        assert!(!secrets.delete(tenant, "ci/github", "token").unwrap());
    }

    #[test]
    fn update_preserves_created_at() {
        let (store, _dir) = open();
        let vault = KeyVault::bootstrap(&store, vec![]).unwrap();
        let secrets = SecretStore::new(&store, &vault);
        let tenant = Uuid::now_v7();

        secrets.put(tenant, "ci/github", "token", b"first").unwrap();
        let created_at = store.get_secret(tenant, "ci/github", "token").unwrap().unwrap().created_at;

        secrets.put(tenant, "ci/github", "token", b"second").unwrap();
        let after = store.get_secret(tenant, "ci/github", "token").unwrap().unwrap();
        assert_eq!(after.created_at, created_at);
        assert_eq!(secrets.get(tenant, "ci/github", "token").unwrap(), b"second");
    }
}
