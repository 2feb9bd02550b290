//! Local-file secrets backend.
//!
//! An alternative to the database-backed [`SecretStore`](super::secret_store::SecretStore)
//! for single-user / local-development deployments where running a database
//! (even the embedded one) is overkill. The whole secret tree is held as one
//! JSON document, `{path: {key: value}}`, encrypted as a single Fernet-style
//! blob with a key derived from a user-supplied password via scrypt. The salt
//! is written alongside the ciphertext file, in the clear, under
//! `$XDG_CONFIG_HOME/reactorcide/secrets`, with directory/file permissions
//! locked down to the owner.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use base64::{engine::general_purpose::STANDARD, Engine};
use rand::RngCore;
use scrypt::{scrypt, Params};

use super::crypto::{decode_token, encode_token, FernetKey};
use super::error::{Result, SecretsError};

const SALT_FILE: &str = "salt";
const BLOB_FILE: &str = "secrets.json.enc";
const SCRYPT_LOG_N: u8 = 18;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

type Tree = HashMap<String, HashMap<String, String>>;

fn default_root() -> Result<PathBuf> {
    let base = dirs::config_dir().ok_or_else(|| {
        SecretsError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "no XDG config directory"))
    })?;
    Ok(base.join("reactorcide").join("secrets"))
}

#[cfg(unix)]
fn lock_down_dir(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    Ok(())
}

#[cfg(not(unix))]
fn lock_down_dir(_path: &Path) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn lock_down_file(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    Ok(())
}

#[cfg(not(unix))]
fn lock_down_file(_path: &Path) -> Result<()> {
    Ok(())
}

/// Derives a 32-byte key from a password and salt using scrypt with
/// conservative interactive-login parameters (N=2^18, r=8, p=1).
fn derive_key(password: &str, salt: &[u8]) -> Result<[u8; 32]> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, 32)
        .map_err(|_| SecretsError::AuthenticationFailure)?;
    let mut out = [0u8; 32];
    scrypt(password.as_bytes(), salt, &params, &mut out).map_err(|_| SecretsError::AuthenticationFailure)?;
    Ok(out)
}

pub struct LocalFileVault {
    root: PathBuf,
    cipher: FernetKey,
}

impl LocalFileVault {
    pub fn open(password: &str) -> Result<Self> {
        Self::open_at(default_root()?, password)
    }

    pub fn open_at(root: PathBuf, password: &str) -> Result<Self> {
        fs::create_dir_all(&root)?;
        lock_down_dir(&root)?;

        let salt_path = root.join(SALT_FILE);
        let salt = if salt_path.exists() {
            fs::read(&salt_path)?
        } else {
            let mut salt = vec![0u8; 32];
            rand::rngs::OsRng.fill_bytes(&mut salt);
            fs::write(&salt_path, &salt)?;
            lock_down_file(&salt_path)?;
            salt
        };

        let key = derive_key(password, &salt)?;
        Ok(Self { root, cipher: FernetKey::from_bytes(&key) })
    }

    fn blob_path(&self) -> PathBuf {
        self.root.join(BLOB_FILE)
    }

    fn load_tree(&self) -> Result<Tree> {
        let path = self.blob_path();
        if !path.exists() {
            return Ok(Tree::new());
        }
        let contents = fs::read_to_string(&path)?;
        let token = decode_token(contents.trim())?;
        let plaintext = self.cipher.decrypt(&token)?;
        serde_json::from_slice(&plaintext).map_err(SecretsError::from)
    }

    fn save_tree(&self, tree: &Tree) -> Result<()> {
        let plaintext = serde_json::to_vec(tree)?;
        let token = encode_token(&self.cipher.encrypt(&plaintext));
        let path = self.blob_path();
        fs::write(&path, token)?;
        lock_down_file(&path)?;
        Ok(())
    }

    pub fn put(&self, path: &str, key: &str, plaintext: &[u8]) -> Result<()> {
        let mut tree = self.load_tree()?;
        tree.entry(path.to_string()).or_default().insert(key.to_string(), STANDARD.encode(plaintext));
        self.save_tree(&tree)
    }

    pub fn get(&self, path: &str, key: &str) -> Result<Vec<u8>> {
        let tree = self.load_tree()?;
        let encoded = tree
            .get(path)
            .and_then(|keys| keys.get(key))
            .ok_or_else(|| SecretsError::NotFound { path: path.to_string(), key: key.to_string() })?;
        STANDARD.decode(encoded).map_err(|_| SecretsError::AuthenticationFailure)
    }

    pub fn delete(&self, path: &str, key: &str) -> Result<()> {
        let mut tree = self.load_tree()?;
        if let Some(keys) = tree.get_mut(path) {
            keys.remove(key);
            if keys.is_empty() {
                tree.remove(path);
            }
        }
        self.save_tree(&tree)
    }

    pub fn list_keys(&self, path: &str) -> Result<Vec<String>> {
        let tree = self.load_tree()?;
        Ok(tree.get(path).map(|keys| keys.keys().cloned().collect()).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn put_then_get_round_trips() {
        let dir = TempDir::new().unwrap();
        let vault = LocalFileVault::open_at(dir.path().to_path_buf(), "correct horse battery staple").unwrap();
        vault.put("ci/github", "token", b"ghp_abc").unwrap();
        assert_eq!(vault.get("ci/github", "token").unwrap(), b"ghp_abc");
    }

    #[test]
    fn multiple_keys_share_the_same_blob() {
        let dir = TempDir::new().unwrap();
        let vault = LocalFileVault::open_at(dir.path().to_path_buf(), "pw").unwrap();
        vault.put("ci/github", "token", b"a").unwrap();
        vault.put("ci/github", "org", b"b").unwrap();
        vault.put("ci/gitlab", "token", b"c").unwrap();

        assert!(!dir.path().join("token.secret").exists());
        assert!(dir.path().join("secrets.json.enc").exists());

        let mut keys = vault.list_keys("ci/github").unwrap();
        keys.sort();
        assert_eq!(keys, vec!["org".to_string(), "token".to_string()]);
        assert_eq!(vault.get("ci/gitlab", "token").unwrap(), b"c");
    }

    #[test]
    fn wrong_password_fails_to_authenticate() {
        let dir = TempDir::new().unwrap();
        let vault = LocalFileVault::open_at(dir.path().to_path_buf(), "correct horse battery staple").unwrap();
        vault.put("ci/github", "token", b"ghp_abc").unwrap();

        let other = LocalFileVault::open_at(dir.path().to_path_buf(), "wrong password").unwrap();
        assert!(matches!(other.get("ci/github", "token"), Err(SecretsError::AuthenticationFailure)));
    }

    #[test]
    fn missing_secret_is_not_found() {
        let dir = TempDir::new().unwrap();
        let vault = LocalFileVault::open_at(dir.path().to_path_buf(), "pw").unwrap();
        assert!(matches!(vault.get("ci/github", "token"), Err(SecretsError::NotFound { .. })));
    }

    #[test]
    fn reopening_with_same_password_recovers_secrets() {
        let dir = TempDir::new().unwrap();
        {
            let vault = LocalFileVault::open_at(dir.path().to_path_buf(), "pw").unwrap();
            vault.put("ci/github", "token", b"ghp_abc").unwrap();
        }
        let vault = LocalFileVault::open_at(dir.path().to_path_buf(), "pw").unwrap();
        assert_eq!(vault.get("ci/github", "token").unwrap(), b"ghp_abc");
    }

    #[test]
    fn delete_removes_key_but_keeps_siblings() {
        let dir = TempDir::new().unwrap();
        let vault = LocalFileVault::open_at(dir.path().to_path_buf(), "pw").unwrap();
        vault.put("ci/github", "token", b"a").unwrap();
        vault.put("ci/github", "org", b"b").unwrap();

        vault.delete("ci/github", "token").unwrap();
        assert!(matches!(vault.get("ci/github", "token"), Err(SecretsError::NotFound { .. })));
        assert_eq!(vault.get("ci/github", "org").unwrap(), b"b");
    }
}
