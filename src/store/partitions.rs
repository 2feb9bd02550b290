//! Key layout for the Fjall partitions backing each entity.
//!
//! Partition structure:
//! - `users`: user:{id} -> User (JSON); `users_by_username`: {username} -> id
//! - `tokens`: token:{id} -> ApiToken (JSON); `tokens_by_hash`: {token_hash} -> id
//! - `jobs`: job:{id} -> Job (JSON)
//! - `master_keys`: key:{id} -> MasterKey (JSON)
//! - `tenant_keys`: tk:{tenant_id}:{master_key_id} -> TenantKey (JSON)
//! - `secrets`: secret:{tenant_id}:{path}:{key} -> Secret (JSON)

pub fn encode_user_key(id: &str) -> Vec<u8> {
    format!("user:{id}").into_bytes()
}

pub fn encode_username_index(username: &str) -> Vec<u8> {
    format!("username:{username}").into_bytes()
}

pub fn encode_email_index(email: &str) -> Vec<u8> {
    format!("email:{email}").into_bytes()
}

pub fn encode_token_key(id: &str) -> Vec<u8> {
    format!("token:{id}").into_bytes()
}

pub fn encode_token_hash_index(token_hash: &str) -> Vec<u8> {
    format!("hash:{token_hash}").into_bytes()
}

pub fn token_key_prefix() -> &'static [u8] {
    b"token:"
}

pub fn encode_job_key(id: &str) -> Vec<u8> {
    format!("job:{id}").into_bytes()
}

pub fn job_key_prefix() -> &'static [u8] {
    b"job:"
}

pub fn encode_master_key_key(id: &str) -> Vec<u8> {
    format!("key:{id}").into_bytes()
}

pub fn encode_tenant_key_key(tenant_id: &str, master_key_id: &str) -> Vec<u8> {
    format!("tk:{tenant_id}:{master_key_id}").into_bytes()
}

pub fn tenant_key_prefix(tenant_id: &str) -> Vec<u8> {
    format!("tk:{tenant_id}:").into_bytes()
}

pub fn encode_secret_key(tenant_id: &str, path: &str, key: &str) -> Vec<u8> {
    format!("secret:{tenant_id}:{path}:{key}").into_bytes()
}

pub fn secret_path_prefix(tenant_id: &str, path: &str) -> Vec<u8> {
    format!("secret:{tenant_id}:{path}:").into_bytes()
}

pub fn tenant_secrets_prefix(tenant_id: &str) -> Vec<u8> {
    format!("secret:{tenant_id}:").into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_key_roundtrip_shape() {
        let key = encode_job_key("job_123");
        assert_eq!(key, b"job:job_123");
        assert!(key.starts_with(job_key_prefix()));
    }

    #[test]
    fn secret_key_scopes_by_tenant_and_path() {
        let key = encode_secret_key("tenant-a", "ci/aws", "access_key");
        assert_eq!(key, b"secret:tenant-a:ci/aws:access_key");
        assert!(key.starts_with(&secret_path_prefix("tenant-a", "ci/aws")));
    }
}
