//! Expands `${env:NAME}` and `${secret:PATH:KEY}` references in a job's
//! environment map.
//!
//! Pure with respect to secret storage: the actual lookup is an injected
//! callback, so this module has no knowledge of [`super::secret_store`] and
//! can be exercised with a fake in tests.

use std::collections::HashMap;

use uuid::Uuid;

use super::error::{Result, SecretsError};

pub struct ResolvedEnv {
    pub env: HashMap<String, String>,
    /// Every concrete secret value that appeared in the map, for the caller
    /// to register with a [`super::masker::Masker`].
    pub secret_values: Vec<String>,
}

/// Finds the next `${...}` placeholder starting at or after `from`.
/// Returns `(start, end)` byte offsets spanning `${` through the matching `}`.
fn next_placeholder(value: &str, from: usize) -> Option<(usize, usize)> {
    let start = value[from..].find("${")? + from;
    let end = value[start..].find('}')? + start;
    Some((start, end))
}

fn expand_value(
    value: &str,
    tenant_user_id: Uuid,
    get_secret: &dyn Fn(&str, &str) -> Result<Vec<u8>>,
    secret_values: &mut Vec<String>,
) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut cursor = 0;

    while let Some((start, end)) = next_placeholder(value, cursor) {
        out.push_str(&value[cursor..start]);
        let inner = &value[start + 2..end];

        if let Some(name) = inner.strip_prefix("env:") {
            out.push_str(&std::env::var(name).unwrap_or_default());
        } else if let Some(rest) = inner.strip_prefix("secret:") {
            let (path, key) = rest.split_once(':').ok_or_else(|| {
                SecretsError::InvalidIdentifier(format!("malformed secret reference: {inner:?}"))
            })?;
            let _ = tenant_user_id;
            let raw = get_secret(path, key)?;
            let resolved = String::from_utf8_lossy(&raw).into_owned();
            secret_values.push(resolved.clone());
            out.push_str(&resolved);
        } else {
            // Not a pattern we recognize; keep the placeholder literal.
            out.push_str(&value[start..=end]);
        }

        cursor = end + 1;
    }
    out.push_str(&value[cursor..]);
    Ok(out)
}

fn contains_secret_reference(value: &str) -> bool {
    let mut cursor = 0;
    while let Some((start, end)) = next_placeholder(value, cursor) {
        if value[start + 2..end].starts_with("secret:") {
            return true;
        }
        cursor = end + 1;
    }
    false
}

/// Expands every `${env:...}`/`${secret:...}` reference in `env`.
///
/// If any value references a secret, `requester_user_id` must equal
/// `tenant_user_id` or this returns [`SecretsError::AuthorizationFailure`]
/// without calling `get_secret` at all.
pub fn resolve_env(
    env: &HashMap<String, String>,
    requester_user_id: Uuid,
    tenant_user_id: Uuid,
    get_secret: impl Fn(&str, &str) -> Result<Vec<u8>>,
) -> Result<ResolvedEnv> {
    if env.values().any(|v| contains_secret_reference(v)) && requester_user_id != tenant_user_id {
        return Err(SecretsError::AuthorizationFailure);
    }

    let mut resolved = HashMap::with_capacity(env.len());
    let mut secret_values = Vec::new();
    for (key, value) in env {
        let expanded = expand_value(value, tenant_user_id, &get_secret, &mut secret_values)?;
        resolved.insert(key.clone(), expanded);
    }
    Ok(ResolvedEnv { env: resolved, secret_values })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn expands_env_reference_with_fallback_to_empty() {
        std::env::set_var("RESOLVER_TEST_VAR", "hello");
        let env = map(&[("GREETING", "${env:RESOLVER_TEST_VAR}"), ("MISSING", "${env:RESOLVER_TEST_VAR_NOPE}")]);
        let tenant = Uuid::now_v7();
        let resolved = resolve_env(&env, tenant, tenant, |_, _| unreachable!()).unwrap();
        assert_eq!(resolved.env["GREETING"], "hello");
        assert_eq!(resolved.env["MISSING"], "");
        assert!(resolved.secret_values.is_empty());
    }

    #[test]
    fn expands_secret_reference_and_collects_value_for_masking() {
        let env = map(&[("TOKEN", "${secret:ci/github:token}")]);
        let tenant = Uuid::now_v7();
        let resolved = resolve_env(&env, tenant, tenant, |path, key| {
            assert_eq!(path, "ci/github");
            assert_eq!(key, "token");
            Ok(b"ghp_abc".to_vec())
        })
        .unwrap();
        assert_eq!(resolved.env["TOKEN"], "ghp_abc");
        assert_eq!(resolved.secret_values, vec!["ghp_abc".to_string()]);
    }

    #[test]
    fn rejects_cross_tenant_secret_access() {
        let env = map(&[("TOKEN", "${secret:ci/github:token}")]);
        let requester = Uuid::now_v7();
        let tenant = Uuid::now_v7();
        let result = resolve_env(&env, requester, tenant, |_, _| unreachable!());
        assert!(matches!(result, Err(SecretsError::AuthorizationFailure)));
    }

    #[test]
    fn supports_interpolation_within_a_larger_string() {
        let env = map(&[("URL", "https://${env:RESOLVER_TEST_VAR}.example.com")]);
        std::env::set_var("RESOLVER_TEST_VAR", "api");
        let tenant = Uuid::now_v7();
        let resolved = resolve_env(&env, tenant, tenant, |_, _| unreachable!()).unwrap();
        assert_eq!(resolved.env["URL"], "https://api.example.com");
    }

    #[test]
    fn plain_values_pass_through_unchanged() {
        let env = map(&[("FOO", "bar")]);
        let tenant = Uuid::now_v7();
        let resolved = resolve_env(&env, tenant, tenant, |_, _| unreachable!()).unwrap();
        assert_eq!(resolved.env["FOO"], "bar");
    }
}
