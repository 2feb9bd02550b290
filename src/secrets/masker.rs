//! Redacts concrete secret values from arbitrary text.
//!
//! One [`Masker`] is created per job, populated with every secret value the
//! job's resolved environment touched, then run across every log line before
//! it is persisted. Values shorter than 3 bytes are never registered —
//! masking them would turn ordinary output into noise.

use std::collections::HashSet;
use std::sync::RwLock;

const REDACTED: &str = "***REDACTED***";
const MIN_LEN: usize = 3;

#[derive(Default)]
pub struct Masker {
    secrets: RwLock<HashSet<String>>,
}

impl Masker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a secret value for redaction. No-op for values shorter than
    /// [`MIN_LEN`] bytes.
    pub fn register(&self, value: impl Into<String>) {
        let value = value.into();
        if value.len() >= MIN_LEN {
            self.secrets.write().unwrap().insert(value);
        }
    }

    pub fn register_all<I: IntoIterator<Item = String>>(&self, values: I) {
        for value in values {
            self.register(value);
        }
    }

    /// Replaces every occurrence of every registered secret in `text`.
    /// Longest values are matched first so that one secret being a prefix of
    /// another doesn't leave a partial match behind.
    pub fn mask(&self, text: &str) -> String {
        let guard = self.secrets.read().unwrap();
        if guard.is_empty() {
            return text.to_string();
        }
        let mut ordered: Vec<&String> = guard.iter().collect();
        ordered.sort_by_key(|s| std::cmp::Reverse(s.len()));

        let mut result = text.to_string();
        for secret in ordered {
            if !result.contains(secret.as_str()) {
                continue;
            }
            result = result.replace(secret.as_str(), REDACTED);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redacts_registered_values() {
        let masker = Masker::new();
        masker.register("ghp_abc123");
        assert_eq!(masker.mask("token=ghp_abc123 ok"), "token=***REDACTED*** ok");
    }

    #[test]
    fn leaves_short_values_unregistered() {
        let masker = Masker::new();
        masker.register("ab");
        assert_eq!(masker.mask("ab"), "ab");
    }

    #[test]
    fn masks_every_occurrence() {
        let masker = Masker::new();
        masker.register("s3cr3t");
        assert_eq!(masker.mask("s3cr3t and s3cr3t again"), "***REDACTED*** and ***REDACTED*** again");
    }

    #[test]
    fn text_without_secrets_is_unchanged() {
        let masker = Masker::new();
        masker.register("s3cr3t");
        assert_eq!(masker.mask("nothing to see here"), "nothing to see here");
    }

    #[test]
    fn longer_secret_masked_before_its_prefix() {
        let masker = Masker::new();
        masker.register("abc");
        masker.register("abcdef");
        assert_eq!(masker.mask("abcdef"), "***REDACTED***");
    }
}
