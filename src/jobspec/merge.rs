//! Deterministic overlay merge: deep for maps, replace for scalars and
//! sequences, with per-key secret-override detection on `environment`.

use std::collections::HashMap;

use serde_json::Value;

use super::model::{JobSpec, SecretOverride};

/// One named layer in the merge: `"base"` or an overlay's identifying label
/// (filename or caller-supplied tag), paired with its parsed document.
pub struct Layer {
    pub label: String,
    pub document: Value,
}

fn is_secret_reference(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.starts_with("${secret:") && trimmed.ends_with('}')
}

/// Deep-merges `overlay` onto `base` in place: maps merge key-by-key,
/// everything else (scalars, arrays) is replaced wholesale by the overlay's
/// value when present.
fn deep_merge(base: &mut Value, overlay: &Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                match base_map.get_mut(key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => {
                        base_map.insert(key.clone(), overlay_value.clone());
                    }
                }
            }
        }
        (base_slot, overlay_value) => {
            *base_slot = overlay_value.clone();
        }
    }
}

/// Merges `base` with `overlays` listed in **decreasing priority order**
/// (the spec's convention: `overlays[0]` wins over `overlays[1]`, and both
/// win over `base`). Returns the merged document plus every `SecretOverride`
/// detected along the way.
///
/// Merging `base` with an empty overlay list returns `base` unchanged
/// (spec.md §8's idempotence property).
pub fn merge_layers(base: Layer, overlays: Vec<Layer>) -> (Value, Vec<SecretOverride>) {
    // Fold from lowest to highest priority so the highest-priority overlay
    // is applied last and wins.
    let mut ordered: Vec<&Layer> = overlays.iter().rev().collect();
    ordered.push(&base);
    ordered.reverse(); // base first, then overlays lowest-to-highest priority

    let mut merged = ordered[0].document.clone();
    let mut env_history: HashMap<String, Vec<(String, String)>> = HashMap::new();
    record_env_layer(&ordered[0].label, &ordered[0].document, &mut env_history);

    for layer in &ordered[1..] {
        deep_merge(&mut merged, &layer.document);
        record_env_layer(&layer.label, &layer.document, &mut env_history);
    }

    let overrides = detect_overrides(&env_history);
    (merged, overrides)
}

fn record_env_layer(label: &str, document: &Value, history: &mut HashMap<String, Vec<(String, String)>>) {
    let Some(env) = document.get("environment").and_then(Value::as_object) else {
        return;
    };
    for (key, value) in env {
        if let Some(s) = value.as_str() {
            history.entry(key.clone()).or_default().push((label.to_string(), s.to_string()));
        }
    }
}

/// Walks each environment key's per-layer value history, lowest to highest
/// priority, and emits a [`SecretOverride`] every time a secret-reference
/// value is followed by a literal (non-secret-reference) value.
fn detect_overrides(history: &HashMap<String, Vec<(String, String)>>) -> Vec<SecretOverride> {
    let mut overrides = Vec::new();
    for (key, values) in history {
        let mut saw_secret = false;
        for (label, value) in values {
            if is_secret_reference(value) {
                saw_secret = true;
            } else if saw_secret {
                overrides.push(SecretOverride { overlay: label.clone(), key: key.clone() });
                saw_secret = false;
            }
        }
    }
    overrides.sort_by(|a, b| (a.overlay.as_str(), a.key.as_str()).cmp(&(b.overlay.as_str(), b.key.as_str())));
    overrides
}

pub fn to_job_spec(document: &Value) -> super::error::Result<JobSpec> {
    serde_json::from_value(document.clone())
        .map_err(|e| super::error::JobSpecError::InvalidDocument(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn layer(label: &str, document: Value) -> Layer {
        Layer { label: label.to_string(), document }
    }

    #[test]
    fn empty_overlay_list_is_identity() {
        let base = json!({"name": "job", "environment": {"FOO": "bar"}});
        let (merged, overrides) = merge_layers(layer("base", base.clone()), vec![]);
        assert_eq!(merged, base);
        assert!(overrides.is_empty());
    }

    #[test]
    fn overlay_deep_merges_maps_and_replaces_scalars() {
        let base = json!({"name": "base-job", "environment": {"A": "1", "B": "2"}});
        let overlay = json!({"name": "overlay-job", "environment": {"B": "overridden"}});
        let (merged, _) = merge_layers(layer("base", base), vec![layer("o1.yaml", overlay)]);
        assert_eq!(merged["name"], "overlay-job");
        assert_eq!(merged["environment"]["A"], "1");
        assert_eq!(merged["environment"]["B"], "overridden");
    }

    #[test]
    fn first_listed_overlay_has_highest_precedence() {
        let base = json!({"environment": {"A": "base"}});
        let o2 = json!({"environment": {"A": "from-o2"}});
        let o1 = json!({"environment": {"A": "from-o1"}});
        // overlays passed in decreasing-priority order: o1 (highest), o2
        let (merged, _) = merge_layers(layer("base", base), vec![layer("o1", o1), layer("o2", o2)]);
        assert_eq!(merged["environment"]["A"], "from-o1");
    }

    #[test]
    fn detects_secret_override_when_overlay_replaces_secret_reference_with_literal() {
        let base = json!({"environment": {"PG_PASS": "${secret:db:pass}"}});
        let overlay = json!({"environment": {"PG_PASS": "literal"}});
        let (_, overrides) = merge_layers(layer("base", base), vec![layer("prod.yaml", overlay)]);
        assert_eq!(overrides, vec![SecretOverride { overlay: "prod.yaml".into(), key: "PG_PASS".into() }]);
    }

    #[test]
    fn no_override_when_overlay_value_is_also_a_secret_reference() {
        let base = json!({"environment": {"PG_PASS": "${secret:db:pass}"}});
        let overlay = json!({"environment": {"PG_PASS": "${secret:db:other_pass}"}});
        let (_, overrides) = merge_layers(layer("base", base), vec![layer("prod.yaml", overlay)]);
        assert!(overrides.is_empty());
    }
}
