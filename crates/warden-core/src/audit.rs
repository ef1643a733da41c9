//! Privacy-aware audit writer: hashing, redaction, and field projection.
//!
//! Redaction and whitelist projection are two independent passes, in that
//! order. Redaction scrubs sensitive keys and oversized strings; projection
//! then drops everything outside a small non-sensitive field set whenever
//! verbose logging is off.

use crate::error::CoreError;
use crate::identity::IdentityService;
use log::debug;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use warden_store::{AuditRecord, Store};

/// Sentinel stored in place of sensitive values.
pub const REDACTION_SENTINEL: &str = "***REDACTED***";
/// Marker appended to oversized strings.
pub const STRING_TRUNCATION_MARKER: &str = "...<truncated>";

const SENSITIVE_KEY_PARTS: [&str; 7] = [
    "token",
    "auth",
    "authorization",
    "password",
    "secret",
    "api_key",
    "key",
];
const MAX_STRING_CHARS: usize = 2048;
const WHITELIST_FIELDS: [&str; 6] = [
    "provider",
    "query_hash",
    "success",
    "num_results",
    "tool",
    "result_hash",
];

/// SHA-256 of a text, hex encoded.
pub fn hash_text(value: &str) -> String {
    hex::encode(Sha256::digest(value.as_bytes()))
}

/// Serialize a JSON value with deterministic key order, suitable for
/// hashing. Map keys are sorted by construction.
pub fn canonical_json(value: &Value) -> Result<String, CoreError> {
    Ok(serde_json::to_string(value)?)
}

/// Recursively scrub sensitive keys and truncate oversized strings.
pub fn redact(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut scrubbed = Map::new();
            for (key, item) in map {
                let lowered = key.to_ascii_lowercase();
                if SENSITIVE_KEY_PARTS.iter().any(|part| lowered.contains(part)) {
                    scrubbed.insert(key.clone(), Value::String(REDACTION_SENTINEL.to_string()));
                } else {
                    scrubbed.insert(key.clone(), redact(item));
                }
            }
            Value::Object(scrubbed)
        }
        Value::Array(items) => Value::Array(items.iter().map(redact).collect()),
        Value::String(text) if text.chars().count() > MAX_STRING_CHARS => {
            let kept: String = text.chars().take(MAX_STRING_CHARS).collect();
            Value::String(format!("{kept}{STRING_TRUNCATION_MARKER}"))
        }
        other => other.clone(),
    }
}

/// Keep only whitelisted top-level fields of an object payload.
fn project_whitelist(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut projected = Map::new();
            for field in WHITELIST_FIELDS {
                if let Some(item) = map.get(field) {
                    projected.insert(field.to_string(), item.clone());
                }
            }
            Value::Object(projected)
        }
        other => other,
    }
}

/// Appends events to the audit log under the current privacy settings.
#[derive(Clone)]
pub struct AuditWriter {
    store: Store,
    identity: IdentityService,
}

impl AuditWriter {
    /// Writer over the shared store.
    pub fn new(store: Store, identity: IdentityService) -> Self {
        Self { store, identity }
    }

    /// Append one event. The effective settings are read per write so a
    /// mid-session privacy flip applies immediately.
    pub fn log_event(
        &self,
        event_type: &str,
        summary: &str,
        payload: Value,
        session_id: Option<&str>,
    ) -> Result<(), CoreError> {
        let settings = self.identity.effective_settings()?;
        let mut data = payload;
        if settings.redaction_enabled {
            data = redact(&data);
        }
        if !settings.verbose_logging {
            data = project_whitelist(data);
        }
        debug!("audit event (type={event_type})");
        self.store
            .insert_audit(session_id, event_type, summary, &data)?;
        Ok(())
    }

    /// List recent entries, newest first.
    pub fn list(&self, limit: usize) -> Result<Vec<AuditRecord>, CoreError> {
        Ok(self.store.list_audit(limit)?)
    }
}

#[cfg(test)]
mod tests {
    use super::{AuditWriter, REDACTION_SENTINEL, canonical_json, hash_text, redact};
    use crate::identity::IdentityService;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use warden_store::Store;

    fn writer(store: &Store) -> AuditWriter {
        AuditWriter::new(store.clone(), IdentityService::new(store.clone()))
    }

    #[test]
    fn hash_is_stable_sha256_hex() {
        assert_eq!(
            hash_text("hello"),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn canonical_json_sorts_object_keys() {
        let value = json!({"zeta": 1, "alpha": 2});
        assert_eq!(
            canonical_json(&value).expect("encode"),
            "{\"alpha\":2,\"zeta\":1}"
        );
    }

    #[test]
    fn redaction_scrubs_sensitive_keys_recursively() {
        let payload = json!({
            "provider": "duckduckgo_html",
            "api_key": "sk-live-1234",
            "nested": {"Authorization": "Bearer abc", "note": "fine"},
            "items": [{"password": "hunter2"}],
        });
        let scrubbed = redact(&payload);
        assert_eq!(scrubbed["api_key"], json!(REDACTION_SENTINEL));
        assert_eq!(scrubbed["nested"]["Authorization"], json!(REDACTION_SENTINEL));
        assert_eq!(scrubbed["items"][0]["password"], json!(REDACTION_SENTINEL));
        assert_eq!(scrubbed["nested"]["note"], json!("fine"));
        assert_eq!(scrubbed["provider"], json!("duckduckgo_html"));
    }

    #[test]
    fn redaction_truncates_oversized_strings() {
        let long = "x".repeat(5000);
        let scrubbed = redact(&json!({ "body": long }));
        let body = scrubbed["body"].as_str().expect("string");
        assert_eq!(body.ends_with("...<truncated>"), true);
        assert_eq!(body.chars().count(), 2048 + "...<truncated>".chars().count());
    }

    #[test]
    fn default_logging_projects_to_whitelist() {
        let store = Store::open_in_memory().expect("store");
        writer(&store)
            .log_event(
                "tool.call",
                "Tool file_read executed",
                json!({
                    "tool": "file_read",
                    "result_hash": "abc",
                    "args_sample": "{\"path\": \"/tmp/x\"}",
                }),
                Some("s1"),
            )
            .expect("log");

        let records = store.list_audit(1).expect("list");
        assert_eq!(records[0].payload["tool"], json!("file_read"));
        assert_eq!(records[0].payload.get("args_sample"), None);
    }

    #[test]
    fn verbose_logging_keeps_full_redacted_payload() {
        let store = Store::open_in_memory().expect("store");
        store
            .set_app_setting("verbose_logging", &serde_json::json!(true))
            .expect("setting");
        writer(&store)
            .log_event(
                "tool.call",
                "Tool file_read executed",
                json!({"tool": "file_read", "args_sample": "...", "api_key": "sk-1"}),
                None,
            )
            .expect("log");

        let records = store.list_audit(1).expect("list");
        assert_eq!(records[0].payload["args_sample"], json!("..."));
        assert_eq!(records[0].payload["api_key"], json!(REDACTION_SENTINEL));
    }
}
