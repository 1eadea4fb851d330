//! Dedup cache for push synchronization.
//!
//! Suppresses redundant re-submission of unchanged payloads to the
//! downstream consumer. The cache is an explicit, injectable object
//! with process-scoped lifetime — not persisted across runs, so a
//! restart always re-sends on first contact. It is shared across
//! sequential calls only; callers that parallelize must add their own
//! synchronization around it.

use std::collections::HashMap;

use serde_json::Value;
use sha2::{Digest, Sha256};

/// How fingerprints are derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FingerprintMode {
    /// SHA-256 over canonical JSON plus the operation name.
    #[default]
    ContentHash,
    /// The payload's `idempotency_token` string field is the
    /// fingerprint. Used by test/stub consumers that supply their own
    /// tokens.
    Token,
}

/// Process-local cache of the last payload sent per resource.
#[derive(Debug, Clone, Default)]
pub struct DedupCache {
    mode: FingerprintMode,
    sent: HashMap<String, String>,
}

impl DedupCache {
    /// Create a content-hashing cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a cache with an explicit fingerprint mode.
    #[must_use]
    pub fn with_mode(mode: FingerprintMode) -> Self {
        Self {
            mode,
            sent: HashMap::new(),
        }
    }

    /// Whether an identical `(payload, operation)` pair was already
    /// sent for `resource_id`.
    ///
    /// Returns `true` without touching the cache when the fingerprint
    /// matches what was last sent; otherwise stores the new
    /// fingerprint and returns `false` so the caller proceeds.
    pub fn already_sent(&mut self, resource_id: &str, payload: &Value, operation: &str) -> bool {
        let fingerprint = self.fingerprint(payload, operation);
        if self.sent.get(resource_id) == Some(&fingerprint) {
            return true;
        }
        self.sent.insert(resource_id.to_string(), fingerprint);
        false
    }

    /// Forget everything. For tests and for callers that want a
    /// clean slate without rebuilding the cache.
    pub fn reset(&mut self) {
        self.sent.clear();
    }

    /// Number of resources with a recorded fingerprint.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sent.len()
    }

    /// Whether the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }

    fn fingerprint(&self, payload: &Value, operation: &str) -> String {
        match self.mode {
            FingerprintMode::ContentHash => {
                let canonical = canonical_json(payload);
                let mut hasher = Sha256::new();
                hasher.update(canonical.as_bytes());
                hasher.update(operation.as_bytes());
                hex::encode(hasher.finalize())
            }
            FingerprintMode::Token => {
                let token = payload
                    .get("idempotency_token")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                format!("{operation}:{token}")
            }
        }
    }
}

/// Serialize with sorted object keys so identical payloads produce
/// identical fingerprints regardless of field order.
fn canonical_json(value: &Value) -> String {
    serde_json::to_string(&sort_keys(value)).unwrap_or_default()
}

fn sort_keys(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: serde_json::Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), sort_keys(v)))
                .collect();
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(sort_keys).collect()),
        other => other.clone(),
    }
}
