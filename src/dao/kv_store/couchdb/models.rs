use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Namespace for every key-value document so they never collide with design documents.
pub const ENTRY_PREFIX: &str = "kv::";

/// One key-value pair stored as a CouchDB document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CouchEntryDocument {
    /// Document id, `ENTRY_PREFIX` followed by the key.
    #[serde(rename = "_id")]
    pub id: String,
    /// Revision; required to overwrite or delete.
    #[serde(rename = "_rev", skip_serializing_if = "Option::is_none")]
    pub rev: Option<String>,
    /// Stored value.
    pub value: String,
    /// Unix epoch milliseconds after which the entry is treated as absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at_ms: Option<u64>,
}

impl CouchEntryDocument {
    /// Document expiring `ttl` from now, or never.
    pub fn new(key: &str, value: String, ttl: Option<Duration>) -> Self {
        Self {
            id: entry_doc_id(key),
            rev: None,
            value,
            expires_at_ms: ttl.map(|ttl| now_ms().saturating_add(ttl.as_millis() as u64)),
        }
    }

    /// Whether the entry is still visible at `now_ms`.
    pub fn is_live(&self, now_ms: u64) -> bool {
        self.expires_at_ms.is_none_or(|deadline| deadline > now_ms)
    }
}

/// Document id of `key`.
pub fn entry_doc_id(key: &str) -> String {
    format!("{ENTRY_PREFIX}{key}")
}

/// Current Unix time in milliseconds.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_without_expiry_stay_live() {
        let doc = CouchEntryDocument::new("prize:pool", "{}".into(), None);
        assert_eq!(doc.id, "kv::prize:pool");
        assert!(doc.is_live(u64::MAX));
    }

    #[test]
    fn expiry_is_relative_to_now() {
        let doc = CouchEntryDocument::new("k", "v".into(), Some(Duration::from_secs(60)));
        let now = now_ms();
        assert!(doc.is_live(now));
        assert!(!doc.is_live(now + 61_000));
    }
}
