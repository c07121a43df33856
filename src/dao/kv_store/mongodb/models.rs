use std::time::Duration;

use mongodb::bson::{DateTime, Document, doc};
use serde::{Deserialize, Serialize};

/// One key-value pair. `expires_at` feeds the collection's TTL index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoEntryDocument {
    /// Store key, used as the document id.
    #[serde(rename = "_id")]
    pub key: String,
    /// Stored value.
    pub value: String,
    /// Deadline; absent for persistent keys.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime>,
}

impl MongoEntryDocument {
    /// Document expiring `ttl` from now, or never.
    pub fn new(key: &str, value: String, ttl: Option<Duration>) -> Self {
        Self {
            key: key.to_owned(),
            value,
            expires_at: ttl.map(expiry_from_now),
        }
    }
}

fn expiry_from_now(ttl: Duration) -> DateTime {
    let now = DateTime::now().timestamp_millis();
    DateTime::from_millis(now.saturating_add(ttl.as_millis() as i64))
}

/// The TTL monitor only sweeps about once a minute, so reads filter expired entries themselves.
pub fn live_filter(key: &str) -> Document {
    doc! {
        "_id": key,
        "$or": [
            { "expires_at": null },
            { "expires_at": { "$gt": DateTime::now() } },
        ],
    }
}

/// Matches `key` only when its deadline has passed.
pub fn expired_filter(key: &str) -> Document {
    doc! {
        "_id": key,
        "expires_at": { "$lte": DateTime::now() },
    }
}

/// Matches `key` whatever its deadline.
pub fn key_filter(key: &str) -> Document {
    doc! { "_id": key }
}
