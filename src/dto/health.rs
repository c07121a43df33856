use serde::Serialize;
use utoipa::ToSchema;

/// Body of the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: &'static str,
    /// Whether the last ping reached the key-value store.
    pub store_reachable: bool,
}

impl HealthResponse {
    /// `degraded` unless the store is installed and reachable.
    pub fn from_probe(degraded: bool, store_reachable: bool) -> Self {
        Self {
            status: if degraded || !store_reachable {
                "degraded"
            } else {
                "ok"
            },
            store_reachable,
        }
    }
}
