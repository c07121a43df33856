//! Opening the entries collection: reachability, then the expiry index.

use std::time::Duration;

use mongodb::{
    Client, Collection, Database, IndexModel, bson::doc, options::IndexOptions,
};
use tokio::time::sleep;
use tracing::{debug, info};

use super::{
    config::MongoConfig,
    error::{MongoDaoError, MongoResult},
    models::MongoEntryDocument,
};

const PING_ATTEMPTS: u32 = 5;
const FIRST_PING_DELAY: Duration = Duration::from_millis(250);
const MAX_PING_DELAY: Duration = Duration::from_secs(5);
const EXPIRY_INDEX_NAME: &str = "kv_expiry_idx";

/// Delay before retrying the ping that followed `delay`.
fn next_ping_delay(delay: Duration) -> Duration {
    (delay * 2).min(MAX_PING_DELAY)
}

/// TTL index removing an entry as soon as its `expires_at` has passed.
/// Entries without `expires_at` are never swept.
fn expiry_index() -> IndexModel {
    IndexModel::builder()
        .keys(doc! { "expires_at": 1 })
        .options(
            IndexOptions::builder()
                .name(Some(EXPIRY_INDEX_NAME.to_owned()))
                .expire_after(Some(Duration::ZERO))
                .build(),
        )
        .build()
}

/// Typed handle on the collection holding the key-value entries.
pub fn entries(database: &Database, config: &MongoConfig) -> Collection<MongoEntryDocument> {
    database.collection::<MongoEntryDocument>(&config.collection_name)
}

/// Connect, wait until the server answers a ping, and make sure the entries collection
/// carries its expiry index. Used for the first connection and for every reconnect.
pub async fn open_database(config: &MongoConfig) -> MongoResult<Database> {
    let client = Client::with_options(config.options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(&config.database_name);

    let mut attempts = 0;
    let mut delay = FIRST_PING_DELAY;
    while let Err(err) = database.run_command(doc! { "ping": 1 }).await {
        attempts += 1;
        if attempts >= PING_ATTEMPTS {
            return Err(MongoDaoError::InitialPing {
                attempts,
                source: err,
            });
        }
        debug!(attempts, error = %err, "MongoDB ping failed; retrying");
        sleep(delay).await;
        delay = next_ping_delay(delay);
    }

    entries(&database, config)
        .create_index(expiry_index())
        .await
        .map_err(|source| MongoDaoError::EnsureIndex {
            collection: config.collection_name.clone(),
            index: EXPIRY_INDEX_NAME,
            source,
        })?;
    info!(
        database = %config.database_name,
        collection = %config.collection_name,
        "MongoDB entries collection ready"
    );

    Ok(database)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_backoff_is_capped() {
        let mut delay = FIRST_PING_DELAY;
        let mut delays = Vec::new();
        for _ in 0..7 {
            delays.push(delay.as_millis());
            delay = next_ping_delay(delay);
        }
        assert_eq!(delays, vec![250, 500, 1_000, 2_000, 4_000, 5_000, 5_000]);
    }

    #[test]
    fn expiry_index_sweeps_on_deadline() {
        let index = expiry_index();
        assert_eq!(index.keys, doc! { "expires_at": 1 });
        let options = index.options.expect("index options");
        assert_eq!(options.name.as_deref(), Some(EXPIRY_INDEX_NAME));
        assert_eq!(options.expire_after, Some(Duration::ZERO));
    }
}
