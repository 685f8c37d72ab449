//! Redis implementation of the KeyValueStore trait

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use tracing::{debug, error, info, warn};

use super::KeyValueStore;
use crate::error::Result;
use crate::services::RedisOptions;

/// Keys requested per SCAN round trip
const SCAN_BATCH: usize = 500;

/// Redis-backed store
///
/// Wraps one multiplexed `ConnectionManager`. Cloning the manager is cheap
/// and every clone shares the same underlying connection, so a single
/// `RedisStore` serves any number of concurrent callers.
#[derive(Clone)]
pub struct RedisStore {
    connection: ConnectionManager,
    database: i64,
}

impl RedisStore {
    /// Wrap an existing connection bound to `database`
    ///
    /// The manager must already have selected `database` (it does when built
    /// from a `ConnectionInfo` carrying that index).
    pub fn new(connection: ConnectionManager, database: i64) -> Self {
        Self {
            connection,
            database,
        }
    }

    /// Open a connection from validated options
    pub async fn connect(options: &RedisOptions) -> Result<Self> {
        let info = options.connection_info()?;
        let database = info.redis.db;

        debug!(
            "Creating Redis client for {} (database {})",
            info.addr, database
        );

        let client = Client::open(info).map_err(|e| {
            error!("Failed to create Redis client: {}", e);
            e
        })?;

        let connection = ConnectionManager::new(client).await.map_err(|e| {
            error!("Failed to connect to Redis: {}", e);
            e
        })?;

        info!("Connected to Redis database {}", database);

        Ok(Self::new(connection, database))
    }

    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn();

        debug!("KV GET {}", key);

        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await?;

        Ok(value.map(|bytes| text(bytes, key)))
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>> {
        if keys.is_empty() {
            return Ok(vec![]);
        }

        let mut conn = self.conn();

        debug!("KV MGET {:?}", keys);

        // Raw bytes so one binary value cannot fail the whole batch
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await?;

        Ok(keys
            .iter()
            .zip(values)
            .map(|(key, value)| value.map(|bytes| text(bytes, key)))
            .collect())
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn();

        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);

        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(ttl.as_secs());
            debug!("KV SET {} EX {}", key, ttl.as_secs());
        } else {
            debug!("KV SET {}", key);
        }

        cmd.query_async::<()>(&mut conn).await?;

        Ok(())
    }

    async fn del(&self, keys: &[String]) -> Result<u64> {
        if keys.is_empty() {
            return Ok(0);
        }

        let mut conn = self.conn();

        debug!("KV DEL {:?}", keys);

        let deleted: u64 = redis::cmd("DEL")
            .arg(keys)
            .query_async(&mut conn)
            .await?;

        Ok(deleted)
    }

    async fn scan(&self, pattern: Option<&str>) -> Result<Vec<String>> {
        let mut conn = self.conn();
        let pattern = pattern.unwrap_or("*");

        debug!("KV SCAN {} in database {}", pattern, self.database);

        // SCAN may return a key more than once across iterations
        let mut seen = HashSet::new();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;

        loop {
            let (next, batch): (u64, Vec<Vec<u8>>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(|e: RedisError| {
                    error!("Failed to scan keys in database {}: {}", self.database, e);
                    e
                })?;

            for raw in batch {
                let key = text(raw, "<scanned key>");
                if seen.insert(key.clone()) {
                    keys.push(key);
                }
            }

            if next == 0 {
                break;
            }
            cursor = next;
        }

        debug!("Found {} keys in database {}", keys.len(), self.database);

        Ok(keys)
    }

    fn database(&self) -> i64 {
        self.database
    }
}

/// Decode bytes read from Redis, replacing invalid UTF-8 sequences
fn text(bytes: Vec<u8>, key: &str) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => {
            warn!("{} is not valid UTF-8, decoding lossily", key);
            String::from_utf8_lossy(e.as_bytes()).into_owned()
        }
    }
}
