//! Key-value facade over a shared store connection

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{FacadeError, Result};
use crate::store::{escape_glob, KeyValueStore};

/// String-keyed get/set/delete/scan operations against one database of
/// the remote store, in raw text form or as JSON-encoded typed values.
///
/// The facade keeps no state of its own. Every call is passed straight to
/// the injected store, so one instance can be shared (`Arc`) by every task
/// in the process. Batch writes and pattern reads issue their per-key round
/// trips one after another, never concurrently: a failure part-way through a
/// batch leaves earlier writes committed and later ones unattempted.
///
/// Absence is never an error. Raw reads report it as `None` or by omission
/// from a result map; [`get_typed`](Self::get_typed) reports it as
/// `T::default()` and [`get_typed_opt`](Self::get_typed_opt) as `None`.
#[derive(Clone)]
pub struct KeyValueFacade {
    store: Arc<dyn KeyValueStore>,
}

impl KeyValueFacade {
    /// Create a facade over a shared store handle
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Database index every operation targets
    pub fn database(&self) -> i64 {
        self.store.database()
    }

    /// Convert a TTL in whole minutes to the store's expiry
    fn expiry(ttl_minutes: Option<u32>) -> Result<Option<Duration>> {
        match ttl_minutes {
            None => Ok(None),
            Some(0) => Err(FacadeError::InvalidTtl(0)),
            Some(minutes) => Ok(Some(Duration::from_secs(u64::from(minutes) * 60))),
        }
    }

    // ------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------

    /// Write `value` under `key`, replacing any previous value
    pub async fn put(&self, key: &str, value: &str, ttl_minutes: Option<u32>) -> Result<()> {
        let ttl = Self::expiry(ttl_minutes)?;
        self.store.set(key, value, ttl).await
    }

    /// Write every pair in order with the same TTL. Not atomic.
    pub async fn put_many<K, V>(
        &self,
        entries: impl IntoIterator<Item = (K, V)>,
        ttl_minutes: Option<u32>,
    ) -> Result<()>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let ttl = Self::expiry(ttl_minutes)?;

        for (key, value) in entries {
            self.store.set(key.as_ref(), value.as_ref(), ttl).await?;
        }

        Ok(())
    }

    /// Serialize `value` to JSON and write it under `key`
    ///
    /// Nothing is written when serialization fails. Slices and `Vec`s are
    /// stored as JSON arrays and read back with
    /// [`get_typed_list`](Self::get_typed_list).
    pub async fn put_typed<T>(&self, key: &str, value: &T, ttl_minutes: Option<u32>) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        let ttl = Self::expiry(ttl_minutes)?;
        let json = serde_json::to_string(value)?;
        self.store.set(key, &json, ttl).await
    }

    /// Serialize and write every pair in order with the same TTL. Not atomic:
    /// an encoding or store failure stops the loop with earlier pairs written.
    pub async fn put_typed_many<K, T>(
        &self,
        entries: impl IntoIterator<Item = (K, T)>,
        ttl_minutes: Option<u32>,
    ) -> Result<()>
    where
        K: AsRef<str>,
        T: Serialize,
    {
        let ttl = Self::expiry(ttl_minutes)?;

        for (key, value) in entries {
            let json = serde_json::to_string(&value)?;
            self.store.set(key.as_ref(), &json, ttl).await?;
        }

        Ok(())
    }

    // ------------------------------------------------------------------
    // Removal
    // ------------------------------------------------------------------

    /// Delete one key. Deleting an absent key is not an error.
    pub async fn remove(&self, key: &str) -> Result<()> {
        self.store.del(&[key.to_string()]).await?;
        Ok(())
    }

    /// Delete several keys in a single request
    pub async fn remove_many(&self, keys: impl IntoIterator<Item = impl AsRef<str>>) -> Result<()> {
        let keys = collect_keys(keys);
        if keys.is_empty() {
            return Ok(());
        }

        let deleted = self.store.del(&keys).await?;
        debug!("Removed {} of {} keys", deleted, keys.len());

        Ok(())
    }

    /// Delete every key whose full text matches the regular expression
    ///
    /// Cost warning: this enumerates *every* key in the database and filters
    /// on the client, so it is O(keys in database) no matter how few match.
    /// Use [`remove_by_prefix`](Self::remove_by_prefix) when a prefix is
    /// enough; the store narrows that scan itself.
    pub async fn remove_by_regex(&self, pattern: &str) -> Result<()> {
        let matched = self.keys_matching_regex(pattern).await?;
        if matched.is_empty() {
            debug!("No keys match /{}/, nothing to remove", pattern);
            return Ok(());
        }

        let deleted = self.store.del(&matched).await?;
        debug!("Removed {} keys matching /{}/", deleted, pattern);

        Ok(())
    }

    /// Delete every key starting with `prefix`, filtered server-side
    pub async fn remove_by_prefix(&self, prefix: &str) -> Result<()> {
        let pattern = format!("{}*", escape_glob(prefix));
        let matched = self.store.scan(Some(&pattern)).await?;
        if matched.is_empty() {
            debug!("No keys match {}, nothing to remove", pattern);
            return Ok(());
        }

        let deleted = self.store.del(&matched).await?;
        debug!("Removed {} keys matching {}", deleted, pattern);

        Ok(())
    }

    // ------------------------------------------------------------------
    // Raw reads
    // ------------------------------------------------------------------

    /// Read the raw value under `key`. `Some("")` is a stored empty string,
    /// `None` means the key does not exist.
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        self.store.get(key).await
    }

    /// Read several keys in one request. Absent keys are left out of the map.
    pub async fn get_many(
        &self,
        keys: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<HashMap<String, String>> {
        let keys = collect_keys(keys);
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let values = self.store.mget(&keys).await?;

        Ok(keys
            .into_iter()
            .zip(values)
            .filter_map(|(key, value)| value.map(|v| (key, v)))
            .collect())
    }

    /// Read every key whose full text matches the regular expression.
    ///
    /// Same full-database scan as [`remove_by_regex`](Self::remove_by_regex),
    /// followed by one GET per match, issued sequentially. Keys that vanish
    /// between the scan and their GET are left out.
    pub async fn get_by_pattern(&self, pattern: &str) -> Result<HashMap<String, String>> {
        let matched = self.keys_matching_regex(pattern).await?;
        let mut result = HashMap::with_capacity(matched.len());

        for key in matched {
            if let Some(value) = self.store.get(&key).await? {
                result.insert(key, value);
            }
        }

        Ok(result)
    }

    // ------------------------------------------------------------------
    // Typed reads
    // ------------------------------------------------------------------

    /// Decode the JSON under `key`, or `None` when the key does not exist or
    /// holds a JSON `null`
    pub async fn get_typed_opt<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        match self.store.get(key).await? {
            Some(raw) => Ok(serde_json::from_str::<Option<T>>(&raw)?),
            None => Ok(None),
        }
    }

    /// Decode the JSON under `key`, or `T::default()` when the key does not
    /// exist or holds `null`. Use [`get_typed_opt`](Self::get_typed_opt) to tell the two
    /// apart.
    pub async fn get_typed<T>(&self, key: &str) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        Ok(self.get_typed_opt(key).await?.unwrap_or_default())
    }

    /// Decode a JSON array under `key`. An absent key (or a stored `null`)
    /// yields an empty list.
    pub async fn get_typed_list<T>(&self, key: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        match self.store.get(key).await? {
            Some(raw) => Ok(serde_json::from_str::<Option<Vec<T>>>(&raw)?.unwrap_or_default()),
            None => Ok(Vec::new()),
        }
    }

    /// Read and decode several keys in one request
    ///
    /// Absent keys are left out, and so are entries that decode to `null` or
    /// fail to decode at all. Dropped entries are logged, never raised.
    pub async fn get_many_typed<T>(
        &self,
        keys: impl IntoIterator<Item = impl AsRef<str>>,
    ) -> Result<HashMap<String, T>>
    where
        T: DeserializeOwned,
    {
        let keys = collect_keys(keys);
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let values = self.store.mget(&keys).await?;

        Ok(keys
            .into_iter()
            .zip(values)
            .filter_map(|(key, value)| {
                let decoded = decode_lenient(&key, &value?)?;
                Some((key, decoded))
            })
            .collect())
    }

    /// Typed variant of [`get_by_pattern`](Self::get_by_pattern), with the
    /// same full-database scan cost and the same drop policy as
    /// [`get_many_typed`](Self::get_many_typed).
    pub async fn get_by_pattern_typed<T>(&self, pattern: &str) -> Result<HashMap<String, T>>
    where
        T: DeserializeOwned,
    {
        let matched = self.keys_matching_regex(pattern).await?;
        let mut result = HashMap::with_capacity(matched.len());

        for key in matched {
            let Some(raw) = self.store.get(&key).await? else {
                continue;
            };
            if let Some(value) = decode_lenient(&key, &raw) {
                result.insert(key, value);
            }
        }

        Ok(result)
    }

    /// Enumerate the whole database and keep keys matching `pattern`.
    /// The regex is compiled before the store is contacted.
    async fn keys_matching_regex(&self, pattern: &str) -> Result<Vec<String>> {
        let regex = Regex::new(pattern)?;
        let all_keys = self.store.scan(None).await?;
        let scanned = all_keys.len();

        let matched: Vec<String> = all_keys.into_iter().filter(|k| regex.is_match(k)).collect();

        debug!(
            "Regex /{}/ matched {} of {} keys in database {}",
            pattern,
            matched.len(),
            scanned,
            self.store.database()
        );

        Ok(matched)
    }
}

fn collect_keys(keys: impl IntoIterator<Item = impl AsRef<str>>) -> Vec<String> {
    keys.into_iter().map(|k| k.as_ref().to_string()).collect()
}

/// Decode for batch reads: `null` and undecodable payloads become `None`
fn decode_lenient<T: DeserializeOwned>(key: &str, raw: &str) -> Option<T> {
    match serde_json::from_str::<Option<T>>(raw) {
        Ok(Some(value)) => Some(value),
        Ok(None) => {
            debug!("Dropping {} from batch read: stored value is null", key);
            None
        }
        Err(e) => {
            warn!("Dropping {} from batch read: {}", key, e);
            None
        }
    }
}
