//! Store backends
//!
//! The facade talks to the remote key-value store only through the
//! [`KeyValueStore`] trait. It is deliberately small: string get (single
//! and multi-key), string set with optional expiry, multi-key delete, and
//! key enumeration with an optional server-side glob filter.
//!
//! - [`RedisStore`]: production backend over a shared Redis `ConnectionManager`
//! - [`MemoryStore`]: in-process backend for tests and local development

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// Minimal operation set consumed from the remote store
///
/// Implementations must be safe to share between tasks: the facade holds
/// one as `Arc<dyn KeyValueStore>` and calls it concurrently.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a string value, `None` when the key does not exist
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Get several values in one request; the result is aligned with `keys`
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<String>>>;

    /// Set a string value, overwriting any previous one
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Delete keys, returning how many actually existed
    async fn del(&self, keys: &[String]) -> Result<u64>;

    /// Enumerate every key in the selected database, optionally narrowed by
    /// a glob pattern evaluated by the store itself
    async fn scan(&self, pattern: Option<&str>) -> Result<Vec<String>>;

    /// Database index this store is bound to
    fn database(&self) -> i64;
}

/// Escape glob metacharacters so `prefix` matches literally
pub fn escape_glob(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '*' | '?' | '[' | ']' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_glob_plain() {
        assert_eq!(escape_glob("session:"), "session:");
    }

    #[test]
    fn test_escape_glob_metacharacters() {
        assert_eq!(escape_glob("a*b?c[d]e\\"), "a\\*b\\?c\\[d\\]e\\\\");
    }
}
