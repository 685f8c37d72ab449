//! redis-facade: Key-value convenience layer over a shared Redis connection
//!
//! Provides string and JSON-typed get/set/delete operations, batch variants
//! and pattern scans for one Redis database. Connection management, expiry
//! enforcement and the wire protocol all stay with the Redis driver.
//!
//! ## Example
//!
//! ```rust,no_run
//! use redis_facade::{bootstrap, RedisOptions};
//!
//! # async fn example() -> redis_facade::Result<()> {
//! let options = RedisOptions::new("redis://localhost:6379").with_database(2);
//! let facade = bootstrap::connect(options).await?;
//!
//! facade.put("greeting", "hello", Some(10)).await?;
//! assert_eq!(facade.get("greeting").await?.as_deref(), Some("hello"));
//!
//! facade.remove_by_prefix("session:").await?;
//! # Ok(())
//! # }
//! ```

pub mod bootstrap;
pub mod error;
pub mod services;
pub mod store;

pub use error::{FacadeError, Result};
pub use services::{KeyValueFacade, RedisOptions};
pub use store::{KeyValueStore, MemoryStore, RedisStore};
