//! Facade service and its configuration
//!
//! [`KeyValueFacade`] is the caller-facing operation set; [`RedisOptions`]
//! describes the connection it is built on.

mod config;
mod facade;

pub use config::{
    RedisOptions, DEFAULT_REDIS_PORT, ENV_DATABASE, ENV_PASSWORD, ENV_SSL, ENV_URL, ENV_USERNAME,
    MAX_DATABASE_INDEX,
};
pub use facade::KeyValueFacade;
