//! Connection configuration for the facade

use redis::{ConnectionAddr, ConnectionInfo, IntoConnectionInfo};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{FacadeError, Result};

/// Default Redis port when the endpoint omits one
pub const DEFAULT_REDIS_PORT: u16 = 6379;
/// Highest database index a default Redis server exposes
pub const MAX_DATABASE_INDEX: i64 = 15;

pub const ENV_URL: &str = "REDIS_URL";
pub const ENV_USERNAME: &str = "REDIS_USERNAME";
pub const ENV_PASSWORD: &str = "REDIS_PASSWORD";
pub const ENV_DATABASE: &str = "REDIS_DATABASE";
pub const ENV_SSL: &str = "REDIS_SSL";

// Helper functions for schemars examples
fn example_configuration() -> &'static str {
    "redis://localhost:6379"
}

fn example_database() -> i64 {
    1
}

/// Options used to open the shared store connection
///
/// `configuration` accepts either a URL (`redis://`, `rediss://`,
/// `redis+unix://`) or a comma-separated descriptor such as
/// `"cache.internal:6380,password=secret,ssl=true,defaultDatabase=2"`.
/// Only the first endpoint of a descriptor is used. Explicit fields win over
/// anything embedded in the descriptor.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[schemars(
    title = "Redis Facade Configuration",
    description = "Connection settings for the Redis-backed key-value facade"
)]
pub struct RedisOptions {
    /// Endpoint descriptor or connection URL
    #[schemars(example = "example_configuration")]
    pub configuration: String,

    /// ACL username (Redis 6+)
    #[serde(default)]
    pub username: Option<String>,

    /// Password, overriding any password in `configuration`
    #[serde(default)]
    pub password: Option<String>,

    /// Database index the facade is bound to
    #[serde(default)]
    #[schemars(example = "example_database")]
    pub database: i64,

    /// Require a TLS transport
    #[serde(default)]
    pub ssl: bool,
}

/// Parts recovered from a comma-separated endpoint descriptor
#[derive(Debug, Default, PartialEq)]
struct Descriptor {
    endpoint: String,
    user: Option<String>,
    password: Option<String>,
    ssl: Option<bool>,
    database: Option<i64>,
}

impl RedisOptions {
    pub fn new(configuration: impl Into<String>) -> Self {
        Self {
            configuration: configuration.into(),
            ..Default::default()
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_database(mut self, database: i64) -> Self {
        self.database = database;
        self
    }

    pub fn with_ssl(mut self, ssl: bool) -> Self {
        self.ssl = ssl;
        self
    }

    /// Load options from the process environment
    ///
    /// Reads `REDIS_URL` (required), `REDIS_USERNAME`, `REDIS_PASSWORD`,
    /// `REDIS_DATABASE` and `REDIS_SSL`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load options through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let configuration = lookup(ENV_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                FacadeError::invalid_configuration(format!("{} must be set", ENV_URL))
            })?;

        let database = match lookup(ENV_DATABASE) {
            Some(raw) => raw.trim().parse::<i64>().map_err(|_| {
                FacadeError::invalid_configuration(format!(
                    "{} must be a number, got '{}'",
                    ENV_DATABASE, raw
                ))
            })?,
            None => 0,
        };

        let ssl = match lookup(ENV_SSL) {
            Some(raw) => parse_bool(&raw).ok_or_else(|| {
                FacadeError::invalid_configuration(format!(
                    "{} must be true or false, got '{}'",
                    ENV_SSL, raw
                ))
            })?,
            None => false,
        };

        Ok(Self {
            configuration,
            username: lookup(ENV_USERNAME),
            password: lookup(ENV_PASSWORD),
            database,
            ssl,
        })
    }

    /// Check the options without touching the network
    pub fn validate(&self) -> Result<()> {
        if self.configuration.trim().is_empty() {
            return Err(FacadeError::invalid_configuration(
                "Redis configuration string must be provided",
            ));
        }

        if !(0..=MAX_DATABASE_INDEX).contains(&self.database) {
            return Err(FacadeError::invalid_configuration(format!(
                "Redis database number must be between 0 and {}, got {}",
                MAX_DATABASE_INDEX, self.database
            )));
        }

        Ok(())
    }

    /// Resolve the options into connection parameters for the Redis client
    pub fn connection_info(&self) -> Result<ConnectionInfo> {
        self.validate()?;

        let descriptor = parse_descriptor(&self.configuration)?;
        let ssl = self.ssl || descriptor.ssl.unwrap_or(false);
        let url = endpoint_url(&descriptor.endpoint, ssl);

        let mut info = url.as_str().into_connection_info().map_err(|e| {
            FacadeError::invalid_configuration(format!("Invalid Redis endpoint: {}", e))
        })?;

        if ssl && matches!(info.addr, ConnectionAddr::Unix(_)) {
            return Err(FacadeError::invalid_configuration(
                "TLS cannot be used with a unix socket endpoint",
            ));
        }

        if let Some(user) = non_blank(&self.username).or(descriptor.user) {
            info.redis.username = Some(user);
        }
        if let Some(password) = non_blank(&self.password).or(descriptor.password) {
            info.redis.password = Some(password);
        }

        // An explicit non-default index wins over one embedded in the
        // descriptor or the URL path
        let embedded = descriptor.database.unwrap_or(info.redis.db);
        info.redis.db = if self.database == 0 {
            embedded
        } else {
            self.database
        };

        if !(0..=MAX_DATABASE_INDEX).contains(&info.redis.db) {
            return Err(FacadeError::invalid_configuration(format!(
                "Redis database number must be between 0 and {}, got {}",
                MAX_DATABASE_INDEX, info.redis.db
            )));
        }

        Ok(info)
    }
}

fn non_blank(value: &Option<String>) -> Option<String> {
    value
        .as_ref()
        .filter(|v| !v.trim().is_empty())
        .map(|v| v.to_string())
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Split a configuration string into its endpoint and known options.
/// URLs pass through untouched.
fn parse_descriptor(configuration: &str) -> Result<Descriptor> {
    let configuration = configuration.trim();

    if configuration.contains("://") {
        return Ok(Descriptor {
            endpoint: configuration.to_string(),
            ..Default::default()
        });
    }

    let mut descriptor = Descriptor::default();

    for part in configuration.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('=') {
            Some((name, value)) => match name.trim().to_ascii_lowercase().as_str() {
                "password" => descriptor.password = Some(value.to_string()),
                "user" => descriptor.user = Some(value.to_string()),
                "ssl" => {
                    descriptor.ssl = Some(parse_bool(value).ok_or_else(|| {
                        FacadeError::invalid_configuration(format!(
                            "ssl must be true or false, got '{}'",
                            value
                        ))
                    })?)
                }
                "defaultdatabase" => {
                    descriptor.database = Some(value.trim().parse().map_err(|_| {
                        FacadeError::invalid_configuration(format!(
                            "defaultDatabase must be a number, got '{}'",
                            value
                        ))
                    })?)
                }
                // Driver tuning options are owned by the connection layer
                _ => {}
            },
            None if descriptor.endpoint.is_empty() => descriptor.endpoint = part.to_string(),
            None => {}
        }
    }

    if descriptor.endpoint.is_empty() {
        return Err(FacadeError::invalid_configuration(
            "Redis configuration contains no endpoint",
        ));
    }

    Ok(descriptor)
}

fn endpoint_url(endpoint: &str, ssl: bool) -> String {
    if let Some(rest) = endpoint.strip_prefix("redis://") {
        return if ssl {
            format!("rediss://{}", rest)
        } else {
            endpoint.to_string()
        };
    }

    if endpoint.contains("://") {
        return endpoint.to_string();
    }

    let scheme = if ssl { "rediss" } else { "redis" };
    if endpoint.contains(':') {
        format!("{}://{}", scheme, endpoint)
    } else {
        format!("{}://{}:{}", scheme, endpoint, DEFAULT_REDIS_PORT)
    }
}
