//! Construction of the process-wide facade
//!
//! The facade is built once at start-up and shared by reference for the
//! lifetime of the process. Nothing here is global: the host keeps the
//! returned `Arc` wherever it keeps its other shared services.

use std::sync::Arc;

use tracing::{error, info};

use crate::error::Result;
use crate::services::{KeyValueFacade, RedisOptions};
use crate::store::RedisStore;

/// Validate `options`, open the shared Redis connection and wrap it in a
/// facade bound to the configured database
pub async fn connect(options: RedisOptions) -> Result<Arc<KeyValueFacade>> {
    options.validate().map_err(|e| {
        error!("Rejected Redis facade configuration: {}", e);
        e
    })?;

    let store = RedisStore::connect(&options).await?;
    let facade = Arc::new(KeyValueFacade::new(Arc::new(store)));

    info!(
        "Key-value facade ready on database {} (tls: {})",
        facade.database(),
        options.ssl
    );

    Ok(facade)
}

/// Same as [`connect`], reading options from `REDIS_*` environment variables
pub async fn connect_from_env() -> Result<Arc<KeyValueFacade>> {
    connect(RedisOptions::from_env()?).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FacadeError;

    #[tokio::test]
    async fn test_connect_rejects_blank_configuration() {
        let err = connect(RedisOptions::new("   ")).await.err().unwrap();
        assert!(matches!(err, FacadeError::InvalidConfiguration(_)));
    }

    #[tokio::test]
    async fn test_connect_rejects_database_out_of_range() {
        let err = connect(RedisOptions::new("localhost").with_database(16))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, FacadeError::InvalidConfiguration(_)));
    }
}
