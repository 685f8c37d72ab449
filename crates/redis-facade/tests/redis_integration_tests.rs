//! Integration tests against a real Redis server
//!
//! Each test starts its own Redis container. When Docker is not available
//! the tests print a notice and return early.

use std::collections::HashMap;
use std::sync::Arc;

use redis_facade::{bootstrap, KeyValueFacade, RedisOptions};
use serde::{Deserialize, Serialize};
use testcontainers::{
    core::{ContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage,
};

struct TestRedis {
    #[allow(dead_code)]
    container: ContainerAsync<GenericImage>,
    url: String,
}

impl TestRedis {
    async fn start() -> Option<Self> {
        let image = GenericImage::new("redis", "7.4.1-alpine")
            .with_exposed_port(ContainerPort::Tcp(6379))
            .with_wait_for(WaitFor::message_on_stdout("Ready to accept connections"));

        let container = match image.start().await {
            Ok(container) => container,
            Err(e) => {
                println!("⚠️  Docker not available, skipping test: {}", e);
                return None;
            }
        };

        let port = container.get_host_port_ipv4(6379).await.ok()?;

        Some(Self {
            container,
            url: format!("redis://127.0.0.1:{}", port),
        })
    }

    async fn facade(&self, database: i64) -> anyhow::Result<Arc<KeyValueFacade>> {
        let options = RedisOptions::new(self.url.clone()).with_database(database);
        Ok(bootstrap::connect(options).await?)
    }

    /// Raw connection for inspecting server-side state
    async fn raw(&self, database: i64) -> anyhow::Result<redis::aio::MultiplexedConnection> {
        let client = redis::Client::open(format!("{}/{}", self.url, database))?;
        Ok(client.get_multiplexed_async_connection().await?)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Session {
    user_id: u64,
    roles: Vec<String>,
}

#[tokio::test]
async fn test_raw_operations_against_redis() -> anyhow::Result<()> {
    let Some(redis) = TestRedis::start().await else {
        return Ok(());
    };
    let facade = redis.facade(0).await?;

    facade.put("greeting", "hello", None).await?;
    facade.put("empty", "", None).await?;
    assert_eq!(facade.get("greeting").await?.as_deref(), Some("hello"));
    assert_eq!(facade.get("empty").await?.as_deref(), Some(""));
    assert_eq!(facade.get("missing").await?, None);

    facade
        .put_many([("a", "1"), ("b", "2")], None)
        .await?;
    let many = facade.get_many(["a", "b", "c"]).await?;
    assert_eq!(
        many,
        HashMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ])
    );

    facade.remove("greeting").await?;
    facade.remove("greeting").await?;
    assert_eq!(facade.get("greeting").await?, None);

    facade.remove_many(["a", "b", "missing"]).await?;
    assert!(facade.get_many(["a", "b"]).await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_ttl_is_set_on_the_server() -> anyhow::Result<()> {
    let Some(redis) = TestRedis::start().await else {
        return Ok(());
    };
    let facade = redis.facade(0).await?;
    let mut raw = redis.raw(0).await?;

    facade.put("session:ttl", "v", Some(1)).await?;
    facade.put("session:forever", "v", None).await?;

    let ttl: i64 = redis::cmd("TTL")
        .arg("session:ttl")
        .query_async(&mut raw)
        .await?;
    assert!((1..=60).contains(&ttl), "unexpected ttl {}", ttl);

    let ttl: i64 = redis::cmd("TTL")
        .arg("session:forever")
        .query_async(&mut raw)
        .await?;
    assert_eq!(ttl, -1);

    Ok(())
}

#[tokio::test]
async fn test_pattern_operations_against_redis() -> anyhow::Result<()> {
    let Some(redis) = TestRedis::start().await else {
        return Ok(());
    };
    let facade = redis.facade(0).await?;

    facade
        .put_many(
            [("session:1", "a"), ("session:2", "b"), ("other", "c")],
            None,
        )
        .await?;

    facade.remove_by_prefix("session:").await?;
    assert_eq!(facade.get("session:1").await?, None);
    assert_eq!(facade.get("session:2").await?, None);
    assert_eq!(facade.get("other").await?.as_deref(), Some("c"));

    // Enough keys to need several SCAN round trips
    let bulk: Vec<(String, String)> = (0..1200)
        .map(|i| (format!("bulk:{}", i), i.to_string()))
        .collect();
    facade.put_many(bulk, None).await?;

    let tens = facade.get_by_pattern(r"^bulk:\d*0$").await?;
    assert_eq!(tens.len(), 120);
    assert_eq!(tens["bulk:1190"], "1190");

    facade.remove_by_regex(r"^bulk:").await?;
    assert!(facade.get_by_pattern(r"^bulk:").await?.is_empty());
    assert_eq!(facade.get("other").await?.as_deref(), Some("c"));

    Ok(())
}

#[tokio::test]
async fn test_typed_operations_against_redis() -> anyhow::Result<()> {
    let Some(redis) = TestRedis::start().await else {
        return Ok(());
    };
    let facade = redis.facade(0).await?;

    let admin = Session {
        user_id: 1,
        roles: vec!["admin".to_string()],
    };
    let guest = Session {
        user_id: 2,
        roles: vec![],
    };

    facade
        .put_typed_many([("session:1", &admin), ("session:2", &guest)], Some(5))
        .await?;
    facade.put("session:3", "garbage", None).await?;

    let sessions = facade
        .get_many_typed::<Session>(["session:1", "session:2", "session:3", "session:4"])
        .await?;
    assert_eq!(sessions.len(), 2);
    assert_eq!(sessions["session:1"], admin);

    let by_pattern = facade.get_by_pattern_typed::<Session>("^session:").await?;
    assert_eq!(by_pattern.len(), 2);
    assert_eq!(by_pattern["session:2"], guest);

    facade.put_typed("ids", &vec![1u64, 2, 3], None).await?;
    assert_eq!(facade.get_typed_list::<u64>("ids").await?, vec![1, 2, 3]);
    assert!(facade.get_typed_list::<u64>("no-ids").await?.is_empty());

    let missing: u64 = facade.get_typed("no-count").await?;
    assert_eq!(missing, 0);

    Ok(())
}

#[tokio::test]
async fn test_binary_values_and_keys_do_not_fail_reads() -> anyhow::Result<()> {
    let Some(redis) = TestRedis::start().await else {
        return Ok(());
    };
    let facade = redis.facade(0).await?;
    let mut raw = redis.raw(0).await?;

    redis::cmd("SET")
        .arg("blob")
        .arg(vec![0xffu8, 0xfe])
        .query_async::<()>(&mut raw)
        .await?;
    redis::cmd("SET")
        .arg(vec![b'k', 0xff])
        .arg("binary key")
        .query_async::<()>(&mut raw)
        .await?;
    facade.put_typed("session:1", &1u64, None).await?;

    assert_eq!(facade.get("blob").await?.as_deref(), Some("\u{FFFD}\u{FFFD}"));

    let typed = facade.get_many_typed::<u64>(["blob", "session:1"]).await?;
    assert_eq!(typed, HashMap::from([("session:1".to_string(), 1)]));

    let by_pattern = facade.get_by_pattern("^session:").await?;
    assert_eq!(by_pattern.len(), 1);

    facade.remove_by_regex("^session:").await?;
    assert_eq!(facade.get("session:1").await?, None);

    Ok(())
}

#[tokio::test]
async fn test_database_index_isolates_keys() -> anyhow::Result<()> {
    let Some(redis) = TestRedis::start().await else {
        return Ok(());
    };
    let primary = redis.facade(0).await?;
    let secondary = redis.facade(1).await?;
    assert_eq!(secondary.database(), 1);

    primary.put("shared-name", "db0", None).await?;
    secondary.put("shared-name", "db1", None).await?;

    assert_eq!(primary.get("shared-name").await?.as_deref(), Some("db0"));
    assert_eq!(secondary.get("shared-name").await?.as_deref(), Some("db1"));

    secondary.remove_by_regex(".*").await?;
    assert_eq!(secondary.get("shared-name").await?, None);
    assert_eq!(primary.get("shared-name").await?.as_deref(), Some("db0"));

    Ok(())
}
