//! Redis Lock Store
//!
//! [`LockStore`] backed by Redis. Acquisition uses `SET NX PX`; release and
//! extension run as Lua scripts so the owner check and the mutation are one
//! server-side step.

use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{RedisError, Script};

use crate::error::StoreError;
use crate::lock::LockStore;

const UNLOCK_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

const REFRESH_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("PEXPIRE", KEYS[1], ARGV[2])
else
    return 0
end
"#;

/// Lock store speaking to a Redis server through a connection manager.
#[derive(Clone)]
pub struct RedisLockStore {
    conn: ConnectionManager,
}

impl RedisLockStore {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    /// Opens a managed connection to `url`.
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = redis::Client::open(url).map_err(store_error)?;
        let conn = ConnectionManager::new(client).await.map_err(store_error)?;
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl LockStore for RedisLockStore {
    async fn set_if_absent(
        &self,
        key: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = acquire_cmd(key, owner, ttl)
            .query_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(reply.is_some())
    }

    async fn compare_and_delete(&self, key: &str, owner: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let script = Script::new(UNLOCK_SCRIPT);
        let deleted: i64 = script
            .key(key)
            .arg(owner)
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(deleted == 1)
    }

    async fn compare_and_extend(
        &self,
        key: &str,
        owner: &str,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let script = Script::new(REFRESH_SCRIPT);
        let extended: i64 = script
            .key(key)
            .arg(owner)
            .arg(ttl_millis(ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(store_error)?;
        Ok(extended == 1)
    }
}

/// `SET key owner NX PX ttl`: replies `OK` only when the key was created.
fn acquire_cmd(key: &str, owner: &str, ttl: Duration) -> redis::Cmd {
    let mut cmd = redis::cmd("SET");
    cmd.arg(key)
        .arg(owner)
        .arg("NX")
        .arg("PX")
        .arg(ttl_millis(ttl));
    cmd
}

/// Redis rejects a zero expiry, so round up to one millisecond.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

fn store_error(err: RedisError) -> StoreError {
    if err.is_timeout() {
        StoreError::Timeout
    } else {
        StoreError::backend(err)
    }
}
