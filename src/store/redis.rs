use std::collections::HashMap;
use std::fmt;

use ::redis::{AsyncCommands, aio::ConnectionManager};
use async_trait::async_trait;

use super::{CheckStore, from_fields, record_key, to_fields};
use crate::error::StoreError;
use crate::http_probe::result::CheckResult;

/// Store keeping one Redis hash per hostname, see [`record_key`].
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore")
            .field("connection", &"ConnectionManager")
            .finish()
    }
}

impl RedisStore {
    pub async fn connect(redis_url: &str) -> Result<Self, StoreError> {
        log::info!("Connecting to Redis at {redis_url}");

        let client = ::redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;

        log::info!("Connected to Redis");
        Ok(Self { conn })
    }
}

#[async_trait]
impl CheckStore for RedisStore {
    async fn get(&self, hostname: &str) -> Result<Option<CheckResult>, StoreError> {
        let key = record_key(hostname);
        let mut conn = self.conn.clone();

        let fields: HashMap<String, String> = conn.hgetall(&key).await?;
        log::debug!("HGETALL {key}: {} fields", fields.len());

        from_fields(hostname, |name| fields.get(name).cloned())
    }

    async fn put(&self, hostname: &str, check: &CheckResult) -> Result<(), StoreError> {
        let key = record_key(hostname);
        let mut conn = self.conn.clone();

        let fields = to_fields(check);
        let _: () = conn.hset_multiple(&key, fields.as_slice()).await?;
        log::debug!("HSET {key}");
        Ok(())
    }
}
