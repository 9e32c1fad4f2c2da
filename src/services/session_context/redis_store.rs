use async_trait::async_trait;

use super::{SessionBackend, SessionError};
use crate::core::redis::RedisHandle;

/// Sessions as Redis hashes, one hash per session key.
pub(crate) struct RedisSessionBackend {
    redis: RedisHandle,
}

impl RedisSessionBackend {
    pub(crate) fn new(redis: RedisHandle) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl SessionBackend for RedisSessionBackend {
    async fn write(
        &self,
        key: &str,
        fields: Vec<(String, String)>,
        ttl_seconds: u64,
    ) -> Result<(), SessionError> {
        self.redis.hash_set(key, &fields, ttl_seconds).await?;
        Ok(())
    }

    async fn read(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>, SessionError> {
        Ok(self.redis.hash_get_many(key, fields).await?)
    }

    async fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.redis.delete(key).await?;
        Ok(())
    }
}
