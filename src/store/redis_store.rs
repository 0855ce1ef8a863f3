use std::time::Duration;

use async_trait::async_trait;

use crate::domain::confirmation::Confirmation;
use crate::store::{ConfirmationStore, StoreError};

/// Confirmations live under `confirmation:<token>` as JSON and expire after `ttl`.
pub struct RedisConfirmationStore {
    redis_client: redis::Client,
    ttl: Duration,
}

impl RedisConfirmationStore {
    pub fn new(redis_client: redis::Client, ttl: Duration) -> RedisConfirmationStore {
        RedisConfirmationStore { redis_client, ttl }
    }

    fn key(token: &str) -> String {
        format!("confirmation:{}", token)
    }

    fn decode(value: Option<String>) -> Result<Option<Confirmation>, StoreError> {
        value
            .map(|json| serde_json::from_str(&json).map_err(StoreError::from))
            .transpose()
    }
}

#[async_trait]
impl ConfirmationStore for RedisConfirmationStore {
    #[tracing::instrument(
        name = "Store a confirmation in Redis",
        skip(self, confirmation),
        fields(token = %confirmation.cid, action = %confirmation.action.as_ref())
    )]
    async fn insert(&self, confirmation: &Confirmation) -> Result<(), StoreError> {
        let mut redis_conn = self.redis_client.get_tokio_connection().await?;
        let value = serde_json::to_string(confirmation)?;

        // NX: a token is never overwritten.
        let stored: Option<String> = redis::cmd("SET")
            .arg(Self::key(&confirmation.cid))
            .arg(value)
            .arg("EX")
            .arg(self.ttl.as_secs().max(1))
            .arg("NX")
            .query_async(&mut redis_conn)
            .await?;

        if stored.is_none() {
            return Err(StoreError::Duplicate(String::from(
                "Confirmation token is already in use",
            )));
        }

        Ok(())
    }

    async fn get(&self, cid: &str) -> Result<Option<Confirmation>, StoreError> {
        let mut redis_conn = self.redis_client.get_tokio_connection().await?;
        let value: Option<String> = redis::cmd("GET")
            .arg(Self::key(cid))
            .query_async(&mut redis_conn)
            .await?;

        Self::decode(value)
    }

    #[tracing::instrument(name = "Consume a confirmation from Redis", skip(self))]
    async fn take(&self, cid: &str) -> Result<Option<Confirmation>, StoreError> {
        let mut redis_conn = self.redis_client.get_tokio_connection().await?;
        let value: Option<String> = redis::cmd("GETDEL")
            .arg(Self::key(cid))
            .query_async(&mut redis_conn)
            .await?;

        Self::decode(value)
    }
}
