//! Persistence collaborators used by the engine.
//!
//! Each concern is a narrow async trait so the engine can run against Postgres + Redis in
//! production and against [`memory::InMemoryStore`] in tests.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::confirmation::Confirmation;
use crate::domain::field::{Field, FieldRecord};
use crate::domain::mailing_list::{MailingList, NewMailingList};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscription::{NewSubscription, Subscription};
use crate::domain::subscription_status::SubscriptionStatus;

pub mod memory;
pub mod postgres;
pub mod redis_store;

#[derive(thiserror::Error)]
pub enum StoreError {
    #[error("Failed to execute a database query.")]
    Database(#[from] sqlx::Error),
    #[error("Failed to talk to Redis.")]
    Redis(#[from] redis::RedisError),
    #[error("Failed to (de)serialize a stored value.")]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Duplicate(String),
    #[error("Stored value is corrupted: {0}")]
    Corrupted(String),
}

impl std::fmt::Debug for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

pub fn error_chain_fmt(
    err: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}", err)?;
    let mut current = err.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

#[async_trait]
pub trait ListStore: Send + Sync {
    async fn insert(&self, list: NewMailingList) -> Result<MailingList, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<MailingList>, StoreError>;

    /// Matches the internal id, the public cid or the name.
    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<MailingList>, StoreError>;

    async fn all(&self) -> Result<Vec<MailingList>, StoreError>;
}

#[async_trait]
pub trait FieldStore: Send + Sync {
    /// Fields in declaration order with options attached to their groups.
    async fn fields_for_list(&self, list_id: Uuid) -> Result<Vec<Field>, StoreError>;

    async fn get_record(&self, list_id: Uuid, id: Uuid) -> Result<Option<FieldRecord>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when the key or column is already used on the list.
    async fn insert(&self, record: FieldRecord) -> Result<FieldRecord, StoreError>;
}

/// All lookups ignore deleted rows.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn get_by_email(
        &self,
        list_id: Uuid,
        email: &SubscriberEmail,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Inserts a row, or merges into the live row for `(list_id, email)` following
    /// [`Subscription::merge`]. Atomic per `(list_id, email)`.
    async fn upsert(
        &self,
        list_id: Uuid,
        subscription: &NewSubscription,
        status: SubscriptionStatus,
    ) -> Result<Subscription, StoreError>;

    async fn set_status(
        &self,
        list_id: Uuid,
        id: Uuid,
        status: SubscriptionStatus,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Tombstones the live row, freeing its `(list_id, email)` slot. `None` when there is
    /// no live row with that cid.
    async fn mark_deleted(&self, list_id: Uuid, cid: &str) -> Result<Option<Subscription>, StoreError>;

    /// Fails with [`StoreError::Duplicate`] when another live row holds `email`.
    async fn update_email(
        &self,
        list_id: Uuid,
        id: Uuid,
        email: &SubscriberEmail,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Live rows in creation order and the total count.
    async fn list(
        &self,
        list_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Subscription>, u64), StoreError>;

    async fn list_ids_with_email(&self, email: &SubscriberEmail) -> Result<Vec<Uuid>, StoreError>;
}

#[async_trait]
pub trait BlacklistStore: Send + Sync {
    async fn add(&self, email: &SubscriberEmail) -> Result<(), StoreError>;

    async fn remove(&self, email: &SubscriberEmail) -> Result<bool, StoreError>;

    async fn contains(&self, email: &SubscriberEmail) -> Result<bool, StoreError>;

    /// Case-insensitive substring search, sorted by address.
    async fn search(
        &self,
        offset: u64,
        limit: u64,
        fragment: &str,
    ) -> Result<(Vec<String>, u64), StoreError>;
}

#[async_trait]
pub trait ConfirmationStore: Send + Sync {
    async fn insert(&self, confirmation: &Confirmation) -> Result<(), StoreError>;

    async fn get(&self, cid: &str) -> Result<Option<Confirmation>, StoreError>;

    /// Removes and returns the confirmation in one atomic step. Of several concurrent
    /// callers at most one receives `Some`.
    async fn take(&self, cid: &str) -> Result<Option<Confirmation>, StoreError>;
}

/// The full set of collaborators the engine needs.
#[derive(Clone)]
pub struct Stores {
    pub lists: Arc<dyn ListStore>,
    pub fields: Arc<dyn FieldStore>,
    pub subscriptions: Arc<dyn SubscriptionStore>,
    pub blacklist: Arc<dyn BlacklistStore>,
    pub confirmations: Arc<dyn ConfirmationStore>,
}

impl Stores {
    pub fn in_memory() -> Stores {
        let store = Arc::new(memory::InMemoryStore::default());

        Stores {
            lists: store.clone(),
            fields: store.clone(),
            subscriptions: store.clone(),
            blacklist: store.clone(),
            confirmations: store,
        }
    }

    pub fn postgres(
        db_pool: sqlx::PgPool,
        redis_client: redis::Client,
        confirmation_ttl: std::time::Duration,
    ) -> Stores {
        let store = Arc::new(postgres::PgStore::new(db_pool));

        Stores {
            lists: store.clone(),
            fields: store.clone(),
            subscriptions: store.clone(),
            blacklist: store,
            confirmations: Arc::new(redis_store::RedisConfirmationStore::new(
                redis_client,
                confirmation_ttl,
            )),
        }
    }
}
