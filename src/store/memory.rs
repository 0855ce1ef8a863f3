use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::cid::generate_cid;
use crate::domain::confirmation::Confirmation;
use crate::domain::field::{Field, FieldRecord};
use crate::domain::mailing_list::{MailingList, NewMailingList};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscription::{NewSubscription, Subscription};
use crate::domain::subscription_status::SubscriptionStatus;
use crate::store::{
    BlacklistStore, ConfirmationStore, FieldStore, ListStore, StoreError, SubscriptionStore,
};

/// Process-local store. Every collection sits behind its own lock, so each operation is a
/// single critical section and read-modify-write steps are atomic.
#[derive(Default)]
pub struct InMemoryStore {
    lists: Mutex<Vec<MailingList>>,
    fields: Mutex<Vec<FieldRecord>>,
    subscriptions: Mutex<Vec<Subscription>>,
    blacklist: Mutex<BTreeSet<String>>,
    confirmations: Mutex<HashMap<String, Confirmation>>,
}

fn page<T: Clone>(items: &[T], offset: u64, limit: u64) -> (Vec<T>, u64) {
    let total = items.len() as u64;
    let page = items
        .iter()
        .skip(offset as usize)
        .take(limit as usize)
        .cloned()
        .collect();

    (page, total)
}

#[async_trait]
impl ListStore for InMemoryStore {
    async fn insert(&self, list: NewMailingList) -> Result<MailingList, StoreError> {
        let mut lists = self.lists.lock().await;
        let list = MailingList {
            id: Uuid::new_v4(),
            cid: generate_cid(),
            name: list.name,
            description: list.description,
            created_at: Utc::now(),
        };

        lists.push(list.clone());

        Ok(list)
    }

    async fn get(&self, id: Uuid) -> Result<Option<MailingList>, StoreError> {
        let lists = self.lists.lock().await;

        Ok(lists.iter().find(|list| list.id == id).cloned())
    }

    async fn find_by_identifier(&self, identifier: &str) -> Result<Option<MailingList>, StoreError> {
        let lists = self.lists.lock().await;

        Ok(lists
            .iter()
            .find(|list| list.matches_identifier(identifier))
            .cloned())
    }

    async fn all(&self) -> Result<Vec<MailingList>, StoreError> {
        Ok(self.lists.lock().await.clone())
    }
}

#[async_trait]
impl FieldStore for InMemoryStore {
    async fn fields_for_list(&self, list_id: Uuid) -> Result<Vec<Field>, StoreError> {
        let fields = self.fields.lock().await;
        let records = fields
            .iter()
            .filter(|record| record.list_id == list_id)
            .cloned()
            .collect();

        Ok(Field::assemble(records))
    }

    async fn get_record(&self, list_id: Uuid, id: Uuid) -> Result<Option<FieldRecord>, StoreError> {
        let fields = self.fields.lock().await;

        Ok(fields
            .iter()
            .find(|record| record.list_id == list_id && record.id == id)
            .cloned())
    }

    async fn insert(&self, record: FieldRecord) -> Result<FieldRecord, StoreError> {
        let mut fields = self.fields.lock().await;
        let collides = fields.iter().any(|existing| {
            existing.list_id == record.list_id
                && (existing.key.eq_ignore_ascii_case(&record.key)
                    || (existing.column.is_some() && existing.column == record.column))
        });

        if collides {
            return Err(StoreError::Duplicate(format!(
                "Field key {} is already used on this list",
                record.key
            )));
        }

        fields.push(record.clone());

        Ok(record)
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn get_by_email(
        &self,
        list_id: Uuid,
        email: &SubscriberEmail,
    ) -> Result<Option<Subscription>, StoreError> {
        let subscriptions = self.subscriptions.lock().await;

        Ok(subscriptions
            .iter()
            .find(|row| row.list_id == list_id && !row.is_deleted() && &row.email == email)
            .cloned())
    }

    async fn upsert(
        &self,
        list_id: Uuid,
        subscription: &NewSubscription,
        status: SubscriptionStatus,
    ) -> Result<Subscription, StoreError> {
        let mut subscriptions = self.subscriptions.lock().await;
        let existing = subscriptions.iter_mut().find(|row| {
            row.list_id == list_id && !row.is_deleted() && row.email == subscription.email
        });

        if let Some(row) = existing {
            row.merge(subscription, status);
            return Ok(row.clone());
        }

        let row = Subscription::create(list_id, generate_cid(), subscription, status);
        subscriptions.push(row.clone());

        Ok(row)
    }

    async fn set_status(
        &self,
        list_id: Uuid,
        id: Uuid,
        status: SubscriptionStatus,
    ) -> Result<Option<Subscription>, StoreError> {
        let mut subscriptions = self.subscriptions.lock().await;
        let row = subscriptions
            .iter_mut()
            .find(|row| row.list_id == list_id && !row.is_deleted() && row.id == id);

        Ok(row.map(|row| {
            row.status = status;
            row.updated_at = Utc::now();
            row.clone()
        }))
    }

    async fn mark_deleted(&self, list_id: Uuid, cid: &str) -> Result<Option<Subscription>, StoreError> {
        let mut subscriptions = self.subscriptions.lock().await;
        let row = subscriptions
            .iter_mut()
            .find(|row| row.list_id == list_id && !row.is_deleted() && row.cid == cid);

        Ok(row.map(|row| {
            row.deleted_at = Some(Utc::now());
            row.clone()
        }))
    }

    async fn update_email(
        &self,
        list_id: Uuid,
        id: Uuid,
        email: &SubscriberEmail,
    ) -> Result<Option<Subscription>, StoreError> {
        let mut subscriptions = self.subscriptions.lock().await;
        let taken = subscriptions.iter().any(|row| {
            row.list_id == list_id && !row.is_deleted() && row.id != id && &row.email == email
        });

        if taken {
            return Err(StoreError::Duplicate(format!(
                "{} is already subscribed to this list",
                email
            )));
        }

        let row = subscriptions
            .iter_mut()
            .find(|row| row.list_id == list_id && !row.is_deleted() && row.id == id);

        Ok(row.map(|row| {
            row.email = email.clone();
            row.updated_at = Utc::now();
            row.clone()
        }))
    }

    async fn list(
        &self,
        list_id: Uuid,
        offset: u64,
        limit: u64,
    ) -> Result<(Vec<Subscription>, u64), StoreError> {
        let subscriptions = self.subscriptions.lock().await;
        let live: Vec<Subscription> = subscriptions
            .iter()
            .filter(|row| row.list_id == list_id && !row.is_deleted())
            .cloned()
            .collect();

        Ok(page(&live, offset, limit))
    }

    async fn list_ids_with_email(&self, email: &SubscriberEmail) -> Result<Vec<Uuid>, StoreError> {
        let subscriptions = self.subscriptions.lock().await;
        Ok(subscriptions
            .iter()
            .filter(|row| !row.is_deleted() && &row.email == email)
            .map(|row| row.list_id)
            .collect())
    }
}

#[async_trait]
impl BlacklistStore for InMemoryStore {
    async fn add(&self, email: &SubscriberEmail) -> Result<(), StoreError> {
        self.blacklist
            .lock()
            .await
            .insert(email.as_ref().to_string());

        Ok(())
    }

    async fn remove(&self, email: &SubscriberEmail) -> Result<bool, StoreError> {
        Ok(self.blacklist.lock().await.remove(email.as_ref()))
    }

    async fn contains(&self, email: &SubscriberEmail) -> Result<bool, StoreError> {
        Ok(self.blacklist.lock().await.contains(email.as_ref()))
    }

    async fn search(
        &self,
        offset: u64,
        limit: u64,
        fragment: &str,
    ) -> Result<(Vec<String>, u64), StoreError> {
        let blacklist = self.blacklist.lock().await;
        let fragment = fragment.trim().to_lowercase();
        let matches: Vec<String> = blacklist
            .iter()
            .filter(|email| email.contains(&fragment))
            .cloned()
            .collect();

        Ok(page(&matches, offset, limit))
    }
}

#[async_trait]
impl ConfirmationStore for InMemoryStore {
    async fn insert(&self, confirmation: &Confirmation) -> Result<(), StoreError> {
        let mut confirmations = self.confirmations.lock().await;

        if confirmations.contains_key(&confirmation.cid) {
            return Err(StoreError::Duplicate(String::from(
                "Confirmation token is already in use",
            )));
        }

        confirmations.insert(confirmation.cid.clone(), confirmation.clone());

        Ok(())
    }

    async fn get(&self, cid: &str) -> Result<Option<Confirmation>, StoreError> {
        Ok(self.confirmations.lock().await.get(cid).cloned())
    }

    async fn take(&self, cid: &str) -> Result<Option<Confirmation>, StoreError> {
        Ok(self.confirmations.lock().await.remove(cid))
    }
}
