use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscriber_name::SubscriberName;
use crate::domain::subscription_status::SubscriptionStatus;

/// Fully resolved subscription attributes, ready to be stored or captured in a confirmation.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct NewSubscription {
    pub email: SubscriberEmail,
    pub first_name: Option<SubscriberName>,
    pub last_name: Option<SubscriberName>,
    pub timezone: Option<String>,
    /// Custom field values keyed by storage column.
    pub attributes: BTreeMap<String, String>,
}

impl NewSubscription {
    pub fn new(email: SubscriberEmail) -> NewSubscription {
        NewSubscription {
            email,
            first_name: None,
            last_name: None,
            timezone: None,
            attributes: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Subscription {
    pub id: Uuid,
    pub cid: String,
    pub list_id: Uuid,
    pub email: SubscriberEmail,
    pub first_name: Option<SubscriberName>,
    pub last_name: Option<SubscriberName>,
    pub timezone: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Subscription {
    pub fn create(
        list_id: Uuid,
        cid: String,
        new: &NewSubscription,
        status: SubscriptionStatus,
    ) -> Self {
        let now = Utc::now();

        Subscription {
            id: Uuid::new_v4(),
            cid,
            list_id,
            email: new.email.clone(),
            first_name: new.first_name.clone(),
            last_name: new.last_name.clone(),
            timezone: new.timezone.clone(),
            attributes: new.attributes.clone(),
            status,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Lands a subscribe on an existing row: identity and status follow the merge rules,
    /// supplied values win, absent ones keep what is stored.
    pub fn merge(&mut self, new: &NewSubscription, requested: SubscriptionStatus) {
        if new.first_name.is_some() {
            self.first_name = new.first_name.clone();
        }
        if new.last_name.is_some() {
            self.last_name = new.last_name.clone();
        }
        if new.timezone.is_some() {
            self.timezone = new.timezone.clone();
        }
        self.attributes
            .extend(new.attributes.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.status = SubscriptionStatus::resubscribe(Some(self.status), requested);
        self.updated_at = Utc::now();
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct Page<T> {
    pub total: u64,
    pub start: u64,
    pub limit: u64,
    pub items: Vec<T>,
}
