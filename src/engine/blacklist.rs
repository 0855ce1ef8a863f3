use std::sync::Arc;

use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscription::Page;
use crate::engine::SubscriptionError;
use crate::store::BlacklistStore;

/// Global deny-list gate. Consulted before anything creates a subscription or points one
/// at a new address.
pub struct BlacklistGuard {
    store: Arc<dyn BlacklistStore>,
}

fn parse_email(email: &str) -> Result<SubscriberEmail, SubscriptionError> {
    if email.trim().is_empty() {
        return Err(SubscriptionError::Invalid(String::from(
            "EMAIL argument is required",
        )));
    }

    SubscriberEmail::parse(email.to_string()).map_err(SubscriptionError::Invalid)
}

impl BlacklistGuard {
    pub fn new(store: Arc<dyn BlacklistStore>) -> BlacklistGuard {
        BlacklistGuard { store }
    }

    pub async fn is_blacklisted(&self, email: &SubscriberEmail) -> Result<bool, SubscriptionError> {
        Ok(self.store.contains(email).await?)
    }

    pub async fn ensure_allowed(&self, email: &SubscriberEmail) -> Result<(), SubscriptionError> {
        if self.is_blacklisted(email).await? {
            tracing::info!("Rejected blacklisted address {}", email);
            return Err(SubscriptionError::Conflict(format!(
                "{} is blacklisted",
                email
            )));
        }

        Ok(())
    }

    #[tracing::instrument(name = "Add an address to the blacklist", skip(self))]
    pub async fn add(&self, email: &str) -> Result<SubscriberEmail, SubscriptionError> {
        let email = parse_email(email)?;
        self.store.add(&email).await?;

        Ok(email)
    }

    /// `false` when the address was not blacklisted.
    #[tracing::instrument(name = "Remove an address from the blacklist", skip(self))]
    pub async fn remove(&self, email: &str) -> Result<bool, SubscriptionError> {
        let email = parse_email(email)?;

        Ok(self.store.remove(&email).await?)
    }

    pub async fn search(
        &self,
        start: u64,
        limit: u64,
        fragment: &str,
    ) -> Result<Page<String>, SubscriptionError> {
        let (items, total) = self.store.search(start, limit, fragment).await?;

        Ok(Page {
            total,
            start,
            limit,
            items,
        })
    }
}
