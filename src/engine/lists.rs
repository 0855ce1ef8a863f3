use crate::domain::mailing_list::{MailingList, NewMailingList};
use crate::domain::subscriber_email::SubscriberEmail;
use crate::engine::{SubscriptionEngine, SubscriptionError};

impl SubscriptionEngine {
    /// Resolves a list by internal id, public cid or name.
    pub async fn find_list(&self, identifier: &str) -> Result<MailingList, SubscriptionError> {
        self.stores
            .lists
            .find_by_identifier(identifier)
            .await?
            .ok_or_else(|| SubscriptionError::NotFound(String::from("Selected listId not found")))
    }

    #[tracing::instrument(name = "Create a list", skip(self))]
    pub async fn create_list(&self, list: NewMailingList) -> Result<MailingList, SubscriptionError> {
        Ok(self.stores.lists.insert(list).await?)
    }

    pub async fn lists(&self) -> Result<Vec<MailingList>, SubscriptionError> {
        Ok(self.stores.lists.all().await?)
    }

    /// Lists holding a live subscription for `email`.
    pub async fn lists_with_email(
        &self,
        email: &SubscriberEmail,
    ) -> Result<Vec<MailingList>, SubscriptionError> {
        let mut lists = Vec::new();

        for list_id in self.stores.subscriptions.list_ids_with_email(email).await? {
            if let Some(list) = self.stores.lists.get(list_id).await? {
                lists.push(list);
            }
        }

        Ok(lists)
    }
}
