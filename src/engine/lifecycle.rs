use crate::domain::confirmation::ConfirmationPayload;
use crate::domain::mailing_list::MailingList;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscription::{NewSubscription, Page, Subscription};
use crate::domain::subscription_input::SubscriptionInput;
use crate::domain::subscription_status::SubscriptionStatus;
use crate::engine::{RedeemedConfirmation, SubscriptionEngine, SubscriptionError};

/// How a subscribe request enters the state machine.
///
/// | require_confirmation | force_subscribe | result                                  |
/// |----------------------|-----------------|-----------------------------------------|
/// | true                 | any             | token issued, no row until redemption   |
/// | false                | true            | row written as `Active`                 |
/// | false                | false           | row written as `Pending`                |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    pub require_confirmation: bool,
    pub force_subscribe: bool,
}

impl SubscribeOptions {
    pub fn from_input(input: &SubscriptionInput) -> SubscribeOptions {
        SubscribeOptions {
            require_confirmation: input.flag("REQUIRE_CONFIRMATION"),
            force_subscribe: input.flag("FORCE_SUBSCRIBE"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubscribeOutcome {
    ConfirmationRequired { token: String },
    Subscribed(Subscription),
}

impl SubscribeOutcome {
    /// Public identifier handed back to the caller: the token or the subscription cid.
    pub fn public_id(&self) -> &str {
        match self {
            SubscribeOutcome::ConfirmationRequired { token } => token,
            SubscribeOutcome::Subscribed(subscription) => &subscription.cid,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfirmOutcome {
    Subscribed(Subscription),
    AddressChanged(Subscription),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnsubscribeOutcome {
    pub subscription: Subscription,
    pub already_unsubscribed: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeAddressOutcome {
    Changed(Subscription),
    ConfirmationRequired { token: String },
}

fn subscription_not_found(message: &str) -> SubscriptionError {
    SubscriptionError::NotFound(message.to_string())
}

impl SubscriptionEngine {
    #[tracing::instrument(
        name = "Subscribe to a list",
        skip(self, list, subscription),
        fields(list_id = %list.id, subscriber_email = %subscription.email)
    )]
    pub async fn subscribe(
        &self,
        list: &MailingList,
        subscription: NewSubscription,
        options: SubscribeOptions,
        requester_ip: Option<&str>,
    ) -> Result<SubscribeOutcome, SubscriptionError> {
        self.email_validator
            .validate(&subscription.email, false)
            .map_err(SubscriptionError::Invalid)?;
        self.blacklist.ensure_allowed(&subscription.email).await?;

        if options.require_confirmation {
            let payload = ConfirmationPayload::Subscribe(subscription);
            let token = self
                .confirmations
                .issue(list, requester_ip, &payload)
                .await?;

            return Ok(SubscribeOutcome::ConfirmationRequired { token });
        }

        let status = SubscriptionStatus::for_subscribe(options.force_subscribe);
        let subscription = self
            .stores
            .subscriptions
            .upsert(list.id, &subscription, status)
            .await?;

        Ok(SubscribeOutcome::Subscribed(subscription))
    }

    /// Redeems a confirmation token and applies the mutation it captured. The token is spent
    /// before the mutation is checked, so a refused redemption (blacklisted or taken address)
    /// still consumes it and the caller has to start over.
    #[tracing::instrument(name = "Confirm a pending mutation", skip(self))]
    pub async fn confirm(&self, token: &str) -> Result<ConfirmOutcome, SubscriptionError> {
        let redeemed = self.confirmations.redeem(token).await?;
        let list = self
            .stores
            .lists
            .get(redeemed.list_id)
            .await?
            .ok_or_else(|| subscription_not_found("Selected listId not found"))?;

        match redeemed.payload {
            ConfirmationPayload::Subscribe(subscription) => {
                self.blacklist.ensure_allowed(&subscription.email).await?;
                let subscription = self
                    .stores
                    .subscriptions
                    .upsert(list.id, &subscription, SubscriptionStatus::Active)
                    .await?;

                Ok(ConfirmOutcome::Subscribed(subscription))
            }
            ConfirmationPayload::ChangeAddress {
                old_email,
                new_email,
            } => {
                let current = self.address_change_target(&list, &old_email, &new_email).await?;
                let subscription = self.apply_address_change(&list, &current, &new_email).await?;

                Ok(ConfirmOutcome::AddressChanged(subscription))
            }
        }
    }

    /// Outstanding confirmation for `token`, left in place so its mail can be sent again.
    pub async fn pending_confirmation(
        &self,
        token: &str,
    ) -> Result<RedeemedConfirmation, SubscriptionError> {
        self.confirmations.pending(token).await
    }

    /// Moves a live subscription to `Unsubscribed`. Repeating it succeeds without touching
    /// the row and reports `already_unsubscribed`.
    #[tracing::instrument(
        name = "Unsubscribe from a list",
        skip(self, list),
        fields(list_id = %list.id, subscriber_email = %email)
    )]
    pub async fn unsubscribe(
        &self,
        list: &MailingList,
        email: &SubscriberEmail,
    ) -> Result<UnsubscribeOutcome, SubscriptionError> {
        let subscription = self
            .stores
            .subscriptions
            .get_by_email(list.id, email)
            .await?
            .ok_or_else(|| subscription_not_found("Subscription with given email not found"))?;

        if subscription.status.is_unsubscribed() {
            return Ok(UnsubscribeOutcome {
                subscription,
                already_unsubscribed: true,
            });
        }

        let subscription = self
            .stores
            .subscriptions
            .set_status(list.id, subscription.id, SubscriptionStatus::Unsubscribed)
            .await?
            .ok_or_else(|| subscription_not_found("Subscription with given email not found"))?;

        Ok(UnsubscribeOutcome {
            subscription,
            already_unsubscribed: false,
        })
    }

    /// Tombstones the subscription, freeing its address for a fresh subscribe.
    #[tracing::instrument(
        name = "Delete a subscription",
        skip(self, list),
        fields(list_id = %list.id, subscriber_email = %email)
    )]
    pub async fn delete_subscription(
        &self,
        list: &MailingList,
        email: &SubscriberEmail,
    ) -> Result<Subscription, SubscriptionError> {
        let subscription = self
            .stores
            .subscriptions
            .get_by_email(list.id, email)
            .await?
            .ok_or_else(|| subscription_not_found("Subscription not found"))?;

        self.stores
            .subscriptions
            .mark_deleted(list.id, &subscription.cid)
            .await?
            .ok_or_else(|| subscription_not_found("Subscription not found"))
    }

    /// Points a subscription at a new address, directly or behind a confirmation. The row
    /// keeps its id, cid, status and attributes.
    #[tracing::instrument(
        name = "Change a subscription address",
        skip(self, list),
        fields(list_id = %list.id, old_email = %old_email, new_email = %new_email)
    )]
    pub async fn change_address(
        &self,
        list: &MailingList,
        old_email: &SubscriberEmail,
        new_email: &SubscriberEmail,
        require_confirmation: bool,
        requester_ip: Option<&str>,
    ) -> Result<ChangeAddressOutcome, SubscriptionError> {
        let current = self.address_change_target(list, old_email, new_email).await?;

        if require_confirmation {
            let payload = ConfirmationPayload::ChangeAddress {
                old_email: old_email.clone(),
                new_email: new_email.clone(),
            };
            let token = self
                .confirmations
                .issue(list, requester_ip, &payload)
                .await?;

            return Ok(ChangeAddressOutcome::ConfirmationRequired { token });
        }

        let subscription = self.apply_address_change(list, &current, new_email).await?;

        Ok(ChangeAddressOutcome::Changed(subscription))
    }

    pub async fn list_subscriptions(
        &self,
        list: &MailingList,
        start: u64,
        limit: u64,
    ) -> Result<Page<Subscription>, SubscriptionError> {
        let (items, total) = self
            .stores
            .subscriptions
            .list(list.id, start, limit)
            .await?;

        Ok(Page {
            total,
            start,
            limit,
            items,
        })
    }

    /// Blacklist gate, lookup of the current row and acceptability of the new address,
    /// in that order.
    async fn address_change_target(
        &self,
        list: &MailingList,
        old_email: &SubscriberEmail,
        new_email: &SubscriberEmail,
    ) -> Result<Subscription, SubscriptionError> {
        if self.blacklist.is_blacklisted(new_email).await? {
            return Err(SubscriptionError::Conflict(String::from(
                "New email is blacklisted",
            )));
        }

        let current = self
            .stores
            .subscriptions
            .get_by_email(list.id, old_email)
            .await?
            .ok_or_else(|| subscription_not_found("Subscription with given old email not found"))?;

        self.email_validator
            .validate(new_email, self.strict_address_change)
            .map_err(|err| SubscriptionError::Invalid(format!("New email not valid: {}", err)))?;

        if new_email == old_email {
            return Err(SubscriptionError::Invalid(String::from(
                "New email matches the current address",
            )));
        }

        let holder = self
            .stores
            .subscriptions
            .get_by_email(list.id, new_email)
            .await?;
        if holder.map_or(false, |holder| holder.id != current.id) {
            return Err(SubscriptionError::Conflict(format!(
                "{} is already subscribed to this list",
                new_email
            )));
        }

        Ok(current)
    }

    async fn apply_address_change(
        &self,
        list: &MailingList,
        current: &Subscription,
        new_email: &SubscriberEmail,
    ) -> Result<Subscription, SubscriptionError> {
        self.stores
            .subscriptions
            .update_email(list.id, current.id, new_email)
            .await?
            .ok_or_else(|| subscription_not_found("Subscription with given old email not found"))
    }
}
