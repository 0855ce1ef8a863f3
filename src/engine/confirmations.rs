use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::cid::generate_confirmation_token;
use crate::domain::confirmation::{Confirmation, ConfirmationKind, ConfirmationPayload};
use crate::domain::mailing_list::MailingList;
use crate::engine::SubscriptionError;
use crate::store::{ConfirmationStore, StoreError};

/// Issues and redeems single-use confirmation tokens.
pub struct ConfirmationWorkflow {
    store: Arc<dyn ConfirmationStore>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RedeemedConfirmation {
    pub token: String,
    pub list_id: Uuid,
    pub kind: ConfirmationKind,
    pub requester_ip: Option<String>,
    pub payload: ConfirmationPayload,
    /// The payload exactly as it was stored at issuance.
    pub data: String,
}

impl RedeemedConfirmation {
    fn decode(confirmation: Confirmation) -> Result<RedeemedConfirmation, SubscriptionError> {
        let payload: ConfirmationPayload =
            serde_json::from_str(&confirmation.data).map_err(StoreError::from)?;

        if payload.kind() != confirmation.action {
            return Err(SubscriptionError::Internal(StoreError::Corrupted(format!(
                "confirmation {} carries a {} payload",
                confirmation.cid,
                payload.kind().as_ref()
            ))));
        }

        Ok(RedeemedConfirmation {
            token: confirmation.cid,
            list_id: confirmation.list_id,
            kind: confirmation.action,
            requester_ip: confirmation.requester_ip,
            payload,
            data: confirmation.data,
        })
    }
}

impl ConfirmationWorkflow {
    pub fn new(store: Arc<dyn ConfirmationStore>) -> ConfirmationWorkflow {
        ConfirmationWorkflow { store }
    }

    /// Stores the pending mutation and returns its token. The record is durable before the
    /// token is handed out, so mail delivery can fail or be retried independently.
    #[tracing::instrument(
        name = "Issue a confirmation",
        skip(self, list, payload),
        fields(list_id = %list.id, action = %payload.kind().as_ref())
    )]
    pub async fn issue(
        &self,
        list: &MailingList,
        requester_ip: Option<&str>,
        payload: &ConfirmationPayload,
    ) -> Result<String, SubscriptionError> {
        let confirmation = Confirmation {
            cid: generate_confirmation_token(),
            list_id: list.id,
            action: payload.kind(),
            requester_ip: requester_ip.map(String::from),
            data: serde_json::to_string(payload).map_err(StoreError::from)?,
            created_at: Utc::now(),
        };

        self.store.insert(&confirmation).await.map_err(|err| {
            tracing::error!("Failed to store confirmation: {:?}", err);
            SubscriptionError::Internal(err)
        })?;

        Ok(confirmation.cid)
    }

    /// Consumes the token. Exactly one of several concurrent redemptions succeeds; the
    /// others, and any later attempt, get `NotFound`.
    #[tracing::instrument(name = "Redeem a confirmation", skip(self))]
    pub async fn redeem(&self, token: &str) -> Result<RedeemedConfirmation, SubscriptionError> {
        let confirmation = self
            .store
            .take(token)
            .await?
            .ok_or_else(confirmation_not_found)?;

        RedeemedConfirmation::decode(confirmation)
    }

    /// Looks at an outstanding token without consuming it, e.g. to send its mail again.
    pub async fn pending(&self, token: &str) -> Result<RedeemedConfirmation, SubscriptionError> {
        let confirmation = self
            .store
            .get(token)
            .await?
            .ok_or_else(confirmation_not_found)?;

        RedeemedConfirmation::decode(confirmation)
    }
}

fn confirmation_not_found() -> SubscriptionError {
    SubscriptionError::NotFound(String::from("Confirmation not found"))
}
