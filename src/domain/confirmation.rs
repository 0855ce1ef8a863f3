use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscription::NewSubscription;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfirmationKind {
    Subscribe,
    ChangeAddress,
}

impl AsRef<str> for ConfirmationKind {
    fn as_ref(&self) -> &str {
        match self {
            ConfirmationKind::Subscribe => "subscribe",
            ConfirmationKind::ChangeAddress => "change-address",
        }
    }
}

/// The pending mutation a confirmation carries until it is redeemed.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "action", content = "data", rename_all = "kebab-case")]
pub enum ConfirmationPayload {
    Subscribe(NewSubscription),
    ChangeAddress {
        old_email: SubscriberEmail,
        new_email: SubscriberEmail,
    },
}

impl ConfirmationPayload {
    pub fn kind(&self) -> ConfirmationKind {
        match self {
            ConfirmationPayload::Subscribe(_) => ConfirmationKind::Subscribe,
            ConfirmationPayload::ChangeAddress { .. } => ConfirmationKind::ChangeAddress,
        }
    }

    /// Address the confirmation mail goes to.
    pub fn recipient(&self) -> &SubscriberEmail {
        match self {
            ConfirmationPayload::Subscribe(subscription) => &subscription.email,
            ConfirmationPayload::ChangeAddress { new_email, .. } => new_email,
        }
    }
}

/// A stored confirmation. `data` is the serialized payload, kept verbatim.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Confirmation {
    pub cid: String,
    pub list_id: Uuid,
    pub action: ConfirmationKind,
    pub requester_ip: Option<String>,
    pub data: String,
    pub created_at: DateTime<Utc>,
}
