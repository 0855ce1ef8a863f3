//! Subscription lifecycle engine.
//!
//! Decides how raw input becomes a subscription record, drives the double opt-in
//! confirmation workflow and guards address changes. Persistence goes through the
//! collaborators in [`crate::store`]; mail delivery is left to the caller.

use std::sync::Arc;

use crate::domain::subscriber_email::{EmailValidator, SyntaxEmailValidator};
use crate::store::Stores;

pub mod blacklist;
pub mod confirmations;
pub mod error;
pub mod fields;
pub mod lifecycle;
pub mod lists;

pub use blacklist::BlacklistGuard;
pub use confirmations::{ConfirmationWorkflow, RedeemedConfirmation};
pub use error::{ErrorKind, SubscriptionError};
pub use fields::{resolve_fields, CreatedField, ResolveWarning, ResolvedFields, ResolvedSubscription};
pub use lifecycle::{
    ChangeAddressOutcome, ConfirmOutcome, SubscribeOptions, SubscribeOutcome, UnsubscribeOutcome,
};

pub struct SubscriptionEngine {
    stores: Stores,
    email_validator: Arc<dyn EmailValidator>,
    blacklist: BlacklistGuard,
    confirmations: ConfirmationWorkflow,
    strict_address_change: bool,
}

impl SubscriptionEngine {
    pub fn new(stores: Stores) -> SubscriptionEngine {
        SubscriptionEngine {
            blacklist: BlacklistGuard::new(stores.blacklist.clone()),
            confirmations: ConfirmationWorkflow::new(stores.confirmations.clone()),
            email_validator: Arc::new(SyntaxEmailValidator),
            strict_address_change: true,
            stores,
        }
    }

    pub fn with_email_validator(mut self, email_validator: Arc<dyn EmailValidator>) -> Self {
        self.email_validator = email_validator;
        self
    }

    /// Whether a replacement address must pass the strict validation policy.
    pub fn with_strict_address_change(mut self, strict: bool) -> Self {
        self.strict_address_change = strict;
        self
    }

    pub fn blacklist(&self) -> &BlacklistGuard {
        &self.blacklist
    }

    pub fn confirmations(&self) -> &ConfirmationWorkflow {
        &self.confirmations
    }
}
