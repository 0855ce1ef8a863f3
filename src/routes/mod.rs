use actix_web::http::StatusCode;
use actix_web::{HttpRequest, HttpResponse, ResponseError};
use serde::Serialize;

use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscription_input::SubscriptionInput;
use crate::engine::{ErrorKind, SubscriptionError};

mod blacklist;
mod change_address;
mod fields;
mod health_check;
mod lists;
mod subscriptions;
mod subscriptions_confirm;

pub use blacklist::{handle_add_to_blacklist, handle_remove_from_blacklist, handle_search_blacklist};
pub use change_address::handle_change_address;
pub use fields::handle_create_field;
pub use health_check::health_check;
pub use lists::{handle_create_list, handle_get_list, handle_lists, handle_lists_with_email};
pub use subscriptions::{
    handle_delete_subscription, handle_list_subscriptions, handle_subscribe, handle_unsubscribe,
};
pub use subscriptions_confirm::{handle_confirm, handle_resend_confirmation};

const DEFAULT_PAGE_LIMIT: u64 = 10000;

#[derive(serde::Deserialize, Debug)]
pub struct PageParameters {
    pub start: Option<u64>,
    pub limit: Option<u64>,
    pub search: Option<String>,
}

impl PageParameters {
    pub fn start(&self) -> u64 {
        self.start.unwrap_or(0)
    }

    pub fn limit(&self) -> u64 {
        self.limit.unwrap_or(DEFAULT_PAGE_LIMIT)
    }
}

/// Request bodies are loose JSON objects; values are folded into a [`SubscriptionInput`].
pub type InputBody = actix_web::web::Json<serde_json::Map<String, serde_json::Value>>;

impl ResponseError for SubscriptionError {
    fn status_code(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Invalid => StatusCode::BAD_REQUEST,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        if self.kind() == ErrorKind::Internal {
            tracing::error!("Request failed: {:?}", self);
        }

        HttpResponse::build(self.status_code()).json(serde_json::json!({
            "error": self.to_string(),
            "data": [],
        }))
    }
}

pub(crate) fn data<T: Serialize>(data: T) -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "data": data }))
}

pub(crate) fn requester_ip(request: &HttpRequest) -> Option<String> {
    request
        .connection_info()
        .realip_remote_addr()
        .map(String::from)
}

/// Required address argument such as `EMAIL` or `EMAILNEW`.
pub(crate) fn required_email(
    input: &SubscriptionInput,
    key: &str,
) -> Result<SubscriberEmail, SubscriptionError> {
    let email = input
        .non_empty(key)
        .ok_or_else(|| SubscriptionError::Invalid(format!("{} argument is required", key)))?;

    SubscriberEmail::parse(email.to_string()).map_err(SubscriptionError::Invalid)
}
