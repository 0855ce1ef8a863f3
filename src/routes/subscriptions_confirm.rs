use actix_web::http::StatusCode;
use actix_web::{web, HttpResponse, ResponseError};
use serde::Deserialize;

use crate::domain::mailing_list::MailingList;
use crate::email_client::EmailClient;
use crate::engine::{ConfirmOutcome, SubscriptionEngine, SubscriptionError};
use crate::routes::data;
use crate::startup::ApplicationBaseUrl;

#[derive(Deserialize, Debug)]
pub struct Parameters {
    pub token: String,
}

#[tracing::instrument(
    name = "Confirm a pending subscription change",
    skip(engine, parameters),
    fields(token = %parameters.token)
)]
pub async fn handle_confirm(
    parameters: web::Query<Parameters>,
    engine: web::Data<SubscriptionEngine>,
) -> Result<HttpResponse, SubscriptionError> {
    let response = match engine.confirm(&parameters.token).await? {
        ConfirmOutcome::Subscribed(subscription) => serde_json::json!({
            "id": subscription.cid,
            "subscribed": true,
        }),
        ConfirmOutcome::AddressChanged(subscription) => serde_json::json!({
            "id": subscription.id,
            "changedemail": true,
        }),
    };

    Ok(data(response))
}

/// Sends the mail of an outstanding confirmation again. The token stays valid.
#[tracing::instrument(
    name = "Resend a confirmation email",
    skip(engine, email_client, base_url, parameters),
    fields(token = %parameters.token)
)]
pub async fn handle_resend_confirmation(
    parameters: web::Query<Parameters>,
    engine: web::Data<SubscriptionEngine>,
    email_client: web::Data<EmailClient>,
    base_url: web::Data<ApplicationBaseUrl>,
) -> Result<HttpResponse, ResendConfirmationError> {
    let pending = engine.pending_confirmation(&parameters.token).await?;
    let list: MailingList = engine.find_list(&pending.list_id.to_string()).await?;

    email_client
        .send_confirmation(
            &list,
            pending.payload.recipient(),
            &base_url.0,
            &pending.token,
            pending.kind,
        )
        .await
        .map_err(ResendConfirmationError::SendEmail)?;

    Ok(data(serde_json::json!({ "id": pending.token, "sent": true })))
}

#[derive(thiserror::Error)]
pub enum ResendConfirmationError {
    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
    #[error("Failed to send the confirmation email.")]
    SendEmail(#[source] reqwest::Error),
}

impl std::fmt::Debug for ResendConfirmationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::store::error_chain_fmt(self, f)
    }
}

impl ResponseError for ResendConfirmationError {
    fn status_code(&self) -> StatusCode {
        match self {
            ResendConfirmationError::Subscription(err) => err.status_code(),
            ResendConfirmationError::SendEmail(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            ResendConfirmationError::Subscription(err) => err.error_response(),
            ResendConfirmationError::SendEmail(_) => {
                tracing::error!("{:?}", self);
                HttpResponse::build(self.status_code()).json(serde_json::json!({
                    "error": self.to_string(),
                    "data": [],
                }))
            }
        }
    }
}
