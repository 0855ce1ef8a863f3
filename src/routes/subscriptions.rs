use actix_web::{web, HttpRequest, HttpResponse};

use crate::domain::confirmation::ConfirmationKind;
use crate::domain::subscription_input::SubscriptionInput;
use crate::email_client::EmailClient;
use crate::engine::{SubscribeOptions, SubscribeOutcome, SubscriptionEngine, SubscriptionError};
use crate::routes::{data, required_email, requester_ip, InputBody, PageParameters};
use crate::startup::ApplicationBaseUrl;

#[tracing::instrument(
    name = "Subscribe handler",
    skip(body, request, engine, email_client, base_url),
    fields(list = %list)
)]
pub async fn handle_subscribe(
    list: web::Path<String>,
    body: InputBody,
    request: HttpRequest,
    engine: web::Data<SubscriptionEngine>,
    email_client: web::Data<EmailClient>,
    base_url: web::Data<ApplicationBaseUrl>,
) -> Result<HttpResponse, SubscriptionError> {
    let list = engine.find_list(&list).await?;
    let input = SubscriptionInput::from_json(&body);
    let resolved = engine.resolve_subscription(&list, &input).await?;

    if !resolved.warnings.is_empty() {
        tracing::warn!("Subscription resolved with warnings: {:?}", resolved.warnings);
    }

    let recipient = resolved.subscription.email.clone();
    let requester_ip = requester_ip(&request);
    let outcome = engine
        .subscribe(
            &list,
            resolved.subscription,
            SubscribeOptions::from_input(&input),
            requester_ip.as_deref(),
        )
        .await?;

    if let SubscribeOutcome::ConfirmationRequired { token } = &outcome {
        // The confirmation is already stored; a failed delivery can be retried through the resend endpoint.
        if let Err(err) = email_client
            .send_confirmation(&list, &recipient, &base_url.0, token, ConfirmationKind::Subscribe)
            .await
        {
            tracing::error!("Failed to send a confirmation email to {}: {:?}", recipient, err);
        }
    }

    Ok(data(serde_json::json!({ "id": outcome.public_id() })))
}

#[tracing::instrument(name = "Unsubscribe handler", skip(body, engine), fields(list = %list))]
pub async fn handle_unsubscribe(
    list: web::Path<String>,
    body: InputBody,
    engine: web::Data<SubscriptionEngine>,
) -> Result<HttpResponse, SubscriptionError> {
    let list = engine.find_list(&list).await?;
    let email = required_email(&SubscriptionInput::from_json(&body), "EMAIL")?;
    let outcome = engine.unsubscribe(&list, &email).await?;

    Ok(data(serde_json::json!({
        "id": outcome.subscription.id,
        "unsubscribed": true,
    })))
}

#[tracing::instrument(name = "Delete subscription handler", skip(body, engine), fields(list = %list))]
pub async fn handle_delete_subscription(
    list: web::Path<String>,
    body: InputBody,
    engine: web::Data<SubscriptionEngine>,
) -> Result<HttpResponse, SubscriptionError> {
    let list = engine.find_list(&list).await?;
    let email = required_email(&SubscriptionInput::from_json(&body), "EMAIL")?;
    let subscription = engine.delete_subscription(&list, &email).await?;

    Ok(data(serde_json::json!({
        "id": subscription.id,
        "deleted": true,
    })))
}

#[tracing::instrument(name = "List subscriptions handler", skip(engine), fields(list = %list))]
pub async fn handle_list_subscriptions(
    list: web::Path<String>,
    parameters: web::Query<PageParameters>,
    engine: web::Data<SubscriptionEngine>,
) -> Result<HttpResponse, SubscriptionError> {
    let list = engine.find_list(&list).await?;
    let page = engine
        .list_subscriptions(
            &list,
            parameters.start(),
            parameters.limit(),
        )
        .await?;

    Ok(data(serde_json::json!({
        "total": page.total,
        "start": page.start,
        "limit": page.limit,
        "subscriptions": page.items,
    })))
}
