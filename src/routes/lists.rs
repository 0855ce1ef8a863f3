use actix_web::{web, HttpResponse};

use crate::domain::mailing_list::NewMailingList;
use crate::domain::subscriber_email::SubscriberEmail;
use crate::domain::subscription_input::SubscriptionInput;
use crate::engine::{SubscriptionEngine, SubscriptionError};
use crate::routes::{data, InputBody};

#[tracing::instrument(name = "Lists handler", skip(engine))]
pub async fn handle_lists(
    engine: web::Data<SubscriptionEngine>,
) -> Result<HttpResponse, SubscriptionError> {
    Ok(data(engine.lists().await?))
}

#[tracing::instrument(name = "Create list handler", skip(body, engine))]
pub async fn handle_create_list(
    body: InputBody,
    engine: web::Data<SubscriptionEngine>,
) -> Result<HttpResponse, SubscriptionError> {
    let input = SubscriptionInput::from_json(&body);
    let list = NewMailingList::parse(
        input.get("NAME").unwrap_or_default(),
        input.get("DESCRIPTION").unwrap_or_default(),
    )
    .map_err(SubscriptionError::Invalid)?;
    let list = engine.create_list(list).await?;

    Ok(data(serde_json::json!({ "id": list.id, "cid": list.cid })))
}

#[tracing::instrument(name = "Get list handler", skip(engine))]
pub async fn handle_get_list(
    id: web::Path<String>,
    engine: web::Data<SubscriptionEngine>,
) -> Result<HttpResponse, SubscriptionError> {
    Ok(data(engine.find_list(&id).await?))
}

#[tracing::instrument(name = "Lists with email handler", skip(engine))]
pub async fn handle_lists_with_email(
    email: web::Path<String>,
    engine: web::Data<SubscriptionEngine>,
) -> Result<HttpResponse, SubscriptionError> {
    let email = SubscriberEmail::parse(email.into_inner()).map_err(SubscriptionError::Invalid)?;

    Ok(data(engine.lists_with_email(&email).await?))
}
