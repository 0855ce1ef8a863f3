use actix_web::{web, HttpResponse};

use crate::domain::subscription_input::SubscriptionInput;
use crate::engine::{SubscriptionEngine, SubscriptionError};
use crate::routes::{data, InputBody, PageParameters};

#[tracing::instrument(name = "Add to blacklist handler", skip(body, engine))]
pub async fn handle_add_to_blacklist(
    body: InputBody,
    engine: web::Data<SubscriptionEngine>,
) -> Result<HttpResponse, SubscriptionError> {
    let input = SubscriptionInput::from_json(&body);
    engine
        .blacklist()
        .add(input.get("EMAIL").unwrap_or_default())
        .await?;

    Ok(data(Vec::<String>::new()))
}

#[tracing::instrument(name = "Remove from blacklist handler", skip(body, engine))]
pub async fn handle_remove_from_blacklist(
    body: InputBody,
    engine: web::Data<SubscriptionEngine>,
) -> Result<HttpResponse, SubscriptionError> {
    let input = SubscriptionInput::from_json(&body);
    engine
        .blacklist()
        .remove(input.get("EMAIL").unwrap_or_default())
        .await?;

    Ok(data(Vec::<String>::new()))
}

#[tracing::instrument(name = "Search blacklist handler", skip(engine))]
pub async fn handle_search_blacklist(
    parameters: web::Query<PageParameters>,
    engine: web::Data<SubscriptionEngine>,
) -> Result<HttpResponse, SubscriptionError> {
    let page = engine
        .blacklist()
        .search(
            parameters.start(),
            parameters.limit(),
            parameters.search.as_deref().unwrap_or_default(),
        )
        .await?;

    Ok(data(serde_json::json!({
        "total": page.total,
        "start": page.start,
        "limit": page.limit,
        "emails": page.items,
    })))
}
