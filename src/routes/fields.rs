use actix_web::{web, HttpResponse};

use crate::domain::field::NewField;
use crate::domain::subscription_input::SubscriptionInput;
use crate::engine::{SubscriptionEngine, SubscriptionError};
use crate::routes::{data, InputBody};

#[tracing::instrument(name = "Create field handler", skip(body, engine), fields(list = %list))]
pub async fn handle_create_field(
    list: web::Path<String>,
    body: InputBody,
    engine: web::Data<SubscriptionEngine>,
) -> Result<HttpResponse, SubscriptionError> {
    let list = engine.find_list(&list).await?;
    let input = SubscriptionInput::from_json(&body);
    let value = |key: &str| input.get(key).unwrap_or_default();
    let field = NewField::parse(
        value("NAME"),
        value("KEY"),
        value("DESCRIPTION"),
        value("DEFAULT"),
        value("TYPE"),
        input.get("GROUP"),
        value("VISIBLE"),
    )
    .map_err(SubscriptionError::Invalid)?
    .with_group_template(value("GROUP_TEMPLATE"));

    Ok(data(engine.create_field(&list, field).await?))
}
