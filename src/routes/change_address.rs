use actix_web::{web, HttpRequest, HttpResponse};

use crate::domain::confirmation::ConfirmationKind;
use crate::domain::subscription_input::SubscriptionInput;
use crate::email_client::EmailClient;
use crate::engine::{ChangeAddressOutcome, SubscriptionEngine, SubscriptionError};
use crate::routes::{data, required_email, requester_ip, InputBody};
use crate::startup::ApplicationBaseUrl;

#[tracing::instrument(
    name = "Change email handler",
    skip(body, request, engine, email_client, base_url),
    fields(list = %list)
)]
pub async fn handle_change_address(
    list: web::Path<String>,
    body: InputBody,
    request: HttpRequest,
    engine: web::Data<SubscriptionEngine>,
    email_client: web::Data<EmailClient>,
    base_url: web::Data<ApplicationBaseUrl>,
) -> Result<HttpResponse, SubscriptionError> {
    let input = SubscriptionInput::from_json(&body);
    let old_email = required_email(&input, "EMAILOLD")?;
    let new_email = required_email(&input, "EMAILNEW")?;
    let list = engine.find_list(&list).await?;
    let requester_ip = requester_ip(&request);

    let outcome = engine
        .change_address(
            &list,
            &old_email,
            &new_email,
            input.flag("REQUIRE_CONFIRMATION"),
            requester_ip.as_deref(),
        )
        .await?;

    let response = match outcome {
        ChangeAddressOutcome::Changed(subscription) => serde_json::json!({
            "id": subscription.id,
            "changedemail": true,
        }),
        ChangeAddressOutcome::ConfirmationRequired { token } => {
            if let Err(err) = email_client
                .send_confirmation(
                    &list,
                    &new_email,
                    &base_url.0,
                    &token,
                    ConfirmationKind::ChangeAddress,
                )
                .await
            {
                tracing::error!("Failed to send a confirmation email to {}: {:?}", new_email, err);
            }

            serde_json::json!({ "id": token, "changedemail": false })
        }
    };

    Ok(data(response))
}
