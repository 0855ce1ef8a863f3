use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use std::time;

use crate::domain::confirmation::ConfirmationKind;
use crate::domain::mailing_list::MailingList;
use crate::domain::subscriber_email::SubscriberEmail;

const REQUEST_TIMEOUT: time::Duration = time::Duration::from_secs(10);

/// Mail dispatcher backed by a SendGrid-style HTTP API.
pub struct EmailClient {
    http_client: Client,
    base_url: String,
    sender: SubscriberEmail,
    api_key: Secret<String>,
}

#[derive(serde::Serialize)]
pub struct SendEmailBody {
    personalizations: Vec<SendgridPersonalization>,
    from: SendgridEmail,
    subject: String,
    content: Vec<SendgridContent>,
}

#[derive(serde::Serialize)]
struct SendgridEmail {
    email: String,
}

#[derive(serde::Serialize)]
struct SendgridPersonalization {
    to: Vec<SendgridEmail>,
}

#[derive(serde::Serialize)]
struct SendgridContent {
    #[serde(rename = "type")]
    content_type: String,
    value: String,
}

impl EmailClient {
    pub fn new(
        base_url: String,
        sender: SubscriberEmail,
        api_key: Secret<String>,
        timeout: Option<time::Duration>,
    ) -> Result<EmailClient, reqwest::Error> {
        let http_client = Client::builder()
            .timeout(timeout.unwrap_or(REQUEST_TIMEOUT))
            .build()?;

        Ok(EmailClient {
            http_client,
            base_url,
            sender,
            api_key,
        })
    }

    pub async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_content: &str,
    ) -> Result<(), reqwest::Error> {
        let url = format!("{}/mail/send", self.base_url);
        let body = SendEmailBody {
            from: SendgridEmail {
                email: String::from(self.sender.as_ref()),
            },
            personalizations: vec![SendgridPersonalization {
                to: vec![SendgridEmail {
                    email: String::from(recipient.as_ref()),
                }],
            }],
            subject: String::from(subject),
            content: vec![SendgridContent {
                content_type: String::from("text/html"),
                value: String::from(html_content),
            }],
        };

        self.http_client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.api_key.expose_secret()),
            )
            .json(&body)
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Sends the link that redeems `token`.
    #[tracing::instrument(
        name = "Send a confirmation email",
        skip(self, list, base_url, token),
        fields(list_id = %list.id, recipient = %recipient, action = %kind.as_ref())
    )]
    pub async fn send_confirmation(
        &self,
        list: &MailingList,
        recipient: &SubscriberEmail,
        base_url: &str,
        token: &str,
        kind: ConfirmationKind,
    ) -> Result<(), reqwest::Error> {
        let confirmation_link = format!("{}/subscriptions/confirm?token={}", base_url, token);
        let (subject, action) = match kind {
            ConfirmationKind::Subscribe => (
                format!("Please confirm your subscription to {}", list.name),
                "confirm your subscription",
            ),
            ConfirmationKind::ChangeAddress => (
                format!("Please confirm your new address for {}", list.name),
                "confirm your new address",
            ),
        };
        let html_body = format!(
            r#"<div><h1>{}</h1><p>Click <a href="{}">here</a> to {}.</p></div>"#,
            list.name, confirmation_link, action
        );

        self.send_email(recipient, &subject, &html_body).await
    }
}
