use serde_json::json;

use crate::helpers::{data, TestApp};

async fn subscribe_with_confirmation(test_app: &TestApp, list: &str) -> String {
    let response = test_app
        .subscribe(
            list,
            json!({ "email": "frank@test.com", "require_confirmation": "yes" }),
        )
        .await;

    assert_eq!(200, response.status().as_u16());

    data(response).await["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn confirmations_without_token_are_rejected_with_400() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app.get("/subscriptions/confirm").await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn subscribe_with_confirmation_sends_an_email_and_creates_nothing() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("weekly").await;
    test_app.mount_email_server(200).await;

    let token = subscribe_with_confirmation(&test_app, &list).await;

    let received_requests = test_app.email_server.received_requests().await.unwrap();
    assert_eq!(received_requests.len(), 1);

    let confirmation_link = test_app.get_confirmation_link(&received_requests[0]).await;
    assert_eq!(confirmation_link.token(), token);
    assert!(test_app.subscriptions(&list).await.is_empty());
}

#[tokio::test]
async fn clicking_the_confirmation_link_activates_the_subscription_once() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("weekly").await;
    test_app.mount_email_server(200).await;
    subscribe_with_confirmation(&test_app, &list).await;

    let confirmation_link = test_app.confirmation_link(0).await;
    let response = test_app
        .client
        .get(confirmation_link.html.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);

    let subscriptions = test_app.subscriptions(&list).await;
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0]["status"], "active");
    assert_eq!(data(response).await["id"], subscriptions[0]["cid"]);

    let again = test_app
        .client
        .get(confirmation_link.html)
        .send()
        .await
        .unwrap();
    assert_eq!(again.status(), 404);
}

#[tokio::test]
async fn failed_delivery_keeps_the_token_and_it_can_be_resent() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("weekly").await;
    test_app.mount_email_server(500).await;

    let token = subscribe_with_confirmation(&test_app, &list).await;

    test_app.email_server.reset().await;
    test_app.mount_email_server(200).await;

    let response = test_app
        .post(
            &format!("/subscriptions/confirm/resend?token={}", token),
            json!({}),
        )
        .await;
    assert_eq!(response.status(), 200);

    let confirmation_link = test_app.confirmation_link(0).await;
    assert_eq!(confirmation_link.token(), token);

    let response = test_app
        .client
        .get(confirmation_link.html)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn resending_an_unknown_token_returns_404() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .post("/subscriptions/confirm/resend?token=unknown", json!({}))
        .await;

    assert_eq!(response.status(), 404);
}
