use serde_json::json;

use crate::helpers::{data, TestApp};

#[tokio::test]
async fn subscribe_returns_the_subscription_cid() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("weekly").await;

    let response = test_app
        .subscribe(
            &list,
            json!({ "email": "frank@test.com", "first_name": "Frank", "force_subscribe": "yes" }),
        )
        .await;

    assert_eq!(200, response.status().as_u16());

    let id = data(response).await["id"].as_str().unwrap().to_string();
    let subscriptions = test_app.subscriptions(&list).await;

    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0]["cid"], id.as_str());
    assert_eq!(subscriptions[0]["email"], "frank@test.com");
    assert_eq!(subscriptions[0]["first_name"], "Frank");
    assert_eq!(subscriptions[0]["status"], "active");
}

#[tokio::test]
async fn subscribe_without_force_is_pending() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("weekly").await;

    test_app
        .subscribe(&list, json!({ "EMAIL": "Frank@Test.com " }))
        .await;

    let subscriptions = test_app.subscriptions(&list).await;

    assert_eq!(subscriptions[0]["email"], "frank@test.com");
    assert_eq!(subscriptions[0]["status"], "pending");
}

#[tokio::test]
async fn subscribe_to_an_unknown_list_returns_404() {
    let test_app = TestApp::spawn_app().await;

    let response = test_app
        .subscribe("missing", json!({ "email": "frank@test.com" }))
        .await;

    assert_eq!(404, response.status().as_u16());

    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "Selected listId not found");
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn subscribe_returns_400_when_body_is_present_but_not_valid() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("weekly").await;

    // table-driven: every body below must be rejected
    let test_cases = vec![
        (json!({}), "missing email"),
        (json!({ "email": "" }), "empty email"),
        (json!({ "email": "test.com" }), "invalid email"),
    ];

    for (invalid_body, error_message) in test_cases {
        let response = test_app.subscribe(&list, invalid_body).await;

        assert_eq!(
            400,
            response.status().as_u16(),
            "The API did not fail with 400 status when payload was {}",
            error_message
        );
    }
}

#[tokio::test]
async fn subscribe_accepts_names_with_punctuation() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("weekly").await;

    let response = test_app
        .subscribe(
            &list,
            json!({
                "email": "anne@test.com",
                "first_name": "Anne (Annie)",
                "last_name": "\"Bo\"",
                "force_subscribe": true
            }),
        )
        .await;

    assert_eq!(200, response.status().as_u16());

    let subscriptions = test_app.subscriptions(&list).await;
    assert_eq!(subscriptions[0]["first_name"], "Anne (Annie)");
    assert_eq!(subscriptions[0]["last_name"], "\"Bo\"");
}

#[tokio::test]
async fn subscribing_twice_updates_the_same_subscription() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("weekly").await;

    let first = data(
        test_app
            .subscribe(&list, json!({ "email": "frank@test.com", "force_subscribe": true }))
            .await,
    )
    .await;
    let second = data(
        test_app
            .subscribe(&list, json!({ "email": "frank@test.com", "last_name": "Parejo" }))
            .await,
    )
    .await;

    assert_eq!(first["id"], second["id"]);

    let subscriptions = test_app.subscriptions(&list).await;
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0]["status"], "active");
    assert_eq!(subscriptions[0]["last_name"], "Parejo");
}

#[tokio::test]
async fn custom_fields_are_stored_as_attributes() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("weekly").await;
    let field = data(
        test_app
            .post(
                &format!("/field/{}", list),
                json!({ "name": "City", "type": "text", "visible": "yes" }),
            )
            .await,
    )
    .await;

    assert_eq!(field["tag"], "MERGE_CITY");

    test_app
        .subscribe(
            &list,
            json!({ "email": "frank@test.com", "merge_city": "Oslo", "unknown": "ignored" }),
        )
        .await;

    let subscriptions = test_app.subscriptions(&list).await;
    let attributes = subscriptions[0]["attributes"].as_object().unwrap();

    assert_eq!(attributes.len(), 1);
    assert_eq!(attributes.values().next().unwrap(), "Oslo");
}

#[tokio::test]
async fn unsubscribe_marks_the_subscription_and_can_be_repeated() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("weekly").await;
    test_app
        .subscribe(&list, json!({ "email": "frank@test.com", "force_subscribe": "1" }))
        .await;
    let id = test_app.subscriptions(&list).await[0]["id"].clone();

    for _ in 0..2 {
        let response = test_app
            .post(
                &format!("/unsubscribe/{}", list),
                json!({ "email": "frank@test.com" }),
            )
            .await;

        assert_eq!(200, response.status().as_u16());
        assert_eq!(
            data(response).await,
            json!({ "id": id, "unsubscribed": true })
        );
    }

    let subscriptions = test_app.subscriptions(&list).await;
    assert_eq!(subscriptions[0]["status"], "unsubscribed");
}

#[tokio::test]
async fn unsubscribe_rejects_missing_and_unknown_addresses() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("weekly").await;
    let path = format!("/unsubscribe/{}", list);

    let missing = test_app.post(&path, json!({})).await;
    let unknown = test_app
        .post(&path, json!({ "email": "nobody@test.com" }))
        .await;

    assert_eq!(400, missing.status().as_u16());
    assert_eq!(404, unknown.status().as_u16());
}

#[tokio::test]
async fn delete_removes_the_subscription_once() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("L1").await;
    let subscribed = data(
        test_app
            .subscribe(&list, json!({ "email": "a@x.com", "force_subscribe": "yes" }))
            .await,
    )
    .await;
    let id = test_app.subscriptions(&list).await[0]["id"].clone();
    assert_eq!(test_app.subscriptions(&list).await[0]["cid"], subscribed["id"]);
    let path = format!("/delete/{}", list);

    test_app
        .post(&format!("/unsubscribe/{}", list), json!({ "email": "a@x.com" }))
        .await;
    let response = test_app.post(&path, json!({ "email": "a@x.com" })).await;

    assert_eq!(200, response.status().as_u16());
    assert_eq!(
        data(response).await,
        json!({ "id": id, "deleted": true })
    );
    assert!(test_app.subscriptions(&list).await.is_empty());

    let again = test_app.post(&path, json!({ "email": "a@x.com" })).await;
    assert_eq!(404, again.status().as_u16());
}

#[tokio::test]
async fn blacklisted_addresses_cannot_subscribe() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("weekly").await;

    test_app
        .post("/blacklist/add", json!({ "email": "spam@test.com" }))
        .await;
    let response = test_app
        .subscribe(&list, json!({ "email": "spam@test.com" }))
        .await;

    assert_eq!(409, response.status().as_u16());
    assert!(test_app.subscriptions(&list).await.is_empty());
}

#[tokio::test]
async fn subscriptions_are_paginated() {
    let test_app = TestApp::spawn_app().await;
    let list = test_app.create_list("weekly").await;

    for n in 0..5 {
        test_app
            .subscribe(&list, json!({ "email": format!("user{}@test.com", n) }))
            .await;
    }

    let page = data(
        test_app
            .get(&format!("/subscriptions/{}?start=1&limit=2", list))
            .await,
    )
    .await;

    assert_eq!(page["total"], 5);
    assert_eq!(page["start"], 1);
    assert_eq!(page["limit"], 2);
    assert_eq!(page["subscriptions"].as_array().unwrap().len(), 2);
    assert_eq!(page["subscriptions"][0]["email"], "user1@test.com");
}
