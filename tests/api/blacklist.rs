use serde_json::json;

use crate::helpers::{data, TestApp};

#[tokio::test]
async fn blacklist_entries_can_be_added_searched_and_removed() {
    let test_app = TestApp::spawn_app().await;

    for email in ["b@spam.com", "A@Spam.com", "friend@test.com"] {
        let response = test_app
            .post("/blacklist/add", json!({ "email": email }))
            .await;

        assert_eq!(200, response.status().as_u16());
    }

    let page = data(test_app.get("/blacklist/get?search=SPAM").await).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["emails"], json!(["a@spam.com", "b@spam.com"]));

    let response = test_app
        .post("/blacklist/delete", json!({ "email": "a@spam.com" }))
        .await;
    assert_eq!(200, response.status().as_u16());

    let page = data(test_app.get("/blacklist/get").await).await;
    assert_eq!(page["total"], 2);
    assert_eq!(page["limit"], 10000);
}

#[tokio::test]
async fn blacklist_requires_an_email() {
    let test_app = TestApp::spawn_app().await;

    for path in ["/blacklist/add", "/blacklist/delete"] {
        let response = test_app.post(path, json!({ "email": "" })).await;

        assert_eq!(400, response.status().as_u16());
    }
}
