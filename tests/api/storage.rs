use std::collections::BTreeMap;

use chrono::Utc;
use serde_json::json;

use mailing_lists::domain::cid::generate_confirmation_token;
use mailing_lists::domain::confirmation::{Confirmation, ConfirmationKind};
use mailing_lists::domain::field::{FieldKind, FieldOption, FieldType, NewField};
use mailing_lists::domain::mailing_list::{MailingList, NewMailingList};
use mailing_lists::domain::subscriber_email::SubscriberEmail;
use mailing_lists::domain::subscription::NewSubscription;
use mailing_lists::domain::subscription_status::SubscriptionStatus;
use mailing_lists::store::{StoreError, Stores};

use crate::helpers::{data, postgres_stores, TestApp};

fn email(address: &str) -> SubscriberEmail {
    SubscriberEmail::parse(address.to_string()).unwrap()
}

async fn list(stores: &Stores) -> MailingList {
    stores
        .lists
        .insert(NewMailingList::parse("weekly", "").unwrap())
        .await
        .unwrap()
}

fn confirmation(list: &MailingList) -> Confirmation {
    Confirmation {
        cid: generate_confirmation_token(),
        list_id: list.id,
        action: ConfirmationKind::Subscribe,
        requester_ip: Some(String::from("127.0.0.1")),
        data: String::from("{}"),
        created_at: Utc::now(),
    }
}

#[tokio::test]
async fn concurrent_upserts_converge_on_one_row() {
    let stores = postgres_stores().await;
    let list_id = list(&stores).await.id;

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let stores = stores.clone();
            tokio::spawn(async move {
                stores
                    .subscriptions
                    .upsert(
                        list_id,
                        &NewSubscription::new(email("frank@test.com")),
                        SubscriptionStatus::Pending,
                    )
                    .await
            })
        })
        .collect();

    let mut ids = vec![];
    for handle in handles {
        ids.push(handle.await.unwrap().unwrap().id);
    }
    ids.dedup();

    assert_eq!(ids.len(), 1);

    let (rows, total) = stores.subscriptions.list(list_id, 0, 100).await.unwrap();
    assert_eq!(total, 1);
    assert_eq!(rows[0].id, ids[0]);
}

#[tokio::test]
async fn upsert_merges_attributes_and_keeps_active_rows_active() {
    let stores = postgres_stores().await;
    let list = list(&stores).await;
    let mut first = NewSubscription::new(email("frank@test.com"));
    first.attributes = BTreeMap::from([
        (String::from("custom_color_1"), String::from("red")),
        (String::from("custom_size_2"), String::from("m")),
    ]);
    let mut second = NewSubscription::new(email("frank@test.com"));
    second.attributes = BTreeMap::from([(String::from("custom_color_1"), String::from("blue"))]);

    let created = stores
        .subscriptions
        .upsert(list.id, &first, SubscriptionStatus::Active)
        .await
        .unwrap();
    let merged = stores
        .subscriptions
        .upsert(list.id, &second, SubscriptionStatus::Pending)
        .await
        .unwrap();

    assert_eq!(merged.id, created.id);
    assert_eq!(merged.cid, created.cid);
    assert_eq!(merged.status, SubscriptionStatus::Active);
    assert_eq!(merged.attributes["custom_color_1"], "blue");
    assert_eq!(merged.attributes["custom_size_2"], "m");
}

#[tokio::test]
async fn a_tombstoned_row_frees_its_address() {
    let stores = postgres_stores().await;
    let list = list(&stores).await;
    let subscription = NewSubscription::new(email("frank@test.com"));

    let original = stores
        .subscriptions
        .upsert(list.id, &subscription, SubscriptionStatus::Active)
        .await
        .unwrap();
    let deleted = stores
        .subscriptions
        .mark_deleted(list.id, &original.cid)
        .await
        .unwrap()
        .unwrap();

    assert!(deleted.is_deleted());
    assert!(stores
        .subscriptions
        .mark_deleted(list.id, &original.cid)
        .await
        .unwrap()
        .is_none());
    assert!(stores
        .subscriptions
        .get_by_email(list.id, &subscription.email)
        .await
        .unwrap()
        .is_none());

    let fresh = stores
        .subscriptions
        .upsert(list.id, &subscription, SubscriptionStatus::Pending)
        .await
        .unwrap();

    assert_ne!(fresh.id, original.id);
    assert_ne!(fresh.cid, original.cid);
    assert_eq!(fresh.status, SubscriptionStatus::Pending);
}

#[tokio::test]
async fn moving_onto_a_held_address_is_a_duplicate() {
    let stores = postgres_stores().await;
    let list = list(&stores).await;
    let frank = stores
        .subscriptions
        .upsert(
            list.id,
            &NewSubscription::new(email("frank@test.com")),
            SubscriptionStatus::Active,
        )
        .await
        .unwrap();
    stores
        .subscriptions
        .upsert(
            list.id,
            &NewSubscription::new(email("anne@test.com")),
            SubscriptionStatus::Active,
        )
        .await
        .unwrap();

    let err = stores
        .subscriptions
        .update_email(list.id, frank.id, &email("anne@test.com"))
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::Duplicate(_)));
}

#[tokio::test]
async fn field_records_round_trip_through_postgres() {
    let stores = postgres_stores().await;
    let list = list(&stores).await;
    let group = NewField::parse("Topics", "", "", "", "checkbox", None, "")
        .unwrap()
        .with_group_template("{{name}}")
        .into_record(list.id);
    let option = NewField::parse("Rust", "", "", "", "option", Some(&group.id.to_string()), "")
        .unwrap()
        .into_record(list.id);

    stores.fields.insert(group.clone()).await.unwrap();
    stores.fields.insert(option.clone()).await.unwrap();

    assert_eq!(
        stores.fields.get_record(list.id, group.id).await.unwrap(),
        Some(group.clone())
    );

    let fields = stores.fields.fields_for_list(list.id).await.unwrap();
    assert_eq!(fields.len(), 1);
    assert_eq!(
        fields[0].kind,
        FieldKind::Group {
            options: vec![FieldOption {
                id: option.id,
                name: option.name.clone(),
                key: option.key.clone(),
                column: option.column.clone().unwrap(),
                field_type: FieldType::Option,
            }]
        }
    );

    let err = stores.fields.insert(option).await.unwrap_err();
    assert!(matches!(err, StoreError::Duplicate(_)));
}

#[tokio::test]
async fn blacklist_search_is_a_substring_match() {
    let stores = postgres_stores().await;
    for address in ["spam@bad.com", "ham@good.com", "more-spam@bad.com"] {
        stores.blacklist.add(&email(address)).await.unwrap();
    }
    stores.blacklist.add(&email("spam@bad.com")).await.unwrap();

    let (emails, total) = stores.blacklist.search(0, 10, "SPAM@").await.unwrap();

    assert_eq!(total, 2);
    assert_eq!(emails, vec!["more-spam@bad.com", "spam@bad.com"]);

    let (page, total) = stores.blacklist.search(1, 10, "").await.unwrap();
    assert_eq!(total, 3);
    assert_eq!(page.len(), 2);
}

#[tokio::test]
async fn a_confirmation_token_is_never_overwritten() {
    let stores = postgres_stores().await;
    let list = list(&stores).await;
    let confirmation = confirmation(&list);

    stores.confirmations.insert(&confirmation).await.unwrap();
    let err = stores.confirmations.insert(&confirmation).await.unwrap_err();

    assert!(matches!(err, StoreError::Duplicate(_)));
    assert_eq!(
        stores.confirmations.get(&confirmation.cid).await.unwrap(),
        Some(confirmation)
    );
}

#[tokio::test]
async fn concurrent_takes_hand_a_confirmation_out_once() {
    let stores = postgres_stores().await;
    let list = list(&stores).await;
    let confirmation = confirmation(&list);
    stores.confirmations.insert(&confirmation).await.unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let stores = stores.clone();
            let token = confirmation.cid.clone();
            tokio::spawn(async move { stores.confirmations.take(&token).await })
        })
        .collect();

    let mut taken = 0;
    for handle in handles {
        if handle.await.unwrap().unwrap().is_some() {
            taken += 1;
        }
    }

    assert_eq!(taken, 1);
    assert!(stores
        .confirmations
        .get(&confirmation.cid)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn confirmed_subscription_is_stored_in_postgres() {
    let test_app = TestApp::spawn_app_with_postgres().await;
    test_app.mount_email_server(200).await;
    let list = test_app.create_list("weekly").await;

    let response = test_app
        .subscribe(
            &list,
            json!({ "email": "frank@test.com", "first_name": "Frank", "require_confirmation": true }),
        )
        .await;
    assert_eq!(200, response.status().as_u16());
    assert!(test_app.subscriptions(&list).await.is_empty());

    let confirmation_link = test_app.confirmation_link(0).await;
    let confirmed = data(reqwest::get(confirmation_link.html).await.unwrap()).await;
    assert_eq!(confirmed["subscribed"], true);

    let subscriptions = test_app.subscriptions(&list).await;
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0]["status"], "active");
    assert_eq!(subscriptions[0]["first_name"], "Frank");
}
