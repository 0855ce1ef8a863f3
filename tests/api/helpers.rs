use reqwest::{Response, Url};
use serde_json::Value;
use sqlx::{Connection, Executor, PgConnection, PgPool};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mailing_lists::{
    config::{get_configuration, DatabaseSettings, StorageBackend},
    startup::{get_connection_db_pool, Application},
    store::{postgres::migrate, Stores},
};

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub email_server: MockServer,
    pub client: reqwest::Client,
}

/// Link found in a confirmation email, pointed at the test server.
pub struct ConfirmationLink {
    pub html: Url,
}

impl ConfirmationLink {
    pub fn token(&self) -> String {
        self.html
            .query_pairs()
            .find(|(key, _)| key == "token")
            .map(|(_, value)| value.into_owned())
            .expect("Confirmation link has no token.")
    }
}

impl TestApp {
    /// Application on the in-memory backend.
    pub async fn spawn_app() -> TestApp {
        Self::spawn_app_with(StorageBackend::Memory).await
    }

    /// Application on Postgres and Redis, with a fresh database per test.
    pub async fn spawn_app_with_postgres() -> TestApp {
        Self::spawn_app_with(StorageBackend::Postgres).await
    }

    async fn spawn_app_with(backend: StorageBackend) -> TestApp {
        let mut config = get_configuration().expect("Missing configuration file.");
        let email_server = MockServer::start().await;

        // Port 0 lets the OS pick a free port for every test
        config.set_app_port(0);
        config.set_email_client_base_url(email_server.uri());
        config.set_storage_backend(backend);

        if backend == StorageBackend::Postgres {
            configure_db(&mut config.database).await;
        }

        let application = Application::build(config)
            .await
            .expect("Failed to build application.");
        let port = application.get_port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(application.run_until_stop());

        TestApp {
            address,
            port,
            email_server,
            client: reqwest::Client::new(),
        }
    }

    pub async fn mount_email_server(&self, status: u16) {
        Mock::given(path("/mail/send"))
            .and(method("POST"))
            .respond_with(ResponseTemplate::new(status))
            .mount(&self.email_server)
            .await;
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(&format!("{}{}", self.address, path))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn post(&self, path: &str, body: Value) -> Response {
        self.client
            .post(&format!("{}{}", self.address, path))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Creates a list and returns its cid.
    pub async fn create_list(&self, name: &str) -> String {
        let response = self
            .post("/lists/add", serde_json::json!({ "name": name }))
            .await;

        assert_eq!(200, response.status().as_u16());

        let body: Value = response.json().await.unwrap();
        body["data"]["cid"].as_str().unwrap().to_string()
    }

    pub async fn subscribe(&self, list: &str, body: Value) -> Response {
        self.post(&format!("/subscribe/{}", list), body).await
    }

    pub async fn subscriptions(&self, list: &str) -> Vec<Value> {
        let body: Value = self
            .get(&format!("/subscriptions/{}", list))
            .await
            .json()
            .await
            .unwrap();

        body["data"]["subscriptions"].as_array().unwrap().clone()
    }

    pub async fn get_confirmation_link(&self, email_request: &wiremock::Request) -> ConfirmationLink {
        let body: Value = serde_json::from_slice(&email_request.body).unwrap();
        let html = body["content"][0]["value"].as_str().unwrap();
        let links: Vec<_> = linkify::LinkFinder::new()
            .links(html)
            .filter(|link| *link.kind() == linkify::LinkKind::Url)
            .collect();

        assert_eq!(links.len(), 1);

        let mut confirmation_link = Url::parse(links[0].as_str()).unwrap();

        assert_eq!(confirmation_link.host_str().unwrap(), "127.0.0.1");
        confirmation_link.set_port(Some(self.port)).unwrap();

        ConfirmationLink {
            html: confirmation_link,
        }
    }

    /// Confirmation link of the `index`-th email the mail server received.
    pub async fn confirmation_link(&self, index: usize) -> ConfirmationLink {
        let received_requests = self.email_server.received_requests().await.unwrap();

        self.get_confirmation_link(&received_requests[index]).await
    }
}

/// Postgres and Redis collaborators over a fresh database.
pub async fn postgres_stores() -> Stores {
    let mut config = get_configuration().expect("Missing configuration file.");
    let db_pool = configure_db(&mut config.database).await;
    let redis_client =
        redis::Client::open(config.get_redis_address()).expect("Failed to open a Redis client.");

    Stores::postgres(db_pool, redis_client, config.get_confirmation_ttl())
}

async fn configure_db(db_config: &mut DatabaseSettings) -> PgPool {
    let db_test_name = format!("db_{}", Uuid::new_v4().to_string().replace('-', "_"));
    let mut connection = PgConnection::connect_with(&db_config.get_db_options())
        .await
        .expect("Failed to connect to Postgres.");

    connection
        .execute(&*format!(r#"CREATE DATABASE "{}";"#, db_test_name))
        .await
        .expect("Failed to create database.");

    connection
        .close()
        .await
        .expect("Failed to close connection.");

    db_config.set_name(db_test_name);

    let db_pool = get_connection_db_pool(db_config);

    migrate(&db_pool).await.expect("Failed to run migrations.");

    db_pool
}

pub async fn data(response: Response) -> Value {
    let body: Value = response.json().await.expect("Response body is not JSON.");

    body["data"].clone()
}
