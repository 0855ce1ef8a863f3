use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::net::TcpListener;
use tracing_actix_web::TracingLogger;

use crate::config::{DatabaseSettings, Settings, StorageBackend};
use crate::email_client::EmailClient;
use crate::engine::SubscriptionEngine;
use crate::routes::{
    handle_add_to_blacklist, handle_change_address, handle_confirm, handle_create_field,
    handle_create_list, handle_delete_subscription, handle_get_list, handle_list_subscriptions,
    handle_lists, handle_lists_with_email, handle_remove_from_blacklist,
    handle_resend_confirmation, handle_search_blacklist, handle_subscribe, handle_unsubscribe,
    health_check,
};
use crate::store::postgres::migrate;
use crate::store::Stores;

/// Public URL the confirmation links point at.
pub struct ApplicationBaseUrl(pub String);

#[derive(thiserror::Error)]
pub enum StartupError {
    #[error("Sender email is not valid: {0}")]
    InvalidSender(String),
    #[error("Failed to build the email client.")]
    EmailClient(#[from] reqwest::Error),
    #[error("Failed to open a Redis client.")]
    Redis(#[from] redis::RedisError),
    #[error("Failed to run database migrations.")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("Failed to bind the address.")]
    Io(#[from] std::io::Error),
}

impl std::fmt::Debug for StartupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        crate::store::error_chain_fmt(self, f)
    }
}

pub struct Application {
    port: u16,
    server: Server,
}

impl Application {
    pub async fn build(config: Settings) -> Result<Self, StartupError> {
        let sender_email = config
            .get_email_client_sender()
            .map_err(StartupError::InvalidSender)?;
        let email_client = EmailClient::new(
            config.get_email_client_base_url(),
            sender_email,
            config.get_email_client_api(),
            Some(config.get_email_client_timeout()),
        )?;
        let engine = build_engine(&config).await?;

        let listener = TcpListener::bind(config.get_address())?;
        let port = listener.local_addr()?.port();

        tracing::info!(
            "Server listening on {} with {:?} storage",
            listener.local_addr()?,
            config.get_storage_backend()
        );

        let server = run(listener, engine, email_client, config.get_app_base_url())?;

        Ok(Self { port, server })
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stop(self) -> Result<(), std::io::Error> {
        self.server.await
    }
}

async fn build_engine(config: &Settings) -> Result<SubscriptionEngine, StartupError> {
    let stores = match config.get_storage_backend() {
        StorageBackend::Memory => Stores::in_memory(),
        StorageBackend::Postgres => {
            let db_pool = get_connection_db_pool(&config.database);

            if config.database.migrate_on_startup {
                migrate(&db_pool).await?;
            }

            let redis_client = redis::Client::open(config.get_redis_address())?;

            Stores::postgres(db_pool, redis_client, config.get_confirmation_ttl())
        }
    };

    Ok(SubscriptionEngine::new(stores)
        .with_strict_address_change(config.subscriptions.strict_address_change))
}

pub fn run(
    listener: TcpListener,
    engine: SubscriptionEngine,
    email_client: EmailClient,
    base_url: String,
) -> Result<Server, std::io::Error> {
    let engine = web::Data::new(engine);
    let email_client = web::Data::new(email_client);
    let base_url = web::Data::new(ApplicationBaseUrl(base_url));

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/subscribe/{list}", web::post().to(handle_subscribe))
            // registered before /subscriptions/{list} so "confirm" is not taken for a list id
            .route("/subscriptions/confirm", web::get().to(handle_confirm))
            .route(
                "/subscriptions/confirm/resend",
                web::post().to(handle_resend_confirmation),
            )
            .route(
                "/subscriptions/{list}",
                web::get().to(handle_list_subscriptions),
            )
            .route("/unsubscribe/{list}", web::post().to(handle_unsubscribe))
            .route("/delete/{list}", web::post().to(handle_delete_subscription))
            .route("/changeemail/{list}", web::post().to(handle_change_address))
            .route("/lists", web::get().to(handle_lists))
            .route("/lists/add", web::post().to(handle_create_list))
            .route("/lists/{email}", web::get().to(handle_lists_with_email))
            .route("/list/{id}", web::get().to(handle_get_list))
            .route("/field/{list}", web::post().to(handle_create_field))
            .route("/blacklist/add", web::post().to(handle_add_to_blacklist))
            .route("/blacklist/delete", web::post().to(handle_remove_from_blacklist))
            .route("/blacklist/get", web::get().to(handle_search_blacklist))
            .app_data(engine.clone())
            .app_data(email_client.clone())
            .app_data(base_url.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}

pub fn get_connection_db_pool(config: &DatabaseSettings) -> PgPool {
    PgPoolOptions::new()
        .acquire_timeout(std::time::Duration::from_secs(2))
        .connect_lazy_with(config.get_db_options())
}
