use mailing_lists::config::get_configuration;
use mailing_lists::startup::{Application, StartupError};
use mailing_lists::telemetry::{get_subscriber, init_subscriber};

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let subscriber = get_subscriber(
        String::from("mailing_lists"),
        String::from("info"),
        std::io::stdout,
    );

    init_subscriber(subscriber);

    let config = get_configuration().expect("Failed to read configuration.");
    let application = Application::build(config).await?;

    application.run_until_stop().await?;

    Ok(())
}
