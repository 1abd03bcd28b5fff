#[cfg(feature = "postgres")]
#[macro_use]
extern crate diesel;

use crate::{
    backend::BookingBackend,
    booking_engine::BookingEngine,
    configuration::Configuration,
    configuration_handler::ConfigurationHandler,
    file_bookings::FileBookings,
    http::create_app,
    local_bookings::LocalBookings,
    notification::{dispatch_notifications, LogNotifier, WhatsAppNotifier},
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod availability;
mod backend;
mod booking_engine;
mod configuration;
mod configuration_handler;
#[cfg(feature = "postgres")]
mod database_interface;
mod error;
mod file_bookings;
mod http;
mod local_bookings;
mod notification;
mod schedule;
#[cfg(feature = "postgres")]
mod schema;
#[cfg(test)]
mod testutils;
mod types;
mod validation;

async fn serve<B: BookingBackend>(
    backend: B,
    configuration: ConfigurationHandler,
) -> std::io::Result<()> {
    let engine = BookingEngine::new(backend, configuration.schedule());

    let events = engine.subscribe();
    match configuration.business_phone() {
        Some(business_phone) => {
            let notifier = WhatsAppNotifier::new(configuration.website_title(), &business_phone);
            tokio::spawn(dispatch_notifications(events, notifier));
        }
        None => {
            tokio::spawn(dispatch_notifications(events, LogNotifier));
        }
    }

    let address = format!("0.0.0.0:{}", configuration.port());
    let listener = tokio::net::TcpListener::bind(&address).await?;
    info!("Accessible at {address}");

    let app = create_app(engine, configuration);
    axum::serve(listener, app).await
}

#[cfg(feature = "postgres")]
async fn connect_database(database_url: &str) -> database_interface::DatabaseInterface {
    use std::time::Duration;
    use tokio::time::sleep;
    use tracing::error;

    loop {
        match database_interface::DatabaseInterface::new(database_url) {
            Ok(backend) => {
                info!("Successfully connected to database");
                break backend;
            }
            Err(err) => {
                error!(?err, "Failed to establish database connection. Retry in 1 sec. You may want to restart it with database disabled (bookings file or in memory).");
                sleep(Duration::from_secs(1)).await;
            }
        }
    }
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let configuration = ConfigurationHandler::parse_arguments();
    info!(title = %configuration.website_title(), "Starting booking service");

    if let Some(database_url) = configuration.database_url() {
        #[cfg(feature = "postgres")]
        {
            let backend = connect_database(&database_url).await;
            return serve(backend, configuration).await;
        }
        #[cfg(not(feature = "postgres"))]
        warn!(%database_url, "Built without the postgres feature, ignoring database url");
    }

    match configuration.bookings_file() {
        Some(path) => serve(FileBookings::new(path), configuration).await,
        None => {
            warn!("No bookings file configured, bookings are lost on restart");
            serve(LocalBookings::default(), configuration).await
        }
    }
}
