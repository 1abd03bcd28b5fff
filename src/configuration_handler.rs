use crate::{
    configuration::Configuration,
    schedule::{Schedule, DEFAULT_AREA_CODES, STANDARD_DURATION_MINUTES},
};
use chrono::Duration;
use clap::Parser;
use std::path::PathBuf;

fn default_area_codes() -> Vec<String> {
    DEFAULT_AREA_CODES.iter().map(|code| code.to_string()).collect()
}

#[derive(Parser, Debug, Clone)]
#[command(version, about = "Self-service appointment booking for a single salon")]
pub struct ConfigurationHandler {
    /// Business name used in notifications
    #[arg(long, env = "WEBSITE_TITLE", default_value = "Salon")]
    website_title: String,

    /// Password expected in the x-admin-password header
    #[arg(long, env = "ADMIN_PASSWORD")]
    password: Option<String>,

    #[arg(long, env = "PORT", default_value = "3000")]
    port: String,

    /// PostgreSQL url; bookings are kept in memory or in --bookings-file without it
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// JSON file the bookings are persisted to when no database is configured
    #[arg(long, env = "BOOKINGS_FILE")]
    bookings_file: Option<PathBuf>,

    #[arg(long, env = "BUSINESS_PHONE")]
    business_phone: Option<String>,

    /// Accepted two digit area codes, comma separated
    #[arg(long, env = "AREA_CODES", value_delimiter = ',', default_values_t = default_area_codes())]
    area_codes: Vec<String>,

    #[arg(
        long,
        env = "SLOT_DURATION_MINUTES",
        default_value_t = STANDARD_DURATION_MINUTES,
        value_parser = clap::value_parser!(i64).range(1..=1440)
    )]
    slot_duration_minutes: i64,
}

impl ConfigurationHandler {
    pub fn parse_arguments() -> Self {
        let _ = dotenvy::dotenv();
        Self::parse()
    }
}

impl Configuration for ConfigurationHandler {
    fn website_title(&self) -> String {
        self.website_title.clone()
    }

    fn password(&self) -> Option<String> {
        self.password.clone().filter(|password| !password.is_empty())
    }

    fn port(&self) -> String {
        self.port.clone()
    }

    fn database_url(&self) -> Option<String> {
        self.database_url.clone()
    }

    fn bookings_file(&self) -> Option<PathBuf> {
        self.bookings_file.clone()
    }

    fn business_phone(&self) -> Option<String> {
        self.business_phone.clone()
    }

    fn schedule(&self) -> Schedule {
        Schedule {
            standard_duration: Duration::minutes(self.slot_duration_minutes),
            ..Schedule::default()
        }
        .with_area_codes(
            self.area_codes
                .iter()
                .map(|code| code.trim().to_string())
                .filter(|code| !code.is_empty())
                .collect(),
        )
    }
}
