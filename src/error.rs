use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Input field a validation failure refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    ClientName,
    Phone,
    ProfessionalId,
    Services,
    Date,
    Time,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Field::ClientName => "client_name",
            Field::Phone => "phone",
            Field::ProfessionalId => "professional_id",
            Field::Services => "services",
            Field::Date => "date",
            Field::Time => "time",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BookingError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: Field, reason: String },

    #[error("Slot starting at {slot} is no longer available")]
    Conflict {
        slot: DateTime<Utc>,
        conflicting_booking_id: Option<Uuid>,
    },

    #[error("Booking {id} does not exist")]
    NotFound { id: Uuid },

    #[error("Closed on {date}")]
    ClosedDay { date: NaiveDate },

    #[error("Storage error: {0}")]
    Storage(String),
}

impl BookingError {
    pub fn validation(field: Field, reason: impl Into<String>) -> Self {
        BookingError::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Short machine readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            BookingError::Validation { .. } => "validation",
            BookingError::Conflict { .. } => "conflict",
            BookingError::NotFound { .. } => "not_found",
            BookingError::ClosedDay { .. } => "closed_day",
            BookingError::Storage(_) => "storage",
        }
    }
}

pub type BookingResult<T> = Result<T, BookingError>;
