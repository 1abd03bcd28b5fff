use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[cfg(feature = "postgres")]
use crate::schema::bookings;

/// A confirmed appointment holding one professional for `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(
    feature = "postgres",
    derive(Queryable, Selectable, Insertable),
    diesel(table_name = bookings)
)]
pub struct Booking {
    pub id: Uuid,
    pub client_name: String,
    /// Digits only.
    pub phone: String,
    pub professional_id: String,
    pub services: Vec<String>,
    #[cfg_attr(feature = "postgres", diesel(column_name = start_time))]
    pub start: DateTime<Utc>,
    #[cfg_attr(feature = "postgres", diesel(column_name = end_time))]
    pub end: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Raw booking fields as typed by the client. Nothing here is trusted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct BookingRequest {
    #[validate(length(max = 120))]
    #[serde(default)]
    pub client_name: String,
    #[validate(length(max = 32))]
    #[serde(default)]
    pub phone: String,
    #[validate(length(max = 64))]
    #[serde(default)]
    pub professional_id: String,
    #[validate(length(max = 16))]
    #[serde(default)]
    pub services: Vec<String>,
    /// `YYYY-MM-DD`
    #[serde(default)]
    pub date: String,
    /// `HH:MM`
    #[serde(default)]
    pub time: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClosedReason {
    NoProfessional,
    ClosedDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotStatus {
    Available,
    Past,
    Conflict,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub status: SlotStatus,
}

/// Availability of one professional on one calendar day.
///
/// `closed` is set when nothing may be offered at all. For a closed day
/// `slots` holds a single `Closed` sentinel starting at midnight; without a
/// professional it is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySlots {
    pub date: NaiveDate,
    pub professional_id: String,
    pub closed: Option<ClosedReason>,
    pub slots: Vec<Slot>,
}

impl DaySlots {
    pub fn is_closed(&self) -> bool {
        self.closed.is_some()
    }

    pub fn available(&self) -> impl Iterator<Item = &Slot> {
        self.slots
            .iter()
            .filter(|slot| slot.status == SlotStatus::Available)
    }
}

/// Emitted after every committed change to the booking set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "booking", rename_all = "snake_case")]
pub enum BookingEvent {
    Created(Booking),
    Cancelled(Booking),
}

impl BookingEvent {
    pub fn booking(&self) -> &Booking {
        match self {
            BookingEvent::Created(booking) | BookingEvent::Cancelled(booking) => booking,
        }
    }
}
