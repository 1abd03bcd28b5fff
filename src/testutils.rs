use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::{
    backend::BookingBackend,
    error::{BookingError, BookingResult},
    local_bookings::LocalBookings,
    types::{Booking, BookingRequest},
};

pub fn instant(rfc3339: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(rfc3339)
        .unwrap()
        .with_timezone(&Utc)
}

/// Standard length booking for `professional_id` starting at `start`.
pub fn booking(professional_id: &str, start: &str) -> Booking {
    let start = instant(start);
    Booking {
        id: Uuid::new_v4(),
        client_name: "Maria Silva".into(),
        phone: "11987654321".into(),
        professional_id: professional_id.into(),
        services: vec!["cut".into()],
        start,
        end: start + Duration::minutes(180),
        created_at: start - Duration::days(1),
    }
}

pub fn booking_request(professional_id: &str, date: &str, time: &str) -> BookingRequest {
    BookingRequest {
        client_name: "Maria Silva".into(),
        phone: "(11) 98765-4321".into(),
        professional_id: professional_id.into(),
        services: vec!["cut".into()],
        date: date.into(),
        time: time.into(),
    }
}

pub struct MockBookingBackendInner {
    pub success: AtomicBool,
    /// Listing returns nothing, as if another writer committed right after the read.
    pub stale_reads: AtomicBool,
    pub calls_to_bookings: AtomicU64,
    pub calls_to_list: AtomicU64,
    pub calls_to_insert: AtomicU64,
    pub calls_to_remove: AtomicU64,
    pub bookings: LocalBookings,
}

/// Counts calls and delegates to an in-memory store unless told to fail.
#[derive(Clone)]
pub struct MockBookingBackend(pub Arc<MockBookingBackendInner>);

impl MockBookingBackendInner {
    fn new() -> Self {
        Self {
            success: AtomicBool::new(true),
            stale_reads: AtomicBool::new(false),
            calls_to_bookings: AtomicU64::default(),
            calls_to_list: AtomicU64::default(),
            calls_to_insert: AtomicU64::default(),
            calls_to_remove: AtomicU64::default(),
            bookings: LocalBookings::default(),
        }
    }
}

impl MockBookingBackend {
    pub fn new() -> Self {
        Self(Arc::new(MockBookingBackendInner::new()))
    }

    fn result(&self) -> BookingResult<()> {
        match self.0.success.load(Ordering::SeqCst) {
            true => Ok(()),
            false => Err(BookingError::Storage("Supposed to fail".into())),
        }
    }
}

impl BookingBackend for MockBookingBackend {
    fn bookings(&self) -> BookingResult<Vec<Booking>> {
        self.0.calls_to_bookings.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.bookings.bookings()
    }

    fn list_by_professional_between(
        &self,
        professional_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> BookingResult<Vec<Booking>> {
        self.0.calls_to_list.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        if self.0.stale_reads.load(Ordering::SeqCst) {
            return Ok(vec![]);
        }
        self.0
            .bookings
            .list_by_professional_between(professional_id, from, until)
    }

    fn insert(&self, booking: Booking) -> BookingResult<()> {
        self.0.calls_to_insert.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.bookings.insert(booking)
    }

    fn remove(&self, id: Uuid) -> BookingResult<Booking> {
        self.0.calls_to_remove.fetch_add(1, Ordering::SeqCst);
        self.result()?;
        self.0.bookings.remove(id)
    }
}
