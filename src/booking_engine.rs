use crate::{
    availability::{compute_slots, find_conflict, slot_end, slot_window},
    backend::BookingBackend,
    error::{BookingError, BookingResult, Field},
    schedule::Schedule,
    types::{Booking, BookingEvent, BookingRequest, DaySlots},
    validation::validate_request,
};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tokio::sync::broadcast::{self, Sender};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};
use uuid::Uuid;

const EVENT_CAPACITY: usize = 64;

/// Computes availability and is the only writer of the booking store.
#[derive(Clone)]
pub struct BookingEngine<B: BookingBackend> {
    backend: B,
    schedule: Arc<Schedule>,
    events: Sender<BookingEvent>,
}

impl<B: BookingBackend> BookingEngine<B> {
    pub fn new(backend: B, schedule: Schedule) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            schedule: Arc::new(schedule),
            events,
        }
    }

    /// Slots of `professional_id` on `date` as seen at `now`.
    pub fn get_slots(
        &self,
        date: NaiveDate,
        professional_id: &str,
        now: DateTime<Utc>,
    ) -> BookingResult<DaySlots> {
        let professional_id = professional_id.trim();
        if professional_id.is_empty() || self.schedule.is_closed_day(date) {
            return compute_slots(&self.schedule, date, professional_id, now, &[]);
        }

        let (from, until) = slot_window(&self.schedule, date)?;
        let existing = self
            .backend
            .list_by_professional_between(professional_id, from, until)?;
        compute_slots(&self.schedule, date, professional_id, now, &existing)
    }

    /// Validates `request` against a fresh read of the store and commits it.
    pub fn submit(&self, request: &BookingRequest, now: DateTime<Utc>) -> BookingResult<Booking> {
        let request = validate_request(request, &self.schedule)?;

        let start = request.date.and_time(request.time).and_utc();
        let end = slot_end(&self.schedule, start)?;
        if start <= now {
            return Err(BookingError::validation(Field::Time, "slot already passed"));
        }

        let existing = self
            .backend
            .list_by_professional_between(&request.professional_id, start, end)?;
        if let Some(conflicting) = find_conflict(&request.professional_id, start, end, &existing) {
            debug!(%start, conflicting = %conflicting.id, "Requested slot is taken");
            return Err(BookingError::Conflict {
                slot: start,
                conflicting_booking_id: Some(conflicting.id),
            });
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            client_name: request.client_name,
            phone: request.phone,
            professional_id: request.professional_id,
            services: request.services,
            start,
            end,
            created_at: now,
        };

        self.backend.insert(booking.clone()).inspect_err(|err| {
            if let BookingError::Conflict { .. } = err {
                debug!(%start, "Store rejected booking as overlapping");
            }
        })?;

        info!(
            id = %booking.id,
            professional_id = %booking.professional_id,
            start = %booking.start,
            "Booking created"
        );
        self.emit(BookingEvent::Created(booking.clone()));
        Ok(booking)
    }

    pub fn cancel(&self, id: Uuid) -> BookingResult<Booking> {
        let booking = self.backend.remove(id)?;
        info!(
            %id,
            professional_id = %booking.professional_id,
            start = %booking.start,
            "Booking cancelled"
        );
        self.emit(BookingEvent::Cancelled(booking.clone()));
        Ok(booking)
    }

    pub fn bookings(&self) -> BookingResult<Vec<Booking>> {
        self.backend.bookings()
    }

    /// Bookings of `professional_id` touching the UTC day `date`.
    pub fn bookings_on(
        &self,
        professional_id: &str,
        date: NaiveDate,
    ) -> BookingResult<Vec<Booking>> {
        self.backend
            .list_by_professional_and_date(professional_id.trim(), date)
    }

    /// Events committed after this call.
    pub fn subscribe(&self) -> BroadcastStream<BookingEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    fn emit(&self, event: BookingEvent) {
        if self.events.send(event).is_err() {
            debug!("No subscribers for booking event");
        }
    }
}
