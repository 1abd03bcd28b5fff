use crate::{
    backend::{ensure_insertable, is_within, sort_by_start, BookingBackend},
    error::{BookingError, BookingResult},
    types::Booking,
};
use chrono::{DateTime, Utc};
use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex, MutexGuard},
};
use tracing::{debug, error};
use uuid::Uuid;

#[derive(Debug, Default)]
struct LocalState {
    bookings: HashMap<Uuid, Booking>,
    /// Ids of cancelled bookings, never handed out again.
    retired: HashSet<Uuid>,
}

/// In-memory bookings. Lost on restart.
#[derive(Debug, Clone, Default)]
pub struct LocalBookings {
    state: Arc<Mutex<LocalState>>,
}

impl LocalBookings {
    fn state(&self) -> BookingResult<MutexGuard<'_, LocalState>> {
        self.state.lock().map_err(|err| {
            error!(%err, "Booking store lock poisoned");
            BookingError::Storage("booking store unavailable".into())
        })
    }
}

impl BookingBackend for LocalBookings {
    fn bookings(&self) -> BookingResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self.state()?.bookings.values().cloned().collect();
        sort_by_start(&mut bookings);
        Ok(bookings)
    }

    fn list_by_professional_between(
        &self,
        professional_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> BookingResult<Vec<Booking>> {
        let mut bookings: Vec<Booking> = self
            .state()?
            .bookings
            .values()
            .filter(|booking| is_within(booking, professional_id, from, until))
            .cloned()
            .collect();
        sort_by_start(&mut bookings);
        Ok(bookings)
    }

    fn insert(&self, booking: Booking) -> BookingResult<()> {
        let mut state = self.state()?;
        if state.retired.contains(&booking.id) {
            debug!(id = %booking.id, "Rejected reuse of a cancelled booking id");
            return Err(BookingError::Conflict {
                slot: booking.start,
                conflicting_booking_id: Some(booking.id),
            });
        }
        ensure_insertable(state.bookings.values(), &booking)?;
        state.bookings.insert(booking.id, booking);
        Ok(())
    }

    fn remove(&self, id: Uuid) -> BookingResult<Booking> {
        let mut state = self.state()?;
        let booking = state
            .bookings
            .remove(&id)
            .ok_or(BookingError::NotFound { id })?;
        state.retired.insert(id);
        Ok(booking)
    }
}
