use crate::{
    availability::{day_start, overlaps},
    error::{BookingError, BookingResult, Field},
    types::Booking,
};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use uuid::Uuid;

/// Authoritative store of bookings.
///
/// `insert` must run its own overlap check atomically with the write, even
/// when the caller already checked against an earlier snapshot.
pub trait BookingBackend: Clone + Send + Sync + 'static {
    /// All bookings, ordered by start.
    fn bookings(&self) -> BookingResult<Vec<Booking>>;
    /// Bookings of `professional_id` overlapping `[from, until)`, ordered by start.
    fn list_by_professional_between(
        &self,
        professional_id: &str,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> BookingResult<Vec<Booking>>;
    /// Bookings of `professional_id` overlapping the UTC day `date`, ordered by start.
    fn list_by_professional_and_date(
        &self,
        professional_id: &str,
        date: NaiveDate,
    ) -> BookingResult<Vec<Booking>> {
        let from = day_start(date);
        let until = from
            .checked_add_signed(Duration::days(1))
            .ok_or_else(|| BookingError::validation(Field::Date, "date out of range"))?;
        self.list_by_professional_between(professional_id, from, until)
    }
    fn insert(&self, booking: Booking) -> BookingResult<()>;
    fn remove(&self, id: Uuid) -> BookingResult<Booking>;
}

/// Rejects `booking` if its id is taken or it overlaps a booking of the same professional.
pub fn ensure_insertable<'a>(
    existing: impl IntoIterator<Item = &'a Booking>,
    booking: &Booking,
) -> BookingResult<()> {
    for other in existing {
        let same_id = other.id == booking.id;
        let overlapping = other.professional_id == booking.professional_id
            && overlaps(booking.start, booking.end, other.start, other.end);
        if same_id || overlapping {
            return Err(BookingError::Conflict {
                slot: booking.start,
                conflicting_booking_id: Some(other.id),
            });
        }
    }
    Ok(())
}

/// Whether `booking` belongs to `professional_id` and overlaps `[from, until)`.
pub fn is_within(
    booking: &Booking,
    professional_id: &str,
    from: DateTime<Utc>,
    until: DateTime<Utc>,
) -> bool {
    booking.professional_id == professional_id && overlaps(from, until, booking.start, booking.end)
}

pub fn sort_by_start(bookings: &mut [Booking]) {
    bookings.sort_unstable_by(|a, b| a.start.cmp(&b.start).then_with(|| a.id.cmp(&b.id)));
}
