//! Slot computation for a single professional and day.
//!
//! Everything in here is pure: the current instant and the existing
//! bookings are handed in by the caller, so the same inputs always give the
//! same slots.

use crate::{
    error::{BookingError, BookingResult, Field},
    schedule::Schedule,
    types::{Booking, ClosedReason, DaySlots, Slot, SlotStatus},
};
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};

/// Half-open interval overlap of `[start, end)` and `[other_start, other_end)`.
///
/// Touching intervals do not overlap.
pub fn overlaps(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    other_start: DateTime<Utc>,
    other_end: DateTime<Utc>,
) -> bool {
    start < other_end && end > other_start
}

/// First booking of `professional_id` that overlaps `[start, end)`.
pub fn find_conflict<'a>(
    professional_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    existing: &'a [Booking],
) -> Option<&'a Booking> {
    existing.iter().find(|booking| {
        booking.professional_id == professional_id
            && overlaps(start, end, booking.start, booking.end)
    })
}

pub fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}

fn out_of_range() -> BookingError {
    BookingError::validation(Field::Date, "date out of range")
}

pub fn slot_start(date: NaiveDate, hour: u32) -> BookingResult<DateTime<Utc>> {
    day_start(date)
        .checked_add_signed(Duration::hours(i64::from(hour)))
        .ok_or_else(out_of_range)
}

pub fn slot_end(schedule: &Schedule, start: DateTime<Utc>) -> BookingResult<DateTime<Utc>> {
    start
        .checked_add_signed(schedule.standard_duration)
        .ok_or_else(out_of_range)
}

/// `[first slot start, last slot end)` of `date`.
///
/// With long durations the window reaches into the following day, so
/// bookings starting there still collide with late slots.
pub fn slot_window(
    schedule: &Schedule,
    date: NaiveDate,
) -> BookingResult<(DateTime<Utc>, DateTime<Utc>)> {
    let from = slot_start(date, schedule.open_hour)?;
    match schedule.slot_hours().last() {
        Some(last) => Ok((from, slot_end(schedule, slot_start(date, last)?)?)),
        None => Ok((from, from)),
    }
}

pub fn compute_slots(
    schedule: &Schedule,
    date: NaiveDate,
    professional_id: &str,
    now: DateTime<Utc>,
    existing: &[Booking],
) -> BookingResult<DaySlots> {
    let professional_id = professional_id.trim();

    if professional_id.is_empty() {
        return Ok(DaySlots {
            date,
            professional_id: String::new(),
            closed: Some(ClosedReason::NoProfessional),
            slots: vec![],
        });
    }

    if schedule.is_closed_day(date) {
        let start_time = day_start(date);
        let end_time = start_time
            .checked_add_signed(Duration::days(1))
            .ok_or_else(out_of_range)?;
        return Ok(DaySlots {
            date,
            professional_id: professional_id.to_string(),
            closed: Some(ClosedReason::ClosedDay),
            slots: vec![Slot {
                start_time,
                end_time,
                status: SlotStatus::Closed,
            }],
        });
    }

    let slots = schedule
        .slot_hours()
        .map(|hour| {
            let start_time = slot_start(date, hour)?;
            let end_time = slot_end(schedule, start_time)?;
            let status = if start_time <= now {
                SlotStatus::Past
            } else if find_conflict(professional_id, start_time, end_time, existing).is_some() {
                SlotStatus::Conflict
            } else {
                SlotStatus::Available
            };
            Ok(Slot {
                start_time,
                end_time,
                status,
            })
        })
        .collect::<BookingResult<Vec<_>>>()?;

    Ok(DaySlots {
        date,
        professional_id: professional_id.to_string(),
        closed: None,
        slots,
    })
}
