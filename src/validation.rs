use crate::{
    error::{BookingError, BookingResult, Field},
    schedule::Schedule,
    types::BookingRequest,
};
use chrono::{NaiveDate, NaiveTime, Timelike};
use lazy_static::lazy_static;
use regex::Regex;

const MIN_NAME_LENGTH: usize = 3;

lazy_static! {
    static ref NON_DIGIT: Regex = Regex::new(r"[^0-9]").unwrap();
    static ref DATE_SHAPE: Regex = Regex::new(r"^[0-9]{4}-[0-9]{2}-[0-9]{2}$").unwrap();
    static ref TIME_SHAPE: Regex = Regex::new(r"^[0-9]{2}:[0-9]{2}$").unwrap();
}

/// A request whose fields all passed the shape checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub client_name: String,
    pub phone: String,
    pub professional_id: String,
    pub services: Vec<String>,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

pub fn normalize_phone(phone: &str) -> String {
    NON_DIGIT.replace_all(phone, "").into_owned()
}

/// Coarse sanity filter: 10 or 11 digits starting with a known area code.
pub fn validate_phone(phone: &str, schedule: &Schedule) -> BookingResult<String> {
    let digits = normalize_phone(phone);
    if digits.len() < 10 || digits.len() > 11 {
        return Err(BookingError::validation(
            Field::Phone,
            "expected 10 or 11 digits including the area code",
        ));
    }
    if !schedule.accepts_area_code(&digits[..2]) {
        return Err(BookingError::validation(
            Field::Phone,
            format!("unknown area code {}", &digits[..2]),
        ));
    }
    Ok(digits)
}

fn normalize_services(services: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(services.len());
    for service in services.iter().map(|service| service.trim()) {
        if !service.is_empty() && !normalized.iter().any(|known| known == service) {
            normalized.push(service.to_string());
        }
    }
    normalized
}

fn parse_date(date: &str) -> BookingResult<NaiveDate> {
    let date = date.trim();
    if date.is_empty() {
        return Err(BookingError::validation(Field::Date, "no date selected"));
    }
    if !DATE_SHAPE.is_match(date) {
        return Err(BookingError::validation(Field::Date, "expected YYYY-MM-DD"));
    }
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map_err(|err| BookingError::validation(Field::Date, err.to_string()))
}

fn parse_time(time: &str) -> BookingResult<NaiveTime> {
    let time = time.trim();
    if time.is_empty() {
        return Err(BookingError::validation(Field::Time, "no time selected"));
    }
    if !TIME_SHAPE.is_match(time) {
        return Err(BookingError::validation(Field::Time, "expected HH:MM"));
    }
    NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|err| BookingError::validation(Field::Time, err.to_string()))
}

/// Checks the request fields in a fixed order and stops at the first failure.
///
/// Availability against existing bookings is not checked here.
pub fn validate_request(
    request: &BookingRequest,
    schedule: &Schedule,
) -> BookingResult<ValidatedRequest> {
    let client_name = request.client_name.trim();
    if client_name.chars().count() < MIN_NAME_LENGTH {
        return Err(BookingError::validation(
            Field::ClientName,
            format!("must have at least {MIN_NAME_LENGTH} characters"),
        ));
    }

    let phone = validate_phone(&request.phone, schedule)?;

    let professional_id = request.professional_id.trim();
    if professional_id.is_empty() {
        return Err(BookingError::validation(
            Field::ProfessionalId,
            "no professional selected",
        ));
    }

    let date = parse_date(&request.date)?;
    let time = parse_time(&request.time)?;

    let services = normalize_services(&request.services);
    if services.is_empty() {
        return Err(BookingError::validation(
            Field::Services,
            "select at least one service",
        ));
    }

    if schedule.is_closed_day(date) {
        return Err(BookingError::ClosedDay { date });
    }

    if time.minute() != 0 || !schedule.slot_hours().contains(&time.hour()) {
        return Err(BookingError::validation(
            Field::Time,
            format!(
                "slots start on the hour between {:02}:00 and {:02}:00",
                schedule.open_hour,
                schedule.close_hour - 1
            ),
        ));
    }

    Ok(ValidatedRequest {
        client_name: client_name.to_string(),
        phone,
        professional_id: professional_id.to_string(),
        services,
        date,
        time,
    })
}
