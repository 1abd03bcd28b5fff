use chrono::{Datelike, Duration, NaiveDate, Weekday};

pub const BUSINESS_OPEN_HOUR: u32 = 8;
pub const BUSINESS_CLOSE_HOUR: u32 = 19;
pub const STANDARD_DURATION_MINUTES: i64 = 180;
pub const CLOSED_WEEKDAYS: [Weekday; 2] = [Weekday::Sun, Weekday::Mon];
pub const DEFAULT_AREA_CODES: [&str; 9] = ["11", "12", "13", "19", "21", "24", "27", "31", "32"];

/// Opening hours and booking rules shared by every professional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schedule {
    /// First slot start hour, inclusive.
    pub open_hour: u32,
    /// Last slot start hour, exclusive. Slots may run past it.
    pub close_hour: u32,
    pub standard_duration: Duration,
    pub area_codes: Vec<String>,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            open_hour: BUSINESS_OPEN_HOUR,
            close_hour: BUSINESS_CLOSE_HOUR,
            standard_duration: Duration::minutes(STANDARD_DURATION_MINUTES),
            area_codes: DEFAULT_AREA_CODES.iter().map(|code| code.to_string()).collect(),
        }
    }
}

impl Schedule {
    pub fn with_area_codes(mut self, area_codes: Vec<String>) -> Self {
        self.area_codes = area_codes;
        self
    }

    pub fn is_closed_day(&self, date: NaiveDate) -> bool {
        CLOSED_WEEKDAYS.contains(&date.weekday())
    }

    pub fn slot_hours(&self) -> std::ops::Range<u32> {
        self.open_hour..self.close_hour
    }

    pub fn accepts_area_code(&self, area_code: &str) -> bool {
        self.area_codes.iter().any(|code| code == area_code)
    }
}
