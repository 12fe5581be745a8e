use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use thiserror::Error;

pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;
pub const MIN_UTC_OFFSET_MINUTES: i32 = -12 * 60;
pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

const DAY_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalendarError {
    #[error("Invalid calendar date: {year:04}-{month:02}-{day:02}")]
    InvalidDate { year: i32, month: u32, day: u32 },
    #[error("UTC offset out of range: {0} minutes (expected -720..=840)")]
    InvalidOffset(i32),
    #[error("Invalid date: {0}. Example: 2026-02-18 or 2026-02-18T09:30:00Z")]
    Unparseable(String),
}

/// Maps absolute instants onto local calendar days under a fixed UTC offset.
///
/// There is no timezone database behind this: the offset never changes, so a
/// local day is always exactly 24 hours long.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayClock {
    offset_minutes: i32,
}

impl Default for DayClock {
    fn default() -> Self {
        Self {
            offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
        }
    }
}

impl DayClock {
    pub fn new(offset_minutes: i32) -> Result<Self, CalendarError> {
        if !(MIN_UTC_OFFSET_MINUTES..=MAX_UTC_OFFSET_MINUTES).contains(&offset_minutes) {
            return Err(CalendarError::InvalidOffset(offset_minutes));
        }

        Ok(Self { offset_minutes })
    }

    pub fn utc() -> Self {
        Self { offset_minutes: 0 }
    }

    pub fn offset_minutes(&self) -> i32 {
        self.offset_minutes
    }

    fn offset(&self) -> Duration {
        Duration::minutes(i64::from(self.offset_minutes))
    }

    pub fn local_day_of(&self, instant: DateTime<Utc>) -> NaiveDate {
        (instant + self.offset()).date_naive()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_day_of(Utc::now())
    }

    pub fn start_of_local_day(
        &self,
        year: i32,
        month: u32,
        day: u32,
    ) -> Result<DateTime<Utc>, CalendarError> {
        calendar_day(year, month, day).map(|date| self.start_of(date))
    }

    pub fn end_of_local_day(
        &self,
        year: i32,
        month: u32,
        day: u32,
    ) -> Result<DateTime<Utc>, CalendarError> {
        calendar_day(year, month, day).map(|date| self.end_of(date))
    }

    /// Local noon of the given day. Values stored at this instant re-bucket
    /// to the same day even if they are later read back with a slightly
    /// different offset.
    pub fn canonical_storage_instant(
        &self,
        year: i32,
        month: u32,
        day: u32,
    ) -> Result<DateTime<Utc>, CalendarError> {
        calendar_day(year, month, day).map(|date| self.storage_instant(date))
    }

    pub fn start_of(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(NaiveTime::MIN).and_utc() - self.offset()
    }

    pub fn end_of(&self, date: NaiveDate) -> DateTime<Utc> {
        self.start_of(date) + Duration::days(1) - Duration::milliseconds(1)
    }

    pub fn storage_instant(&self, date: NaiveDate) -> DateTime<Utc> {
        self.start_of(date) + Duration::hours(12)
    }

    /// Inclusive `[start, end]` bounds of a local day.
    pub fn bounds(&self, date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.start_of(date), self.end_of(date))
    }

    pub fn is_previous_day(&self, earlier: NaiveDate, later: NaiveDate) -> bool {
        later.pred_opt() == Some(earlier)
    }

    pub fn parse_day(&self, input: &str) -> Result<NaiveDate, CalendarError> {
        let trimmed = input.trim();

        match split_day_key(trimmed) {
            Some((year, month, day)) => calendar_day(year, month, day),
            None => parse_rfc3339(trimmed).map(|instant| self.local_day_of(instant)),
        }
    }

    /// Resolves a user supplied date into the instant to store. Bare calendar
    /// dates become the canonical storage instant of that day.
    pub fn parse_instant(&self, input: &str) -> Result<DateTime<Utc>, CalendarError> {
        let trimmed = input.trim();

        match split_day_key(trimmed) {
            Some((year, month, day)) => self.canonical_storage_instant(year, month, day),
            None => parse_rfc3339(trimmed),
        }
    }

    /// Inclusive bounds of the local day named by `input`.
    pub fn parse_bounds(
        &self,
        input: &str,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), CalendarError> {
        let trimmed = input.trim();

        match split_day_key(trimmed) {
            Some((year, month, day)) => Ok((
                self.start_of_local_day(year, month, day)?,
                self.end_of_local_day(year, month, day)?,
            )),
            None => parse_rfc3339(trimmed).map(|instant| self.bounds(self.local_day_of(instant))),
        }
    }
}

/// Splits `YYYY-MM-DD` into its fields without validating the calendar.
fn split_day_key(input: &str) -> Option<(i32, u32, u32)> {
    let mut parts = input.split('-');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);

    let well_formed = parts.next().is_none()
        && year.len() == 4
        && month.len() == 2
        && day.len() == 2
        && [year, month, day]
            .iter()
            .all(|part| part.bytes().all(|byte| byte.is_ascii_digit()));
    if !well_formed {
        return None;
    }

    Some((year.parse().ok()?, month.parse().ok()?, day.parse().ok()?))
}

fn parse_rfc3339(input: &str) -> Result<DateTime<Utc>, CalendarError> {
    DateTime::parse_from_rfc3339(input)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|_| CalendarError::Unparseable(input.to_string()))
}

pub fn calendar_day(year: i32, month: u32, day: u32) -> Result<NaiveDate, CalendarError> {
    NaiveDate::from_ymd_opt(year, month, day).ok_or(CalendarError::InvalidDate {
        year,
        month,
        day,
    })
}

pub fn day_key(date: NaiveDate) -> String {
    date.format(DAY_FORMAT).to_string()
}
