//! Civil-day arithmetic in the single reference timezone.
//!
//! Every date-keyed record buckets through [`Calendar`]; nothing else in the
//! crate converts an instant into a day.

use std::sync::Arc;

use time::{format_description::FormatItem, Date, Duration, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

use crate::error::AppError;

const DATE_KEY: &[FormatItem<'static>] = time::macros::format_description!("[year]-[month]-[day]");

pub trait Clock: Send + Sync {
    fn now_utc(&self) -> OffsetDateTime;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock frozen at one instant.
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now_utc(&self) -> OffsetDateTime {
        self.0
    }
}

#[derive(Clone)]
pub struct Calendar {
    offset: UtcOffset,
    clock: Arc<dyn Clock>,
}

impl Calendar {
    pub fn new(offset: UtcOffset, clock: Arc<dyn Clock>) -> Self {
        Self { offset, clock }
    }

    pub fn system(offset: UtcOffset) -> Self {
        Self::new(offset, Arc::new(SystemClock))
    }

    /// Same clock, different civil offset.
    pub fn with_offset(self, offset: UtcOffset) -> Self {
        Self { offset, ..self }
    }

    /// Current instant expressed in the civil offset.
    pub fn now(&self) -> OffsetDateTime {
        self.clock.now_utc().to_offset(self.offset)
    }

    pub fn today(&self) -> Date {
        self.now().date()
    }

    /// The civil day an instant falls on, regardless of the offset it carries.
    pub fn date_of(&self, instant: OffsetDateTime) -> Date {
        instant.to_offset(self.offset).date()
    }

    /// Half-open `[start, end)` bounds of a civil day.
    pub fn day_bounds(&self, date: Date) -> (OffsetDateTime, OffsetDateTime) {
        let start = PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_offset(self.offset);
        (start, start + Duration::days(1))
    }

    /// Timestamp for an event booked on `date`: now when `date` is today (or
    /// absent), otherwise the current wall-clock time placed on that day.
    pub fn timestamp_for(&self, date: Option<Date>) -> OffsetDateTime {
        let now = self.now();
        match date {
            Some(d) if d != now.date() => now.replace_date(d),
            _ => now,
        }
    }

    pub fn parse_date_key(raw: &str) -> Result<Date, AppError> {
        Date::parse(raw.trim(), DATE_KEY)
            .map_err(|_| AppError::validation(format!("invalid date key {raw:?}, expected YYYY-MM-DD")))
    }
}
