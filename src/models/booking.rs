use chrono::{Datelike, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::Money;

/// Longest stay a single booking may cover.
pub const MAX_STAY_DAYS: i64 = 366;

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn is_valid(&self) -> bool {
        self.start <= self.end
    }

    /// Both ends fall in years 0001..=9999, the span stored dates sort
    /// correctly as `YYYY-MM-DD` text.
    pub fn within_calendar(&self) -> bool {
        [self.start, self.end]
            .iter()
            .all(|d| (1..=9999).contains(&d.year()))
    }

    /// Inclusive ranges [a,b] and [c,d] overlap iff a <= d and c <= b.
    pub fn overlaps(&self, other: &DateRange) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn total_days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let end = self.end;
        self.start.iter_days().take_while(move |d| *d <= end)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

/// Outcome of moving a booking to a target status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Apply,
    /// Already in the target status; nothing to write.
    Unchanged,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "PENDING",
            BookingStatus::Confirmed => "CONFIRMED",
            BookingStatus::Cancelled => "CANCELLED",
            BookingStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "PENDING" => Some(BookingStatus::Pending),
            "CONFIRMED" => Some(BookingStatus::Confirmed),
            "CANCELLED" => Some(BookingStatus::Cancelled),
            "COMPLETED" => Some(BookingStatus::Completed),
            _ => None,
        }
    }

    /// Cancelled bookings never hold dates.
    pub fn holds_dates(&self) -> bool {
        !matches!(self, BookingStatus::Cancelled)
    }

    /// PENDING -> {CONFIRMED, CANCELLED}, CONFIRMED -> {CANCELLED, COMPLETED}.
    /// Re-entering the current status is a no-op.
    pub fn transition_to(self, next: BookingStatus) -> Option<Transition> {
        use BookingStatus::*;

        if self == next {
            return Some(Transition::Unchanged);
        }
        match (self, next) {
            (Pending, Confirmed) | (Pending, Cancelled) => Some(Transition::Apply),
            (Confirmed, Cancelled) | (Confirmed, Completed) => Some(Transition::Apply),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub listing_id: String,
    pub hunter_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i64,
    pub price_per_day: Money,
    pub service_fee: Money,
    pub total_price: Money,
    pub grand_total: Money,
    pub status: BookingStatus,
    pub payment_intent_id: Option<String>,
    pub paid_at: Option<NaiveDateTime>,
    pub confirmed_at: Option<NaiveDateTime>,
    pub cancelled_at: Option<NaiveDateTime>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Booking {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.start_date, self.end_date)
    }
}
