//! Date-range availability and pricing for a single listing.
//!
//! Everything here is a pure function of its inputs. It is advisory: the
//! authoritative double-booking guard is the insert-time trigger on the
//! `bookings` table.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{Booking, DateRange, Money, Pricing, MAX_STAY_DAYS};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AvailabilityError {
    #[error("start date {start} is after end date {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("dates overlap existing bookings: {}", conflicting.join(", "))]
    DateConflict { conflicting: Vec<String> },

    #[error("dates must fall between years 0001 and 9999")]
    OutsideCalendar,

    #[error("a stay of {days} days exceeds the {max} day limit")]
    TooLong { days: i64, max: i64 },

    #[error("price overflow")]
    PriceOverflow,
}

fn validate_range(range: DateRange) -> Result<(), AvailabilityError> {
    if !range.is_valid() {
        return Err(AvailabilityError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }
    if !range.within_calendar() {
        return Err(AvailabilityError::OutsideCalendar);
    }
    let days = range.total_days();
    if days > MAX_STAY_DAYS {
        return Err(AvailabilityError::TooLong {
            days,
            max: MAX_STAY_DAYS,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub total_days: i64,
    pub price_per_day: Money,
    pub service_fee: Money,
    pub total_price: Money,
    pub grand_total: Money,
}

/// Prices a range without looking at other bookings.
pub fn quote(pricing: Pricing, range: DateRange) -> Result<Quote, AvailabilityError> {
    validate_range(range)?;

    let total_days = range.total_days();
    let total_price = pricing
        .price_per_day
        .checked_mul(total_days)
        .ok_or(AvailabilityError::PriceOverflow)?;
    let grand_total = total_price
        .checked_add(pricing.service_fee)
        .ok_or(AvailabilityError::PriceOverflow)?;

    Ok(Quote {
        start_date: range.start,
        end_date: range.end,
        total_days,
        price_per_day: pricing.price_per_day,
        service_fee: pricing.service_fee,
        total_price,
        grand_total,
    })
}

/// Decides whether `proposed` can become a new booking and prices it.
///
/// Cancelled bookings in `existing` are ignored. Ranges that only touch
/// (one ends on day N, the next starts on N+1) do not conflict.
pub fn check_availability(
    pricing: Pricing,
    existing: &[Booking],
    proposed: DateRange,
) -> Result<Quote, AvailabilityError> {
    validate_range(proposed)?;

    let conflicting: Vec<String> = existing
        .iter()
        .filter(|b| b.status.holds_dates() && b.range().overlaps(&proposed))
        .map(|b| b.id.clone())
        .collect();

    if !conflicting.is_empty() {
        return Err(AvailabilityError::DateConflict { conflicting });
    }

    quote(pricing, proposed)
}

/// Every calendar date held by a non-cancelled booking.
pub fn booked_dates(existing: &[Booking]) -> BTreeSet<NaiveDate> {
    existing
        .iter()
        .filter(|b| b.status.holds_dates() && b.range().is_valid())
        .flat_map(|b| b.range().days())
        .collect()
}
