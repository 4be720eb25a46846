use chrono::{Days, NaiveDate, NaiveDateTime};

use crate::models::{Booking, BookingStatus, Listing};

const PRODID: &str = "-//HuntStay//Bookings//EN";

fn ics_date(d: NaiveDate) -> String {
    d.format("%Y%m%d").to_string()
}

fn ics_stamp(dt: NaiveDateTime) -> String {
    dt.format("%Y%m%dT%H%M%SZ").to_string()
}

fn escape_text(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

fn ics_status(status: BookingStatus) -> &'static str {
    match status {
        BookingStatus::Pending => "TENTATIVE",
        BookingStatus::Confirmed | BookingStatus::Completed => "CONFIRMED",
        BookingStatus::Cancelled => "CANCELLED",
    }
}

/// DTEND of an all-day event is exclusive, so it is the day after the last
/// booked date.
fn vevent(booking: &Booking, summary: &str, description: Option<&str>) -> String {
    let dtend = booking
        .end_date
        .checked_add_days(Days::new(1))
        .unwrap_or(booking.end_date);

    let mut event = format!(
        "BEGIN:VEVENT\r\n\
         UID:{}@huntstay\r\n\
         DTSTAMP:{}\r\n\
         DTSTART;VALUE=DATE:{}\r\n\
         DTEND;VALUE=DATE:{}\r\n\
         SUMMARY:{}\r\n\
         STATUS:{}\r\n",
        booking.id,
        ics_stamp(booking.updated_at),
        ics_date(booking.start_date),
        ics_date(dtend),
        escape_text(summary),
        ics_status(booking.status),
    );
    if let Some(description) = description {
        event.push_str(&format!("DESCRIPTION:{}\r\n", escape_text(description)));
    }
    event.push_str("END:VEVENT\r\n");
    event
}

fn wrap_calendar(name: &str, events: &str) -> String {
    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:{PRODID}\r\n\
         CALSCALE:GREGORIAN\r\n\
         X-WR-CALNAME:{}\r\n\
         {events}\
         END:VCALENDAR\r\n",
        escape_text(name)
    )
}

/// A single booking as a downloadable all-day event.
pub fn generate_ics(booking: &Booking, listing: &Listing) -> String {
    let summary = format!("Hunting at {}", listing.title);
    let description = format!(
        "{}, {} day(s), total {}",
        listing.county, booking.total_days, booking.grand_total
    );
    let event = vevent(booking, &summary, Some(&description));
    wrap_calendar(&listing.title, &event)
}

/// Occupancy feed for a listing. Carries dates and status only, no hunter
/// details.
pub fn generate_listing_feed(listing: &Listing, bookings: &[Booking]) -> String {
    let events: String = bookings
        .iter()
        .filter(|b| b.status.holds_dates())
        .map(|b| vevent(b, &format!("Booked ({})", b.status.as_str()), None))
        .collect();
    wrap_calendar(&listing.title, &events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AccessType, ListingStatus, Money};

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn listing() -> Listing {
        Listing {
            id: "l1".to_string(),
            owner_id: "owner-1".to_string(),
            title: "Lough Derg, East Shore".to_string(),
            description: String::new(),
            county: "Tipperary".to_string(),
            postal_code: None,
            location: None,
            land_size: None,
            access_type: AccessType::Both,
            allowed_animals: vec!["Duck".to_string()],
            amenities: vec![],
            rules: None,
            price_per_day: Money::from_cents(10000),
            service_fee: Money::from_cents(250),
            status: ListingStatus::Published,
            view_count: 0,
            created_at: ts("2025-03-01 09:00:00"),
            updated_at: ts("2025-03-01 09:00:00"),
        }
    }

    fn booking(id: &str, start: &str, end: &str, status: BookingStatus) -> Booking {
        let start = NaiveDate::parse_from_str(start, "%Y-%m-%d").unwrap();
        let end = NaiveDate::parse_from_str(end, "%Y-%m-%d").unwrap();
        let days = (end - start).num_days() + 1;
        Booking {
            id: id.to_string(),
            listing_id: "l1".to_string(),
            hunter_id: "hunter-1".to_string(),
            start_date: start,
            end_date: end,
            total_days: days,
            price_per_day: Money::from_cents(10000),
            service_fee: Money::from_cents(250),
            total_price: Money::from_cents(10000 * days),
            grand_total: Money::from_cents(10000 * days + 250),
            status,
            payment_intent_id: None,
            paid_at: None,
            confirmed_at: None,
            cancelled_at: None,
            created_at: ts("2025-03-10 10:00:00"),
            updated_at: ts("2025-03-10 10:00:00"),
        }
    }

    #[test]
    fn test_generate_ics_all_day() {
        let ics = generate_ics(
            &booking("test-123", "2025-06-01", "2025-06-03", BookingStatus::Confirmed),
            &listing(),
        );
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.contains("UID:test-123@huntstay"));
        assert!(ics.contains("DTSTART;VALUE=DATE:20250601"));
        assert!(ics.contains("DTEND;VALUE=DATE:20250604"));
        assert!(ics.contains("SUMMARY:Hunting at Lough Derg\\, East Shore"));
        assert!(ics.contains("DESCRIPTION:Tipperary\\, 3 day(s)\\, total 302.50"));
        assert!(ics.contains("STATUS:CONFIRMED"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
    }

    #[test]
    fn test_month_boundary() {
        let ics = generate_ics(
            &booking("b", "2025-06-30", "2025-06-30", BookingStatus::Pending),
            &listing(),
        );
        assert!(ics.contains("DTEND;VALUE=DATE:20250701"));
        assert!(ics.contains("STATUS:TENTATIVE"));
    }

    #[test]
    fn test_listing_feed_skips_cancelled() {
        let feed = generate_listing_feed(
            &listing(),
            &[
                booking("a", "2025-06-01", "2025-06-02", BookingStatus::Confirmed),
                booking("b", "2025-06-05", "2025-06-05", BookingStatus::Cancelled),
                booking("c", "2025-06-08", "2025-06-09", BookingStatus::Pending),
            ],
        );
        assert_eq!(feed.matches("BEGIN:VEVENT").count(), 2);
        assert!(feed.contains("UID:a@huntstay"));
        assert!(!feed.contains("UID:b@huntstay"));
        assert!(!feed.contains("hunter-1"));
    }
}
