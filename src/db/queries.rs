use anyhow::Context;
use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::types::ToSql;
use rusqlite::{params, Connection, OptionalExtension};

use crate::models::{
    AccessType, Booking, BookingStatus, GeoPoint, Listing, ListingStatus, Money, Profile,
    RatingSummary, Review, Role,
};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Raised by the `bookings_no_overlap` trigger.
pub const DATE_CONFLICT_MARKER: &str = "booking_date_conflict";
/// Raised by the `bookings_status_transition` trigger.
pub const INVALID_TRANSITION_MARKER: &str = "invalid_status_transition";

fn ts(dt: &NaiveDateTime) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

fn date(d: &NaiveDate) -> String {
    d.format(DATE_FORMAT).to_string()
}

fn parse_ts(s: &str) -> anyhow::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .with_context(|| format!("invalid timestamp in database: {s}"))
}

fn parse_opt_ts(s: Option<String>) -> anyhow::Result<Option<NaiveDateTime>> {
    s.as_deref().map(parse_ts).transpose()
}

fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .with_context(|| format!("invalid date in database: {s}"))
}

/// True when `err` is an SQLite abort carrying `marker` (raised by a trigger).
pub fn is_trigger_abort(err: &anyhow::Error, marker: &str) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<rusqlite::Error>(),
            Some(rusqlite::Error::SqliteFailure(_, Some(msg))) if msg.contains(marker)
        )
    })
}

// ── Profiles ──

pub fn get_profile(conn: &Connection, id: &str) -> anyhow::Result<Option<Profile>> {
    let row = conn
        .query_row(
            "SELECT id, role, display_name, created_at, updated_at FROM profiles WHERE id = ?1",
            params![id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((id, role, display_name, created_at, updated_at)) => Ok(Some(Profile {
            id,
            role: role.as_deref().and_then(Role::parse),
            display_name,
            created_at: parse_ts(&created_at)?,
            updated_at: parse_ts(&updated_at)?,
        })),
        None => Ok(None),
    }
}

pub fn upsert_profile(
    conn: &Connection,
    id: &str,
    role: Option<Role>,
    display_name: Option<&str>,
) -> anyhow::Result<()> {
    let now = ts(&Utc::now().naive_utc());
    conn.execute(
        "INSERT INTO profiles (id, role, display_name, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?4)
         ON CONFLICT(id) DO UPDATE SET
           role = COALESCE(excluded.role, profiles.role),
           display_name = COALESCE(excluded.display_name, profiles.display_name),
           updated_at = excluded.updated_at",
        params![id, role.map(|r| r.as_str()), display_name, now],
    )?;
    Ok(())
}

// ── Listings ──

const LISTING_COLUMNS: &str = "id, owner_id, title, description, county, postal_code, latitude, longitude, \
     land_size, access_type, allowed_animals, amenities, rules, price_per_day_cents, \
     service_fee_cents, status, view_count, created_at, updated_at";

fn parse_listing_row(row: &rusqlite::Row) -> anyhow::Result<Listing> {
    let access_type: String = row.get(9)?;
    let animals_json: String = row.get(10)?;
    let amenities_json: String = row.get(11)?;
    let status: String = row.get(15)?;
    let latitude: Option<f64> = row.get(6)?;
    let longitude: Option<f64> = row.get(7)?;
    let created_at: String = row.get(17)?;
    let updated_at: String = row.get(18)?;

    Ok(Listing {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        county: row.get(4)?,
        postal_code: row.get(5)?,
        location: latitude
            .zip(longitude)
            .and_then(|(lat, lng)| GeoPoint::new(lat, lng)),
        land_size: row.get(8)?,
        access_type: AccessType::parse(&access_type)
            .with_context(|| format!("unknown access type: {access_type}"))?,
        allowed_animals: serde_json::from_str(&animals_json)?,
        amenities: serde_json::from_str(&amenities_json)?,
        rules: row.get(12)?,
        price_per_day: Money::from_cents(row.get(13)?),
        service_fee: Money::from_cents(row.get(14)?),
        status: ListingStatus::parse(&status)
            .with_context(|| format!("unknown listing status: {status}"))?,
        view_count: row.get(16)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

pub fn insert_listing(conn: &Connection, listing: &Listing) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO listings ({LISTING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19)"
        ),
        params![
            listing.id,
            listing.owner_id,
            listing.title,
            listing.description,
            listing.county,
            listing.postal_code,
            listing.location.map(|p| p.latitude),
            listing.location.map(|p| p.longitude),
            listing.land_size,
            listing.access_type.as_str(),
            serde_json::to_string(&listing.allowed_animals)?,
            serde_json::to_string(&listing.amenities)?,
            listing.rules,
            listing.price_per_day.cents(),
            listing.service_fee.cents(),
            listing.status.as_str(),
            listing.view_count,
            ts(&listing.created_at),
            ts(&listing.updated_at),
        ],
    )?;
    Ok(())
}

pub fn update_listing(conn: &Connection, listing: &Listing) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE listings SET
           title = ?2, description = ?3, county = ?4, postal_code = ?5,
           latitude = ?6, longitude = ?7, land_size = ?8, access_type = ?9,
           allowed_animals = ?10, amenities = ?11, rules = ?12,
           price_per_day_cents = ?13, service_fee_cents = ?14, updated_at = ?15
         WHERE id = ?1",
        params![
            listing.id,
            listing.title,
            listing.description,
            listing.county,
            listing.postal_code,
            listing.location.map(|p| p.latitude),
            listing.location.map(|p| p.longitude),
            listing.land_size,
            listing.access_type.as_str(),
            serde_json::to_string(&listing.allowed_animals)?,
            serde_json::to_string(&listing.amenities)?,
            listing.rules,
            listing.price_per_day.cents(),
            listing.service_fee.cents(),
            ts(&listing.updated_at),
        ],
    )?;
    Ok(count > 0)
}

pub fn get_listing(conn: &Connection, id: &str) -> anyhow::Result<Option<Listing>> {
    let result = conn
        .query_row(
            &format!("SELECT {LISTING_COLUMNS} FROM listings WHERE id = ?1"),
            params![id],
            |row| Ok(parse_listing_row(row)),
        )
        .optional()?;

    result.transpose()
}

pub fn set_listing_status(
    conn: &Connection,
    id: &str,
    status: ListingStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE listings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), ts(now), id],
    )?;
    Ok(count > 0)
}

pub fn increment_view_count(conn: &Connection, id: &str) -> anyhow::Result<()> {
    conn.execute(
        "UPDATE listings SET view_count = view_count + 1 WHERE id = ?1",
        params![id],
    )?;
    Ok(())
}

#[derive(Debug, Default, Clone)]
pub struct ListingFilter {
    pub county: Option<String>,
    pub animal: Option<String>,
    pub access_type: Option<AccessType>,
    pub limit: i64,
}

pub fn discover_listings(conn: &Connection, filter: &ListingFilter) -> anyhow::Result<Vec<Listing>> {
    let mut sql = format!("SELECT {LISTING_COLUMNS} FROM listings WHERE status = 'PUBLISHED'");
    let mut params_vec: Vec<Box<dyn ToSql>> = vec![];

    if let Some(county) = &filter.county {
        params_vec.push(Box::new(county.clone()));
        sql.push_str(&format!(" AND county = ?{} COLLATE NOCASE", params_vec.len()));
    }
    if let Some(animal) = &filter.animal {
        params_vec.push(Box::new(animal.clone()));
        sql.push_str(&format!(
            " AND EXISTS (SELECT 1 FROM json_each(listings.allowed_animals) WHERE value = ?{} COLLATE NOCASE)",
            params_vec.len()
        ));
    }
    if let Some(access) = filter.access_type {
        params_vec.push(Box::new(access.as_str()));
        sql.push_str(&format!(" AND access_type = ?{}", params_vec.len()));
    }
    params_vec.push(Box::new(filter.limit));
    sql.push_str(&format!(" ORDER BY created_at DESC, id ASC LIMIT ?{}", params_vec.len()));

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn ToSql> = params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_listing_row(row)))?;

    let mut listings = vec![];
    for row in rows {
        listings.push(row??);
    }
    Ok(listings)
}

pub fn get_listings_for_owner(conn: &Connection, owner_id: &str) -> anyhow::Result<Vec<Listing>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LISTING_COLUMNS} FROM listings WHERE owner_id = ?1 ORDER BY created_at DESC, id ASC"
    ))?;
    let rows = stmt.query_map(params![owner_id], |row| Ok(parse_listing_row(row)))?;

    let mut listings = vec![];
    for row in rows {
        listings.push(row??);
    }
    Ok(listings)
}

// ── Bookings ──

const BOOKING_COLUMNS: &str = "id, listing_id, hunter_id, start_date, end_date, total_days, \
     price_per_day_cents, service_fee_cents, total_price_cents, grand_total_cents, status, \
     payment_intent_id, paid_at, confirmed_at, cancelled_at, created_at, updated_at";

/// `BOOKING_COLUMNS` qualified with the `b.` alias for joins.
const BOOKING_COLUMNS_B: &str = "b.id, b.listing_id, b.hunter_id, b.start_date, b.end_date, b.total_days, \
     b.price_per_day_cents, b.service_fee_cents, b.total_price_cents, b.grand_total_cents, b.status, \
     b.payment_intent_id, b.paid_at, b.confirmed_at, b.cancelled_at, b.created_at, b.updated_at";

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let start_date: String = row.get(3)?;
    let end_date: String = row.get(4)?;
    let status: String = row.get(10)?;
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;

    Ok(Booking {
        id: row.get(0)?,
        listing_id: row.get(1)?,
        hunter_id: row.get(2)?,
        start_date: parse_date(&start_date)?,
        end_date: parse_date(&end_date)?,
        total_days: row.get(5)?,
        price_per_day: Money::from_cents(row.get(6)?),
        service_fee: Money::from_cents(row.get(7)?),
        total_price: Money::from_cents(row.get(8)?),
        grand_total: Money::from_cents(row.get(9)?),
        status: BookingStatus::parse(&status)
            .with_context(|| format!("unknown booking status: {status}"))?,
        payment_intent_id: row.get(11)?,
        paid_at: parse_opt_ts(row.get(12)?)?,
        confirmed_at: parse_opt_ts(row.get(13)?)?,
        cancelled_at: parse_opt_ts(row.get(14)?)?,
        created_at: parse_ts(&created_at)?,
        updated_at: parse_ts(&updated_at)?,
    })
}

fn collect_bookings(
    conn: &Connection,
    sql: &str,
    params: &[&dyn ToSql],
) -> anyhow::Result<Vec<Booking>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params, |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

/// Fails with an error carrying [`DATE_CONFLICT_MARKER`] when the store
/// already holds an overlapping active booking for the listing.
pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        &format!(
            "INSERT INTO bookings ({BOOKING_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)"
        ),
        params![
            booking.id,
            booking.listing_id,
            booking.hunter_id,
            date(&booking.start_date),
            date(&booking.end_date),
            booking.total_days,
            booking.price_per_day.cents(),
            booking.service_fee.cents(),
            booking.total_price.cents(),
            booking.grand_total.cents(),
            booking.status.as_str(),
            booking.payment_intent_id,
            booking.paid_at.as_ref().map(ts),
            booking.confirmed_at.as_ref().map(ts),
            booking.cancelled_at.as_ref().map(ts),
            ts(&booking.created_at),
            ts(&booking.updated_at),
        ],
    )
    .context("failed to insert booking")?;
    Ok(())
}

pub fn get_booking_by_id(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn
        .query_row(
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = ?1"),
            params![id],
            |row| Ok(parse_booking_row(row)),
        )
        .optional()?;

    result.transpose()
}

pub fn get_active_bookings_for_listing(
    conn: &Connection,
    listing_id: &str,
) -> anyhow::Result<Vec<Booking>> {
    collect_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE listing_id = ?1 AND status != 'CANCELLED' ORDER BY start_date ASC"
        ),
        &[&listing_id],
    )
}

pub fn get_overlapping_bookings(
    conn: &Connection,
    listing_id: &str,
    start: &NaiveDate,
    end: &NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    collect_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE listing_id = ?1 AND status != 'CANCELLED'
               AND start_date <= ?3 AND ?2 <= end_date
             ORDER BY start_date ASC"
        ),
        &[&listing_id, &date(start), &date(end)],
    )
}

/// Compare-and-set on the current status. Returns false when the row is
/// missing or no longer in `from`.
pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    from: BookingStatus,
    to: BookingStatus,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let now = ts(now);
    let count = conn.execute(
        "UPDATE bookings SET
           status = ?1,
           confirmed_at = CASE WHEN ?1 = 'CONFIRMED' THEN ?2 ELSE confirmed_at END,
           cancelled_at = CASE WHEN ?1 = 'CANCELLED' THEN ?2 ELSE cancelled_at END,
           updated_at = ?2
         WHERE id = ?3 AND status = ?4",
        params![to.as_str(), now, id, from.as_str()],
    )?;
    Ok(count > 0)
}

/// Sets `paid_at` if it is still empty. Returns whether this call set it.
pub fn mark_booking_paid(conn: &Connection, id: &str, now: &NaiveDateTime) -> anyhow::Result<bool> {
    let now = ts(now);
    let count = conn.execute(
        "UPDATE bookings SET paid_at = ?1, updated_at = ?1 WHERE id = ?2 AND paid_at IS NULL",
        params![now, id],
    )?;
    Ok(count > 0)
}

pub fn set_payment_intent_id(conn: &Connection, id: &str, intent_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE bookings SET payment_intent_id = ?1 WHERE id = ?2",
        params![intent_id, id],
    )?;
    Ok(count > 0)
}

pub fn get_bookings_for_hunter(
    conn: &Connection,
    hunter_id: &str,
    status: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    match status {
        Some(status) => collect_bookings(
            conn,
            &format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE hunter_id = ?1 AND status = ?2 ORDER BY start_date DESC LIMIT ?3"
            ),
            &[&hunter_id, &status.as_str(), &limit],
        ),
        None => collect_bookings(
            conn,
            &format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings
                 WHERE hunter_id = ?1 ORDER BY start_date DESC LIMIT ?2"
            ),
            &[&hunter_id, &limit],
        ),
    }
}

pub fn get_bookings_for_owner(
    conn: &Connection,
    owner_id: &str,
    status: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    match status {
        Some(status) => collect_bookings(
            conn,
            &format!(
                "SELECT {BOOKING_COLUMNS_B} FROM bookings b
                 INNER JOIN listings l ON l.id = b.listing_id
                 WHERE l.owner_id = ?1 AND b.status = ?2 ORDER BY b.start_date DESC LIMIT ?3"
            ),
            &[&owner_id, &status.as_str(), &limit],
        ),
        None => collect_bookings(
            conn,
            &format!(
                "SELECT {BOOKING_COLUMNS_B} FROM bookings b
                 INNER JOIN listings l ON l.id = b.listing_id
                 WHERE l.owner_id = ?1 ORDER BY b.start_date DESC LIMIT ?2"
            ),
            &[&owner_id, &limit],
        ),
    }
}

pub fn get_all_bookings(
    conn: &Connection,
    status: Option<BookingStatus>,
    limit: i64,
) -> anyhow::Result<Vec<Booking>> {
    match status {
        Some(status) => collect_bookings(
            conn,
            &format!(
                "SELECT {BOOKING_COLUMNS} FROM bookings WHERE status = ?1 ORDER BY start_date DESC LIMIT ?2"
            ),
            &[&status.as_str(), &limit],
        ),
        None => collect_bookings(
            conn,
            &format!("SELECT {BOOKING_COLUMNS} FROM bookings ORDER BY start_date DESC LIMIT ?1"),
            &[&limit],
        ),
    }
}

/// CONFIRMED bookings whose last day is strictly before `today`.
pub fn get_elapsed_confirmed(conn: &Connection, today: &NaiveDate) -> anyhow::Result<Vec<Booking>> {
    collect_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE status = 'CONFIRMED' AND end_date < ?1 ORDER BY end_date ASC"
        ),
        &[&date(today)],
    )
}

pub fn get_upcoming_for_hunter(
    conn: &Connection,
    hunter_id: &str,
    today: &NaiveDate,
) -> anyhow::Result<Vec<Booking>> {
    collect_bookings(
        conn,
        &format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings
             WHERE hunter_id = ?1 AND status IN ('PENDING', 'CONFIRMED') AND end_date >= ?2
             ORDER BY start_date ASC"
        ),
        &[&hunter_id, &date(today)],
    )
}

/// Sum of `total_price` over COMPLETED bookings on the owner's listings,
/// optionally limited to bookings ending on or after `since`.
pub fn completed_earnings_for_owner(
    conn: &Connection,
    owner_id: &str,
    since: Option<&NaiveDate>,
) -> anyhow::Result<Money> {
    let since = since.map(date).unwrap_or_else(|| "0000-01-01".to_string());
    let cents: i64 = conn.query_row(
        "SELECT COALESCE(SUM(b.total_price_cents), 0) FROM bookings b
         INNER JOIN listings l ON l.id = b.listing_id
         WHERE l.owner_id = ?1 AND b.status = 'COMPLETED' AND b.end_date >= ?2",
        params![owner_id, since],
        |row| row.get(0),
    )?;
    Ok(Money::from_cents(cents))
}

pub fn count_bookings_by_status(conn: &Connection) -> anyhow::Result<Vec<(BookingStatus, i64)>> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM bookings GROUP BY status ORDER BY status")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

    let mut counts = vec![];
    for row in rows {
        let (status, count) = row?;
        if let Some(status) = BookingStatus::parse(&status) {
            counts.push((status, count));
        }
    }
    Ok(counts)
}

pub fn count_listings_by_status(conn: &Connection) -> anyhow::Result<Vec<(ListingStatus, i64)>> {
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM listings GROUP BY status ORDER BY status")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;

    let mut counts = vec![];
    for row in rows {
        let (status, count) = row?;
        if let Some(status) = ListingStatus::parse(&status) {
            counts.push((status, count));
        }
    }
    Ok(counts)
}

// ── Payment Events ──

/// Records a provider event id. Returns false if it was already recorded.
pub fn record_payment_event(
    conn: &Connection,
    event_id: &str,
    kind: &str,
    booking_id: Option<&str>,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT OR IGNORE INTO payment_events (id, kind, booking_id) VALUES (?1, ?2, ?3)",
        params![event_id, kind, booking_id],
    )?;
    Ok(count > 0)
}

// ── Reviews ──

const REVIEW_COLUMNS: &str =
    "id, booking_id, listing_id, reviewer_id, reviewee_id, rating, comment, created_at";

fn parse_review_row(row: &rusqlite::Row) -> anyhow::Result<Review> {
    let created_at: String = row.get(7)?;
    Ok(Review {
        id: row.get(0)?,
        booking_id: row.get(1)?,
        listing_id: row.get(2)?,
        reviewer_id: row.get(3)?,
        reviewee_id: row.get(4)?,
        rating: row.get(5)?,
        comment: row.get(6)?,
        created_at: parse_ts(&created_at)?,
    })
}

/// Returns false if the booking already has a review.
pub fn insert_review(conn: &Connection, review: &Review) -> anyhow::Result<bool> {
    let count = conn
        .execute(
            &format!("INSERT OR IGNORE INTO reviews ({REVIEW_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"),
            params![
                review.id,
                review.booking_id,
                review.listing_id,
                review.reviewer_id,
                review.reviewee_id,
                review.rating,
                review.comment,
                ts(&review.created_at),
            ],
        )
        .context("failed to insert review")?;
    Ok(count > 0)
}

pub fn get_review_for_booking(conn: &Connection, booking_id: &str) -> anyhow::Result<Option<Review>> {
    let result = conn
        .query_row(
            &format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE booking_id = ?1"),
            params![booking_id],
            |row| Ok(parse_review_row(row)),
        )
        .optional()?;

    result.transpose()
}

pub fn get_reviews_for_listing(
    conn: &Connection,
    listing_id: &str,
    limit: i64,
) -> anyhow::Result<Vec<Review>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLUMNS} FROM reviews WHERE listing_id = ?1
         ORDER BY created_at DESC, id ASC LIMIT ?2"
    ))?;
    let rows = stmt.query_map(params![listing_id, limit], |row| Ok(parse_review_row(row)))?;

    let mut reviews = vec![];
    for row in rows {
        reviews.push(row??);
    }
    Ok(reviews)
}

pub fn rating_summary(conn: &Connection, listing_id: &str) -> anyhow::Result<RatingSummary> {
    let (review_count, average_rating) = conn.query_row(
        "SELECT COUNT(*), AVG(rating) FROM reviews WHERE listing_id = ?1",
        params![listing_id],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, Option<f64>>(1)?)),
    )?;
    Ok(RatingSummary {
        review_count,
        average_rating,
    })
}

// ── Favorites ──

/// Returns false if the listing was already saved.
pub fn save_favorite(
    conn: &Connection,
    user_id: &str,
    listing_id: &str,
    now: &NaiveDateTime,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "INSERT OR IGNORE INTO favorites (user_id, listing_id, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, listing_id, ts(now)],
    )?;
    Ok(count > 0)
}

pub fn remove_favorite(conn: &Connection, user_id: &str, listing_id: &str) -> anyhow::Result<bool> {
    let count = conn.execute(
        "DELETE FROM favorites WHERE user_id = ?1 AND listing_id = ?2",
        params![user_id, listing_id],
    )?;
    Ok(count > 0)
}

/// Saved listings that are still published, most recently saved first.
pub fn get_favorite_listings(conn: &Connection, user_id: &str) -> anyhow::Result<Vec<Listing>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {LISTING_COLUMNS} FROM listings
         WHERE status = 'PUBLISHED'
           AND id IN (SELECT listing_id FROM favorites WHERE user_id = ?1)
         ORDER BY (SELECT created_at FROM favorites
                   WHERE user_id = ?1 AND listing_id = listings.id) DESC, id ASC"
    ))?;
    let rows = stmt.query_map(params![user_id], |row| Ok(parse_listing_row(row)))?;

    let mut listings = vec![];
    for row in rows {
        listings.push(row??);
    }
    Ok(listings)
}
