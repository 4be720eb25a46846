use chrono::NaiveDateTime;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Actor, BookingStatus, Listing, RatingSummary, Review};
use crate::services::listings;

pub const RECENT_REVIEWS: i64 = 6;
const MAX_COMMENT_CHARS: usize = 2000;

#[derive(Debug, Clone, Deserialize)]
pub struct NewReview {
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

/// A listing with its rating summary and latest reviews.
#[derive(Debug, Clone, Serialize)]
pub struct ListingDetail {
    #[serde(flatten)]
    pub listing: Listing,
    #[serde(flatten)]
    pub rating: RatingSummary,
    pub recent_reviews: Vec<Review>,
}

/// Reviews a completed stay. Only the booking's hunter may write it, once.
pub fn submit_review(
    conn: &Connection,
    actor: &Actor,
    booking_id: &str,
    request: &NewReview,
    now: NaiveDateTime,
) -> Result<Review, AppError> {
    let booking = queries::get_booking_by_id(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;

    if booking.hunter_id != actor.user_id {
        return Err(AppError::Unauthorized(
            "only the booking's hunter can review it".to_string(),
        ));
    }
    if booking.status != BookingStatus::Completed {
        return Err(AppError::Validation(
            "only completed bookings can be reviewed".to_string(),
        ));
    }
    if !(1..=5).contains(&request.rating) {
        return Err(AppError::Validation("rating must be 1 to 5".to_string()));
    }
    let comment = request.comment.trim();
    if comment.chars().count() > MAX_COMMENT_CHARS {
        return Err(AppError::Validation(format!(
            "comment is limited to {MAX_COMMENT_CHARS} characters"
        )));
    }

    let listing = queries::get_listing(conn, &booking.listing_id)?
        .ok_or_else(|| AppError::NotFound(format!("listing {}", booking.listing_id)))?;

    let review = Review {
        id: uuid::Uuid::new_v4().to_string(),
        booking_id: booking.id.clone(),
        listing_id: listing.id.clone(),
        reviewer_id: actor.user_id.clone(),
        reviewee_id: listing.owner_id,
        rating: request.rating,
        comment: comment.to_string(),
        created_at: now,
    };

    if !queries::insert_review(conn, &review)? {
        return Err(AppError::AlreadyExists(format!(
            "review for booking {}",
            booking.id
        )));
    }

    tracing::info!(
        booking_id = %review.booking_id,
        listing_id = %review.listing_id,
        rating = review.rating,
        "review submitted"
    );
    Ok(review)
}

pub fn listing_reviews(
    conn: &Connection,
    actor: Option<&Actor>,
    listing_id: &str,
    limit: i64,
) -> Result<Vec<Review>, AppError> {
    let listing = listings::load_visible(conn, actor, listing_id)?;
    Ok(queries::get_reviews_for_listing(conn, &listing.id, limit)?)
}

pub fn listing_detail(conn: &Connection, listing: Listing) -> Result<ListingDetail, AppError> {
    let rating = queries::rating_summary(conn, &listing.id)?;
    let recent_reviews = queries::get_reviews_for_listing(conn, &listing.id, RECENT_REVIEWS)?;
    Ok(ListingDetail {
        listing,
        rating,
        recent_reviews,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{AccessType, ListingStatus, Money, Role};
    use crate::services::booking::{self, NewBooking};
    use chrono::NaiveDate;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-05-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn hunter() -> Actor {
        Actor::new("hunter-1", Role::Hunter)
    }

    fn owner() -> Actor {
        Actor::new("owner-1", Role::Landowner)
    }

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::upsert_profile(&conn, "owner-1", Some(Role::Landowner), None).unwrap();
        queries::upsert_profile(&conn, "hunter-1", Some(Role::Hunter), None).unwrap();
        queries::upsert_profile(&conn, "hunter-2", Some(Role::Hunter), None).unwrap();
        queries::insert_listing(
            &conn,
            &Listing {
                id: "listing-1".to_string(),
                owner_id: "owner-1".to_string(),
                title: "Ballycroy Bog".to_string(),
                description: String::new(),
                county: "Mayo".to_string(),
                postal_code: None,
                location: None,
                land_size: None,
                access_type: AccessType::Hike,
                allowed_animals: vec!["Duck".to_string()],
                amenities: vec![],
                rules: None,
                price_per_day: Money::from_cents(5000),
                service_fee: Money::from_cents(250),
                status: ListingStatus::Published,
                view_count: 0,
                created_at: now(),
                updated_at: now(),
            },
        )
        .unwrap();
        conn
    }

    fn booking_with_status(conn: &mut Connection, complete: bool) -> String {
        let request = NewBooking {
            listing_id: "listing-1".to_string(),
            start_date: d("2025-06-01"),
            end_date: d("2025-06-02"),
        };
        let created = booking::create_booking(conn, &hunter(), &request, now()).unwrap();
        let id = created.booking.id;
        if complete {
            booking::confirm_booking(conn, &owner(), &id, now()).unwrap();
            booking::complete_booking(conn, &owner(), &id, d("2025-06-10"), now()).unwrap();
        }
        id
    }

    fn five_stars() -> NewReview {
        NewReview {
            rating: 5,
            comment: "  Plenty of teal at dawn.  ".to_string(),
        }
    }

    #[test]
    fn test_review_after_completion() {
        let mut conn = setup();
        let id = booking_with_status(&mut conn, true);

        let review = submit_review(&conn, &hunter(), &id, &five_stars(), now()).unwrap();
        assert_eq!(review.reviewee_id, "owner-1");
        assert_eq!(review.listing_id, "listing-1");
        assert_eq!(review.comment, "Plenty of teal at dawn.");

        let stored = queries::get_review_for_booking(&conn, &id).unwrap().unwrap();
        assert_eq!(stored.id, review.id);
    }

    #[test]
    fn test_one_review_per_booking() {
        let mut conn = setup();
        let id = booking_with_status(&mut conn, true);

        submit_review(&conn, &hunter(), &id, &five_stars(), now()).unwrap();
        assert!(matches!(
            submit_review(&conn, &hunter(), &id, &five_stars(), now()),
            Err(AppError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_review_rules() {
        let mut conn = setup();
        let pending = booking_with_status(&mut conn, false);
        assert!(matches!(
            submit_review(&conn, &hunter(), &pending, &five_stars(), now()),
            Err(AppError::Validation(_))
        ));

        booking::cancel_booking(&conn, &hunter(), &pending, now()).unwrap();
        let done = booking_with_status(&mut conn, true);

        let stranger = Actor::new("hunter-2", Role::Hunter);
        assert!(matches!(
            submit_review(&conn, &stranger, &done, &five_stars(), now()),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            submit_review(&conn, &owner(), &done, &five_stars(), now()),
            Err(AppError::Unauthorized(_))
        ));

        let zero = NewReview {
            rating: 0,
            comment: String::new(),
        };
        assert!(matches!(
            submit_review(&conn, &hunter(), &done, &zero, now()),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            submit_review(&conn, &hunter(), "missing", &five_stars(), now()),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn test_listing_detail_summarizes_ratings() {
        let mut conn = setup();
        let listing = queries::get_listing(&conn, "listing-1").unwrap().unwrap();

        let empty = listing_detail(&conn, listing.clone()).unwrap();
        assert_eq!(empty.rating.review_count, 0);
        assert_eq!(empty.rating.average_rating, None);

        let id = booking_with_status(&mut conn, true);
        let three = NewReview {
            rating: 3,
            comment: String::new(),
        };
        submit_review(&conn, &hunter(), &id, &three, now()).unwrap();

        let detail = listing_detail(&conn, listing).unwrap();
        assert_eq!(detail.rating.review_count, 1);
        assert_eq!(detail.rating.average_rating, Some(3.0));
        assert_eq!(detail.recent_reviews.len(), 1);

        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["id"], "listing-1");
        assert_eq!(json["review_count"], 1);

        let listed = listing_reviews(&conn, None, "listing-1", 20).unwrap();
        assert_eq!(listed.len(), 1);
    }
}
