use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{Connection, TransactionBehavior};
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingStatus, DateRange, ListingStatus, Role, Transition};
use crate::services::availability::check_availability;

#[derive(Debug, Clone, Deserialize)]
pub struct NewBooking {
    pub listing_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// A booking after an operation, with the owner of its listing so callers
/// can route notifications.
#[derive(Debug, Clone)]
pub struct BookingOutcome {
    pub booking: Booking,
    pub owner_id: String,
    /// False when the operation was a no-op.
    pub changed: bool,
}

/// Creates a PENDING booking.
///
/// The availability check and the insert share one IMMEDIATE transaction;
/// the store's overlap trigger still has the final word, so a racing writer
/// on another connection surfaces as `DateConflict` rather than a duplicate.
pub fn create_booking(
    conn: &mut Connection,
    actor: &Actor,
    request: &NewBooking,
    now: NaiveDateTime,
) -> Result<BookingOutcome, AppError> {
    match actor.role {
        Role::Hunter | Role::Admin => {}
        Role::Landowner => {
            return Err(AppError::Unauthorized(
                "only hunters can request bookings".to_string(),
            ))
        }
    }

    let range = DateRange::new(request.start_date, request.end_date);
    if !range.is_valid() {
        return Err(AppError::InvalidRange {
            start: range.start,
            end: range.end,
        });
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let listing = queries::get_listing(&tx, &request.listing_id)?
        .ok_or_else(|| AppError::NotFound(format!("listing {}", request.listing_id)))?;

    if listing.status != ListingStatus::Published {
        return Err(AppError::Validation(
            "listing is not accepting bookings".to_string(),
        ));
    }

    let existing = queries::get_active_bookings_for_listing(&tx, &listing.id)?;
    let quote = check_availability(listing.pricing(), &existing, range)?;

    let booking = Booking {
        id: uuid::Uuid::new_v4().to_string(),
        listing_id: listing.id.clone(),
        hunter_id: actor.user_id.clone(),
        start_date: quote.start_date,
        end_date: quote.end_date,
        total_days: quote.total_days,
        price_per_day: quote.price_per_day,
        service_fee: quote.service_fee,
        total_price: quote.total_price,
        grand_total: quote.grand_total,
        status: BookingStatus::Pending,
        payment_intent_id: None,
        paid_at: None,
        confirmed_at: None,
        cancelled_at: None,
        created_at: now,
        updated_at: now,
    };

    if let Err(e) = queries::insert_booking(&tx, &booking) {
        if queries::is_trigger_abort(&e, queries::DATE_CONFLICT_MARKER) {
            let conflicting =
                queries::get_overlapping_bookings(&tx, &listing.id, &range.start, &range.end)?
                    .into_iter()
                    .map(|b| b.id)
                    .collect();
            tracing::warn!(listing_id = %listing.id, "booking rejected by store overlap guard");
            return Err(AppError::DateConflict { conflicting });
        }
        return Err(e.into());
    }

    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        listing_id = %booking.listing_id,
        hunter_id = %booking.hunter_id,
        start = %booking.start_date,
        end = %booking.end_date,
        grand_total = %booking.grand_total,
        "booking created"
    );

    Ok(BookingOutcome {
        booking,
        owner_id: listing.owner_id,
        changed: true,
    })
}

fn load(conn: &Connection, booking_id: &str) -> Result<(Booking, String), AppError> {
    let booking = queries::get_booking_by_id(conn, booking_id)?
        .ok_or_else(|| AppError::NotFound(format!("booking {booking_id}")))?;
    let listing = queries::get_listing(conn, &booking.listing_id)?
        .ok_or_else(|| AppError::NotFound(format!("listing {}", booking.listing_id)))?;
    Ok((booking, listing.owner_id))
}

/// Moves `booking` to `target`, re-reading once if another writer got there
/// first. Re-entering the current status is a no-op.
fn apply_transition(
    conn: &Connection,
    mut booking: Booking,
    owner_id: String,
    target: BookingStatus,
    now: NaiveDateTime,
) -> Result<BookingOutcome, AppError> {
    for _ in 0..2 {
        match booking.status.transition_to(target) {
            Some(Transition::Unchanged) => {
                return Ok(BookingOutcome {
                    booking,
                    owner_id,
                    changed: false,
                })
            }
            Some(Transition::Apply) => {}
            None => {
                return Err(AppError::InvalidTransition {
                    from: booking.status,
                    to: target,
                })
            }
        }

        let updated =
            match queries::update_booking_status(conn, &booking.id, booking.status, target, &now) {
                Ok(updated) => updated,
                Err(e) if queries::is_trigger_abort(&e, queries::INVALID_TRANSITION_MARKER) => {
                    return Err(AppError::InvalidTransition {
                        from: booking.status,
                        to: target,
                    })
                }
                Err(e) => return Err(e.into()),
            };

        let current = queries::get_booking_by_id(conn, &booking.id)?
            .ok_or_else(|| AppError::NotFound(format!("booking {}", booking.id)))?;

        if updated {
            tracing::info!(
                booking_id = %current.id,
                from = booking.status.as_str(),
                to = target.as_str(),
                "booking status changed"
            );
            return Ok(BookingOutcome {
                booking: current,
                owner_id,
                changed: true,
            });
        }

        // Lost a race; plan again against the fresh row.
        booking = current;
    }

    Err(AppError::InvalidTransition {
        from: booking.status,
        to: target,
    })
}

fn require_listing_owner(actor: &Actor, owner_id: &str) -> Result<(), AppError> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Landowner if actor.user_id == owner_id => Ok(()),
        Role::Landowner | Role::Hunter => Err(AppError::Unauthorized(
            "only the listing owner can manage this booking".to_string(),
        )),
    }
}

/// Landowner accepts. Confirming an already-CONFIRMED booking changes nothing.
pub fn confirm_booking(
    conn: &Connection,
    actor: &Actor,
    booking_id: &str,
    now: NaiveDateTime,
) -> Result<BookingOutcome, AppError> {
    let (booking, owner_id) = load(conn, booking_id)?;
    require_listing_owner(actor, &owner_id)?;
    apply_transition(conn, booking, owner_id, BookingStatus::Confirmed, now)
}

/// Landowner rejects a request that is still PENDING.
pub fn decline_booking(
    conn: &Connection,
    actor: &Actor,
    booking_id: &str,
    now: NaiveDateTime,
) -> Result<BookingOutcome, AppError> {
    let (booking, owner_id) = load(conn, booking_id)?;
    require_listing_owner(actor, &owner_id)?;

    match booking.status {
        BookingStatus::Pending | BookingStatus::Cancelled => {
            apply_transition(conn, booking, owner_id, BookingStatus::Cancelled, now)
        }
        other => Err(AppError::InvalidTransition {
            from: other,
            to: BookingStatus::Cancelled,
        }),
    }
}

/// Owners and admins may cancel PENDING or CONFIRMED bookings; the hunter
/// who made the booking may cancel it only while it is PENDING.
pub fn cancel_booking(
    conn: &Connection,
    actor: &Actor,
    booking_id: &str,
    now: NaiveDateTime,
) -> Result<BookingOutcome, AppError> {
    let (booking, owner_id) = load(conn, booking_id)?;

    match actor.role {
        Role::Admin => {}
        Role::Landowner => require_listing_owner(actor, &owner_id)?,
        Role::Hunter => {
            if booking.hunter_id != actor.user_id {
                return Err(AppError::Unauthorized(
                    "this booking belongs to another hunter".to_string(),
                ));
            }
            if booking.status == BookingStatus::Confirmed {
                return Err(AppError::Unauthorized(
                    "confirmed bookings can only be cancelled by the landowner".to_string(),
                ));
            }
        }
    }

    apply_transition(conn, booking, owner_id, BookingStatus::Cancelled, now)
}

/// Marks one CONFIRMED booking COMPLETED; refused until its end date has passed.
pub fn complete_booking(
    conn: &Connection,
    actor: &Actor,
    booking_id: &str,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<BookingOutcome, AppError> {
    let (booking, owner_id) = load(conn, booking_id)?;
    require_listing_owner(actor, &owner_id)?;

    if booking.status != BookingStatus::Completed && booking.end_date >= today {
        return Err(AppError::Validation(format!(
            "booking cannot complete before its end date {}",
            booking.end_date
        )));
    }
    apply_transition(conn, booking, owner_id, BookingStatus::Completed, now)
}

/// Completes every CONFIRMED booking whose end date is before `today`.
pub fn complete_elapsed_bookings(
    conn: &Connection,
    today: NaiveDate,
    now: NaiveDateTime,
) -> Result<Vec<BookingOutcome>, AppError> {
    let mut completed = vec![];
    for booking in queries::get_elapsed_confirmed(conn, &today)? {
        let owner_id = queries::get_listing(conn, &booking.listing_id)?
            .map(|l| l.owner_id)
            .unwrap_or_default();
        let outcome = apply_transition(conn, booking, owner_id, BookingStatus::Completed, now)?;
        if outcome.changed {
            completed.push(outcome);
        }
    }
    Ok(completed)
}

/// Payment capture is independent of approval: `paid_at` is set once and a
/// PENDING booking stays PENDING unless `auto_confirm` is on.
pub fn record_payment_success(
    conn: &Connection,
    booking_id: &str,
    now: NaiveDateTime,
    auto_confirm: bool,
) -> Result<BookingOutcome, AppError> {
    let (booking, owner_id) = load(conn, booking_id)?;
    let newly_paid = queries::mark_booking_paid(conn, &booking.id, &now)?;

    if newly_paid {
        tracing::info!(booking_id = %booking.id, "booking paid");
    } else {
        tracing::info!(booking_id = %booking.id, "booking already marked paid");
    }

    let (booking, _) = load(conn, booking_id)?;
    if auto_confirm && booking.status == BookingStatus::Pending {
        let outcome = apply_transition(conn, booking, owner_id, BookingStatus::Confirmed, now)?;
        return Ok(BookingOutcome {
            changed: newly_paid || outcome.changed,
            ..outcome
        });
    }

    Ok(BookingOutcome {
        booking,
        owner_id,
        changed: newly_paid,
    })
}

/// Failed or abandoned payment cancels the booking. A COMPLETED booking is
/// left alone.
pub fn record_payment_failure(
    conn: &Connection,
    booking_id: &str,
    now: NaiveDateTime,
) -> Result<BookingOutcome, AppError> {
    let (booking, owner_id) = load(conn, booking_id)?;

    if booking.status == BookingStatus::Completed {
        tracing::warn!(booking_id = %booking.id, "payment failure for completed booking ignored");
        return Ok(BookingOutcome {
            booking,
            owner_id,
            changed: false,
        });
    }

    apply_transition(conn, booking, owner_id, BookingStatus::Cancelled, now)
}

/// Bookings visible to the actor: a hunter's trips, a landowner's incoming
/// bookings, or everything for admins.
pub fn list_bookings(
    conn: &Connection,
    actor: &Actor,
    status: Option<BookingStatus>,
    limit: i64,
) -> Result<Vec<Booking>, AppError> {
    let bookings = match actor.role {
        Role::Hunter => queries::get_bookings_for_hunter(conn, &actor.user_id, status, limit)?,
        Role::Landowner => queries::get_bookings_for_owner(conn, &actor.user_id, status, limit)?,
        Role::Admin => queries::get_all_bookings(conn, status, limit)?,
    };
    Ok(bookings)
}

/// Loads a booking the actor is allowed to see.
pub fn get_booking_for(
    conn: &Connection,
    actor: &Actor,
    booking_id: &str,
) -> Result<BookingOutcome, AppError> {
    let (booking, owner_id) = load(conn, booking_id)?;
    let visible = match actor.role {
        Role::Admin => true,
        Role::Hunter => booking.hunter_id == actor.user_id,
        Role::Landowner => owner_id == actor.user_id,
    };
    if !visible {
        return Err(AppError::NotFound(format!("booking {booking_id}")));
    }
    Ok(BookingOutcome {
        booking,
        owner_id,
        changed: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{AccessType, Listing, Money};

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

    fn listing(id: &str, status: ListingStatus) -> Listing {
        Listing {
            id: id.to_string(),
            owner_id: "owner-1".to_string(),
            title: "Glenmore Woods".to_string(),
            description: String::new(),
            county: "Wicklow".to_string(),
            postal_code: None,
            location: None,
            land_size: Some(120.0),
            access_type: AccessType::Car,
            allowed_animals: vec!["Deer".to_string()],
            amenities: vec![],
            rules: None,
            price_per_day: Money::from_cents(10000),
            service_fee: Money::from_cents(250),
            status,
            view_count: 0,
            created_at: now(),
            updated_at: now(),
        }
    }

    fn setup_at(path: &str) -> Connection {
        let conn = db::init_db(path).unwrap();
        queries::upsert_profile(&conn, "owner-1", Some(Role::Landowner), None).unwrap();
        queries::upsert_profile(&conn, "hunter-1", Some(Role::Hunter), None).unwrap();
        queries::upsert_profile(&conn, "hunter-2", Some(Role::Hunter), None).unwrap();
        conn
    }

    fn setup() -> Connection {
        let conn = setup_at(":memory:");
        queries::insert_listing(&conn, &listing("listing-1", ListingStatus::Published)).unwrap();
        conn
    }

    fn request(start: &str, end: &str) -> NewBooking {
        NewBooking {
            listing_id: "listing-1".to_string(),
            start_date: d(start),
            end_date: d(end),
        }
    }

    fn count_bookings(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_create_booking_snapshots_price() {
        let mut conn = setup();
        let outcome =
            create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-03"), now())
                .unwrap();
        let b = outcome.booking;
        assert_eq!(b.status, BookingStatus::Pending);
        assert_eq!(b.total_days, 3);
        assert_eq!(b.total_price, Money::from_cents(30000));
        assert_eq!(b.grand_total, Money::from_cents(30250));
        assert_eq!(outcome.owner_id, "owner-1");

        let stored = queries::get_booking_by_id(&conn, &b.id).unwrap().unwrap();
        assert_eq!(stored.grand_total, b.grand_total);
        assert_eq!(stored.start_date, d("2025-06-01"));
    }

    #[test]
    fn test_overlap_rejected_and_adjacent_allowed() {
        let mut conn = setup();
        let first =
            create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-03"), now())
                .unwrap();

        let err = create_booking(&mut conn, &hunter(), &request("2025-06-03", "2025-06-05"), now())
            .unwrap_err();
        match err {
            AppError::DateConflict { conflicting } => {
                assert_eq!(conflicting, vec![first.booking.id.clone()])
            }
            other => panic!("expected conflict, got {other:?}"),
        }

        assert!(
            create_booking(&mut conn, &hunter(), &request("2025-06-04", "2025-06-06"), now())
                .is_ok()
        );
        assert_eq!(count_bookings(&conn), 2);
    }

    #[test]
    fn test_invalid_range_creates_nothing() {
        let mut conn = setup();
        let err = create_booking(&mut conn, &hunter(), &request("2025-06-05", "2025-06-01"), now())
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidRange { .. }));
        assert_eq!(count_bookings(&conn), 0);
    }

    #[test]
    fn test_landowner_cannot_book() {
        let mut conn = setup();
        let err = create_booking(&mut conn, &owner(), &request("2025-06-01", "2025-06-01"), now())
            .unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_unpublished_listing_rejected() {
        let mut conn = setup();
        queries::insert_listing(&conn, &listing("listing-2", ListingStatus::Draft)).unwrap();
        let mut req = request("2025-06-01", "2025-06-01");
        req.listing_id = "listing-2".to_string();
        let err = create_booking(&mut conn, &hunter(), &req, now()).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        req.listing_id = "missing".to_string();
        let err = create_booking(&mut conn, &hunter(), &req, now()).unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_cancelling_frees_dates() {
        let mut conn = setup();
        let a = create_booking(&mut conn, &hunter(), &request("2025-07-01", "2025-07-02"), now())
            .unwrap();
        confirm_booking(&conn, &owner(), &a.booking.id, now()).unwrap();
        cancel_booking(&conn, &owner(), &a.booking.id, now()).unwrap();

        let b = create_booking(&mut conn, &hunter(), &request("2025-07-01", "2025-07-02"), now());
        assert!(b.is_ok());
    }

    #[test]
    fn test_confirm_is_idempotent() {
        let mut conn = setup();
        let a = create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-02"), now())
            .unwrap();

        let first = confirm_booking(&conn, &owner(), &a.booking.id, now()).unwrap();
        assert!(first.changed);
        assert_eq!(first.booking.status, BookingStatus::Confirmed);
        assert_eq!(first.booking.confirmed_at, Some(now()));

        let later = now() + chrono::Duration::hours(1);
        let second = confirm_booking(&conn, &owner(), &a.booking.id, later).unwrap();
        assert!(!second.changed);
        assert_eq!(second.booking.confirmed_at, Some(now()));
    }

    #[test]
    fn test_other_landowner_cannot_confirm() {
        let mut conn = setup();
        let a = create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-02"), now())
            .unwrap();
        let stranger = Actor::new("owner-2", Role::Landowner);
        let err = confirm_booking(&conn, &stranger, &a.booking.id, now()).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn test_no_transition_out_of_cancelled() {
        let mut conn = setup();
        let a = create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-02"), now())
            .unwrap();
        decline_booking(&conn, &owner(), &a.booking.id, now()).unwrap();

        let err = confirm_booking(&conn, &owner(), &a.booking.id, now()).unwrap_err();
        assert!(matches!(
            err,
            AppError::InvalidTransition {
                from: BookingStatus::Cancelled,
                to: BookingStatus::Confirmed
            }
        ));
    }

    #[test]
    fn test_store_rejects_illegal_status_update() {
        let mut conn = setup();
        let a = create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-02"), now())
            .unwrap();
        let err = queries::update_booking_status(
            &conn,
            &a.booking.id,
            BookingStatus::Pending,
            BookingStatus::Completed,
            &now(),
        )
        .unwrap_err();
        assert!(queries::is_trigger_abort(&err, queries::INVALID_TRANSITION_MARKER));
    }

    #[test]
    fn test_hunter_cancel_rules() {
        let mut conn = setup();
        let pending =
            create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-02"), now())
                .unwrap();
        let confirmed =
            create_booking(&mut conn, &hunter(), &request("2025-06-10", "2025-06-12"), now())
                .unwrap();
        confirm_booking(&conn, &owner(), &confirmed.booking.id, now()).unwrap();

        let other = Actor::new("hunter-2", Role::Hunter);
        assert!(matches!(
            cancel_booking(&conn, &other, &pending.booking.id, now()),
            Err(AppError::Unauthorized(_))
        ));
        assert!(matches!(
            cancel_booking(&conn, &hunter(), &confirmed.booking.id, now()),
            Err(AppError::Unauthorized(_))
        ));

        let cancelled = cancel_booking(&conn, &hunter(), &pending.booking.id, now()).unwrap();
        assert_eq!(cancelled.booking.status, BookingStatus::Cancelled);
        assert_eq!(cancelled.booking.cancelled_at, Some(now()));
    }

    #[test]
    fn test_completion_waits_for_end_date() {
        let mut conn = setup();
        let a = create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-03"), now())
            .unwrap();
        confirm_booking(&conn, &owner(), &a.booking.id, now()).unwrap();

        let on_last_day = complete_elapsed_bookings(&conn, d("2025-06-03"), now()).unwrap();
        assert!(on_last_day.is_empty());
        assert!(matches!(
            complete_booking(&conn, &owner(), &a.booking.id, d("2025-06-03"), now()),
            Err(AppError::Validation(_))
        ));

        let next_day = complete_elapsed_bookings(&conn, d("2025-06-04"), now()).unwrap();
        assert_eq!(next_day.len(), 1);
        assert_eq!(next_day[0].booking.status, BookingStatus::Completed);
    }

    #[test]
    fn test_far_future_dates_are_rejected() {
        let mut conn = setup();
        let far: NewBooking = serde_json::from_value(serde_json::json!({
            "listing_id": "listing-1",
            "start_date": "+10000-01-01",
            "end_date": "+10000-01-02",
        }))
        .unwrap();

        assert!(matches!(
            create_booking(&mut conn, &hunter(), &far, now()),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            create_booking(&mut conn, &hunter(), &request("2025-06-01", "2027-06-01"), now()),
            Err(AppError::Validation(_))
        ));
        assert_eq!(count_bookings(&conn), 0);
        assert!(complete_elapsed_bookings(&conn, d("2026-10-18"), now())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_pending_bookings_never_complete() {
        let mut conn = setup();
        create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-03"), now()).unwrap();
        let done = complete_elapsed_bookings(&conn, d("2025-12-01"), now()).unwrap();
        assert!(done.is_empty());
    }

    #[test]
    fn test_payment_success_is_idempotent_and_keeps_status() {
        let mut conn = setup();
        let a = create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-02"), now())
            .unwrap();

        let first = record_payment_success(&conn, &a.booking.id, now(), false).unwrap();
        assert!(first.changed);
        assert_eq!(first.booking.paid_at, Some(now()));
        assert_eq!(first.booking.status, BookingStatus::Pending);

        let later = now() + chrono::Duration::minutes(5);
        let second = record_payment_success(&conn, &a.booking.id, later, false).unwrap();
        assert!(!second.changed);
        assert_eq!(second.booking.paid_at, Some(now()));
    }

    #[test]
    fn test_payment_success_after_confirmation() {
        let mut conn = setup();
        let a = create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-02"), now())
            .unwrap();
        confirm_booking(&conn, &owner(), &a.booking.id, now()).unwrap();

        let paid = record_payment_success(&conn, &a.booking.id, now(), true).unwrap();
        assert_eq!(paid.booking.status, BookingStatus::Confirmed);
        assert!(paid.booking.paid_at.is_some());
    }

    #[test]
    fn test_payment_success_auto_confirms_when_enabled() {
        let mut conn = setup();
        let a = create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-02"), now())
            .unwrap();
        let paid = record_payment_success(&conn, &a.booking.id, now(), true).unwrap();
        assert_eq!(paid.booking.status, BookingStatus::Confirmed);
        assert_eq!(paid.booking.confirmed_at, Some(now()));
    }

    #[test]
    fn test_payment_failure_cancels_once() {
        let mut conn = setup();
        let a = create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-02"), now())
            .unwrap();

        let first = record_payment_failure(&conn, &a.booking.id, now()).unwrap();
        assert!(first.changed);
        assert_eq!(first.booking.status, BookingStatus::Cancelled);

        let second = record_payment_failure(&conn, &a.booking.id, now()).unwrap();
        assert!(!second.changed);
    }

    #[test]
    fn test_list_bookings_by_role() {
        let mut conn = setup();
        create_booking(&mut conn, &hunter(), &request("2025-06-01", "2025-06-02"), now()).unwrap();
        let other = Actor::new("hunter-2", Role::Hunter);
        create_booking(&mut conn, &other, &request("2025-06-05", "2025-06-06"), now()).unwrap();

        assert_eq!(list_bookings(&conn, &hunter(), None, 50).unwrap().len(), 1);
        assert_eq!(list_bookings(&conn, &owner(), None, 50).unwrap().len(), 2);
        assert_eq!(
            list_bookings(&conn, &owner(), Some(BookingStatus::Confirmed), 50)
                .unwrap()
                .len(),
            0
        );
        let admin = Actor::new("admin-1", Role::Admin);
        assert_eq!(list_bookings(&conn, &admin, None, 1).unwrap().len(), 1);
    }

    #[test]
    fn test_store_guard_across_connections() {
        let path = std::env::temp_dir().join(format!("huntstay-{}.db", uuid::Uuid::new_v4()));
        let path_str = path.to_string_lossy().to_string();

        let mut first = setup_at(&path_str);
        queries::insert_listing(&first, &listing("listing-1", ListingStatus::Published)).unwrap();
        let second = db::init_db(&path_str).unwrap();

        // Both writers passed the advisory check before either inserted.
        let stale_view = queries::get_active_bookings_for_listing(&second, "listing-1").unwrap();
        assert!(stale_view.is_empty());

        let created =
            create_booking(&mut first, &hunter(), &request("2025-08-01", "2025-08-03"), now())
                .unwrap();

        let range = DateRange::new(d("2025-08-02"), d("2025-08-02"));
        let racing = Booking {
            id: "racer".to_string(),
            start_date: range.start,
            end_date: range.end,
            total_days: 1,
            total_price: Money::from_cents(10000),
            grand_total: Money::from_cents(10250),
            ..created.booking.clone()
        };
        let err = queries::insert_booking(&second, &racing).unwrap_err();
        assert!(queries::is_trigger_abort(&err, queries::DATE_CONFLICT_MARKER));

        drop(first);
        drop(second);
        let _ = std::fs::remove_file(&path);
        let _ = std::fs::remove_file(path.with_extension("db-wal"));
        let _ = std::fs::remove_file(path.with_extension("db-shm"));
    }
}
