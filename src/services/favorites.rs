use chrono::NaiveDateTime;
use rusqlite::Connection;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Actor, Listing, ListingStatus};

/// Saves a published listing for the actor. Saving twice is a no-op.
pub fn save_listing(
    conn: &Connection,
    actor: &Actor,
    listing_id: &str,
    now: NaiveDateTime,
) -> Result<bool, AppError> {
    let listing = queries::get_listing(conn, listing_id)?
        .filter(|l| l.status == ListingStatus::Published)
        .ok_or_else(|| AppError::NotFound(format!("listing {listing_id}")))?;

    if listing.owner_id == actor.user_id {
        return Err(AppError::Validation(
            "cannot save your own listing".to_string(),
        ));
    }

    let saved = queries::save_favorite(conn, &actor.user_id, &listing.id, &now)?;
    if saved {
        tracing::debug!(user_id = %actor.user_id, listing_id = %listing.id, "listing saved");
    }
    Ok(saved)
}

/// Removing a listing that was never saved is a no-op.
pub fn unsave_listing(conn: &Connection, actor: &Actor, listing_id: &str) -> Result<bool, AppError> {
    Ok(queries::remove_favorite(conn, &actor.user_id, listing_id)?)
}

pub fn saved_listings(conn: &Connection, actor: &Actor) -> Result<Vec<Listing>, AppError> {
    Ok(queries::get_favorite_listings(conn, &actor.user_id)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::{AccessType, Money, Role};

    fn at(minute: u32) -> NaiveDateTime {
        chrono::NaiveDate::from_ymd_opt(2025, 5, 1)
            .unwrap()
            .and_hms_opt(12, minute, 0)
            .unwrap()
    }

    fn hunter() -> Actor {
        Actor::new("hunter-1", Role::Hunter)
    }

    fn listing(id: &str, status: ListingStatus) -> Listing {
        Listing {
            id: id.to_string(),
            owner_id: "owner-1".to_string(),
            title: format!("Tract {id}"),
            description: String::new(),
            county: "Kerry".to_string(),
            postal_code: None,
            location: None,
            land_size: None,
            access_type: AccessType::Both,
            allowed_animals: vec![],
            amenities: vec![],
            rules: None,
            price_per_day: Money::from_cents(7500),
            service_fee: Money::from_cents(250),
            status,
            view_count: 0,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::upsert_profile(&conn, "owner-1", Some(Role::Landowner), None).unwrap();
        queries::upsert_profile(&conn, "hunter-1", Some(Role::Hunter), None).unwrap();
        queries::insert_listing(&conn, &listing("a", ListingStatus::Published)).unwrap();
        queries::insert_listing(&conn, &listing("b", ListingStatus::Published)).unwrap();
        queries::insert_listing(&conn, &listing("draft", ListingStatus::Draft)).unwrap();
        conn
    }

    #[test]
    fn test_save_is_idempotent_and_newest_first() {
        let conn = setup();
        assert!(save_listing(&conn, &hunter(), "a", at(1)).unwrap());
        assert!(!save_listing(&conn, &hunter(), "a", at(2)).unwrap());
        assert!(save_listing(&conn, &hunter(), "b", at(3)).unwrap());

        let ids: Vec<String> = saved_listings(&conn, &hunter())
            .unwrap()
            .into_iter()
            .map(|l| l.id)
            .collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_unsave() {
        let conn = setup();
        save_listing(&conn, &hunter(), "a", at(1)).unwrap();
        assert!(unsave_listing(&conn, &hunter(), "a").unwrap());
        assert!(!unsave_listing(&conn, &hunter(), "a").unwrap());
        assert!(saved_listings(&conn, &hunter()).unwrap().is_empty());
    }

    #[test]
    fn test_only_published_listings_of_others() {
        let conn = setup();
        assert!(matches!(
            save_listing(&conn, &hunter(), "draft", at(1)),
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            save_listing(&conn, &Actor::new("owner-1", Role::Landowner), "a", at(1)),
            Err(AppError::Validation(_))
        ));

        save_listing(&conn, &hunter(), "b", at(1)).unwrap();
        queries::set_listing_status(&conn, "b", ListingStatus::Suspended, &at(2)).unwrap();
        assert!(saved_listings(&conn, &hunter()).unwrap().is_empty());
    }
}
