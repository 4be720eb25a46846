use std::collections::BTreeSet;

use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde::Deserialize;
use serde_json::Value;

use crate::db::queries::{self, ListingFilter};
use crate::errors::AppError;
use crate::models::{
    AccessType, Actor, DateRange, Listing, ListingStatus, Money, Role, DEFAULT_SERVICE_FEE,
};
use crate::services::availability::{self, Quote};
use crate::services::geo::parse_coordinate_value;

pub const DEFAULT_DISCOVER_LIMIT: i64 = 50;
pub const MAX_DISCOVER_LIMIT: i64 = 200;

#[derive(Debug, Clone, Deserialize)]
pub struct NewListing {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub county: String,
    pub postal_code: Option<String>,
    /// Any shape accepted by [`parse_coordinate_value`].
    pub location: Option<Value>,
    pub land_size: Option<f64>,
    pub access_type: AccessType,
    #[serde(default)]
    pub allowed_animals: Vec<String>,
    #[serde(default)]
    pub amenities: Vec<String>,
    pub rules: Option<String>,
    pub price_per_day: Money,
    pub service_fee: Option<Money>,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListingPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub county: Option<String>,
    pub postal_code: Option<String>,
    pub location: Option<Value>,
    pub land_size: Option<f64>,
    pub access_type: Option<AccessType>,
    pub allowed_animals: Option<Vec<String>>,
    pub amenities: Option<Vec<String>>,
    pub rules: Option<String>,
    pub price_per_day: Option<Money>,
    pub service_fee: Option<Money>,
}

fn parse_location(value: Option<&Value>) -> Result<Option<crate::models::GeoPoint>, AppError> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(v) => parse_coordinate_value(v)
            .map(Some)
            .ok_or_else(|| AppError::Validation("unrecognized or out-of-range location".to_string())),
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn validate(listing: &Listing) -> Result<(), AppError> {
    if listing.title.trim().is_empty() {
        return Err(AppError::Validation("title is required".to_string()));
    }
    if listing.county.trim().is_empty() {
        return Err(AppError::Validation("county is required".to_string()));
    }
    if listing.allowed_animals.is_empty() {
        return Err(AppError::Validation(
            "at least one allowed animal is required".to_string(),
        ));
    }
    if listing.price_per_day <= Money::ZERO {
        return Err(AppError::Validation(
            "price per day must be greater than zero".to_string(),
        ));
    }
    if let Some(size) = listing.land_size {
        if !size.is_finite() || size < 0.0 {
            return Err(AppError::Validation("land size must be positive".to_string()));
        }
    }
    Ok(())
}

fn require_owner(actor: &Actor, listing: &Listing) -> Result<(), AppError> {
    if actor.is_admin() || actor.user_id == listing.owner_id {
        Ok(())
    } else {
        Err(AppError::Unauthorized(
            "only the listing owner can change this listing".to_string(),
        ))
    }
}

fn load(conn: &Connection, id: &str) -> Result<Listing, AppError> {
    queries::get_listing(conn, id)?.ok_or_else(|| AppError::NotFound(format!("listing {id}")))
}

/// New listings start as DRAFT.
pub fn create_listing(
    conn: &Connection,
    actor: &Actor,
    input: NewListing,
    now: NaiveDateTime,
) -> Result<Listing, AppError> {
    match actor.role {
        Role::Landowner | Role::Admin => {}
        Role::Hunter => {
            return Err(AppError::Unauthorized(
                "only landowners can create listings".to_string(),
            ))
        }
    }

    let listing = Listing {
        id: uuid::Uuid::new_v4().to_string(),
        owner_id: actor.user_id.clone(),
        title: input.title.trim().to_string(),
        description: input.description,
        county: input.county.trim().to_string(),
        postal_code: input.postal_code,
        location: parse_location(input.location.as_ref())?,
        land_size: input.land_size,
        access_type: input.access_type,
        allowed_animals: clean_list(input.allowed_animals),
        amenities: clean_list(input.amenities),
        rules: input.rules,
        price_per_day: input.price_per_day,
        service_fee: input.service_fee.unwrap_or(DEFAULT_SERVICE_FEE),
        status: ListingStatus::Draft,
        view_count: 0,
        created_at: now,
        updated_at: now,
    };
    validate(&listing)?;

    queries::insert_listing(conn, &listing)?;
    tracing::info!(listing_id = %listing.id, owner_id = %listing.owner_id, "listing created");
    Ok(listing)
}

pub fn update_listing(
    conn: &Connection,
    actor: &Actor,
    id: &str,
    patch: ListingPatch,
    now: NaiveDateTime,
) -> Result<Listing, AppError> {
    let mut listing = load(conn, id)?;
    require_owner(actor, &listing)?;

    if let Some(title) = patch.title {
        listing.title = title.trim().to_string();
    }
    if let Some(description) = patch.description {
        listing.description = description;
    }
    if let Some(county) = patch.county {
        listing.county = county.trim().to_string();
    }
    if patch.postal_code.is_some() {
        listing.postal_code = patch.postal_code;
    }
    if patch.location.is_some() {
        listing.location = parse_location(patch.location.as_ref())?;
    }
    if patch.land_size.is_some() {
        listing.land_size = patch.land_size;
    }
    if let Some(access_type) = patch.access_type {
        listing.access_type = access_type;
    }
    if let Some(animals) = patch.allowed_animals {
        listing.allowed_animals = clean_list(animals);
    }
    if let Some(amenities) = patch.amenities {
        listing.amenities = clean_list(amenities);
    }
    if patch.rules.is_some() {
        listing.rules = patch.rules;
    }
    if let Some(price) = patch.price_per_day {
        listing.price_per_day = price;
    }
    if let Some(fee) = patch.service_fee {
        listing.service_fee = fee;
    }
    listing.updated_at = now;
    validate(&listing)?;

    queries::update_listing(conn, &listing)?;
    tracing::info!(listing_id = %listing.id, "listing updated");
    Ok(listing)
}

/// Owners move between DRAFT and PUBLISHED. Entering or leaving SUSPENDED
/// is reserved for admins.
pub fn set_listing_status(
    conn: &Connection,
    actor: &Actor,
    id: &str,
    status: ListingStatus,
    now: NaiveDateTime,
) -> Result<Listing, AppError> {
    let mut listing = load(conn, id)?;
    require_owner(actor, &listing)?;

    if listing.status == status {
        return Ok(listing);
    }

    let touches_suspension =
        listing.status == ListingStatus::Suspended || status == ListingStatus::Suspended;
    if touches_suspension && !actor.is_admin() {
        return Err(AppError::Unauthorized(
            "only admins can suspend or reinstate listings".to_string(),
        ));
    }
    if status == ListingStatus::Published {
        validate(&listing)?;
    }

    queries::set_listing_status(conn, &listing.id, status, &now)?;
    tracing::info!(
        listing_id = %listing.id,
        from = listing.status.as_str(),
        to = status.as_str(),
        "listing status changed"
    );
    listing.status = status;
    listing.updated_at = now;
    Ok(listing)
}

fn is_privileged(actor: Option<&Actor>, listing: &Listing) -> bool {
    actor
        .map(|a| a.is_admin() || a.user_id == listing.owner_id)
        .unwrap_or(false)
}

/// Drafts and suspended listings are visible only to the owner and admins.
pub fn load_visible(
    conn: &Connection,
    actor: Option<&Actor>,
    id: &str,
) -> Result<Listing, AppError> {
    let listing = load(conn, id)?;
    if listing.status != ListingStatus::Published && !is_privileged(actor, &listing) {
        return Err(AppError::NotFound(format!("listing {id}")));
    }
    Ok(listing)
}

/// Like [`load_visible`], and each public read of a published listing
/// counts as a view.
pub fn get_listing(
    conn: &Connection,
    actor: Option<&Actor>,
    id: &str,
) -> Result<Listing, AppError> {
    let mut listing = load_visible(conn, actor, id)?;
    let privileged = is_privileged(actor, &listing);

    if listing.status == ListingStatus::Published && !privileged {
        queries::increment_view_count(conn, &listing.id)?;
        listing.view_count += 1;
    }
    Ok(listing)
}

pub fn discover_listings(
    conn: &Connection,
    mut filter: ListingFilter,
) -> Result<Vec<Listing>, AppError> {
    filter.limit = match filter.limit {
        n if n <= 0 => DEFAULT_DISCOVER_LIMIT,
        n => n.min(MAX_DISCOVER_LIMIT),
    };
    Ok(queries::discover_listings(conn, &filter)?)
}

pub fn owner_listings(conn: &Connection, actor: &Actor) -> Result<Vec<Listing>, AppError> {
    Ok(queries::get_listings_for_owner(conn, &actor.user_id)?)
}

fn load_public(conn: &Connection, id: &str) -> Result<Listing, AppError> {
    let listing = load(conn, id)?;
    if listing.status != ListingStatus::Published {
        return Err(AppError::NotFound(format!("listing {id}")));
    }
    Ok(listing)
}

/// Dates a booking calendar should disable for this listing.
pub fn booked_dates(conn: &Connection, id: &str) -> Result<BTreeSet<NaiveDate>, AppError> {
    let listing = load_public(conn, id)?;
    let existing = queries::get_active_bookings_for_listing(conn, &listing.id)?;
    Ok(availability::booked_dates(&existing))
}

/// Advisory price and availability for a proposed stay.
pub fn quote(conn: &Connection, id: &str, range: DateRange) -> Result<Quote, AppError> {
    let listing = load_public(conn, id)?;
    let existing = queries::get_active_bookings_for_listing(conn, &listing.id)?;
    Ok(availability::check_availability(listing.pricing(), &existing, range)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use serde_json::json;

    fn now() -> NaiveDateTime {
        NaiveDateTime::parse_from_str("2025-05-01 12:00:00", "%Y-%m-%d %H:%M:%S").unwrap()
    }

    fn owner() -> Actor {
        Actor::new("owner-1", Role::Landowner)
    }

    fn admin() -> Actor {
        Actor::new("admin-1", Role::Admin)
    }

    fn setup() -> Connection {
        let conn = db::init_db(":memory:").unwrap();
        queries::upsert_profile(&conn, "owner-1", Some(Role::Landowner), None).unwrap();
        queries::upsert_profile(&conn, "owner-2", Some(Role::Landowner), None).unwrap();
        conn
    }

    fn new_listing() -> NewListing {
        serde_json::from_value(json!({
            "title": "Ballyhoura Forest",
            "county": "Cork",
            "access_type": "HIKE",
            "allowed_animals": ["Deer", " ", "Pheasant"],
            "price_per_day": 100.0,
            "location": "SRID=4326;POINT(-8.5 52.3)"
        }))
        .unwrap()
    }

    #[test]
    fn test_create_starts_as_draft_with_default_fee() {
        let conn = setup();
        let listing = create_listing(&conn, &owner(), new_listing(), now()).unwrap();
        assert_eq!(listing.status, ListingStatus::Draft);
        assert_eq!(listing.service_fee, DEFAULT_SERVICE_FEE);
        assert_eq!(listing.allowed_animals, vec!["Deer", "Pheasant"]);
        assert_eq!(listing.location.unwrap().latitude, 52.3);

        let stored = queries::get_listing(&conn, &listing.id).unwrap().unwrap();
        assert_eq!(stored.price_per_day, Money::from_cents(10000));
    }

    #[test]
    fn test_create_validation() {
        let conn = setup();

        let mut input = new_listing();
        input.allowed_animals = vec![];
        assert!(matches!(
            create_listing(&conn, &owner(), input, now()),
            Err(AppError::Validation(_))
        ));

        let mut input = new_listing();
        input.price_per_day = Money::ZERO;
        assert!(matches!(
            create_listing(&conn, &owner(), input, now()),
            Err(AppError::Validation(_))
        ));

        let mut input = new_listing();
        input.location = Some(json!({"lat": 120.0, "lng": 0.0}));
        assert!(matches!(
            create_listing(&conn, &owner(), input, now()),
            Err(AppError::Validation(_))
        ));

        let hunter = Actor::new("hunter-1", Role::Hunter);
        assert!(matches!(
            create_listing(&conn, &hunter, new_listing(), now()),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_update_only_by_owner() {
        let conn = setup();
        let listing = create_listing(&conn, &owner(), new_listing(), now()).unwrap();

        let patch = ListingPatch {
            price_per_day: Some(Money::from_cents(12550)),
            ..Default::default()
        };
        let stranger = Actor::new("owner-2", Role::Landowner);
        assert!(matches!(
            update_listing(&conn, &stranger, &listing.id, patch.clone(), now()),
            Err(AppError::Unauthorized(_))
        ));

        let updated = update_listing(&conn, &owner(), &listing.id, patch, now()).unwrap();
        assert_eq!(updated.price_per_day, Money::from_cents(12550));
        assert_eq!(updated.title, "Ballyhoura Forest");
    }

    #[test]
    fn test_status_rules() {
        let conn = setup();
        let listing = create_listing(&conn, &owner(), new_listing(), now()).unwrap();

        let published =
            set_listing_status(&conn, &owner(), &listing.id, ListingStatus::Published, now())
                .unwrap();
        assert_eq!(published.status, ListingStatus::Published);

        assert!(matches!(
            set_listing_status(&conn, &owner(), &listing.id, ListingStatus::Suspended, now()),
            Err(AppError::Unauthorized(_))
        ));

        set_listing_status(&conn, &admin(), &listing.id, ListingStatus::Suspended, now()).unwrap();
        assert!(matches!(
            set_listing_status(&conn, &owner(), &listing.id, ListingStatus::Draft, now()),
            Err(AppError::Unauthorized(_))
        ));
    }

    #[test]
    fn test_visibility_and_view_count() {
        let conn = setup();
        let listing = create_listing(&conn, &owner(), new_listing(), now()).unwrap();

        assert!(matches!(
            get_listing(&conn, None, &listing.id),
            Err(AppError::NotFound(_))
        ));
        assert!(get_listing(&conn, Some(&owner()), &listing.id).is_ok());

        set_listing_status(&conn, &owner(), &listing.id, ListingStatus::Published, now()).unwrap();
        get_listing(&conn, None, &listing.id).unwrap();
        let second = get_listing(&conn, None, &listing.id).unwrap();
        assert_eq!(second.view_count, 2);

        let own_read = get_listing(&conn, Some(&owner()), &listing.id).unwrap();
        assert_eq!(own_read.view_count, 2);
    }

    #[test]
    fn test_discover_filters() {
        let conn = setup();
        let a = create_listing(&conn, &owner(), new_listing(), now()).unwrap();
        let mut other = new_listing();
        other.county = "Kerry".to_string();
        other.allowed_animals = vec!["Duck".to_string()];
        other.access_type = AccessType::Car;
        let b = create_listing(&conn, &owner(), other, now()).unwrap();
        create_listing(&conn, &owner(), new_listing(), now()).unwrap();

        for id in [&a.id, &b.id] {
            set_listing_status(&conn, &owner(), id, ListingStatus::Published, now()).unwrap();
        }

        let all = discover_listings(&conn, ListingFilter::default()).unwrap();
        assert_eq!(all.len(), 2);

        let cork = discover_listings(
            &conn,
            ListingFilter {
                county: Some("cork".to_string()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(cork.len(), 1);
        assert_eq!(cork[0].id, a.id);

        let ducks = discover_listings(
            &conn,
            ListingFilter {
                animal: Some("duck".to_string()),
                access_type: Some(AccessType::Car),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(ducks.len(), 1);
        assert_eq!(ducks[0].id, b.id);
    }

    #[test]
    fn test_quote_requires_published_listing() {
        let conn = setup();
        let listing = create_listing(&conn, &owner(), new_listing(), now()).unwrap();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 3).unwrap(),
        );
        assert!(matches!(
            quote(&conn, &listing.id, range),
            Err(AppError::NotFound(_))
        ));

        set_listing_status(&conn, &owner(), &listing.id, ListingStatus::Published, now()).unwrap();
        let q = quote(&conn, &listing.id, range).unwrap();
        assert_eq!(q.grand_total, Money::from_cents(30250));
        assert!(booked_dates(&conn, &listing.id).unwrap().is_empty());

        let far = NaiveDate::from_ymd_opt(10000, 1, 2).unwrap();
        assert!(matches!(
            quote(&conn, &listing.id, DateRange::new(far, far)),
            Err(AppError::Validation(_))
        ));
    }
}
