use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::Money;

pub const DEFAULT_SERVICE_FEE: Money = Money::from_cents(250);

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AccessType {
    Car,
    Hike,
    Both,
}

impl AccessType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessType::Car => "CAR",
            AccessType::Hike => "HIKE",
            AccessType::Both => "BOTH",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "CAR" => Some(AccessType::Car),
            "HIKE" => Some(AccessType::Hike),
            "BOTH" => Some(AccessType::Both),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ListingStatus {
    Draft,
    Published,
    Suspended,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Draft => "DRAFT",
            ListingStatus::Published => "PUBLISHED",
            ListingStatus::Suspended => "SUSPENDED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Some(ListingStatus::Draft),
            "PUBLISHED" => Some(ListingStatus::Published),
            "SUSPENDED" => Some(ListingStatus::Suspended),
            _ => None,
        }
    }
}

/// Canonical stored coordinate.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Option<Self> {
        let valid = latitude.is_finite()
            && longitude.is_finite()
            && (-90.0..=90.0).contains(&latitude)
            && (-180.0..=180.0).contains(&longitude);
        valid.then_some(Self { latitude, longitude })
    }
}

/// Snapshot of what a listing charges; copied onto every booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pricing {
    pub price_per_day: Money,
    pub service_fee: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub id: String,
    pub owner_id: String,
    pub title: String,
    pub description: String,
    pub county: String,
    pub postal_code: Option<String>,
    pub location: Option<GeoPoint>,
    pub land_size: Option<f64>,
    pub access_type: AccessType,
    pub allowed_animals: Vec<String>,
    pub amenities: Vec<String>,
    pub rules: Option<String>,
    pub price_per_day: Money,
    pub service_fee: Money,
    pub status: ListingStatus,
    pub view_count: i64,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Listing {
    pub fn pricing(&self) -> Pricing {
        Pricing {
            price_per_day: self.price_per_day,
            service_fee: self.service_fee,
        }
    }
}
