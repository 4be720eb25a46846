use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A hunter's rating of a completed stay. One per booking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub booking_id: String,
    pub listing_id: String,
    pub reviewer_id: String,
    /// The landowner of the reviewed listing.
    pub reviewee_id: String,
    pub rating: i64,
    pub comment: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RatingSummary {
    pub review_count: i64,
    pub average_rating: Option<f64>,
}
