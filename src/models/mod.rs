pub mod booking;
pub mod listing;
pub mod money;
pub mod review;
pub mod user;

pub use booking::{Booking, BookingStatus, DateRange, Transition, MAX_STAY_DAYS};
pub use listing::{AccessType, GeoPoint, Listing, ListingStatus, Pricing, DEFAULT_SERVICE_FEE};
pub use money::Money;
pub use review::{RatingSummary, Review};
pub use user::{Actor, Profile, Role};
