pub mod availability;
pub mod booking;
pub mod calendar;
pub mod dashboard;
pub mod events;
pub mod favorites;
pub mod geo;
pub mod identity;
pub mod listings;
pub mod payments;
pub mod reviews;
