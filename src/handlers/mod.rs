pub mod auth;
pub mod bookings;
pub mod calendar;
pub mod dashboard;
pub mod favorites;
pub mod health;
pub mod listings;
pub mod payments;
pub mod profile;
pub mod reviews;
pub mod webhook;
