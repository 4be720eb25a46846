use serde::Serialize;
use tokio::sync::broadcast;

use crate::models::{Actor, Booking, BookingStatus, Role};

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingEventKind {
    Created,
    StatusChanged,
    Paid,
}

/// A booking change as seen by dashboards and calendars.
#[derive(Debug, Clone, Serialize)]
pub struct BookingEvent {
    pub kind: BookingEventKind,
    pub booking_id: String,
    pub listing_id: String,
    pub hunter_id: String,
    pub owner_id: String,
    pub status: BookingStatus,
}

impl BookingEvent {
    pub fn new(kind: BookingEventKind, booking: &Booking, owner_id: &str) -> Self {
        Self {
            kind,
            booking_id: booking.id.clone(),
            listing_id: booking.listing_id.clone(),
            hunter_id: booking.hunter_id.clone(),
            owner_id: owner_id.to_string(),
            status: booking.status,
        }
    }

    /// Hunters see their own bookings, landowners bookings on their land.
    pub fn visible_to(&self, actor: &Actor) -> bool {
        match actor.role {
            Role::Admin => true,
            Role::Hunter => self.hunter_id == actor.user_id,
            Role::Landowner => self.owner_id == actor.user_id,
        }
    }
}

/// In-process fan-out of booking changes. Publishing never blocks and is
/// fine with zero subscribers.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BookingEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, event: BookingEvent) {
        tracing::debug!(booking_id = %event.booking_id, kind = ?event.kind, "publishing booking event");
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BookingEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
