use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingStatus, ListingStatus, Money, Role};

const PENDING_REQUEST_LIMIT: i64 = 20;

#[derive(Debug, Serialize)]
#[serde(tag = "role", rename_all = "UPPERCASE")]
pub enum Dashboard {
    Hunter {
        upcoming_trips: Vec<Booking>,
        pending_trips: Vec<Booking>,
    },
    Landowner {
        listing_count: usize,
        published_count: usize,
        pending_requests: Vec<Booking>,
        earnings_this_month: Money,
        earnings_all_time: Money,
    },
    Admin {
        bookings_by_status: BTreeMap<&'static str, i64>,
        listings_by_status: BTreeMap<&'static str, i64>,
    },
}

pub fn build_dashboard(
    conn: &Connection,
    actor: &Actor,
    today: NaiveDate,
) -> Result<Dashboard, AppError> {
    let dashboard = match actor.role {
        Role::Hunter => {
            let (pending_trips, upcoming_trips): (Vec<_>, Vec<_>) =
                queries::get_upcoming_for_hunter(conn, &actor.user_id, &today)?
                    .into_iter()
                    .partition(|b| b.status == BookingStatus::Pending);
            Dashboard::Hunter {
                upcoming_trips,
                pending_trips,
            }
        }
        Role::Landowner => {
            let listings = queries::get_listings_for_owner(conn, &actor.user_id)?;
            let published_count = listings
                .iter()
                .filter(|l| l.status == ListingStatus::Published)
                .count();
            let pending_requests = queries::get_bookings_for_owner(
                conn,
                &actor.user_id,
                Some(BookingStatus::Pending),
                PENDING_REQUEST_LIMIT,
            )?;
            let month_start = today.with_day(1).unwrap_or(today);

            Dashboard::Landowner {
                listing_count: listings.len(),
                published_count,
                pending_requests,
                earnings_this_month: queries::completed_earnings_for_owner(
                    conn,
                    &actor.user_id,
                    Some(&month_start),
                )?,
                earnings_all_time: queries::completed_earnings_for_owner(
                    conn,
                    &actor.user_id,
                    None,
                )?,
            }
        }
        Role::Admin => Dashboard::Admin {
            bookings_by_status: queries::count_bookings_by_status(conn)?
                .into_iter()
                .map(|(status, n)| (status.as_str(), n))
                .collect(),
            listings_by_status: queries::count_listings_by_status(conn)?
                .into_iter()
                .map(|(status, n)| (status.as_str(), n))
                .collect(),
        },
    };
    Ok(dashboard)
}
