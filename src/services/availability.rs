use chrono::NaiveDate;
use rusqlite::Connection;

use crate::db::queries;
use crate::models::{Car, CarStatus};

/// Outcome of an availability check. `reason` feeds the public
/// availability endpoint; the lifecycle manager maps the variants onto
/// its own error taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    Available,
    CarUnavailable(CarStatus),
    Conflict,
}

impl Availability {
    pub fn is_available(&self) -> bool {
        matches!(self, Availability::Available)
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            Availability::Available => None,
            Availability::CarUnavailable(status) => Some(format!("car is currently {status}")),
            Availability::Conflict => {
                Some("car is already booked for the selected dates".to_string())
            }
        }
    }
}

/// Is `car` free over the half-open range `[start, end)`?
///
/// Cancelled bookings never block; a booking ending on `start` or starting
/// on `end` is adjacent, not overlapping, so checkout day and next pickup
/// day may coincide. `exclude_booking` lets a re-validation of an existing
/// booking skip collision with itself.
///
/// Pure read, callable concurrently. On its own it cannot prevent two
/// concurrent creates from both seeing "available"; the lifecycle manager
/// runs this inside the same transaction as the insert.
pub fn check(
    conn: &Connection,
    car: &Car,
    start: NaiveDate,
    end: NaiveDate,
    exclude_booking: Option<&str>,
) -> anyhow::Result<Availability> {
    debug_assert!(start < end);

    if car.status != CarStatus::Available {
        return Ok(Availability::CarUnavailable(car.status));
    }

    let overlapping = queries::count_overlapping(conn, &car.id, &start, &end, exclude_booking)?;
    if overlapping > 0 {
        Ok(Availability::Conflict)
    } else {
        Ok(Availability::Available)
    }
}
