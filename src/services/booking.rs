use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, TransactionBehavior};
use uuid::Uuid;

use crate::db::{self, queries};
use crate::errors::AppError;
use crate::models::{Actor, Booking, BookingStatus};
use crate::services::availability::{self, Availability};
use crate::services::pricing;

/// Creates a reservation for `[start, end)` with initial status Pending.
///
/// Date validation happens before touching the store. The availability
/// check and the insert run inside one IMMEDIATE transaction: the write
/// lock is taken before the check, so of any set of concurrent attempts to
/// book the same car over overlapping ranges, at most one commits — the
/// rest observe the committed row and get `DateRangeConflict`.
pub fn create_booking(
    conn: &mut Connection,
    customer_id: &str,
    car_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Booking, AppError> {
    if start >= end {
        return Err(AppError::InvalidDateRange(
            "end date must be after start date".to_string(),
        ));
    }
    let today = Utc::now().date_naive();
    if start < today {
        return Err(AppError::InvalidDateRange(
            "start date cannot be in the past".to_string(),
        ));
    }

    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let car = queries::get_car(&tx, car_id)?.ok_or(AppError::NotFound("car"))?;

    match availability::check(&tx, &car, start, end, None)? {
        Availability::CarUnavailable(status) => return Err(AppError::CarNotAvailable(status)),
        Availability::Conflict => return Err(AppError::DateRangeConflict),
        Availability::Available => {}
    }

    let now = Utc::now().naive_utc();
    let booking = Booking {
        id: Uuid::new_v4().to_string(),
        car_id: car.id.clone(),
        customer_id: customer_id.to_string(),
        start_date: start,
        end_date: end,
        total_price: pricing::total_price(car.price_per_day, start, end),
        status: BookingStatus::Pending,
        created_at: now,
        updated_at: now,
    };

    queries::insert_booking(&tx, &booking)?;
    tx.commit()?;

    tracing::info!(
        booking_id = %booking.id,
        car_id = %booking.car_id,
        customer_id = %booking.customer_id,
        start = %start,
        end = %end,
        "booking created"
    );

    Ok(booking)
}

/// Cancels a booking on behalf of its owner or staff. Cancellation is a
/// status change, never a delete, so the row stays for history; the date
/// range is freed immediately because availability ignores cancelled rows.
pub fn cancel_booking(
    conn: &Connection,
    booking_id: &str,
    actor: &Actor,
) -> Result<Booking, AppError> {
    let mut booking =
        queries::get_booking(conn, booking_id)?.ok_or(AppError::NotFound("booking"))?;

    if !actor.can_manage(&booking.customer_id) {
        return Err(AppError::Forbidden);
    }
    if booking.status.is_terminal() {
        return Err(AppError::AlreadyTerminal(booking.status));
    }

    queries::update_booking_status(conn, booking_id, BookingStatus::Cancelled)?;
    booking.status = BookingStatus::Cancelled;
    booking.updated_at = Utc::now().naive_utc();

    tracing::info!(booking_id = %booking.id, actor = %actor.id, "booking cancelled");
    Ok(booking)
}

/// Staff-driven status change, constrained by the state machine. The
/// boundary layer is responsible for having already established that the
/// caller is staff.
pub fn set_status(
    conn: &Connection,
    booking_id: &str,
    new_status: BookingStatus,
) -> Result<Booking, AppError> {
    let mut booking =
        queries::get_booking(conn, booking_id)?.ok_or(AppError::NotFound("booking"))?;

    if !booking.status.can_transition_to(new_status) {
        return Err(AppError::InvalidTransition {
            from: booking.status,
            to: new_status,
        });
    }

    queries::update_booking_status(conn, booking_id, new_status)?;
    booking.status = new_status;
    booking.updated_at = Utc::now().naive_utc();

    tracing::info!(booking_id = %booking.id, status = %new_status, "booking status changed");
    Ok(booking)
}

/// Loads one booking, visible to its owner and to staff only.
pub fn get_booking_for_actor(
    conn: &Connection,
    booking_id: &str,
    actor: &Actor,
) -> Result<Booking, AppError> {
    let booking = db::read_with_retry(|| queries::get_booking(conn, booking_id))?
        .ok_or(AppError::NotFound("booking"))?;

    if !actor.can_manage(&booking.customer_id) {
        return Err(AppError::Forbidden);
    }
    Ok(booking)
}

/// Customers always see exactly their own bookings; staff may pass
/// arbitrary filters.
pub fn list_for_actor(
    conn: &Connection,
    actor: &Actor,
    mut filter: queries::BookingFilter,
) -> Result<Vec<Booking>, AppError> {
    if !actor.is_staff {
        filter.customer_id = Some(actor.id.clone());
    }
    Ok(db::read_with_retry(|| queries::list_bookings(conn, &filter))?)
}

/// Availability as exposed to the public check endpoint: loads the car
/// (NotFound if absent) and runs the overlap check. A stale "available"
/// answer here is acceptable; creation re-checks under the write lock.
pub fn check_availability(
    conn: &Connection,
    car_id: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Availability, AppError> {
    if start >= end {
        return Err(AppError::InvalidDateRange(
            "end date must be after start date".to_string(),
        ));
    }
    let car = db::read_with_retry(|| queries::get_car(conn, car_id))?
        .ok_or(AppError::NotFound("car"))?;
    Ok(availability::check(conn, &car, start, end, None)?)
}
