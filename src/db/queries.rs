use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;

use crate::models::{
    Booking, BookingStatus, Car, CarStatus, DamageReport, DamageSeverity, DamageStatus,
    MaintenanceRecord, MaintenanceStatus, Review, ReviewStatus,
};

const DATE_FMT: &str = "%Y-%m-%d";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn fmt_date(d: &NaiveDate) -> String {
    d.format(DATE_FMT).to_string()
}

fn fmt_datetime(dt: &NaiveDateTime) -> String {
    dt.format(DATETIME_FMT).to_string()
}

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, DATE_FMT).unwrap_or_else(|_| Utc::now().date_naive())
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).unwrap_or_else(|_| Utc::now().naive_utc())
}

fn parse_money(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap_or_default()
}

// ── Cars ──

pub fn create_car(conn: &Connection, car: &Car) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO cars (id, make, model, year, price_per_day, features, image_urls, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            car.id,
            car.make,
            car.model,
            car.year,
            car.price_per_day.to_string(),
            serde_json::to_string(&car.features)?,
            serde_json::to_string(&car.image_urls)?,
            car.status.as_str(),
            fmt_datetime(&car.created_at),
            car.updated_at.as_ref().map(fmt_datetime),
        ],
    )?;
    Ok(())
}

pub fn get_car(conn: &Connection, id: &str) -> anyhow::Result<Option<Car>> {
    let result = conn.query_row(
        "SELECT id, make, model, year, price_per_day, features, image_urls, status, created_at, updated_at
         FROM cars WHERE id = ?1",
        params![id],
        |row| Ok(parse_car_row(row)),
    );

    match result {
        Ok(car) => Ok(Some(car?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default)]
pub struct CarFilter {
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<i32>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub status: Option<CarStatus>,
}

pub fn list_cars(conn: &Connection, filter: &CarFilter) -> anyhow::Result<Vec<Car>> {
    let mut clauses: Vec<String> = vec![];
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(make) = &filter.make {
        args.push(Box::new(format!("%{make}%")));
        clauses.push(format!("make LIKE ?{}", args.len()));
    }
    if let Some(model) = &filter.model {
        args.push(Box::new(format!("%{model}%")));
        clauses.push(format!("model LIKE ?{}", args.len()));
    }
    if let Some(year) = filter.year {
        args.push(Box::new(year));
        clauses.push(format!("year = ?{}", args.len()));
    }
    // price_per_day is stored as TEXT; compare numerically via CAST
    if let Some(min) = &filter.min_price {
        args.push(Box::new(min.to_string()));
        clauses.push(format!("CAST(price_per_day AS REAL) >= CAST(?{} AS REAL)", args.len()));
    }
    if let Some(max) = &filter.max_price {
        args.push(Box::new(max.to_string()));
        clauses.push(format!("CAST(price_per_day AS REAL) <= CAST(?{} AS REAL)", args.len()));
    }
    if let Some(status) = filter.status {
        args.push(Box::new(status.as_str()));
        clauses.push(format!("status = ?{}", args.len()));
    }

    let mut sql = String::from(
        "SELECT id, make, model, year, price_per_day, features, image_urls, status, created_at, updated_at FROM cars",
    );
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY make, model");

    let mut stmt = conn.prepare(&sql)?;
    let arg_refs: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(|a| a.as_ref()).collect();
    let rows = stmt.query_map(arg_refs.as_slice(), |row| Ok(parse_car_row(row)))?;

    let mut cars = vec![];
    for row in rows {
        cars.push(row??);
    }
    Ok(cars)
}

pub fn update_car(conn: &Connection, car: &Car) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE cars SET make = ?1, model = ?2, year = ?3, price_per_day = ?4,
                features = ?5, image_urls = ?6, status = ?7, updated_at = ?8
         WHERE id = ?9",
        params![
            car.make,
            car.model,
            car.year,
            car.price_per_day.to_string(),
            serde_json::to_string(&car.features)?,
            serde_json::to_string(&car.image_urls)?,
            car.status.as_str(),
            fmt_datetime(&Utc::now().naive_utc()),
            car.id,
        ],
    )?;
    Ok(count > 0)
}

pub fn delete_car(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM cars WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

/// True when any row still points at the car. Bookings of every status
/// count, cancelled and completed included: the car row must outlive its
/// history or the foreign keys on those tables break.
pub fn car_is_referenced(conn: &Connection, car_id: &str) -> anyhow::Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT (SELECT COUNT(*) FROM bookings WHERE car_id = ?1)
              + (SELECT COUNT(*) FROM maintenance_records WHERE car_id = ?1)
              + (SELECT COUNT(*) FROM reviews WHERE car_id = ?1)
              + (SELECT COUNT(*) FROM damage_reports WHERE car_id = ?1)",
        params![car_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn parse_car_row(row: &rusqlite::Row) -> anyhow::Result<Car> {
    let id: String = row.get(0)?;
    let make: String = row.get(1)?;
    let model: String = row.get(2)?;
    let year: i32 = row.get(3)?;
    let price_str: String = row.get(4)?;
    let features_json: String = row.get(5)?;
    let image_urls_json: String = row.get(6)?;
    let status_str: String = row.get(7)?;
    let created_at_str: String = row.get(8)?;
    let updated_at_str: Option<String> = row.get(9)?;

    Ok(Car {
        id,
        make,
        model,
        year,
        price_per_day: parse_money(&price_str),
        features: serde_json::from_str(&features_json).unwrap_or_default(),
        image_urls: serde_json::from_str(&image_urls_json).unwrap_or_default(),
        status: CarStatus::parse(&status_str),
        created_at: parse_datetime(&created_at_str),
        updated_at: updated_at_str.as_deref().map(parse_datetime),
    })
}

// ── Bookings ──

pub fn insert_booking(conn: &Connection, booking: &Booking) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO bookings (id, car_id, customer_id, start_date, end_date, total_price, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            booking.id,
            booking.car_id,
            booking.customer_id,
            fmt_date(&booking.start_date),
            fmt_date(&booking.end_date),
            booking.total_price.to_string(),
            booking.status.as_str(),
            fmt_datetime(&booking.created_at),
            fmt_datetime(&booking.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_booking(conn: &Connection, id: &str) -> anyhow::Result<Option<Booking>> {
    let result = conn.query_row(
        "SELECT id, car_id, customer_id, start_date, end_date, total_price, status, created_at, updated_at
         FROM bookings WHERE id = ?1",
        params![id],
        |row| Ok(parse_booking_row(row)),
    );

    match result {
        Ok(booking) => Ok(Some(booking?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Half-open overlap test over non-cancelled bookings for one car:
/// `existing.start < end AND existing.end > start`. ISO date strings
/// compare correctly as text. `exclude_booking` lets an edit re-validate
/// without colliding with itself.
pub fn count_overlapping(
    conn: &Connection,
    car_id: &str,
    start: &NaiveDate,
    end: &NaiveDate,
    exclude_booking: Option<&str>,
) -> anyhow::Result<i64> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM bookings
         WHERE car_id = ?1
           AND status != 'cancelled'
           AND start_date < ?3
           AND end_date > ?2
           AND (?4 IS NULL OR id != ?4)",
        params![car_id, fmt_date(start), fmt_date(end), exclude_booking],
        |row| row.get(0),
    )?;
    Ok(count)
}

#[derive(Debug, Default)]
pub struct BookingFilter {
    pub customer_id: Option<String>,
    pub car_id: Option<String>,
    pub status: Option<BookingStatus>,
}

pub fn list_bookings(conn: &Connection, filter: &BookingFilter) -> anyhow::Result<Vec<Booking>> {
    let mut clauses: Vec<String> = vec![];
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(customer_id) = &filter.customer_id {
        args.push(Box::new(customer_id.clone()));
        clauses.push(format!("customer_id = ?{}", args.len()));
    }
    if let Some(car_id) = &filter.car_id {
        args.push(Box::new(car_id.clone()));
        clauses.push(format!("car_id = ?{}", args.len()));
    }
    if let Some(status) = filter.status {
        args.push(Box::new(status.as_str()));
        clauses.push(format!("status = ?{}", args.len()));
    }

    let mut sql = String::from(
        "SELECT id, car_id, customer_id, start_date, end_date, total_price, status, created_at, updated_at FROM bookings",
    );
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let arg_refs: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(|a| a.as_ref()).collect();
    let rows = stmt.query_map(arg_refs.as_slice(), |row| Ok(parse_booking_row(row)))?;

    let mut bookings = vec![];
    for row in rows {
        bookings.push(row??);
    }
    Ok(bookings)
}

pub fn update_booking_status(
    conn: &Connection,
    id: &str,
    status: BookingStatus,
) -> anyhow::Result<bool> {
    let now = fmt_datetime(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE bookings SET status = ?1, updated_at = ?2 WHERE id = ?3",
        params![status.as_str(), now, id],
    )?;
    Ok(count > 0)
}

pub struct BookingStatistics {
    pub total: i64,
    pub pending: i64,
    pub confirmed: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub total_revenue: Decimal,
}

pub fn booking_statistics(conn: &Connection) -> anyhow::Result<BookingStatistics> {
    let count_by = |status: &str| -> anyhow::Result<i64> {
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM bookings WHERE status = ?1",
            params![status],
            |row| row.get(0),
        )?)
    };

    let total: i64 = conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))?;

    // Prices live as decimal strings; summing in SQL would go through
    // floating point, so accumulate in Decimal here instead.
    let mut stmt = conn.prepare("SELECT total_price FROM bookings WHERE status = 'completed'")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    let mut total_revenue = Decimal::ZERO;
    for row in rows {
        total_revenue += parse_money(&row?);
    }

    Ok(BookingStatistics {
        total,
        pending: count_by("pending")?,
        confirmed: count_by("confirmed")?,
        completed: count_by("completed")?,
        cancelled: count_by("cancelled")?,
        total_revenue,
    })
}

fn parse_booking_row(row: &rusqlite::Row) -> anyhow::Result<Booking> {
    let id: String = row.get(0)?;
    let car_id: String = row.get(1)?;
    let customer_id: String = row.get(2)?;
    let start_date_str: String = row.get(3)?;
    let end_date_str: String = row.get(4)?;
    let total_price_str: String = row.get(5)?;
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;
    let updated_at_str: String = row.get(8)?;

    Ok(Booking {
        id,
        car_id,
        customer_id,
        start_date: parse_date(&start_date_str),
        end_date: parse_date(&end_date_str),
        total_price: parse_money(&total_price_str),
        status: BookingStatus::parse(&status_str),
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
    })
}

// ── Maintenance ──

pub fn insert_maintenance(conn: &Connection, record: &MaintenanceRecord) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO maintenance_records (id, car_id, description, due_date, status, created_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.id,
            record.car_id,
            record.description,
            fmt_date(&record.due_date),
            record.status.as_str(),
            fmt_datetime(&record.created_at),
            record.completed_at.as_ref().map(fmt_datetime),
        ],
    )?;
    Ok(())
}

pub fn list_maintenance(
    conn: &Connection,
    car_id: Option<&str>,
    status: Option<MaintenanceStatus>,
) -> anyhow::Result<Vec<MaintenanceRecord>> {
    let mut clauses: Vec<String> = vec![];
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(car_id) = car_id {
        args.push(Box::new(car_id.to_string()));
        clauses.push(format!("car_id = ?{}", args.len()));
    }
    if let Some(status) = status {
        args.push(Box::new(status.as_str()));
        clauses.push(format!("status = ?{}", args.len()));
    }

    let mut sql = String::from(
        "SELECT id, car_id, description, due_date, status, created_at, completed_at FROM maintenance_records",
    );
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY due_date ASC");

    let mut stmt = conn.prepare(&sql)?;
    let arg_refs: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(|a| a.as_ref()).collect();
    let rows = stmt.query_map(arg_refs.as_slice(), |row| Ok(parse_maintenance_row(row)))?;

    let mut records = vec![];
    for row in rows {
        records.push(row??);
    }
    Ok(records)
}

pub fn complete_maintenance(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let now = fmt_datetime(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE maintenance_records SET status = 'completed', completed_at = ?1
         WHERE id = ?2 AND status != 'completed'",
        params![now, id],
    )?;
    Ok(count > 0)
}

fn parse_maintenance_row(row: &rusqlite::Row) -> anyhow::Result<MaintenanceRecord> {
    let id: String = row.get(0)?;
    let car_id: String = row.get(1)?;
    let description: String = row.get(2)?;
    let due_date_str: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    let created_at_str: String = row.get(5)?;
    let completed_at_str: Option<String> = row.get(6)?;

    Ok(MaintenanceRecord {
        id,
        car_id,
        description,
        due_date: parse_date(&due_date_str),
        status: MaintenanceStatus::parse(&status_str),
        created_at: parse_datetime(&created_at_str),
        completed_at: completed_at_str.as_deref().map(parse_datetime),
    })
}

// ── Reviews ──

pub fn insert_review(conn: &Connection, review: &Review) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO reviews (id, booking_id, car_id, customer_id, rating, comment, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            review.id,
            review.booking_id,
            review.car_id,
            review.customer_id,
            review.rating,
            review.comment,
            review.status.as_str(),
            fmt_datetime(&review.created_at),
        ],
    )?;
    Ok(())
}

pub fn get_review_for_booking(conn: &Connection, booking_id: &str) -> anyhow::Result<Option<Review>> {
    let result = conn.query_row(
        "SELECT id, booking_id, car_id, customer_id, rating, comment, status, created_at
         FROM reviews WHERE booking_id = ?1",
        params![booking_id],
        |row| Ok(parse_review_row(row)),
    );

    match result {
        Ok(review) => Ok(Some(review?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_approved_reviews_for_car(conn: &Connection, car_id: &str) -> anyhow::Result<Vec<Review>> {
    let mut stmt = conn.prepare(
        "SELECT id, booking_id, car_id, customer_id, rating, comment, status, created_at
         FROM reviews WHERE car_id = ?1 AND status = 'approved' ORDER BY created_at DESC",
    )?;
    let rows = stmt.query_map(params![car_id], |row| Ok(parse_review_row(row)))?;

    let mut reviews = vec![];
    for row in rows {
        reviews.push(row??);
    }
    Ok(reviews)
}

pub fn update_review_status(
    conn: &Connection,
    id: &str,
    status: ReviewStatus,
) -> anyhow::Result<bool> {
    let count = conn.execute(
        "UPDATE reviews SET status = ?1 WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    Ok(count > 0)
}

// ── Damage reports ──

pub fn insert_damage_report(conn: &Connection, report: &DamageReport) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO damage_reports (id, booking_id, car_id, customer_id, description, severity, image_urls, status, created_at, resolved_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            report.id,
            report.booking_id,
            report.car_id,
            report.customer_id,
            report.description,
            report.severity.as_str(),
            serde_json::to_string(&report.image_urls)?,
            report.status.as_str(),
            fmt_datetime(&report.created_at),
            report.resolved_at.as_ref().map(fmt_datetime),
        ],
    )?;
    Ok(())
}

pub fn get_damage_report(conn: &Connection, id: &str) -> anyhow::Result<Option<DamageReport>> {
    let result = conn.query_row(
        "SELECT id, booking_id, car_id, customer_id, description, severity, image_urls, status, created_at, resolved_at
         FROM damage_reports WHERE id = ?1",
        params![id],
        |row| Ok(parse_damage_report_row(row)),
    );

    match result {
        Ok(report) => Ok(Some(report?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Default)]
pub struct DamageReportFilter {
    pub customer_id: Option<String>,
    pub status: Option<DamageStatus>,
    pub severity: Option<DamageSeverity>,
}

pub fn list_damage_reports(
    conn: &Connection,
    filter: &DamageReportFilter,
) -> anyhow::Result<Vec<DamageReport>> {
    let mut clauses: Vec<String> = vec![];
    let mut args: Vec<Box<dyn rusqlite::types::ToSql>> = vec![];

    if let Some(customer_id) = &filter.customer_id {
        args.push(Box::new(customer_id.clone()));
        clauses.push(format!("customer_id = ?{}", args.len()));
    }
    if let Some(status) = filter.status {
        args.push(Box::new(status.as_str()));
        clauses.push(format!("status = ?{}", args.len()));
    }
    if let Some(severity) = filter.severity {
        args.push(Box::new(severity.as_str()));
        clauses.push(format!("severity = ?{}", args.len()));
    }

    let mut sql = String::from(
        "SELECT id, booking_id, car_id, customer_id, description, severity, image_urls, status, created_at, resolved_at FROM damage_reports",
    );
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
    sql.push_str(" ORDER BY created_at DESC");

    let mut stmt = conn.prepare(&sql)?;
    let arg_refs: Vec<&dyn rusqlite::types::ToSql> = args.iter().map(|a| a.as_ref()).collect();
    let rows = stmt.query_map(arg_refs.as_slice(), |row| Ok(parse_damage_report_row(row)))?;

    let mut reports = vec![];
    for row in rows {
        reports.push(row??);
    }
    Ok(reports)
}

pub fn resolve_damage_report(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let now = fmt_datetime(&Utc::now().naive_utc());
    let count = conn.execute(
        "UPDATE damage_reports SET status = 'resolved', resolved_at = ?1
         WHERE id = ?2 AND status != 'resolved'",
        params![now, id],
    )?;
    Ok(count > 0)
}

fn parse_damage_report_row(row: &rusqlite::Row) -> anyhow::Result<DamageReport> {
    let id: String = row.get(0)?;
    let booking_id: String = row.get(1)?;
    let car_id: String = row.get(2)?;
    let customer_id: String = row.get(3)?;
    let description: String = row.get(4)?;
    let severity_str: String = row.get(5)?;
    let image_urls_json: String = row.get(6)?;
    let status_str: String = row.get(7)?;
    let created_at_str: String = row.get(8)?;
    let resolved_at_str: Option<String> = row.get(9)?;

    Ok(DamageReport {
        id,
        booking_id,
        car_id,
        customer_id,
        description,
        severity: DamageSeverity::parse(&severity_str),
        image_urls: serde_json::from_str(&image_urls_json).unwrap_or_default(),
        status: DamageStatus::parse(&status_str),
        created_at: parse_datetime(&created_at_str),
        resolved_at: resolved_at_str.as_deref().map(parse_datetime),
    })
}

fn parse_review_row(row: &rusqlite::Row) -> anyhow::Result<Review> {
    let id: String = row.get(0)?;
    let booking_id: String = row.get(1)?;
    let car_id: String = row.get(2)?;
    let customer_id: String = row.get(3)?;
    let rating: i32 = row.get(4)?;
    let comment: Option<String> = row.get(5)?;
    let status_str: String = row.get(6)?;
    let created_at_str: String = row.get(7)?;

    Ok(Review {
        id,
        booking_id,
        car_id,
        customer_id,
        rating,
        comment,
        status: ReviewStatus::parse(&status_str),
        created_at: parse_datetime(&created_at_str),
    })
}
