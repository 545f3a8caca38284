use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Whole calendar days in `[start, end)`. No rounding, no partial-day
/// proration; a one-night rental is one day.
pub fn rental_days(start: NaiveDate, end: NaiveDate) -> i64 {
    (end - start).num_days()
}

/// daily rate x day count, in decimal arithmetic. The result is frozen on
/// the booking row at creation and never recomputed.
pub fn total_price(daily_rate: Decimal, start: NaiveDate, end: NaiveDate) -> Decimal {
    daily_rate * Decimal::from(rental_days(start, end))
}
