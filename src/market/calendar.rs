use chrono::{Datelike, NaiveDate};

fn days_in_year(year: i32) -> f64 {
    if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366.0
    } else {
        365.0
    }
}

/// Fraction of `date`'s year remaining from `date` to the next 1 January.
fn remaining_in_year(date: NaiveDate) -> f64 {
    let year = date.year();
    let days = NaiveDate::from_ymd_opt(year + 1, 1, 1)
        .map(|next| (next - date).num_days())
        .unwrap_or(0);
    days as f64 / days_in_year(year)
}

/// ACT/ACT (ISDA) year fraction between two dates.
///
/// Days in each calendar year are divided by that year's length. The result is
/// never negative and does not depend on argument order.
pub fn year_fraction(start: NaiveDate, end: NaiveDate) -> f64 {
    if end < start {
        return year_fraction(end, start);
    }
    if start.year() == end.year() {
        return (end - start).num_days() as f64 / days_in_year(start.year());
    }

    let first = remaining_in_year(start);
    let whole_years = (end.year() - start.year() - 1) as f64;
    let last = end.ordinal0() as f64 / days_in_year(end.year());
    first + whole_years + last
}
