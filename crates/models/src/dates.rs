//! Date parsing shared by the loader and the pipeline.
//!
//! Handles dates that may come as:
//! - spreadsheet date cells (already a datetime)
//! - Excel serial numbers (1899-12-30 base)
//! - ISO strings: "2025-07-01", "2025-07-01 00:00:00", "2025-07-01T09:15:00"
//! - numeric day/month strings ("01-07-2025", "07/01/2025"), resolved by [`DateOrder`]
//! - month names: "01-Jul-2025", "1 July 2025", "Jul 1, 2025"

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime};

use crate::Cell;

/// Which reading wins when a numeric date like `01/07/2025` is ambiguous.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateOrder {
	DayFirst,
	MonthFirst,
}

const UNAMBIGUOUS: &[&str] = &[
	"%Y-%m-%d",
	"%Y/%m/%d",
	"%Y.%m.%d",
	"%d-%b-%Y",
	"%d %b %Y",
	"%d-%B-%Y",
	"%d %B %Y",
	"%b %d, %Y",
	"%B %d, %Y",
	"%b %d %Y",
	"%d-%b-%y",
];

const DAY_FIRST: &[&str] = &["%d-%m-%Y", "%d/%m/%Y", "%d.%m.%Y", "%d-%m-%y", "%d/%m/%y"];

const MONTH_FIRST: &[&str] = &["%m-%d-%Y", "%m/%d/%Y", "%m.%d.%Y", "%m-%d-%y", "%m/%d/%y"];

const TIME_SUFFIXES: &[&str] = &[" %H:%M:%S%.f", " %H:%M:%S", " %H:%M", "T%H:%M:%S%.f", "T%H:%M:%S"];

fn candidate_formats(order: DateOrder) -> impl Iterator<Item = &'static str> {
	let (first, second) = match order {
		DateOrder::DayFirst => (DAY_FIRST, MONTH_FIRST),
		DateOrder::MonthFirst => (MONTH_FIRST, DAY_FIRST),
	};
	UNAMBIGUOUS.iter().chain(first).chain(second).copied()
}

pub fn parse_date_str(s: &str, order: DateOrder) -> Option<NaiveDateTime> {
	let s = s.trim();
	if s.is_empty() {
		return None;
	}

	for fmt in candidate_formats(order) {
		if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
			if plausible_year(d.year()) {
				return Some(d.and_time(NaiveTime::MIN));
			}
		}
		for suffix in TIME_SUFFIXES {
			let full = format!("{fmt}{suffix}");
			if let Ok(dt) = NaiveDateTime::parse_from_str(s, &full) {
				if plausible_year(dt.year()) {
					return Some(dt);
				}
			}
		}
	}
	None
}

// `%Y` happily reads "25" as year 25; such matches fall through to the `%y` formats.
fn plausible_year(year: i32) -> bool {
	year >= 1000
}

/// Largest serial Excel can display: 9999-12-31.
pub const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

/// Excel serial date conversion using 1899-12-30 base (common convention).
/// The fractional part is the time of day. Serials outside `0..=9999-12-31`
/// are not dates.
pub fn excel_serial_to_datetime(v: f64) -> Option<NaiveDateTime> {
	if !v.is_finite() || !(0.0..MAX_EXCEL_SERIAL + 1.0).contains(&v) {
		return None;
	}
	let days = v.floor() as i64;
	let seconds = ((v - v.floor()) * 86_400.0).round() as i64;
	let offset = Duration::try_days(days)?.checked_add(&Duration::try_seconds(seconds)?)?;
	let base = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_time(NaiveTime::MIN);
	base.checked_add_signed(offset)
}

/// Datetime from text or a datetime cell. Numbers are not treated as dates here.
pub fn cell_to_datetime(cell: &Cell, order: DateOrder) -> Option<NaiveDateTime> {
	match cell {
		Cell::DateTime(dt) => Some(*dt),
		Cell::Text(s) => parse_date_str(s, order),
		_ => None,
	}
}
