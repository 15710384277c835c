use chrono::{Datelike, Duration, NaiveDate};
use std::fmt;

use crate::error::{Error, ErrorKind, Result};

/// A single day shown on the poster. Thin wrapper so the rest of the crate
/// talks in terms of Sunday-first weekday indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CalendarDate(NaiveDate);

impl CalendarDate {
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Result<Self> {
        NaiveDate::from_ymd_opt(year, month, day)
            .map(CalendarDate)
            .ok_or_else(|| {
                Error::new(
                    ErrorKind::DateParse,
                    &format!("{:04}-{:02}-{:02} is not a valid date", year, month, day),
                )
            })
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    pub fn day(&self) -> u32 {
        self.0.day()
    }

    /// 0 = Sunday .. 6 = Saturday
    pub fn weekday_index(&self) -> usize {
        self.0.weekday().num_days_from_sunday() as usize
    }

    pub fn is_sunday(&self) -> bool {
        self.weekday_index() == 0
    }

    pub fn is_weekend(&self) -> bool {
        matches!(self.weekday_index(), 0 | 6)
    }

    pub fn naive(&self) -> NaiveDate {
        self.0
    }

    pub fn succ(&self) -> Self {
        CalendarDate(self.0 + Duration::days(1))
    }
}

impl From<NaiveDate> for CalendarDate {
    fn from(date: NaiveDate) -> Self {
        CalendarDate(date)
    }
}

impl fmt::Display for CalendarDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

/// Six displayed weeks of a month, row-major, Sunday first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonthView {
    year: i32,
    month: u32,
    days: Vec<CalendarDate>,
}

impl MonthView {
    pub const COLUMNS: usize = 7;
    pub const ROWS: usize = 6;
    pub const CELLS: usize = Self::COLUMNS * Self::ROWS;

    /// Builds the grid for `month` of `year`. The first cell is the Sunday on
    /// or before the 1st and the grid always spans exactly 42 days from there,
    /// without trimming trailing weeks that fall outside the month.
    pub fn build(year: i32, month: u32) -> Result<Self> {
        let first = CalendarDate::from_ymd(year, month, 1)?;
        let anchor = first.naive() - Duration::days(first.weekday_index() as i64);

        let days: Vec<CalendarDate> = (0..Self::CELLS as i64)
            .map(|offset| CalendarDate(anchor + Duration::days(offset)))
            .collect();

        assert_eq!(days.len(), Self::CELLS, "month view must have 42 cells");

        Ok(MonthView { year, month, days })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn days(&self) -> &[CalendarDate] {
        &self.days
    }

    pub fn first(&self) -> CalendarDate {
        self.days[0]
    }

    pub fn last(&self) -> CalendarDate {
        self.days[Self::CELLS - 1]
    }

    pub fn contains_month(&self, date: &CalendarDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }

    /// Iterates `(row, column, date)` in drawing order.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, CalendarDate)> + '_ {
        self.days
            .iter()
            .enumerate()
            .map(|(i, date)| (i / Self::COLUMNS, i % Self::COLUMNS, *date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn leap_february_starts_on_previous_sunday() {
        let view = MonthView::build(2024, 2).unwrap();

        assert_eq!(view.first(), CalendarDate::from_ymd(2024, 1, 28).unwrap());
        assert!(view
            .days()
            .contains(&CalendarDate::from_ymd(2024, 2, 29).unwrap()));
        assert_eq!(view.last(), CalendarDate::from_ymd(2024, 3, 9).unwrap());
    }

    #[test]
    fn month_starting_on_sunday_fills_two_trailing_weeks() {
        // February 2015 begins on a Sunday and has exactly four weeks
        let view = MonthView::build(2015, 2).unwrap();

        assert_eq!(view.first(), CalendarDate::from_ymd(2015, 2, 1).unwrap());
        assert_eq!(view.last(), CalendarDate::from_ymd(2015, 3, 14).unwrap());
    }

    #[test]
    fn december_view_spills_into_next_year() {
        let view = MonthView::build(2023, 12).unwrap();

        assert_eq!(view.last().year(), 2024);
        assert!(!view.contains_month(&view.last()));
    }

    #[test]
    fn invalid_month_is_rejected() {
        assert!(MonthView::build(2024, 13).is_err());
    }

    proptest! {
        #[test]
        fn grid_is_42_consecutive_days_from_a_sunday(year in 1900i32..2200, month in 1u32..=12) {
            let view = MonthView::build(year, month).unwrap();

            prop_assert_eq!(view.days().len(), 42);
            prop_assert!(view.first().is_sunday());
            prop_assert!(view.first().naive() <= NaiveDate::from_ymd_opt(year, month, 1).unwrap());
            for pair in view.days().windows(2) {
                prop_assert_eq!(pair[0].succ(), pair[1]);
            }
        }
    }
}
