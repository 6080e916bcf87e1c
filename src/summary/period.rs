//! Calendar months and the periods that group them.

use std::fmt::Display;

use serde::{Deserialize, Serialize, Serializer};
use time::{Date, Month};

use crate::Error;

/// The window of months shown in the monthly summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SummaryPeriod {
    /// The current month and the two months before it.
    #[serde(rename = "3m")]
    RecentThreeMonths,
    /// January to December of the current year.
    #[serde(rename = "1y")]
    CurrentYear,
}

impl SummaryPeriod {
    /// The months in the period containing `today`, oldest first.
    pub fn months(&self, today: Date) -> Vec<MonthKey> {
        let current = MonthKey::of(today);

        match self {
            SummaryPeriod::RecentThreeMonths => {
                let previous = current.previous();
                vec![previous.previous(), previous, current]
            }
            SummaryPeriod::CurrentYear => {
                let mut month = Month::January;
                let mut months = Vec::with_capacity(12);

                for _ in 0..12 {
                    months.push(MonthKey {
                        year: current.year,
                        month,
                    });
                    month = month.next();
                }

                months
            }
        }
    }
}

/// A calendar month in a particular year.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthKey {
    year: i32,
    month: Month,
}

impl MonthKey {
    /// Create a month from a year and a 1-based month number.
    ///
    /// # Errors
    /// Returns [Error::InvalidMonth] if `month` is not in 1-12 or the year is
    /// outside the supported date range.
    pub fn new(year: i32, month: u8) -> Result<Self, Error> {
        let invalid_month = || Error::InvalidMonth { year, month };
        let month_of_year = Month::try_from(month).map_err(|_| invalid_month())?;
        let first_day =
            Date::from_calendar_date(year, month_of_year, 1).map_err(|_| invalid_month())?;

        Ok(Self::of(first_day))
    }

    /// The month that `date` falls in.
    pub fn of(date: Date) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    /// The year of the month.
    pub fn year(&self) -> i32 {
        self.year
    }

    /// The month of the year.
    pub fn month(&self) -> Month {
        self.month
    }

    /// The month before this one.
    pub fn previous(&self) -> Self {
        match self.month {
            Month::January => Self {
                year: self.year - 1,
                month: Month::December,
            },
            month => Self {
                year: self.year,
                month: month.previous(),
            },
        }
    }

    /// The number of days in the month.
    pub fn days(&self) -> u8 {
        match self.month {
            Month::January
            | Month::March
            | Month::May
            | Month::July
            | Month::August
            | Month::October
            | Month::December => 31,
            Month::April | Month::June | Month::September | Month::November => 30,
            Month::February => {
                if is_leap_year(self.year) {
                    29
                } else {
                    28
                }
            }
        }
    }

    /// The three letter abbreviation of the month, e.g. "Jan".
    pub fn label(&self) -> &'static str {
        match self.month {
            Month::January => "Jan",
            Month::February => "Feb",
            Month::March => "Mar",
            Month::April => "Apr",
            Month::May => "May",
            Month::June => "Jun",
            Month::July => "Jul",
            Month::August => "Aug",
            Month::September => "Sep",
            Month::October => "Oct",
            Month::November => "Nov",
            Month::December => "Dec",
        }
    }
}

impl Display for MonthKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month as u8)
    }
}

impl Serialize for MonthKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

fn is_leap_year(year: i32) -> bool {
    (year % 4 == 0 && year % 100 != 0) || (year % 400 == 0)
}

#[cfg(test)]
mod tests {
    use time::{Month, macros::date};

    use crate::Error;

    use super::{MonthKey, SummaryPeriod};

    #[test]
    fn recent_three_months_cross_year_boundary() {
        let months = SummaryPeriod::RecentThreeMonths.months(date!(2025 - 02 - 14));

        let keys: Vec<String> = months.iter().map(ToString::to_string).collect();
        assert_eq!(keys, vec!["2024-12", "2025-01", "2025-02"]);
    }

    #[test]
    fn current_year_starts_in_january() {
        let months = SummaryPeriod::CurrentYear.months(date!(2025 - 08 - 01));

        assert_eq!(months.len(), 12);
        assert_eq!(months[0], MonthKey::new(2025, 1).unwrap());
        assert_eq!(months[11], MonthKey::new(2025, 12).unwrap());
    }

    #[test]
    fn days_handles_leap_years() {
        assert_eq!(MonthKey::new(2024, 2).unwrap().days(), 29);
        assert_eq!(MonthKey::new(2025, 2).unwrap().days(), 28);
        assert_eq!(MonthKey::new(1900, 2).unwrap().days(), 28);
        assert_eq!(MonthKey::new(2000, 2).unwrap().days(), 29);
        assert_eq!(MonthKey::new(2025, 4).unwrap().days(), 30);
        assert_eq!(MonthKey::new(2025, 12).unwrap().days(), 31);
    }

    #[test]
    fn new_rejects_invalid_month() {
        assert_eq!(
            MonthKey::new(2025, 0),
            Err(Error::InvalidMonth {
                year: 2025,
                month: 0
            })
        );
        assert_eq!(
            MonthKey::new(2025, 13),
            Err(Error::InvalidMonth {
                year: 2025,
                month: 13
            })
        );
    }

    #[test]
    fn previous_wraps_to_december() {
        let key = MonthKey::new(2025, 1).unwrap().previous();

        assert_eq!(key.year(), 2024);
        assert_eq!(key.month(), Month::December);
    }

    #[test]
    fn period_uses_short_labels_on_the_wire() {
        let period: SummaryPeriod = serde_json::from_str("\"3m\"").unwrap();

        assert_eq!(period, SummaryPeriod::RecentThreeMonths);
        assert_eq!(
            serde_json::to_string(&SummaryPeriod::CurrentYear).unwrap(),
            "\"1y\""
        );
    }
}
