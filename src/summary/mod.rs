//! Summaries of records by day and by month.
//!
//! The builders in this module are pure: they never mutate the records they
//! are given and return identical output for identical input. Records without
//! a usable date are skipped and amounts that are not finite count as zero.

mod daily;
mod groups;
mod handlers;
mod monthly;
mod period;

pub use daily::{DailyChart, build_daily_buckets};
pub use groups::{DayGroup, build_daily_groups};
pub use handlers::{get_daily_chart, get_daily_groups, get_monthly_summary};
pub use monthly::{MonthBucket, MonthlySummary, build_monthly_buckets};
pub use period::{MonthKey, SummaryPeriod};

/// Chart values are shown in thousands of currency units.
pub const CHART_UNIT_DIVISOR: f64 = 1000.0;

/// Treat amounts that are NaN or infinite as zero before they are summed.
pub(crate) fn normalize_amount(amount: f64) -> f64 {
    if amount.is_finite() { amount } else { 0.0 }
}
