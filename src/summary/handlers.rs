//! Route handlers for the summary endpoints.

use axum::{
    Extension, Json,
    extract::{FromRef, Query, State},
};
use serde::Deserialize;

use crate::{
    AppState, Error,
    record::{RecordStore, SqliteRecordStore},
    summary::{
        DailyChart, DayGroup, MonthKey, MonthlySummary, SummaryPeriod, build_daily_buckets,
        build_daily_groups, build_monthly_buckets,
    },
    timezone::LocalZone,
    user::UserId,
};

/// The state needed to build summaries.
#[derive(Debug, Clone)]
pub struct SummaryState {
    /// The store that owns the records.
    pub store: SqliteRecordStore,
    /// The timezone that days and months are evaluated in.
    pub local_timezone: LocalZone,
}

impl FromRef<AppState> for SummaryState {
    fn from_ref(state: &AppState) -> Self {
        Self {
            store: SqliteRecordStore::new(state.db_connection.clone()),
            local_timezone: state.local_timezone,
        }
    }
}

/// Selects a month, defaults to the current local month.
#[derive(Debug, Default, Deserialize)]
pub struct MonthQuery {
    /// The four digit year.
    pub year: Option<i32>,
    /// The month of the year, 1 for January.
    pub month: Option<u8>,
}

impl MonthQuery {
    fn resolve(&self, zone: &LocalZone) -> Result<MonthKey, Error> {
        let today = zone.today();

        MonthKey::new(
            self.year.unwrap_or(today.year()),
            self.month.unwrap_or(today.month() as u8),
        )
    }
}

/// Selects a summary period, defaults to the recent three months.
#[derive(Debug, Default, Deserialize)]
pub struct PeriodQuery {
    /// "3m" or "1y".
    pub period: Option<SummaryPeriod>,
}

/// A route handler that responds with the per-day chart of a month.
pub async fn get_daily_chart(
    State(state): State<SummaryState>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<DailyChart>, Error> {
    let month = query.resolve(&state.local_timezone)?;
    let records = state.store.list(user_id)?;

    Ok(Json(build_daily_buckets(
        &records,
        month,
        &state.local_timezone,
    )))
}

/// A route handler that responds with a month's records grouped by day.
pub async fn get_daily_groups(
    State(state): State<SummaryState>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<MonthQuery>,
) -> Result<Json<Vec<DayGroup>>, Error> {
    let month = query.resolve(&state.local_timezone)?;
    let records = state.store.list(user_id)?;

    Ok(Json(build_daily_groups(
        &records,
        month,
        &state.local_timezone,
    )))
}

/// A route handler that responds with the per-month totals of a period.
pub async fn get_monthly_summary(
    State(state): State<SummaryState>,
    Extension(user_id): Extension<UserId>,
    Query(query): Query<PeriodQuery>,
) -> Result<Json<MonthlySummary>, Error> {
    let period = query.period.unwrap_or(SummaryPeriod::RecentThreeMonths);
    let records = state.store.list(user_id)?;

    Ok(Json(build_monthly_buckets(
        &records,
        period,
        state.local_timezone.today(),
        &state.local_timezone,
    )))
}
