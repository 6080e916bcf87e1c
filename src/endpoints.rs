//! The API endpoints URIs.
//!
//! For endpoints that take a parameter, e.g., '/api/records/{record_id}', use [format_endpoint].

/// The route for logging in a user.
pub const LOG_IN: &str = "/api/log_in";
/// The route for the client to log out the current user.
pub const LOG_OUT: &str = "/api/log_out";
/// The route to register users.
pub const USERS: &str = "/api/users";
/// The route to check whether an email address or username is free.
pub const USER_AVAILABILITY: &str = "/api/users/availability";
/// The route to list and create the current user's records.
pub const RECORDS: &str = "/api/records";
/// The route to access a single record.
pub const RECORD: &str = "/api/records/{record_id}";
/// The route to download the current user's records as CSV.
pub const RECORDS_EXPORT: &str = "/api/records/export";
/// The route for the daily expense/income chart of a month.
pub const SUMMARY_DAILY: &str = "/api/summary/daily";
/// The route for a month's records grouped by day.
pub const SUMMARY_DAYS: &str = "/api/summary/days";
/// The route for the per-month totals of a period.
pub const SUMMARY_MONTHLY: &str = "/api/summary/monthly";
/// The route to view and delete the current user's account.
pub const ACCOUNT: &str = "/api/account";
/// The route to change the current user's nickname.
pub const ACCOUNT_NICKNAME: &str = "/api/account/nickname";
/// The route to upload photos.
pub const PHOTOS: &str = "/api/photos";
/// The route to download a single photo.
pub const PHOTO: &str = "/api/photos/{photo_name}";

/// Replace the parameter in `endpoint_path` with `id`.
///
/// A parameter is a string that starts with a left brace, followed by
/// lowercase letters or underscores, and ends with a right brace.
/// For example, in the endpoint path '/records/{record_id}', '{record_id}' is the parameter.
///
/// This function assumes that an endpoint path only contains ASCII characters
/// and a single parameter.
///
/// If no parameter is found in `endpoint_path`, the function returns the
/// the original `endpoint_path`.
pub fn format_endpoint(endpoint_path: &str, id: impl std::fmt::Display) -> String {
    let Some(param_start) = endpoint_path.find('{') else {
        return endpoint_path.to_string();
    };

    let param_end = endpoint_path[param_start..]
        .find('}')
        .map(|end| param_start + end + 1)
        .unwrap_or(endpoint_path.len());

    format!(
        "{}{}{}",
        &endpoint_path[..param_start],
        id,
        &endpoint_path[param_end..]
    )
}
