//! Defines the endpoints for reading records.

use axum::{
    Extension, Json,
    extract::{Path, State},
};

use crate::{
    Error,
    record::{
        core::{Record, RecordId},
        store::{RecordState, RecordStore},
    },
    user::UserId,
};

/// A route handler that responds with the user's records, most recently created first.
pub async fn list_records_endpoint(
    State(state): State<RecordState>,
    Extension(user_id): Extension<UserId>,
) -> Result<Json<Vec<Record>>, Error> {
    state.store.list(user_id).map(Json)
}

/// A route handler that responds with a single record.
pub async fn get_record_endpoint(
    State(state): State<RecordState>,
    Extension(user_id): Extension<UserId>,
    Path(record_id): Path<RecordId>,
) -> Result<Json<Record>, Error> {
    state.store.get(user_id, record_id).map(Json)
}
