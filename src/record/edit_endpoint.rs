//! Defines the endpoint for editing a record.

use axum::{
    Extension, Json,
    extract::{Path, State},
};

use crate::{
    Error,
    record::{
        core::{Record, RecordId},
        form::RecordForm,
        store::{RecordState, RecordStore},
    },
    user::UserId,
};

/// A route handler for replacing the fields of a record, responds with the updated record.
pub async fn update_record_endpoint(
    State(state): State<RecordState>,
    Extension(user_id): Extension<UserId>,
    Path(record_id): Path<RecordId>,
    Json(form): Json<RecordForm>,
) -> Result<Json<Record>, Error> {
    let new_record = form.validate()?;

    state
        .store
        .update(user_id, record_id, new_record)
        .inspect_err(|error| {
            tracing::warn!("could not update record {record_id} for user {user_id}: {error}")
        })
        .map(Json)
}
