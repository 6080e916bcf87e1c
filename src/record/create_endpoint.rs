//! Defines the endpoint for creating a new record.

use axum::{Extension, Json, extract::State, http::StatusCode};

use crate::{
    Error,
    record::{
        core::Record,
        form::RecordForm,
        store::{RecordState, RecordStore},
    },
    user::UserId,
};

/// A route handler for creating a new record, responds with the stored record.
pub async fn create_record_endpoint(
    State(state): State<RecordState>,
    Extension(user_id): Extension<UserId>,
    Json(form): Json<RecordForm>,
) -> Result<(StatusCode, Json<Record>), Error> {
    let new_record = form.validate()?;

    let record = state.store.create(user_id, new_record).inspect_err(|error| {
        tracing::error!("could not create record for user {user_id}: {error}")
    })?;

    tracing::debug!("user {user_id} created record {}", record.id);

    Ok((StatusCode::CREATED, Json(record)))
}
