//! Defines the endpoint for deleting a record.

use axum::{
    Extension,
    extract::{Path, State},
    http::StatusCode,
};

use crate::{
    Error,
    record::{
        core::RecordId,
        store::{RecordState, RecordStore},
    },
    user::UserId,
};

/// A route handler for deleting a record, responds with 204 No Content.
pub async fn delete_record_endpoint(
    State(state): State<RecordState>,
    Extension(user_id): Extension<UserId>,
    Path(record_id): Path<RecordId>,
) -> Result<StatusCode, Error> {
    state
        .store
        .delete(user_id, record_id)
        .inspect_err(|error| {
            tracing::warn!("could not delete record {record_id} for user {user_id}: {error}")
        })?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use axum::{
        Extension,
        extract::{Path, State},
        http::StatusCode,
    };

    use crate::{
        Error, Record, RecordKind, RecordStore,
        record::{
            delete_record_endpoint,
            store::{RecordState, SqliteRecordStore},
        },
        test_utils::get_test_connection_and_user,
    };

    #[tokio::test]
    async fn deletes_record() {
        let (connection, user) = get_test_connection_and_user();
        let state = RecordState {
            store: SqliteRecordStore::new(connection),
        };
        let record = state
            .store
            .create(user.id, Record::build(RecordKind::Expense, 1.0, "Gum"))
            .unwrap();

        let status = delete_record_endpoint(State(state.clone()), Extension(user.id), Path(record.id))
            .await
            .unwrap();

        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(state.store.get(user.id, record.id), Err(Error::NotFound));
    }

    #[tokio::test]
    async fn deleting_twice_fails() {
        let (connection, user) = get_test_connection_and_user();
        let state = RecordState {
            store: SqliteRecordStore::new(connection),
        };
        let record = state
            .store
            .create(user.id, Record::build(RecordKind::Expense, 1.0, "Gum"))
            .unwrap();
        delete_record_endpoint(State(state.clone()), Extension(user.id), Path(record.id))
            .await
            .unwrap();

        let result =
            delete_record_endpoint(State(state), Extension(user.id), Path(record.id)).await;

        assert_eq!(result, Err(Error::DeleteMissingRecord));
    }
}
