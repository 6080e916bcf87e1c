//! Purging records that are older than the retention window.

use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use rusqlite::{Connection, Transaction as SqlTransaction, TransactionBehavior};
use tokio::task::JoinHandle;

use crate::{
    Error,
    photo::{delete_photos, is_owned_photo_name},
    timezone::now_millis,
    user::UserId,
};

/// How often the background task purges expired records.
pub const RETENTION_INTERVAL: std::time::Duration = std::time::Duration::from_secs(24 * 60 * 60);

const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// What a purge removed from the database.
#[derive(Debug, Default, PartialEq)]
pub struct PurgedRecords {
    /// The number of records deleted.
    pub record_count: usize,
    /// Photos that belonged to the deleted records and are not attached to
    /// any remaining record.
    pub orphaned_photos: Vec<String>,
}

/// The earliest effective timestamp that is kept when records are retained
/// for `retention_days` days before `now_millis`.
pub fn retention_cutoff(now_millis: i64, retention_days: u32) -> i64 {
    now_millis.saturating_sub(i64::from(retention_days) * MILLIS_PER_DAY)
}

/// Delete every record whose effective date is before `cutoff_millis`.
///
/// A record's effective date is its occurred date, or its creation time if
/// the occurred date is unset. Photo files are left alone; the caller removes
/// the returned orphaned photos.
///
/// # Errors
///
/// Returns an [Error::SqlError] if the delete failed.
pub fn purge_expired_records(
    connection: &Connection,
    cutoff_millis: i64,
) -> Result<PurgedRecords, Error> {
    let transaction = SqlTransaction::new_unchecked(connection, TransactionBehavior::Immediate)?;

    let deleted: Vec<(i64, Option<String>)> = transaction
        .prepare(
            "DELETE FROM record
            WHERE (CASE WHEN occurred_at != 0 THEN occurred_at ELSE created_at END) < ?1
            RETURNING user_id, photo_ref",
        )?
        .query_map((cutoff_millis,), |row| Ok((row.get(0)?, row.get(1)?)))?
        .collect::<Result<_, _>>()?;

    let mut orphaned_photos: Vec<String> = Vec::new();

    for (user_id, photo_ref) in &deleted {
        let Some(photo_ref) = photo_ref else {
            continue;
        };

        if !is_owned_photo_name(photo_ref, UserId::new(*user_id))
            || orphaned_photos.contains(photo_ref)
        {
            continue;
        }

        let still_attached: bool = transaction.query_row(
            "SELECT EXISTS(SELECT 1 FROM record WHERE photo_ref = ?1)",
            (photo_ref,),
            |row| row.get(0),
        )?;

        if !still_attached {
            orphaned_photos.push(photo_ref.clone());
        }
    }

    transaction.commit()?;

    Ok(PurgedRecords {
        record_count: deleted.len(),
        orphaned_photos,
    })
}

/// Purge expired records now and then once every [RETENTION_INTERVAL].
///
/// Photos attached only to purged records are deleted from `photo_dir`.
/// Returns `None` without spawning anything when `retention_days` is zero,
/// which keeps records forever.
pub fn spawn_retention_task(
    db_connection: Arc<Mutex<Connection>>,
    photo_dir: PathBuf,
    retention_days: u32,
) -> Option<JoinHandle<()>> {
    if retention_days == 0 {
        tracing::info!("Record retention is disabled");
        return None;
    }

    Some(tokio::spawn(async move {
        let mut interval = tokio::time::interval(RETENTION_INTERVAL);

        loop {
            interval.tick().await;

            let Some(purged) = run_purge(&db_connection, retention_days) else {
                continue;
            };

            match delete_photos(&photo_dir, &purged.orphaned_photos).await {
                Ok(0) => {}
                Ok(count) => tracing::info!("Deleted {count} photos of purged records"),
                Err(error) => {
                    tracing::error!("Could not delete photos of purged records: {error}")
                }
            }
        }
    }))
}

fn run_purge(db_connection: &Mutex<Connection>, retention_days: u32) -> Option<PurgedRecords> {
    let connection = match db_connection.lock() {
        Ok(connection) => connection,
        Err(error) => {
            tracing::error!("could not acquire database lock: {error}");
            return None;
        }
    };

    let cutoff = retention_cutoff(now_millis(), retention_days);

    match purge_expired_records(&connection, cutoff) {
        Ok(purged) if purged.record_count == 0 => {
            tracing::debug!("No records older than {retention_days} days");
            Some(purged)
        }
        Ok(purged) => {
            tracing::info!(
                "Purged {} records older than {retention_days} days",
                purged.record_count
            );
            Some(purged)
        }
        Err(error) => {
            tracing::error!("Could not purge expired records: {error}");
            None
        }
    }
}
