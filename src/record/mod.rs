//! Record management for the account book.
//!
//! This module contains everything related to records:
//! - The `Record` model and `NewRecord` builder for creating records
//! - Database functions and the `RecordStore` trait for storing and querying records
//! - Route handlers for the record JSON API

mod core;
mod create_endpoint;
mod delete_endpoint;
mod edit_endpoint;
mod form;
mod list_endpoint;
mod store;

pub use core::{NewRecord, Record, RecordId, RecordKind, create_record_table};
pub use create_endpoint::create_record_endpoint;
pub use delete_endpoint::delete_record_endpoint;
pub use edit_endpoint::update_record_endpoint;
pub use list_endpoint::{get_record_endpoint, list_records_endpoint};
pub use store::{RecordState, RecordStore, SqliteRecordStore};

#[cfg(test)]
pub use core::{count_records, create_record, list_records};
