//! The JSON body used to create and edit records, and its validation.

use serde::Deserialize;

use crate::{
    Error,
    record::core::{NewRecord, Record, RecordKind},
};

/// The request body for creating or editing a record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordForm {
    /// Whether the record is an expense or income.
    pub kind: RecordKind,
    /// The amount of money in whole currency units.
    pub amount: f64,
    /// A text description of the record.
    #[serde(default)]
    pub note: String,
    /// Epoch milliseconds of the date the record happened, absent or `0` if unset.
    #[serde(default)]
    pub occurred_at: Option<i64>,
    /// The reference returned by a photo upload.
    #[serde(default)]
    pub photo_ref: Option<String>,
}

impl RecordForm {
    /// Check the form and turn it into a [NewRecord].
    ///
    /// # Errors
    /// Returns a:
    /// - [Error::InvalidAmount] if the amount is not a whole number greater than zero,
    /// - or [Error::EmptyNote] if the note is blank.
    pub fn validate(self) -> Result<NewRecord, Error> {
        if !self.amount.is_finite() {
            return Err(Error::InvalidAmount("the amount must be a number".to_owned()));
        }

        if self.amount <= 0.0 {
            return Err(Error::InvalidAmount(
                "the amount must be greater than zero".to_owned(),
            ));
        }

        if self.amount.fract() != 0.0 {
            return Err(Error::InvalidAmount(
                "the amount must be a whole number".to_owned(),
            ));
        }

        let note = self.note.trim();

        if note.is_empty() {
            return Err(Error::EmptyNote);
        }

        let photo_ref = self
            .photo_ref
            .map(|photo_ref| photo_ref.trim().to_owned())
            .filter(|photo_ref| !photo_ref.is_empty());

        Ok(Record::build(self.kind, self.amount, note)
            .occurred_at(self.occurred_at.unwrap_or(0))
            .photo_ref(photo_ref))
    }
}
