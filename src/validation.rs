//! Per-invocation error collection and the aggregated failure it produces.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::consts::VALIDATION_ERROR;

/// One recorded problem with a field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
}

/// Field name to the errors recorded against it, in recording order.
pub type FieldErrors = BTreeMap<String, Vec<ErrorEntry>>;

/// Mutable error state for a single call. Never shared between calls.
#[derive(Debug, Default)]
pub struct ValidationContext {
    errors: FieldErrors,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an error to `field`. Kinds are free-form tags.
    pub fn record_error(
        &mut self,
        kind: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.errors
            .entry(field.into())
            .or_default()
            .push(ErrorEntry {
                kind: kind.into(),
                message: message.into(),
            });
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    pub fn is_empty(&self) -> bool {
        self.errors.values().all(Vec::is_empty)
    }

    /// A handle that can only append to this context.
    pub(crate) fn recorder(&mut self) -> Recorder<'_> {
        Recorder { context: self }
    }

    /// Consume the context. `None` when nothing was recorded.
    pub fn into_error(self) -> Option<ValidationError> {
        if self.is_empty() {
            None
        } else {
            Some(ValidationError::new(self.errors))
        }
    }
}

/// Append-only view of a [`ValidationContext`], handed to custom validation.
/// Errors already recorded cannot be read, replaced or removed through it.
pub struct Recorder<'a> {
    context: &'a mut ValidationContext,
}

impl Recorder<'_> {
    /// Append an error to `field`. Kinds are free-form tags.
    pub fn record_error(
        &mut self,
        kind: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.context.record_error(kind, field, message);
    }
}

/// Input was rejected before execution. Distinguish it from execution
/// failures with [`ValidationError::from_error`].
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{kind}: {} field(s) failed validation", .errors.len())]
pub struct ValidationError {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(rename = "validationError")]
    validation_error: bool,
    errors: FieldErrors,
}

impl ValidationError {
    pub fn new(errors: FieldErrors) -> Self {
        Self {
            kind: VALIDATION_ERROR,
            validation_error: true,
            errors,
        }
    }

    /// Always [`VALIDATION_ERROR`].
    pub fn kind(&self) -> &str {
        self.kind
    }

    pub fn is_validation_error(&self) -> bool {
        self.validation_error
    }

    pub fn errors(&self) -> &FieldErrors {
        &self.errors
    }

    /// Errors for one field, empty if it has none.
    pub fn field(&self, field: &str) -> &[ErrorEntry] {
        self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn into_errors(self) -> FieldErrors {
        self.errors
    }

    /// The validation failure inside `err`, if that is what it is.
    pub fn from_error(err: &anyhow::Error) -> Option<&ValidationError> {
        err.downcast_ref::<ValidationError>()
    }
}

/// True when `err` is a [`ValidationError`] rather than an execution failure.
pub fn is_validation_error(err: &anyhow::Error) -> bool {
    ValidationError::from_error(err).is_some()
}
