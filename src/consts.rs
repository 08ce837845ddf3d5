//! Project-wide constants.

/// Error kind recorded for every built-in schema violation.
pub const INVALID: &str = "Invalid";

/// Type tag carried by every [`ValidationError`](crate::validation::ValidationError).
pub const VALIDATION_ERROR: &str = "ValidationError";

/// Joins a field name and its message into one violation token.
pub const MESSAGE_SEPARATOR: &str = "||";

/// Message used when a field rule does not declare one.
pub fn default_message(field: &str) -> String {
    format!("{} is invalid.", field)
}
