//! Named operations ("interactions") with declarative input validation and a
//! single-resolution async result.
//!
//! ```no_run
//! use interaction::{Definition, FieldRule, FieldSchemaMap, FieldType, Interaction, Record};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let create_user = Interaction::define(
//!     "CreateUser",
//!     Definition::new(|data: Record, done| {
//!         done.resolve(data.len());
//!         Ok(())
//!     })
//!     .inputs(FieldSchemaMap::from([(
//!         "name".to_string(),
//!         FieldRule::new(FieldType::String).required(),
//!     )])),
//! )?;
//!
//! let result = create_user.call(Record::new()).await;
//! assert!(interaction::is_validation_error(&result.unwrap_err()));
//! # Ok(())
//! # }
//! ```

pub mod consts;
pub mod deferred;
pub mod interaction;
pub mod registry;
pub mod schema;
pub mod validation;

/// Input to an interaction.
pub type Record = serde_json::Map<String, serde_json::Value>;

pub use consts::{INVALID, VALIDATION_ERROR};
pub use deferred::{Completion, Promise, deferred};
pub use interaction::{Definition, Interaction};
pub use registry::{InteractionRegistry, Operation};
pub use schema::{CompiledSchema, FieldRule, FieldSchemaMap, FieldType};
pub use validation::{
    ErrorEntry, Recorder, ValidationContext, ValidationError, is_validation_error,
};
