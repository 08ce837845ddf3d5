//! Named operations with validated input and a single async result.
//!
//! An [`Interaction`] is built once from a [`Definition`] and can then be
//! called any number of times. Each call:
//!
//! 1. checks the input against the declared schema (if any), recording every
//!    violation as [`INVALID`] and dropping undeclared fields,
//! 2. runs the custom validation hook (if any) on the filtered input,
//! 3. rejects with a [`ValidationError`](crate::validation::ValidationError)
//!    when anything was recorded, or
//! 4. hands the input and a [`Completion`] to `execute`.
//!
//! Steps 1 to 3 happen synchronously inside [`Interaction::call`].

use anyhow::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::Record;
use crate::consts::INVALID;
use crate::deferred::{Completion, Promise, deferred};
use crate::schema::{CompiledSchema, FieldSchemaMap};
use crate::validation::{Recorder, ValidationContext};

type ExecuteFn<T> = dyn Fn(Record, Completion<T>) -> Result<()> + Send + Sync;
type ValidateFn = dyn Fn(&mut Recorder<'_>, &Record) + Send + Sync;

/// What an interaction checks and does.
pub struct Definition<T> {
    inputs: Option<FieldSchemaMap>,
    validation: Option<Box<ValidateFn>>,
    execute: Box<ExecuteFn<T>>,
}

impl<T: Send + 'static> Definition<T> {
    /// `execute` settles the call through the completion it is handed. An
    /// `Err` return rejects the call unless the completion already settled it.
    /// A panic in `execute` is not caught and unwinds out of [`Interaction::call`].
    pub fn new<F>(execute: F) -> Self
    where
        F: Fn(Record, Completion<T>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            inputs: None,
            validation: None,
            execute: Box::new(execute),
        }
    }

    /// Execute with an async function, spawned on the current tokio runtime.
    /// Calling outside a runtime rejects the call.
    pub fn from_async<F, Fut>(execute: F) -> Self
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        Self::new(move |data, completion| {
            let handle = tokio::runtime::Handle::try_current()?;
            let fut = execute(data);
            handle.spawn(async move {
                let result = fut.await;
                trace!(ok = result.is_ok(), "async execute settled");
                completion.complete(result);
            });
            Ok(())
        })
    }

    /// Declared fields. Input is filtered down to these before validation.
    pub fn inputs(mut self, schema: FieldSchemaMap) -> Self {
        self.inputs = Some(schema);
        self
    }

    /// Custom validation, run after the schema check. The hook can only add
    /// errors; schema errors already recorded stay in place.
    pub fn validation<F>(mut self, validate: F) -> Self
    where
        F: Fn(&mut Recorder<'_>, &Record) + Send + Sync + 'static,
    {
        self.validation = Some(Box::new(validate));
        self
    }
}

struct Inner<T> {
    name: String,
    schema: Option<CompiledSchema>,
    validation: Option<Box<ValidateFn>>,
    execute: Box<ExecuteFn<T>>,
}

/// A named, validated, asynchronous operation. Cloning shares the definition.
pub struct Interaction<T> {
    inner: Arc<Inner<T>>,
}

impl<T> Clone for Interaction<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for Interaction<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interaction")
            .field("name", &self.inner.name)
            .field("fields", &self.fields())
            .finish()
    }
}

impl<T: Send + 'static> Interaction<T> {
    /// Build an interaction. Fails only if the input schema does not compile.
    pub fn define(name: impl Into<String>, definition: Definition<T>) -> Result<Self> {
        let schema = definition
            .inputs
            .as_ref()
            .map(CompiledSchema::compile)
            .transpose()?;
        Ok(Self {
            inner: Arc::new(Inner {
                name: name.into(),
                schema,
                validation: definition.validation,
                execute: definition.execute,
            }),
        })
    }

    /// Run one invocation. Validation completes before this returns; the
    /// promise settles whenever `execute` completes.
    pub fn call(&self, data: Record) -> Promise<T> {
        trace!(interaction = %self.inner.name, "invoked");
        let mut validation = ValidationContext::new();

        let data = match &self.inner.schema {
            Some(schema) => {
                let (violations, filtered) = schema.check(&data);
                for (field, message) in violations {
                    validation.record_error(INVALID, field, message);
                }
                filtered
            }
            None => data,
        };

        if let Some(validate) = &self.inner.validation {
            validate(&mut validation.recorder(), &data);
        }

        if let Some(err) = validation.into_error() {
            debug!(
                interaction = %self.inner.name,
                fields = err.errors().len(),
                "validation failed, skipping execute"
            );
            return Promise::rejected(err);
        }

        let (completion, promise) = deferred();
        let fallback = completion.share();
        if let Err(err) = (self.inner.execute)(data, completion) {
            if fallback.settle(Err(err)) {
                trace!(interaction = %self.inner.name, "execute failed, call rejected");
            } else {
                debug!(interaction = %self.inner.name, "execute failed after completing");
            }
        }
        promise
    }
}

impl<T> Interaction<T> {
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Declared input fields. Empty both without a schema (input passes
    /// through) and with an empty one (everything is dropped); use
    /// [`has_schema`](Self::has_schema) to tell them apart.
    pub fn fields(&self) -> Vec<String> {
        self.inner
            .schema
            .as_ref()
            .map(|schema| schema.fields().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn has_schema(&self) -> bool {
        self.inner.schema.is_some()
    }
}
