//! Arguments of an operation call and their mapping onto event details.

use std::fmt;

use chronicle_core::error::EventArgumentError;
use chronicle_core::event::Details;
use serde_json::Value;

/// Callback handed the result of a query.
pub type Continuation = Box<dyn FnOnce(&Value) + Send>;

/// Positional arguments, trailing options and an optional continuation for
/// one call to [`AggregateHandle::invoke`](crate::AggregateHandle::invoke).
#[derive(Default)]
pub struct CallArgs {
    positional: Vec<Value>,
    options: Details,
    continuation: Option<Continuation>,
}

impl CallArgs {
    /// An empty argument list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a positional argument.
    #[must_use]
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    /// Adds a trailing option.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Merges a whole options mapping, later keys winning.
    #[must_use]
    pub fn options(mut self, options: Details) -> Self {
        self.options.extend(options);
        self
    }

    /// Attaches a continuation. Only queries accept one.
    #[must_use]
    pub fn with_continuation(mut self, continuation: impl FnOnce(&Value) + Send + 'static) -> Self {
        self.continuation = Some(Box::new(continuation));
        self
    }

    /// Returns `true` if a continuation is attached.
    #[must_use]
    pub fn has_continuation(&self) -> bool {
        self.continuation.is_some()
    }

    pub(crate) fn into_parts(self) -> (Vec<Value>, Details, Option<Continuation>) {
        (self.positional, self.options, self.continuation)
    }
}

impl fmt::Debug for CallArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallArgs")
            .field("positional", &self.positional)
            .field("options", &self.options)
            .field("has_continuation", &self.has_continuation())
            .finish()
    }
}

/// Maps positional arguments onto `params` in declaration order, then
/// merges `options` after them.
///
/// # Errors
///
/// Returns `EventArgumentError::Arity` if the positional count differs
/// from `params`, or `EventArgumentError::DuplicateParameter` if an option
/// reuses a positional parameter name.
pub fn build_details(
    operation: &str,
    params: &[&str],
    positional: Vec<Value>,
    options: Details,
) -> Result<Details, EventArgumentError> {
    if positional.len() != params.len() {
        return Err(EventArgumentError::Arity {
            operation: operation.to_owned(),
            expected: params.len(),
            given: positional.len(),
        });
    }

    let mut details: Details = params
        .iter()
        .map(|param| (*param).to_owned())
        .zip(positional)
        .collect();

    for (key, value) in options {
        if details.contains_key(&key) {
            return Err(EventArgumentError::DuplicateParameter {
                operation: operation.to_owned(),
                key,
            });
        }
        details.insert(key, value);
    }
    Ok(details)
}
