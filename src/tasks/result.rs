//! # Outcome of one task execution.
//!
//! [`TaskResult`] carries an untyped value, an optional [`TaskError`], and two flags describing
//! how the *caller's wait* ended (`canceled`, `timeout`). The flags are independent of the
//! error: a task may fail and still be reported as timed out when the wait ended first.
//!
//! Typed accessors downcast the stored value and return [`TaskError::TypeCast`] on mismatch.
//! When an error is stored, accessors return that error first.
//!
//! # Example
//! ```
//! use taskhive::{TaskError, TaskResult};
//!
//! let ok = TaskResult::ok(42i64);
//! assert_eq!(ok.i64(), Ok(42));
//! assert_eq!(ok.bool(), Err(TaskError::TypeCast));
//!
//! let failed = TaskResult::from_error(TaskError::fail("boom"));
//! assert!(failed.has_error());
//! assert_eq!(failed.i64(), Err(TaskError::fail("boom")));
//! ```

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::context::Scope;
use crate::error::TaskError;

/// Shared, type-erased payload.
pub type AnyValue = Arc<dyn Any + Send + Sync>;

/// Immutable outcome of a task.
#[derive(Clone, Default)]
pub struct TaskResult {
    value: Option<AnyValue>,
    error: Option<TaskError>,
    canceled: bool,
    timeout: bool,
}

impl fmt::Debug for TaskResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskResult")
            .field("has_value", &self.value.is_some())
            .field("error", &self.error)
            .field("canceled", &self.canceled)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl TaskResult {
    /// Result holding `value` and an optional error.
    pub fn new<T: Any + Send + Sync>(value: T, error: Option<TaskError>) -> Self {
        Self {
            value: Some(Arc::new(value)),
            error,
            ..Self::default()
        }
    }

    /// Successful result holding `value`.
    pub fn ok<T: Any + Send + Sync>(value: T) -> Self {
        Self::new(value, None)
    }

    /// Successful result without a value.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Failed result.
    pub fn from_error(error: TaskError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Result describing an ended scope: flags and error follow [`Scope::err`].
    ///
    /// A live scope yields an empty result.
    pub fn from_scope(scope: &Scope) -> Self {
        match scope.err() {
            Some(err) => Self::interrupted(err),
            None => Self::empty(),
        }
    }

    pub(crate) fn interrupted(error: TaskError) -> Self {
        Self {
            canceled: error == TaskError::Canceled,
            timeout: error == TaskError::DeadlineExceeded,
            error: Some(error),
            value: None,
        }
    }

    /// The stored error, if any.
    pub fn error(&self) -> Option<&TaskError> {
        self.error.as_ref()
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// True if the wait for this result was cancelled.
    pub fn canceled(&self) -> bool {
        self.canceled
    }

    /// True if the wait for this result timed out.
    pub fn timeout(&self) -> bool {
        self.timeout
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// The type-erased value.
    pub fn raw_value(&self) -> Option<&AnyValue> {
        self.value.as_ref()
    }

    /// Borrows the value as `T`.
    pub fn value<T: Any>(&self) -> Result<&T, TaskError> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        self.value
            .as_deref()
            .and_then(|v| v.downcast_ref::<T>())
            .ok_or(TaskError::TypeCast)
    }

    /// Clones the value out as `T`.
    pub fn get<T: Any + Clone>(&self) -> Result<T, TaskError> {
        self.value::<T>().cloned()
    }

    pub fn bool(&self) -> Result<bool, TaskError> {
        self.get::<bool>()
    }

    /// Platform-sized integer (`isize`).
    pub fn int(&self) -> Result<isize, TaskError> {
        self.get::<isize>()
    }

    pub fn i32(&self) -> Result<i32, TaskError> {
        self.get::<i32>()
    }

    pub fn i64(&self) -> Result<i64, TaskError> {
        self.get::<i64>()
    }

    /// Accepts both `String` and `&'static str` payloads.
    pub fn string(&self) -> Result<String, TaskError> {
        match self.get::<String>() {
            Err(TaskError::TypeCast) => self.get::<&'static str>().map(str::to_owned),
            other => other,
        }
    }

    /// Like [`TaskResult::get`], panicking on error or type mismatch.
    pub fn must_get<T: Any + Clone>(&self) -> T {
        must(self.get::<T>())
    }

    pub fn must_bool(&self) -> bool {
        must(self.bool())
    }

    pub fn must_int(&self) -> isize {
        must(self.int())
    }

    pub fn must_i32(&self) -> i32 {
        must(self.i32())
    }

    pub fn must_i64(&self) -> i64 {
        must(self.i64())
    }

    pub fn must_string(&self) -> String {
        must(self.string())
    }
}

fn must<T>(res: Result<T, TaskError>) -> T {
    match res {
        Ok(v) => v,
        Err(err) => panic!("task result: {err}"),
    }
}
