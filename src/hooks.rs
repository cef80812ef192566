//! Execution logging callbacks.
//!
//! When enabled, `on_starting` runs right before a command reaches the driver and
//! `on_completed` right after it returns, both with the rewritten SQL and a JSON
//! snapshot of the bound parameters (`[{"key":"id","value":7}]`, or `None` when
//! nothing was bound). A callback error aborts the call and is returned to the
//! caller as `SqlHelperError::Instrumentation`.

use std::fmt;

use serde::Serialize;

use crate::error::{BoxError, SqlHelperError};
use crate::params::Parameter;
use crate::types::RowValues;

pub type LogCallback = Box<dyn FnMut(&str, Option<&str>) -> Result<(), BoxError> + Send>;

/// Which side of the execution a callback observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogPhase {
    Starting,
    Completed,
}

#[derive(Default)]
pub struct LogHooks {
    pub enabled: bool,
    on_starting: Option<LogCallback>,
    on_completed: Option<LogCallback>,
}

impl LogHooks {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    #[must_use]
    pub fn on_starting<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&str, Option<&str>) -> Result<(), BoxError> + Send + 'static,
    {
        self.on_starting = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_completed<F>(mut self, callback: F) -> Self
    where
        F: FnMut(&str, Option<&str>) -> Result<(), BoxError> + Send + 'static,
    {
        self.on_completed = Some(Box::new(callback));
        self
    }

    /// Invoke the callback for `phase`, if logging is on and one is registered.
    ///
    /// # Errors
    /// Returns `SqlHelperError::Instrumentation` with the callback's error.
    pub(crate) fn fire(
        &mut self,
        phase: LogPhase,
        sql: &str,
        payload: Option<&str>,
    ) -> Result<(), SqlHelperError> {
        if !self.enabled {
            return Ok(());
        }
        let callback = match phase {
            LogPhase::Starting => self.on_starting.as_mut(),
            LogPhase::Completed => self.on_completed.as_mut(),
        };
        match callback {
            Some(cb) => cb(sql, payload).map_err(SqlHelperError::Instrumentation),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for LogHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogHooks")
            .field("enabled", &self.enabled)
            .field("on_starting", &self.on_starting.is_some())
            .field("on_completed", &self.on_completed.is_some())
            .finish()
    }
}

#[derive(Serialize)]
struct LoggedParameter<'a> {
    key: &'a str,
    value: &'a RowValues,
}

/// Serialize bound parameters for the log callbacks and error diagnostics.
///
/// # Errors
/// Returns `SqlHelperError::Other` if serialization fails (non-finite floats).
pub fn parameter_payload(params: &[Parameter]) -> Result<Option<String>, SqlHelperError> {
    if params.is_empty() {
        return Ok(None);
    }
    let entries: Vec<LoggedParameter<'_>> = params
        .iter()
        .map(|p| LoggedParameter {
            key: &p.name,
            value: &p.value,
        })
        .collect();
    serde_json::to_string(&entries)
        .map(Some)
        .map_err(|e| SqlHelperError::Other(format!("cannot serialize parameters: {e}")))
}
