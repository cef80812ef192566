//! The per-command pipeline shared by every entry point of
//! [`SqlHelper`](crate::SqlHelper).
//!
//! `Command` → stored-procedure text → ambient fill → rewrite → "starting" hook
//! → driver → "completed" hook. Driver failures come back as
//! `CommandExecutionFailed` carrying the rewritten SQL and the parameter
//! snapshot.

use std::time::Duration;

use crate::config::{AmbientParameters, CommandOptions};
use crate::driver::Driver;
use crate::error::SqlHelperError;
use crate::hooks::{LogHooks, LogPhase, parameter_payload};
use crate::params::{IntoParameters, Parameter, normalize};
use crate::translation::{named_placeholders, rewrite};
use crate::types::{CommandType, RowValues};

/// One execution request: text, parameters, kind and timeout.
///
/// Built by the helper's entry points from their arguments and the instance
/// options; not reused across executions.
#[derive(Debug, Clone)]
pub(crate) struct Command {
    text: String,
    parameters: Vec<Parameter>,
    command_type: CommandType,
    timeout: Duration,
}

impl Command {
    /// # Errors
    /// Returns the normalizer's error for unsupported parameter shapes.
    pub(crate) fn new(
        text: &str,
        params: impl IntoParameters,
        options: &CommandOptions,
    ) -> Result<Self, SqlHelperError> {
        Ok(Self {
            text: text.to_string(),
            parameters: normalize(params)?,
            command_type: options.command_type,
            timeout: options.command_timeout(),
        })
    }
}

/// A command after rewriting, ready for the driver.
#[derive(Debug)]
pub(crate) struct Prepared {
    pub sql: String,
    pub bound: Vec<Parameter>,
    pub values: Vec<RowValues>,
    pub payload: Option<String>,
    pub timeout: Duration,
}

/// Resolve procedure text, fill ambient values and rewrite placeholders.
pub(crate) fn prepare(
    driver: &dyn Driver,
    command: Command,
    ambient: Option<&dyn AmbientParameters>,
) -> Result<Prepared, SqlHelperError> {
    let Command {
        text,
        mut parameters,
        command_type,
        timeout,
    } = command;

    let sql = match command_type {
        CommandType::Text => text,
        CommandType::StoredProcedure => driver.procedure_call(&text, &parameters)?,
    };

    if let Some(source) = ambient {
        fill_ambient(&sql, &mut parameters, source);
    }

    let rewritten = rewrite(&sql, &parameters, driver.placeholder_style())?;
    let payload = parameter_payload(&rewritten.bound)?;
    let values = rewritten.bound.iter().map(|p| p.value.clone()).collect();
    Ok(Prepared {
        sql: rewritten.sql,
        bound: rewritten.bound,
        values,
        payload,
        timeout,
    })
}

/// Bind placeholders the caller left open from `source`. Caller values win.
fn fill_ambient(sql: &str, parameters: &mut Vec<Parameter>, source: &dyn AmbientParameters) {
    for name in named_placeholders(sql) {
        if parameters.iter().any(|p| p.name.eq_ignore_ascii_case(&name)) {
            continue;
        }
        if let Some(value) = source.value(&name) {
            tracing::trace!(name = %name, "bound placeholder from ambient source");
            parameters.push(Parameter::new(name, value));
        }
    }
}

/// Run `op` against the driver between the two log hooks.
pub(crate) fn run<'d, T>(
    driver: &'d mut dyn Driver,
    hooks: &mut LogHooks,
    prepared: &Prepared,
    op: impl FnOnce(&'d mut dyn Driver, &str, &[RowValues]) -> Result<T, SqlHelperError>,
) -> Result<T, SqlHelperError> {
    hooks.fire(LogPhase::Starting, &prepared.sql, prepared.payload.as_deref())?;

    tracing::debug!(sql = %prepared.sql, params = prepared.values.len(), "executing command");
    let out = op(driver, &prepared.sql, &prepared.values).map_err(|e| wrap_driver_error(e, prepared))?;

    hooks.fire(LogPhase::Completed, &prepared.sql, prepared.payload.as_deref())?;
    Ok(out)
}

pub(crate) fn wrap_driver_error(err: SqlHelperError, prepared: &Prepared) -> SqlHelperError {
    if !err.is_driver_error() {
        return err;
    }
    SqlHelperError::CommandExecutionFailed {
        sql: prepared.sql.clone(),
        params: prepared.payload.clone(),
        source: Box::new(err),
    }
}
