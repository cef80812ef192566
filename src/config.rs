use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::hooks::LogHooks;
use crate::types::{CommandType, RowValues};

/// Default per-command timeout.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// What happens to an open transaction when the connection is closed or dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisposePolicy {
    /// Discard uncommitted work.
    #[default]
    Rollback,
    /// Keep uncommitted work, as if `commit()` had been called.
    Commit,
}

/// Source of values for placeholders the caller did not bind, such as the
/// fields of an incoming request.
pub trait AmbientParameters: Send {
    fn value(&self, name: &str) -> Option<RowValues>;
}

impl AmbientParameters for HashMap<String, RowValues> {
    fn value(&self, name: &str) -> Option<RowValues> {
        self.get(name).cloned().or_else(|| {
            self.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        })
    }
}

impl AmbientParameters for BTreeMap<String, RowValues> {
    fn value(&self, name: &str) -> Option<RowValues> {
        self.get(name).cloned().or_else(|| {
            self.iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        })
    }
}

impl<F> AmbientParameters for F
where
    F: Fn(&str) -> Option<RowValues> + Send,
{
    fn value(&self, name: &str) -> Option<RowValues> {
        self(name)
    }
}

/// Serializable command settings.
///
/// ```rust
/// use sql_helper::prelude::*;
///
/// let opts: CommandOptions = serde_json::from_str(
///     r#"{ "command_timeout_secs": 5, "clear_parameters": false }"#,
/// )?;
/// assert_eq!(opts.command_type, CommandType::Text);
/// assert!(!opts.clear_parameters);
/// # Ok::<(), serde_json::Error>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandOptions {
    pub command_type: CommandType,
    pub command_timeout_secs: u64,
    /// Forget the bound parameters once a command finishes.
    pub clear_parameters: bool,
    /// Fill unbound placeholders from the ambient source.
    pub auto_fill_ambient_parameters: bool,
    pub dispose_policy: DisposePolicy,
}

impl Default for CommandOptions {
    fn default() -> Self {
        Self {
            command_type: CommandType::Text,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            clear_parameters: true,
            auto_fill_ambient_parameters: false,
            dispose_policy: DisposePolicy::Rollback,
        }
    }
}

impl CommandOptions {
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }
}

/// Per-instance configuration of a [`SqlHelper`](crate::SqlHelper).
#[derive(Default)]
pub struct HelperOptions {
    pub command: CommandOptions,
    pub logging: LogHooks,
    pub ambient: Option<Box<dyn AmbientParameters>>,
}

impl HelperOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> HelperOptionsBuilder {
        HelperOptionsBuilder::new()
    }
}

impl fmt::Debug for HelperOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperOptions")
            .field("command", &self.command)
            .field("logging", &self.logging)
            .field("ambient", &self.ambient.is_some())
            .finish()
    }
}

/// Fluent builder for [`HelperOptions`].
#[derive(Debug, Default)]
pub struct HelperOptionsBuilder {
    opts: HelperOptions,
}

impl HelperOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn command_options(mut self, command: CommandOptions) -> Self {
        self.opts.command = command;
        self
    }

    #[must_use]
    pub fn command_type(mut self, command_type: CommandType) -> Self {
        self.opts.command.command_type = command_type;
        self
    }

    #[must_use]
    pub fn command_timeout_secs(mut self, secs: u64) -> Self {
        self.opts.command.command_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn clear_parameters(mut self, clear: bool) -> Self {
        self.opts.command.clear_parameters = clear;
        self
    }

    #[must_use]
    pub fn dispose_policy(mut self, policy: DisposePolicy) -> Self {
        self.opts.command.dispose_policy = policy;
        self
    }

    #[must_use]
    pub fn logging(mut self, hooks: LogHooks) -> Self {
        self.opts.logging = hooks;
        self
    }

    /// Install an ambient source and turn auto-fill on.
    #[must_use]
    pub fn ambient_parameters(mut self, source: impl AmbientParameters + 'static) -> Self {
        self.opts.ambient = Some(Box::new(source));
        self.opts.command.auto_fill_ambient_parameters = true;
        self
    }

    #[must_use]
    pub fn auto_fill_ambient_parameters(mut self, enabled: bool) -> Self {
        self.opts.command.auto_fill_ambient_parameters = enabled;
        self
    }

    #[must_use]
    pub fn finish(self) -> HelperOptions {
        self.opts
    }
}
