//! Worker options.

use crate::error::DispatchError;
use fnworker_proto::DurationMs;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Prefix of every environment variable [`WorkerOptions::from_env`] reads.
pub const ENV_PREFIX: &str = "FNWORKER_";

/// Tunables for the dispatcher and its receive loop.
///
/// Every field has a default, so a partial JSON document deserializes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WorkerOptions {
    /// Identifier reported in logs.
    pub worker_id: String,
    /// Capacity of the inbound message channel.
    pub inbound_capacity: usize,
    /// Whether failure responses carry the error's source chain as a
    /// stack trace.
    pub include_stack_trace: bool,
    /// How long to wait for in-flight invocations when the inbound
    /// channel closes without a terminate message.
    pub shutdown_grace_period: DurationMs,
    /// Directory searched for metadata when a request names none.
    pub function_app_directory: String,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            worker_id: "fnworker".into(),
            inbound_capacity: 128,
            include_stack_trace: false,
            shutdown_grace_period: DurationMs::from_secs(5),
            function_app_directory: String::new(),
        }
    }
}

impl WorkerOptions {
    /// Defaults overlaid with `FNWORKER_*` environment variables.
    ///
    /// | Variable | Field |
    /// |----------|-------|
    /// | `FNWORKER_WORKER_ID` | `worker_id` |
    /// | `FNWORKER_INBOUND_CAPACITY` | `inbound_capacity` |
    /// | `FNWORKER_INCLUDE_STACK_TRACE` | `include_stack_trace` |
    /// | `FNWORKER_SHUTDOWN_GRACE_MS` | `shutdown_grace_period` |
    /// | `FNWORKER_FUNCTION_APP_DIRECTORY` | `function_app_directory` |
    pub fn from_env() -> Result<Self, DispatchError> {
        Self::default().overlay(|name| std::env::var(name).ok())
    }

    /// Overlay values returned by `lookup`, which is given full variable
    /// names. Unset variables leave the field alone.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self, DispatchError> {
        let var = |suffix: &str| {
            let name = format!("{ENV_PREFIX}{suffix}");
            lookup(&name).map(|value| (name, value))
        };

        if let Some((_, value)) = var("WORKER_ID") {
            self.worker_id = value;
        }
        if let Some((name, value)) = var("INBOUND_CAPACITY") {
            self.inbound_capacity = parse(&name, &value)?;
            if self.inbound_capacity == 0 {
                return Err(DispatchError::Config {
                    var: name,
                    reason: "must be greater than zero".into(),
                });
            }
        }
        if let Some((name, value)) = var("INCLUDE_STACK_TRACE") {
            self.include_stack_trace = parse_flag(&name, &value)?;
        }
        if let Some((name, value)) = var("SHUTDOWN_GRACE_MS") {
            self.shutdown_grace_period = DurationMs::from_millis(parse(&name, &value)?);
        }
        if let Some((_, value)) = var("FUNCTION_APP_DIRECTORY") {
            self.function_app_directory = value;
        }
        Ok(self)
    }
}

fn parse<T>(name: &str, value: &str) -> Result<T, DispatchError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse().map_err(|e: T::Err| DispatchError::Config {
        var: name.to_string(),
        reason: e.to_string(),
    })
}

fn parse_flag(name: &str, value: &str) -> Result<bool, DispatchError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(DispatchError::Config {
            var: name.to_string(),
            reason: format!("expected a boolean, got '{other}'"),
        }),
    }
}
