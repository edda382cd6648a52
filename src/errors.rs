//! Error types shared by the bridge, the simulated host and the config layer.

use std::path::PathBuf;
use thiserror::Error;

/// An error raised on the host side, as observed by host-level code once the
/// transfer reaches a top-level or `tryCatch` context.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Error{}: {message}", in_call(.call))]
pub struct HostError {
    pub message: String,
    /// Innermost host function active when the error was raised.
    pub call: Option<String>,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            call: None,
        }
    }

    pub fn with_call(mut self, call: impl Into<String>) -> Self {
        self.call = Some(call.into());
        self
    }
}

fn in_call(call: &Option<String>) -> String {
    match call {
        Some(call) => format!(" in {}()", call),
        None => String::new(),
    }
}

/// A native-side failure the host never knew about.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{description}")]
pub struct NativeFault {
    description: String,
}

impl NativeFault {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
        }
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Host-facing message, e.g. `A native exception occurred: bad alloc`.
    pub fn report(&self, prefix: &str) -> String {
        format!("{}: {}", prefix, self.description)
    }
}

/// Registry failures when loading or resolving native routines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RoutineError {
    #[error("could not find native routine '{name}'")]
    NotFound { name: String },
    #[error("Incorrect number of arguments ({got}), expecting {expected} for '{name}'")]
    Arity {
        name: String,
        expected: usize,
        got: usize,
    },
    #[error("native routine '{name}' is already registered")]
    Duplicate { name: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}
