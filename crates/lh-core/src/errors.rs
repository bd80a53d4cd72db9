//! Structured error types shared across the worklist crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`LhError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (row index, wells, volumes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the operator resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the worklist executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum LhError {
    /// Malformed worklist input: missing columns, non-numeric volumes, bad well ids.
    #[error("parse error: {0}")]
    Parse(ErrorInfo),
    /// Requested work the configured instruments or labware cannot perform.
    #[error("configuration error: {0}")]
    Configuration(ErrorInfo),
    /// Failure reported by the robot runtime while executing a command.
    #[error("runtime error: {0}")]
    Runtime(ErrorInfo),
    /// Filesystem failures while reading inputs or writing artefacts.
    #[error("io error: {0}")]
    Io(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl LhError {
    /// Shorthand for a [`LhError::Parse`] with the given code and message.
    pub fn parse(code: impl Into<String>, message: impl Into<String>) -> Self {
        LhError::Parse(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`LhError::Configuration`] with the given code and message.
    pub fn configuration(code: impl Into<String>, message: impl Into<String>) -> Self {
        LhError::Configuration(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`LhError::Runtime`] with the given code and message.
    pub fn runtime(code: impl Into<String>, message: impl Into<String>) -> Self {
        LhError::Runtime(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`LhError::Io`] with the given code and message.
    pub fn io(code: impl Into<String>, message: impl Into<String>) -> Self {
        LhError::Io(ErrorInfo::new(code, message))
    }

    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            LhError::Parse(info)
            | LhError::Configuration(info)
            | LhError::Runtime(info)
            | LhError::Io(info) => info,
        }
    }

    fn info_mut(&mut self) -> &mut ErrorInfo {
        match self {
            LhError::Parse(info)
            | LhError::Configuration(info)
            | LhError::Runtime(info)
            | LhError::Io(info) => info,
        }
    }

    /// Short lowercase name of the error family.
    pub fn family(&self) -> &'static str {
        match self {
            LhError::Parse(_) => "parse",
            LhError::Configuration(_) => "configuration",
            LhError::Runtime(_) => "runtime",
            LhError::Io(_) => "io",
        }
    }

    /// Adds a context entry to the payload, keeping the family unchanged.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.info_mut().context.insert(key.into(), value.into());
        self
    }

    /// Sets the remediation hint on the payload.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.info_mut().hint = Some(hint.into());
        self
    }
}
