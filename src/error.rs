use std::io;
use thiserror::Error;

/// Failure raised while expanding a template.
///
/// Every variant carries the original template untouched, so callers can fall
/// back to it without keeping their own copy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// A `}` that neither closes a placeholder nor is escaped as `}}`
    #[error("string [{template}] has an unbalanced '}}' at byte {position}")]
    UnbalancedBrace { template: String, position: usize },

    /// The template ended inside a placeholder or its time-format spec
    #[error("string [{template}] ends inside a placeholder opened at byte {position}")]
    TruncatedPlaceholder { template: String, position: usize },

    /// The byte after `{` cannot start a selector in the active mode
    #[error("string [{template}] has an invalid placeholder selector at byte {position}")]
    MalformedSelector { template: String, position: usize },

    /// The placeholder body is not followed by the expected `}`
    #[error("string [{template}] has a malformed placeholder at byte {position}")]
    MalformedPlaceholder { template: String, position: usize },

    /// Positional selector past the end of the value list
    #[error("string [{template}] references index {index} but only {len} values were given")]
    IndexOutOfRange {
        template: String,
        index: usize,
        len: usize,
    },

    /// Named selector missing from the value mapping
    #[error("string [{template}] could not find key [{key}] in args")]
    KeyNotFound { template: String, key: String },

    /// A time-format spec was given but the value is not a reference timestamp
    #[error("time format [{time_format}] cannot be applied to value [{value}]")]
    InvalidTimeValue {
        template: String,
        value: String,
        time_format: String,
    },
}

/// Fieldless discriminant of [`FormatError`], handy for matching in callers
/// that don't care about the details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnbalancedBrace,
    TruncatedPlaceholder,
    MalformedSelector,
    MalformedPlaceholder,
    IndexOutOfRange,
    KeyNotFound,
    InvalidTimeValue,
}

impl FormatError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::UnbalancedBrace { .. } => ErrorKind::UnbalancedBrace,
            Self::TruncatedPlaceholder { .. } => ErrorKind::TruncatedPlaceholder,
            Self::MalformedSelector { .. } => ErrorKind::MalformedSelector,
            Self::MalformedPlaceholder { .. } => ErrorKind::MalformedPlaceholder,
            Self::IndexOutOfRange { .. } => ErrorKind::IndexOutOfRange,
            Self::KeyNotFound { .. } => ErrorKind::KeyNotFound,
            Self::InvalidTimeValue { .. } => ErrorKind::InvalidTimeValue,
        }
    }

    /// The template the failed expansion was given
    #[must_use]
    pub fn template(&self) -> &str {
        match self {
            Self::UnbalancedBrace { template, .. }
            | Self::TruncatedPlaceholder { template, .. }
            | Self::MalformedSelector { template, .. }
            | Self::MalformedPlaceholder { template, .. }
            | Self::IndexOutOfRange { template, .. }
            | Self::KeyNotFound { template, .. }
            | Self::InvalidTimeValue { template, .. } => template,
        }
    }

    #[must_use]
    pub fn into_template(self) -> String {
        match self {
            Self::UnbalancedBrace { template, .. }
            | Self::TruncatedPlaceholder { template, .. }
            | Self::MalformedSelector { template, .. }
            | Self::MalformedPlaceholder { template, .. }
            | Self::IndexOutOfRange { template, .. }
            | Self::KeyNotFound { template, .. }
            | Self::InvalidTimeValue { template, .. } => template,
        }
    }
}

/// Main error type for strfmt operations outside the engine itself
#[derive(Error, Debug)]
pub enum StrfmtError {
    /// Template expansion failed
    #[error(transparent)]
    Format(#[from] FormatError),

    /// IO error when reading templates or writing output
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A `KEY=VALUE` binding without `=` or with an empty key
    #[error("Invalid binding (expected KEY=VALUE): {binding}")]
    InvalidBinding { binding: String },

    /// No template was supplied on the command line, from a file or the environment
    #[error("No template given")]
    MissingTemplate,

    /// `--mode` names a selector mode the supplied values cannot serve
    #[error("--mode {mode} cannot be used with {values}")]
    ModeMismatch {
        mode: &'static str,
        values: &'static str,
    },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StrfmtError>;
