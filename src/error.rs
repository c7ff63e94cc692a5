use std::num::ParseIntError;

use thiserror::Error;

/// A non blank line that does not follow the `<number>.<text>` grammar.
///
/// Errors of this type abort a sort. They usually reach the caller wrapped in
/// an [anyhow::Error] with file and line context, use
/// `error.downcast_ref::<FormatError>()` to detect them.
#[derive(Debug, Error)]
pub enum FormatError {
    #[error("missing '.' separator, line: '{line}'")]
    MissingSeparator { line: String },
    #[error("nothing follows the '.' separator, line: '{line}'")]
    EmptyText { line: String },
    #[error("invalid number '{number}', line: '{line}'")]
    InvalidNumber {
        line: String,
        number: String,
        #[source]
        source: ParseIntError,
    },
}

/// Rejected engine settings
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("max lines in memory must be at least 1")]
    MaxLinesInMemory,
    #[error("group size must be at least 2, got {0}")]
    GroupSize(usize),
    #[error("target size must be a positive number of MB")]
    TargetSize,
}
