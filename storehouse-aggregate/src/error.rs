//! Error types for aggregation building and execution.
//!
//! Every failure carries an [`ErrorCode`] for programmatic handling and,
//! where one is known, the pipeline operation that caused it.
//!
//! # Error Codes
//!
//! Error codes follow a pattern: A{category}{number}
//! - 1xxx: Stage application errors (failed stage, unknown verb, bad argument)
//! - 2xxx: Cursor errors (iteration failure, closed cursor)
//! - 3xxx: Counting errors (replay failure, nested count)
//! - 4xxx: Binding errors
//! - 5xxx: Backend errors
//! - 9xxx: Internal errors
//!
//! ```rust
//! use storehouse_aggregate::{AggregateError, ErrorCode};
//!
//! let err = AggregateError::unbound();
//! assert_eq!(err.code, ErrorCode::Unbound);
//! assert!(err.to_string().starts_with("[A4001]"));
//! ```

use std::fmt;

use smol_str::SmolStr;
use thiserror::Error;

/// Result type for aggregation operations.
pub type AggregateResult<T> = Result<T, AggregateError>;

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Stage application errors (1xxx)
    /// A stage could not be applied to the executor (A1001).
    StageFailed = 1001,
    /// The verb name is not a known operation (A1002).
    UnknownOperation = 1002,
    /// The operation exists but is not a pipeline stage (A1003).
    NotAStage = 1003,
    /// A stage received an argument of the wrong shape (A1004).
    InvalidArgument = 1004,

    // Cursor errors (2xxx)
    /// The cursor failed while being drained (A2001).
    CursorFailed = 2001,
    /// The cursor was used after it was closed (A2002).
    CursorClosed = 2002,

    // Counting errors (3xxx)
    /// A recorded stage failed when replayed on a fresh executor (A3001).
    ReplayFailed = 3001,
    /// Counting over a chain that already ends in a count (A3002).
    NestedCount = 3002,

    // Binding errors (4xxx)
    /// No data source is bound to the executor (A4001).
    Unbound = 4001,

    // Backend errors (5xxx)
    /// The underlying database reported an error (A5001).
    Backend = 5001,

    // Internal errors (9xxx)
    /// Internal error (A9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "A1001").
    pub fn code(&self) -> String {
        format!("A{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::StageFailed => "Stage application failed",
            Self::UnknownOperation => "Unknown operation",
            Self::NotAStage => "Operation is not a pipeline stage",
            Self::InvalidArgument => "Invalid stage argument",
            Self::CursorFailed => "Cursor iteration failed",
            Self::CursorClosed => "Cursor already closed",
            Self::ReplayFailed => "Stage replay failed",
            Self::NestedCount => "Nested count is not supported",
            Self::Unbound => "No data source bound",
            Self::Backend => "Backend error",
            Self::Internal => "Internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors that can occur while building or executing an aggregation.
#[derive(Error, Debug)]
pub struct AggregateError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// The operation involved, if any.
    pub operation: Option<SmolStr>,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl AggregateError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            operation: None,
            source: None,
        }
    }

    /// Set the operation involved.
    pub fn with_operation(mut self, operation: impl Into<SmolStr>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Constructor Functions ==============

    /// Create a stage application error.
    pub fn stage(operation: impl Into<SmolStr>, message: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::new(
            ErrorCode::StageFailed,
            format!("failed to apply '{}': {}", operation, message.into()),
        )
        .with_operation(operation)
    }

    /// Create an unknown operation error.
    pub fn unknown_operation(name: &str) -> Self {
        Self::new(
            ErrorCode::UnknownOperation,
            format!("'{}' is not a known aggregation operation", name),
        )
        .with_operation(name)
    }

    /// Create an error for a non-stage operation routed through the stage path.
    pub fn not_a_stage(operation: impl Into<SmolStr>) -> Self {
        let operation = operation.into();
        Self::new(
            ErrorCode::NotAStage,
            format!("'{}' is not a pipeline stage and cannot be recorded", operation),
        )
        .with_operation(operation)
    }

    /// Create an invalid argument error.
    pub fn invalid_argument(operation: impl Into<SmolStr>, message: impl Into<String>) -> Self {
        let operation = operation.into();
        Self::new(
            ErrorCode::InvalidArgument,
            format!("invalid argument for '{}': {}", operation, message.into()),
        )
        .with_operation(operation)
    }

    /// Create a cursor iteration error.
    pub fn cursor(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CursorFailed, message)
    }

    /// Create an error for use of a closed cursor.
    pub fn cursor_closed() -> Self {
        Self::new(ErrorCode::CursorClosed, "cursor has already been closed")
    }

    /// Wrap a failure raised while replaying a recorded stage.
    pub fn replay(operation: impl Into<SmolStr>, cause: AggregateError) -> Self {
        let operation = operation.into();
        Self::new(
            ErrorCode::ReplayFailed,
            format!("replaying '{}' on a fresh executor failed: {}", operation, cause),
        )
        .with_operation(operation)
        .with_source(cause)
    }

    /// Create a nested count error.
    pub fn nested_count() -> Self {
        Self::new(
            ErrorCode::NestedCount,
            "cannot count documents of a pipeline that already contains a count stage",
        )
        .with_operation("countDocuments")
    }

    /// Create an error for execution without a bound data source.
    pub fn unbound() -> Self {
        Self::new(
            ErrorCode::Unbound,
            "no data source is bound; call set_model() before executing",
        )
    }

    /// Create a backend error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Backend, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }

    // ============== Predicates ==============

    /// Check if this is a stage application error.
    pub fn is_stage_failure(&self) -> bool {
        matches!(
            self.code,
            ErrorCode::StageFailed | ErrorCode::InvalidArgument
        )
    }

    /// Check if this error came from a cursor.
    pub fn is_cursor_failure(&self) -> bool {
        matches!(self.code, ErrorCode::CursorFailed | ErrorCode::CursorClosed)
    }

    /// Check if this is a replay failure.
    pub fn is_replay_failure(&self) -> bool {
        self.code == ErrorCode::ReplayFailed
    }

    /// Check if this is a binding misuse.
    pub fn is_unbound(&self) -> bool {
        self.code == ErrorCode::Unbound
    }
}
