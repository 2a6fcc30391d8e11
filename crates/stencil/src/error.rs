//! Error types and engine status mapping

use std::fmt;

use thiserror::Error;

/// Status codes reported by the engine boundary.
///
/// This is a closed set: every engine operation reports exactly one of
/// these, and every non-`Ok` status is paired with a diagnostic string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum Status {
    /// Success
    Ok = 0,
    /// Unclassified failure
    Error = 1,
    /// Bad input shape (null pointer, disposed handle, ...)
    InvalidArgument = 2,
    /// Resource exhaustion
    AllocationFailed = 3,
    /// Malformed JSON payload
    JsonParse = 4,
    /// Evaluation-time template failure
    TemplateRender = 5,
    /// Structural misuse of a value
    OperationFailed = 6,
    /// Malformed template source
    TemplateParse = 7,
}

impl Status {
    /// Numeric code of this status.
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Look up a status by its numeric code.
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Status::Ok),
            1 => Some(Status::Error),
            2 => Some(Status::InvalidArgument),
            3 => Some(Status::AllocationFailed),
            4 => Some(Status::JsonParse),
            5 => Some(Status::TemplateRender),
            6 => Some(Status::OperationFailed),
            7 => Some(Status::TemplateParse),
            _ => None,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// The kind of handle an operation was attempted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    /// A [`Value`](crate::Value) handle
    Value,
    /// A [`RenderContext`](crate::RenderContext) handle
    Context,
    /// A [`Template`](crate::Template) handle
    Template,
}

impl fmt::Display for HandleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandleKind::Value => write!(f, "value"),
            HandleKind::Context => write!(f, "context"),
            HandleKind::Template => write!(f, "template"),
        }
    }
}

/// Main error type for stencil operations.
///
/// Engine-derived variants carry the operation that failed and the
/// diagnostic text reported by the engine.
#[derive(Error, Debug)]
pub enum StencilError {
    /// Unclassified engine failure
    #[error("{operation} failed. Code: 1. Details: {message}")]
    Generic {
        /// Operation that failed
        operation: &'static str,
        /// Diagnostic text
        message: String,
    },

    /// Bad input shape, e.g. a disposed root or an out-of-range integer
    #[error("{operation} failed. Code: 2. Details: {message}")]
    InvalidArgument {
        /// Operation that failed
        operation: &'static str,
        /// Diagnostic text
        message: String,
    },

    /// Resource exhaustion on the engine side
    #[error("{operation} failed. Code: 3. Details: {message}")]
    Allocation {
        /// Operation that failed
        operation: &'static str,
        /// Diagnostic text
        message: String,
    },

    /// Malformed JSON payload
    #[error("{operation} failed. Code: 4. Details: {message}")]
    Json {
        /// Operation that failed
        operation: &'static str,
        /// Diagnostic text
        message: String,
    },

    /// Evaluation-time template failure
    #[error("{operation} failed. Code: 5. Details: {message}")]
    Render {
        /// Operation that failed
        operation: &'static str,
        /// Diagnostic text
        message: String,
    },

    /// Structural misuse, e.g. `add` on an object
    #[error("{operation} failed. Code: 6. Details: {message}")]
    Operation {
        /// Operation that failed
        operation: &'static str,
        /// Diagnostic text
        message: String,
    },

    /// Malformed template source
    #[error("{operation} failed. Code: 7. Details: {message}")]
    Parse {
        /// Operation that failed
        operation: &'static str,
        /// Diagnostic text
        message: String,
    },

    /// Use of a handle after it was released
    #[error("cannot use {handle}: handle has been disposed")]
    Disposed {
        /// Which handle was used
        handle: HandleKind,
    },

    /// Host data nested deeper than the builder allows
    #[error("value nesting exceeds the maximum depth of {limit}")]
    DepthExceeded {
        /// Configured depth limit
        limit: usize,
    },

    /// Host data refers back to a value that is still being converted
    #[error("cycle detected while converting `{type_name}`")]
    Cycle {
        /// Type of the shared pointer that closed the cycle
        type_name: &'static str,
    },

    /// A record member could not be read and the field policy is `Fail`
    #[error("field `{field}` could not be read: {reason}")]
    UnreadableField {
        /// Emitted key of the field
        field: String,
        /// Cause reported by the accessor
        reason: String,
    },
}

impl StencilError {
    /// Translate an engine status and its diagnostic into a typed error.
    ///
    /// `Status::Ok` is not an error; it maps to `Generic` so a caller that
    /// misroutes a success still gets a readable message.
    pub fn from_status(
        status: Status,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        let message = message.into();
        match status {
            Status::InvalidArgument => StencilError::InvalidArgument { operation, message },
            Status::AllocationFailed => StencilError::Allocation { operation, message },
            Status::JsonParse => StencilError::Json { operation, message },
            Status::TemplateRender => StencilError::Render { operation, message },
            Status::TemplateParse => StencilError::Parse { operation, message },
            Status::OperationFailed => StencilError::Operation { operation, message },
            Status::Ok | Status::Error => StencilError::Generic { operation, message },
        }
    }

    /// Shorthand for an operation error raised on the Rust side.
    pub(crate) fn operation(operation: &'static str, message: impl Into<String>) -> Self {
        StencilError::Operation {
            operation,
            message: message.into(),
        }
    }

    /// Shorthand for an invalid-argument error raised on the Rust side.
    pub(crate) fn invalid_argument(operation: &'static str, message: impl Into<String>) -> Self {
        StencilError::InvalidArgument {
            operation,
            message: message.into(),
        }
    }

    /// The status code this error reports across the boundary.
    pub fn status(&self) -> Status {
        match self {
            StencilError::Generic { .. } => Status::Error,
            StencilError::InvalidArgument { .. } => Status::InvalidArgument,
            StencilError::Allocation { .. } => Status::AllocationFailed,
            StencilError::Json { .. } => Status::JsonParse,
            StencilError::Render { .. } => Status::TemplateRender,
            StencilError::Operation { .. } => Status::OperationFailed,
            StencilError::Parse { .. } => Status::TemplateParse,
            StencilError::Disposed { .. } => Status::InvalidArgument,
            StencilError::Cycle { .. } => Status::InvalidArgument,
            StencilError::DepthExceeded { .. } => Status::Error,
            StencilError::UnreadableField { .. } => Status::Error,
        }
    }

    /// Numeric status code, see [`Status::code`].
    pub fn code(&self) -> i32 {
        self.status().code()
    }

    /// The diagnostic detail without the operation prefix.
    pub fn message(&self) -> String {
        match self {
            StencilError::Generic { message, .. }
            | StencilError::InvalidArgument { message, .. }
            | StencilError::Allocation { message, .. }
            | StencilError::Json { message, .. }
            | StencilError::Render { message, .. }
            | StencilError::Operation { message, .. }
            | StencilError::Parse { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Check if this is a disposed-handle error.
    pub fn is_disposed(&self) -> bool {
        matches!(self, StencilError::Disposed { .. })
    }
}

/// Result type alias for stencil operations
pub type Result<T> = std::result::Result<T, StencilError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_round_trip() {
        for code in 0..8 {
            let status = Status::from_code(code).unwrap();
            assert_eq!(status.code(), code);
        }
        assert_eq!(Status::from_code(8), None);
        assert_eq!(Status::from_code(-1), None);
    }

    #[test]
    fn test_from_status_picks_variant() {
        let err =
            StencilError::from_status(Status::JsonParse, "Rendering", "ERROR: JSON parse error");
        assert!(matches!(err, StencilError::Json { .. }));
        assert_eq!(err.status(), Status::JsonParse);

        let err = StencilError::from_status(Status::TemplateParse, "Parsing template", "bad");
        assert!(matches!(err, StencilError::Parse { .. }));

        let err = StencilError::from_status(Status::Error, "Anything", "bad");
        assert!(matches!(err, StencilError::Generic { .. }));
    }

    #[test]
    fn test_display_includes_code_and_details() {
        let err = StencilError::from_status(
            Status::OperationFailed,
            "Adding element to array",
            "not an array",
        );
        assert_eq!(
            err.to_string(),
            "Adding element to array failed. Code: 6. Details: not an array"
        );
        assert_eq!(err.message(), "not an array");
    }

    #[test]
    fn test_disposed_maps_to_invalid_argument() {
        let err = StencilError::Disposed {
            handle: HandleKind::Template,
        };
        assert_eq!(err.status(), Status::InvalidArgument);
        assert!(err.is_disposed());
        assert_eq!(err.to_string(), "cannot use template: handle has been disposed");
    }
}
