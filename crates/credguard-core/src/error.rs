//! Shared error type across credguard crates.

use thiserror::Error;

/// Machine-readable error codes (stable API, used in reports and HTTP bodies).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    /// Configuration rejected at submit/load time.
    InvalidConfig,
    /// A rule pattern is not a valid regular expression.
    InvalidPattern,
    /// Credential identity could not be determined.
    MissingIdentity,
    /// Unsupported configuration version.
    UnsupportedVersion,
    /// Usage or rule persistence failed.
    Persistence,
    /// Stopping a run failed.
    Cancellation,
    /// Internal error.
    Internal,
}

impl ErrorCode {
    /// String representation used in JSON responses.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidConfig => "INVALID_CONFIG",
            ErrorCode::InvalidPattern => "INVALID_PATTERN",
            ErrorCode::MissingIdentity => "MISSING_IDENTITY",
            ErrorCode::UnsupportedVersion => "UNSUPPORTED_VERSION",
            ErrorCode::Persistence => "PERSISTENCE",
            ErrorCode::Cancellation => "CANCELLATION",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, CredGuardError>;

/// Unified error type used by core and engine.
#[derive(Debug, Error)]
pub enum CredGuardError {
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    #[error("invalid pattern for rule {rule}: {reason}")]
    InvalidPattern { rule: String, reason: String },
    #[error("credential identity could not be determined")]
    MissingIdentity,
    #[error("unsupported config version")]
    UnsupportedVersion,
    #[error("persistence: {0}")]
    Persistence(String),
    #[error("cancellation: {0}")]
    Cancellation(String),
    #[error("internal: {0}")]
    Internal(String),
}

impl CredGuardError {
    /// Map internal error to a stable code.
    pub fn code(&self) -> ErrorCode {
        match self {
            CredGuardError::InvalidConfig(_) => ErrorCode::InvalidConfig,
            CredGuardError::InvalidPattern { .. } => ErrorCode::InvalidPattern,
            CredGuardError::MissingIdentity => ErrorCode::MissingIdentity,
            CredGuardError::UnsupportedVersion => ErrorCode::UnsupportedVersion,
            CredGuardError::Persistence(_) => ErrorCode::Persistence,
            CredGuardError::Cancellation(_) => ErrorCode::Cancellation,
            CredGuardError::Internal(_) => ErrorCode::Internal,
        }
    }

    /// True for errors raised while validating configuration.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::InvalidConfig | ErrorCode::InvalidPattern | ErrorCode::UnsupportedVersion
        )
    }
}
