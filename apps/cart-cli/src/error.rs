//! # CLI Error Type
//!
//! One error shape for every command failure.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  CoreError (bad --price, blank --id) ──► VALIDATION_ERROR              │
//! │  CartError::Config* ──────────────────► CONFIG_ERROR                   │
//! │  CartError::Storage ──────────────────► STORAGE_ERROR                  │
//! │  CartError::Usage ────────────────────► INTERNAL (CLI bug)             │
//! │                                                                         │
//! │  text mode:  "error: <message>" on stderr, exit code 1                 │
//! │  --json:     {"code":"CONFIG_ERROR","message":"..."} on stdout         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;

use gomarket_cart::CartError;
use gomarket_core::CoreError;

pub type CliResult<T> = Result<T, CliError>;

/// Error returned from a command.
///
/// ## Serialization
/// ```json
/// {
///   "code": "VALIDATION_ERROR",
///   "message": "price must not be negative"
/// }
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CliError {
    /// Machine-readable error code for scripts
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Command input rejected
    ValidationError,

    /// Config file unreadable or invalid
    ConfigError,

    /// Storage could not be opened or the change was not saved
    StorageError,

    /// Anything else
    Internal,
}

impl CliError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        CliError {
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::ValidationError, message)
    }

    pub fn storage(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::StorageError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CliError::new(ErrorCode::Internal, message)
    }

    /// JSON form for `--json` output.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| {
            format!(r#"{{"code":"INTERNAL","message":{:?}}}"#, self.message)
        })
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(e) => CliError::validation(e.to_string()),
            other => CliError::internal(other.to_string()),
        }
    }
}

impl From<CartError> for CliError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::Config(_) | CartError::ConfigLoadFailed(_) | CartError::ConfigSaveFailed(_) => {
                CliError::new(ErrorCode::ConfigError, err.to_string())
            }
            CartError::Storage(e) => {
                tracing::error!("Storage failed: {}", e);
                CliError::storage(e.to_string())
            }
            CartError::Usage(message) => CliError::internal(message),
        }
    }
}

impl From<serde_json::Error> for CliError {
    fn from(err: serde_json::Error) -> Self {
        CliError::internal(format!("Failed to render output: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gomarket_core::ProductDescriptor;

    #[test]
    fn test_validation_error_mapping() {
        let err: CliError = ProductDescriptor::new("a", "A", "", -1.0).unwrap_err().into();
        assert_eq!(err.code, ErrorCode::ValidationError);
    }

    #[test]
    fn test_cart_error_mapping() {
        let err: CliError = CartError::ConfigLoadFailed("bad toml".into()).into();
        assert_eq!(err.code, ErrorCode::ConfigError);

        let err: CliError = CartError::Usage("stale".into()).into();
        assert_eq!(err.code, ErrorCode::Internal);
    }

    #[test]
    fn test_json_shape() {
        let json = CliError::storage("disk full").to_json();
        assert_eq!(json, r#"{"code":"STORAGE_ERROR","message":"disk full"}"#);
    }
}
