//! Error types for credential loading and command execution

use thiserror::Error;

/// Result type for command execution
pub type CommandResult<T> = Result<T, CommandError>;

/// Errors raised while turning a PEM credential into a [`KeyHandle`](crate::KeyHandle)
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// Input is not a PEM block, or the DER inside it does not parse
    #[error("invalid private key: expected PEM encoding ({0})")]
    InvalidCredentialFormat(String),

    /// PKCS#8 container holds something other than an elliptic curve key
    #[error("invalid private key: only elliptic curve keys supported (got algorithm {0})")]
    UnsupportedKeyAlgorithm(String),

    /// Elliptic curve key on a curve other than NIST P-256
    #[error("invalid private key: only NIST-P256 keys supported (got curve {0})")]
    UnsupportedCurve(String),
}

/// Errors raised by a single `run_command` invocation.
///
/// Every variant is terminal for that invocation; nothing is retried.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Connector could not be opened (vehicle not discoverable, link error)
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Connect handshake with the vehicle failed
    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    /// Authenticated session could not be started or resumed
    #[error("Session start failed: {0}")]
    SessionStartFailed(String),

    /// Vehicle did not perform the requested action
    #[error("{action} failed: {message}")]
    ActionFailed {
        /// Action name, e.g. `unlock`
        action: &'static str,
        /// Message reported by the session client
        message: String,
    },

    /// Command deadline expired
    #[error("Command timed out after {timeout_secs}s during {step}")]
    Timeout {
        /// Lifecycle step that was running when the deadline expired
        step: &'static str,
        /// Configured command timeout
        timeout_secs: u64,
    },
}

impl CommandError {
    /// Short machine-readable classification, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            CommandError::ConnectionFailed(_) => "connection_failed",
            CommandError::HandshakeFailed(_) => "handshake_failed",
            CommandError::SessionStartFailed(_) => "session_start_failed",
            CommandError::ActionFailed { .. } => "action_failed",
            CommandError::Timeout { .. } => "timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_error_keeps_original_prefix() {
        let err = KeyError::UnsupportedCurve("1.3.132.0.34".to_string());
        assert!(err.to_string().starts_with("invalid private key: "));
    }

    #[test]
    fn test_action_failed_names_action() {
        let err = CommandError::ActionFailed {
            action: "unlock",
            message: "vehicle busy".to_string(),
        };
        assert_eq!(err.to_string(), "unlock failed: vehicle busy");
        assert_eq!(err.kind(), "action_failed");
    }
}
