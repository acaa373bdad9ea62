//! Error types for the audit.
//!
//! Every failure is classified as a connection problem, a malformed reply, or
//! an undecodable key. Where the error happened decides how fatal it is: during
//! the topology read it aborts the run, during a master scan it only ends that
//! master's scan.

use fred::error::ErrorKind;
use serde::Serialize;
use thiserror::Error;

use crate::client::ValkeyError;

/// Error type for audit operations
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum AuditError {
    /// A node could not be reached or the connection broke
    #[error("Connection error: {0}")]
    Connection(String),

    /// A reply did not have the expected shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A key could not be decoded as UTF-8
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// The run was cancelled before this work finished
    #[error("Cancelled")]
    Cancelled,
}

impl AuditError {
    /// Check if this error is a connectivity failure
    pub fn is_connection(&self) -> bool {
        matches!(self, AuditError::Connection(_))
    }

    /// Short machine-friendly name, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            AuditError::Connection(_) => "connection",
            AuditError::Protocol(_) => "protocol",
            AuditError::Encoding(_) => "encoding",
            AuditError::Cancelled => "cancelled",
        }
    }
}

impl From<ValkeyError> for AuditError {
    fn from(err: ValkeyError) -> Self {
        match err {
            ValkeyError::Connection(msg) | ValkeyError::InvalidConfig(msg) => {
                AuditError::Connection(msg)
            }
            ValkeyError::Parse(e) => AuditError::Protocol(e.to_string()),
            ValkeyError::Valkey(e) => match e.kind() {
                ErrorKind::Protocol | ErrorKind::Parse | ErrorKind::InvalidCommand => {
                    AuditError::Protocol(e.to_string())
                }
                ErrorKind::Canceled => AuditError::Cancelled,
                _ => AuditError::Connection(e.to_string()),
            },
        }
    }
}
