use std::{
    error::Error,
    fmt::{Display, Formatter, Result as FmtResult},
    io::Error as IoError,
};

/// Errors surfaced by the permission algebra and its drivers.
#[derive(Debug)]
pub enum LensError {
    /// Both or neither of Resource/NotResource supplied, or an empty pattern
    /// list. Fatal to the calling pipeline.
    MalformedPermission(String),

    /// A permission with one effect was added to a set of the other effect.
    EffectMismatch {
        expected: crate::Effect,
        actual: crate::Effect,
    },

    InvalidAction(String),
    InvalidConditionOperator(String),
    InvalidPrincipal(String),
    InvalidStatement(String),
    InvalidConfig(String),

    /// A policy document referenced by metadata is absent from the store.
    /// Callers log this and treat the policy as empty.
    MissingPolicyDocument {
        account_id: String,
        arn: String,
        key: String,
    },

    /// The snapshot store failed to read or decode an entry.
    Store(String),
}

impl Display for LensError {
    fn fmt(&self, f: &mut Formatter) -> FmtResult {
        match self {
            Self::MalformedPermission(detail) => write!(f, "Malformed permission: {}", detail),
            Self::EffectMismatch {
                expected,
                actual,
            } => {
                write!(f, "Effect mismatch: expected {}, got {}", expected, actual)
            }
            Self::InvalidAction(action) => write!(f, "Invalid action: {}", action),
            Self::InvalidConditionOperator(op) => write!(f, "Invalid condition operator: {}", op),
            Self::InvalidPrincipal(principal) => write!(f, "Invalid principal: {}", principal),
            Self::InvalidStatement(detail) => write!(f, "Invalid statement: {}", detail),
            Self::InvalidConfig(detail) => write!(f, "Invalid configuration: {}", detail),
            Self::MissingPolicyDocument {
                account_id,
                arn,
                key,
            } => {
                write!(f, "Missing policy document: account {}, arn {}, key {}", account_id, arn, key)
            }
            Self::Store(detail) => write!(f, "Store error: {}", detail),
        }
    }
}

impl Error for LensError {}

impl From<IoError> for LensError {
    fn from(e: IoError) -> Self {
        Self::Store(e.to_string())
    }
}

impl From<serde_json::Error> for LensError {
    fn from(e: serde_json::Error) -> Self {
        Self::Store(e.to_string())
    }
}
