use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnknownOperation,
    InvalidArguments,
    NetworkNotSelected,
    ContractNotLoaded,
    ContractNotCompiled,
    ContractNotBound,
    NoTransaction,
    InvalidTransactionState,
    Chain,
    ProofFailed,
    Internal,
}

impl ErrorCode {
    /// Codes raised when the caller violated an operation precondition, as opposed to a
    /// failure reported by the chain library.
    pub fn is_precondition(self) -> bool {
        matches!(
            self,
            ErrorCode::NetworkNotSelected
                | ErrorCode::ContractNotLoaded
                | ErrorCode::ContractNotCompiled
                | ErrorCode::ContractNotBound
                | ErrorCode::NoTransaction
                | ErrorCode::InvalidTransactionState
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
#[error("{code:?}: {message}")]
pub struct ApiException {
    pub code: ErrorCode,
    pub message: String,
}

impl ApiException {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl From<ApiException> for ApiError {
    fn from(value: ApiException) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}

impl From<ApiError> for ApiException {
    fn from(value: ApiError) -> Self {
        Self {
            code: value.code,
            message: value.message,
        }
    }
}
