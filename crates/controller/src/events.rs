//! Controller failures and their user-facing form.

use shared::{domain::DomainError, error::ErrorCode};
use thiserror::Error;
use worker::WorkerCallError;

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("no wallet provider is installed")]
    WalletMissing,
    #[error("wallet did not return any accounts")]
    NoWalletAccount,
    #[error("zkApp runtime has not finished setting up")]
    NotSetUp,
    #[error("no contract is attached")]
    NoContract,
    #[error("a transaction is already being created")]
    TransactionInFlight,
    #[error("invalid contract address '{input}': {source}")]
    InvalidAddress {
        input: String,
        #[source]
        source: DomainError,
    },
    #[error("wallet request failed: {0}")]
    Wallet(String),
    #[error(transparent)]
    Worker(#[from] WorkerCallError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Wallet,
    Network,
    Proof,
    Validation,
    /// Rejected by the chain: missing accounts, undeployed contracts, fee coverage.
    Chain,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    Setup,
    Funding,
    AttachContract,
    Deploy,
    SendTransaction,
    Refresh,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_ascii_lowercase();
        let category = if lower.contains("wallet") || lower.contains("fee payer") {
            UiErrorCategory::Wallet
        } else if lower.contains("proof") || lower.contains("proving") {
            UiErrorCategory::Proof
        } else if lower.contains("invalid")
            || lower.contains("missing")
            || lower.contains("malformed")
            || lower.contains("checksum")
        {
            UiErrorCategory::Validation
        } else if lower.contains("network")
            || lower.contains("connection")
            || lower.contains("timeout")
            || lower.contains("not running")
        {
            UiErrorCategory::Network
        } else if lower.contains("zkapp")
            || lower.contains("deployed")
            || lower.contains("nonce")
            || lower.contains("cannot cover")
            || lower.contains("does not exist")
        {
            UiErrorCategory::Chain
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn from_error(context: UiErrorContext, err: &ControllerError) -> Self {
        let category = match err {
            ControllerError::WalletMissing | ControllerError::NoWalletAccount => {
                UiErrorCategory::Wallet
            }
            // The wallet relays chain rejections too; only an unrecognised reason is its own.
            ControllerError::Wallet(reason) => match Self::from_message(context, reason.as_str())
                .category
            {
                UiErrorCategory::Unknown => UiErrorCategory::Wallet,
                category => category,
            },
            ControllerError::InvalidAddress { .. }
            | ControllerError::NoContract
            | ControllerError::NotSetUp
            | ControllerError::TransactionInFlight => UiErrorCategory::Validation,
            ControllerError::Worker(WorkerCallError::Disconnected) => UiErrorCategory::Network,
            ControllerError::Worker(call) => match call.code() {
                Some(ErrorCode::ProofFailed) => UiErrorCategory::Proof,
                Some(ErrorCode::InvalidArguments) => UiErrorCategory::Validation,
                Some(ErrorCode::NetworkNotSelected) => UiErrorCategory::Network,
                Some(code) if code.is_precondition() => UiErrorCategory::Validation,
                _ => return Self::from_message(context, err.to_string()),
            },
        };

        Self {
            category,
            context,
            message: err.to_string(),
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::{error::ApiError, protocol::OperationName};

    #[test]
    fn proof_failures_are_categorised_from_the_error_code() {
        let err = ControllerError::Worker(WorkerCallError::Operation {
            operation: OperationName::ProveTransaction,
            error: ApiError::new(ErrorCode::ProofFailed, "constraint unsatisfied"),
        });
        let ui = UiError::from_error(UiErrorContext::SendTransaction, &err);

        assert_eq!(ui.category(), UiErrorCategory::Proof);
        assert_eq!(ui.context(), UiErrorContext::SendTransaction);
        assert!(ui.message().contains("constraint unsatisfied"));
    }

    #[test]
    fn chain_failures_fall_back_to_message_classification() {
        let err = ControllerError::Worker(WorkerCallError::Operation {
            operation: OperationName::ReadNumber,
            error: ApiError::new(ErrorCode::Chain, "connection reset by peer"),
        });

        assert_eq!(
            UiError::from_error(UiErrorContext::Refresh, &err).category(),
            UiErrorCategory::Network
        );
    }

    #[test]
    fn wallet_rejection_is_a_wallet_error() {
        let ui = UiError::from_message(UiErrorContext::Deploy, "user rejected in wallet");
        assert_eq!(ui.category(), UiErrorCategory::Wallet);
    }

    #[test]
    fn worker_precondition_violations_are_validation_errors() {
        let err = ControllerError::Worker(WorkerCallError::Operation {
            operation: OperationName::BuildUpdateTransaction,
            error: ApiError::new(ErrorCode::ContractNotBound, "no contract instance is bound"),
        });

        assert_eq!(
            UiError::from_error(UiErrorContext::SendTransaction, &err).category(),
            UiErrorCategory::Validation
        );
    }

    #[test]
    fn chain_rejection_relayed_by_the_wallet_is_a_chain_error() {
        let err = ControllerError::Wallet("no zkApp deployed at B62qabc".into());
        let ui = UiError::from_error(UiErrorContext::SendTransaction, &err);

        assert_eq!(ui.category(), UiErrorCategory::Chain);
        assert_eq!(ui.message(), "wallet request failed: no zkApp deployed at B62qabc");

        let err = ControllerError::Wallet("user rejected the request".into());
        assert_eq!(
            UiError::from_error(UiErrorContext::Deploy, &err).category(),
            UiErrorCategory::Wallet
        );
    }
}
