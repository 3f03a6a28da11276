//! Everything the worker owns between requests.

use chain_integration::{ContractArtifact, Transaction, VerificationKey};
use shared::{
    domain::PublicKey,
    error::{ApiException, ErrorCode},
    protocol::SerializedTransaction,
};
use url::Url;

/// Lifecycle of the single in-flight transaction: empty, built, proved, consumed.
#[derive(Debug, Clone, Default)]
pub enum TransactionSlot {
    #[default]
    Empty,
    Built(Transaction),
    Proved(Transaction),
    Consumed {
        transaction: Transaction,
        serialized: SerializedTransaction,
    },
}

impl TransactionSlot {
    pub fn phase(&self) -> &'static str {
        match self {
            TransactionSlot::Empty => "empty",
            TransactionSlot::Built(_) => "built",
            TransactionSlot::Proved(_) => "proved",
            TransactionSlot::Consumed { .. } => "consumed",
        }
    }

    pub fn transaction(&self) -> Option<&Transaction> {
        match self {
            TransactionSlot::Empty => None,
            TransactionSlot::Built(transaction)
            | TransactionSlot::Proved(transaction)
            | TransactionSlot::Consumed { transaction, .. } => Some(transaction),
        }
    }
}

#[derive(Debug, Default)]
pub struct WorkerState {
    pub network: Option<Url>,
    pub contract_class: Option<ContractArtifact>,
    pub verification_key: Option<VerificationKey>,
    pub instance: Option<PublicKey>,
    pub transaction: TransactionSlot,
}

impl WorkerState {
    pub fn require_network(&self) -> Result<&Url, ApiException> {
        self.network.as_ref().ok_or_else(|| {
            ApiException::new(ErrorCode::NetworkNotSelected, "no network has been selected")
        })
    }

    pub fn require_contract_class(&self) -> Result<&ContractArtifact, ApiException> {
        self.contract_class.as_ref().ok_or_else(|| {
            ApiException::new(ErrorCode::ContractNotLoaded, "contract has not been loaded")
        })
    }

    pub fn require_verification_key(&self) -> Result<&VerificationKey, ApiException> {
        self.verification_key.as_ref().ok_or_else(|| {
            ApiException::new(ErrorCode::ContractNotCompiled, "contract has not been compiled")
        })
    }

    pub fn require_instance(&self) -> Result<PublicKey, ApiException> {
        self.instance.ok_or_else(|| {
            ApiException::new(
                ErrorCode::ContractNotBound,
                "no contract instance is bound to an address",
            )
        })
    }
}
