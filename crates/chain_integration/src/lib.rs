//! Boundaries to the external collaborators: the zkApp chain library and the browser
//! wallet. The worker and controller only ever see these traits.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{Amount, PrivateKey, PublicKey, TxHash},
    protocol::{AccountStatus, SerializedTransaction},
};
use url::Url;

pub mod local;
pub mod transaction;

pub use local::{LocalNetwork, LocalWallet};
pub use transaction::{ContractArtifact, ContractCall, Proof, Transaction, VerificationKey};

#[async_trait]
pub trait ZkappBackend: Send + Sync {
    /// Makes `endpoint` the active chain instance for every later call.
    async fn connect(&self, endpoint: &Url) -> Result<()>;
    async fn fetch_account(&self, address: &PublicKey) -> Result<AccountStatus>;
    async fn load_contract(&self) -> Result<ContractArtifact>;
    async fn compile(&self, artifact: &ContractArtifact) -> Result<VerificationKey>;
    async fn prove(
        &self,
        verification_key: &VerificationKey,
        transaction: &Transaction,
    ) -> Result<Proof>;
    async fn read_number(&self, contract: &PublicKey) -> Result<u64>;

    /// Deployment funds the new contract account from `fee_payer` and is authorized by
    /// the contract's own key.
    async fn build_deploy(
        &self,
        verification_key: &VerificationKey,
        contract_key: &PrivateKey,
        fee_payer: &PublicKey,
    ) -> Result<Transaction> {
        let mut transaction = Transaction::deploy(
            contract_key.to_public_key(),
            verification_key.clone(),
            *fee_payer,
        );
        transaction.sign(contract_key);
        Ok(transaction)
    }

    async fn build_update(&self, contract: &PublicKey) -> Result<Transaction> {
        Ok(Transaction::update(*contract))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePayerOptions {
    pub fee: Amount,
    pub memo: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTransactionRequest {
    pub transaction: SerializedTransaction,
    pub fee_payer: FeePayerOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTransactionReceipt {
    pub hash: TxHash,
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn request_accounts(&self) -> Result<Vec<PublicKey>>;
    async fn request_network(&self) -> Result<String>;
    async fn send_transaction(
        &self,
        request: SendTransactionRequest,
    ) -> Result<SendTransactionReceipt>;
}
