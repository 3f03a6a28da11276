//! In-process ledger and wallet. Proofs are digests over the verification key and the
//! call commitment, so the full deploy / prove / submit flow runs without a node.

use std::{collections::HashMap, sync::Arc, time::Duration};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use shared::{
    domain::{encode_base58_check, Amount, PrivateKey, PublicKey, TxHash},
    protocol::AccountStatus,
};
use tokio::sync::Mutex;
use tracing::{debug, info};
use url::Url;

use crate::{
    transaction::{ContractArtifact, ContractCall, Proof, Transaction, VerificationKey},
    SendTransactionReceipt, SendTransactionRequest, WalletProvider, ZkappBackend,
};

pub const CONTRACT_NAME: &str = "Add";
const CONTRACT_METHODS: [&str; 2] = ["init", "update"];
pub const ACCOUNT_CREATION_FEE: Amount = Amount::from_mina(1);
pub const INITIAL_NUMBER: u64 = 1;
pub const UPDATE_INCREMENT: u64 = 2;
const TX_HASH_VERSION: u8 = 0x12;

#[derive(Debug, Clone)]
struct ZkappAccount {
    verification_key: VerificationKey,
    number: u64,
}

#[derive(Debug, Clone, Default)]
struct LedgerAccount {
    balance: Amount,
    nonce: u32,
    zkapp: Option<ZkappAccount>,
}

#[derive(Default)]
struct LedgerState {
    endpoint: Option<Url>,
    accounts: HashMap<PublicKey, LedgerAccount>,
    applied: Vec<TxHash>,
}

#[derive(Clone)]
pub struct LocalNetwork {
    name: String,
    proving_delay: Duration,
    ledger: Arc<Mutex<LedgerState>>,
}

impl LocalNetwork {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            proving_delay: Duration::ZERO,
            ledger: Arc::new(Mutex::new(LedgerState::default())),
        }
    }

    pub fn with_proving_delay(mut self, delay: Duration) -> Self {
        self.proving_delay = delay;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Faucet: creates the account if needed and credits it.
    pub async fn fund(&self, address: &PublicKey, amount: Amount) -> Result<Amount> {
        let mut ledger = self.ledger.lock().await;
        let account = ledger.accounts.entry(*address).or_default();
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| anyhow!("balance overflow for {address}"))?;
        info!(%address, %amount, "local faucet funded account");
        Ok(account.balance)
    }

    pub async fn applied_transactions(&self) -> Vec<TxHash> {
        self.ledger.lock().await.applied.clone()
    }

    pub async fn submit(&self, transaction: &Transaction, fee: Amount, memo: &str) -> Result<TxHash> {
        let fee_payer = transaction.verify_fee_payer(fee, memo)?;
        let mut ledger = self.ledger.lock().await;

        let payer = ledger
            .accounts
            .get(&fee_payer)
            .cloned()
            .ok_or_else(|| anyhow!("fee payer {fee_payer} does not exist"))?;

        let (charge, contract_update) = match &transaction.call {
            ContractCall::Deploy {
                contract,
                verification_key,
                fund_new_account,
            } => {
                let existing = ledger.accounts.get(contract);
                if existing.is_some_and(|account| account.zkapp.is_some()) {
                    bail!("contract {contract} is already deployed");
                }
                if existing.is_none() && !*fund_new_account {
                    bail!("contract account {contract} does not exist and is not funded");
                }
                transaction.verify_signature(contract)?;

                let charge = if *fund_new_account {
                    fee.checked_add(ACCOUNT_CREATION_FEE)
                        .ok_or_else(|| anyhow!("fee overflow"))?
                } else {
                    fee
                };
                let zkapp = ZkappAccount {
                    verification_key: verification_key.clone(),
                    number: INITIAL_NUMBER,
                };
                (charge, (*contract, zkapp))
            }
            ContractCall::Update { contract } => {
                let zkapp = ledger
                    .accounts
                    .get(contract)
                    .and_then(|account| account.zkapp.clone())
                    .ok_or_else(|| anyhow!("no zkApp deployed at {contract}"))?;
                let proof = transaction
                    .proof
                    .as_ref()
                    .ok_or_else(|| anyhow!("update transaction carries no proof"))?;
                if *proof != proof_for(&zkapp.verification_key, transaction) {
                    bail!("proof does not verify against the deployed verification key");
                }
                let number = zkapp
                    .number
                    .checked_add(UPDATE_INCREMENT)
                    .ok_or_else(|| anyhow!("contract number overflow"))?;
                (fee, (*contract, ZkappAccount { number, ..zkapp }))
            }
        };

        let balance = payer
            .balance
            .checked_sub(charge)
            .ok_or_else(|| anyhow!("fee payer {fee_payer} cannot cover {charge}"))?;

        let mut hasher = Sha256::new();
        hasher.update(transaction.full_commitment(fee, memo));
        hasher.update(payer.nonce.to_le_bytes());
        let hash = TxHash::new(encode_base58_check(TX_HASH_VERSION, &hasher.finalize()));

        let payer_entry = ledger.accounts.entry(fee_payer).or_default();
        payer_entry.balance = balance;
        payer_entry.nonce = payer_entry.nonce.saturating_add(1);

        let (contract, zkapp) = contract_update;
        ledger.accounts.entry(contract).or_default().zkapp = Some(zkapp);
        ledger.applied.push(hash.clone());

        debug!(%hash, %fee_payer, %contract, "local ledger applied transaction");
        Ok(hash)
    }

    async fn require_connected(&self) -> Result<()> {
        if self.ledger.lock().await.endpoint.is_none() {
            bail!("no active network instance; select a network first");
        }
        Ok(())
    }
}

fn proof_for(verification_key: &VerificationKey, transaction: &Transaction) -> Proof {
    let mut hasher = Sha256::new();
    hasher.update(verification_key.as_str().as_bytes());
    hasher.update(transaction.call_commitment());
    Proof {
        proof_b64: STANDARD.encode(hasher.finalize()),
    }
}

#[async_trait]
impl ZkappBackend for LocalNetwork {
    async fn connect(&self, endpoint: &Url) -> Result<()> {
        self.ledger.lock().await.endpoint = Some(endpoint.clone());
        info!(network = %self.name, %endpoint, "local network instance active");
        Ok(())
    }

    async fn fetch_account(&self, address: &PublicKey) -> Result<AccountStatus> {
        self.require_connected().await?;
        let ledger = self.ledger.lock().await;
        Ok(match ledger.accounts.get(address) {
            Some(account) => AccountStatus::Exists {
                balance: account.balance,
                nonce: account.nonce,
            },
            None => AccountStatus::Missing,
        })
    }

    async fn load_contract(&self) -> Result<ContractArtifact> {
        let mut hasher = Sha256::new();
        hasher.update(CONTRACT_NAME.as_bytes());
        for method in CONTRACT_METHODS {
            hasher.update(method.as_bytes());
        }
        Ok(ContractArtifact {
            name: CONTRACT_NAME.to_string(),
            source_digest: hasher.finalize().into(),
        })
    }

    async fn compile(&self, artifact: &ContractArtifact) -> Result<VerificationKey> {
        let mut hasher = Sha256::new();
        hasher.update(b"verification-key");
        hasher.update(artifact.source_digest);
        Ok(VerificationKey::from_digest(&hasher.finalize()))
    }

    async fn prove(
        &self,
        verification_key: &VerificationKey,
        transaction: &Transaction,
    ) -> Result<Proof> {
        if !self.proving_delay.is_zero() {
            tokio::time::sleep(self.proving_delay).await;
        }
        Ok(proof_for(verification_key, transaction))
    }

    async fn read_number(&self, contract: &PublicKey) -> Result<u64> {
        self.require_connected().await?;
        let ledger = self.ledger.lock().await;
        ledger
            .accounts
            .get(contract)
            .and_then(|account| account.zkapp.as_ref())
            .map(|zkapp| zkapp.number)
            .ok_or_else(|| anyhow!("no zkApp deployed at {contract}"))
    }
}

/// Wallet holding a single account, submitting straight into a [`LocalNetwork`].
pub struct LocalWallet {
    network: LocalNetwork,
    key: PrivateKey,
}

impl LocalWallet {
    pub fn new(network: LocalNetwork, key: PrivateKey) -> Self {
        Self { network, key }
    }

    pub fn public_key(&self) -> PublicKey {
        self.key.to_public_key()
    }
}

#[async_trait]
impl WalletProvider for LocalWallet {
    async fn request_accounts(&self) -> Result<Vec<PublicKey>> {
        Ok(vec![self.key.to_public_key()])
    }

    async fn request_network(&self) -> Result<String> {
        Ok(self.network.name().to_string())
    }

    async fn send_transaction(
        &self,
        request: SendTransactionRequest,
    ) -> Result<SendTransactionReceipt> {
        let mut transaction = Transaction::from_transport(&request.transaction)?;
        let account = self.key.to_public_key();
        if let Some(requested) = transaction.fee_payer {
            if requested != account {
                bail!("transaction names fee payer {requested}, wallet account is {account}");
            }
        }

        transaction.sign_as_fee_payer(&self.key, request.fee_payer.fee, &request.fee_payer.memo);
        let hash = self
            .network
            .submit(&transaction, request.fee_payer.fee, &request.fee_payer.memo)
            .await?;
        Ok(SendTransactionReceipt { hash })
    }
}

#[cfg(test)]
#[path = "tests/local_tests.rs"]
mod tests;
