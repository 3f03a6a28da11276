//! UI controller: owns the session state, drives the zkApp worker through each user
//! step, and publishes complete state snapshots for rendering.

use std::{
    sync::{Arc, Mutex as StdMutex},
    time::Duration,
};

use chain_integration::{FeePayerOptions, SendTransactionRequest, WalletProvider};
use shared::{
    domain::{Amount, ContractNumber, PrivateKey, PublicKey, TxHash},
    protocol::SerializedTransaction,
};
use tokio::{
    sync::{watch, Mutex},
    task::JoinHandle,
};
use tracing::{debug, info, warn};
use worker::{WorkerCallError, WorkerClient};

pub mod events;
pub mod funding;
pub mod session;
pub mod view;

pub use events::{ControllerError, UiError, UiErrorCategory, UiErrorContext};
pub use funding::FundingBackoff;
pub use session::SessionState;
pub use view::{PageView, ViewLinks};

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Delay before the first worker request, giving the worker time to come up.
    pub startup_grace: Duration,
    pub transaction_fee: Amount,
    pub funding: FundingBackoff,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            startup_grace: Duration::from_secs(20),
            transaction_fee: Amount::from_nanomina(100_000_000),
            funding: FundingBackoff::default(),
        }
    }
}

struct ControllerInner {
    worker: WorkerClient,
    wallet: Option<Arc<dyn WalletProvider>>,
    config: ControllerConfig,
    state: watch::Sender<SessionState>,
    setup: Mutex<()>,
}

impl ControllerInner {
    fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    fn publish(&self, apply: impl FnOnce(&mut SessionState)) {
        self.state.send_modify(apply);
    }

    fn record_failure(&self, context: UiErrorContext, err: &ControllerError) {
        let error = UiError::from_error(context, err);
        warn!(?context, category = ?error.category(), "{}", error.message());
        // Only a transaction step that got past the in-flight check owns the flag.
        let owns_flag = matches!(
            context,
            UiErrorContext::Deploy | UiErrorContext::SendTransaction
        ) && !matches!(err, ControllerError::TransactionInFlight);
        self.publish(|state| {
            if owns_flag {
                state.creating_transaction = false;
            }
            state.last_error = Some(error);
        });
    }

    async fn submit(&self, transaction: SerializedTransaction) -> Result<TxHash, ControllerError> {
        let wallet = self.wallet.as_ref().ok_or(ControllerError::WalletMissing)?;

        let network = wallet
            .request_network()
            .await
            .map_err(|err| ControllerError::Wallet(format!("{err:#}")))?;
        let accounts = wallet
            .request_accounts()
            .await
            .map_err(|err| ControllerError::Wallet(format!("{err:#}")))?;
        info!(%network, accounts = accounts.len(), "wallet connection checked");

        let receipt = wallet
            .send_transaction(SendTransactionRequest {
                transaction,
                fee_payer: FeePayerOptions {
                    fee: self.config.transaction_fee,
                    memo: String::new(),
                },
            })
            .await
            .map_err(|err| ControllerError::Wallet(format!("{err:#}")))?;
        info!(hash = %receipt.hash, "transaction submitted");
        Ok(receipt.hash)
    }
}

pub struct UiController {
    inner: Arc<ControllerInner>,
    funding_task: StdMutex<Option<JoinHandle<()>>>,
}

impl UiController {
    pub fn new(
        worker: WorkerClient,
        wallet: Option<Arc<dyn WalletProvider>>,
        config: ControllerConfig,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            inner: Arc::new(ControllerInner {
                worker,
                wallet,
                config,
                state,
                setup: Mutex::new(()),
            }),
            funding_task: StdMutex::new(None),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    pub fn view(&self, links: &ViewLinks) -> PageView {
        PageView::from_state(&self.inner.state.borrow(), links)
    }

    /// Brings up the zkApp runtime: network, wallet account, contract compilation.
    /// Calling it again after setup has completed does nothing.
    pub async fn initialize(&self) -> Result<(), ControllerError> {
        let _guard = self.inner.setup.lock().await;
        if self.inner.snapshot().has_been_setup {
            return Ok(());
        }

        let result = self.run_setup().await;
        if let Err(err) = &result {
            self.inner.record_failure(UiErrorContext::Setup, err);
        }
        result
    }

    async fn run_setup(&self) -> Result<(), ControllerError> {
        let grace = self.inner.config.startup_grace;
        if !grace.is_zero() {
            info!(seconds = grace.as_secs_f64(), "waiting for the zkApp worker to start");
            tokio::time::sleep(grace).await;
        }

        let worker = &self.inner.worker;
        worker.select_network().await?;

        let Some(wallet) = self.inner.wallet.as_ref() else {
            info!("no wallet provider found");
            self.inner.publish(|state| state.has_wallet = Some(false));
            return Ok(());
        };

        let public_key = wallet
            .request_accounts()
            .await
            .map_err(|err| ControllerError::Wallet(format!("{err:#}")))?
            .into_iter()
            .next()
            .ok_or(ControllerError::NoWalletAccount)?;
        info!(%public_key, "using wallet account");

        let account_exists = worker.check_account(public_key).await?.exists();
        worker.load_contract().await?;
        info!("compiling zkApp");
        worker.compile_contract().await?;
        info!("zkApp compiled");

        self.inner.publish(|state| {
            state.has_wallet = Some(true);
            state.has_been_setup = true;
            state.public_key = Some(public_key);
            state.account_exists = account_exists;
            state.current_number = ContractNumber::Unset;
            state.last_error = None;
        });

        if !account_exists {
            self.start_funding_watch();
        }
        Ok(())
    }

    /// Spawns the funding poll when setup is done and the account is still missing.
    /// Returns whether a poll is running afterwards.
    pub fn start_funding_watch(&self) -> bool {
        let state = self.inner.snapshot();
        let Some(address) = state.public_key else {
            return false;
        };
        if !state.has_been_setup || state.account_exists {
            return false;
        }

        let Ok(mut slot) = self.funding_task.lock() else {
            return false;
        };
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return true;
        }

        let inner = Arc::clone(&self.inner);
        *slot = Some(tokio::spawn(async move {
            funding::wait_until_funded(&inner.worker, address, inner.config.funding, |err| {
                inner.record_failure(UiErrorContext::Funding, &ControllerError::from(err.clone()));
            })
            .await;
            inner.publish(|state| {
                state.account_exists = true;
                if state
                    .last_error
                    .as_ref()
                    .is_some_and(|error| error.context() == UiErrorContext::Funding)
                {
                    state.last_error = None;
                }
            });
        }));
        true
    }

    pub fn funding_watch_active(&self) -> bool {
        self.funding_task
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|task| !task.is_finished()))
            .unwrap_or(false)
    }

    /// Cancels any background work bound to this controller.
    pub fn shutdown(&self) {
        if let Ok(mut slot) = self.funding_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
    }

    pub fn set_candidate(&self, candidate: impl Into<String>) {
        let candidate = candidate.into();
        self.inner
            .publish(|state| state.candidate_contract = candidate);
    }

    /// Attaches the contract at `address`, or at the candidate address when `None`.
    pub async fn select_contract(&self, address: Option<&str>) -> Result<(), ControllerError> {
        let input = address
            .map(str::to_string)
            .unwrap_or_else(|| self.inner.snapshot().candidate_contract);
        let result = self.attach(&input).await;
        if let Err(err) = &result {
            self.inner.record_failure(UiErrorContext::AttachContract, err);
        }
        result
    }

    async fn attach(&self, input: &str) -> Result<(), ControllerError> {
        let contract: PublicKey =
            input
                .trim()
                .parse()
                .map_err(|source| ControllerError::InvalidAddress {
                    input: input.to_string(),
                    source,
                })?;

        let worker = &self.inner.worker;
        worker.bind_contract(contract).await?;
        info!(%contract, "getting zkApp state");
        let read = async {
            worker.check_account(contract).await?;
            let number = worker.read_number().await?;
            Ok::<_, WorkerCallError>(number)
        };
        let number = match read.await {
            Ok(number) => number,
            Err(err) => {
                self.restore_binding().await;
                return Err(err.into());
            }
        };
        info!(%contract, number, "current state");

        let address = input.to_string();
        self.inner.publish(|state| {
            state.contract_key = Some(contract);
            state.contract_address = address;
            state.current_number = ContractNumber::Known(number);
            state.last_error = None;
        });
        Ok(())
    }

    fn begin_transaction(&self) -> Result<PublicKey, ControllerError> {
        let mut outcome = Err(ControllerError::NotSetUp);
        self.inner.state.send_if_modified(|state| {
            outcome = match state.public_key {
                None => Err(ControllerError::NotSetUp),
                Some(_) if state.creating_transaction => Err(ControllerError::TransactionInFlight),
                Some(key) => {
                    state.creating_transaction = true;
                    state.last_error = None;
                    Ok(key)
                }
            };
            outcome.is_ok()
        });
        outcome
    }

    /// Deploys a fresh instance of the contract under a newly generated key.
    pub async fn deploy_new_contract(&self) -> Result<TxHash, ControllerError> {
        if self.inner.wallet.is_none() {
            self.inner.publish(|state| state.has_wallet = Some(false));
            let err = ControllerError::WalletMissing;
            self.inner.record_failure(UiErrorContext::Deploy, &err);
            return Err(err);
        }

        let result = match self.begin_transaction() {
            Ok(fee_payer) => {
                let result = self.run_deploy(fee_payer).await;
                if result.is_err() {
                    self.restore_binding().await;
                }
                result
            }
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            self.inner.record_failure(UiErrorContext::Deploy, err);
        }
        result
    }

    /// Points the worker back at the session's attached contract after a step that
    /// rebinds it has failed.
    async fn restore_binding(&self) {
        let Some(contract) = self.inner.snapshot().contract_key else {
            return;
        };
        match self.inner.worker.bind_contract(contract).await {
            Ok(()) => debug!(%contract, "restored contract binding"),
            Err(err) => warn!(%contract, "could not restore contract binding: {err}"),
        }
    }

    async fn run_deploy(&self, fee_payer: PublicKey) -> Result<TxHash, ControllerError> {
        let worker = &self.inner.worker;
        info!("sending a deployment transaction");
        worker.check_account(fee_payer).await?;

        let contract_key = PrivateKey::random();
        let contract = contract_key.to_public_key();
        info!(%contract, "generated new contract key");

        worker
            .build_deploy_transaction(contract_key, fee_payer)
            .await?;
        let transaction = worker.serialize_transaction().await?;
        let hash = self.inner.submit(transaction).await?;

        self.inner.publish(|state| {
            state.creating_transaction = false;
            state.deployment_tx = Some(hash.clone());
            state.contract_key = Some(contract);
            state.contract_address = contract.to_base58();
        });
        Ok(hash)
    }

    /// Builds, proves and submits a call to the attached contract's update method.
    pub async fn send_update_transaction(&self) -> Result<TxHash, ControllerError> {
        let result = match self.precheck_update() {
            Ok(()) => match self.begin_transaction() {
                Ok(fee_payer) => self.run_update(fee_payer).await,
                Err(err) => Err(err),
            },
            Err(err) => Err(err),
        };
        if let Err(err) = &result {
            self.inner
                .record_failure(UiErrorContext::SendTransaction, err);
        }
        result
    }

    fn precheck_update(&self) -> Result<(), ControllerError> {
        if self.inner.wallet.is_none() {
            return Err(ControllerError::WalletMissing);
        }
        if self.inner.snapshot().contract_key.is_none() {
            return Err(ControllerError::NoContract);
        }
        Ok(())
    }

    async fn run_update(&self, fee_payer: PublicKey) -> Result<TxHash, ControllerError> {
        let worker = &self.inner.worker;
        info!("sending a transaction");
        worker.check_account(fee_payer).await?;
        worker.build_update_transaction().await?;
        info!("creating proof");
        worker.prove_transaction().await?;
        let transaction = worker.serialize_transaction().await?;
        let hash = self.inner.submit(transaction).await?;

        self.inner.publish(|state| {
            state.creating_transaction = false;
            state.interaction_tx = Some(hash.clone());
        });
        Ok(hash)
    }

    /// Re-reads the attached contract's number from the chain.
    pub async fn refresh_state(&self) -> Result<u64, ControllerError> {
        let result = self.read_contract_number().await;
        if let Err(err) = &result {
            self.inner.record_failure(UiErrorContext::Refresh, err);
        }
        result
    }

    async fn read_contract_number(&self) -> Result<u64, ControllerError> {
        let contract = self
            .inner
            .snapshot()
            .contract_key
            .ok_or(ControllerError::NoContract)?;
        let worker = &self.inner.worker;
        worker.check_account(contract).await?;
        let number = worker.read_number().await?;
        info!(%contract, number, "current state");

        self.inner.publish(|state| {
            state.current_number = ContractNumber::Known(number);
            state.last_error = None;
        });
        Ok(number)
    }
}

impl Drop for UiController {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
