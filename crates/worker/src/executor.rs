use std::sync::Arc;

use chain_integration::ZkappBackend;
use serde_json::Value;
use shared::{
    error::{ApiException, ErrorCode},
    protocol::{Operation, OperationOutput, RequestFrame, WorkerRequest, WorkerResponse},
};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use url::Url;

use crate::state::{TransactionSlot, WorkerState};

/// The caller prefixes the operation name, so the message carries only the cause.
fn chain_error(err: anyhow::Error) -> ApiException {
    ApiException::new(ErrorCode::Chain, format!("{err:#}"))
}

/// Executes worker operations against a [`ZkappBackend`], one request at a time.
pub struct ZkappWorker {
    backend: Arc<dyn ZkappBackend>,
    endpoint: Url,
    state: WorkerState,
}

impl ZkappWorker {
    pub fn new(backend: Arc<dyn ZkappBackend>, endpoint: Url) -> Self {
        Self {
            backend,
            endpoint,
            state: WorkerState::default(),
        }
    }

    pub fn state(&self) -> &WorkerState {
        &self.state
    }

    pub async fn handle(&mut self, request: WorkerRequest) -> WorkerResponse {
        let WorkerRequest { id, operation } = request;
        let name = operation.name();
        debug!(request_id = %id, operation = %name, "worker request received");
        match self.execute(operation).await {
            Ok(output) => {
                debug!(request_id = %id, operation = %name, output = output.kind(), "worker request completed");
                WorkerResponse::ok(id, output)
            }
            Err(err) => {
                warn!(request_id = %id, operation = %name, code = ?err.code, "worker request failed: {}", err.message);
                WorkerResponse::error(id, err)
            }
        }
    }

    /// Handles a request still in its JSON form. A frame whose id cannot be read has
    /// nobody to answer to and is returned as an error instead of a response.
    pub async fn handle_frame(&mut self, frame: Value) -> Result<WorkerResponse, ApiException> {
        let frame: RequestFrame = serde_json::from_value(frame).map_err(|err| {
            ApiException::new(
                ErrorCode::InvalidArguments,
                format!("unreadable request frame: {err}"),
            )
        })?;
        let id = frame.id;
        match WorkerRequest::try_from(frame) {
            Ok(request) => Ok(self.handle(request).await),
            Err(err) => {
                warn!(request_id = %id, "rejecting worker request: {}", err.message);
                Ok(WorkerResponse::error(id, err))
            }
        }
    }

    pub async fn execute(&mut self, operation: Operation) -> Result<OperationOutput, ApiException> {
        match operation {
            Operation::SelectNetwork => {
                self.backend
                    .connect(&self.endpoint)
                    .await
                    .map_err(|err| chain_error(err))?;
                info!(endpoint = %self.endpoint, "network selected");
                self.state.network = Some(self.endpoint.clone());
                Ok(OperationOutput::None)
            }
            Operation::LoadContract => {
                if self.state.contract_class.is_none() {
                    let artifact = self
                        .backend
                        .load_contract()
                        .await
                        .map_err(|err| chain_error(err))?;
                    info!(contract = %artifact.name, "contract class loaded");
                    self.state.contract_class = Some(artifact);
                }
                Ok(OperationOutput::None)
            }
            Operation::CompileContract => {
                let artifact = self.state.require_contract_class()?;
                if self.state.verification_key.is_none() {
                    let verification_key = self
                        .backend
                        .compile(artifact)
                        .await
                        .map_err(|err| chain_error(err))?;
                    info!(contract = %artifact.name, "contract compiled");
                    self.state.verification_key = Some(verification_key);
                }
                Ok(OperationOutput::None)
            }
            Operation::CheckAccount { address } => {
                self.state.require_network()?;
                let status = self
                    .backend
                    .fetch_account(&address)
                    .await
                    .map_err(|err| chain_error(err))?;
                Ok(OperationOutput::Account(status))
            }
            Operation::BindContract { address } => {
                self.state.require_contract_class()?;
                self.state.instance = Some(address);
                info!(%address, "contract instance bound");
                Ok(OperationOutput::None)
            }
            Operation::BuildDeployTransaction {
                contract_key,
                fee_payer,
            } => {
                self.state.require_network()?;
                let verification_key = self.state.require_verification_key()?.clone();
                self.state.transaction = TransactionSlot::Empty;
                let transaction = self
                    .backend
                    .build_deploy(&verification_key, &contract_key, &fee_payer)
                    .await
                    .map_err(|err| chain_error(err))?;
                let contract = contract_key.to_public_key();
                self.state.instance = Some(contract);
                self.state.transaction = TransactionSlot::Built(transaction);
                info!(%contract, %fee_payer, "deploy transaction built");
                Ok(OperationOutput::None)
            }
            Operation::BuildUpdateTransaction => {
                self.state.require_network()?;
                let contract = self.state.require_instance()?;
                self.state.transaction = TransactionSlot::Empty;
                let transaction = self
                    .backend
                    .build_update(&contract)
                    .await
                    .map_err(|err| chain_error(err))?;
                self.state.transaction = TransactionSlot::Built(transaction);
                info!(%contract, "update transaction built");
                Ok(OperationOutput::None)
            }
            Operation::ProveTransaction => self.prove().await,
            Operation::SerializeTransaction => self.serialize(),
            Operation::ReadNumber => {
                self.state.require_network()?;
                let contract = self.state.require_instance()?;
                let number = self
                    .backend
                    .read_number(&contract)
                    .await
                    .map_err(|err| chain_error(err))?;
                Ok(OperationOutput::Number(number.to_string()))
            }
        }
    }

    async fn prove(&mut self) -> Result<OperationOutput, ApiException> {
        let mut transaction = match &self.state.transaction {
            TransactionSlot::Empty => {
                return Err(ApiException::new(
                    ErrorCode::NoTransaction,
                    "no transaction has been built",
                ))
            }
            TransactionSlot::Built(transaction) => transaction.clone(),
            other => {
                return Err(ApiException::new(
                    ErrorCode::InvalidTransactionState,
                    format!("cannot prove a {} transaction", other.phase()),
                ))
            }
        };
        let verification_key = self.state.require_verification_key()?;

        let proof = self
            .backend
            .prove(verification_key, &transaction)
            .await
            .map_err(|err| {
                ApiException::new(ErrorCode::ProofFailed, format!("{err:#}"))
            })?;
        transaction.proof = Some(proof);
        info!(contract = %transaction.call.contract(), "transaction proved");
        self.state.transaction = TransactionSlot::Proved(transaction);
        Ok(OperationOutput::None)
    }

    fn serialize(&mut self) -> Result<OperationOutput, ApiException> {
        let transaction = match &self.state.transaction {
            TransactionSlot::Empty => {
                return Err(ApiException::new(
                    ErrorCode::NoTransaction,
                    "no transaction has been built",
                ))
            }
            TransactionSlot::Consumed { serialized, .. } => {
                return Ok(OperationOutput::Transaction(serialized.clone()))
            }
            TransactionSlot::Built(transaction) | TransactionSlot::Proved(transaction) => {
                transaction.clone()
            }
        };

        let serialized = transaction.to_transport().map_err(|err| {
            ApiException::new(ErrorCode::Internal, format!("{err:#}"))
        })?;
        self.state.transaction = TransactionSlot::Consumed {
            transaction,
            serialized: serialized.clone(),
        };
        Ok(OperationOutput::Transaction(serialized))
    }

    /// Serves requests strictly in arrival order until either channel closes.
    pub async fn run(
        mut self,
        mut requests: mpsc::Receiver<WorkerRequest>,
        responses: mpsc::UnboundedSender<WorkerResponse>,
    ) {
        info!(endpoint = %self.endpoint, "zkApp worker started");
        while let Some(request) = requests.recv().await {
            let response = self.handle(request).await;
            if responses.send(response).is_err() {
                warn!("response channel closed; stopping worker");
                break;
            }
        }
        info!("zkApp worker stopped");
    }
}

#[cfg(test)]
#[path = "tests/executor_tests.rs"]
mod tests;
