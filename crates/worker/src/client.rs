use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use shared::{
    domain::{PrivateKey, PublicKey},
    error::{ApiError, ErrorCode},
    protocol::{
        AccountStatus, Operation, OperationName, OperationOutput, RequestId,
        SerializedTransaction, WorkerRequest, WorkerResponse, WorkerResult,
    },
};
use thiserror::Error;
use tokio::{
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
};
use tracing::{debug, warn};

#[derive(Debug, Clone, Error)]
pub enum WorkerCallError {
    #[error("zkApp worker is not running")]
    Disconnected,
    #[error("{operation} failed: {}", .error.message)]
    Operation {
        operation: OperationName,
        error: ApiError,
    },
    #[error("{operation} returned unexpected {found} output")]
    UnexpectedOutput {
        operation: OperationName,
        found: &'static str,
    },
}

impl WorkerCallError {
    pub fn code(&self) -> Option<ErrorCode> {
        match self {
            WorkerCallError::Operation { error, .. } => Some(error.code),
            _ => None,
        }
    }
}

#[derive(Default)]
struct PendingCalls {
    closed: bool,
    waiters: HashMap<RequestId, oneshot::Sender<WorkerResult>>,
}

struct ClientInner {
    next_id: AtomicU64,
    requests: mpsc::Sender<WorkerRequest>,
    pending: Arc<Mutex<PendingCalls>>,
    router: JoinHandle<()>,
}

impl Drop for ClientInner {
    fn drop(&mut self) {
        self.router.abort();
    }
}

/// Caller side of the worker protocol. Cheap to clone; every clone shares one id
/// sequence and one pending-call table.
#[derive(Clone)]
pub struct WorkerClient {
    inner: Arc<ClientInner>,
}

impl WorkerClient {
    /// Must be called from within a tokio runtime; the response router runs as a task.
    pub fn new(
        requests: mpsc::Sender<WorkerRequest>,
        responses: mpsc::UnboundedReceiver<WorkerResponse>,
    ) -> Self {
        let pending = Arc::new(Mutex::new(PendingCalls::default()));
        let router = tokio::spawn(route_responses(responses, Arc::clone(&pending)));
        Self {
            inner: Arc::new(ClientInner {
                next_id: AtomicU64::new(1),
                requests,
                pending,
                router,
            }),
        }
    }

    pub async fn call(&self, operation: Operation) -> Result<OperationOutput, WorkerCallError> {
        let id = RequestId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let name = operation.name();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.inner.pending.lock().await;
            if pending.closed {
                return Err(WorkerCallError::Disconnected);
            }
            pending.waiters.insert(id, tx);
        }

        debug!(request_id = %id, operation = %name, "sending worker request");
        if self
            .inner
            .requests
            .send(WorkerRequest { id, operation })
            .await
            .is_err()
        {
            self.inner.pending.lock().await.waiters.remove(&id);
            return Err(WorkerCallError::Disconnected);
        }

        match rx.await {
            Ok(WorkerResult::Ok(output)) => Ok(output),
            Ok(WorkerResult::Error(error)) => Err(WorkerCallError::Operation {
                operation: name,
                error,
            }),
            Err(_) => Err(WorkerCallError::Disconnected),
        }
    }

    async fn call_expecting_none(&self, operation: Operation) -> Result<(), WorkerCallError> {
        let name = operation.name();
        match self.call(operation).await? {
            OperationOutput::None => Ok(()),
            other => Err(unexpected(name, &other)),
        }
    }

    pub async fn select_network(&self) -> Result<(), WorkerCallError> {
        self.call_expecting_none(Operation::SelectNetwork).await
    }

    pub async fn load_contract(&self) -> Result<(), WorkerCallError> {
        self.call_expecting_none(Operation::LoadContract).await
    }

    pub async fn compile_contract(&self) -> Result<(), WorkerCallError> {
        self.call_expecting_none(Operation::CompileContract).await
    }

    pub async fn check_account(&self, address: PublicKey) -> Result<AccountStatus, WorkerCallError> {
        match self.call(Operation::CheckAccount { address }).await? {
            OperationOutput::Account(status) => Ok(status),
            other => Err(unexpected(OperationName::CheckAccount, &other)),
        }
    }

    pub async fn bind_contract(&self, address: PublicKey) -> Result<(), WorkerCallError> {
        self.call_expecting_none(Operation::BindContract { address })
            .await
    }

    pub async fn build_deploy_transaction(
        &self,
        contract_key: PrivateKey,
        fee_payer: PublicKey,
    ) -> Result<(), WorkerCallError> {
        self.call_expecting_none(Operation::BuildDeployTransaction {
            contract_key,
            fee_payer,
        })
        .await
    }

    pub async fn build_update_transaction(&self) -> Result<(), WorkerCallError> {
        self.call_expecting_none(Operation::BuildUpdateTransaction)
            .await
    }

    pub async fn prove_transaction(&self) -> Result<(), WorkerCallError> {
        self.call_expecting_none(Operation::ProveTransaction).await
    }

    pub async fn serialize_transaction(&self) -> Result<SerializedTransaction, WorkerCallError> {
        match self.call(Operation::SerializeTransaction).await? {
            OperationOutput::Transaction(serialized) => Ok(serialized),
            other => Err(unexpected(OperationName::SerializeTransaction, &other)),
        }
    }

    pub async fn read_number(&self) -> Result<u64, WorkerCallError> {
        match self.call(Operation::ReadNumber).await? {
            OperationOutput::Number(number) => {
                number
                    .parse()
                    .map_err(|_| WorkerCallError::UnexpectedOutput {
                        operation: OperationName::ReadNumber,
                        found: "non-numeric",
                    })
            }
            other => Err(unexpected(OperationName::ReadNumber, &other)),
        }
    }
}

fn unexpected(operation: OperationName, output: &OperationOutput) -> WorkerCallError {
    WorkerCallError::UnexpectedOutput {
        operation,
        found: output.kind(),
    }
}

async fn route_responses(
    mut responses: mpsc::UnboundedReceiver<WorkerResponse>,
    pending: Arc<Mutex<PendingCalls>>,
) {
    while let Some(response) = responses.recv().await {
        let waiter = pending.lock().await.waiters.remove(&response.id);
        match waiter {
            Some(waiter) => {
                debug!(request_id = %response.id, "routing worker response");
                let _ = waiter.send(response.result);
            }
            None => warn!(request_id = %response.id, "dropping worker response with unknown id"),
        }
    }

    let mut pending = pending.lock().await;
    pending.closed = true;
    let orphaned = pending.waiters.len();
    pending.waiters.clear();
    if orphaned > 0 {
        warn!(orphaned, "worker exited with calls still pending");
    }
}
