//! Background zkApp worker: owns the contract, the chain connection and the in-flight
//! transaction on a dedicated thread, and answers correlated requests from the UI.

use std::{sync::Arc, thread};

use chain_integration::ZkappBackend;
use tokio::sync::mpsc;
use tracing::error;
use url::Url;

pub mod client;
pub mod executor;
pub mod state;

pub use client::{WorkerCallError, WorkerClient};
pub use executor::ZkappWorker;
pub use state::{TransactionSlot, WorkerState};

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub endpoint: Url,
    pub queue_capacity: usize,
}

/// Starts the worker on its own OS thread with a single-threaded runtime and returns
/// the client for it. Must be called from within a tokio runtime.
///
/// The thread exits once every clone of the client has been dropped.
pub fn spawn_worker(backend: Arc<dyn ZkappBackend>, config: WorkerConfig) -> WorkerClient {
    let (request_tx, request_rx) = mpsc::channel(config.queue_capacity.max(1));
    let (response_tx, response_rx) = mpsc::unbounded_channel();

    let spawned = thread::Builder::new()
        .name("zkapp-worker".to_string())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!("failed to build zkApp worker runtime: {err}");
                    return;
                }
            };
            let worker = ZkappWorker::new(backend, config.endpoint);
            runtime.block_on(worker.run(request_rx, response_tx));
        });
    if let Err(err) = spawned {
        error!("failed to spawn zkApp worker thread: {err}");
    }

    WorkerClient::new(request_tx, response_rx)
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
