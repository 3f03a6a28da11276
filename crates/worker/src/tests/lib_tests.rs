use super::*;
use chain_integration::{FeePayerOptions, LocalNetwork, LocalWallet, SendTransactionRequest, WalletProvider};
use futures::future::join_all;
use shared::{
    domain::{Amount, PrivateKey},
    error::ErrorCode,
    protocol::{
        AccountStatus, Operation, OperationOutput, RequestId, WorkerRequest, WorkerResponse,
    },
};

fn config() -> WorkerConfig {
    WorkerConfig {
        endpoint: Url::parse("https://proxy.berkeley.minaexplorer.com/graphql").expect("url"),
        queue_capacity: 8,
    }
}

/// A client wired to hand-driven channels so tests can play the worker side.
fn manual_client() -> (
    WorkerClient,
    mpsc::Receiver<WorkerRequest>,
    mpsc::UnboundedSender<WorkerResponse>,
) {
    let (request_tx, request_rx) = mpsc::channel(32);
    let (response_tx, response_rx) = mpsc::unbounded_channel();
    (
        WorkerClient::new(request_tx, response_rx),
        request_rx,
        response_tx,
    )
}

#[tokio::test]
async fn responses_are_correlated_even_when_answered_out_of_order() {
    let (client, mut requests, responses) = manual_client();
    const CALLS: usize = 6;

    let echo = tokio::spawn(async move {
        let mut received = Vec::new();
        while received.len() < CALLS {
            let request = requests.recv().await.expect("request");
            received.push(request.id);
        }
        for id in received.into_iter().rev() {
            responses
                .send(WorkerResponse::ok(id, OperationOutput::Number(id.0.to_string())))
                .expect("send response");
        }
    });

    let calls = (0..CALLS).map(|_| client.call(Operation::ReadNumber));
    let outputs = join_all(calls).await;
    echo.await.expect("echo task");

    let mut seen: Vec<u64> = outputs
        .into_iter()
        .map(|output| match output.expect("call") {
            OperationOutput::Number(number) => number.parse().expect("numeric id"),
            other => panic!("unexpected output {other:?}"),
        })
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, (1..=CALLS as u64).collect::<Vec<_>>());
}

#[tokio::test]
async fn responses_with_unknown_ids_are_dropped() {
    let (client, mut requests, responses) = manual_client();

    let worker = tokio::spawn(async move {
        let request = requests.recv().await.expect("request");
        responses
            .send(WorkerResponse::ok(RequestId(9_999), OperationOutput::None))
            .expect("stray response");
        responses
            .send(WorkerResponse::ok(
                request.id,
                OperationOutput::Number("12".into()),
            ))
            .expect("real response");
    });

    assert_eq!(client.read_number().await.expect("read"), 12);
    worker.await.expect("worker task");
}

#[tokio::test]
async fn pending_calls_fail_when_the_worker_goes_away() {
    let (client, mut requests, responses) = manual_client();

    let worker = tokio::spawn(async move {
        let _request = requests.recv().await.expect("request");
        drop(responses);
    });

    let err = client.load_contract().await.unwrap_err();
    assert!(matches!(err, WorkerCallError::Disconnected));
    worker.await.expect("worker task");

    let err = client.compile_contract().await.unwrap_err();
    assert!(matches!(err, WorkerCallError::Disconnected));
}

#[tokio::test]
async fn unexpected_output_kind_is_reported() {
    let (client, mut requests, responses) = manual_client();

    tokio::spawn(async move {
        let request = requests.recv().await.expect("request");
        let _ = responses.send(WorkerResponse::ok(request.id, OperationOutput::None));
    });

    let err = client.serialize_transaction().await.unwrap_err();
    assert!(matches!(
        err,
        WorkerCallError::UnexpectedOutput { found: "none", .. }
    ));
}

#[tokio::test]
async fn spawned_worker_reports_operation_errors_with_codes() {
    let network = LocalNetwork::new("berkeley");
    let client = spawn_worker(Arc::new(network), config());

    let err = client.prove_transaction().await.unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NoTransaction));

    let err = client
        .check_account(PrivateKey::random().to_public_key())
        .await
        .unwrap_err();
    assert_eq!(err.code(), Some(ErrorCode::NetworkNotSelected));
}

#[tokio::test]
async fn spawned_worker_serves_concurrent_callers() {
    let network = LocalNetwork::new("berkeley");
    let client = spawn_worker(Arc::new(network), config());
    client.select_network().await.expect("select");

    let addresses: Vec<_> = (0..10)
        .map(|_| PrivateKey::random().to_public_key())
        .collect();
    let checks = addresses.iter().map(|address| {
        let client = client.clone();
        let address = *address;
        async move { client.check_account(address).await }
    });

    for status in join_all(checks).await {
        assert_eq!(status.expect("check"), AccountStatus::Missing);
    }
}

#[tokio::test]
async fn spawned_worker_deploys_and_updates_the_contract() {
    let network = LocalNetwork::new("berkeley");
    let payer_key = PrivateKey::random();
    let payer = payer_key.to_public_key();
    network
        .fund(&payer, Amount::from_mina(50))
        .await
        .expect("fund");
    let wallet = LocalWallet::new(network.clone(), payer_key);
    let client = spawn_worker(Arc::new(network.clone()), config());
    let fee_payer = FeePayerOptions {
        fee: Amount::from_nanomina(100_000_000),
        memo: String::new(),
    };

    client.select_network().await.expect("select");
    client.load_contract().await.expect("load");
    client.compile_contract().await.expect("compile");

    let contract_key = PrivateKey::random();
    client
        .build_deploy_transaction(contract_key.clone(), payer)
        .await
        .expect("build deploy");
    let deploy = client.serialize_transaction().await.expect("serialize");
    wallet
        .send_transaction(SendTransactionRequest {
            transaction: deploy,
            fee_payer: fee_payer.clone(),
        })
        .await
        .expect("deploy");
    assert_eq!(client.read_number().await.expect("read"), 1);

    client.build_update_transaction().await.expect("build update");
    client.prove_transaction().await.expect("prove");
    let update = client.serialize_transaction().await.expect("serialize");
    wallet
        .send_transaction(SendTransactionRequest {
            transaction: update,
            fee_payer,
        })
        .await
        .expect("update");

    assert_eq!(client.read_number().await.expect("read"), 3);
}

#[tokio::test]
async fn chain_failures_name_the_operation_once() {
    let network = LocalNetwork::new("berkeley");
    let client = spawn_worker(Arc::new(network), config());
    client.select_network().await.expect("select");
    client.load_contract().await.expect("load");
    let undeployed = PrivateKey::random().to_public_key();
    client.bind_contract(undeployed).await.expect("bind");

    let err = client.read_number().await.unwrap_err();

    assert_eq!(err.code(), Some(ErrorCode::Chain));
    assert_eq!(
        err.to_string(),
        format!("read-number failed: no zkApp deployed at {undeployed}")
    );
}
