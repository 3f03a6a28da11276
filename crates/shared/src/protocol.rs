use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    domain::{Amount, PrivateKey, PublicKey},
    error::{ApiError, ApiException, ErrorCode},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(pub u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The closed set of operations the background worker understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationName {
    SelectNetwork,
    LoadContract,
    CompileContract,
    CheckAccount,
    BindContract,
    BuildDeployTransaction,
    BuildUpdateTransaction,
    ProveTransaction,
    SerializeTransaction,
    ReadNumber,
}

impl OperationName {
    pub const ALL: [OperationName; 10] = [
        OperationName::SelectNetwork,
        OperationName::LoadContract,
        OperationName::CompileContract,
        OperationName::CheckAccount,
        OperationName::BindContract,
        OperationName::BuildDeployTransaction,
        OperationName::BuildUpdateTransaction,
        OperationName::ProveTransaction,
        OperationName::SerializeTransaction,
        OperationName::ReadNumber,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OperationName::SelectNetwork => "select-network",
            OperationName::LoadContract => "load-contract",
            OperationName::CompileContract => "compile-contract",
            OperationName::CheckAccount => "check-account",
            OperationName::BindContract => "bind-contract",
            OperationName::BuildDeployTransaction => "build-deploy-transaction",
            OperationName::BuildUpdateTransaction => "build-update-transaction",
            OperationName::ProveTransaction => "prove-transaction",
            OperationName::SerializeTransaction => "serialize-transaction",
            OperationName::ReadNumber => "read-number",
        }
    }
}

impl FromStr for OperationName {
    type Err = ApiException;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| {
                ApiException::new(
                    ErrorCode::UnknownOperation,
                    format!("unknown worker operation '{s}'"),
                )
            })
    }
}

impl fmt::Display for OperationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Deserialize)]
struct AddressArgs {
    address: PublicKey,
}

#[derive(Debug, Deserialize)]
struct DeployArgs {
    contract_key: PrivateKey,
    fee_payer: PublicKey,
}

#[derive(Debug, Clone)]
pub enum Operation {
    SelectNetwork,
    LoadContract,
    CompileContract,
    CheckAccount {
        address: PublicKey,
    },
    BindContract {
        address: PublicKey,
    },
    BuildDeployTransaction {
        contract_key: PrivateKey,
        fee_payer: PublicKey,
    },
    BuildUpdateTransaction,
    ProveTransaction,
    SerializeTransaction,
    ReadNumber,
}

impl Operation {
    pub fn name(&self) -> OperationName {
        match self {
            Operation::SelectNetwork => OperationName::SelectNetwork,
            Operation::LoadContract => OperationName::LoadContract,
            Operation::CompileContract => OperationName::CompileContract,
            Operation::CheckAccount { .. } => OperationName::CheckAccount,
            Operation::BindContract { .. } => OperationName::BindContract,
            Operation::BuildDeployTransaction { .. } => OperationName::BuildDeployTransaction,
            Operation::BuildUpdateTransaction => OperationName::BuildUpdateTransaction,
            Operation::ProveTransaction => OperationName::ProveTransaction,
            Operation::SerializeTransaction => OperationName::SerializeTransaction,
            Operation::ReadNumber => OperationName::ReadNumber,
        }
    }

    /// The operation-specific argument record as it travels on the wire.
    pub fn args(&self) -> Value {
        match self {
            Operation::CheckAccount { address } | Operation::BindContract { address } => {
                json!({ "address": address })
            }
            Operation::BuildDeployTransaction {
                contract_key,
                fee_payer,
            } => json!({ "contract_key": contract_key, "fee_payer": fee_payer }),
            _ => json!({}),
        }
    }

    /// Looks up an operation by name and decodes its argument record.
    pub fn from_parts(name: OperationName, args: Value) -> Result<Self, ApiException> {
        let invalid = |err: serde_json::Error| {
            ApiException::new(
                ErrorCode::InvalidArguments,
                format!("invalid arguments for '{name}': {err}"),
            )
        };

        let operation = match name {
            OperationName::SelectNetwork => Operation::SelectNetwork,
            OperationName::LoadContract => Operation::LoadContract,
            OperationName::CompileContract => Operation::CompileContract,
            OperationName::CheckAccount => {
                let AddressArgs { address } = serde_json::from_value(args).map_err(invalid)?;
                Operation::CheckAccount { address }
            }
            OperationName::BindContract => {
                let AddressArgs { address } = serde_json::from_value(args).map_err(invalid)?;
                Operation::BindContract { address }
            }
            OperationName::BuildDeployTransaction => {
                let DeployArgs {
                    contract_key,
                    fee_payer,
                } = serde_json::from_value(args).map_err(invalid)?;
                Operation::BuildDeployTransaction {
                    contract_key,
                    fee_payer,
                }
            }
            OperationName::BuildUpdateTransaction => Operation::BuildUpdateTransaction,
            OperationName::ProveTransaction => Operation::ProveTransaction,
            OperationName::SerializeTransaction => Operation::SerializeTransaction,
            OperationName::ReadNumber => Operation::ReadNumber,
        };
        Ok(operation)
    }
}

/// Untyped request shape; the operation name is resolved after the id is known so that
/// a bad name can still be answered with the caller's id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestFrame {
    pub id: RequestId,
    pub operation: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RequestFrame", into = "RequestFrame")]
pub struct WorkerRequest {
    pub id: RequestId,
    pub operation: Operation,
}

impl TryFrom<RequestFrame> for WorkerRequest {
    type Error = ApiException;

    fn try_from(frame: RequestFrame) -> Result<Self, Self::Error> {
        let name: OperationName = frame.operation.parse()?;
        Ok(Self {
            id: frame.id,
            operation: Operation::from_parts(name, frame.args)?,
        })
    }
}

impl From<WorkerRequest> for RequestFrame {
    fn from(request: WorkerRequest) -> Self {
        Self {
            id: request.id,
            operation: request.operation.name().as_str().to_string(),
            args: request.operation.args(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum AccountStatus {
    Exists { balance: Amount, nonce: u32 },
    Missing,
}

impl AccountStatus {
    pub fn exists(&self) -> bool {
        matches!(self, AccountStatus::Exists { .. })
    }
}

/// A transaction in the transport form accepted by the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SerializedTransaction(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OperationOutput {
    None,
    Account(AccountStatus),
    Transaction(SerializedTransaction),
    Number(String),
}

impl OperationOutput {
    pub fn kind(&self) -> &'static str {
        match self {
            OperationOutput::None => "none",
            OperationOutput::Account(_) => "account",
            OperationOutput::Transaction(_) => "transaction",
            OperationOutput::Number(_) => "number",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "data", rename_all = "snake_case")]
pub enum WorkerResult {
    Ok(OperationOutput),
    Error(ApiError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerResponse {
    pub id: RequestId,
    pub result: WorkerResult,
}

impl WorkerResponse {
    pub fn ok(id: RequestId, output: OperationOutput) -> Self {
        Self {
            id,
            result: WorkerResult::Ok(output),
        }
    }

    pub fn error(id: RequestId, error: impl Into<ApiError>) -> Self {
        Self {
            id,
            result: WorkerResult::Error(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_operation_name_resolves_to_itself() {
        for name in OperationName::ALL {
            assert_eq!(name.as_str().parse::<OperationName>().expect("known"), name);
            let via_serde: OperationName =
                serde_json::from_value(json!(name.as_str())).expect("serde name");
            assert_eq!(via_serde, name);
        }
    }

    #[test]
    fn unknown_operation_name_is_rejected() {
        let err = "mint-tokens".parse::<OperationName>().unwrap_err();
        assert!(matches!(err.code, ErrorCode::UnknownOperation));
        assert!(err.message.contains("mint-tokens"));
    }

    #[test]
    fn request_uses_flat_wire_shape() {
        let address = PrivateKey::random().to_public_key();
        let request = WorkerRequest {
            id: RequestId(7),
            operation: Operation::CheckAccount { address },
        };

        let wire = serde_json::to_value(&request).expect("serialize");
        assert_eq!(
            wire,
            json!({
                "id": 7,
                "operation": "check-account",
                "args": { "address": address.to_base58() },
            })
        );

        let decoded: WorkerRequest = serde_json::from_value(wire).expect("decode");
        assert_eq!(decoded.id, RequestId(7));
        assert!(matches!(
            decoded.operation,
            Operation::CheckAccount { address: decoded_address } if decoded_address == address
        ));
    }

    #[test]
    fn no_argument_operations_accept_missing_args() {
        let decoded: WorkerRequest =
            serde_json::from_value(json!({ "id": 1, "operation": "prove-transaction" }))
                .expect("decode");
        assert!(matches!(decoded.operation, Operation::ProveTransaction));
    }

    #[test]
    fn malformed_arguments_are_reported_as_invalid() {
        let err = Operation::from_parts(
            OperationName::BindContract,
            json!({ "address": "definitely not base58 0OIl" }),
        )
        .unwrap_err();
        assert!(matches!(err.code, ErrorCode::InvalidArguments));
    }

    #[test]
    fn deploy_arguments_carry_the_contract_key() {
        let contract_key = PrivateKey::random();
        let fee_payer = PrivateKey::random().to_public_key();
        let operation = Operation::BuildDeployTransaction {
            contract_key: contract_key.clone(),
            fee_payer,
        };

        let rebuilt = Operation::from_parts(operation.name(), operation.args()).expect("rebuild");
        match rebuilt {
            Operation::BuildDeployTransaction {
                contract_key: key,
                fee_payer: payer,
            } => {
                assert_eq!(key.to_public_key(), contract_key.to_public_key());
                assert_eq!(payer, fee_payer);
            }
            other => panic!("unexpected operation {other:?}"),
        }
    }

    #[test]
    fn response_carries_tagged_result() {
        let ok = WorkerResponse::ok(RequestId(3), OperationOutput::Number("5".into()));
        assert_eq!(
            serde_json::to_value(&ok).expect("serialize"),
            json!({
                "id": 3,
                "result": { "status": "ok", "data": { "kind": "number", "value": "5" } },
            })
        );

        let err = WorkerResponse::error(
            RequestId(4),
            ApiError::new(ErrorCode::NoTransaction, "nothing built"),
        );
        assert_eq!(
            serde_json::to_value(&err).expect("serialize"),
            json!({
                "id": 4,
                "result": {
                    "status": "error",
                    "data": { "code": "no_transaction", "message": "nothing built" },
                },
            })
        );
    }
}
