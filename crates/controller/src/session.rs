use shared::domain::{ContractNumber, PublicKey, TxHash};

use crate::events::UiError;

/// Everything the page renders from. Published as whole snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    /// `None` until the wallet check has run.
    pub has_wallet: Option<bool>,
    pub has_been_setup: bool,
    pub account_exists: bool,
    pub current_number: ContractNumber,
    pub public_key: Option<PublicKey>,
    pub contract_key: Option<PublicKey>,
    /// Attached contract address as the user submitted it, empty until one is attached.
    pub contract_address: String,
    pub candidate_contract: String,
    pub creating_transaction: bool,
    pub deployment_tx: Option<TxHash>,
    pub interaction_tx: Option<TxHash>,
    pub last_error: Option<UiError>,
}

impl SessionState {
    pub fn ready_for_contract(&self) -> bool {
        self.has_been_setup && self.account_exists
    }

    pub fn has_contract(&self) -> bool {
        !self.contract_address.is_empty()
    }
}
