//! Render model for the page, derived entirely from [`SessionState`].

use std::fmt;

use shared::domain::{ContractNumber, PublicKey, TxHash};
use url::Url;

use crate::session::SessionState;

pub const STATUS_READY: &str = "zkApp runtime ready";
pub const STATUS_SETTING_UP: &str = "Setting up zkApp runtime...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewLinks {
    pub explorer_base: Url,
    pub faucet: Url,
    pub wallet_install: Url,
}

impl ViewLinks {
    pub fn transaction(&self, hash: &TxHash) -> Option<Url> {
        self.explorer_base
            .join(&format!("transaction/{}", hash.as_str()))
            .ok()
    }

    pub fn account(&self, address: &str) -> Option<Url> {
        self.explorer_base.join(&format!("wallet/{address}")).ok()
    }

    pub fn faucet_for(&self, address: &PublicKey) -> Url {
        let mut url = self.faucet.clone();
        url.query_pairs_mut()
            .clear()
            .append_pair("address", &address.to_base58());
        url
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractSection {
    Hidden,
    Choose { candidate: String },
    Attached { address: String, link: Option<Url> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionControls {
    pub send_enabled: bool,
    pub current_number: ContractNumber,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView {
    pub status: &'static str,
    pub wallet_install_link: Option<Url>,
    pub contract: ContractSection,
    pub deployment_link: Option<(TxHash, Option<Url>)>,
    pub interaction_link: Option<(TxHash, Option<Url>)>,
    pub faucet_link: Option<Url>,
    pub controls: Option<TransactionControls>,
    pub error_banner: Option<String>,
}

impl PageView {
    pub fn from_state(state: &SessionState, links: &ViewLinks) -> Self {
        let status = if state.has_been_setup {
            STATUS_READY
        } else {
            STATUS_SETTING_UP
        };

        let wallet_install_link =
            (state.has_wallet == Some(false)).then(|| links.wallet_install.clone());

        let contract = if !state.ready_for_contract() {
            ContractSection::Hidden
        } else if state.has_contract() {
            ContractSection::Attached {
                address: state.contract_address.clone(),
                link: links.account(&state.contract_address),
            }
        } else {
            ContractSection::Choose {
                candidate: state.candidate_contract.clone(),
            }
        };

        let faucet_link = if state.has_been_setup && !state.account_exists {
            state.public_key.as_ref().map(|key| links.faucet_for(key))
        } else {
            None
        };

        let controls = (state.ready_for_contract() && state.has_contract()).then(|| {
            TransactionControls {
                send_enabled: !state.creating_transaction,
                current_number: state.current_number,
            }
        });

        Self {
            status,
            wallet_install_link,
            contract,
            deployment_link: state
                .deployment_tx
                .as_ref()
                .map(|hash| (hash.clone(), links.transaction(hash))),
            interaction_link: state
                .interaction_tx
                .as_ref()
                .map(|hash| (hash.clone(), links.transaction(hash))),
            faucet_link,
            controls,
            error_banner: state
                .last_error
                .as_ref()
                .map(|error| error.message().to_string()),
        }
    }
}

fn write_link(f: &mut fmt::Formatter<'_>, label: &str, text: &str, link: Option<&Url>) -> fmt::Result {
    match link {
        Some(url) => writeln!(f, "{label} {text} <{url}>"),
        None => writeln!(f, "{label} {text}"),
    }
}

impl fmt::Display for PageView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.status)?;
        if let Some(install) = &self.wallet_install_link {
            writeln!(f, "Could not find a wallet. Install one here: <{install}>")?;
        }

        match &self.contract {
            ContractSection::Hidden => {}
            ContractSection::Choose { candidate } => {
                writeln!(f, "Contract address: [{candidate}]  (set contract | deploy new)")?;
            }
            ContractSection::Attached { address, link } => {
                write_link(f, "Your smart contract is", address, link.as_ref())?;
            }
        }

        if let Some((hash, link)) = &self.deployment_link {
            write_link(
                f,
                "Your smart contract deployment transaction is",
                hash.as_str(),
                link.as_ref(),
            )?;
        }
        if let Some((hash, link)) = &self.interaction_link {
            write_link(
                f,
                "Your smart contract interaction transaction is",
                hash.as_str(),
                link.as_ref(),
            )?;
        }
        if let Some(faucet) = &self.faucet_link {
            writeln!(
                f,
                "Account does not exist. Please visit the faucet to fund this account: <{faucet}>"
            )?;
        }
        if let Some(controls) = &self.controls {
            if controls.send_enabled {
                writeln!(f, "[Send Transaction]")?;
            } else {
                writeln!(f, "[Send Transaction] (creating transaction...)")?;
            }
            writeln!(f, "Current Number in zkApp: {}", controls.current_number)?;
            writeln!(f, "[Get Latest State]")?;
        }
        if let Some(error) = &self.error_banner {
            writeln!(f, "Error: {error}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{UiError, UiErrorContext};
    use shared::domain::PrivateKey;

    fn links() -> ViewLinks {
        ViewLinks {
            explorer_base: Url::parse("https://berkeley.minaexplorer.com/").expect("url"),
            faucet: Url::parse("https://faucet.minaprotocol.com/").expect("url"),
            wallet_install: Url::parse("https://www.aurowallet.com/").expect("url"),
        }
    }

    fn ready_state() -> SessionState {
        SessionState {
            has_wallet: Some(true),
            has_been_setup: true,
            account_exists: true,
            public_key: Some(PrivateKey::random().to_public_key()),
            ..SessionState::default()
        }
    }

    #[test]
    fn missing_wallet_shows_the_install_link() {
        let state = SessionState {
            has_wallet: Some(false),
            ..SessionState::default()
        };
        let view = PageView::from_state(&state, &links());

        assert_eq!(view.status, STATUS_SETTING_UP);
        assert_eq!(view.wallet_install_link, Some(links().wallet_install));
        assert_eq!(view.contract, ContractSection::Hidden);
        assert!(view.to_string().contains("https://www.aurowallet.com/"));
    }

    #[test]
    fn unknown_wallet_state_shows_no_install_link() {
        let view = PageView::from_state(&SessionState::default(), &links());
        assert!(view.wallet_install_link.is_none());
    }

    #[test]
    fn unfunded_account_shows_the_faucet_link() {
        let mut state = ready_state();
        state.account_exists = false;
        let key = state.public_key.expect("key");

        let view = PageView::from_state(&state, &links());
        let faucet = view.faucet_link.expect("faucet link");
        assert_eq!(
            faucet.as_str(),
            format!("https://faucet.minaprotocol.com/?address={key}")
        );
        assert_eq!(view.contract, ContractSection::Hidden);
        assert!(view.controls.is_none());
    }

    #[test]
    fn ready_without_contract_offers_the_address_input() {
        let mut state = ready_state();
        state.candidate_contract = "B62q".into();

        let view = PageView::from_state(&state, &links());
        assert_eq!(view.status, STATUS_READY);
        assert_eq!(
            view.contract,
            ContractSection::Choose {
                candidate: "B62q".into()
            }
        );
        assert!(view.controls.is_none());
    }

    #[test]
    fn attached_contract_shows_explorer_link_and_controls() {
        let mut state = ready_state();
        let contract = PrivateKey::random().to_public_key();
        state.contract_key = Some(contract);
        state.contract_address = contract.to_base58();
        state.current_number = ContractNumber::Known(3);
        state.creating_transaction = true;
        state.deployment_tx = Some(TxHash::new("5JuDeploy"));

        let view = PageView::from_state(&state, &links());
        match &view.contract {
            ContractSection::Attached { address, link } => {
                assert_eq!(address, &contract.to_base58());
                assert_eq!(
                    link.as_ref().map(Url::as_str),
                    Some(format!("https://berkeley.minaexplorer.com/wallet/{contract}").as_str())
                );
            }
            other => panic!("unexpected section {other:?}"),
        }
        assert_eq!(
            view.controls,
            Some(TransactionControls {
                send_enabled: false,
                current_number: ContractNumber::Known(3),
            })
        );
        let (_, deploy_link) = view.deployment_link.clone().expect("deployment");
        assert_eq!(
            deploy_link.expect("link").as_str(),
            "https://berkeley.minaexplorer.com/transaction/5JuDeploy"
        );
    }

    #[test]
    fn unset_number_renders_as_unknown() {
        let mut state = ready_state();
        state.contract_address = PrivateKey::random().to_public_key().to_base58();

        let text = PageView::from_state(&state, &links()).to_string();
        assert!(text.contains("Current Number in zkApp: unknown"));
    }

    #[test]
    fn last_error_becomes_the_banner() {
        let mut state = ready_state();
        state.last_error = Some(UiError::from_message(
            UiErrorContext::Deploy,
            "wallet rejected the transaction",
        ));

        let view = PageView::from_state(&state, &links());
        assert_eq!(
            view.error_banner.as_deref(),
            Some("wallet rejected the transaction")
        );
    }
}
