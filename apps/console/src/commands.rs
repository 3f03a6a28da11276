//! Commands typed at the console prompt.

use std::str::FromStr;

use shared::domain::Amount;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Help,
    View,
    SetCandidate(String),
    Attach(Option<String>),
    Deploy,
    Send,
    Refresh,
    Fund(Option<Amount>),
    Config,
    Quit,
}

pub const HELP: &str = "\
commands:
  view              render the page
  set <address>     edit the contract address input
  attach [address]  attach the typed (or given) contract
  deploy            deploy a new contract
  send              send an update transaction
  refresh           read the latest contract state
  fund [mina]       faucet: fund the wallet account
  config            print the effective settings
  quit              exit";

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Err("empty command".into());
        };
        let argument = parts.next().map(str::to_string);
        if parts.next().is_some() {
            return Err(format!("too many arguments for '{verb}'"));
        }

        let command = match (verb.to_ascii_lowercase().as_str(), argument) {
            ("help" | "?", None) => ConsoleCommand::Help,
            ("view", None) => ConsoleCommand::View,
            ("set", Some(address)) => ConsoleCommand::SetCandidate(address),
            ("set", None) => return Err("usage: set <address>".into()),
            ("attach", address) => ConsoleCommand::Attach(address),
            ("deploy", None) => ConsoleCommand::Deploy,
            ("send", None) => ConsoleCommand::Send,
            ("refresh", None) => ConsoleCommand::Refresh,
            ("fund", None) => ConsoleCommand::Fund(None),
            ("fund", Some(amount)) => ConsoleCommand::Fund(Some(
                amount
                    .parse()
                    .map_err(|err| format!("invalid amount: {err}"))?,
            )),
            ("config", None) => ConsoleCommand::Config,
            ("quit" | "exit", None) => ConsoleCommand::Quit,
            (other, _) => return Err(format!("unknown command '{other}'; type 'help'")),
        };
        Ok(command)
    }
}
