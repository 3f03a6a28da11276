use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use chain_integration::{LocalNetwork, LocalWallet, WalletProvider};
use clap::Parser;
use controller::{PageView, UiController, ViewLinks};
use shared::domain::{Amount, PrivateKey, PublicKey};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::{wrappers::WatchStream, StreamExt};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use worker::spawn_worker;

mod commands;
mod settings;

use commands::{ConsoleCommand, HELP};
use settings::{load_settings, Settings};

const DEFAULT_FAUCET_AMOUNT: Amount = Amount::from_mina(10);

#[derive(Parser, Debug)]
#[command(about = "Deploy and drive the Add zkApp from a terminal")]
struct Args {
    /// Settings file; defaults to ./zkapp.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Print the effective settings as TOML and exit.
    #[arg(long)]
    print_config: bool,
    /// Start as if no wallet provider were installed.
    #[arg(long)]
    no_wallet: bool,
    /// Leave the wallet account unfunded so setup waits on the faucet.
    #[arg(long)]
    unfunded: bool,
}

struct Session {
    settings: Settings,
    links: ViewLinks,
    network: LocalNetwork,
    account: Option<PublicKey>,
    controller: Arc<UiController>,
}

impl Session {
    async fn start(settings: Settings) -> Result<Self> {
        let links = settings.view_links()?;
        let network = LocalNetwork::new(settings.network.name.clone())
            .with_proving_delay(settings.proving_delay());

        let (wallet, account) = if settings.local.wallet_installed {
            let key = PrivateKey::random();
            let account = key.to_public_key();
            if settings.local.prefund_account {
                network.fund(&account, settings.initial_balance()?).await?;
            }
            let wallet: Arc<dyn WalletProvider> = Arc::new(LocalWallet::new(network.clone(), key));
            (Some(wallet), Some(account))
        } else {
            (None, None)
        };

        let worker = spawn_worker(Arc::new(network.clone()), settings.worker_config()?);
        let controller = Arc::new(UiController::new(
            worker,
            wallet,
            settings.controller_config()?,
        ));

        Ok(Self {
            settings,
            links,
            network,
            account,
            controller,
        })
    }

    fn render(&self) {
        println!("{}", self.controller.view(&self.links));
    }

    /// Returns `false` once the user asks to quit.
    async fn dispatch(&self, command: ConsoleCommand) -> Result<bool> {
        let controller = &self.controller;
        match command {
            ConsoleCommand::Help => println!("{HELP}"),
            ConsoleCommand::View => self.render(),
            ConsoleCommand::SetCandidate(address) => controller.set_candidate(address),
            ConsoleCommand::Attach(address) => {
                if let Err(err) = controller.select_contract(address.as_deref()).await {
                    println!("attach failed: {err}");
                }
            }
            ConsoleCommand::Deploy => match controller.deploy_new_contract().await {
                Ok(hash) => println!("deployment submitted: {hash}"),
                Err(err) => println!("deploy failed: {err}"),
            },
            ConsoleCommand::Send => match controller.send_update_transaction().await {
                Ok(hash) => println!("transaction submitted: {hash}"),
                Err(err) => println!("send failed: {err}"),
            },
            ConsoleCommand::Refresh => match controller.refresh_state().await {
                Ok(number) => println!("current number: {number}"),
                Err(err) => println!("refresh failed: {err}"),
            },
            ConsoleCommand::Fund(amount) => match self.account {
                Some(account) => {
                    let balance = self
                        .network
                        .fund(&account, amount.unwrap_or(DEFAULT_FAUCET_AMOUNT))
                        .await?;
                    println!("funded {account}; balance {balance} MINA");
                }
                None => println!("no wallet account to fund"),
            },
            ConsoleCommand::Config => println!("{}", self.settings.to_toml()?),
            ConsoleCommand::Quit => return Ok(false),
        }
        Ok(true)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref())?;
    if args.no_wallet {
        settings.local.wallet_installed = false;
    }
    if args.unfunded {
        settings.local.prefund_account = false;
    }
    if args.print_config {
        print!("{}", settings.to_toml()?);
        return Ok(());
    }

    let session = Session::start(settings).await?;

    let setup = tokio::spawn({
        let controller = Arc::clone(&session.controller);
        async move {
            if let Err(err) = controller.initialize().await {
                error!("zkApp setup failed: {err}");
            }
        }
    });

    let renderer = tokio::spawn({
        let controller = Arc::clone(&session.controller);
        let links = session.links.clone();
        async move {
            let mut updates = WatchStream::new(controller.subscribe());
            let mut last = String::new();
            while let Some(state) = updates.next().await {
                let rendered = PageView::from_state(&state, &links).to_string();
                if rendered != last {
                    println!("{rendered}");
                    last = rendered;
                }
            }
        }
    });

    info!("type 'help' for commands");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        match line.parse::<ConsoleCommand>() {
            Ok(command) => {
                if !session.dispatch(command).await? {
                    break;
                }
            }
            Err(message) => warn!("{message}"),
        }
    }

    setup.abort();
    renderer.abort();
    session.controller.shutdown();
    Ok(())
}
