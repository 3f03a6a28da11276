use std::{collections::HashMap, path::Path, time::Duration};

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use controller::{ControllerConfig, FundingBackoff, ViewLinks};
use serde::{Deserialize, Serialize};
use shared::domain::Amount;
use url::Url;
use worker::WorkerConfig;

pub const DEFAULT_CONFIG_FILE: &str = "zkapp.toml";
const ENV_PREFIX: &str = "APP";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSettings {
    pub name: String,
    pub graphql_endpoint: String,
    pub explorer_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkSettings {
    pub faucet_url: String,
    pub wallet_install_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingSettings {
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalSettings {
    pub wallet_installed: bool,
    pub prefund_account: bool,
    pub initial_balance: String,
    pub proving_delay_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Decimal MINA.
    pub transaction_fee: String,
    pub startup_grace_seconds: u64,
    pub request_queue_capacity: usize,
    pub network: NetworkSettings,
    pub links: LinkSettings,
    pub funding: FundingSettings,
    pub local: LocalSettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            transaction_fee: "0.1".into(),
            startup_grace_seconds: 20,
            request_queue_capacity: 32,
            network: NetworkSettings {
                name: "berkeley".into(),
                graphql_endpoint: "https://proxy.berkeley.minaexplorer.com/graphql".into(),
                explorer_url: "https://berkeley.minaexplorer.com/".into(),
            },
            links: LinkSettings {
                faucet_url: "https://faucet.minaprotocol.com/".into(),
                wallet_install_url: "https://www.aurowallet.com/".into(),
            },
            funding: FundingSettings {
                initial_interval_ms: 5_000,
                max_interval_ms: 60_000,
                multiplier: 1.5,
            },
            local: LocalSettings {
                wallet_installed: true,
                prefund_account: true,
                initial_balance: "50".into(),
                proving_delay_ms: 0,
            },
        }
    }
}

/// Defaults, then `zkapp.toml` (or `path`), then `APP__*` environment variables.
pub fn load_settings(path: Option<&Path>) -> Result<Settings> {
    build_settings(path, None)
}

/// `env` replaces the process environment when given.
pub fn build_settings(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Settings> {
    let file = match path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let defaults =
        Config::try_from(&Settings::default()).context("failed to encode default settings")?;
    let environment = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .source(env);

    Config::builder()
        .add_source(defaults)
        .add_source(file)
        .add_source(environment)
        .build()
        .context("failed to load settings")?
        .try_deserialize()
        .context("invalid settings")
}

fn parse_url(value: &str, key: &str) -> Result<Url> {
    Url::parse(value.trim()).with_context(|| format!("{key} is not a valid url: '{value}'"))
}

/// Explorer paths are joined onto the base, so it must end in a slash.
fn directory_url(value: &str, key: &str) -> Result<Url> {
    let mut url = parse_url(value, key)?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn parse_amount(value: &str, key: &str) -> Result<Amount> {
    value
        .parse()
        .with_context(|| format!("{key} is not a MINA amount: '{value}'"))
}

impl Settings {
    pub fn worker_config(&self) -> Result<WorkerConfig> {
        Ok(WorkerConfig {
            endpoint: parse_url(&self.network.graphql_endpoint, "network.graphql_endpoint")?,
            queue_capacity: self.request_queue_capacity,
        })
    }

    pub fn controller_config(&self) -> Result<ControllerConfig> {
        Ok(ControllerConfig {
            startup_grace: Duration::from_secs(self.startup_grace_seconds),
            transaction_fee: parse_amount(&self.transaction_fee, "transaction_fee")?,
            funding: FundingBackoff {
                initial: Duration::from_millis(self.funding.initial_interval_ms),
                max: Duration::from_millis(self.funding.max_interval_ms),
                multiplier: self.funding.multiplier,
            },
        })
    }

    pub fn view_links(&self) -> Result<ViewLinks> {
        Ok(ViewLinks {
            explorer_base: directory_url(&self.network.explorer_url, "network.explorer_url")?,
            faucet: parse_url(&self.links.faucet_url, "links.faucet_url")?,
            wallet_install: parse_url(&self.links.wallet_install_url, "links.wallet_install_url")?,
        })
    }

    pub fn initial_balance(&self) -> Result<Amount> {
        parse_amount(&self.local.initial_balance, "local.initial_balance")
    }

    pub fn proving_delay(&self) -> Duration {
        Duration::from_millis(self.local.proving_delay_ms)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to render settings as toml")
    }
}

#[cfg(test)]
#[path = "tests/settings_tests.rs"]
mod tests;
