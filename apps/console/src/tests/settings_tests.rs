use std::io::Write;

use super::*;

fn no_env() -> Option<HashMap<String, String>> {
    Some(HashMap::new())
}

fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
    Some(
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect(),
    )
}

fn toml_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_target_the_public_test_network() {
    let settings = build_settings(None, no_env()).expect("settings");

    assert_eq!(settings, Settings::default());
    assert_eq!(settings.network.name, "berkeley");
    assert_eq!(
        settings.worker_config().expect("worker").endpoint.as_str(),
        "https://proxy.berkeley.minaexplorer.com/graphql"
    );
    assert_eq!(
        settings.controller_config().expect("controller").transaction_fee,
        Amount::from_nanomina(100_000_000)
    );
}

#[test]
fn file_values_override_defaults() {
    let file = toml_file(
        r#"
transaction_fee = "0.25"
startup_grace_seconds = 0

[network]
name = "devnet"
"#,
    );

    let settings = build_settings(Some(file.path()), no_env()).expect("settings");

    assert_eq!(settings.network.name, "devnet");
    assert_eq!(
        settings.network.graphql_endpoint,
        Settings::default().network.graphql_endpoint
    );
    assert_eq!(settings.startup_grace_seconds, 0);
    assert_eq!(
        settings.controller_config().expect("controller").transaction_fee,
        Amount::from_nanomina(250_000_000)
    );
}

#[test]
fn environment_overrides_file() {
    let file = toml_file("transaction_fee = \"0.2\"\n");

    let settings = build_settings(
        Some(file.path()),
        env(&[
            ("APP__TRANSACTION_FEE", "0.3"),
            ("APP__FUNDING__MAX_INTERVAL_MS", "1000"),
            ("APP__LOCAL__WALLET_INSTALLED", "false"),
            ("UNRELATED", "ignored"),
        ]),
    )
    .expect("settings");

    assert_eq!(settings.transaction_fee, "0.3");
    assert_eq!(settings.funding.max_interval_ms, 1000);
    assert!(!settings.local.wallet_installed);
}

#[test]
fn missing_explicit_file_is_an_error() {
    let dir = tempfile::tempdir().expect("temp dir");
    let missing = dir.path().join("absent.toml");

    assert!(build_settings(Some(&missing), no_env()).is_err());
}

#[test]
fn invalid_fee_is_rejected() {
    let settings = Settings {
        transaction_fee: "a lot".into(),
        ..Settings::default()
    };

    let err = settings.controller_config().unwrap_err();
    assert!(err.to_string().contains("transaction_fee"));
}

#[test]
fn explorer_base_gains_a_trailing_slash() {
    let mut settings = Settings::default();
    settings.network.explorer_url = "https://explorer.example/berkeley".into();

    let links = settings.view_links().expect("links");
    assert_eq!(
        links.explorer_base.as_str(),
        "https://explorer.example/berkeley/"
    );
}

#[test]
fn effective_settings_render_as_toml() {
    let settings = Settings::default();
    let rendered = settings.to_toml().expect("toml");

    assert!(rendered.contains("[network]"));
    assert_eq!(
        toml::from_str::<Settings>(&rendered).expect("parse back"),
        settings
    );
}
