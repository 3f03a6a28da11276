use std::time::Duration;

use shared::domain::PublicKey;
use tracing::{debug, info, warn};
use worker::{WorkerCallError, WorkerClient};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundingBackoff {
    pub initial: Duration,
    pub max: Duration,
    pub multiplier: f64,
}

impl Default for FundingBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(60),
            multiplier: 1.5,
        }
    }
}

impl FundingBackoff {
    pub fn next(&self, current: Duration) -> Duration {
        let factor = if self.multiplier.is_finite() {
            self.multiplier.max(1.0)
        } else {
            1.0
        };
        let scaled =
            Duration::try_from_secs_f64(current.as_secs_f64() * factor).unwrap_or(self.max);
        scaled.min(self.max).max(self.initial.min(self.max))
    }
}

/// Polls until the account is reported to exist. Only returns on a successful check;
/// failed checks are handed to `on_failure` and retried.
pub async fn wait_until_funded(
    worker: &WorkerClient,
    address: PublicKey,
    backoff: FundingBackoff,
    mut on_failure: impl FnMut(&WorkerCallError),
) {
    let mut interval = backoff.initial.min(backoff.max);
    let mut attempt: u32 = 0;
    loop {
        attempt += 1;
        debug!(%address, attempt, "checking if account exists");
        match worker.check_account(address).await {
            Ok(status) if status.exists() => {
                info!(%address, attempt, "account is funded");
                return;
            }
            Ok(_) => debug!(%address, "account does not exist yet"),
            Err(err) => {
                warn!(%address, attempt, "account check failed: {err}");
                on_failure(&err);
            }
        }
        tokio::time::sleep(interval).await;
        interval = backoff.next(interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chain_integration::LocalNetwork;
    use shared::{domain::PrivateKey, error::ErrorCode};
    use url::Url;
    use worker::{spawn_worker, WorkerConfig};

    #[test]
    fn interval_grows_until_the_cap() {
        let backoff = FundingBackoff {
            initial: Duration::from_secs(2),
            max: Duration::from_secs(5),
            multiplier: 2.0,
        };

        assert_eq!(backoff.next(Duration::from_secs(2)), Duration::from_secs(4));
        assert_eq!(backoff.next(Duration::from_secs(4)), Duration::from_secs(5));
        assert_eq!(backoff.next(Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[test]
    fn multiplier_below_one_keeps_a_fixed_interval() {
        let backoff = FundingBackoff {
            initial: Duration::from_secs(5),
            max: Duration::from_secs(60),
            multiplier: 0.5,
        };

        assert_eq!(backoff.next(Duration::from_secs(5)), Duration::from_secs(5));
    }

    #[tokio::test]
    async fn failed_checks_are_reported_and_retried() {
        let worker = spawn_worker(
            Arc::new(LocalNetwork::new("berkeley")),
            WorkerConfig {
                endpoint: Url::parse("http://127.0.0.1:3085/graphql").expect("url"),
                queue_capacity: 4,
            },
        );
        let backoff = FundingBackoff {
            initial: Duration::from_millis(5),
            max: Duration::from_millis(5),
            multiplier: 1.0,
        };
        let mut failures = Vec::new();

        let poll = wait_until_funded(
            &worker,
            PrivateKey::random().to_public_key(),
            backoff,
            |err| failures.push(err.code()),
        );
        let outcome = tokio::time::timeout(Duration::from_millis(200), poll).await;

        assert!(outcome.is_err());
        assert!(failures.len() >= 2);
        assert!(failures
            .iter()
            .all(|code| *code == Some(ErrorCode::NetworkNotSelected)));
    }
}
