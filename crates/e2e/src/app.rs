//! Reachability probe for the application under test
//!
//! The suite never starts the application itself. Before launching a
//! browser the runner checks that something answers at the base URL, so an
//! unreachable app fails once instead of once per scenario.

use std::time::{Duration, Instant};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::error::{E2eError, E2eResult};

/// Poll `url` until it answers with a non-5xx status
pub async fn wait_for_app(url: &str, timeout: Duration) -> E2eResult<()> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(2))
        .build()?;

    let start = Instant::now();
    let mut attempts = 0;

    while start.elapsed() < timeout {
        attempts += 1;

        match client.get(url).send().await {
            Ok(resp) if !resp.status().is_server_error() => {
                info!("Application is up at {} ({})", url, resp.status());
                return Ok(());
            }
            Ok(resp) => {
                warn!("Application returned {}", resp.status());
            }
            Err(e) => {
                if attempts == 1 {
                    info!("Waiting for application at {}...", url);
                }
                // Connection refused is expected while the app is starting
                if !e.is_connect() {
                    warn!("Probe error: {}", e);
                }
            }
        }

        sleep(Duration::from_millis(250)).await;
    }

    Err(E2eError::AppUnreachable {
        url: url.to_string(),
        attempts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unreachable_app_reports_attempts() {
        // Port 9 (discard) on localhost is closed on any sane test machine.
        let err = wait_for_app("http://127.0.0.1:9/", Duration::from_millis(300))
            .await
            .unwrap_err();
        match err {
            E2eError::AppUnreachable { url, attempts } => {
                assert_eq!(url, "http://127.0.0.1:9/");
                assert!(attempts >= 1);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
