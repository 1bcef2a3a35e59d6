//! Harness configuration
//!
//! Everything here has a `Default` matching the timings the suite was tuned
//! against. `HarnessConfig::from_env` layers `FIXA_*` variables on top, and
//! [`CliOverrides`] layers command-line flags over that.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{E2eError, E2eResult};

/// Top-level configuration for a suite run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Browser launch settings
    pub browser: BrowserSettings,

    /// Wait and settle durations
    pub timings: Timings,

    /// Maximum number of scenarios running at once (each with its own session)
    pub concurrency: usize,

    /// Probe the application before launching the browser
    pub probe_app: bool,

    /// Directory for failure screenshots
    pub artifacts_dir: PathBuf,

    /// Directory for `test-results.json`
    pub output_dir: PathBuf,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            browser: BrowserSettings::default(),
            timings: Timings::default(),
            concurrency: 1,
            probe_app: true,
            artifacts_dir: PathBuf::from("test-results/screenshots"),
            output_dir: PathBuf::from("test-results"),
        }
    }
}

impl HarnessConfig {
    /// Defaults overridden by `FIXA_HEADLESS`, `FIXA_CHROME`, `FIXA_CONCURRENCY`.
    pub fn from_env() -> E2eResult<Self> {
        let mut config = Self::default();
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> E2eResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("FIXA_HEADLESS") {
            self.browser.headless = parse_bool("FIXA_HEADLESS", &v)?;
        }
        if let Some(v) = lookup("FIXA_CHROME") {
            self.browser.executable = Some(PathBuf::from(v));
        }
        if let Some(v) = lookup("FIXA_CONCURRENCY") {
            let n: usize = v
                .parse()
                .map_err(|_| E2eError::Config(format!("FIXA_CONCURRENCY: not a number: {}", v)))?;
            self.concurrency = n.max(1);
        }
        Ok(())
    }

    /// Apply command-line flags. Unset flags keep the env/default value.
    pub fn apply_cli(&mut self, cli: CliOverrides) {
        if let Some(n) = cli.concurrency {
            self.concurrency = n.max(1);
        }
        if cli.headed {
            self.browser.headless = false;
        }
        if let Some(chrome) = cli.chrome {
            self.browser.executable = Some(chrome);
        }
        if cli.no_probe {
            self.probe_app = false;
        }
        if let Some(output) = cli.output {
            self.artifacts_dir = output.join("screenshots");
            self.output_dir = output;
        }
    }
}

/// Flags given on the command line
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub concurrency: Option<usize>,
    pub headed: bool,
    pub chrome: Option<PathBuf>,
    pub no_probe: bool,
    pub output: Option<PathBuf>,
}

fn parse_bool(key: &str, value: &str) -> E2eResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(E2eError::Config(format!("{}: expected a boolean, got '{}'", key, other))),
    }
}

/// Chromium launch settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSettings {
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,

    /// Chrome/Chromium binary; auto-detected when `None`
    pub executable: Option<PathBuf>,

    /// Pass `--no-sandbox` (needed in most containers)
    pub no_sandbox: bool,

    /// Per-request CDP timeout
    pub request_timeout_ms: u64,
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            viewport_width: 1280,
            viewport_height: 720,
            executable: None,
            no_sandbox: true,
            request_timeout_ms: 30_000,
        }
    }
}

/// Bounded waits and settle caps, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Timings {
    /// Interval between condition checks
    pub poll_interval_ms: u64,

    /// Document parse (`readyState != "loading"`)
    pub document_ready_ms: u64,

    /// Auto-wait before clicking or filling
    pub action_ms: u64,

    /// Visibility assertions
    pub expect_ms: u64,

    /// Primary login success marker
    pub login_primary_ms: u64,

    /// Secondary login success markers
    pub login_fallback_ms: u64,

    /// Readiness wait: rows attached
    pub rows_ms: u64,

    /// Readiness wait: employee count text present
    pub count_text_ms: u64,

    /// Settle cap after navigating to the list
    pub navigation_settle_ms: u64,

    /// Settle cap after next/previous page
    pub pagination_settle_ms: u64,

    /// Settle cap after opening or closing the modal
    pub modal_settle_ms: u64,

    /// Settle cap after toggling a filter
    pub filter_settle_ms: u64,
}

impl Default for Timings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            document_ready_ms: 30_000,
            action_ms: 5_000,
            expect_ms: 5_000,
            login_primary_ms: 20_000,
            login_fallback_ms: 10_000,
            rows_ms: 15_000,
            count_text_ms: 10_000,
            navigation_settle_ms: 3_000,
            pagination_settle_ms: 2_000,
            modal_settle_ms: 1_000,
            filter_settle_ms: 500,
        }
    }
}

impl Timings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(10))
    }

    pub fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_tuned_timings() {
        let t = Timings::default();
        assert_eq!(t.login_primary_ms, 20_000);
        assert_eq!(t.login_fallback_ms, 10_000);
        assert_eq!(t.rows_ms, 15_000);
        assert_eq!(t.count_text_ms, 10_000);
        assert!(t.filter_settle_ms < t.modal_settle_ms);
        assert!(t.modal_settle_ms < t.pagination_settle_ms);
        assert!(t.pagination_settle_ms < t.navigation_settle_ms);
    }

    #[test]
    fn env_overrides_browser_and_concurrency() {
        let mut config = HarnessConfig::default();
        config
            .apply_env(lookup(&[
                ("FIXA_HEADLESS", "false"),
                ("FIXA_CHROME", "/usr/bin/chromium"),
                ("FIXA_CONCURRENCY", "0"),
            ]))
            .unwrap();
        assert!(!config.browser.headless);
        assert_eq!(
            config.browser.executable,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn unset_flags_keep_env_values() {
        let mut config = HarnessConfig::default();
        config
            .apply_env(lookup(&[("FIXA_CONCURRENCY", "4")]))
            .unwrap();
        config.apply_cli(CliOverrides::default());
        assert_eq!(config.concurrency, 4);
        assert!(config.probe_app);
        assert_eq!(config.output_dir, PathBuf::from("test-results"));

        config.apply_cli(CliOverrides {
            concurrency: Some(2),
            no_probe: true,
            output: Some(PathBuf::from("out")),
            ..CliOverrides::default()
        });
        assert_eq!(config.concurrency, 2);
        assert!(!config.probe_app);
        assert_eq!(config.artifacts_dir, PathBuf::from("out/screenshots"));
    }

    #[test]
    fn bad_boolean_is_a_config_error() {
        let mut config = HarnessConfig::default();
        let err = config
            .apply_env(lookup(&[("FIXA_HEADLESS", "maybe")]))
            .unwrap_err();
        assert!(matches!(err, E2eError::Config(_)));
    }

    #[test]
    fn partial_timings_fill_from_defaults() {
        let t: Timings = serde_yaml::from_str("filter_settle_ms: 250\n").unwrap();
        assert_eq!(t.filter_settle_ms, 250);
        assert_eq!(t.rows_ms, 15_000);
    }
}
