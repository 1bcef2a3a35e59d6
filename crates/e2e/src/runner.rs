//! Main test runner that orchestrates the browser, sessions and scenarios

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::app::wait_for_app;
use crate::browser::BrowserHandle;
use crate::config::{HarnessConfig, Timings};
use crate::data::TestData;
use crate::employees::EmployeesPage;
use crate::error::{E2eError, E2eResult};
use crate::scenarios::{self, Scenario};
use crate::session::SessionFixture;

/// Result of running a single scenario
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub id: String,
    pub name: String,
    pub success: bool,
    pub duration_ms: u64,
    pub error: Option<String>,
    pub screenshot_path: Option<PathBuf>,
}

/// Result of running a selection of scenarios
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSuiteResult {
    pub started_at: DateTime<Utc>,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub results: Vec<TestResult>,
}

impl TestSuiteResult {
    /// Tally `results` (declaration order is kept)
    pub fn from_results(
        started_at: DateTime<Utc>,
        duration: Duration,
        skipped: usize,
        results: Vec<TestResult>,
    ) -> Self {
        let passed = results.iter().filter(|r| r.success).count();
        Self {
            started_at,
            total: results.len() + skipped,
            passed,
            failed: results.len() - passed,
            skipped,
            duration_ms: duration.as_millis() as u64,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed == 0
    }
}

/// Which scenarios to run
#[derive(Debug, Clone, Default)]
pub enum Selection {
    #[default]
    All,
    Tagged(String),
    Named(Vec<String>),
}

impl Selection {
    /// Split `suite` into (selected, skipped count)
    pub fn apply(&self, suite: Vec<Scenario>) -> E2eResult<(Vec<Scenario>, usize)> {
        let total = suite.len();
        let selected: Vec<Scenario> = match self {
            Selection::All => suite,
            Selection::Tagged(tag) => suite.into_iter().filter(|s| s.has_tag(tag)).collect(),
            Selection::Named(names) => {
                if let Some(missing) = names
                    .iter()
                    .find(|n| !suite.iter().any(|s| s.matches(n)))
                {
                    return Err(E2eError::ScenarioNotFound(missing.clone()));
                }
                suite
                    .into_iter()
                    .filter(|s| names.iter().any(|n| s.matches(n)))
                    .collect()
            }
        };
        let skipped = total - selected.len();
        Ok((selected, skipped))
    }
}

/// Main E2E test runner
pub struct TestRunner {
    config: HarnessConfig,
    data: Arc<TestData>,
    timings: Arc<Timings>,
    browser: Option<BrowserHandle>,
}

impl TestRunner {
    pub fn new(config: HarnessConfig, data: TestData) -> Self {
        let timings = Arc::new(config.timings.clone());
        Self {
            config,
            data: Arc::new(data),
            timings,
            browser: None,
        }
    }

    pub fn data(&self) -> &TestData {
        &self.data
    }

    /// Probe the app (if enabled) and launch the browser
    pub async fn start(&mut self) -> E2eResult<()> {
        if self.browser.is_some() {
            return Ok(()); // Already running
        }

        if self.config.probe_app {
            let url = self.data.urls.absolute(&self.data.urls.login);
            wait_for_app(&url, Duration::from_secs(30)).await?;
        }

        self.browser = Some(BrowserHandle::launch(&self.config.browser).await?);
        Ok(())
    }

    /// Close the browser
    pub async fn stop(&mut self) -> E2eResult<()> {
        if let Some(browser) = self.browser.take() {
            browser.close().await?;
        }
        Ok(())
    }

    /// Run the selected scenarios
    pub async fn run(&mut self, selection: &Selection) -> E2eResult<TestSuiteResult> {
        let (selected, skipped) = selection.apply(scenarios::all())?;
        self.run_scenarios(&selected, skipped).await
    }

    /// Run scenarios with up to `concurrency` in flight, each in its own session
    pub async fn run_scenarios(
        &mut self,
        selected: &[Scenario],
        skipped: usize,
    ) -> E2eResult<TestSuiteResult> {
        let started_at = Utc::now();
        let start = Instant::now();

        self.start().await?;
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| E2eError::BrowserLaunch("browser not started".to_string()))?;

        info!(
            "Running {} scenario(s), {} at a time...",
            selected.len(),
            self.config.concurrency
        );

        let fixture = SessionFixture::new(browser, Arc::clone(&self.data), Arc::clone(&self.timings));
        let fixture = &fixture;
        let data = &self.data;
        let artifacts = self.config.artifacts_dir.as_path();

        let mut results: Vec<(usize, TestResult)> = stream::iter(selected.iter().enumerate())
            .map(|(i, scenario)| async move {
                (i, run_one(fixture, Arc::clone(data), artifacts, scenario).await)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await;
        results.sort_by_key(|(i, _)| *i);
        let results: Vec<TestResult> = results.into_iter().map(|(_, r)| r).collect();

        let suite = TestSuiteResult::from_results(started_at, start.elapsed(), skipped, results);

        info!("");
        info!(
            "Test Results: {} passed, {} failed, {} skipped ({} ms)",
            suite.passed, suite.failed, suite.skipped, suite.duration_ms
        );

        Ok(suite)
    }

    /// Write results to `test-results.json` in the output directory
    pub fn write_results(&self, results: &TestSuiteResult) -> E2eResult<PathBuf> {
        write_results(&self.config.output_dir, results)
    }
}

async fn run_one(
    fixture: &SessionFixture<'_>,
    data: Arc<TestData>,
    artifacts: &Path,
    scenario: &Scenario,
) -> TestResult {
    let start = Instant::now();
    debug!("Running {} {}", scenario.id, scenario.name);

    let screenshot = artifacts.join(format!("{}.png", scenario.id));
    let run = scenario.run;
    let mut screenshot_path = None;
    let saved_to = &mut screenshot_path;

    let outcome = fixture
        .run(move |session| async move {
            let page = EmployeesPage::new(session.clone(), data);
            let result = match page.navigate().await {
                Ok(()) => run(page).await,
                Err(e) => Err(e),
            };
            // Capture while the session is still open; teardown follows.
            if result.is_err() {
                match session.screenshot(&screenshot).await {
                    Ok(()) => *saved_to = Some(screenshot),
                    Err(e) => warn!("Could not capture failure screenshot: {}", e),
                }
            }
            result
        })
        .await;

    let duration_ms = start.elapsed().as_millis() as u64;
    match outcome {
        Ok(()) => {
            info!("✓ {} {} ({} ms)", scenario.id, scenario.name, duration_ms);
            TestResult {
                id: scenario.id.to_string(),
                name: scenario.name.to_string(),
                success: true,
                duration_ms,
                error: None,
                screenshot_path: None,
            }
        }
        Err(e) => {
            error!("✗ {} {} - {}", scenario.id, scenario.name, e);
            TestResult {
                id: scenario.id.to_string(),
                name: scenario.name.to_string(),
                success: false,
                duration_ms,
                error: Some(e.to_string()),
                screenshot_path,
            }
        }
    }
}

/// Write `results` as pretty JSON into `dir/test-results.json`
pub fn write_results(dir: &Path, results: &TestSuiteResult) -> E2eResult<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let path = dir.join("test-results.json");
    let json = serde_json::to_string_pretty(results)?;
    std::fs::write(&path, json)?;

    info!("Results written to: {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(id: &str, success: bool) -> TestResult {
        TestResult {
            id: id.to_string(),
            name: id.to_lowercase(),
            success,
            duration_ms: 10,
            error: (!success).then(|| "Assertion failed: rows".to_string()),
            screenshot_path: None,
        }
    }

    #[test]
    fn suite_tally_counts_skipped() {
        let suite = TestSuiteResult::from_results(
            Utc::now(),
            Duration::from_millis(1500),
            2,
            vec![result("A", true), result("B", false), result("C", true)],
        );
        assert_eq!(suite.total, 5);
        assert_eq!(suite.passed, 2);
        assert_eq!(suite.failed, 1);
        assert_eq!(suite.skipped, 2);
        assert_eq!(suite.duration_ms, 1500);
        assert!(!suite.success());
    }

    #[test]
    fn selection_by_tag_and_name() {
        let (tagged, skipped) = Selection::Tagged("pagination".into())
            .apply(scenarios::all())
            .unwrap();
        assert_eq!(
            tagged.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec!["TC-EMP-002", "TC-EMP-005", "TC-EMP-006"]
        );
        assert_eq!(skipped, scenarios::all().len() - 3);

        let (named, _) = Selection::Named(vec!["filters".into(), "TC-EMP-007".into()])
            .apply(scenarios::all())
            .unwrap();
        assert_eq!(named.len(), 2);
    }

    #[test]
    fn unknown_name_is_an_error() {
        let err = Selection::Named(vec!["TC-EMP-404".into()])
            .apply(scenarios::all())
            .unwrap_err();
        assert!(matches!(err, E2eError::ScenarioNotFound(ref n) if n == "TC-EMP-404"));
    }

    #[test]
    fn results_are_written_as_json() {
        let dir = tempfile::tempdir().unwrap();
        let suite = TestSuiteResult::from_results(
            Utc::now(),
            Duration::from_millis(20),
            0,
            vec![result("TC-EMP-001", true)],
        );
        let path = write_results(&dir.path().join("out"), &suite).unwrap();
        let parsed: TestSuiteResult =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(parsed.total, 1);
        assert_eq!(parsed.results[0].id, "TC-EMP-001");
        assert!(parsed.success());
    }
}
