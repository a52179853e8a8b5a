//! Run orchestration: dispatch, gate, normalize, diff, report

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use url::Url;

use crate::case::TestCase;
use crate::dispatch::{Dispatched, Dispatcher, HttpTransport, ResponseResult, Transport};
use crate::error::{TowelError, TowelResult};
use crate::golden;
use crate::normalize::NormalizerRegistry;
use crate::suite::{self, SUITE_FILE};

/// How a single case ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Fail,
    /// Setup case whose script ran or was skipped
    Setup,
}

/// Result of running a single case
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseReport {
    pub index: usize,
    pub label: String,
    pub outcome: Outcome,
    pub reason: Option<String>,
    pub diff: Option<String>,
}

impl CaseReport {
    fn ok(case: &TestCase) -> Self {
        Self {
            index: case.index,
            label: case.label(),
            outcome: Outcome::Ok,
            reason: None,
            diff: None,
        }
    }

    fn setup(case: &TestCase) -> Self {
        Self {
            outcome: Outcome::Setup,
            ..Self::ok(case)
        }
    }

    fn fail(case: &TestCase, reason: String, diff: Option<String>) -> Self {
        error!("FAIL: {}", reason);
        if let Some(diff) = &diff {
            error!("\n{}", diff);
        }
        Self {
            outcome: Outcome::Fail,
            reason: Some(reason),
            diff,
            ..Self::ok(case)
        }
    }
}

/// Result of running a whole suite
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub setups: usize,
    pub duration_ms: u64,
    pub cases: Vec<CaseReport>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.failed == 0
    }

    fn record(&mut self, report: CaseReport) {
        self.total += 1;
        match report.outcome {
            Outcome::Ok => self.passed += 1,
            Outcome::Fail => self.failed += 1,
            Outcome::Setup => self.setups += 1,
        }
        self.cases.push(report);
    }
}

/// Configuration for the test runner
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Server every relative URL is resolved against
    pub base_url: Url,

    /// Interpreter for setup scripts
    pub setup_shell: String,

    /// Per-request timeout; `None` waits indefinitely
    pub request_timeout: Option<Duration>,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://127.0.0.1:9292").expect("static URL is valid"),
            setup_shell: "bash".to_string(),
            request_timeout: None,
        }
    }
}

/// `<address>:<port>` as a base URL
pub fn server_url(address: &str, port: u16) -> TowelResult<Url> {
    let raw = format!("{}:{}", address.trim_end_matches('/'), port);
    Url::parse(&raw).map_err(|e| TowelError::InvalidUrl {
        url: raw.clone(),
        reason: e.to_string(),
    })
}

/// Golden-file test runner
pub struct TestRunner {
    config: RunnerConfig,
    dispatcher: Dispatcher,
    normalizers: NormalizerRegistry,
}

impl TestRunner {
    /// Create a runner talking HTTP to `config.base_url`
    pub fn new(config: RunnerConfig) -> TowelResult<Self> {
        let transport = HttpTransport::new(config.request_timeout)?;
        Ok(Self::with_transport(config, Box::new(transport)))
    }

    pub fn with_transport(config: RunnerConfig, transport: Box<dyn Transport>) -> Self {
        let dispatcher = Dispatcher::new(transport, config.setup_shell.clone());
        Self {
            config,
            dispatcher,
            normalizers: NormalizerRegistry::default(),
        }
    }

    /// Registry consulted for response bodies; register extra content types here
    pub fn normalizers_mut(&mut self) -> &mut NormalizerRegistry {
        &mut self.normalizers
    }

    /// Run `<test_dir>/towel.xml`.
    ///
    /// Only suite loading errors are returned; every case failure ends up in
    /// the report. A missing suite is an empty run.
    pub async fn run(&self, test_dir: &Path) -> TowelResult<RunReport> {
        let document = test_dir.join(SUITE_FILE);
        let cases = match suite::load(&document, test_dir, &self.config.base_url) {
            Ok(cases) => cases,
            Err(TowelError::MissingTestSuite(path)) => {
                warn!("No {} found, ignoring run command", path.display());
                return Ok(RunReport::default());
            }
            Err(e) => return Err(e),
        };

        Ok(self.run_cases(&cases).await)
    }

    /// Run already loaded cases strictly one after another
    pub async fn run_cases(&self, cases: &[TestCase]) -> RunReport {
        let start = Instant::now();
        let mut report = RunReport::default();

        info!("Running {} request(s) against {}", cases.len(), self.config.base_url);

        for case in cases {
            info!("-----Running {} #{}-----", case, case.index);
            let case_report = self.run_case(case).await;
            if case_report.outcome == Outcome::Ok {
                info!("OK");
            }
            report.record(case_report);
        }

        report.duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Results: {} passed, {} failed, {} setup ({} ms)",
            report.passed, report.failed, report.setups, report.duration_ms
        );
        report
    }

    async fn run_case(&self, case: &TestCase) -> CaseReport {
        let response = match self.dispatcher.dispatch(case).await {
            Ok(Dispatched::Response(response)) => response,
            Ok(Dispatched::SetupDone | Dispatched::SetupSkipped) => return CaseReport::setup(case),
            Err(e) => return CaseReport::fail(case, e.to_string(), None),
        };

        if let Err(e) = gate(case, &response) {
            let report = CaseReport::fail(case, e.to_string(), None);
            error!("Actual response (won't be saved)\n{}", response.body);
            return report;
        }

        let canonical = match self
            .normalizers
            .normalize(&case.expected_content_type, &response.body)
        {
            Ok(text) => text,
            Err(e) => return CaseReport::fail(case, e.to_string(), None),
        };

        let Some(golden_path) = case.result_path.as_deref() else {
            let e = TowelError::MissingAttribute {
                index: case.index,
                attribute: "result",
            };
            return CaseReport::fail(case, e.to_string(), None);
        };

        match golden::compare(golden_path, &canonical) {
            Ok(comparison) if comparison.matched => CaseReport::ok(case),
            Ok(comparison) => CaseReport::fail(
                case,
                "Expected response is different from actual".to_string(),
                Some(comparison.diff),
            ),
            Err(e) => CaseReport::fail(case, e.to_string(), None),
        }
    }

    /// Promote staged files under `test_dir` to golden files
    pub fn fixate(&self, test_dir: &Path) -> TowelResult<Vec<PathBuf>> {
        let promoted = golden::fixate(test_dir)?;
        info!("Fixated {} response(s) in {}", promoted.len(), test_dir.display());
        Ok(promoted)
    }

    /// Write a run report as pretty JSON
    pub fn write_report(&self, report: &RunReport, path: &Path) -> TowelResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(report)?;
        std::fs::write(path, json)?;

        info!("Report written to: {}", path.display());
        Ok(())
    }
}

/// Status and content type must both match before the body is looked at
fn gate(case: &TestCase, response: &ResponseResult) -> TowelResult<()> {
    if response.status == case.expected_status
        && response.content_type == case.expected_content_type
    {
        return Ok(());
    }

    Err(TowelError::GateMismatch {
        expected_status: case.expected_status,
        actual_status: response.status,
        expected_content_type: case.expected_content_type.clone(),
        actual_content_type: response.content_type.clone(),
    })
}
