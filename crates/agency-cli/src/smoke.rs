//! `agency smoke-test` — exercise a running deployment over HTTP.
//!
//! Six checks run in a fixed order against the base URL. Every check is
//! recorded; a failing check never stops the ones after it.

use std::path::Path;
use std::time::Duration;

use console::style;
use serde::Serialize;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REPORT_PATH: &str = "deployment_test_report.json";

const TIMEOUT: Duration = Duration::from_secs(30);
const SUMMARY_KEYS: &[&str] = &["result", "response", "summary"];

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub test: String,
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SmokeReport {
    pub base_url: String,
    pub total_tests: usize,
    pub passed_tests: usize,
    pub failed_tests: usize,
    pub success_rate: f64,
    pub results: Vec<CheckResult>,
}

impl SmokeReport {
    fn from_results(base_url: &str, results: Vec<CheckResult>) -> Self {
        let total_tests = results.len();
        let passed_tests = results.iter().filter(|r| r.success).count();
        let success_rate = if total_tests == 0 {
            0.0
        } else {
            passed_tests as f64 / total_tests as f64 * 100.0
        };
        Self {
            base_url: base_url.to_string(),
            total_tests,
            passed_tests,
            failed_tests: total_tests - passed_tests,
            success_rate,
            results,
        }
    }

    pub fn success(&self) -> bool {
        self.failed_tests == 0
    }

    pub fn print_summary(&self) {
        println!();
        println!("{}", "=".repeat(60));
        println!("{}", style("Test report").bold());
        println!("{}", "=".repeat(60));
        println!("Total:   {}", self.total_tests);
        println!("Passed:  {}", style(self.passed_tests).green());
        println!("Failed:  {}", style(self.failed_tests).red());
        println!("Success: {:.1}%", self.success_rate);

        if !self.success() {
            println!();
            println!("{}", style("Failed checks:").red());
            for result in self.results.iter().filter(|r| !r.success) {
                println!("  - {}: {}", result.test, result.message);
            }
        }
        println!("{}", "=".repeat(60));
    }

    pub fn write(&self, path: &Path) -> Result<(), String> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize report: {}", e))?;
        std::fs::write(path, json)
            .map_err(|e| format!("Failed to write report to {}: {}", path.display(), e))
    }
}

/// Why a request did not produce a JSON body worth inspecting.
struct Failure {
    message: String,
    data: Option<serde_json::Value>,
}

pub struct DeploymentTester {
    base_url: String,
    client: reqwest::Client,
    results: Vec<CheckResult>,
    quiet: bool,
}

impl DeploymentTester {
    pub fn new(base_url: &str) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            results: Vec::new(),
            quiet: false,
        })
    }

    /// Suppress per-check output.
    pub fn quiet(mut self, quiet: bool) -> Self {
        self.quiet = quiet;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn run_all(mut self) -> SmokeReport {
        if !self.quiet {
            println!("Testing deployment at {}", style(&self.base_url).cyan());
            println!("{}", "=".repeat(60));
        }

        self.check_health().await;
        self.check_config().await;
        self.check_workflow_list().await;
        self.check_database().await;
        self.check_workflow(
            "Chat workflow",
            "chat_assistant",
            serde_json::json!({ "message": "Hello, this is a test message." }),
        )
        .await;
        self.check_workflow(
            "Learning workflow",
            "simple_learning",
            serde_json::json!({
                "message": "I want to learn about Python programming.",
                "max_rounds": 2,
            }),
        )
        .await;

        SmokeReport::from_results(&self.base_url, self.results)
    }

    async fn check_health(&mut self) {
        let name = "Health check";
        match self.get("/health").await {
            Ok(data) if data["status"] == "healthy" => self.record(name, true, "Application is running", Some(data)),
            Ok(data) => self.record(name, false, "Unexpected application status", Some(data)),
            Err(f) => self.record(name, false, &f.message, f.data),
        }
    }

    async fn check_config(&mut self) {
        let name = "Configuration";
        match self.get("/config").await {
            Ok(data) => {
                let missing: Vec<&str> = ["openai_model", "version"]
                    .into_iter()
                    .filter(|field| data.get(field).is_none())
                    .collect();
                if missing.is_empty() {
                    self.record(name, true, "Configuration is complete", Some(data));
                } else {
                    let message = format!("Missing fields: {:?}", missing);
                    self.record(name, false, &message, Some(data));
                }
            }
            Err(f) => self.record(name, false, &f.message, f.data),
        }
    }

    async fn check_workflow_list(&mut self) {
        let name = "Workflow list";
        match self.get("/workflows").await {
            Ok(data) => {
                let names: Vec<String> = data["workflows"]
                    .as_array()
                    .map(|list| {
                        list.iter()
                            .filter_map(|wf| wf["name"].as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                if names.is_empty() {
                    self.record(name, false, "No workflows found", Some(data));
                } else {
                    let message = format!("Found {} workflow(s): {:?}", names.len(), names);
                    self.record(name, true, &message, Some(data));
                }
            }
            Err(f) => self.record(name, false, &f.message, f.data),
        }
    }

    async fn check_database(&mut self) {
        let name = "Database connection";
        match self.get("/db/status").await {
            Ok(data) if data["database_connected"] == true => {
                self.record(name, true, "Database is reachable", Some(data))
            }
            Ok(data) => self.record(name, false, "Database is unreachable", Some(data)),
            Err(f) => self.record(name, false, &f.message, f.data),
        }
    }

    async fn check_workflow(&mut self, name: &str, workflow: &str, payload: serde_json::Value) {
        let url = format!("{}/workflows/{}", self.base_url, workflow);
        let request = self.client.post(url).json(&payload);
        match self.fetch(request).await {
            Ok(data) if SUMMARY_KEYS.iter().any(|key| data.get(key).is_some()) => {
                let keys: Vec<String> = data
                    .as_object()
                    .map(|o| o.keys().cloned().collect())
                    .unwrap_or_default();
                self.record(
                    name,
                    true,
                    "Workflow completed",
                    Some(serde_json::json!({ "response_keys": keys })),
                );
            }
            Ok(data) => self.record(name, false, "Unexpected response shape", Some(data)),
            Err(f) => self.record(name, false, &f.message, f.data),
        }
    }

    async fn get(&self, path: &str) -> Result<serde_json::Value, Failure> {
        let request = self.client.get(format!("{}{}", self.base_url, path));
        self.fetch(request).await
    }

    /// A 200 response with a JSON body, or the reason there was none.
    async fn fetch(&self, request: reqwest::RequestBuilder) -> Result<serde_json::Value, Failure> {
        let response = request.send().await.map_err(|e| Failure {
            message: format!("Request failed: {}", e),
            data: None,
        })?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(Failure {
                message: format!("HTTP {}", status.as_u16()),
                data: Some(serde_json::Value::String(body)),
            });
        }

        response.json::<serde_json::Value>().await.map_err(|e| Failure {
            message: format!("Request failed: {}", e),
            data: None,
        })
    }

    fn record(&mut self, test: &str, success: bool, message: &str, data: Option<serde_json::Value>) {
        if !self.quiet {
            let marker = if success {
                style("PASS").green().bold()
            } else {
                style("FAIL").red().bold()
            };
            println!("{} {}: {}", marker, test, message);
            if !success {
                if let Some(data) = &data {
                    println!("   details: {}", data);
                }
            }
        }

        self.results.push(CheckResult {
            test: test.to_string(),
            success,
            message: message.to_string(),
            data,
        });
    }
}

/// Run every check, print the summary and write the report file.
pub async fn run(base_url: &str, report_path: &Path) -> Result<(), String> {
    let tester = DeploymentTester::new(base_url)?;
    let report = tester.run_all().await;
    report.print_summary();
    report.write(report_path)?;
    println!("Report saved to {}", report_path.display());

    if report.success() {
        println!("{}", style("All checks passed. Deployment is healthy.").green());
        Ok(())
    } else {
        Err(format!(
            "{} of {} checks failed, check the deployment configuration",
            report.failed_tests, report.total_tests
        ))
    }
}
