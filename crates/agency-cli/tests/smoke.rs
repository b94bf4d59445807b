//! The smoke-tester against a real listener on an ephemeral port.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use agency_cli::smoke::{self, DeploymentTester};
use agency_core::config::Settings;
use agency_core::llm::ScriptedChatModel;
use agency_core::state::AppStateInner;
use agency_server::{start_server_with_state, ServerConfig};

async fn start(database_url: String) -> String {
    let mut env: HashMap<&str, String> = HashMap::new();
    env.insert("OPENAI_API_KEY", "sk-test".to_string());
    env.insert("DATABASE_URL", database_url);
    env.insert(
        "MIGRATIONS_DIR",
        PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("../../migrations")
            .to_string_lossy()
            .to_string(),
    );
    let settings = Settings::from_lookup(|key| env.get(key).cloned()).unwrap();
    let state = AppStateInner::new(settings, Arc::new(ScriptedChatModel::default())).unwrap();
    // Creates the SQLite file; against an unreachable store this just fails.
    state.migrations.run(&state.db).await;

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let addr = start_server_with_state(config, Arc::new(state)).await.unwrap();
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_healthy_deployment_passes_every_check() {
    let dir = tempfile::tempdir().unwrap();
    let base_url = start(format!("sqlite://{}", dir.path().join("agency.db").display())).await;

    let report = DeploymentTester::new(&format!("{}/", base_url))
        .unwrap()
        .quiet(true)
        .run_all()
        .await;

    let names: Vec<_> = report.results.iter().map(|r| r.test.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "Health check",
            "Configuration",
            "Workflow list",
            "Database connection",
            "Chat workflow",
            "Learning workflow",
        ]
    );
    assert!(report.success(), "failures: {:?}", report.results);
    assert_eq!(report.base_url, base_url);
    assert_eq!(report.success_rate, 100.0);
}

#[tokio::test]
async fn test_unreachable_database_fails_only_that_check() {
    let base_url = start("postgres://u:p@127.0.0.1:1/none".to_string()).await;

    let report = DeploymentTester::new(&base_url).unwrap().quiet(true).run_all().await;

    let failed: Vec<_> = report
        .results
        .iter()
        .filter(|r| !r.success)
        .map(|r| r.test.as_str())
        .collect();
    assert_eq!(failed, vec!["Database connection"]);
    assert_eq!(report.failed_tests, 1);
}

#[tokio::test]
async fn test_run_writes_report_file() {
    let dir = tempfile::tempdir().unwrap();
    let base_url = start(format!("sqlite://{}", dir.path().join("agency.db").display())).await;
    let report_path = dir.path().join("deployment_test_report.json");

    smoke::run(&base_url, &report_path).await.unwrap();

    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report_path).unwrap()).unwrap();
    assert_eq!(report["base_url"], base_url.as_str());
    assert_eq!(report["total_tests"], 6);
    assert_eq!(report["passed_tests"], 6);
    assert_eq!(report["failed_tests"], 0);
    assert_eq!(report["results"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_run_fails_when_deployment_is_down() {
    let dir = tempfile::tempdir().unwrap();
    let report_path = dir.path().join("report.json");
    let err = smoke::run("http://127.0.0.1:1", &report_path).await.unwrap_err();
    assert!(err.contains("6 of 6"));
    assert!(report_path.exists());
}
