//! Command-level tests against mock providers

use scout_cli::cli::{CacheAction, CacheArgs};
use scout_cli::commands::execute_cache;
use scout_cli::commands::run::drive_batch;
use scout_cli::config::{Config, OutputFormat};
use scout_cli::input::parse_entities;
use scout_cli::{CliError, Formatter};
use scout_orchestrator::{JobOrchestrator, JobStatus, JobTemplate, PipelineConfig};
use scout_providers::{MockLlmProvider, MockSearchProvider};
use std::sync::Arc;
use tempfile::TempDir;

fn pipeline(dir: &TempDir) -> PipelineConfig {
    PipelineConfig {
        cache_dir: dir.path().to_path_buf(),
        base_backoff_ms: 10,
        max_backoff_ms: 50,
        ..PipelineConfig::default()
    }
}

#[tokio::test]
async fn test_drive_batch_reports_every_entity() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(&dir);
    let cache = Arc::new(config.open_cache().await.unwrap());
    let llm = MockLlmProvider::new(r#"{"email": "hello@corp.test"}"#);
    let orchestrator = JobOrchestrator::new(
        &config,
        MockSearchProvider::new(),
        llm,
        cache,
        JobTemplate::parse("{company} contact email", "Extract for {company}.", ["email"]).unwrap(),
    )
    .unwrap();

    let entities = parse_entities(
        r#"[
            {"id": "acme", "attributes": {"company": "Acme"}},
            {"id": "nameless"},
            {"id": "globex", "attributes": {"company": "Globex"}}
        ]"#,
    )
    .unwrap();

    let formatter = Formatter::new(OutputFormat::Json, false);
    let report = drive_batch(&orchestrator, entities, &formatter).await.unwrap();

    let statuses: Vec<JobStatus> = report.results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        [JobStatus::Success, JobStatus::Failed, JobStatus::Success]
    );
    assert_eq!(report.summary.total, 3);
    assert!(!report.summary.cancelled);

    let rendered = formatter
        .format_report(&report, &["email".to_string()])
        .unwrap();
    let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
    assert_eq!(value["results"][2]["extracted_fields"]["email"], "hello@corp.test");
}

#[tokio::test]
async fn test_drive_batch_rejects_empty_input() {
    let dir = TempDir::new().unwrap();
    let config = pipeline(&dir);
    let cache = Arc::new(config.open_cache().await.unwrap());
    let orchestrator = JobOrchestrator::new(
        &config,
        MockSearchProvider::new(),
        MockLlmProvider::default(),
        cache,
        JobTemplate::parse("{company}", "Extract.", ["email"]).unwrap(),
    )
    .unwrap();

    let formatter = Formatter::new(OutputFormat::Table, false);
    let result = drive_batch(&orchestrator, Vec::new(), &formatter).await;
    assert!(matches!(result, Err(CliError::InvalidInput(_))));
}

#[tokio::test]
async fn test_cache_clear_empties_directory() {
    let dir = TempDir::new().unwrap();
    let config = Config {
        pipeline: pipeline(&dir),
        ..Config::default()
    };

    let cache = config.pipeline.open_cache().await.unwrap();
    cache.put("Acme contact email", &"payload").await.unwrap();
    cache.put("Globex contact email", &"payload").await.unwrap();
    assert_eq!(cache.stats().await.unwrap().entries, 2);

    let formatter = Formatter::new(OutputFormat::Table, false);
    execute_cache(
        CacheArgs {
            action: CacheAction::Clear,
        },
        &config,
        &formatter,
    )
    .await
    .unwrap();

    assert_eq!(cache.stats().await.unwrap().entries, 0);
}
