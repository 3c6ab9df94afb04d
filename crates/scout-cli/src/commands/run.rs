//! Run command implementation.

use crate::cli::RunArgs;
use crate::config::Config;
use crate::error::{CliError, Result};
use crate::input::load_entities;
use crate::output::Formatter;
use scout_domain::{Entity, LlmProvider, SearchProvider};
use scout_orchestrator::{BatchReport, JobOrchestrator, JobTemplate, PipelineConfig};
use scout_providers::{HttpSearchProvider, OllamaProvider};
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Execute the run command.
pub async fn execute_run(args: RunArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let mut pipeline = config.pipeline.clone();
    if let Some(concurrency) = args.concurrency {
        pipeline.worker_concurrency = concurrency;
    }

    let entities = load_entities(&args.entities)?;
    let template = JobTemplate::parse(&args.query_template, &args.prompt_template, args.fields)?;
    let fields = template.fields().to_vec();

    let orchestrator = build_orchestrator(&pipeline, template).await?;
    let report = drive_batch(&orchestrator, entities, formatter).await?;

    let rendered = formatter.format_report(&report, &fields)?;
    match &args.output {
        Some(path) => {
            fs::write(path, rendered)?;
            eprintln!(
                "{}",
                formatter.success(&format!("Wrote {} result(s) to {}", report.results.len(), path.display()))
            );
        }
        None => println!("{}", rendered),
    }

    eprintln!("{}", formatter.summary(&report.summary));
    if report.summary.cancelled {
        eprintln!("{}", formatter.warning("Batch was interrupted; skipped entities can be rerun"));
    }

    Ok(())
}

/// Build an orchestrator over the HTTP search API and Ollama.
pub async fn build_orchestrator(
    pipeline: &PipelineConfig,
    template: JobTemplate,
) -> Result<JobOrchestrator<HttpSearchProvider, OllamaProvider>> {
    pipeline.validate()?;
    let timeout = Duration::from_secs(pipeline.request_timeout_secs);

    let mut search = HttpSearchProvider::new(&pipeline.search.endpoint, timeout)?
        .with_max_results(pipeline.search.max_results);
    match pipeline.search.api_key() {
        Some(key) => search = search.with_api_key(key),
        None => warn!(
            "{} is not set, searching without an API key",
            pipeline.search.api_key_env
        ),
    }

    let llm = OllamaProvider::with_timeout(&pipeline.llm.endpoint, &pipeline.llm.model, timeout)?;
    let cache = Arc::new(pipeline.open_cache().await?);

    Ok(JobOrchestrator::new(pipeline, search, llm, cache, template)?)
}

/// Run a batch, printing progress to stderr, until it completes or Ctrl+C.
///
/// An interrupt cancels the batch; the report still holds one result per
/// entity, with unfinished ones marked skipped.
pub async fn drive_batch<S, L>(
    orchestrator: &JobOrchestrator<S, L>,
    entities: Vec<Entity>,
    formatter: &Formatter,
) -> Result<BatchReport>
where
    S: SearchProvider + 'static,
    L: LlmProvider + 'static,
{
    if entities.is_empty() {
        return Err(CliError::InvalidInput("No entities provided".to_string()));
    }

    let mut handle = orchestrator.spawn(entities, CancellationToken::new());
    let cancel = handle.cancellation_token().clone();
    let total = handle.total();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);
    let mut interrupted = false;

    let mut results = Vec::with_capacity(total);
    loop {
        tokio::select! {
            next = handle.next_result() => match next {
                Some(result) => {
                    eprintln!("{}", formatter.progress(results.len() + 1, total, &result));
                    results.push(result);
                }
                None => break,
            },
            signal = &mut ctrl_c, if !interrupted => {
                interrupted = true;
                match signal {
                    Ok(()) => {
                        info!("Interrupt received, cancelling batch");
                        eprintln!("{}", formatter.warning("Cancelling, waiting for in-flight calls"));
                        cancel.cancel();
                    }
                    Err(e) => warn!("Failed to listen for Ctrl+C: {}", e),
                }
            }
        }
    }

    let summary = handle.finish().await?;
    results.sort_by_key(|r| r.position);

    Ok(BatchReport { results, summary })
}
