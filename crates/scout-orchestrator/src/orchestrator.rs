//! Bounded worker pool driving entities through search and extraction

use crate::config::PipelineConfig;
use crate::error::OrchestratorError;
use crate::types::{BatchReport, BatchSummary, JobResult, JobStage, JobStatus, JobTimings};
use scout_dispatch::{DispatchError, RetryPolicy, SearchClient};
use scout_domain::{normalize_query, Entity, LlmProvider, QueryTemplate, SearchProvider};
use scout_extractor::{ExtractedFields, ExtractionClient, ExtractionRequest};
use scout_store::ResultCache;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// What to search for and what to extract, shared by every entity in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTemplate {
    query: QueryTemplate,
    prompt: QueryTemplate,
    fields: Vec<String>,
}

impl JobTemplate {
    /// Combine parsed templates with the requested field names
    ///
    /// Field names are trimmed; blanks and duplicates are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestratorError::NoFields`] if no field name remains.
    pub fn new(
        query: QueryTemplate,
        prompt: QueryTemplate,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, OrchestratorError> {
        let mut unique: Vec<String> = Vec::new();
        for field in fields {
            let field = field.into().trim().to_string();
            if !field.is_empty() && !unique.contains(&field) {
                unique.push(field);
            }
        }
        if unique.is_empty() {
            return Err(OrchestratorError::NoFields);
        }

        Ok(Self {
            query,
            prompt,
            fields: unique,
        })
    }

    /// Parse both templates and combine them with the field names
    pub fn parse(
        query: &str,
        prompt: &str,
        fields: impl IntoIterator<Item = impl Into<String>>,
    ) -> Result<Self, OrchestratorError> {
        Self::new(QueryTemplate::parse(query)?, QueryTemplate::parse(prompt)?, fields)
    }

    /// Search query template
    pub fn query(&self) -> &QueryTemplate {
        &self.query
    }

    /// Extraction prompt template
    pub fn prompt(&self) -> &QueryTemplate {
        &self.prompt
    }

    /// Requested field names
    pub fn fields(&self) -> &[String] {
        &self.fields
    }
}

/// Everything a worker needs, shared behind one `Arc`
struct Pipeline<S, L> {
    search: SearchClient<S>,
    extractor: ExtractionClient<L>,
    cache: Arc<ResultCache>,
    template: JobTemplate,
}

/// Counters gathered while one entity moves through the pipeline
#[derive(Debug, Default)]
struct Progress {
    search_attempts: u32,
    extraction_attempts: u32,
    search_ms: u64,
    extraction_ms: u64,
    cache_hit: bool,
    cache_write_failed: bool,
}

/// A finished entity plus the counters the batch summary needs
struct Outcome {
    result: JobResult,
    progress: Progress,
}

impl Outcome {
    fn skipped(entity: &Entity, position: usize) -> Self {
        Self {
            result: JobResult::skipped(entity, position),
            progress: Progress::default(),
        }
    }
}

/// Runs batches of entities through cache, search and extraction
///
/// A batch is processed by `worker_concurrency` tasks that pull the next
/// entity index from a shared cursor. Quotas are enforced by the shared
/// rate limiter, not by the pool width. A failing entity never affects the
/// others, and every entity yields exactly one [`JobResult`].
///
/// # Examples
///
/// ```no_run
/// use scout_domain::Entity;
/// use scout_orchestrator::{JobOrchestrator, JobTemplate, PipelineConfig};
/// use scout_providers::{MockLlmProvider, MockSearchProvider};
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = PipelineConfig::default();
/// let cache = Arc::new(config.open_cache().await?);
/// let template = JobTemplate::parse(
///     "{company} contact email",
///     "Find the contact email of {company}.",
///     ["email"],
/// )?;
///
/// let orchestrator = JobOrchestrator::new(
///     &config,
///     MockSearchProvider::new(),
///     MockLlmProvider::new(r#"{"email": "info@acme.test"}"#),
///     cache,
///     template,
/// )?;
///
/// let entities = vec![Entity::new("1").with_attribute("company", "Acme")];
/// let report = orchestrator.run(entities, CancellationToken::new()).await?;
/// println!("{}", report.summary.summary());
/// # Ok(())
/// # }
/// ```
pub struct JobOrchestrator<S, L> {
    pipeline: Arc<Pipeline<S, L>>,
    concurrency: usize,
}

impl<S, L> JobOrchestrator<S, L>
where
    S: SearchProvider + 'static,
    L: LlmProvider + 'static,
{
    /// Build clients, quotas and retry policy from a configuration
    ///
    /// # Errors
    ///
    /// Returns error if the configuration does not validate.
    pub fn new(
        config: &PipelineConfig,
        search_provider: S,
        llm_provider: L,
        cache: Arc<ResultCache>,
        template: JobTemplate,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;

        let limiter = Arc::new(config.rate_limiter());
        let retry = RetryPolicy::new(config.retry_config());

        let search = SearchClient::new(search_provider, Arc::clone(&limiter), retry.clone())
            .with_timeouts(config.client_timeouts());
        let extractor = ExtractionClient::new(llm_provider, limiter, retry)
            .with_timeouts(config.client_timeouts())
            .with_config(config.extraction.clone());

        Ok(Self::from_parts(
            search,
            extractor,
            cache,
            template,
            config.worker_concurrency,
        ))
    }

    /// Assemble an orchestrator from ready-made clients
    pub fn from_parts(
        search: SearchClient<S>,
        extractor: ExtractionClient<L>,
        cache: Arc<ResultCache>,
        template: JobTemplate,
        worker_concurrency: usize,
    ) -> Self {
        Self {
            pipeline: Arc::new(Pipeline {
                search,
                extractor,
                cache,
                template,
            }),
            concurrency: worker_concurrency.max(1),
        }
    }

    /// The search client
    pub fn search_client(&self) -> &SearchClient<S> {
        &self.pipeline.search
    }

    /// The extraction client
    pub fn extraction_client(&self) -> &ExtractionClient<L> {
        &self.pipeline.extractor
    }

    /// The result cache
    pub fn cache(&self) -> &ResultCache {
        &self.pipeline.cache
    }

    /// Maximum entities in flight
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Start a batch in the background
    ///
    /// Results arrive on the returned handle as entities finish. Once `cancel`
    /// fires, no new provider call starts; entities not yet finished are
    /// reported as skipped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(&self, entities: Vec<Entity>, cancel: CancellationToken) -> BatchHandle {
        let batch_id = Uuid::now_v7();
        let total = entities.len();
        let entities: Arc<[Entity]> = entities.into();
        let cursor = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = mpsc::unbounded_channel();
        let workers = self.concurrency.min(total).max(1);
        let started = Instant::now();

        info!(
            "Starting batch {} with {} entities on {} workers",
            batch_id, total, workers
        );

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let pipeline = Arc::clone(&self.pipeline);
            let entities = Arc::clone(&entities);
            let cursor = Arc::clone(&cursor);
            let tx = tx.clone();
            let cancel = cancel.clone();
            handles.push(tokio::spawn(async move {
                pipeline
                    .work(worker_id, &entities, &cursor, &tx, &cancel)
                    .await
            }));
        }
        drop(tx);

        let supervisor = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let mut summary = BatchSummary {
                    batch_id,
                    total,
                    ..BatchSummary::default()
                };
                for handle in handles {
                    let tally = handle
                        .await
                        .map_err(|e| OrchestratorError::Worker(e.to_string()))?;
                    summary.merge(&tally);
                }
                summary.wall_time_ms = millis(started.elapsed());
                summary.cancelled = cancel.is_cancelled();

                info!("Batch {} finished:\n{}", batch_id, summary.summary());
                Ok(summary)
            })
        };

        BatchHandle {
            batch_id,
            total,
            results: rx,
            supervisor,
            cancel,
        }
    }

    /// Run a batch to completion and return results in input order
    ///
    /// # Errors
    ///
    /// Returns error only if a worker task panicked. Per-entity failures are
    /// reported in the results.
    pub async fn run(
        &self,
        entities: Vec<Entity>,
        cancel: CancellationToken,
    ) -> Result<BatchReport, OrchestratorError> {
        let mut handle = self.spawn(entities, cancel);

        let mut results = Vec::with_capacity(handle.total());
        while let Some(result) = handle.next_result().await {
            results.push(result);
        }

        let summary = handle.finish().await?;
        results.sort_by_key(|r| r.position);

        Ok(BatchReport { results, summary })
    }
}

impl<S: SearchProvider, L: LlmProvider> Pipeline<S, L> {
    async fn work(
        &self,
        worker_id: usize,
        entities: &[Entity],
        cursor: &AtomicUsize,
        results: &mpsc::UnboundedSender<JobResult>,
        cancel: &CancellationToken,
    ) -> BatchSummary {
        let mut tally = BatchSummary::default();

        loop {
            let position = cursor.fetch_add(1, Ordering::Relaxed);
            let Some(entity) = entities.get(position) else {
                break;
            };
            debug!(
                "Entity {}: {} (worker {}, position {})",
                entity.id,
                JobStage::Pending,
                worker_id,
                position
            );

            let outcome = if cancel.is_cancelled() {
                Outcome::skipped(entity, position)
            } else {
                self.process(entity, position, cancel).await
            };

            tally.record(&outcome.result);
            tally.search_calls += u64::from(outcome.progress.search_attempts);
            tally.extraction_calls += u64::from(outcome.progress.extraction_attempts);
            if outcome.progress.cache_write_failed {
                tally.cache_write_errors += 1;
            }

            if results.send(outcome.result).is_err() {
                debug!("Result receiver dropped, worker {} continues silently", worker_id);
            }
        }

        debug!("Worker {} finished", worker_id);
        tally
    }

    async fn process(&self, entity: &Entity, position: usize, cancel: &CancellationToken) -> Outcome {
        let started = Instant::now();
        let mut progress = Progress::default();

        debug!("Entity {}: {}", entity.id, JobStage::CacheLookup);
        let query = match self.template.query.render(&entity.attributes) {
            Ok(query) => normalize_query(&query),
            Err(e) => return finish(entity, position, Err(e.into()), started, progress),
        };

        let search_started = Instant::now();
        let fetched = {
            let attempts = &mut progress.search_attempts;
            let search = &self.search;
            let id = &entity.id;
            let q = query.as_str();
            self.cache
                .get_or_fetch(q, move || async move {
                    debug!("Entity {}: {} for '{}'", id, JobStage::Searching, q);
                    let attempted = search.search_with_retry(q, cancel).await;
                    *attempts = attempted.attempts;
                    attempted.result
                })
                .await
        };
        progress.search_ms = millis(search_started.elapsed());

        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => return finish(entity, position, Err(e), started, progress),
        };
        progress.cache_hit = fetched.cache_hit;
        if let Some(e) = &fetched.store_error {
            warn!("Entity {}: search result not cached: {}", entity.id, e);
            progress.cache_write_failed = true;
        }
        let raw = fetched.value;

        debug!("Entity {}: {}", entity.id, JobStage::Extracting);
        let extraction_started = Instant::now();
        let request = ExtractionRequest {
            raw_result: &raw,
            prompt_template: &self.template.prompt,
            attributes: &entity.attributes,
            fields: &self.template.fields,
        };
        let attempted = self.extractor.extract(&request, cancel).await;
        progress.extraction_attempts = attempted.attempts;
        progress.extraction_ms = millis(extraction_started.elapsed());

        finish(entity, position, attempted.result, started, progress)
    }
}

fn finish(
    entity: &Entity,
    position: usize,
    result: Result<ExtractedFields, DispatchError>,
    started: Instant,
    progress: Progress,
) -> Outcome {
    let (status, extracted_fields, error) = match result {
        Ok(fields) => (JobStatus::Success, fields, None),
        Err(DispatchError::Cancelled) => (
            JobStatus::Skipped,
            ExtractedFields::new(),
            Some(DispatchError::Cancelled),
        ),
        Err(e) => (JobStatus::Failed, ExtractedFields::new(), Some(e)),
    };

    match (&status, &error) {
        (JobStatus::Failed, Some(e)) => {
            warn!("Entity {}: {} ({})", entity.id, JobStage::Failed, e)
        }
        (JobStatus::Skipped, _) => debug!("Entity {}: {}", entity.id, JobStage::Skipped),
        _ => debug!("Entity {}: {}", entity.id, JobStage::Succeeded),
    }

    Outcome {
        result: JobResult {
            entity_id: entity.id.clone(),
            position,
            status,
            extracted_fields,
            error,
            attempt_count: progress.search_attempts,
            extraction_attempts: progress.extraction_attempts,
            timings: JobTimings {
                total_ms: millis(started.elapsed()),
                search_ms: progress.search_ms,
                extraction_ms: progress.extraction_ms,
                cache_hit: progress.cache_hit,
            },
        },
        progress,
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// A running batch
///
/// Yields [`JobResult`]s as entities finish, in completion order.
pub struct BatchHandle {
    batch_id: Uuid,
    total: usize,
    results: mpsc::UnboundedReceiver<JobResult>,
    supervisor: JoinHandle<Result<BatchSummary, OrchestratorError>>,
    cancel: CancellationToken,
}

impl BatchHandle {
    /// Identifier of the batch
    pub fn batch_id(&self) -> Uuid {
        self.batch_id
    }

    /// Number of entities submitted
    pub fn total(&self) -> usize {
        self.total
    }

    /// Next finished entity, or `None` once every worker has stopped
    pub async fn next_result(&mut self) -> Option<JobResult> {
        self.results.recv().await
    }

    /// Request cancellation of the batch
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token controlling the batch
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for every worker and return the summary
    ///
    /// Results not yet received are discarded.
    pub async fn finish(self) -> Result<BatchSummary, OrchestratorError> {
        drop(self.results);
        self.supervisor
            .await
            .map_err(|e| OrchestratorError::Worker(e.to_string()))?
    }
}
