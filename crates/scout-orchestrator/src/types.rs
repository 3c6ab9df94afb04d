//! Per-entity results and batch summaries

use scout_dispatch::DispatchError;
use scout_domain::{Entity, EntityId};
use scout_extractor::ExtractedFields;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Terminal state of one entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Fields were extracted
    Success,
    /// Search or extraction failed fatally or ran out of retries
    Failed,
    /// Cancellation stopped the entity before it finished
    Skipped,
}

impl JobStatus {
    /// Stable lowercase name
    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Success => "success",
            JobStatus::Failed => "failed",
            JobStatus::Skipped => "skipped",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an entity is in the pipeline
///
/// `Pending → CacheLookup → {Searching} → Extracting → {Succeeded | Failed}`,
/// or `Skipped` once cancellation is observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStage {
    /// Claimed by a worker, not yet started
    Pending,
    /// Rendering the query and checking the cache
    CacheLookup,
    /// Cache miss, calling the search provider
    Searching,
    /// Calling the model
    Extracting,
    /// Finished with fields
    Succeeded,
    /// Finished with an error
    Failed,
    /// Stopped by cancellation
    Skipped,
}

impl fmt::Display for JobStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobStage::Pending => "pending",
            JobStage::CacheLookup => "cache_lookup",
            JobStage::Searching => "searching",
            JobStage::Extracting => "extracting",
            JobStage::Succeeded => "succeeded",
            JobStage::Failed => "failed",
            JobStage::Skipped => "skipped",
        };
        f.write_str(name)
    }
}

/// Wall-clock breakdown for one entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobTimings {
    /// Whole entity, milliseconds
    pub total_ms: u64,
    /// Cache lookup plus search, milliseconds
    pub search_ms: u64,
    /// Extraction, milliseconds
    pub extraction_ms: u64,
    /// The search result came from the cache
    pub cache_hit: bool,
}

/// Outcome for one entity
///
/// Created once when the entity reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Entity this result belongs to
    pub entity_id: EntityId,
    /// Index of the entity in the batch input
    pub position: usize,
    /// Terminal status
    pub status: JobStatus,
    /// Requested fields; empty unless the status is `success`
    pub extracted_fields: ExtractedFields,
    /// Why the entity failed or was skipped
    pub error: Option<DispatchError>,
    /// Search attempts issued; zero on a cache hit
    pub attempt_count: u32,
    /// Extraction attempts issued
    pub extraction_attempts: u32,
    /// Time spent per stage
    pub timings: JobTimings,
}

impl JobResult {
    /// Result for an entity that was never started
    pub fn skipped(entity: &Entity, position: usize) -> Self {
        Self {
            entity_id: entity.id.clone(),
            position,
            status: JobStatus::Skipped,
            extracted_fields: ExtractedFields::new(),
            error: Some(DispatchError::Cancelled),
            attempt_count: 0,
            extraction_attempts: 0,
            timings: JobTimings::default(),
        }
    }

    /// Whether the entity finished with fields
    pub fn is_success(&self) -> bool {
        self.status == JobStatus::Success
    }
}

/// Aggregate counters for a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Identifier of the batch
    pub batch_id: Uuid,
    /// Entities submitted
    pub total: usize,
    /// Entities with status `success`
    pub succeeded: usize,
    /// Entities with status `failed`
    pub failed: usize,
    /// Entities with status `skipped`
    pub skipped: usize,
    /// Entities whose search result came from the cache
    pub cache_hits: usize,
    /// Search attempts issued
    pub search_calls: u64,
    /// Extraction attempts issued
    pub extraction_calls: u64,
    /// Fresh search results that could not be written to the cache
    pub cache_write_errors: usize,
    /// Batch wall time, milliseconds
    pub wall_time_ms: u64,
    /// Cancellation was requested before the batch finished
    pub cancelled: bool,
}

impl BatchSummary {
    /// Search plus extraction attempts
    pub fn total_attempts(&self) -> u64 {
        self.search_calls + self.extraction_calls
    }

    /// Entities that reached a terminal state
    pub fn completed(&self) -> usize {
        self.succeeded + self.failed + self.skipped
    }

    /// Fold one worker's counters into this summary
    pub(crate) fn merge(&mut self, other: &BatchSummary) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.cache_hits += other.cache_hits;
        self.search_calls += other.search_calls;
        self.extraction_calls += other.extraction_calls;
        self.cache_write_errors += other.cache_write_errors;
    }

    /// Count one terminal result
    pub(crate) fn record(&mut self, result: &JobResult) {
        match result.status {
            JobStatus::Success => self.succeeded += 1,
            JobStatus::Failed => self.failed += 1,
            JobStatus::Skipped => self.skipped += 1,
        }
        if result.timings.cache_hit {
            self.cache_hits += 1;
        }
    }

    /// Generate a summary report
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Batch Summary".to_string(),
            "=============".to_string(),
            format!("Batch: {}", self.batch_id),
            format!(
                "Entities: {} ({} succeeded, {} failed, {} skipped)",
                self.total, self.succeeded, self.failed, self.skipped
            ),
            format!("Cache hits: {}", self.cache_hits),
            format!(
                "Calls: {} search, {} extraction",
                self.search_calls, self.extraction_calls
            ),
            format!("Wall time: {}ms", self.wall_time_ms),
        ];

        if self.cache_write_errors > 0 {
            lines.push(format!("Cache write errors: {}", self.cache_write_errors));
        }
        if self.cancelled {
            lines.push("Cancelled before completion".to_string());
        }

        lines.join("\n")
    }
}

/// Every result of a batch, in input order, plus its summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    /// One result per entity, sorted by position
    pub results: Vec<JobResult>,
    /// Aggregate counters
    pub summary: BatchSummary,
}

impl BatchReport {
    /// Results that did not succeed
    pub fn failures(&self) -> impl Iterator<Item = &JobResult> {
        self.results.iter().filter(|r| !r.is_success())
    }
}
