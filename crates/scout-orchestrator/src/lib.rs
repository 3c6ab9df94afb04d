//! Scout Orchestrator
//!
//! Drives a batch of entities through the pipeline:
//!
//! ```text
//! Entity → render query → ResultCache ──hit──────────────┐
//!                            └─miss→ SearchClient ─store─┤
//!                                                        ↓
//!                                  ExtractionClient → JobResult
//! ```
//!
//! A bounded pool of workers processes entities concurrently. Both clients
//! share one [`RateLimiter`](scout_dispatch::RateLimiter), so provider quotas
//! hold across the whole batch no matter how many workers run. Cache lookups
//! for the same query are serialized, so duplicate queries in a batch cost a
//! single search.
//!
//! Every entity yields exactly one [`JobResult`]. Failures are recorded per
//! entity and never abort the batch; cancellation marks unfinished entities
//! as skipped.

#![warn(missing_docs)]

mod config;
mod error;
mod orchestrator;
mod types;

pub use config::{ConfigError, LlmSettings, PipelineConfig, SearchSettings};
pub use error::OrchestratorError;
pub use orchestrator::{BatchHandle, JobOrchestrator, JobTemplate};
pub use types::{BatchReport, BatchSummary, JobResult, JobStage, JobStatus, JobTimings};
