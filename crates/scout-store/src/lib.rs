//! Scout Storage Layer
//!
//! Durable result cache keyed by normalized search query.
//!
//! # Architecture
//!
//! - One JSON file per query under the cache directory
//! - File name is the SHA-256 hex digest of the normalized query
//! - File content is `{ "result": <payload>, "stored_at": <unix seconds> }`
//! - Entries past the configured expiry are removed lazily on lookup
//! - Concurrent fetches of the same query are coalesced by [`ResultCache::get_or_fetch`]
//!
//! # Examples
//!
//! ```no_run
//! use scout_store::ResultCache;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), scout_store::StoreError> {
//! let cache = ResultCache::open(".scout-cache", Duration::from_secs(7 * 86_400)).await?;
//! cache.put("Acme contact email", &serde_json::json!({"items": []})).await?;
//! assert!(cache.get("Acme   contact email").await?.is_some());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod cache;
mod clock;

use std::path::PathBuf;
use thiserror::Error;

pub use cache::{cache_key, CacheEntry, CacheStats, Fetched, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};

/// Errors that can occur during storage operations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Filesystem error
    #[error("I/O error at {}: {}", .path.display(), .source)]
    Io {
        /// File or directory involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Payload could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}
