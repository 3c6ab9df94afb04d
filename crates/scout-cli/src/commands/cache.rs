//! Cache command implementation.

use crate::cli::{CacheAction, CacheArgs};
use crate::config::Config;
use crate::error::Result;
use crate::output::Formatter;

/// Execute the cache command.
pub async fn execute_cache(args: CacheArgs, config: &Config, formatter: &Formatter) -> Result<()> {
    let cache = config.pipeline.open_cache().await?;

    match args.action {
        CacheAction::Stats => {
            let stats = cache.stats().await?;
            println!(
                "{}",
                formatter.format_cache_stats(cache.dir(), cache.expiry(), &stats)?
            );
        }
        CacheAction::Purge => {
            let removed = cache.purge_expired().await?;
            println!(
                "{}",
                formatter.success(&format!("Purged {} expired entry(s)", removed))
            );
        }
        CacheAction::Clear => {
            let removed = cache.clear().await?;
            println!(
                "{}",
                formatter.success(&format!("Removed {} entry(s) from {}", removed, cache.dir().display()))
            );
        }
    }

    Ok(())
}
