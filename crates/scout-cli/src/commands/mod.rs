//! Command implementations.

pub mod cache;
pub mod run;

pub use self::cache::execute_cache;
pub use self::run::execute_run;
