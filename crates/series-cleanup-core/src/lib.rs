pub mod collection;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod identifiers;
pub mod progress;
pub mod provider;
pub mod retention;
pub mod scanner;

pub use config::AppConfig;
pub use engine::{CleanupEngine, RunResult};
pub use error::Error;
pub use progress::{ProgressReporter, SilentReporter};
pub use retention::{CancellationToken, Decision, FileRemover, FsRemover};
