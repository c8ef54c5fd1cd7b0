pub mod analysis;
pub mod cancel;
pub mod checkpoint;
pub mod cleanup;
pub mod config;
pub mod engine;
pub mod error;
pub mod fs;
pub mod hasher;
pub mod model;
pub mod platform;
pub mod progress;
pub mod review;
pub mod run;
pub mod scanner;

pub use cancel::CancelToken;
pub use cleanup::{run_cleanup, Accounting, CleanupOptions, CleanupOutcome, CleanupReport};
pub use config::{AppConfig, ScanMode};
pub use engine::{RunSummary, ScanEngine};
pub use error::Error;
pub use model::{DuplicateGroup, FileRecord, GroupMember};
pub use progress::{ProgressReporter, SilentReporter};
