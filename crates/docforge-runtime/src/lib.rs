//! Docforge Runtime — indexing orchestration, status tracking, tenant queue.

pub mod context;
pub mod loader;
pub mod queue;
pub mod runner;
pub mod status;

pub use context::RunnerContext;
pub use loader::IndexLoader;
pub use queue::{Batch, QueueOutcome, TenantTaskQueue};
pub use runner::IndexingRunner;
pub use status::StatusTracker;
