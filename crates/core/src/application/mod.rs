// Application Layer - Adapters, poll engine and the job orchestrator

pub mod adapters;
pub mod config;
pub mod orchestrator;
pub mod poll;

// Re-exports
pub use adapters::{DumpAdapter, SnapshotAdapter, StreamingAdapter};
pub use config::OrchestratorConfig;
pub use orchestrator::Orchestrator;
pub use poll::{cancel_channel, CancelHandle, CancelToken, RetryPolicy};
