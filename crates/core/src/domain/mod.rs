// Domain Layer - Pure business logic and entities

pub mod credentials;
pub mod error;
pub mod job;
pub mod manifest;
pub mod outcome;
pub mod phase;
pub mod status;
pub mod target;

// Re-exports
pub use credentials::{CloudCredentials, EngineCredentials, InlineCredentials, ResolvedCredentials};
pub use error::DomainError;
pub use job::{CloudProvider, EngineKind, Job, JobRequest, Process, SnapshotId};
pub use manifest::{
    payload_dir, payload_name, DatabaseManifest, IndexManifest, UnitManifest, MANIFEST_FILE,
    PAYLOAD_DIR,
};
pub use outcome::{JobOutcome, JobReport};
pub use phase::{JobPhase, PhaseTracker};
pub use status::{HealthRequirement, HealthStatus, OperationResult, SnapshotStatus, Unreachable};
pub use target::{
    archive_path, repository_base_path, RepositorySettings, RepositoryTarget, ARCHIVE_PREFIX,
    DEFAULT_REPOSITORY, REPOSITORY_PREFIX,
};
