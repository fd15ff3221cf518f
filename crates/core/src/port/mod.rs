// Port Layer - Interfaces for external dependencies

pub mod backend;
pub mod credentials;
pub mod engine_client;
pub mod id_provider; // For deterministic testing
pub mod time_provider;
pub mod transfer;

// Re-exports
pub use backend::{AdapterFactory, ArchiveRef, BackendAdapter, CompletionMode, Operation};
pub use credentials::{CredentialError, CredentialProvisioner};
pub use engine_client::{ClientError, Readiness, RelationalApi, SearchApi, TimeSeriesApi};
pub use id_provider::IdProvider;
pub use time_provider::TimeProvider;
pub use transfer::{TransferError, TransferGateway, TransferRequest};
