// Engine wire-client ports
// The adapters drive these; HTTP/subprocess implementations live in infra crates

use crate::domain::RepositoryTarget;
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors surfaced by engine wire clients
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    #[error("engine unreachable: {0}")]
    Unreachable(String),

    #[error("engine error {kind} (status {status:?}): {reason}")]
    Api {
        status: Option<u16>,
        kind: String,
        reason: String,
    },

    #[error("malformed engine response: {0}")]
    Malformed(String),
}

impl ClientError {
    pub fn api(status: Option<u16>, kind: impl Into<String>, reason: impl Into<String>) -> Self {
        ClientError::Api {
            status,
            kind: kind.into(),
            reason: reason.into(),
        }
    }
}

/// Snapshot/repository REST surface of the search engine
#[async_trait]
pub trait SearchApi: Send + Sync {
    /// Register (or re-register) an object-store snapshot repository
    async fn put_repository(&self, target: &RepositoryTarget) -> Result<(), ClientError>;

    /// Names of the currently open indices
    async fn list_indices(&self) -> Result<Vec<String>, ClientError>;

    async fn close_index(&self, index: &str) -> Result<(), ClientError>;

    async fn create_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        indices: &[String],
    ) -> Result<(), ClientError>;

    /// Engine-native snapshot state (e.g. IN_PROGRESS, SUCCESS, FAILED, PARTIAL)
    async fn snapshot_state(&self, repository: &str, snapshot: &str)
        -> Result<String, ClientError>;

    async fn restore_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        indices: &[String],
    ) -> Result<(), ClientError>;

    /// Shard recovery stages for the given indices (e.g. INDEX, TRANSLOG, DONE)
    async fn recovery_stages(&self, indices: &[String]) -> Result<Vec<String>, ClientError>;

    /// Cluster health colour: green, yellow or red
    async fn cluster_health(&self) -> Result<String, ClientError>;
}

/// Per-database dump utility of the time-series store
#[async_trait]
pub trait TimeSeriesApi: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<String>, ClientError>;

    /// Dump one database into `dest` (a directory owned by that database)
    async fn dump_database(&self, database: &str, dest: &Path) -> Result<(), ClientError>;

    async fn restore_database(&self, database: &str, src: &Path) -> Result<(), ClientError>;

    /// Health check verdict: pass, warn or fail
    async fn health(&self) -> Result<String, ClientError>;
}

/// Connection readiness of the relational server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Accepting,
    /// Up but refusing connections (starting, in recovery)
    Rejecting,
}

/// Blocking dump/restore of the relational engine
#[async_trait]
pub trait RelationalApi: Send + Sync {
    /// User databases, templates excluded
    async fn list_databases(&self) -> Result<Vec<String>, ClientError>;

    async fn dump(&self, database: &str, dest_file: &Path) -> Result<(), ClientError>;

    async fn restore(&self, database: &str, src_file: &Path) -> Result<(), ClientError>;

    async fn readiness(&self) -> Result<Readiness, ClientError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    /// In-memory search engine
    #[derive(Default)]
    pub struct MockSearchApi {
        pub indices: Mutex<Vec<String>>,
        pub snapshot_states: Mutex<Vec<String>>,
        pub create_error: Mutex<Option<ClientError>>,
        pub repository_error: Mutex<Option<ClientError>>,
        pub restore_error: Mutex<Option<ClientError>>,
        pub failing_closes: Mutex<HashSet<String>>,
        pub health: Mutex<Option<Result<String, ClientError>>>,
        pub recovery: Mutex<Vec<String>>,
        pub closed: Mutex<Vec<String>>,
        pub snapshots_created: Mutex<Vec<(String, Vec<String>)>>,
        pub restored: Mutex<Vec<(String, Vec<String>)>>,
        pub repositories: Mutex<Vec<RepositoryTarget>>,
    }

    impl MockSearchApi {
        pub fn with_indices(indices: &[&str]) -> Self {
            let api = Self::default();
            *api.indices.lock().unwrap() = indices.iter().map(|s| s.to_string()).collect();
            api
        }
    }

    #[async_trait]
    impl SearchApi for MockSearchApi {
        async fn put_repository(&self, target: &RepositoryTarget) -> Result<(), ClientError> {
            if let Some(err) = self.repository_error.lock().unwrap().clone() {
                return Err(err);
            }
            self.repositories.lock().unwrap().push(target.clone());
            Ok(())
        }

        async fn list_indices(&self) -> Result<Vec<String>, ClientError> {
            Ok(self.indices.lock().unwrap().clone())
        }

        async fn close_index(&self, index: &str) -> Result<(), ClientError> {
            if self.failing_closes.lock().unwrap().contains(index) {
                return Err(ClientError::api(Some(400), "index_closed_exception", index));
            }
            self.closed.lock().unwrap().push(index.to_string());
            Ok(())
        }

        async fn create_snapshot(
            &self,
            _repository: &str,
            snapshot: &str,
            indices: &[String],
        ) -> Result<(), ClientError> {
            if let Some(err) = self.create_error.lock().unwrap().clone() {
                return Err(err);
            }
            self.snapshots_created
                .lock()
                .unwrap()
                .push((snapshot.to_string(), indices.to_vec()));
            Ok(())
        }

        async fn snapshot_state(
            &self,
            _repository: &str,
            _snapshot: &str,
        ) -> Result<String, ClientError> {
            let mut states = self.snapshot_states.lock().unwrap();
            match states.len() {
                0 => Err(ClientError::api(Some(404), "snapshot_missing_exception", "missing")),
                1 => Ok(states[0].clone()),
                _ => Ok(states.remove(0)),
            }
        }

        async fn restore_snapshot(
            &self,
            _repository: &str,
            snapshot: &str,
            indices: &[String],
        ) -> Result<(), ClientError> {
            if let Some(err) = self.restore_error.lock().unwrap().clone() {
                return Err(err);
            }
            self.restored
                .lock()
                .unwrap()
                .push((snapshot.to_string(), indices.to_vec()));
            Ok(())
        }

        async fn recovery_stages(&self, _indices: &[String]) -> Result<Vec<String>, ClientError> {
            Ok(self.recovery.lock().unwrap().clone())
        }

        async fn cluster_health(&self) -> Result<String, ClientError> {
            self.health
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok("green".to_string()))
        }
    }

    /// In-memory time-series engine recording dump/restore calls in order
    #[derive(Default)]
    pub struct MockTimeSeriesApi {
        pub databases: Mutex<Vec<String>>,
        pub failing_units: Mutex<HashSet<String>>,
        pub health_verdict: Mutex<Option<Result<String, ClientError>>>,
        pub dump_calls: Mutex<Vec<String>>,
        pub restore_calls: Mutex<Vec<String>>,
    }

    impl MockTimeSeriesApi {
        pub fn with_databases(databases: &[&str]) -> Self {
            let api = Self::default();
            *api.databases.lock().unwrap() = databases.iter().map(|s| s.to_string()).collect();
            api
        }

        pub fn fail_unit(self, unit: &str) -> Self {
            self.failing_units.lock().unwrap().insert(unit.to_string());
            self
        }
    }

    #[async_trait]
    impl TimeSeriesApi for MockTimeSeriesApi {
        async fn list_databases(&self) -> Result<Vec<String>, ClientError> {
            Ok(self.databases.lock().unwrap().clone())
        }

        async fn dump_database(&self, database: &str, dest: &Path) -> Result<(), ClientError> {
            self.dump_calls.lock().unwrap().push(database.to_string());
            if self.failing_units.lock().unwrap().contains(database) {
                return Err(ClientError::api(None, "dump_failed", database));
            }
            tokio::fs::create_dir_all(dest)
                .await
                .map_err(|e| ClientError::Malformed(e.to_string()))?;
            tokio::fs::write(dest.join("shard.dump"), format!("dump of {}", database))
                .await
                .map_err(|e| ClientError::Malformed(e.to_string()))?;
            Ok(())
        }

        async fn restore_database(&self, database: &str, _src: &Path) -> Result<(), ClientError> {
            self.restore_calls.lock().unwrap().push(database.to_string());
            if self.failing_units.lock().unwrap().contains(database) {
                return Err(ClientError::api(None, "restore_failed", database));
            }
            let mut databases = self.databases.lock().unwrap();
            if !databases.iter().any(|d| d == database) {
                databases.push(database.to_string());
            }
            Ok(())
        }

        async fn health(&self) -> Result<String, ClientError> {
            self.health_verdict
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| Ok("pass".to_string()))
        }
    }

    /// Relational engine whose dump/restore results are scripted
    pub struct MockRelationalApi {
        pub databases: Mutex<Vec<String>>,
        pub dump_results: Mutex<Vec<Result<(), ClientError>>>,
        pub restore_results: Mutex<Vec<Result<(), ClientError>>>,
        pub readiness: Mutex<Result<Readiness, ClientError>>,
        pub dump_calls: Mutex<usize>,
        pub restore_calls: Mutex<usize>,
    }

    impl Default for MockRelationalApi {
        fn default() -> Self {
            Self {
                databases: Mutex::new(vec!["app".to_string()]),
                dump_results: Mutex::new(Vec::new()),
                restore_results: Mutex::new(Vec::new()),
                readiness: Mutex::new(Ok(Readiness::Accepting)),
                dump_calls: Mutex::new(0),
                restore_calls: Mutex::new(0),
            }
        }
    }

    fn next_result(results: &Mutex<Vec<Result<(), ClientError>>>) -> Result<(), ClientError> {
        let mut results = results.lock().unwrap();
        if results.is_empty() {
            Ok(())
        } else {
            results.remove(0)
        }
    }

    #[async_trait]
    impl RelationalApi for MockRelationalApi {
        async fn list_databases(&self) -> Result<Vec<String>, ClientError> {
            Ok(self.databases.lock().unwrap().clone())
        }

        async fn dump(&self, database: &str, dest_file: &Path) -> Result<(), ClientError> {
            *self.dump_calls.lock().unwrap() += 1;
            next_result(&self.dump_results)?;
            tokio::fs::write(dest_file, format!("-- dump of {}\n", database))
                .await
                .map_err(|e| ClientError::Malformed(e.to_string()))
        }

        async fn restore(&self, _database: &str, _src_file: &Path) -> Result<(), ClientError> {
            *self.restore_calls.lock().unwrap() += 1;
            next_result(&self.restore_results)
        }

        async fn readiness(&self) -> Result<Readiness, ClientError> {
            self.readiness.lock().unwrap().clone()
        }
    }
}
