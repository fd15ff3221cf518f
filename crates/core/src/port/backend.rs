// Backend Adapter Port
// One capability set over structurally different engines

use crate::domain::{
    EngineCredentials, EngineKind, HealthStatus, OperationResult, RepositoryTarget, SnapshotStatus,
    UnitManifest, Unreachable,
};
use crate::error::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

/// How an adapter's start operations complete
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionMode {
    /// Start returns a handle; completion is observed via `check_snapshot_status`
    Polled,
    /// Start blocks until done; no independent status exists
    Blocking,
}

/// Local side of an archive: snapshot ID plus its staging directory
#[derive(Debug, Clone, Copy)]
pub struct ArchiveRef<'a> {
    pub snapshot_id: &'a str,
    pub dir: &'a Path,
}

/// Operation whose progress is being checked
#[derive(Debug, Clone, Copy)]
pub enum Operation<'a> {
    Backup(ArchiveRef<'a>),
    Restore(ArchiveRef<'a>, &'a UnitManifest),
}

/// Backend adapter trait
///
/// Implementations:
/// - SnapshotAdapter: repository-based snapshot API (search engine)
/// - DumpAdapter: per-database dump utility (time-series store)
/// - StreamingAdapter: blocking dump/restore (relational engine)
///
/// Methods never fail past their contract: every engine exception, timeout
/// or malformed response comes back as `Rejected`/`Failed`/`Unreachable`.
#[async_trait]
pub trait BackendAdapter: Send + Sync {
    fn engine(&self) -> EngineKind;

    fn completion(&self) -> CompletionMode;

    /// Register the snapshot repository; idempotent for identical parameters
    async fn setup_target(&self, target: &RepositoryTarget) -> OperationResult;

    /// Start a backup; writes the unit manifest into `archive.dir`
    async fn start_backup(&self, archive: ArchiveRef<'_>) -> OperationResult;

    /// Start a restore of exactly the manifest's units
    async fn start_restore(
        &self,
        archive: ArchiveRef<'_>,
        manifest: &UnitManifest,
    ) -> OperationResult;

    async fn check_health(&self) -> std::result::Result<HealthStatus, Unreachable>;

    async fn check_snapshot_status(
        &self,
        operation: Operation<'_>,
    ) -> std::result::Result<SnapshotStatus, Unreachable>;
}

/// Builds the adapter variant for a job once engine credentials are known
pub trait AdapterFactory: Send + Sync {
    fn build(
        &self,
        engine: EngineKind,
        host: &str,
        credentials: &EngineCredentials,
    ) -> Result<Arc<dyn BackendAdapter>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Scripted sequence: values are consumed in order, the last one repeats
    #[derive(Debug)]
    struct Script<T: Clone> {
        queue: VecDeque<T>,
        last: T,
    }

    impl<T: Clone> Script<T> {
        fn repeat(value: T) -> Self {
            Self {
                queue: VecDeque::new(),
                last: value,
            }
        }

        fn sequence(values: Vec<T>, fallback: T) -> Self {
            let queue: VecDeque<T> = values.into();
            let last = queue.back().cloned().unwrap_or(fallback);
            Self { queue, last }
        }

        fn next(&mut self) -> T {
            self.queue.pop_front().unwrap_or_else(|| self.last.clone())
        }
    }

    /// Mock adapter with scripted responses and a call log
    pub struct ScriptedAdapter {
        engine: EngineKind,
        completion: CompletionMode,
        setup: Mutex<Script<OperationResult>>,
        backup: Mutex<Script<OperationResult>>,
        restore: Mutex<Script<OperationResult>>,
        health: Mutex<Script<std::result::Result<HealthStatus, Unreachable>>>,
        status: Mutex<Script<std::result::Result<SnapshotStatus, Unreachable>>>,
        backup_units: Vec<String>,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedAdapter {
        /// Everything accepted, healthy, and completed on first poll
        pub fn new(engine: EngineKind, completion: CompletionMode) -> Self {
            Self {
                engine,
                completion,
                setup: Mutex::new(Script::repeat(OperationResult::Accepted)),
                backup: Mutex::new(Script::repeat(OperationResult::Accepted)),
                restore: Mutex::new(Script::repeat(OperationResult::Accepted)),
                health: Mutex::new(Script::repeat(Ok(HealthStatus::Healthy))),
                status: Mutex::new(Script::repeat(Ok(SnapshotStatus::Succeeded))),
                backup_units: vec!["unit-a".to_string()],
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn polled(engine: EngineKind) -> Self {
            Self::new(engine, CompletionMode::Polled)
        }

        pub fn blocking(engine: EngineKind) -> Self {
            Self::new(engine, CompletionMode::Blocking)
        }

        pub fn with_setup(self, result: OperationResult) -> Self {
            *self.setup.lock().unwrap() = Script::repeat(result);
            self
        }

        pub fn with_backup_results(self, results: Vec<OperationResult>) -> Self {
            *self.backup.lock().unwrap() =
                Script::sequence(results, OperationResult::Accepted);
            self
        }

        pub fn with_restore_results(self, results: Vec<OperationResult>) -> Self {
            *self.restore.lock().unwrap() =
                Script::sequence(results, OperationResult::Accepted);
            self
        }

        pub fn with_health(
            self,
            results: Vec<std::result::Result<HealthStatus, Unreachable>>,
        ) -> Self {
            *self.health.lock().unwrap() = Script::sequence(results, Ok(HealthStatus::Healthy));
            self
        }

        pub fn with_statuses(
            self,
            results: Vec<std::result::Result<SnapshotStatus, Unreachable>>,
        ) -> Self {
            *self.status.lock().unwrap() = Script::sequence(results, Ok(SnapshotStatus::Succeeded));
            self
        }

        /// Units written to the manifest by a successful backup
        pub fn with_backup_units(mut self, units: Vec<&str>) -> Self {
            self.backup_units = units.into_iter().map(str::to_string).collect();
            self
        }

        pub fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }

        pub fn call_count(&self, name: &str) -> usize {
            self.calls.lock().unwrap().iter().filter(|c| **c == name).count()
        }

        fn record(&self, name: &'static str) {
            self.calls.lock().unwrap().push(name);
        }
    }

    #[async_trait]
    impl BackendAdapter for ScriptedAdapter {
        fn engine(&self) -> EngineKind {
            self.engine
        }

        fn completion(&self) -> CompletionMode {
            self.completion
        }

        async fn setup_target(&self, _target: &RepositoryTarget) -> OperationResult {
            self.record("setup_target");
            self.setup.lock().unwrap().next()
        }

        async fn start_backup(&self, archive: ArchiveRef<'_>) -> OperationResult {
            self.record("start_backup");
            let result = self.backup.lock().unwrap().next();
            if result.is_started() {
                let manifest = match UnitManifest::new(self.backup_units.clone()) {
                    Ok(m) => m,
                    Err(e) => return OperationResult::Rejected(e.to_string()),
                };
                if let Err(e) = manifest.write_to(archive.dir).await {
                    return OperationResult::Rejected(e.to_string());
                }
            }
            result
        }

        async fn start_restore(
            &self,
            _archive: ArchiveRef<'_>,
            _manifest: &UnitManifest,
        ) -> OperationResult {
            self.record("start_restore");
            self.restore.lock().unwrap().next()
        }

        async fn check_health(&self) -> std::result::Result<HealthStatus, Unreachable> {
            self.record("check_health");
            self.health.lock().unwrap().next()
        }

        async fn check_snapshot_status(
            &self,
            _operation: Operation<'_>,
        ) -> std::result::Result<SnapshotStatus, Unreachable> {
            self.record("check_snapshot_status");
            self.status.lock().unwrap().next()
        }
    }

    /// Factory handing out one shared adapter, so tests keep a handle on it
    pub struct SharedAdapterFactory {
        adapter: Arc<ScriptedAdapter>,
        builds: Mutex<usize>,
    }

    impl SharedAdapterFactory {
        pub fn new(adapter: Arc<ScriptedAdapter>) -> Self {
            Self {
                adapter,
                builds: Mutex::new(0),
            }
        }

        pub fn build_count(&self) -> usize {
            *self.builds.lock().unwrap()
        }
    }

    impl AdapterFactory for SharedAdapterFactory {
        fn build(
            &self,
            _engine: EngineKind,
            _host: &str,
            _credentials: &EngineCredentials,
        ) -> Result<Arc<dyn BackendAdapter>> {
            *self.builds.lock().unwrap() += 1;
            let adapter: Arc<dyn BackendAdapter> = self.adapter.clone();
            Ok(adapter)
        }
    }
}
