// Composition root: engine kind -> adapter variant over its wire client

use std::sync::Arc;

use snapvault_core::application::{DumpAdapter, SnapshotAdapter, StreamingAdapter};
use snapvault_core::domain::{EngineCredentials, EngineKind};
use snapvault_core::port::{AdapterFactory, BackendAdapter};
use snapvault_core::{AppError, Result};
use snapvault_infra_http::HttpSearchClient;
use snapvault_infra_system::{InfluxDumpTool, PgStreamTool, SubprocessRunner};

pub struct EngineAdapterFactory {
    runner: SubprocessRunner,
    repository: String,
}

impl EngineAdapterFactory {
    pub fn new(runner: SubprocessRunner, repository: impl Into<String>) -> Self {
        Self {
            runner,
            repository: repository.into(),
        }
    }
}

impl AdapterFactory for EngineAdapterFactory {
    fn build(
        &self,
        engine: EngineKind,
        host: &str,
        credentials: &EngineCredentials,
    ) -> Result<Arc<dyn BackendAdapter>> {
        let adapter: Arc<dyn BackendAdapter> = match engine {
            EngineKind::Search => {
                let client = HttpSearchClient::new(host, credentials.clone())
                    .map_err(|e| AppError::Internal(e.to_string()))?;
                Arc::new(SnapshotAdapter::new(Arc::new(client), self.repository.clone()))
            }
            EngineKind::TimeSeries => Arc::new(DumpAdapter::new(Arc::new(InfluxDumpTool::new(
                self.runner.clone(),
                host,
                credentials.clone(),
            )))),
            EngineKind::Relational => Arc::new(StreamingAdapter::new(Arc::new(
                PgStreamTool::new(self.runner.clone(), host, credentials.clone()),
            ))),
        };
        Ok(adapter)
    }
}
