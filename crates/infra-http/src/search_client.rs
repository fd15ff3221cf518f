// Search engine REST client
// Snapshot repository, snapshot lifecycle, index recovery and cluster health
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use snapvault_core::domain::{CloudProvider, EngineCredentials, RepositoryTarget};
use snapvault_core::port::{ClientError, SearchApi};

/// Default REST port of the search engine
pub const DEFAULT_PORT: u16 = 9200;

/// Per-request timeout; snapshot and restore calls return once accepted
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(rename = "type")]
    kind: String,
    reason: String,
}

#[derive(Debug, Deserialize)]
struct CatIndex {
    index: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SnapshotStatusBody {
    snapshots: Vec<SnapshotEntry>,
}

#[derive(Debug, Deserialize)]
struct SnapshotEntry {
    state: String,
}

#[derive(Debug, Deserialize)]
struct IndexRecovery {
    #[serde(default)]
    shards: Vec<ShardRecovery>,
}

#[derive(Debug, Deserialize)]
struct ShardRecovery {
    stage: String,
}

#[derive(Debug, Deserialize)]
struct ClusterHealthBody {
    status: String,
}

pub struct HttpSearchClient {
    http: reqwest::Client,
    base_url: String,
    credentials: EngineCredentials,
}

impl HttpSearchClient {
    /// `host` may be `name`, `name:port` or a full `http(s)://` URL
    pub fn new(host: &str, credentials: EngineCredentials) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ClientError::Malformed(format!("http client: {}", e)))?;
        Ok(Self {
            http,
            base_url: base_url(host),
            credentials,
        })
    }

    /// Send a request and decode the JSON reply; non-2xx becomes ClientError::Api
    async fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(method = %method, url = %url, "Search API request");

        let mut request = self
            .http
            .request(method, &url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.password));
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(transport_error)?;
        let status = response.status();
        let text = response.text().await.map_err(transport_error)?;

        if !status.is_success() {
            return Err(api_error(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text)
            .map_err(|e| ClientError::Malformed(format!("{}: {}", path, e)))
    }
}

fn base_url(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.contains("://") {
        return host.to_string();
    }
    match host.rsplit_once(':') {
        Some((_, port)) if port.parse::<u16>().is_ok() => format!("http://{}", host),
        _ => format!("http://{}:{}", host, DEFAULT_PORT),
    }
}

fn transport_error(err: reqwest::Error) -> ClientError {
    if err.is_connect() || err.is_timeout() {
        ClientError::Unreachable(err.to_string())
    } else if err.is_decode() {
        ClientError::Malformed(err.to_string())
    } else {
        ClientError::api(err.status().map(|s| s.as_u16()), "http", err.to_string())
    }
}

/// `{"error":{"type":..,"reason":..}}`, or the raw body when the engine sent something else
fn api_error(status: StatusCode, body: &str) -> ClientError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => ClientError::api(Some(status.as_u16()), parsed.error.kind, parsed.error.reason),
        Err(_) => ClientError::api(
            Some(status.as_u16()),
            status.canonical_reason().unwrap_or("http_error"),
            body.trim(),
        ),
    }
}

fn repository_body(target: &RepositoryTarget) -> Result<Value, ClientError> {
    match target {
        RepositoryTarget::ObjectStore {
            provider,
            bucket,
            base_path,
            region,
            credentials,
            settings,
            ..
        } => Ok(match provider {
            CloudProvider::Aws => json!({
                "type": "s3",
                "settings": {
                    "bucket": bucket,
                    "region": region,
                    "base_path": base_path,
                    "access_key": credentials.access_key_id,
                    "secret_key": credentials.secret_access_key,
                    "max_retries": settings.max_retries,
                    "compress": settings.compress,
                    "server_side_encryption": settings.server_side_encryption,
                }
            }),
            // gcs credentials live in the engine keystore
            CloudProvider::Gce => json!({
                "type": "gcs",
                "settings": {
                    "bucket": bucket,
                    "base_path": base_path,
                    "compress": settings.compress,
                }
            }),
        }),
        RepositoryTarget::Staging { dir } => Err(ClientError::Malformed(format!(
            "snapshot repository cannot point at local staging {}",
            dir.display()
        ))),
    }
}

/// Empty list means every index
fn indices_body(indices: &[String]) -> Value {
    if indices.is_empty() {
        json!({ "include_global_state": false })
    } else {
        json!({ "indices": indices.join(","), "include_global_state": false })
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Value, what: &str) -> Result<T, ClientError> {
    serde_json::from_value(value).map_err(|e| ClientError::Malformed(format!("{}: {}", what, e)))
}

fn open_indices(rows: Vec<CatIndex>) -> Vec<String> {
    rows.into_iter()
        .filter(|row| row.status.as_deref().map_or(true, |s| s == "open"))
        .map(|row| row.index)
        .collect()
}

/// Shard stages of the requested indices; every index when none are named
fn recovery_stages(body: HashMap<String, IndexRecovery>, indices: &[String]) -> Vec<String> {
    body.into_iter()
        .filter(|(index, _)| indices.is_empty() || indices.contains(index))
        .flat_map(|(_, index)| index.shards.into_iter().map(|shard| shard.stage))
        .collect()
}

#[async_trait]
impl SearchApi for HttpSearchClient {
    async fn put_repository(&self, target: &RepositoryTarget) -> Result<(), ClientError> {
        let repository = target
            .repository_name()
            .ok_or_else(|| ClientError::Malformed("repository target has no name".to_string()))?;
        let body = repository_body(target)?;
        self.call(Method::PUT, &format!("/_snapshot/{}", repository), Some(body))
            .await?;
        Ok(())
    }

    async fn list_indices(&self) -> Result<Vec<String>, ClientError> {
        let value = self
            .call(
                Method::GET,
                "/_cat/indices?h=index,status&format=json&expand_wildcards=open",
                None,
            )
            .await?;
        Ok(open_indices(decode(value, "_cat/indices")?))
    }

    async fn close_index(&self, index: &str) -> Result<(), ClientError> {
        self.call(Method::POST, &format!("/{}/_close", index), None)
            .await?;
        Ok(())
    }

    async fn create_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        indices: &[String],
    ) -> Result<(), ClientError> {
        self.call(
            Method::PUT,
            &format!("/_snapshot/{}/{}", repository, snapshot),
            Some(indices_body(indices)),
        )
        .await?;
        Ok(())
    }

    async fn snapshot_state(&self, repository: &str, snapshot: &str) -> Result<String, ClientError> {
        let value = self
            .call(
                Method::GET,
                &format!("/_snapshot/{}/{}/_status", repository, snapshot),
                None,
            )
            .await?;
        let body: SnapshotStatusBody = decode(value, "snapshot status")?;
        body.snapshots
            .into_iter()
            .next()
            .map(|entry| entry.state)
            .ok_or_else(|| ClientError::Malformed(format!("no status for snapshot {}", snapshot)))
    }

    async fn restore_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        indices: &[String],
    ) -> Result<(), ClientError> {
        self.call(
            Method::POST,
            &format!("/_snapshot/{}/{}/_restore", repository, snapshot),
            Some(indices_body(indices)),
        )
        .await?;
        Ok(())
    }

    async fn recovery_stages(&self, indices: &[String]) -> Result<Vec<String>, ClientError> {
        // Index names stay out of the URL; large manifests overflow the request line
        let value = self
            .call(Method::GET, "/_recovery?active_only=false", None)
            .await?;
        Ok(recovery_stages(decode(value, "_recovery")?, indices))
    }

    async fn cluster_health(&self) -> Result<String, ClientError> {
        let value = self.call(Method::GET, "/_cluster/health", None).await?;
        let body: ClusterHealthBody = decode(value, "_cluster/health")?;
        Ok(body.status)
    }
}
