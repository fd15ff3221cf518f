// Backend adapter variants
//
// Each wraps a wire-client port and translates its errors into the adapter
// contract. Nothing here returns an error past `OperationResult`,
// `SnapshotStatus` or `Unreachable`.

pub mod relational;
pub mod search;
pub mod timeseries;

pub use relational::StreamingAdapter;
pub use search::SnapshotAdapter;
pub use timeseries::DumpAdapter;

use crate::domain::{OperationResult, SnapshotStatus, UnitManifest, Unreachable};
use crate::port::ClientError;
use std::path::{Path, PathBuf};

/// Start-operation error → OperationResult
fn start_failure(operation: &str, err: ClientError) -> OperationResult {
    match err {
        ClientError::Unreachable(reason) => OperationResult::EngineUnreachable(reason),
        other => OperationResult::Rejected(format!("{}: {}", operation, other)),
    }
}

/// Probe error → transient Unreachable, or a definite value for anything else
fn probe_failure<T>(err: ClientError, otherwise: impl FnOnce(ClientError) -> T) -> Result<T, Unreachable> {
    match err {
        ClientError::Unreachable(reason) => Err(Unreachable(reason)),
        other => Ok(otherwise(other)),
    }
}

/// Check a dump archive on disk: manifest present and one payload per unit
async fn verify_archive(
    dir: &Path,
    payload_path: impl Fn(&Path, &str) -> PathBuf,
) -> SnapshotStatus {
    let manifest = match UnitManifest::read_from(dir).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return SnapshotStatus::Failed(format!(
                "no manifest in {}; archive is incomplete",
                dir.display()
            ))
        }
        Err(e) => return SnapshotStatus::Failed(format!("cannot read manifest: {}", e)),
    };

    for unit in manifest.units() {
        let payload = payload_path(dir, unit);
        if tokio::fs::metadata(&payload).await.is_err() {
            return SnapshotStatus::Failed(format!(
                "payload for unit {} missing at {}",
                unit,
                payload.display()
            ));
        }
    }
    SnapshotStatus::Succeeded
}
