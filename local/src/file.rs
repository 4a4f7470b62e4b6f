//! Snapshot file I/O.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use workshop_ledger_core::error::{LedgerError, Result};
use workshop_ledger_core::types::{Registration, Workshop};

/// Name of the snapshot file inside the data directory.
pub const LEDGER_FILENAME: &str = "ledger.json";

/// Everything the ledger persists, written as one document.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Snapshot {
    /// Last issued value per counter scope key.
    #[serde(default)]
    pub counters: BTreeMap<String, u64>,
    /// Workshops in creation order.
    #[serde(default)]
    pub workshops: Vec<Workshop>,
    /// Registrations in insertion order.
    #[serde(default)]
    pub registrations: Vec<Registration>,
}

pub(crate) fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(LEDGER_FILENAME)
}

fn io_error(operation: &str, path: &Path, e: &std::io::Error) -> LedgerError {
    tracing::warn!(operation, path = %path.display(), error = %e, "Ledger file I/O failed");
    LedgerError::TransientStorage(format!("{operation} {}: {e}", path.display()))
}

/// Load the snapshot, or an empty one if the file does not exist yet.
pub(crate) async fn read_snapshot(dir: &Path) -> Result<Snapshot> {
    let path = snapshot_path(dir);
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Snapshot::default()),
        Err(e) => return Err(io_error("read", &path, &e)),
    };

    serde_json::from_slice(&bytes).map_err(|e| {
        tracing::error!(path = %path.display(), error = %e, "Ledger file is not valid JSON");
        LedgerError::CorruptRecord(format!("{}: {e}", path.display()))
    })
}

/// Replace the snapshot atomically: write a temp file, then rename over.
///
/// A crash leaves either the old or the new document on disk.
pub(crate) async fn write_snapshot(dir: &Path, snapshot: &Snapshot) -> Result<()> {
    let path = snapshot_path(dir);
    let tmp_path = dir.join(format!(".{LEDGER_FILENAME}.tmp"));

    let json = serde_json::to_vec_pretty(snapshot)
        .map_err(|e| LedgerError::TransientStorage(format!("serialize ledger: {e}")))?;

    tokio::fs::write(&tmp_path, &json)
        .await
        .map_err(|e| io_error("write", &tmp_path, &e))?;
    tokio::fs::rename(&tmp_path, &path)
        .await
        .map_err(|e| io_error("rename", &path, &e))?;
    Ok(())
}
