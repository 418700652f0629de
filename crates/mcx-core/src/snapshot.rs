//! Agent snapshots.
//!
//! A snapshot round-trips every field of an agent: the factored world
//! model with its arenas, the self-model when present, the history
//! buffers, the scalar state, and the configuration. Text snapshots are
//! JSON, binary ones bincode; both are deterministic for a given state.
//! Failures are non-fatal by design: a failed save is reported and a
//! failed load aborts the load.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::agent::Agent;

/// Bumped whenever the serialized layout changes.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("snapshot i/o failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("text snapshot codec failed: {0}")]
    Text(#[from] serde_json::Error),

    #[error("binary snapshot codec failed: {0}")]
    Binary(#[from] bincode::Error),

    #[error("unsupported snapshot version {found} (expected {expected})")]
    VersionMismatch { found: u32, expected: u32 },
}

/// On-disk representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    /// Portable JSON.
    Text,
    /// Faster, non-portable bincode.
    Binary,
}

impl SnapshotFormat {
    pub fn from_binary_flag(binary_io: bool) -> Self {
        if binary_io {
            SnapshotFormat::Binary
        } else {
            SnapshotFormat::Text
        }
    }
}

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    agent: &'a Agent,
}

#[derive(Deserialize)]
struct Snapshot {
    version: u32,
    agent: Agent,
}

/// Serialize an agent to `path`.
pub fn save_agent(path: &Path, agent: &Agent, format: SnapshotFormat) -> Result<(), SnapshotError> {
    let snapshot = SnapshotRef {
        version: SNAPSHOT_VERSION,
        agent,
    };
    let bytes = match format {
        SnapshotFormat::Text => serde_json::to_vec_pretty(&snapshot)?,
        SnapshotFormat::Binary => bincode::serialize(&snapshot)?,
    };
    fs::write(path, bytes)?;
    tracing::info!(path = %path.display(), "saved agent snapshot");
    Ok(())
}

/// Restore an agent from `path`.
pub fn load_agent(path: &Path, format: SnapshotFormat) -> Result<Agent, SnapshotError> {
    let bytes = fs::read(path)?;
    let snapshot: Snapshot = match format {
        SnapshotFormat::Text => serde_json::from_slice(&bytes)?,
        SnapshotFormat::Binary => bincode::deserialize(&bytes)?,
    };
    if snapshot.version != SNAPSHOT_VERSION {
        return Err(SnapshotError::VersionMismatch {
            found: snapshot.version,
            expected: SNAPSHOT_VERSION,
        });
    }
    tracing::info!(path = %path.display(), "loaded agent snapshot");
    Ok(snapshot.agent)
}
