use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use chroma_core::{Timeline, cluster_artifact, novelty_artifact, projection_artifact};

use crate::error::{Result, StoreError};

pub const NOVELTY_FILE: &str = "novel_colors.json";
pub const CLUSTER_FILE: &str = "clustered_colors.json";
pub const PROJECTION_FILE: &str = "projected_colors.json";

/// Write any artifact as pretty JSON.
pub fn write_json<T: Serialize>(path: &Path, artifact: &T) -> Result<()> {
    let json = chroma_core::to_json(artifact)
        .map_err(|e| StoreError::InvalidData(format!("JSON export failed: {e}")))?;
    fs::write(path, json).map_err(|e| {
        StoreError::InvalidData(format!("failed to write {}: {e}", path.display()))
    })
}

/// Write the novelty, clustering and projection artifacts into `dir`,
/// creating it if needed. Returns the written paths.
pub fn write_artifacts(dir: &Path, timeline: &Timeline) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(dir).map_err(|e| {
        StoreError::InvalidData(format!("failed to create {}: {e}", dir.display()))
    })?;

    let novelty = dir.join(NOVELTY_FILE);
    write_json(&novelty, &novelty_artifact(timeline))?;
    let clusters = dir.join(CLUSTER_FILE);
    write_json(&clusters, &cluster_artifact(timeline))?;
    let projection = dir.join(PROJECTION_FILE);
    write_json(&projection, &projection_artifact(timeline))?;

    tracing::info!(dir = %dir.display(), epochs = timeline.records().len(), "artifacts written");
    Ok(vec![novelty, clusters, projection])
}
