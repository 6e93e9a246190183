//! TOML configuration files.
//!
//! Every field is optional; missing fields take the engine defaults.
//!
//! ```toml
//! max_colors = 5000      # 0 = unbounded
//!
//! [quantize]
//! depth = 4.0
//!
//! [cluster]
//! resolutions = [4, 8, 16]
//! population = "distinct"
//!
//! [projection]
//! radius = 250.0
//! ```

use std::fs;
use std::path::Path;

use chroma_core::EngineConfig;

use crate::error::{Result, StoreError};

/// Parse a configuration document and validate it.
pub fn parse_config(text: &str) -> Result<EngineConfig> {
    let mut config: EngineConfig =
        toml::from_str(text).map_err(|e| StoreError::InvalidData(format!("invalid config: {e}")))?;
    if config.max_colors == Some(0) {
        config.max_colors = None;
    }
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<EngineConfig> {
    let text = fs::read_to_string(path).map_err(|e| {
        StoreError::InvalidData(format!("failed to read {}: {e}", path.display()))
    })?;
    let config = parse_config(&text)?;
    tracing::debug!(path = %path.display(), "loaded config");
    Ok(config)
}
