pub mod artifacts;
pub mod config;
pub mod error;
pub mod schema;
pub mod store;

pub use artifacts::{CLUSTER_FILE, NOVELTY_FILE, PROJECTION_FILE, write_artifacts, write_json};
pub use config::{load_config, parse_config};
pub use error::{Result, StoreError};
pub use store::{Store, StoreStats};
