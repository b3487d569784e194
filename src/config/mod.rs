mod walk_config;

pub use walk_config::{WalkConfig, WalkConfigError};
