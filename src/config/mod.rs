//! Configuration system
//!
//! Sections are declared with [`config_struct!`](crate::config_struct) in
//! `schemas/`, loaded from TOML by `utils`, and validated before use.

pub mod macros;
pub mod schemas;
pub mod utils;

pub use schemas::*;
pub use utils::{load_config_from_path, save_config, CONFIG_FILE_PATH};
