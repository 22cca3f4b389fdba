pub mod config;

pub use config::{load_config, resolve_config_path, save_config};
