//! Utility modules for common functionality

pub mod config;

pub use config::{load_config, Config};
