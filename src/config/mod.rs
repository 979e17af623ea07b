// src/config/mod.rs

//! Plan file loading and validation.
//!
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a plan file from disk (`loader.rs`).
//! - Validate it and convert it into a [`crate::dag::Plan`] and an
//!   [`crate::engine::ExecutorConfig`] (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, ConfigSection, PlanSection, RawConfigFile, TaskConfig, parse_duration,
};
pub use validate::validate_config;
