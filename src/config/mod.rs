// src/config/mod.rs

//! Configuration loading and validation for muxterm.
//!
//! This is glue around the orchestration core: it turns a TOML file, or one
//! named command set out of a config directory, into the ordered list of [`CommandSpec`](crate::exec::CommandSpec)s and the
//! run options the core consumes.
//!
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file or a directory of command sets (`loader.rs`).
//! - Validate cross-command and cross-set rules like name uniqueness
//!   (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{
    default_config_dir, default_config_path, load_and_validate, load_command_sets,
    load_config_dir, load_from_path, write_example_config, EXAMPLE_FILE_NAME,
};
pub use model::{CommandConfig, ConfigFile, ConfigSection};
pub use validate::{validate_command_sets, validate_config, RESERVED_SET_NAMES};
