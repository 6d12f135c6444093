// src/errors.rs

//! Crate-wide error aliases and helpers.
//!
//! Per-command failures live in [`crate::exec::CommandError`]; they are
//! collected into the aggregate result and never surface here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MuxtermError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, MuxtermError>;
