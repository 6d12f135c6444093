// src/config/validate.rs

use std::collections::HashSet;
use std::path::PathBuf;

use crate::config::model::ConfigFile;
use crate::errors::{MuxtermError, Result};
use crate::types::{parse_duration, Shell};

/// Set names that collide with built-in subcommands.
pub const RESERVED_SET_NAMES: &[&str] = &["completion", "example", "help", "list"];

/// Run semantic validation against a loaded configuration.
///
/// This checks:
/// - there is at least one command
/// - every command has non-empty shell text
/// - non-empty names are unique (empty names may repeat)
/// - `[config].shell` and `[config].grace_period` parse
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    ensure_has_commands(cfg)?;
    validate_global_config(cfg)?;
    validate_commands(cfg)?;
    Ok(())
}

fn ensure_has_commands(cfg: &ConfigFile) -> Result<()> {
    if cfg.commands.is_empty() {
        return Err(MuxtermError::ConfigError(
            "config must contain at least one [[command]] entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &ConfigFile) -> Result<()> {
    if let Some(shell) = cfg.config.shell.as_deref() {
        shell
            .parse::<Shell>()
            .map_err(|e| MuxtermError::ConfigError(format!("invalid [config].shell: {e}")))?;
    }

    if let Some(grace) = cfg.config.grace_period.as_deref() {
        parse_duration(grace).map_err(|e| {
            MuxtermError::ConfigError(format!("invalid [config].grace_period: {e}"))
        })?;
    }

    Ok(())
}

fn validate_commands(cfg: &ConfigFile) -> Result<()> {
    let mut seen = HashSet::new();

    for (i, cmd) in cfg.commands.iter().enumerate() {
        if cmd.command.trim().is_empty() {
            return Err(MuxtermError::ConfigError(format!(
                "command #{} ('{}') has an empty `command`",
                i + 1,
                cmd.name
            )));
        }

        if !cmd.name.is_empty() && !seen.insert(cmd.name.as_str()) {
            return Err(MuxtermError::ConfigError(format!(
                "multiple commands are named '{}'",
                cmd.name
            )));
        }
    }

    Ok(())
}

/// Validate the command sets of a config directory.
///
/// Each set must have a usable, unreserved name that no other set uses, and
/// must itself pass [`validate_config`].
pub fn validate_command_sets(sets: &[ConfigFile]) -> Result<()> {
    let mut seen = HashSet::new();

    for set in sets {
        let origin = set
            .source
            .clone()
            .unwrap_or_else(|| PathBuf::from("<unknown>"));

        validate_set_name(&set.name).map_err(|msg| {
            MuxtermError::ConfigError(format!("{}: {msg}", origin.display()))
        })?;

        if !seen.insert(set.name.as_str()) {
            return Err(MuxtermError::ConfigError(format!(
                "multiple command sets are named '{}' (again in {})",
                set.name,
                origin.display()
            )));
        }

        validate_config(set).map_err(|e| match e {
            MuxtermError::ConfigError(msg) => {
                MuxtermError::ConfigError(format!("command set '{}': {msg}", set.name))
            }
            other => other,
        })?;
    }

    Ok(())
}

fn validate_set_name(name: &str) -> std::result::Result<(), String> {
    if name.is_empty() {
        return Err("command set has no `name`".to_string());
    }
    if RESERVED_SET_NAMES.contains(&name) {
        return Err(format!("the command set name '{name}' is reserved"));
    }
    if name.starts_with('-')
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(format!(
            "invalid command set name '{name}': use letters, digits, '-' and '_'"
        ));
    }
    Ok(())
}
