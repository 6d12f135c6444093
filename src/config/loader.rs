// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::ConfigFile;
use crate::config::validate::{validate_command_sets, validate_config};
use crate::errors::{MuxtermError, Result};

/// File written by [`write_example_config`].
pub const EXAMPLE_FILE_NAME: &str = "example.toml";

const EXAMPLE_CONFIG: &str = r#"# Name of the command set; run it with `muxterm hello`.
# Letters, digits, `-` and `_` only. `completion`, `example`, `help` and
# `list` are reserved.
name = "hello"

# Shown by `muxterm list`.
short = "An example command set that says hello twice"

# Optional, shown by `muxterm hello --help`.
long = """
A very polite set of commands that says hello
to you more than once."""

[config]
# Optional. When set ("sh", "bash" or "zsh") every command runs through a
# login shell of that kind so your profile is loaded.
shell = "zsh"

# Optional. Time each command gets after SIGTERM before it is killed.
grace_period = "2s"

# Commands are made of:
#   name      - text prefixed to every output line, e.g. "[greeter-1] ".
#               An empty name prints the command's output unmodified.
#   command   - shell text. `$VAR` and `${VAR}` are expanded from the
#               environment before the shell runs; write `$$` for a literal `$`.
#   directory - optional working directory; use `$HOME`, not `~`.
#   silence   - optional (default false); discard this command's output.

[[command]]
name = "greeter-1"
command = "echo hello from window 1"
directory = "$HOME"

[[command]]
name = "greeter-2"
command = "echo hello from window 2"

[[command]]
name = ""
command = "echo they silenced me"
silence = true
"#;

/// Load a configuration file from a given path and return the raw `ConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        MuxtermError::ConfigError(format!("reading config file at {:?}: {e}", path))
    })?;

    let mut config: ConfigFile = toml::from_str(&contents)?;
    config.source = Some(path.to_path_buf());

    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// This is the entry point for the CLI: the orchestrator itself never
/// re-validates what it receives.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}

/// Config path used when `--config` is not given: `muxterm.toml` in the
/// current working directory, overridable with `MUXTERM_CONFIG`.
pub fn default_config_path() -> PathBuf {
    std::env::var_os("MUXTERM_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("muxterm.toml"))
}

/// Directory holding named command sets: `$MUXTERM_CONFIG_DIR`, else
/// `~/.config/muxterm`. `None` when no home directory can be found.
pub fn default_config_dir() -> Option<PathBuf> {
    std::env::var_os("MUXTERM_CONFIG_DIR")
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|home| home.join(".config").join("muxterm")))
}

/// Parse every `*.toml` file in `dir`, sorted by file name.
///
/// A missing directory holds no sets. Files are not validated.
pub fn load_config_dir(dir: impl AsRef<Path>) -> Result<Vec<ConfigFile>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        debug!(dir = %dir.display(), "config directory does not exist");
        return Ok(Vec::new());
    }

    let entries = fs::read_dir(dir).map_err(|e| {
        MuxtermError::ConfigError(format!("reading config directory {:?}: {e}", dir))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .iter()
        .map(|path| {
            load_from_path(path).map_err(|e| match e {
                MuxtermError::TomlError(err) => {
                    MuxtermError::ConfigError(format!("parsing {:?}: {err}", path))
                }
                other => other,
            })
        })
        .collect()
}

/// Load and validate all command sets in `dir`.
pub fn load_command_sets(dir: impl AsRef<Path>) -> Result<Vec<ConfigFile>> {
    let sets = load_config_dir(dir)?;
    validate_command_sets(&sets)?;
    Ok(sets)
}

/// Write a commented example set into `dir`, creating it if needed.
///
/// Returns the path of the written file.
pub fn write_example_config(dir: impl AsRef<Path>) -> Result<PathBuf> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let path = dir.join(EXAMPLE_FILE_NAME);
    fs::write(&path, EXAMPLE_CONFIG)?;
    Ok(path)
}
