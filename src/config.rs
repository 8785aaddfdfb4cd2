use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::SqlshapeError;
use crate::jdbc::JdbcSettings;
use crate::mode::Mode;

const CONFIG_FILE: &str = "sqlshape.toml";

/// Load sqlshape configuration from a sqlshape.toml file.
/// Searches parent directories of the inputs, then the user config directory,
/// if no config path is given.
pub fn load_config(files: &[PathBuf], config_path: Option<&Path>) -> Result<Mode, SqlshapeError> {
    let mut mode = Mode::default();

    if let Some(path) = resolve_config_file(files, config_path)? {
        debug!("Loading config from {}", path.display());
        let raw = load_config_from_path(&path)?;
        apply_config(&mut mode, &raw)?;
    }

    Ok(mode)
}

/// Load the `[jdbc]` table of the config file. Missing file or table yields
/// the defaults.
pub fn load_jdbc_settings(
    files: &[PathBuf],
    config_path: Option<&Path>,
) -> Result<JdbcSettings, SqlshapeError> {
    let Some(path) = resolve_config_file(files, config_path)? else {
        return Ok(JdbcSettings::default());
    };
    let mut table = read_table(&path)?;
    match table.remove("jdbc") {
        Some(value) => Ok(value.try_into()?),
        None => Ok(JdbcSettings::default()),
    }
}

fn resolve_config_file(
    files: &[PathBuf],
    config_path: Option<&Path>,
) -> Result<Option<PathBuf>, SqlshapeError> {
    match config_path {
        Some(path) => {
            if path.exists() {
                Ok(Some(path.to_path_buf()))
            } else {
                Err(SqlshapeError::Config(format!(
                    "Config file not found: {}",
                    path.display()
                )))
            }
        }
        None => Ok(find_config_file(files).or_else(user_config_file)),
    }
}

/// Search for a sqlshape.toml in the common parent directories of the given files.
fn find_config_file(files: &[PathBuf]) -> Option<PathBuf> {
    get_common_parents(files)
        .into_iter()
        .map(|parent| parent.join(CONFIG_FILE))
        .find(|config| config.exists())
}

/// `<config_dir>/sqlshape/sqlshape.toml`, if it exists.
fn user_config_file() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join("sqlshape").join(CONFIG_FILE);
    path.exists().then_some(path)
}

/// Get the common parent directories of the given file paths, ordered
/// from most specific to least specific.
fn get_common_parents(files: &[PathBuf]) -> Vec<PathBuf> {
    let mut parents = Vec::new();

    for file in files {
        let parent = if file.is_dir() {
            file.clone()
        } else {
            file.parent()
                .map(|p| p.to_path_buf())
                .unwrap_or_else(|| PathBuf::from("."))
        };

        // Walk up to root
        let mut current = Some(parent.as_path());
        while let Some(dir) = current {
            let dir_buf = dir.to_path_buf();
            if !parents.contains(&dir_buf) {
                parents.push(dir_buf);
            }
            current = dir.parent();
        }
    }

    parents
}

fn read_table(path: &Path) -> Result<toml::Table, SqlshapeError> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| SqlshapeError::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Load the top-level formatting keys of a config file.
fn load_config_from_path(path: &Path) -> Result<HashMap<String, toml::Value>, SqlshapeError> {
    Ok(read_table(path)?
        .into_iter()
        .map(|(k, v)| (k.to_lowercase(), v))
        .collect())
}

/// Apply configuration values to a Mode.
fn apply_config(mode: &mut Mode, config: &HashMap<String, toml::Value>) -> Result<(), SqlshapeError> {
    if let Some(toml::Value::String(s)) = config.get("style") {
        mode.style_name = s.clone();
    }

    if let Some(toml::Value::Boolean(b)) = config.get("highlight") {
        mode.highlight = *b;
    }

    if let Some(toml::Value::Array(arr)) = config.get("exclude") {
        mode.exclude = arr
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect();
    }

    if let Some(toml::Value::Boolean(b)) = config.get("fast") {
        mode.fast = *b;
    }

    if let Some(toml::Value::Integer(n)) = config.get("threads") {
        mode.threads = usize::try_from(*n)
            .map_err(|_| SqlshapeError::Config(format!("Invalid threads value: {}", n)))?;
    }

    // Validate no unknown keys
    let known_keys = ["style", "highlight", "exclude", "fast", "threads", "jdbc"];
    for key in config.keys() {
        if !known_keys.contains(&key.as_str()) {
            return Err(SqlshapeError::Config(format!(
                "Unknown config option: {}",
                key
            )));
        }
    }

    Ok(())
}
