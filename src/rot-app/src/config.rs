// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    ReadError(PathBuf, String),

    #[error("Failed to parse config file {0}: {1}")]
    ParseError(PathBuf, String),
}

/// Returns the default search paths for `rot-rs.toml`
/// (current directory → XDG config → /etc).
fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("rot-rs.toml")];
    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("rot-rs").join("rot-rs.toml"));
    }
    paths.push(PathBuf::from("/etc/rot-rs/rot-rs.toml"));
    paths
}

/// Pull one section out of a parsed TOML document and deserialize it.
fn parse_section<T: DeserializeOwned>(
    content: &str,
    key: &str,
    path: &Path,
) -> Result<Option<T>, ConfigError> {
    let parse_err = |e: String| ConfigError::ParseError(path.to_path_buf(), e);

    let mut table: toml::Table = toml::from_str(content).map_err(|e| parse_err(e.to_string()))?;
    let Some(section) = table.remove(key) else {
        return Ok(None);
    };
    section
        .try_into::<T>()
        .map(Some)
        .map_err(|e| parse_err(e.to_string()))
}

fn load_section_from_file<T: DeserializeOwned>(
    path: &Path,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::ReadError(path.to_path_buf(), e.to_string()))?;
    parse_section(&content, key, path)
}

/// Trait for loading configuration from a `rot-rs.toml` section.
pub trait ConfigFile: Sized + Default + DeserializeOwned + Serialize {
    /// Section key in `rot-rs.toml` (e.g. `"rot-server"`).
    fn section_key() -> &'static str;

    /// Load the section from a specific file path.
    ///
    /// A file without the `[<section_key>]` table is an error here, since
    /// the caller asked for this file explicitly.
    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        load_section_from_file::<Self>(path, Self::section_key())?.ok_or_else(|| {
            ConfigError::ParseError(
                path.to_path_buf(),
                format!("missing [{}] section", Self::section_key()),
            )
        })
    }

    /// Search default paths (`rot-rs.toml` in CWD → XDG → /etc) and load
    /// the first file that contains the expected section.
    ///
    /// Returns `(Default::default(), None)` when nothing is found.
    fn load_from_default_paths() -> Result<(Self, Option<PathBuf>), ConfigError> {
        for path in config_search_paths() {
            if path.exists() {
                if let Some(cfg) = load_section_from_file::<Self>(&path, Self::section_key())? {
                    return Ok((cfg, Some(path)));
                }
            }
        }
        Ok((Self::default(), None))
    }

    /// Load from `explicit` when given, otherwise from the default search paths.
    fn load(explicit: Option<&Path>) -> Result<(Self, Option<PathBuf>), ConfigError> {
        match explicit {
            Some(path) => Ok((Self::load_from_file(path)?, Some(path.to_path_buf()))),
            None => Self::load_from_default_paths(),
        }
    }

    /// Render `value` under its section header.
    fn to_section_toml(value: &Self) -> String {
        let mut table = toml::Table::new();
        match toml::Value::try_from(value) {
            Ok(section) => {
                table.insert(Self::section_key().to_string(), section);
                toml::to_string_pretty(&table).unwrap_or_default()
            }
            Err(_) => String::new(),
        }
    }
}
