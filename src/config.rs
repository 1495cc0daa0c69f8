// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! Environment variable names, defaults, and the validated [`AppConfig`]
//! loaded once at startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `DATA_DIR` | Directory holding the encrypted registers | `data` |
//! | `KEY_PATH` | Symmetric key file | `secret.key` |
//! | `HOST` | Server bind address | `0.0.0.0` |
//! | `PORT` | Server bind port | `8080` |
//! | `FACE_MATCH_THRESHOLD` | Max distance accepted as a match | `0.45` |
//! | `TWIN_MATCH_THRESHOLD` | Max distance flagged as a lookalike at enrollment | `0.6` |
//! | `SAMPLES_PER_IDENTITY` | Vectors captured per enrollment | `10` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::env;
use std::path::PathBuf;

use crate::recognition::{MatchError, MatchThresholds};
use crate::storage::keystore::DEFAULT_KEY_PATH;
use crate::storage::paths::DATA_ROOT;

/// Environment variable name for the data directory.
///
/// Every register, the gallery, and the scratch area live below it.
pub const DATA_DIR_ENV: &str = "DATA_DIR";

/// Environment variable name for the key file path.
///
/// Kept outside `DATA_DIR` by default so a copied data directory is
/// useless without the key.
pub const KEY_PATH_ENV: &str = "KEY_PATH";

pub const HOST_ENV: &str = "HOST";
pub const PORT_ENV: &str = "PORT";
pub const FACE_MATCH_THRESHOLD_ENV: &str = "FACE_MATCH_THRESHOLD";
pub const TWIN_MATCH_THRESHOLD_ENV: &str = "TWIN_MATCH_THRESHOLD";
pub const SAMPLES_PER_IDENTITY_ENV: &str = "SAMPLES_PER_IDENTITY";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_SAMPLES_PER_IDENTITY: usize = 10;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tower_http=debug";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
    #[error(transparent)]
    Thresholds(#[from] MatchError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    Json,
    #[default]
    Pretty,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub key_path: PathBuf,
    pub host: String,
    pub port: u16,
    pub thresholds: MatchThresholds,
    pub samples_per_identity: usize,
    pub log_format: LogFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DATA_ROOT),
            key_path: PathBuf::from(DEFAULT_KEY_PATH),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            thresholds: MatchThresholds::default(),
            samples_per_identity: DEFAULT_SAMPLES_PER_IDENTITY,
            log_format: LogFormat::default(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load from an arbitrary variable lookup. Unset variables take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let match_threshold = parse_or(
            &lookup,
            FACE_MATCH_THRESHOLD_ENV,
            defaults.thresholds.match_threshold,
        )?;
        let twin_threshold = parse_or(
            &lookup,
            TWIN_MATCH_THRESHOLD_ENV,
            defaults.thresholds.twin_threshold,
        )?;

        let samples_per_identity =
            parse_or(&lookup, SAMPLES_PER_IDENTITY_ENV, defaults.samples_per_identity)?;
        if samples_per_identity == 0 {
            return Err(ConfigError::Invalid {
                name: SAMPLES_PER_IDENTITY_ENV,
                value: "0".to_string(),
            });
        }

        let log_format = match lookup(LOG_FORMAT_ENV).as_deref().map(str::trim) {
            None | Some("") => LogFormat::default(),
            Some(raw) if raw.eq_ignore_ascii_case("json") => LogFormat::Json,
            Some(raw) if raw.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            Some(raw) => {
                return Err(ConfigError::Invalid {
                    name: LOG_FORMAT_ENV,
                    value: raw.to_string(),
                })
            }
        };

        Ok(Self {
            data_dir: lookup(DATA_DIR_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            key_path: lookup(KEY_PATH_ENV)
                .map(PathBuf::from)
                .unwrap_or(defaults.key_path),
            host: lookup(HOST_ENV).unwrap_or(defaults.host),
            port: parse_or(&lookup, PORT_ENV, defaults.port)?,
            thresholds: MatchThresholds::new(match_threshold, twin_threshold)?,
            samples_per_identity,
            log_format,
        })
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
    }
}
