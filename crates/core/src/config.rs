// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration (`vimd.toml`)
//!
//! Every key is optional. A missing file is the same as an empty one.

use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("TOML syntax error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Config {
    #[serde(default, rename = "sw-mgmt-configuration")]
    pub sw_mgmt: SwMgmtConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub nfvi: NfviConfig,
}

/// Site settings applied to every strategy
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SwMgmtConfig {
    /// Alarm ids that never block orchestration, on top of each kind's own list
    #[serde(default, deserialize_with = "comma_separated")]
    pub ignore_alarms: Vec<String>,
    #[serde(default)]
    pub single_controller: bool,
    /// Name of the controller this daemon runs on
    #[serde(default = "default_local_host_name")]
    pub local_host_name: String,
}

impl Default for SwMgmtConfig {
    fn default() -> Self {
        Self {
            ignore_alarms: Vec::new(),
            single_controller: false,
            local_host_name: default_local_host_name(),
        }
    }
}

fn default_local_host_name() -> String {
    "controller-0".to_string()
}

fn comma_separated<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect())
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DaemonConfig {
    #[serde(default = "default_timer_tick", with = "humantime_serde")]
    pub timer_tick: Duration,
    #[serde(default = "default_audit_interval", with = "humantime_serde")]
    pub inventory_audit_interval: Duration,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            timer_tick: default_timer_tick(),
            inventory_audit_interval: default_audit_interval(),
        }
    }
}

fn default_timer_tick() -> Duration {
    Duration::from_secs(1)
}

fn default_audit_interval() -> Duration {
    Duration::from_secs(30)
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NfviConfig {
    /// Lab inventory loaded by the simulated plugin
    #[serde(default)]
    pub inventory: Option<PathBuf>,
}

impl Config {
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        Self::parse(&content)
    }

    /// Like [`Config::load`], but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
