// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Instant;

use fs2::FileExt;
use nfv_adapters::{LabNfvi, NfviError, TracedNfvi};
use nfv_core::{
    ConfigError, Director, DirectorError, JsonStore, StorageError, SwUpdateType, SystemClock,
    UuidIdGen,
};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::runtime::Runtime;

/// Runtime with concrete adapter types (wrapped with tracing)
pub type DaemonRuntime = Runtime<TracedNfvi<LabNfvi>, JsonStore, SystemClock, UuidIdGen>;

/// Socket file name inside the socket directory
pub const SOCKET_NAME: &str = "vimd.sock";

/// Daemon paths
#[derive(Debug, Clone)]
pub struct Config {
    pub state_dir: PathBuf,
    /// Path to Unix socket
    pub socket_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    pub version_path: PathBuf,
    pub log_path: PathBuf,
    /// Path to `vimd.toml`
    pub config_path: PathBuf,
    /// Directory holding strategy records
    pub store_path: PathBuf,
}

impl Config {
    /// Paths from the environment, with an optional config file override
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, LifecycleError> {
        let mut config = Self::under(&state_dir()?, &socket_dir()?);
        if let Some(path) = config_path {
            config.config_path = path;
        }
        Ok(config)
    }

    pub fn under(state_dir: &Path, socket_dir: &Path) -> Self {
        Self {
            state_dir: state_dir.to_path_buf(),
            socket_path: socket_dir.join(SOCKET_NAME),
            lock_path: state_dir.join("vimd.pid"),
            version_path: state_dir.join("vimd.version"),
            log_path: state_dir.join("vimd.log"),
            config_path: state_dir.join("vimd.toml"),
            store_path: state_dir.join("store"),
        }
    }
}

/// Daemon state during operation
pub struct DaemonState {
    pub config: Config,
    pub settings: nfv_core::Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    /// Unix socket listener
    pub listener: UnixListener,
    pub runtime: DaemonRuntime,
    /// When daemon started
    pub start_time: Instant,
    /// Shutdown requested flag
    pub shutdown_requested: bool,
}

impl DaemonState {
    /// Shutdown the daemon gracefully
    pub async fn shutdown(&mut self) -> Result<(), LifecycleError> {
        info!("Shutting down daemon...");

        for path in [
            &self.config.socket_path,
            &self.config.lock_path,
            &self.config.version_path,
        ] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), "Failed to remove file: {}", e);
                }
            }
        }

        // Lock file is released automatically when self.lock_file is dropped
        info!("Daemon shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Director error: {0}")]
    Director(#[from] DirectorError),

    #[error("NFVI error: {0}")]
    Nfvi(#[from] NfviError),
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            // Clean up any resources created before failure
            cleanup_on_failure(config);
            Err(e)
        }
    }
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Acquire lock file FIRST - prevents races
    let mut lock_file = File::create(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    {
        use std::io::Write;
        writeln!(lock_file, "{}", std::process::id())?;
    }

    std::fs::write(&config.version_path, env!("CARGO_PKG_VERSION"))?;

    let settings = nfv_core::Config::load_or_default(&config.config_path)?;

    let lab = match &settings.nfvi.inventory {
        Some(path) => LabNfvi::load(path)?,
        None => {
            warn!("no lab inventory configured, starting with an empty infrastructure");
            LabNfvi::default()
        }
    };

    // Bring back any strategy left by a previous run
    let store = JsonStore::open(&config.store_path)?;
    let director = Director::open(settings.sw_mgmt.clone(), store, SystemClock, UuidIdGen)?;
    let restored = director
        .get_strategy(SwUpdateType::SwPatch)
        .or_else(|| director.get_strategy(SwUpdateType::SwUpgrade));
    if let Some(sw_update) = restored {
        warn!(
            strategy = %sw_update.uuid(),
            state = %sw_update.strategy().state(),
            "restored strategy from previous run"
        );
    }

    let mut runtime = Runtime::new(director, TracedNfvi::new(lab));
    runtime.load_inventory().await?;
    runtime.run_effects().await;

    // Remove stale socket and bind (LAST - only after all validation passes)
    if config.socket_path.exists() {
        std::fs::remove_file(&config.socket_path)?;
    }
    let listener = UnixListener::bind(&config.socket_path)
        .map_err(|e| LifecycleError::BindFailed(config.socket_path.clone(), e))?;

    info!(state_dir = %config.state_dir.display(), "Daemon started");

    Ok(DaemonState {
        config: config.clone(),
        settings,
        lock_file,
        listener,
        runtime,
        start_time: Instant::now(),
        shutdown_requested: false,
    })
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    for path in [&config.socket_path, &config.version_path, &config.lock_path] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// State directory: `NFV_STATE_DIR`, else `$XDG_STATE_HOME/nfv`, else
/// `~/.local/state/nfv`
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("NFV_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("nfv"));
    }

    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/nfv"))
}

/// Socket directory, overridable with `NFV_SOCKET_DIR` to keep paths short
pub fn socket_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("NFV_SOCKET_DIR") {
        return Ok(PathBuf::from(dir));
    }
    state_dir()
}

/// Where clients look for the daemon by default
pub fn default_socket_path() -> Result<PathBuf, LifecycleError> {
    Ok(socket_dir()?.join(SOCKET_NAME))
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
