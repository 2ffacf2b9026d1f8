// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client for CLI commands

use std::path::PathBuf;
use std::time::Duration;

use nfv_core::{SwUpdateParams, SwUpdateType};
use nfv_daemon::protocol::{self, ProtocolError};
use nfv_daemon::{Request, Response};
use serde_json::Value;
use thiserror::Error;
use tokio::net::UnixStream;

/// Timeout for IPC requests, `NFV_TIMEOUT_IPC_MS` in milliseconds
pub fn timeout_ipc() -> Duration {
    std::env::var("NFV_TIMEOUT_IPC_MS")
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
        .unwrap_or(Duration::from_secs(5))
}

/// Client errors
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("Daemon not running at {0}")]
    DaemonNotRunning(PathBuf),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Unexpected response from daemon")]
    UnexpectedResponse,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not determine state directory")]
    NoStateDir,
}

/// Daemon client
pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to the daemon at `socket`, or at the default socket path
    pub fn connect(socket: Option<PathBuf>) -> Result<Self, ClientError> {
        let socket_path = match socket {
            Some(path) => path,
            None => nfv_daemon::default_socket_path().map_err(|_| ClientError::NoStateDir)?,
        };

        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning(socket_path));
        }

        Ok(Self { socket_path })
    }

    /// Send a request and receive a response
    pub async fn send(&self, request: Request) -> Result<Response, ClientError> {
        let timeout = timeout_ipc();
        tracing::debug!(socket = %self.socket_path.display(), ?request, "sending request");
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::encode(&request)?;
        tokio::time::timeout(timeout, protocol::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        let response_bytes = tokio::time::timeout(timeout, protocol::read_message(&mut reader))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        Ok(protocol::decode(&response_bytes)?)
    }

    /// Create a strategy, returning its wire form
    pub async fn create_strategy(&self, params: SwUpdateParams) -> Result<Option<Value>, ClientError> {
        self.strategy(Request::CreateStrategy { params }).await
    }

    pub async fn apply_strategy(
        &self,
        sw_update_type: SwUpdateType,
        stage_id: Option<usize>,
    ) -> Result<Option<Value>, ClientError> {
        self.strategy(Request::ApplyStrategy {
            sw_update_type,
            stage_id,
        })
        .await
    }

    pub async fn abort_strategy(
        &self,
        sw_update_type: SwUpdateType,
        stage_id: Option<usize>,
    ) -> Result<Option<Value>, ClientError> {
        self.strategy(Request::AbortStrategy {
            sw_update_type,
            stage_id,
        })
        .await
    }

    pub async fn get_strategy(&self, sw_update_type: SwUpdateType) -> Result<Option<Value>, ClientError> {
        self.strategy(Request::GetStrategy { sw_update_type }).await
    }

    /// Returns false when there was no strategy of this kind to delete
    pub async fn delete_strategy(&self, sw_update_type: SwUpdateType, force: bool) -> Result<bool, ClientError> {
        match self
            .send(Request::DeleteStrategy {
                sw_update_type,
                force,
            })
            .await?
        {
            Response::Deleted => Ok(true),
            Response::Strategy { strategy: None } => Ok(false),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    async fn strategy(&self, request: Request) -> Result<Option<Value>, ClientError> {
        match self.send(request).await? {
            Response::Strategy { strategy } => Ok(strategy),
            Response::Error { message } => Err(ClientError::Rejected(message)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
