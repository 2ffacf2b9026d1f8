// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use nfv_adapters::NfviPlugin;
use nfv_core::{Clock, IdGen, SwUpdateStore, SwUpdateType};
use tokio::net::UnixStream;
use tracing::{debug, error, info};

use crate::lifecycle::DaemonState;
use crate::protocol::{self, Request, Response, StrategySummary, DEFAULT_TIMEOUT, PROTOCOL_VERSION};
use crate::runtime::Runtime;

/// Handle a single client connection
pub async fn handle_connection(
    daemon: &mut DaemonState,
    stream: UnixStream,
) -> Result<(), ServerError> {
    let (mut reader, mut writer) = stream.into_split();

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!("Received request: {:?}", request);

    let response = match request {
        Request::Ping => Response::Pong,

        Request::Hello { version } => {
            if version != PROTOCOL_VERSION {
                info!(client = %version, "client version differs");
            }
            Response::Hello {
                version: PROTOCOL_VERSION.to_string(),
            }
        }

        Request::Shutdown => {
            daemon.shutdown_requested = true;
            Response::ShuttingDown
        }

        Request::Status => Response::Status {
            uptime_secs: daemon.start_time.elapsed().as_secs(),
            strategy: summary(&daemon.runtime),
            alarms: daemon.runtime.active_alarms(),
        },

        request => handle_request(&mut daemon.runtime, request).await,
    };

    debug!("Sending response: {:?}", response);

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a strategy request, carrying out the effects it caused before
/// returning.
pub async fn handle_request<P, S, C, G>(runtime: &mut Runtime<P, S, C, G>, request: Request) -> Response
where
    P: NfviPlugin,
    S: SwUpdateStore,
    C: Clock,
    G: IdGen,
{
    let response = match request {
        Request::CreateStrategy { params } => {
            let sw_update_type = params.sw_update_type;
            let mut reply = None;
            let result = runtime
                .director_mut()
                .create_strategy(params, |r| reply = Some(r));
            match result {
                Ok(uuid) => {
                    info!(strategy = %uuid, %sw_update_type, "strategy created");
                    Response::Strategy {
                        strategy: reply.and_then(|r| r.strategy),
                    }
                }
                Err(e) => Response::Error { message: e.to_string() },
            }
        }

        Request::ApplyStrategy {
            sw_update_type,
            stage_id,
        } => {
            let Some(uuid) = current_uuid(runtime, sw_update_type) else {
                return Response::Strategy { strategy: None };
            };
            match runtime.director_mut().apply_strategy(&uuid, stage_id) {
                Ok(()) => Response::Strategy {
                    strategy: wire(runtime, sw_update_type),
                },
                Err(e) => Response::Error { message: e.to_string() },
            }
        }

        Request::AbortStrategy {
            sw_update_type,
            stage_id,
        } => {
            let Some(uuid) = current_uuid(runtime, sw_update_type) else {
                return Response::Strategy { strategy: None };
            };
            match runtime.director_mut().abort_strategy(&uuid, stage_id) {
                Ok(()) => Response::Strategy {
                    strategy: wire(runtime, sw_update_type),
                },
                Err(e) => Response::Error { message: e.to_string() },
            }
        }

        Request::DeleteStrategy {
            sw_update_type,
            force,
        } => {
            let Some(uuid) = current_uuid(runtime, sw_update_type) else {
                return Response::Strategy { strategy: None };
            };
            match runtime.director_mut().delete_strategy(&uuid, force) {
                Ok(()) => Response::Deleted,
                Err(e) => Response::Error { message: e.to_string() },
            }
        }

        Request::GetStrategy { sw_update_type } => Response::Strategy {
            strategy: wire(runtime, sw_update_type),
        },

        other => Response::Error {
            message: format!("unexpected request: {:?}", other),
        },
    };

    runtime.run_effects().await;
    response
}

fn current_uuid<P, S, C, G>(runtime: &Runtime<P, S, C, G>, sw_update_type: SwUpdateType) -> Option<String>
where
    P: NfviPlugin,
    S: SwUpdateStore,
    C: Clock,
    G: IdGen,
{
    runtime
        .director()
        .get_strategy(sw_update_type)
        .map(|sw_update| sw_update.uuid().to_string())
}

fn wire<P, S, C, G>(runtime: &Runtime<P, S, C, G>, sw_update_type: SwUpdateType) -> Option<serde_json::Value>
where
    P: NfviPlugin,
    S: SwUpdateStore,
    C: Clock,
    G: IdGen,
{
    let sw_update = runtime.director().get_strategy(sw_update_type)?;
    match sw_update.to_wire() {
        Ok(value) => Some(value),
        Err(e) => {
            error!(strategy = %sw_update.uuid(), error = %e, "failed to encode strategy");
            None
        }
    }
}

fn summary<P, S, C, G>(runtime: &Runtime<P, S, C, G>) -> Option<StrategySummary>
where
    P: NfviPlugin,
    S: SwUpdateStore,
    C: Clock,
    G: IdGen,
{
    [SwUpdateType::SwPatch, SwUpdateType::SwUpgrade]
        .into_iter()
        .find_map(|t| runtime.director().get_strategy(t))
        .map(|sw_update| StrategySummary {
            uuid: sw_update.uuid().to_string(),
            sw_update_type: sw_update.sw_update_type(),
            state: sw_update.strategy().state().to_string(),
        })
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
