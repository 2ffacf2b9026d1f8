// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! NFV software management daemon library
//!
//! Exposes the wire protocol for `sw-manager` and the pieces `nfv-vimd`
//! is assembled from.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod lifecycle;
pub mod protocol;
pub mod runtime;
pub mod server;

pub use lifecycle::{default_socket_path, Config, DaemonState, LifecycleError};
pub use protocol::{ProtocolError, Request, Response, StrategySummary, PROTOCOL_VERSION};
pub use runtime::Runtime;
