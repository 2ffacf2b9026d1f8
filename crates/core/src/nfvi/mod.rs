// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Infrastructure records and the request surface the engine issues
//!
//! Everything here is plain data. The engine never performs NFVI calls
//! itself: it emits [`NfviOp`]s as effects and receives [`NfviResponse`]s
//! back as events.

mod op;
mod types;

pub use op::{HostService, NfviOp, NfviResponse};
pub use types::{
    AdminState, Alarm, AvailStatus, GroupPolicy, Host, HostAggregate, HostGroup,
    HostGroupPolicy, HostPersonality, HostSwPatch, Instance, InstanceGroup, OperState,
    ServiceState, SwPatch, Upgrade, UpgradeState,
};
