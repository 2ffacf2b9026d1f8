// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Events delivered to an in-flight strategy

use crate::id::RequestId;
use crate::nfvi::NfviResponse;
use serde::{Deserialize, Serialize};

/// Externally sourced notifications routed into the current step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum StrategyEvent {
    HostLockFailed { host_name: String },
    HostUnlockFailed { host_name: String },
    HostRebootFailed { host_name: String },
    HostSwactFailed { host_name: String },
    HostUpgradeFailed { host_name: String },
    DisableHostServicesFailed { host_name: String },
    EnableHostServicesFailed { host_name: String },
    MigrateInstancesFailed { reason: String },
    /// Periodic audit of all hosts completed
    HostAudit,
    HostStateChanged { host_name: String },
    /// Periodic audit of all instances completed
    InstanceAudit,
    InstanceStateChanged { instance_name: String },
    /// Answer to an NFVI request issued by a step
    NfviResponse {
        request_id: RequestId,
        response: NfviResponse,
    },
}

impl StrategyEvent {
    pub fn name(&self) -> &'static str {
        match self {
            StrategyEvent::HostLockFailed { .. } => "host-lock-failed",
            StrategyEvent::HostUnlockFailed { .. } => "host-unlock-failed",
            StrategyEvent::HostRebootFailed { .. } => "host-reboot-failed",
            StrategyEvent::HostSwactFailed { .. } => "host-swact-failed",
            StrategyEvent::HostUpgradeFailed { .. } => "host-upgrade-failed",
            StrategyEvent::DisableHostServicesFailed { .. } => "disable-host-services-failed",
            StrategyEvent::EnableHostServicesFailed { .. } => "enable-host-services-failed",
            StrategyEvent::MigrateInstancesFailed { .. } => "migrate-instances-failed",
            StrategyEvent::HostAudit => "host-audit",
            StrategyEvent::HostStateChanged { .. } => "host-state-changed",
            StrategyEvent::InstanceAudit => "instance-audit",
            StrategyEvent::InstanceStateChanged { .. } => "instance-state-changed",
            StrategyEvent::NfviResponse { .. } => "nfvi-response",
        }
    }

    /// Host named by a host-scoped event
    pub fn host_name(&self) -> Option<&str> {
        match self {
            StrategyEvent::HostLockFailed { host_name }
            | StrategyEvent::HostUnlockFailed { host_name }
            | StrategyEvent::HostRebootFailed { host_name }
            | StrategyEvent::HostSwactFailed { host_name }
            | StrategyEvent::HostUpgradeFailed { host_name }
            | StrategyEvent::DisableHostServicesFailed { host_name }
            | StrategyEvent::EnableHostServicesFailed { host_name }
            | StrategyEvent::HostStateChanged { host_name } => Some(host_name),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
