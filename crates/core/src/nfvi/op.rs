// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::types::{Alarm, HostSwPatch, SwPatch, Upgrade};
use serde::{Deserialize, Serialize};

/// Host services that can be disabled ahead of a host lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostService {
    Compute,
    Guest,
    Network,
}

impl HostService {
    pub fn as_str(&self) -> &'static str {
        match self {
            HostService::Compute => "compute",
            HostService::Guest => "guest",
            HostService::Network => "network",
        }
    }
}

impl std::fmt::Display for HostService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A request for the infrastructure
///
/// Host and instance operations report failure through the matching
/// `*-failed` strategy event. Queries answer with an [`NfviResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "kebab-case")]
pub enum NfviOp {
    LockHosts { host_names: Vec<String> },
    UnlockHosts { host_names: Vec<String> },
    RebootHosts { host_names: Vec<String> },
    SwactHosts { host_names: Vec<String> },
    UpgradeHosts { host_names: Vec<String> },
    DisableHostServices { host_names: Vec<String>, service: HostService },
    EnableHostServices { host_names: Vec<String>, service: HostService },
    MigrateInstances { instance_uuids: Vec<String> },
    StopInstances { instance_uuids: Vec<String> },
    StartInstances { instance_uuids: Vec<String> },
    GetAlarms,
    GetSwPatches,
    GetSwPatchHosts,
    UpdateSwPatchHosts { host_names: Vec<String> },
    GetUpgrade,
    UpgradeStart,
    UpgradeActivate,
    UpgradeComplete,
}

impl NfviOp {
    pub fn name(&self) -> &'static str {
        match self {
            NfviOp::LockHosts { .. } => "lock-hosts",
            NfviOp::UnlockHosts { .. } => "unlock-hosts",
            NfviOp::RebootHosts { .. } => "reboot-hosts",
            NfviOp::SwactHosts { .. } => "swact-hosts",
            NfviOp::UpgradeHosts { .. } => "upgrade-hosts",
            NfviOp::DisableHostServices { .. } => "disable-host-services",
            NfviOp::EnableHostServices { .. } => "enable-host-services",
            NfviOp::MigrateInstances { .. } => "migrate-instances",
            NfviOp::StopInstances { .. } => "stop-instances",
            NfviOp::StartInstances { .. } => "start-instances",
            NfviOp::GetAlarms => "get-alarms",
            NfviOp::GetSwPatches => "get-sw-patches",
            NfviOp::GetSwPatchHosts => "get-sw-patch-hosts",
            NfviOp::UpdateSwPatchHosts { .. } => "update-sw-patch-hosts",
            NfviOp::GetUpgrade => "get-upgrade",
            NfviOp::UpgradeStart => "upgrade-start",
            NfviOp::UpgradeActivate => "upgrade-activate",
            NfviOp::UpgradeComplete => "upgrade-complete",
        }
    }
}

/// Outcome of an [`NfviOp`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "kebab-case")]
pub enum NfviResponse {
    /// The request was accepted with nothing to report
    Accepted,
    Alarms(Vec<Alarm>),
    SwPatches(Vec<SwPatch>),
    SwPatchHosts(Vec<HostSwPatch>),
    Upgrade(Option<Upgrade>),
    /// The request did not complete
    Failed(String),
}

impl NfviResponse {
    pub fn completed(&self) -> bool {
        !matches!(self, NfviResponse::Failed(_))
    }
}
