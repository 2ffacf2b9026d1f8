// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Roles a host can carry; controller+worker hosts are CPE nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostPersonality {
    Controller,
    Storage,
    Swift,
    Worker,
}

impl std::fmt::Display for HostPersonality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HostPersonality::Controller => "controller",
            HostPersonality::Storage => "storage",
            HostPersonality::Swift => "swift",
            HostPersonality::Worker => "worker",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdminState {
    #[default]
    Unlocked,
    Locked,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperState {
    #[default]
    Enabled,
    Disabled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AvailStatus {
    #[default]
    Available,
    Degraded,
    Failed,
    Intest,
    Offline,
    Online,
    PowerOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ServiceState {
    #[default]
    Enabled,
    Disabled,
}

/// A physical host as last reported by the infrastructure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub uuid: String,
    pub name: String,
    pub personality: Vec<HostPersonality>,
    #[serde(default)]
    pub admin_state: AdminState,
    #[serde(default)]
    pub oper_state: OperState,
    #[serde(default)]
    pub avail_status: AvailStatus,
    #[serde(default)]
    pub software_load: String,
    #[serde(default)]
    pub target_load: String,
    /// Configured host services and their state, keyed by service name
    #[serde(default)]
    pub services: BTreeMap<String, ServiceState>,
}

impl Host {
    pub fn has_personality(&self, personality: HostPersonality) -> bool {
        self.personality.contains(&personality)
    }

    pub fn personality_string(&self) -> String {
        self.personality
            .iter()
            .map(|p| p.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn is_locked(&self) -> bool {
        self.admin_state == AdminState::Locked
    }

    pub fn is_unlocked(&self) -> bool {
        self.admin_state == AdminState::Unlocked
    }

    pub fn is_enabled(&self) -> bool {
        self.oper_state == OperState::Enabled
    }

    pub fn is_disabled(&self) -> bool {
        self.oper_state == OperState::Disabled
    }

    pub fn is_available(&self) -> bool {
        self.avail_status == AvailStatus::Available
    }

    pub fn is_online(&self) -> bool {
        self.avail_status == AvailStatus::Online
    }

    pub fn is_offline(&self) -> bool {
        self.avail_status == AvailStatus::Offline
    }

    pub fn host_service_configured(&self, service: &str) -> bool {
        self.services.contains_key(service)
    }

    pub fn host_service_state(&self, service: &str) -> Option<ServiceState> {
        self.services.get(service).copied()
    }
}

/// A virtual machine instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub uuid: String,
    pub name: String,
    pub host_name: String,
    #[serde(default)]
    pub admin_state: AdminState,
    #[serde(default)]
    pub oper_state: OperState,
}

impl Instance {
    pub fn is_locked(&self) -> bool {
        self.admin_state == AdminState::Locked
    }

    pub fn is_enabled(&self) -> bool {
        self.oper_state == OperState::Enabled
    }

    pub fn is_disabled(&self) -> bool {
        self.oper_state == OperState::Disabled
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupPolicy {
    Affinity,
    AntiAffinity,
    AffinityBestEffort,
    AntiAffinityBestEffort,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub uuid: String,
    pub name: String,
    pub member_uuids: Vec<String>,
    #[serde(default)]
    pub policies: Vec<GroupPolicy>,
}

impl InstanceGroup {
    pub fn is_anti_affinity(&self) -> bool {
        self.policies.iter().any(|p| {
            matches!(
                p,
                GroupPolicy::AntiAffinity | GroupPolicy::AntiAffinityBestEffort
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostGroupPolicy {
    StorageReplication,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostGroup {
    pub name: String,
    pub member_names: Vec<String>,
    #[serde(default)]
    pub policies: Vec<HostGroupPolicy>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostAggregate {
    pub name: String,
    pub host_names: Vec<String>,
    #[serde(default)]
    pub availability_zone: String,
}

/// An active platform alarm
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alarm {
    pub alarm_uuid: String,
    pub alarm_id: String,
    pub entity_instance_id: String,
    #[serde(default)]
    pub severity: String,
    #[serde(default)]
    pub reason_text: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default = "default_true")]
    pub mgmt_affecting: bool,
}

fn default_true() -> bool {
    true
}

/// A software patch known to the patching service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwPatch {
    pub name: String,
    #[serde(default)]
    pub sw_version: String,
    #[serde(default)]
    pub repo_state: String,
    #[serde(default)]
    pub patch_state: String,
}

/// Patch status of one host
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSwPatch {
    pub name: String,
    pub personality: Vec<HostPersonality>,
    #[serde(default)]
    pub sw_version: String,
    #[serde(default)]
    pub requires_reboot: bool,
    #[serde(default)]
    pub patch_current: bool,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub patch_failed: bool,
    #[serde(default)]
    pub interim_state: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UpgradeState {
    Unknown,
    Starting,
    Started,
    DataMigration,
    DataMigrationComplete,
    DataMigrationFailed,
    UpgradingControllers,
    UpgradingHosts,
    ActivationRequested,
    Activating,
    ActivationComplete,
    Completing,
    Completed,
    Aborting,
    AbortCompleting,
    #[serde(rename = "aborting-reinstall")]
    AbortingRollback,
}

impl std::fmt::Display for UpgradeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_value(self)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        write!(f, "{}", s)
    }
}

/// The platform upgrade in progress, if any
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Upgrade {
    pub state: UpgradeState,
    pub from_release: String,
    pub to_release: String,
}
