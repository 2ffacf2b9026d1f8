// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parameters supplied when a software-update strategy is created

use serde::{Deserialize, Serialize};

/// Which kind of software update a strategy orchestrates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SwUpdateType {
    SwPatch,
    SwUpgrade,
}

impl SwUpdateType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SwUpdateType::SwPatch => "sw-patch",
            SwUpdateType::SwUpgrade => "sw-upgrade",
        }
    }
}

impl std::fmt::Display for SwUpdateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for SwUpdateType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sw-patch" => Ok(SwUpdateType::SwPatch),
            "sw-upgrade" => Ok(SwUpdateType::SwUpgrade),
            other => Err(format!("unknown sw-update type: {}", other)),
        }
    }
}

/// How hosts of one class are grouped into stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ApplyType {
    #[default]
    Serial,
    Parallel,
    Ignore,
}

impl ApplyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplyType::Serial => "serial",
            ApplyType::Parallel => "parallel",
            ApplyType::Ignore => "ignore",
        }
    }
}

/// What happens to instances on a host that must be taken down
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceAction {
    Migrate,
    #[default]
    StopStart,
}

impl InstanceAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceAction::Migrate => "migrate",
            InstanceAction::StopStart => "stop-start",
        }
    }
}

/// Whether non-management-affecting alarms block progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AlarmRestrictions {
    #[default]
    Strict,
    Relaxed,
}

impl AlarmRestrictions {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmRestrictions::Strict => "strict",
            AlarmRestrictions::Relaxed => "relaxed",
        }
    }
}

fn default_max_parallel() -> u32 {
    2
}

/// Everything a create request carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwUpdateParams {
    pub sw_update_type: SwUpdateType,
    #[serde(default)]
    pub controller_apply_type: ApplyType,
    #[serde(default)]
    pub storage_apply_type: ApplyType,
    #[serde(default)]
    pub swift_apply_type: ApplyType,
    #[serde(default)]
    pub worker_apply_type: ApplyType,
    #[serde(default = "default_max_parallel")]
    pub max_parallel_worker_hosts: u32,
    #[serde(default)]
    pub default_instance_action: InstanceAction,
    #[serde(default)]
    pub alarm_restrictions: AlarmRestrictions,
    #[serde(default)]
    pub start_upgrade: bool,
    #[serde(default)]
    pub complete_upgrade: bool,
}

impl SwUpdateParams {
    pub fn sw_patch() -> Self {
        Self::new(SwUpdateType::SwPatch)
    }

    /// Upgrades always migrate instances and ignore swift hosts
    pub fn sw_upgrade() -> Self {
        Self {
            swift_apply_type: ApplyType::Ignore,
            default_instance_action: InstanceAction::Migrate,
            ..Self::new(SwUpdateType::SwUpgrade)
        }
    }

    fn new(sw_update_type: SwUpdateType) -> Self {
        Self {
            sw_update_type,
            controller_apply_type: ApplyType::Serial,
            storage_apply_type: ApplyType::Serial,
            swift_apply_type: ApplyType::Serial,
            worker_apply_type: ApplyType::Serial,
            max_parallel_worker_hosts: default_max_parallel(),
            default_instance_action: InstanceAction::StopStart,
            alarm_restrictions: AlarmRestrictions::Strict,
            start_upgrade: false,
            complete_upgrade: false,
        }
    }
}
