// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Concrete step implementations
//!
//! Every step is a single [`TaskWork`](super::task::TaskWork) unit. Runtime
//! bookkeeping (outstanding request ids, wait windows) is not persisted; a
//! restored step starts those afresh.

mod hosts;
mod instances;
mod queries;
mod system;
mod upgrade;

pub use hosts::{
    DisableHostServicesStep, EnableHostServicesStep, LockHostsStep, RebootHostsStep,
    SwPatchHostsStep, SwactHostsStep, UnlockHostsStep,
};
pub use instances::{MigrateInstancesStep, StartInstancesStep, StopInstancesStep};
pub use queries::{
    QueryAlarmsStep, QuerySwPatchHostsStep, QuerySwPatchesStep, QueryUpgradeStep,
    WaitDataSyncStep,
};
pub use system::SystemStabilizeStep;
pub use upgrade::{ActivateUpgradeStep, CompleteUpgradeStep, StartUpgradeStep, UpgradeHostsStep};

use crate::nfvi::{Alarm, Host, Instance};
use crate::sw_update::AlarmRestrictions;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Kind of entity a step acts on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EntityType {
    #[serde(rename = "hosts")]
    Hosts,
    #[serde(rename = "instances")]
    Instances,
    #[default]
    #[serde(rename = "")]
    None,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Hosts => "hosts",
            EntityType::Instances => "instances",
            EntityType::None => "",
        }
    }
}

/// Entities named by a step, names and uuids in matching order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Entities {
    #[serde(default)]
    pub entity_type: EntityType,
    #[serde(default)]
    pub entity_names: Vec<String>,
    #[serde(default)]
    pub entity_uuids: Vec<String>,
}

impl Entities {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn hosts<'a>(hosts: impl IntoIterator<Item = &'a Host>) -> Self {
        let (entity_names, entity_uuids) = hosts
            .into_iter()
            .map(|h| (h.name.clone(), h.uuid.clone()))
            .unzip();
        Self {
            entity_type: EntityType::Hosts,
            entity_names,
            entity_uuids,
        }
    }

    pub fn instances<'a>(instances: impl IntoIterator<Item = &'a Instance>) -> Self {
        let (entity_names, entity_uuids) = instances
            .into_iter()
            .map(|i| (i.name.clone(), i.uuid.clone()))
            .unzip();
        Self {
            entity_type: EntityType::Instances,
            entity_names,
            entity_uuids,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.entity_names
    }

    pub fn uuids(&self) -> &[String] {
        &self.entity_uuids
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.entity_names.iter().any(|n| n == name)
    }
}

/// Seconds since the first call, measured from the step's first event
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct WaitWindow {
    since: Option<Instant>,
}

impl WaitWindow {
    pub(crate) fn elapsed_secs(&mut self, now: Instant) -> f64 {
        let since = *self.since.get_or_insert(now);
        now.saturating_duration_since(since).as_secs_f64()
    }
}

/// Drop ignored alarms, and non-management-affecting ones when relaxed
pub(crate) fn filter_alarms(
    alarms: Vec<Alarm>,
    ignore_alarms: &[String],
    restrictions: AlarmRestrictions,
) -> Vec<Alarm> {
    alarms
        .into_iter()
        .filter(|alarm| {
            if restrictions == AlarmRestrictions::Relaxed && !alarm.mgmt_affecting {
                tracing::warn!(
                    alarm_id = %alarm.alarm_id,
                    alarm_uuid = %alarm.alarm_uuid,
                    "ignoring non-management affecting alarm due to relaxed alarm strictness"
                );
                false
            } else if ignore_alarms.contains(&alarm.alarm_id) {
                tracing::debug!(alarm_id = %alarm.alarm_id, alarm_uuid = %alarm.alarm_uuid, "ignoring alarm");
                false
            } else {
                true
            }
        })
        .collect()
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
