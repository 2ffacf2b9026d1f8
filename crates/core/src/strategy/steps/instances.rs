// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance steps: migrate, stop, start

use super::Entities;
use crate::event::StrategyEvent;
use crate::inventory::Inventory;
use crate::nfvi::{Instance, NfviOp};
use crate::strategy::context::Context;
use crate::strategy::result::TaskResult;
use crate::strategy::task::{EventOutcome, TaskWork};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Count the instances matching `pred`; `None` if any instance is gone
fn count_instances(
    inventory: &Inventory,
    uuids: &[String],
    pred: impl Fn(&Instance) -> bool,
) -> Option<usize> {
    let mut total = 0;
    for uuid in uuids {
        let instance = inventory.instance(uuid)?;
        if pred(instance) {
            total += 1;
        }
    }
    Some(total)
}

/// Reason for the first instance found away from its recorded host
fn moved_instance(inventory: &Inventory, uuids: &[String], origin: &BTreeMap<String, String>) -> Option<String> {
    uuids.iter().find_map(|uuid| {
        let instance = inventory.instance(uuid)?;
        let recorded = origin.get(uuid)?;
        (instance.host_name != *recorded).then(|| {
            format!(
                "instance {} has moved from {} to {} after strategy created",
                instance.name, recorded, instance.host_name
            )
        })
    })
}

fn origin_hosts<'a>(instances: impl IntoIterator<Item = &'a Instance>) -> BTreeMap<String, String> {
    instances
        .into_iter()
        .map(|i| (i.uuid.clone(), i.host_name.clone()))
        .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct MigrateInstancesStep {
    #[serde(flatten)]
    entities: Entities,
    /// Host each instance was on when the step was built
    #[serde(default)]
    instance_host_names: BTreeMap<String, String>,
}

impl MigrateInstancesStep {
    pub const NAME: &'static str = "migrate-instances";

    pub fn new(instances: &[&Instance]) -> Self {
        Self {
            entities: Entities::instances(instances.iter().copied()),
            instance_host_names: origin_hosts(instances.iter().copied()),
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    /// Every source host has been emptied
    fn all_migrated(&self, inventory: &Inventory) -> bool {
        let sources: BTreeSet<&String> = self.instance_host_names.values().collect();
        !sources.iter().any(|host_name| inventory.exist_on_host(host_name))
    }
}

impl TaskWork for MigrateInstancesStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        1800
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        tracing::info!(step = Self::NAME, instances = ?self.entities.names(), "step apply");
        if self.all_migrated(ctx.inventory) {
            return (TaskResult::Success, String::new());
        }

        // Migration moves everything off each source host, so only proceed
        // while the instances are still where the strategy found them
        if let Some(reason) = moved_instance(ctx.inventory, self.entities.uuids(), &self.instance_host_names) {
            return (TaskResult::Failed, reason);
        }

        ctx.request(NfviOp::MigrateInstances {
            instance_uuids: self.entities.uuids().to_vec(),
        });
        (TaskResult::Wait, String::new())
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::InstanceStateChanged { .. } | StrategyEvent::InstanceAudit => {
                if self.all_migrated(ctx.inventory) {
                    EventOutcome::Complete(TaskResult::Success, String::new())
                } else {
                    EventOutcome::Ignored
                }
            }
            StrategyEvent::MigrateInstancesFailed { reason } => {
                EventOutcome::Complete(TaskResult::Failed, reason.clone())
            }
            _ => EventOutcome::Ignored,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StopInstancesStep {
    #[serde(flatten)]
    entities: Entities,
    #[serde(default)]
    instance_host_names: BTreeMap<String, String>,
}

impl StopInstancesStep {
    pub const NAME: &'static str = "stop-instances";

    pub fn new(instances: &[&Instance]) -> Self {
        Self {
            entities: Entities::instances(instances.iter().copied()),
            instance_host_names: origin_hosts(instances.iter().copied()),
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    pub fn abort_step(&self) -> StartInstancesStep {
        StartInstancesStep {
            entities: self.entities.clone(),
        }
    }

    fn total_stopped(&self, inventory: &Inventory) -> Option<usize> {
        count_instances(inventory, self.entities.uuids(), |i| {
            i.is_locked() && i.is_disabled()
        })
    }
}

impl TaskWork for StopInstancesStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        900
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        tracing::info!(step = Self::NAME, instances = ?self.entities.names(), "step apply");
        if self.total_stopped(ctx.inventory) == Some(self.entities.uuids().len()) {
            return (TaskResult::Success, String::new());
        }

        if let Some(reason) = moved_instance(ctx.inventory, self.entities.uuids(), &self.instance_host_names) {
            return (TaskResult::Failed, reason);
        }

        ctx.request(NfviOp::StopInstances {
            instance_uuids: self.entities.uuids().to_vec(),
        });
        (TaskResult::Wait, String::new())
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::InstanceStateChanged { .. } | StrategyEvent::InstanceAudit => {
                match self.total_stopped(ctx.inventory) {
                    None => EventOutcome::Complete(
                        TaskResult::Failed,
                        "instance no longer exists".to_string(),
                    ),
                    Some(total) if total == self.entities.uuids().len() => {
                        EventOutcome::Complete(TaskResult::Success, String::new())
                    }
                    Some(_) => EventOutcome::Ignored,
                }
            }
            _ => EventOutcome::Ignored,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartInstancesStep {
    #[serde(flatten)]
    entities: Entities,
}

impl StartInstancesStep {
    pub const NAME: &'static str = "start-instances";

    pub fn new(instances: &[&Instance]) -> Self {
        Self {
            entities: Entities::instances(instances.iter().copied()),
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    fn total_started(&self, inventory: &Inventory) -> Option<usize> {
        count_instances(inventory, self.entities.uuids(), |i| i.is_enabled())
    }
}

impl TaskWork for StartInstancesStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        900
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        tracing::info!(step = Self::NAME, instances = ?self.entities.names(), "step apply");
        if self.total_started(ctx.inventory) == Some(self.entities.uuids().len()) {
            return (TaskResult::Success, String::new());
        }
        ctx.request(NfviOp::StartInstances {
            instance_uuids: self.entities.uuids().to_vec(),
        });
        (TaskResult::Wait, String::new())
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::InstanceStateChanged { .. } | StrategyEvent::InstanceAudit => {
                match self.total_started(ctx.inventory) {
                    None => EventOutcome::Complete(
                        TaskResult::Failed,
                        "instance no longer exists".to_string(),
                    ),
                    Some(total) if total == self.entities.uuids().len() => {
                        EventOutcome::Complete(TaskResult::Success, String::new())
                    }
                    Some(_) => EventOutcome::Ignored,
                }
            }
            _ => EventOutcome::Ignored,
        }
    }
}

#[cfg(test)]
#[path = "instances_tests.rs"]
mod tests;
