// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Software upgrade strategy layout

use super::builder::*;
use super::host_lists::{storage_host_lists, worker_host_lists};
use super::params::ApplyType;
use crate::nfvi::{Host, HostPersonality, HostService, Instance, UpgradeState};
use crate::strategy::steps::*;
use crate::strategy::{StepWork, StrategyStage};

const CONTROLLER_0: &str = "controller-0";
const CONTROLLER_1: &str = "controller-1";
const STORAGE_0: &str = "storage-0";

/// Controller disks may take hours to resynchronize
const CONTROLLER_DATA_SYNC_SECS: u64 = 4 * 60 * 60;
const STORAGE_DATA_SYNC_SECS: u64 = 2 * 60 * 60;

pub struct SwUpgradeBuilder;

impl StrategyBuilder for SwUpgradeBuilder {
    fn builtin_ignore_alarms(&self) -> &'static [&'static str] {
        &[
            "900.005", // upgrade in progress
            "900.201", // upgrade auto-apply in progress
        ]
    }

    fn query_stage(&self, ignore_alarms: &[String]) -> StrategyStage {
        let mut stage = StrategyStage::new(SW_UPGRADE_QUERY);
        push(&mut stage, QueryAlarmsStep::new(false, ignore_alarms.to_vec()));
        push(&mut stage, QueryUpgradeStep::new());
        stage
    }

    fn apply_stages(&self, input: &BuildInput<'_>) -> Result<Vec<StrategyStage>, String> {
        let Some(upgrade) = input.findings.upgrade.as_ref() else {
            tracing::warn!("no upgrade in progress");
            return Err("no upgrade in progress".to_string());
        };
        if !matches!(
            upgrade.state,
            UpgradeState::UpgradingControllers | UpgradeState::UpgradingHosts
        ) {
            tracing::warn!(state = %upgrade.state, "invalid upgrade state for orchestration");
            return Err(format!("invalid upgrade state for orchestration: {}", upgrade.state));
        }
        // With controller-1 upgraded, only controller-1 can drive controller-0
        if upgrade.state == UpgradeState::UpgradingControllers
            && input.settings.local_host_name != CONTROLLER_1
        {
            tracing::warn!("controller-1 must be active to upgrade controller-0");
            return Err(
                "controller-1 must be active for orchestration to upgrade controller-0".to_string(),
            );
        }
        if !input.findings.alarms.is_empty() {
            tracing::warn!(alarms = input.findings.alarms.len(), "active alarms found, can't apply software upgrade");
            return Err("active alarms present".to_string());
        }
        if let Some(host) = input.inventory.hosts().find(|h| !unlocked_enabled_available(h)) {
            tracing::warn!(host = %host.name, "host not unlocked-enabled-available");
            return Err(format!(
                "all {} hosts must be unlocked-enabled-available",
                host.personality_string()
            ));
        }

        let mut controllers = Vec::new();
        let mut storage = Vec::new();
        let mut workers = Vec::new();
        for host in input.inventory.hosts() {
            if host.software_load == upgrade.to_release {
                continue;
            }
            if host.has_personality(HostPersonality::Controller) {
                controllers.push(host.clone());
            } else if host.has_personality(HostPersonality::Storage) {
                storage.push(host.clone());
            } else if host.has_personality(HostPersonality::Worker) {
                workers.push(host.clone());
            }
        }

        let mut stages = Vec::new();
        if !controllers.is_empty() {
            controller_stages(input, &controllers, &mut stages)?;
        }
        if !storage.is_empty() {
            storage_stages(input, &storage, &mut stages)?;
        }
        if !workers.is_empty() {
            worker_stages(input, &workers, &mut stages)?;
        }
        if input.params.complete_upgrade {
            stages.push(complete_stage(input));
        }

        if stages.is_empty() {
            tracing::warn!("no software upgrades need to be applied");
            return Err("no software upgrades need to be applied".to_string());
        }
        Ok(stages)
    }
}

fn query_alarms(input: &BuildInput<'_>) -> QueryAlarmsStep {
    QueryAlarmsStep::new(true, input.ignore_alarms.to_vec())
}

/// Lock, upgrade and unlock `hosts`, framed by an alarm check
fn host_upgrade_stage(
    input: &BuildInput<'_>,
    name: &str,
    hosts: &[&Host],
    before_lock: Vec<StepWork>,
    settle: impl Into<StepWork>,
) -> StrategyStage {
    let mut stage = StrategyStage::new(name);
    push(&mut stage, query_alarms(input));
    for work in before_lock {
        push(&mut stage, work);
    }
    push(&mut stage, LockHostsStep::new(hosts.iter().copied(), true));
    push(&mut stage, UpgradeHostsStep::new(hosts.iter().copied()));
    push(&mut stage, UnlockHostsStep::new(hosts.iter().copied()));
    push(&mut stage, settle);
    stage
}

fn controller_stages(
    input: &BuildInput<'_>,
    controllers: &[Host],
    stages: &mut Vec<StrategyStage>,
) -> Result<(), String> {
    if input.inventory.total_by_personality(HostPersonality::Controller) < 2 {
        tracing::warn!("not enough controllers to apply software upgrades");
        return Err("not enough controllers to apply software upgrades".to_string());
    }
    if controllers.iter().any(|h| h.has_personality(HostPersonality::Worker)) {
        tracing::warn!("cannot apply software upgrades to CPE configuration");
        return Err("cannot apply software upgrades to CPE configuration".to_string());
    }

    let controller_1 = controllers.iter().find(|h| h.name == CONTROLLER_1);
    let controller_0 = controllers.iter().find(|h| h.name == CONTROLLER_0);
    let data_sync = || WaitDataSyncStep::new(CONTROLLER_DATA_SYNC_SECS, input.ignore_alarms.to_vec());

    if let Some(host) = controller_1 {
        stages.push(host_upgrade_stage(
            input,
            SW_UPGRADE_CONTROLLERS,
            &[host],
            Vec::new(),
            data_sync(),
        ));
    }
    if let Some(host) = controller_0 {
        // When only controller-0 remains, controller-1 is already active
        let before_lock = if controller_1.is_some() {
            vec![SwactHostsStep::new([host]).into()]
        } else {
            Vec::new()
        };
        stages.push(host_upgrade_stage(
            input,
            SW_UPGRADE_CONTROLLERS,
            &[host],
            before_lock,
            data_sync(),
        ));
    }
    Ok(())
}

fn storage_stages(
    input: &BuildInput<'_>,
    storage_hosts: &[Host],
    stages: &mut Vec<StrategyStage>,
) -> Result<(), String> {
    let apply_type = input.params.storage_apply_type;
    // storage-0 carries a ceph monitor, so it goes first and alone
    let (first, others): (Vec<Host>, Vec<Host>) = storage_hosts
        .iter()
        .cloned()
        .partition(|h| h.name == STORAGE_0);

    let mut lists = if first.is_empty() {
        Vec::new()
    } else {
        storage_host_lists(apply_type, &first, input.inventory)?
    };
    lists.extend(storage_host_lists(apply_type, &others, input.inventory)?);

    for list in &lists {
        let hosts: Vec<&Host> = list.iter().collect();
        stages.push(host_upgrade_stage(
            input,
            SW_UPGRADE_STORAGE_HOSTS,
            &hosts,
            Vec::new(),
            WaitDataSyncStep::new(STORAGE_DATA_SYNC_SECS, input.ignore_alarms.to_vec()),
        ));
    }
    Ok(())
}

fn worker_stages(
    input: &BuildInput<'_>,
    worker_hosts: &[Host],
    stages: &mut Vec<StrategyStage>,
) -> Result<(), String> {
    let params = input.params;
    let lists = worker_host_lists(
        params.worker_apply_type,
        worker_hosts,
        input.inventory,
        params.max_parallel_worker_hosts as usize,
        true,
    )?;

    for list in &lists {
        let mut instances: Vec<&Instance> = Vec::new();
        for host in list {
            for instance in input.inventory.instances_on_host(&host.name) {
                if instance.is_locked() {
                    tracing::warn!(instance = %instance.name, "instance must not be shut down");
                    return Err(format!("instance {} must not be shut down", instance.name));
                }
                instances.push(instance);
            }
        }

        let hosts: Vec<&Host> = list.iter().collect();
        let mut before_lock: Vec<StepWork> = Vec::new();
        if !instances.is_empty() {
            if params.worker_apply_type == ApplyType::Parallel
                && list[0].host_service_configured(HostService::Compute.as_str())
            {
                before_lock.push(DisableHostServicesStep::new(list, HostService::Compute).into());
            }
            before_lock.push(MigrateInstancesStep::new(&instances).into());
        }
        stages.push(host_upgrade_stage(
            input,
            SW_UPGRADE_WORKER_HOSTS,
            &hosts,
            before_lock,
            SystemStabilizeStep::default(),
        ));
    }
    Ok(())
}

/// Activation and completion run from controller-0
fn complete_stage(input: &BuildInput<'_>) -> StrategyStage {
    let mut stage = StrategyStage::new(SW_UPGRADE_COMPLETE);
    push(&mut stage, query_alarms(input));
    if let Some(controller_1) = input.inventory.host(CONTROLLER_1) {
        push(&mut stage, SwactHostsStep::new([controller_1]));
    }
    push(&mut stage, ActivateUpgradeStep::new());
    push(&mut stage, CompleteUpgradeStep::new());
    push(&mut stage, SystemStabilizeStep::default());
    stage
}

#[cfg(test)]
#[path = "sw_upgrade_tests.rs"]
mod tests;
