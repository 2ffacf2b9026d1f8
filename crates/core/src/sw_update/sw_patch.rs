// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Software patch strategy layout

use super::builder::*;
use super::host_lists::{storage_host_lists, worker_host_lists};
use super::params::{ApplyType, InstanceAction};
use crate::nfvi::{Host, HostPersonality, HostService, Instance};
use crate::strategy::steps::*;
use crate::strategy::StrategyStage;

/// Wait after patching before a rebooting host may be unlocked
const MTCE_DELAY_SECS: u64 = 15;
/// Settle time for a host patched in service
const NO_REBOOT_DELAY_SECS: u64 = 30;
const STORAGE_DATA_SYNC_SECS: u64 = 30 * 60;

pub struct SwPatchBuilder;

impl StrategyBuilder for SwPatchBuilder {
    fn builtin_ignore_alarms(&self) -> &'static [&'static str] {
        &[
            "900.001", // patch in progress
            "900.005", // upgrade in progress
            "900.101", // patch auto-apply in progress
            "200.001", // host locked
            "700.004", // instance stopped
            "280.002", // subcloud out of sync
        ]
    }

    fn query_stage(&self, ignore_alarms: &[String]) -> StrategyStage {
        let mut stage = StrategyStage::new(SW_PATCH_QUERY);
        push(&mut stage, QueryAlarmsStep::new(false, ignore_alarms.to_vec()));
        push(&mut stage, QuerySwPatchesStep::new());
        push(&mut stage, QuerySwPatchHostsStep::new());
        stage
    }

    fn apply_stages(&self, input: &BuildInput<'_>) -> Result<Vec<StrategyStage>, String> {
        let findings = input.findings;
        if findings.sw_patches.is_empty() {
            tracing::warn!("no software patches found");
            return Err("no software patches found".to_string());
        }
        if !findings.alarms.is_empty() {
            tracing::warn!(alarms = findings.alarms.len(), "active alarms found, can't apply software patches");
            return Err("active alarms present".to_string());
        }

        for host in input.inventory.hosts() {
            if host.has_personality(HostPersonality::Worker)
                && !host.has_personality(HostPersonality::Controller)
            {
                // Workers may also be patched while locked or powered down
                let locked_disabled = host.is_locked() && host.is_disabled();
                if !(unlocked_enabled_available(host)
                    || (locked_disabled && host.is_offline())
                    || (locked_disabled && host.is_online()))
                {
                    tracing::warn!(host = %host.name, "worker host not in a patchable state");
                    return Err("all worker hosts must be unlocked-enabled-available, \
                                locked-disabled-online or locked-disabled-offline"
                        .to_string());
                }
            } else if !unlocked_enabled_available(host) {
                tracing::warn!(host = %host.name, "host not unlocked-enabled-available");
                return Err(format!(
                    "all {} hosts must be unlocked-enabled-available",
                    host.personality_string()
                ));
            }
        }

        let mut hosts = HostsToPatch::default();
        for patch_host in &findings.sw_patch_hosts {
            let Some(host) = input.inventory.host(&patch_host.name) else {
                tracing::error!(host = %patch_host.name, "host inventory mismatch");
                return Err("host inventory mismatch detected".to_string());
            };
            if patch_host.interim_state {
                tracing::warn!(host = %patch_host.name, "host is in pending patch current state");
                return Err("at least one host is in pending patch current state".to_string());
            }
            if patch_host.patch_current {
                continue;
            }

            let reboot = patch_host.requires_reboot;
            let personality = &patch_host.personality;
            if personality.contains(&HostPersonality::Controller) {
                hosts.controllers[reboot as usize].push(host.clone());
            } else if personality.contains(&HostPersonality::Storage) {
                hosts.storage[reboot as usize].push(host.clone());
            } else if personality.contains(&HostPersonality::Swift) {
                hosts.swift[reboot as usize].push(host.clone());
            }
            // Controllers of a CPE are workers too
            if personality.contains(&HostPersonality::Worker) && !host.is_offline() {
                hosts.workers[reboot as usize].push(host.clone());
            }
        }

        let mut stages = Vec::new();
        for reboot in [false, true] {
            let i = reboot as usize;
            if !hosts.controllers[i].is_empty() {
                controller_stages(input, &hosts.controllers[i], reboot, &mut stages)?;
            }
        }
        for reboot in [false, true] {
            let i = reboot as usize;
            if !hosts.storage[i].is_empty() {
                storage_stages(input, &hosts.storage[i], reboot, &mut stages)?;
            }
        }
        for reboot in [false, true] {
            let i = reboot as usize;
            if !hosts.swift[i].is_empty() {
                swift_stages(input, &hosts.swift[i], reboot, &mut stages)?;
            }
        }
        for reboot in [false, true] {
            let i = reboot as usize;
            if !hosts.workers[i].is_empty() {
                worker_stages(input, &hosts.workers[i], reboot, &mut stages)?;
            }
        }

        if stages.is_empty() {
            tracing::warn!("no software patches need to be applied");
            return Err("no software patches need to be applied".to_string());
        }
        Ok(stages)
    }
}

/// Hosts needing a patch, indexed by whether it requires a reboot
#[derive(Default)]
struct HostsToPatch {
    controllers: [Vec<Host>; 2],
    storage: [Vec<Host>; 2],
    swift: [Vec<Host>; 2],
    workers: [Vec<Host>; 2],
}

fn query_alarms(input: &BuildInput<'_>) -> QueryAlarmsStep {
    QueryAlarmsStep::new(true, input.ignore_alarms.to_vec())
}

/// One host patched on its own, rebooting through a lock/unlock
fn single_host_stage(
    input: &BuildInput<'_>,
    name: &str,
    host: &Host,
    swact: bool,
    reboot: bool,
) -> StrategyStage {
    let hosts = [host];
    let mut stage = StrategyStage::new(name);
    push(&mut stage, query_alarms(input));
    if reboot {
        if swact {
            push(&mut stage, SwactHostsStep::new(hosts));
        }
        push(&mut stage, LockHostsStep::new(hosts, true));
    }
    push(&mut stage, SwPatchHostsStep::new(hosts));
    if reboot {
        push(&mut stage, SystemStabilizeStep::new(MTCE_DELAY_SECS));
        push(&mut stage, UnlockHostsStep::new(hosts));
        push(&mut stage, SystemStabilizeStep::new(SystemStabilizeStep::DEFAULT_TIMEOUT_SECS));
    } else {
        push(&mut stage, SystemStabilizeStep::new(NO_REBOOT_DELAY_SECS));
    }
    stage
}

fn controller_stages(
    input: &BuildInput<'_>,
    controllers: &[Host],
    reboot: bool,
    stages: &mut Vec<StrategyStage>,
) -> Result<(), String> {
    let apply_type = input.params.controller_apply_type;

    if apply_type != ApplyType::Ignore {
        if let Some(host) = controllers
            .iter()
            .find(|h| !h.has_personality(HostPersonality::Controller))
        {
            tracing::error!(host = %host.name, "host inventory personality controller mismatch");
            return Err("host inventory personality controller mismatch detected".to_string());
        }
        if !input.settings.single_controller
            && input.inventory.total_by_personality(HostPersonality::Controller) < 2
        {
            tracing::warn!("not enough controllers to apply software patches");
            return Err("not enough controllers to apply software patches".to_string());
        }
    }

    match apply_type {
        ApplyType::Serial => {
            // The controller running orchestration goes last
            let (local, others): (Vec<&Host>, Vec<&Host>) = controllers
                .iter()
                .filter(|h| !h.has_personality(HostPersonality::Worker))
                .partition(|h| h.name == input.settings.local_host_name);
            for host in others.into_iter().chain(local) {
                stages.push(single_host_stage(input, SW_PATCH_CONTROLLERS, host, true, reboot));
            }
            Ok(())
        }
        ApplyType::Parallel => {
            tracing::warn!("parallel apply type cannot be used for controllers");
            Err("parallel apply type not allowed for controllers".to_string())
        }
        ApplyType::Ignore => Ok(()),
    }
}

fn storage_stages(
    input: &BuildInput<'_>,
    storage_hosts: &[Host],
    reboot: bool,
    stages: &mut Vec<StrategyStage>,
) -> Result<(), String> {
    let lists = storage_host_lists(input.params.storage_apply_type, storage_hosts, input.inventory)?;

    for hosts in &lists {
        let mut stage = StrategyStage::new(SW_PATCH_STORAGE_HOSTS);
        push(&mut stage, query_alarms(input));
        if reboot {
            push(&mut stage, LockHostsStep::new(hosts, true));
        }
        push(&mut stage, SwPatchHostsStep::new(hosts));
        if reboot {
            push(&mut stage, SystemStabilizeStep::new(MTCE_DELAY_SECS));
            push(&mut stage, UnlockHostsStep::new(hosts));
            // OSDs resync and storage alarms clear after the unlock
            push(
                &mut stage,
                WaitDataSyncStep::new(STORAGE_DATA_SYNC_SECS, input.ignore_alarms.to_vec()),
            );
        } else {
            push(&mut stage, SystemStabilizeStep::new(NO_REBOOT_DELAY_SECS));
        }
        stages.push(stage);
    }
    Ok(())
}

fn swift_stages(
    input: &BuildInput<'_>,
    swift_hosts: &[Host],
    reboot: bool,
    stages: &mut Vec<StrategyStage>,
) -> Result<(), String> {
    let apply_type = input.params.swift_apply_type;
    if apply_type == ApplyType::Ignore {
        return Ok(());
    }

    if let Some(host) = swift_hosts.iter().find(|h| !h.has_personality(HostPersonality::Swift)) {
        tracing::error!(host = %host.name, "host inventory personality swift mismatch");
        return Err("host inventory personality swift mismatch detected".to_string());
    }
    if input.inventory.total_by_personality(HostPersonality::Swift) < 2 {
        tracing::warn!("not enough swift hosts to apply software patches");
        return Err("not enough swift hosts to apply software patches".to_string());
    }

    for host in swift_hosts {
        stages.push(single_host_stage(input, SW_PATCH_SWIFT_HOSTS, host, false, reboot));
    }
    Ok(())
}

fn worker_stages(
    input: &BuildInput<'_>,
    worker_hosts: &[Host],
    reboot: bool,
    stages: &mut Vec<StrategyStage>,
) -> Result<(), String> {
    let params = input.params;
    let single_controller = input.settings.single_controller;

    if params.worker_apply_type != ApplyType::Ignore
        && single_controller
        && params.default_instance_action != InstanceAction::StopStart
        && worker_hosts
            .iter()
            .any(|h| h.has_personality(HostPersonality::Controller))
    {
        tracing::error!("cannot migrate instances in a single controller configuration");
        return Err("cannot migrate instances in a single controller configuration".to_string());
    }

    let lists = worker_host_lists(
        params.worker_apply_type,
        worker_hosts,
        input.inventory,
        params.max_parallel_worker_hosts as usize,
        reboot,
    )?;

    for hosts in &lists {
        // Stopped instances are left alone
        let instances: Vec<&Instance> = hosts
            .iter()
            .flat_map(|h| input.inventory.instances_on_host(&h.name))
            .filter(|i| !i.is_locked())
            .collect();
        let (to_reboot, to_lock): (Vec<&Host>, Vec<&Host>) = if reboot {
            hosts.iter().partition(|h| h.is_locked())
        } else {
            (Vec::new(), Vec::new())
        };
        let lone_controller =
            hosts.len() == 1 && hosts[0].has_personality(HostPersonality::Controller);

        let mut stage = StrategyStage::new(SW_PATCH_WORKER_HOSTS);
        push(&mut stage, query_alarms(input));

        if reboot {
            if lone_controller && !single_controller {
                push(&mut stage, SwactHostsStep::new(hosts));
            }
            if !instances.is_empty() {
                if params.default_instance_action == InstanceAction::Migrate {
                    // Keep instances from landing on hosts of the same list
                    if params.worker_apply_type == ApplyType::Parallel
                        && hosts[0].host_service_configured(HostService::Compute.as_str())
                    {
                        push(
                            &mut stage,
                            DisableHostServicesStep::new(hosts, HostService::Compute),
                        );
                    }
                    push(&mut stage, MigrateInstancesStep::new(&instances));
                } else {
                    push(&mut stage, StopInstancesStep::new(&instances));
                }
            }
            if !to_lock.is_empty() {
                // A lone single controller never goes disabled when locked
                let wait_until_disabled = !(to_lock.len() == 1
                    && to_lock[0].has_personality(HostPersonality::Controller)
                    && single_controller);
                push(
                    &mut stage,
                    LockHostsStep::new(to_lock.iter().copied(), wait_until_disabled),
                );
            }
        }

        push(&mut stage, SwPatchHostsStep::new(hosts));

        if reboot {
            push(&mut stage, SystemStabilizeStep::new(MTCE_DELAY_SECS));
            if !to_lock.is_empty() {
                push(&mut stage, UnlockHostsStep::new(to_lock.iter().copied()));
            }
            if !to_reboot.is_empty() {
                push(&mut stage, RebootHostsStep::new(to_reboot.iter().copied()));
            }
            if !instances.is_empty() && params.default_instance_action != InstanceAction::Migrate {
                push(&mut stage, StartInstancesStep::new(&instances));
            }
            push(&mut stage, SystemStabilizeStep::new(SystemStabilizeStep::DEFAULT_TIMEOUT_SECS));
        } else {
            push(&mut stage, SystemStabilizeStep::new(NO_REBOOT_DELAY_SECS));
        }
        stages.push(stage);
    }
    Ok(())
}

#[cfg(test)]
#[path = "sw_patch_tests.rs"]
mod tests;
