// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executes the director's effects against an NFVI plugin
//!
//! Each NFVI request is answered in turn. Host and instance operations
//! are followed by an inventory refresh so the strategy sees the new
//! state as a state-change event.

use std::collections::BTreeMap;

use nfv_adapters::{NfviError, NfviPlugin};
use nfv_core::nfvi::{HostService, NfviOp, NfviResponse};
use nfv_core::sw_update::SwUpdateAlarm;
use nfv_core::{Clock, Director, Effect, IdGen, RequestId, SwUpdateStore};
use tracing::{debug, info, warn};

/// Per-host operations, each with its own failure event
#[derive(Debug, Clone, Copy)]
enum HostOp {
    Lock,
    Unlock,
    Reboot,
    Swact,
    Upgrade,
    DisableServices(HostService),
    EnableServices(HostService),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum InstanceOp {
    Migrate,
    Stop,
    Start,
}

pub struct Runtime<P, S, C, G>
where
    P: NfviPlugin,
    S: SwUpdateStore,
    C: Clock,
    G: IdGen,
{
    director: Director<S, C, G>,
    plugin: P,
    alarms: BTreeMap<String, SwUpdateAlarm>,
}

impl<P, S, C, G> Runtime<P, S, C, G>
where
    P: NfviPlugin,
    S: SwUpdateStore,
    C: Clock,
    G: IdGen,
{
    pub fn new(director: Director<S, C, G>, plugin: P) -> Self {
        Self {
            director,
            plugin,
            alarms: BTreeMap::new(),
        }
    }

    pub fn director(&self) -> &Director<S, C, G> {
        &self.director
    }

    pub fn director_mut(&mut self) -> &mut Director<S, C, G> {
        &mut self.director
    }

    pub fn plugin(&self) -> &P {
        &self.plugin
    }

    /// Alarm types currently raised
    pub fn active_alarms(&self) -> Vec<String> {
        self.alarms.keys().cloned().collect()
    }

    /// Take the initial inventory without raising any events
    pub async fn load_inventory(&mut self) -> Result<(), NfviError> {
        let hosts = self.plugin.get_hosts().await?;
        let instances = self.plugin.get_instances().await?;
        info!(hosts = hosts.len(), instances = instances.len(), "inventory loaded");
        self.director.replace_inventory(hosts, instances);
        self.load_groups().await
    }

    /// Periodic audit: every host and instance is reported to the strategy
    pub async fn audit_inventory(&mut self) {
        if let Err(e) = self.sync_inventory(true).await {
            warn!(error = %e, "inventory audit failed");
        }
        if let Err(e) = self.load_groups().await {
            warn!(error = %e, "group audit failed");
        }
        self.run_effects().await;
    }

    /// Fire due timers and carry out whatever they asked for
    pub async fn tick(&mut self) {
        self.director.tick();
        self.run_effects().await;
    }

    /// Execute queued effects until the director stops producing them
    pub async fn run_effects(&mut self) {
        loop {
            let effects = self.director.take_effects();
            if effects.is_empty() {
                break;
            }
            for effect in effects {
                self.execute(effect).await;
            }
        }
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Nfvi { request_id, op } => self.nfvi(request_id, op).await,
            Effect::RaiseAlarm(alarm) => {
                warn!(
                    alarm = %alarm.alarm_type(),
                    entity = %alarm.entity(),
                    "{}",
                    alarm.reason_text()
                );
                self.alarms.insert(alarm.alarm_type(), alarm);
            }
            Effect::ClearAlarm(alarm) => {
                info!(alarm = %alarm.alarm_type(), entity = %alarm.entity(), "alarm cleared");
                self.alarms.remove(&alarm.alarm_type());
            }
            Effect::LogEvent { event, reason } => {
                info!(event = %event.event_id(), %reason, "customer log");
            }
        }
    }

    async fn nfvi(&mut self, request_id: RequestId, op: NfviOp) {
        debug!(%request_id, op = op.name(), "nfvi request");
        let (host_names, host_op) = match op {
            NfviOp::LockHosts { host_names } => (host_names, HostOp::Lock),
            NfviOp::UnlockHosts { host_names } => (host_names, HostOp::Unlock),
            NfviOp::RebootHosts { host_names } => (host_names, HostOp::Reboot),
            NfviOp::SwactHosts { host_names } => (host_names, HostOp::Swact),
            NfviOp::UpgradeHosts { host_names } => (host_names, HostOp::Upgrade),
            NfviOp::DisableHostServices { host_names, service } => {
                (host_names, HostOp::DisableServices(service))
            }
            NfviOp::EnableHostServices { host_names, service } => {
                (host_names, HostOp::EnableServices(service))
            }
            NfviOp::MigrateInstances { instance_uuids } => {
                return self.instance_op(request_id, &instance_uuids, InstanceOp::Migrate).await;
            }
            NfviOp::StopInstances { instance_uuids } => {
                return self.instance_op(request_id, &instance_uuids, InstanceOp::Stop).await;
            }
            NfviOp::StartInstances { instance_uuids } => {
                return self.instance_op(request_id, &instance_uuids, InstanceOp::Start).await;
            }
            query => {
                let response = self.query(query).await.unwrap_or_else(|e| {
                    warn!(%request_id, error = %e, "nfvi request failed");
                    NfviResponse::Failed(e.to_string())
                });
                self.director.nfvi_response(request_id, response);
                return;
            }
        };
        self.host_op(request_id, &host_names, host_op).await;
    }

    async fn query(&self, op: NfviOp) -> Result<NfviResponse, NfviError> {
        let plugin = &self.plugin;
        match op {
            NfviOp::GetAlarms => plugin.get_alarms().await.map(NfviResponse::Alarms),
            NfviOp::GetSwPatches => plugin.get_sw_patches().await.map(NfviResponse::SwPatches),
            NfviOp::GetSwPatchHosts => plugin.get_sw_patch_hosts().await.map(NfviResponse::SwPatchHosts),
            NfviOp::UpdateSwPatchHosts { host_names } => {
                plugin.update_sw_patch_hosts(&host_names).await?;
                Ok(NfviResponse::Accepted)
            }
            NfviOp::GetUpgrade => plugin.get_upgrade().await.map(NfviResponse::Upgrade),
            NfviOp::UpgradeStart => {
                plugin.upgrade_start().await?;
                Ok(NfviResponse::Accepted)
            }
            NfviOp::UpgradeActivate => {
                plugin.upgrade_activate().await?;
                Ok(NfviResponse::Accepted)
            }
            NfviOp::UpgradeComplete => {
                plugin.upgrade_complete().await?;
                Ok(NfviResponse::Accepted)
            }
            other => Err(NfviError::failed(other.name(), "not a query")),
        }
    }

    async fn host_op(&mut self, request_id: RequestId, host_names: &[String], op: HostOp) {
        let mut failed = Vec::new();
        for host_name in host_names {
            let result = match op {
                HostOp::Lock => self.plugin.lock_host(host_name).await,
                HostOp::Unlock => self.plugin.unlock_host(host_name).await,
                HostOp::Reboot => self.plugin.reboot_host(host_name).await,
                HostOp::Swact => self.plugin.swact_host(host_name).await,
                HostOp::Upgrade => self.plugin.upgrade_host(host_name).await,
                HostOp::DisableServices(service) => {
                    self.plugin.disable_host_services(host_name, service).await
                }
                HostOp::EnableServices(service) => {
                    self.plugin.enable_host_services(host_name, service).await
                }
            };
            if let Err(e) = result {
                warn!(host = %host_name, ?op, error = %e, "host operation failed");
                failed.push((host_name.clone(), e.to_string()));
            }
        }

        let response = match failed.first() {
            None => NfviResponse::Accepted,
            Some((_, reason)) => NfviResponse::Failed(reason.clone()),
        };
        self.director.nfvi_response(request_id, response);

        for (host_name, _) in failed {
            let Some(host) = self.director.inventory().host(&host_name).cloned() else {
                warn!(host = %host_name, "failed host not in inventory");
                continue;
            };
            match op {
                HostOp::Lock => self.director.host_lock_failed(host),
                HostOp::Unlock => self.director.host_unlock_failed(host),
                HostOp::Reboot => self.director.host_reboot_failed(host),
                HostOp::Swact => self.director.host_swact_failed(host),
                HostOp::Upgrade => self.director.host_upgrade_failed(host),
                HostOp::DisableServices(_) => self.director.disable_host_services_failed(host),
                HostOp::EnableServices(_) => self.director.enable_host_services_failed(host),
            }
        }

        self.refresh().await;
    }

    async fn instance_op(&mut self, request_id: RequestId, instance_uuids: &[String], op: InstanceOp) {
        let mut failed = Vec::new();
        for uuid in instance_uuids {
            let result = match op {
                InstanceOp::Migrate => self.plugin.migrate_instance(uuid).await,
                InstanceOp::Stop => self.plugin.stop_instance(uuid).await,
                InstanceOp::Start => self.plugin.start_instance(uuid).await,
            };
            if let Err(e) = result {
                warn!(instance = %uuid, ?op, error = %e, "instance operation failed");
                failed.push(e.to_string());
            }
        }

        let response = match failed.first() {
            None => NfviResponse::Accepted,
            Some(reason) => NfviResponse::Failed(reason.clone()),
        };
        self.director.nfvi_response(request_id, response);

        if op == InstanceOp::Migrate {
            for reason in failed {
                self.director.migrate_instances_failed(reason);
            }
        }

        self.refresh().await;
    }

    /// Report hosts and instances that changed since the last look
    async fn refresh(&mut self) {
        if let Err(e) = self.sync_inventory(false).await {
            warn!(error = %e, "inventory refresh failed");
        }
    }

    /// Changed records become state-change events; with `audit`, the
    /// unchanged ones are reported as audits.
    async fn sync_inventory(&mut self, audit: bool) -> Result<(), NfviError> {
        let hosts = self.plugin.get_hosts().await?;
        let instances = self.plugin.get_instances().await?;

        for host in &hosts {
            let changed = self.director.inventory().host(&host.name) != Some(host);
            if changed {
                debug!(host = %host.name, "host state changed");
                self.director.host_state_change(host.clone());
            } else if audit {
                self.director.host_audit(host.clone());
            }
        }
        for instance in &instances {
            let changed = self.director.inventory().instance(&instance.uuid) != Some(instance);
            if changed {
                debug!(instance = %instance.name, "instance state changed");
                self.director.instance_state_change(instance.clone());
            } else if audit {
                self.director.instance_audit(instance.clone());
            }
        }

        // Drops anything the infrastructure no longer reports
        self.director.replace_inventory(hosts, instances);
        Ok(())
    }

    async fn load_groups(&mut self) -> Result<(), NfviError> {
        let instance_groups = self.plugin.get_instance_groups().await?;
        let host_groups = self.plugin.get_host_groups().await?;
        let host_aggregates = self.plugin.get_host_aggregates().await?;
        self.director
            .replace_groups(instance_groups, host_groups, host_aggregates);
        Ok(())
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
