// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake NFVI plugin for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{NfviError, NfviPlugin};
use async_trait::async_trait;
use nfv_core::nfvi::{
    Alarm, Host, HostAggregate, HostGroup, HostService, HostSwPatch, Instance, InstanceGroup,
    SwPatch, Upgrade,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

/// Recorded plugin call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NfviCall {
    LockHost { host_name: String },
    UnlockHost { host_name: String },
    RebootHost { host_name: String },
    SwactHost { host_name: String },
    UpgradeHost { host_name: String },
    DisableHostServices { host_name: String, service: HostService },
    EnableHostServices { host_name: String, service: HostService },
    MigrateInstance { instance_uuid: String },
    StopInstance { instance_uuid: String },
    StartInstance { instance_uuid: String },
    UpdateSwPatchHosts { host_names: Vec<String> },
    UpgradeStart,
    UpgradeActivate,
    UpgradeComplete,
    Query { name: &'static str },
}

#[derive(Default)]
struct FakeState {
    hosts: Vec<Host>,
    instances: Vec<Instance>,
    alarms: Vec<Alarm>,
    sw_patches: Vec<SwPatch>,
    sw_patch_hosts: Vec<HostSwPatch>,
    upgrade: Option<Upgrade>,
    failing: HashSet<String>,
}

/// Fake NFVI plugin for testing
///
/// Answers queries from whatever was set and records every call. Ops
/// named with [`FakeNfvi::fail`] return an error instead.
#[derive(Clone, Default)]
pub struct FakeNfvi {
    state: Arc<Mutex<FakeState>>,
    calls: Arc<Mutex<Vec<NfviCall>>>,
}

impl FakeNfvi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<NfviCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Make every call of `op` (e.g. `lock-host`) fail
    pub fn fail(&self, op: &str) {
        self.state().failing.insert(op.to_string());
    }

    pub fn set_hosts(&self, hosts: Vec<Host>) {
        self.state().hosts = hosts;
    }

    pub fn set_instances(&self, instances: Vec<Instance>) {
        self.state().instances = instances;
    }

    pub fn set_alarms(&self, alarms: Vec<Alarm>) {
        self.state().alarms = alarms;
    }

    pub fn set_sw_patches(&self, sw_patches: Vec<SwPatch>) {
        self.state().sw_patches = sw_patches;
    }

    pub fn set_sw_patch_hosts(&self, sw_patch_hosts: Vec<HostSwPatch>) {
        self.state().sw_patch_hosts = sw_patch_hosts;
    }

    pub fn set_upgrade(&self, upgrade: Option<Upgrade>) {
        self.state().upgrade = upgrade;
    }

    fn state(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, op: &str, call: NfviCall) -> Result<(), NfviError> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
        if self.state().failing.contains(op) {
            return Err(NfviError::failed(op, "injected failure"));
        }
        Ok(())
    }

    fn query(&self, name: &'static str) -> Result<MutexGuard<'_, FakeState>, NfviError> {
        self.record(name, NfviCall::Query { name })?;
        Ok(self.state())
    }
}

#[async_trait]
impl NfviPlugin for FakeNfvi {
    async fn lock_host(&self, host_name: &str) -> Result<(), NfviError> {
        let host_name = host_name.to_string();
        self.record("lock-host", NfviCall::LockHost { host_name })
    }

    async fn unlock_host(&self, host_name: &str) -> Result<(), NfviError> {
        let host_name = host_name.to_string();
        self.record("unlock-host", NfviCall::UnlockHost { host_name })
    }

    async fn reboot_host(&self, host_name: &str) -> Result<(), NfviError> {
        let host_name = host_name.to_string();
        self.record("reboot-host", NfviCall::RebootHost { host_name })
    }

    async fn swact_host(&self, host_name: &str) -> Result<(), NfviError> {
        let host_name = host_name.to_string();
        self.record("swact-host", NfviCall::SwactHost { host_name })
    }

    async fn upgrade_host(&self, host_name: &str) -> Result<(), NfviError> {
        let host_name = host_name.to_string();
        self.record("upgrade-host", NfviCall::UpgradeHost { host_name })
    }

    async fn disable_host_services(&self, host_name: &str, service: HostService) -> Result<(), NfviError> {
        let host_name = host_name.to_string();
        self.record(
            "disable-host-services",
            NfviCall::DisableHostServices { host_name, service },
        )
    }

    async fn enable_host_services(&self, host_name: &str, service: HostService) -> Result<(), NfviError> {
        let host_name = host_name.to_string();
        self.record(
            "enable-host-services",
            NfviCall::EnableHostServices { host_name, service },
        )
    }

    async fn migrate_instance(&self, instance_uuid: &str) -> Result<(), NfviError> {
        let instance_uuid = instance_uuid.to_string();
        self.record("migrate-instance", NfviCall::MigrateInstance { instance_uuid })
    }

    async fn stop_instance(&self, instance_uuid: &str) -> Result<(), NfviError> {
        let instance_uuid = instance_uuid.to_string();
        self.record("stop-instance", NfviCall::StopInstance { instance_uuid })
    }

    async fn start_instance(&self, instance_uuid: &str) -> Result<(), NfviError> {
        let instance_uuid = instance_uuid.to_string();
        self.record("start-instance", NfviCall::StartInstance { instance_uuid })
    }

    async fn get_alarms(&self) -> Result<Vec<Alarm>, NfviError> {
        Ok(self.query("get-alarms")?.alarms.clone())
    }

    async fn get_sw_patches(&self) -> Result<Vec<SwPatch>, NfviError> {
        Ok(self.query("get-sw-patches")?.sw_patches.clone())
    }

    async fn get_sw_patch_hosts(&self) -> Result<Vec<HostSwPatch>, NfviError> {
        Ok(self.query("get-sw-patch-hosts")?.sw_patch_hosts.clone())
    }

    async fn update_sw_patch_hosts(&self, host_names: &[String]) -> Result<(), NfviError> {
        let host_names = host_names.to_vec();
        self.record("update-sw-patch-hosts", NfviCall::UpdateSwPatchHosts { host_names })
    }

    async fn get_upgrade(&self) -> Result<Option<Upgrade>, NfviError> {
        Ok(self.query("get-upgrade")?.upgrade.clone())
    }

    async fn upgrade_start(&self) -> Result<(), NfviError> {
        self.record("upgrade-start", NfviCall::UpgradeStart)
    }

    async fn upgrade_activate(&self) -> Result<(), NfviError> {
        self.record("upgrade-activate", NfviCall::UpgradeActivate)
    }

    async fn upgrade_complete(&self) -> Result<(), NfviError> {
        self.record("upgrade-complete", NfviCall::UpgradeComplete)
    }

    async fn get_hosts(&self) -> Result<Vec<Host>, NfviError> {
        Ok(self.query("get-hosts")?.hosts.clone())
    }

    async fn get_instances(&self) -> Result<Vec<Instance>, NfviError> {
        Ok(self.query("get-instances")?.instances.clone())
    }

    async fn get_instance_groups(&self) -> Result<Vec<InstanceGroup>, NfviError> {
        self.query("get-instance-groups")?;
        Ok(Vec::new())
    }

    async fn get_host_groups(&self) -> Result<Vec<HostGroup>, NfviError> {
        self.query("get-host-groups")?;
        Ok(Vec::new())
    }

    async fn get_host_aggregates(&self) -> Result<Vec<HostAggregate>, NfviError> {
        self.query("get-host-aggregates")?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
