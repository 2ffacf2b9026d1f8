// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Simulated infrastructure loaded from a TOML lab description
//!
//! Operations change the lab immediately, so a host lock is visible to
//! the next `get_hosts` call.

use super::{NfviError, NfviPlugin};
use async_trait::async_trait;
use nfv_core::nfvi::{
    AdminState, Alarm, AvailStatus, Host, HostAggregate, HostGroup, HostPersonality, HostService,
    HostSwPatch, Instance, InstanceGroup, OperState, ServiceState, SwPatch, Upgrade, UpgradeState,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// An operation the lab refuses, for exercising failure paths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabFailure {
    /// Plugin operation name, e.g. `lock-host`
    pub op: String,
    /// Host name or instance uuid; any target when absent
    #[serde(default)]
    pub target: Option<String>,
}

/// Everything the lab knows, as written in the lab file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabInventory {
    #[serde(default)]
    pub hosts: Vec<Host>,
    #[serde(default)]
    pub instances: Vec<Instance>,
    #[serde(default)]
    pub instance_groups: Vec<InstanceGroup>,
    #[serde(default)]
    pub host_groups: Vec<HostGroup>,
    #[serde(default)]
    pub host_aggregates: Vec<HostAggregate>,
    #[serde(default)]
    pub alarms: Vec<Alarm>,
    #[serde(default)]
    pub sw_patches: Vec<SwPatch>,
    #[serde(default)]
    pub sw_patch_hosts: Vec<HostSwPatch>,
    #[serde(default)]
    pub upgrade: Option<Upgrade>,
    /// Release offered to `upgrade-start`
    #[serde(default)]
    pub available_release: Option<String>,
    #[serde(default)]
    pub failures: Vec<LabFailure>,
}

impl LabInventory {
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    fn host_mut(&mut self, host_name: &str) -> Result<&mut Host, NfviError> {
        self.hosts
            .iter_mut()
            .find(|h| h.name == host_name)
            .ok_or_else(|| NfviError::HostNotFound(host_name.to_string()))
    }

    fn instance_mut(&mut self, instance_uuid: &str) -> Result<&mut Instance, NfviError> {
        self.instances
            .iter_mut()
            .find(|i| i.uuid == instance_uuid)
            .ok_or_else(|| NfviError::InstanceNotFound(instance_uuid.to_string()))
    }

    fn check(&self, op: &str, target: Option<&str>) -> Result<(), NfviError> {
        let refused = self.failures.iter().any(|f| {
            f.op == op && (f.target.is_none() || f.target.as_deref() == target)
        });
        if refused {
            return Err(NfviError::failed(op, "refused by lab"));
        }
        Ok(())
    }

    fn controllers_upgraded(&self, to_release: &str) -> bool {
        self.hosts
            .iter()
            .filter(|h| h.has_personality(HostPersonality::Controller))
            .all(|h| h.software_load == to_release)
    }
}

/// [`NfviPlugin`] backed by an in-memory lab
#[derive(Clone, Default)]
pub struct LabNfvi {
    state: Arc<Mutex<LabInventory>>,
}

impl LabNfvi {
    pub fn new(lab: LabInventory) -> Self {
        Self {
            state: Arc::new(Mutex::new(lab)),
        }
    }

    pub fn load(path: &Path) -> Result<Self, NfviError> {
        let lab_error = |reason: String| NfviError::Lab {
            path: path.display().to_string(),
            reason,
        };
        let content = std::fs::read_to_string(path).map_err(|e| lab_error(e.to_string()))?;
        let lab = LabInventory::parse(&content).map_err(|e| lab_error(e.to_string()))?;
        Ok(Self::new(lab))
    }

    /// Copy of the current lab state
    pub fn snapshot(&self) -> LabInventory {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, LabInventory> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_host<F>(&self, op: &str, host_name: &str, f: F) -> Result<(), NfviError>
    where
        F: FnOnce(&mut Host) -> Result<(), String>,
    {
        let mut lab = self.lock();
        lab.check(op, Some(host_name))?;
        let host = lab.host_mut(host_name)?;
        f(host).map_err(|reason| NfviError::failed(op, reason))
    }

    fn with_instance<F>(&self, op: &str, instance_uuid: &str, f: F) -> Result<(), NfviError>
    where
        F: FnOnce(&mut Instance),
    {
        let mut lab = self.lock();
        lab.check(op, Some(instance_uuid))?;
        f(lab.instance_mut(instance_uuid)?);
        Ok(())
    }

    fn set_service(
        &self,
        op: &str,
        host_name: &str,
        service: HostService,
        state: ServiceState,
    ) -> Result<(), NfviError> {
        self.with_host(op, host_name, |host| {
            host.services.insert(service.as_str().to_string(), state);
            Ok(())
        })
    }
}

#[async_trait]
impl NfviPlugin for LabNfvi {
    async fn lock_host(&self, host_name: &str) -> Result<(), NfviError> {
        self.with_host("lock-host", host_name, |host| {
            host.admin_state = AdminState::Locked;
            host.oper_state = OperState::Disabled;
            host.avail_status = AvailStatus::Online;
            Ok(())
        })
    }

    async fn unlock_host(&self, host_name: &str) -> Result<(), NfviError> {
        self.with_host("unlock-host", host_name, |host| {
            host.admin_state = AdminState::Unlocked;
            host.oper_state = OperState::Enabled;
            host.avail_status = AvailStatus::Available;
            Ok(())
        })
    }

    async fn reboot_host(&self, host_name: &str) -> Result<(), NfviError> {
        self.with_host("reboot-host", host_name, |host| {
            if !host.is_locked() {
                return Err("host must be locked".to_string());
            }
            host.avail_status = AvailStatus::Online;
            Ok(())
        })
    }

    async fn swact_host(&self, host_name: &str) -> Result<(), NfviError> {
        self.with_host("swact-host", host_name, |host| {
            if !host.has_personality(HostPersonality::Controller) {
                return Err("host is not a controller".to_string());
            }
            Ok(())
        })
    }

    async fn upgrade_host(&self, host_name: &str) -> Result<(), NfviError> {
        let mut lab = self.lock();
        lab.check("upgrade-host", Some(host_name))?;
        let Some(to_release) = lab.upgrade.as_ref().map(|u| u.to_release.clone()) else {
            return Err(NfviError::failed("upgrade-host", "no upgrade in progress"));
        };

        let host = lab.host_mut(host_name)?;
        if !host.is_locked() {
            return Err(NfviError::failed("upgrade-host", "host must be locked"));
        }
        host.software_load = to_release.clone();
        host.target_load = to_release.clone();
        let controller = host.has_personality(HostPersonality::Controller);

        let controllers_done = lab.controllers_upgraded(&to_release);
        if let Some(upgrade) = lab.upgrade.as_mut() {
            if controller && upgrade.state == UpgradeState::Started {
                upgrade.state = UpgradeState::UpgradingControllers;
            }
            if controllers_done && upgrade.state == UpgradeState::UpgradingControllers {
                upgrade.state = UpgradeState::UpgradingHosts;
            }
        }
        Ok(())
    }

    async fn disable_host_services(&self, host_name: &str, service: HostService) -> Result<(), NfviError> {
        self.set_service("disable-host-services", host_name, service, ServiceState::Disabled)
    }

    async fn enable_host_services(&self, host_name: &str, service: HostService) -> Result<(), NfviError> {
        self.set_service("enable-host-services", host_name, service, ServiceState::Enabled)
    }

    async fn migrate_instance(&self, instance_uuid: &str) -> Result<(), NfviError> {
        let mut lab = self.lock();
        lab.check("migrate-instance", Some(instance_uuid))?;
        let from = lab.instance_mut(instance_uuid)?.host_name.clone();
        let target = lab
            .hosts
            .iter()
            .find(|h| {
                h.name != from
                    && h.has_personality(HostPersonality::Worker)
                    && h.is_unlocked()
                    && h.is_enabled()
            })
            .map(|h| h.name.clone())
            .ok_or_else(|| NfviError::failed("migrate-instance", "no host available"))?;

        lab.instance_mut(instance_uuid)?.host_name = target;
        Ok(())
    }

    async fn stop_instance(&self, instance_uuid: &str) -> Result<(), NfviError> {
        self.with_instance("stop-instance", instance_uuid, |instance| {
            instance.admin_state = AdminState::Locked;
            instance.oper_state = OperState::Disabled;
        })
    }

    async fn start_instance(&self, instance_uuid: &str) -> Result<(), NfviError> {
        self.with_instance("start-instance", instance_uuid, |instance| {
            instance.admin_state = AdminState::Unlocked;
            instance.oper_state = OperState::Enabled;
        })
    }

    async fn get_alarms(&self) -> Result<Vec<Alarm>, NfviError> {
        Ok(self.lock().alarms.clone())
    }

    async fn get_sw_patches(&self) -> Result<Vec<SwPatch>, NfviError> {
        Ok(self.lock().sw_patches.clone())
    }

    async fn get_sw_patch_hosts(&self) -> Result<Vec<HostSwPatch>, NfviError> {
        Ok(self.lock().sw_patch_hosts.clone())
    }

    async fn update_sw_patch_hosts(&self, host_names: &[String]) -> Result<(), NfviError> {
        let mut lab = self.lock();
        for host_name in host_names {
            lab.check("update-sw-patch-hosts", Some(host_name))?;
            let locked = lab.host_mut(host_name)?.is_locked();
            let Some(patch_host) = lab.sw_patch_hosts.iter_mut().find(|p| &p.name == host_name)
            else {
                continue;
            };
            if patch_host.requires_reboot && !locked {
                return Err(NfviError::failed(
                    "update-sw-patch-hosts",
                    format!("{} must be locked", host_name),
                ));
            }
            patch_host.patch_current = true;
        }

        if lab.sw_patch_hosts.iter().all(|p| p.patch_current) {
            for patch in lab.sw_patches.iter_mut() {
                patch.patch_state = "Applied".to_string();
            }
        }
        Ok(())
    }

    async fn get_upgrade(&self) -> Result<Option<Upgrade>, NfviError> {
        Ok(self.lock().upgrade.clone())
    }

    async fn upgrade_start(&self) -> Result<(), NfviError> {
        let mut lab = self.lock();
        lab.check("upgrade-start", None)?;
        if lab.upgrade.is_some() {
            return Err(NfviError::failed("upgrade-start", "upgrade already in progress"));
        }
        let to_release = lab
            .available_release
            .clone()
            .ok_or_else(|| NfviError::failed("upgrade-start", "no release available"))?;
        let from_release = lab
            .hosts
            .iter()
            .find(|h| h.has_personality(HostPersonality::Controller))
            .map(|h| h.software_load.clone())
            .unwrap_or_default();
        lab.upgrade = Some(Upgrade {
            state: UpgradeState::Started,
            from_release,
            to_release,
        });
        Ok(())
    }

    async fn upgrade_activate(&self) -> Result<(), NfviError> {
        let mut lab = self.lock();
        lab.check("upgrade-activate", None)?;
        let to_release = match &lab.upgrade {
            Some(upgrade) if upgrade.state == UpgradeState::UpgradingHosts => upgrade.to_release.clone(),
            Some(upgrade) => {
                return Err(NfviError::failed(
                    "upgrade-activate",
                    format!("upgrade is {}", upgrade.state),
                ))
            }
            None => return Err(NfviError::failed("upgrade-activate", "no upgrade in progress")),
        };
        if let Some(host) = lab.hosts.iter().find(|h| h.software_load != to_release) {
            return Err(NfviError::failed(
                "upgrade-activate",
                format!("{} is not upgraded", host.name),
            ));
        }
        if let Some(upgrade) = lab.upgrade.as_mut() {
            upgrade.state = UpgradeState::ActivationComplete;
        }
        Ok(())
    }

    async fn upgrade_complete(&self) -> Result<(), NfviError> {
        let mut lab = self.lock();
        lab.check("upgrade-complete", None)?;
        match lab.upgrade.as_ref().map(|u| u.state) {
            Some(UpgradeState::ActivationComplete) => {
                lab.upgrade = None;
                Ok(())
            }
            Some(state) => Err(NfviError::failed("upgrade-complete", format!("upgrade is {}", state))),
            None => Err(NfviError::failed("upgrade-complete", "no upgrade in progress")),
        }
    }

    async fn get_hosts(&self) -> Result<Vec<Host>, NfviError> {
        Ok(self.lock().hosts.clone())
    }

    async fn get_instances(&self) -> Result<Vec<Instance>, NfviError> {
        Ok(self.lock().instances.clone())
    }

    async fn get_instance_groups(&self) -> Result<Vec<InstanceGroup>, NfviError> {
        Ok(self.lock().instance_groups.clone())
    }

    async fn get_host_groups(&self) -> Result<Vec<HostGroup>, NfviError> {
        Ok(self.lock().host_groups.clone())
    }

    async fn get_host_aggregates(&self) -> Result<Vec<HostAggregate>, NfviError> {
        Ok(self.lock().host_aggregates.clone())
    }
}

#[cfg(test)]
#[path = "lab_tests.rs"]
mod tests;
