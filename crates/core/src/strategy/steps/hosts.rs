// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host lifecycle steps: lock, unlock, reboot, swact, services, patching

use super::{Entities, WaitWindow};
use crate::event::StrategyEvent;
use crate::id::RequestId;
use crate::inventory::Inventory;
use crate::nfvi::{Host, HostService, NfviOp, NfviResponse, ServiceState};
use crate::strategy::context::Context;
use crate::strategy::result::TaskResult;
use crate::strategy::task::{EventOutcome, TaskWork};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Count the named hosts matching `pred`; `None` if any host is gone
fn count_hosts(inventory: &Inventory, names: &[String], pred: impl Fn(&Host) -> bool) -> Option<usize> {
    let mut total = 0;
    for name in names {
        let host = inventory.host(name)?;
        if pred(host) {
            total += 1;
        }
    }
    Some(total)
}

fn host_gone() -> EventOutcome {
    EventOutcome::Complete(TaskResult::Failed, "host no longer exists".to_string())
}

fn wait() -> (TaskResult, String) {
    (TaskResult::Wait, String::new())
}

fn success() -> (TaskResult, String) {
    (TaskResult::Success, String::new())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnlockHostsStep {
    #[serde(flatten)]
    entities: Entities,
}

impl UnlockHostsStep {
    pub const NAME: &'static str = "unlock-hosts";

    pub fn new<'a>(hosts: impl IntoIterator<Item = &'a Host>) -> Self {
        Self {
            entities: Entities::hosts(hosts),
        }
    }

    pub(crate) fn from_entities(entities: Entities) -> Self {
        Self { entities }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    fn total_unlocked(&self, inventory: &Inventory) -> Option<usize> {
        count_hosts(inventory, self.entities.names(), |h| {
            h.is_unlocked() && h.is_enabled()
        })
    }
}

impl TaskWork for UnlockHostsStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        1800
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        let names = self.entities.names();
        tracing::info!(step = Self::NAME, hosts = ?names, "step apply");
        if self.total_unlocked(ctx.inventory) == Some(names.len()) {
            return success();
        }
        ctx.request(NfviOp::UnlockHosts {
            host_names: names.to_vec(),
        });
        wait()
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::HostStateChanged { .. } | StrategyEvent::HostAudit => {
                match self.total_unlocked(ctx.inventory) {
                    None => host_gone(),
                    Some(total) if total == self.entities.names().len() => {
                        EventOutcome::Complete(TaskResult::Success, String::new())
                    }
                    Some(_) => EventOutcome::Ignored,
                }
            }
            StrategyEvent::HostUnlockFailed { host_name } if self.entities.contains_name(host_name) => {
                EventOutcome::Complete(TaskResult::Failed, "host unlock failed".to_string())
            }
            _ => EventOutcome::Ignored,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LockHostsStep {
    #[serde(flatten)]
    entities: Entities,
    wait_until_disabled: bool,
    #[serde(skip)]
    window: WaitWindow,
}

impl LockHostsStep {
    pub const NAME: &'static str = "lock-hosts";

    pub fn new<'a>(hosts: impl IntoIterator<Item = &'a Host>, wait_until_disabled: bool) -> Self {
        Self {
            entities: Entities::hosts(hosts),
            wait_until_disabled,
            window: WaitWindow::default(),
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    pub fn wait_until_disabled(&self) -> bool {
        self.wait_until_disabled
    }

    /// Step undoing this lock
    pub fn abort_step(&self) -> UnlockHostsStep {
        UnlockHostsStep::from_entities(self.entities.clone())
    }

    fn total_locked(&self, inventory: &Inventory) -> Option<usize> {
        count_hosts(inventory, self.entities.names(), |h| {
            h.is_locked() && (!self.wait_until_disabled || h.is_disabled())
        })
    }

    fn instances_not_stopped(&self, inventory: &Inventory) -> Vec<String> {
        self.entities
            .names()
            .iter()
            .flat_map(|host_name| inventory.instances_on_host(host_name))
            .filter(|i| !(i.is_locked() && i.is_disabled()))
            .map(|i| i.name.clone())
            .collect()
    }
}

impl TaskWork for LockHostsStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        900
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        let names = self.entities.names();
        tracing::info!(step = Self::NAME, hosts = ?names, "step apply");
        if self.total_locked(ctx.inventory) == Some(names.len()) {
            return success();
        }

        // Instances must already be migrated or stopped
        let instances = self.instances_not_stopped(ctx.inventory);
        if !instances.is_empty() {
            let reason = format!(
                "Lock of host(s) {} failed because instance(s) {} were not migrated or stopped.",
                names.join(","),
                instances.join(",")
            );
            return (TaskResult::Failed, reason);
        }

        ctx.request(NfviOp::LockHosts {
            host_names: names.to_vec(),
        });
        wait()
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::HostStateChanged { .. } | StrategyEvent::HostAudit => {
                let Some(total) = self.total_locked(ctx.inventory) else {
                    return host_gone();
                };
                if !self.wait_until_disabled && self.window.elapsed_secs(ctx.now) <= 15.0 {
                    return EventOutcome::Handled;
                }
                if total == self.entities.names().len() {
                    return EventOutcome::Complete(TaskResult::Success, String::new());
                }
                EventOutcome::Ignored
            }
            StrategyEvent::HostLockFailed { host_name } if self.entities.contains_name(host_name) => {
                EventOutcome::Complete(TaskResult::Failed, "host lock failed".to_string())
            }
            _ => EventOutcome::Ignored,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebootHostsStep {
    #[serde(flatten)]
    entities: Entities,
    #[serde(skip)]
    window: WaitWindow,
}

impl RebootHostsStep {
    pub const NAME: &'static str = "reboot-hosts";

    pub fn new<'a>(hosts: impl IntoIterator<Item = &'a Host>) -> Self {
        Self {
            entities: Entities::hosts(hosts),
            window: WaitWindow::default(),
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }
}

impl TaskWork for RebootHostsStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        900
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        tracing::info!(step = Self::NAME, hosts = ?self.entities.names(), "step apply");
        ctx.request(NfviOp::RebootHosts {
            host_names: self.entities.names().to_vec(),
        });
        wait()
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::HostRebootFailed { host_name } if self.entities.contains_name(host_name) => {
                EventOutcome::Complete(TaskResult::Failed, "host reboot failed".to_string())
            }
            // Locked hosts stay locked after the reboot, so a fixed
            // settle time is all that is waited for
            StrategyEvent::HostAudit => {
                if self.window.elapsed_secs(ctx.now) >= 60.0 {
                    EventOutcome::Complete(TaskResult::Success, String::new())
                } else {
                    EventOutcome::Handled
                }
            }
            _ => EventOutcome::Ignored,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwactHostsStep {
    #[serde(flatten)]
    entities: Entities,
    #[serde(skip)]
    window: WaitWindow,
}

impl SwactHostsStep {
    pub const NAME: &'static str = "swact-hosts";

    pub fn new<'a>(hosts: impl IntoIterator<Item = &'a Host>) -> Self {
        Self {
            entities: Entities::hosts(hosts),
            window: WaitWindow::default(),
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }
}

impl TaskWork for SwactHostsStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        900
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        tracing::info!(step = Self::NAME, hosts = ?self.entities.names(), "step apply");
        ctx.request(NfviOp::SwactHosts {
            host_names: self.entities.names().to_vec(),
        });
        wait()
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::HostSwactFailed { host_name } if self.entities.contains_name(host_name) => {
                EventOutcome::Complete(TaskResult::Failed, "host swact failed".to_string())
            }
            StrategyEvent::HostAudit => {
                if self.window.elapsed_secs(ctx.now) >= 120.0 {
                    EventOutcome::Complete(TaskResult::Success, String::new())
                } else {
                    EventOutcome::Handled
                }
            }
            _ => EventOutcome::Ignored,
        }
    }
}

/// Shared body of the disable and enable host service steps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct HostServices {
    #[serde(flatten)]
    entities: Entities,
    entity_service: HostService,
}

impl HostServices {
    fn total_in_state(&self, inventory: &Inventory, state: ServiceState) -> Option<usize> {
        let service = self.entity_service.as_str();
        count_hosts(inventory, self.entities.names(), |h| {
            h.host_service_state(service) == Some(state)
        })
    }

    fn on_state_change(&self, inventory: &Inventory, state: ServiceState) -> EventOutcome {
        match self.total_in_state(inventory, state) {
            None => host_gone(),
            Some(total) if total == self.entities.names().len() => {
                EventOutcome::Complete(TaskResult::Success, String::new())
            }
            Some(_) => EventOutcome::Ignored,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisableHostServicesStep {
    #[serde(flatten)]
    inner: HostServices,
}

impl DisableHostServicesStep {
    pub const NAME: &'static str = "disable-host-services";

    pub fn new<'a>(hosts: impl IntoIterator<Item = &'a Host>, service: HostService) -> Self {
        Self {
            inner: HostServices {
                entities: Entities::hosts(hosts),
                entity_service: service,
            },
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.inner.entities
    }

    pub fn service(&self) -> HostService {
        self.inner.entity_service
    }

    pub fn abort_step(&self) -> EnableHostServicesStep {
        EnableHostServicesStep {
            inner: self.inner.clone(),
        }
    }
}

impl TaskWork for DisableHostServicesStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        180
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        let names = self.inner.entities.names();
        tracing::info!(step = Self::NAME, hosts = ?names, service = %self.inner.entity_service, "step apply");
        ctx.request(NfviOp::DisableHostServices {
            host_names: names.to_vec(),
            service: self.inner.entity_service,
        });
        wait()
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::HostStateChanged { .. } | StrategyEvent::HostAudit => {
                self.inner.on_state_change(ctx.inventory, ServiceState::Disabled)
            }
            StrategyEvent::DisableHostServicesFailed { host_name }
                if self.inner.entities.contains_name(host_name) =>
            {
                EventOutcome::Complete(TaskResult::Failed, "disable host services failed".to_string())
            }
            _ => EventOutcome::Ignored,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnableHostServicesStep {
    #[serde(flatten)]
    inner: HostServices,
}

impl EnableHostServicesStep {
    pub const NAME: &'static str = "enable-host-services";

    pub fn new<'a>(hosts: impl IntoIterator<Item = &'a Host>, service: HostService) -> Self {
        Self {
            inner: HostServices {
                entities: Entities::hosts(hosts),
                entity_service: service,
            },
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.inner.entities
    }

    pub fn service(&self) -> HostService {
        self.inner.entity_service
    }
}

impl TaskWork for EnableHostServicesStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        180
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        let names = self.inner.entities.names();
        tracing::info!(step = Self::NAME, hosts = ?names, service = %self.inner.entity_service, "step apply");
        ctx.request(NfviOp::EnableHostServices {
            host_names: names.to_vec(),
            service: self.inner.entity_service,
        });
        wait()
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::HostStateChanged { .. } | StrategyEvent::HostAudit => {
                self.inner.on_state_change(ctx.inventory, ServiceState::Enabled)
            }
            StrategyEvent::EnableHostServicesFailed { host_name }
                if self.inner.entities.contains_name(host_name) =>
            {
                EventOutcome::Complete(TaskResult::Failed, "enable host services failed".to_string())
            }
            _ => EventOutcome::Ignored,
        }
    }
}

/// Per-host patch progress
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostCompletion {
    pub completed: bool,
    pub success: bool,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SwPatchHostsStep {
    #[serde(flatten)]
    entities: Entities,
    #[serde(default)]
    hosts_completed: BTreeMap<String, HostCompletion>,
    #[serde(skip)]
    update_request: Option<RequestId>,
    #[serde(skip)]
    query_request: Option<RequestId>,
}

impl SwPatchHostsStep {
    pub const NAME: &'static str = "sw-patch-hosts";

    pub fn new<'a>(hosts: impl IntoIterator<Item = &'a Host>) -> Self {
        let entities = Entities::hosts(hosts);
        let hosts_completed = entities
            .names()
            .iter()
            .map(|name| (name.clone(), HostCompletion::default()))
            .collect();
        Self {
            entities,
            hosts_completed,
            update_request: None,
            query_request: None,
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    pub fn host_completion(&self, host_name: &str) -> Option<&HostCompletion> {
        self.hosts_completed.get(host_name)
    }

    /// Final outcome once every host has reported
    fn check_all_completed(&self) -> EventOutcome {
        let mut failed_reason = None;
        for name in self.entities.names() {
            let Some(completion) = self.hosts_completed.get(name) else {
                continue;
            };
            if !completion.completed {
                return EventOutcome::Handled;
            }
            if !completion.success {
                failed_reason = Some(completion.reason.clone());
            }
        }
        match failed_reason {
            Some(reason) => EventOutcome::Complete(TaskResult::Failed, reason),
            None => EventOutcome::Complete(TaskResult::Success, String::new()),
        }
    }
}

impl TaskWork for SwPatchHostsStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        1800
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        tracing::info!(step = Self::NAME, hosts = ?self.entities.names(), "step apply");
        self.update_request = Some(ctx.request(NfviOp::UpdateSwPatchHosts {
            host_names: self.entities.names().to_vec(),
        }));
        wait()
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::NfviResponse { request_id, response }
                if self.update_request == Some(*request_id) =>
            {
                self.update_request = None;
                if response.completed() {
                    EventOutcome::Handled
                } else {
                    EventOutcome::Complete(TaskResult::Failed, String::new())
                }
            }
            StrategyEvent::NfviResponse { request_id, response }
                if self.query_request == Some(*request_id) =>
            {
                self.query_request = None;
                let NfviResponse::SwPatchHosts(patch_hosts) = response else {
                    tracing::debug!(step = Self::NAME, "patch host query failed");
                    return EventOutcome::Handled;
                };
                for patch_host in patch_hosts {
                    let Some(completion) = self.hosts_completed.get_mut(&patch_host.name) else {
                        continue;
                    };
                    if patch_host.patch_current {
                        *completion = HostCompletion {
                            completed: true,
                            success: true,
                            reason: String::new(),
                        };
                    } else if patch_host.patch_failed {
                        *completion = HostCompletion {
                            completed: true,
                            success: false,
                            reason: format!("software update failed to apply on host {}", patch_host.name),
                        };
                    }
                }
                self.check_all_completed()
            }
            StrategyEvent::HostAudit => {
                if self.query_request.is_none() {
                    self.query_request = Some(ctx.request(NfviOp::GetSwPatchHosts));
                }
                EventOutcome::Handled
            }
            _ => EventOutcome::Ignored,
        }
    }
}

#[cfg(test)]
#[path = "hosts_tests.rs"]
mod tests;
