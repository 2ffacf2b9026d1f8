// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Platform upgrade steps

use super::{Entities, WaitWindow};
use crate::event::StrategyEvent;
use crate::id::RequestId;
use crate::nfvi::{Host, NfviOp, NfviResponse, Upgrade, UpgradeState};
use crate::strategy::context::Context;
use crate::strategy::result::TaskResult;
use crate::strategy::task::{EventOutcome, TaskWork};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpgradeHostsStep {
    #[serde(flatten)]
    entities: Entities,
    #[serde(skip)]
    window: WaitWindow,
}

impl UpgradeHostsStep {
    pub const NAME: &'static str = "upgrade-hosts";

    pub fn new<'a>(hosts: impl IntoIterator<Item = &'a Host>) -> Self {
        Self {
            entities: Entities::hosts(hosts),
            window: WaitWindow::default(),
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    /// Hosts online and running the target release; `None` if one is gone
    fn total_upgraded(&self, ctx: &Context<'_>) -> Option<usize> {
        let to_release = ctx.findings.upgrade.as_ref().map(|u| u.to_release.as_str());
        let mut total = 0;
        for name in self.entities.names() {
            let host = ctx.inventory.host(name)?;
            if host.is_online()
                && Some(host.target_load.as_str()) == to_release
                && Some(host.software_load.as_str()) == to_release
            {
                total += 1;
            }
        }
        Some(total)
    }
}

impl TaskWork for UpgradeHostsStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        3600
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        tracing::info!(step = Self::NAME, hosts = ?self.entities.names(), "step apply");
        ctx.request(NfviOp::UpgradeHosts {
            host_names: self.entities.names().to_vec(),
        });
        (TaskResult::Wait, String::new())
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::HostUpgradeFailed { host_name } if self.entities.contains_name(host_name) => {
                EventOutcome::Complete(TaskResult::Failed, "host upgrade failed".to_string())
            }
            // Give the host two minutes to go offline before checking
            StrategyEvent::HostAudit if self.window.elapsed_secs(ctx.now) >= 120.0 => {
                match self.total_upgraded(ctx) {
                    None => EventOutcome::Complete(
                        TaskResult::Failed,
                        "host no longer exists".to_string(),
                    ),
                    Some(total) if total == self.entities.names().len() => {
                        EventOutcome::Complete(TaskResult::Success, String::new())
                    }
                    Some(_) => EventOutcome::Ignored,
                }
            }
            _ => EventOutcome::Ignored,
        }
    }
}

/// Request an upgrade transition, then poll until the record reaches it
#[derive(Debug, Clone, Default)]
struct UpgradeTransition {
    window: WaitWindow,
    request: Option<RequestId>,
    query: Option<RequestId>,
}

impl UpgradeTransition {
    fn run(&mut self, name: &str, op: NfviOp, ctx: &mut Context<'_>) -> (TaskResult, String) {
        tracing::info!(step = name, "step apply");
        self.request = Some(ctx.request(op));
        (TaskResult::Wait, String::new())
    }

    fn handle_event(
        &mut self,
        event: &StrategyEvent,
        ctx: &mut Context<'_>,
        reached: impl Fn(Option<&Upgrade>) -> bool,
    ) -> EventOutcome {
        match event {
            StrategyEvent::NfviResponse { request_id, response } if self.request == Some(*request_id) => {
                self.request = None;
                match response {
                    NfviResponse::Upgrade(upgrade) => {
                        ctx.findings.upgrade = upgrade.clone();
                        EventOutcome::Handled
                    }
                    NfviResponse::Failed(_) => EventOutcome::Complete(TaskResult::Failed, String::new()),
                    _ => EventOutcome::Handled,
                }
            }
            StrategyEvent::NfviResponse { request_id, response } if self.query == Some(*request_id) => {
                self.query = None;
                let NfviResponse::Upgrade(upgrade) = response else {
                    return EventOutcome::Complete(TaskResult::Failed, String::new());
                };
                ctx.findings.upgrade = upgrade.clone();
                if reached(upgrade.as_ref()) {
                    EventOutcome::Complete(TaskResult::Success, String::new())
                } else {
                    EventOutcome::Handled
                }
            }
            StrategyEvent::HostAudit => {
                if self.window.elapsed_secs(ctx.now) >= 60.0 && self.query.is_none() {
                    self.query = Some(ctx.request(NfviOp::GetUpgrade));
                }
                EventOutcome::Handled
            }
            _ => EventOutcome::Ignored,
        }
    }
}

fn in_state(upgrade: Option<&Upgrade>, state: UpgradeState) -> bool {
    upgrade.is_some_and(|u| u.state == state)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartUpgradeStep {
    #[serde(flatten)]
    entities: Entities,
    #[serde(skip)]
    transition: UpgradeTransition,
}

impl StartUpgradeStep {
    pub const NAME: &'static str = "start-upgrade";

    pub fn new() -> Self {
        Self {
            entities: Entities::none(),
            transition: UpgradeTransition::default(),
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }
}

impl Default for StartUpgradeStep {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskWork for StartUpgradeStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        600
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        self.transition.run(Self::NAME, NfviOp::UpgradeStart, ctx)
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        self.transition
            .handle_event(event, ctx, |u| in_state(u, UpgradeState::Started))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivateUpgradeStep {
    #[serde(flatten)]
    entities: Entities,
    #[serde(skip)]
    transition: UpgradeTransition,
}

impl ActivateUpgradeStep {
    pub const NAME: &'static str = "activate-upgrade";

    pub fn new() -> Self {
        Self {
            entities: Entities::none(),
            transition: UpgradeTransition::default(),
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }
}

impl Default for ActivateUpgradeStep {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskWork for ActivateUpgradeStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        900
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        self.transition.run(Self::NAME, NfviOp::UpgradeActivate, ctx)
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        self.transition
            .handle_event(event, ctx, |u| in_state(u, UpgradeState::ActivationComplete))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteUpgradeStep {
    #[serde(flatten)]
    entities: Entities,
    #[serde(skip)]
    transition: UpgradeTransition,
}

impl CompleteUpgradeStep {
    pub const NAME: &'static str = "complete-upgrade";

    pub fn new() -> Self {
        Self {
            entities: Entities::none(),
            transition: UpgradeTransition::default(),
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }
}

impl Default for CompleteUpgradeStep {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskWork for CompleteUpgradeStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        300
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        self.transition.run(Self::NAME, NfviOp::UpgradeComplete, ctx)
    }

    // Completion deletes the upgrade record
    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        self.transition.handle_event(event, ctx, |u| u.is_none())
    }
}

#[cfg(test)]
#[path = "upgrade_tests.rs"]
mod tests;
