// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Steps that gather infrastructure state into the strategy findings

use super::{filter_alarms, Entities, WaitWindow};
use crate::event::StrategyEvent;
use crate::id::RequestId;
use crate::nfvi::{NfviOp, NfviResponse};
use crate::strategy::context::Context;
use crate::strategy::result::TaskResult;
use crate::strategy::task::{EventOutcome, TaskWork};
use serde::{Deserialize, Serialize};

fn failed() -> EventOutcome {
    EventOutcome::Complete(TaskResult::Failed, String::new())
}

fn succeeded() -> EventOutcome {
    EventOutcome::Complete(TaskResult::Success, String::new())
}

/// Response to the request this step is waiting on, if `event` is one
fn response_to<'e>(event: &'e StrategyEvent, pending: &mut Option<RequestId>) -> Option<&'e NfviResponse> {
    match event {
        StrategyEvent::NfviResponse { request_id, response } if *pending == Some(*request_id) => {
            *pending = None;
            Some(response)
        }
        _ => None,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct QueryAlarmsStep {
    #[serde(flatten)]
    entities: Entities,
    fail_on_alarms: bool,
    #[serde(default)]
    ignore_alarms: Vec<String>,
    #[serde(skip)]
    request: Option<RequestId>,
}

impl QueryAlarmsStep {
    pub const NAME: &'static str = "query-alarms";

    pub fn new(fail_on_alarms: bool, ignore_alarms: Vec<String>) -> Self {
        Self {
            entities: Entities::none(),
            fail_on_alarms,
            ignore_alarms,
            request: None,
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    pub fn fail_on_alarms(&self) -> bool {
        self.fail_on_alarms
    }

    pub fn ignore_alarms(&self) -> &[String] {
        &self.ignore_alarms
    }
}

impl TaskWork for QueryAlarmsStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        60
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        tracing::info!(step = Self::NAME, "step apply");
        self.request = Some(ctx.request(NfviOp::GetAlarms));
        (TaskResult::Wait, String::new())
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        let Some(response) = response_to(event, &mut self.request) else {
            return EventOutcome::Ignored;
        };
        let NfviResponse::Alarms(alarms) = response else {
            return failed();
        };
        ctx.findings.alarms = filter_alarms(alarms.clone(), &self.ignore_alarms, ctx.alarm_restrictions);
        if self.fail_on_alarms && !ctx.findings.alarms.is_empty() {
            EventOutcome::Complete(TaskResult::Failed, "alarms are present".to_string())
        } else {
            succeeded()
        }
    }
}

/// Wait for alarms to clear after a host returns to service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct WaitDataSyncStep {
    #[serde(flatten)]
    entities: Entities,
    #[serde(default)]
    ignore_alarms: Vec<String>,
    #[serde(skip)]
    timeout_secs: u64,
    #[serde(skip)]
    window: WaitWindow,
    #[serde(skip)]
    query: Option<RequestId>,
}

impl WaitDataSyncStep {
    pub const NAME: &'static str = "wait-data-sync";

    pub fn new(timeout_secs: u64, ignore_alarms: Vec<String>) -> Self {
        Self {
            entities: Entities::none(),
            ignore_alarms,
            timeout_secs,
            window: WaitWindow::default(),
            query: None,
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    pub fn ignore_alarms(&self) -> &[String] {
        &self.ignore_alarms
    }

    pub(crate) fn set_timeout_secs(&mut self, secs: u64) {
        self.timeout_secs = secs;
    }
}

impl TaskWork for WaitDataSyncStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    fn run(&mut self, _ctx: &mut Context<'_>) -> (TaskResult, String) {
        tracing::info!(step = Self::NAME, timeout = self.timeout_secs, "step apply");
        (TaskResult::Wait, String::new())
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        if let Some(response) = response_to(event, &mut self.query) {
            let NfviResponse::Alarms(alarms) = response else {
                return failed();
            };
            ctx.findings.alarms = filter_alarms(alarms.clone(), &self.ignore_alarms, ctx.alarm_restrictions);
            return if ctx.findings.alarms.is_empty() {
                succeeded()
            } else {
                EventOutcome::Handled
            };
        }

        match event {
            StrategyEvent::HostAudit => {
                // First alarm check no sooner than two minutes in
                if self.window.elapsed_secs(ctx.now) >= 120.0 && self.query.is_none() {
                    self.query = Some(ctx.request(NfviOp::GetAlarms));
                }
                EventOutcome::Handled
            }
            _ => EventOutcome::Ignored,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySwPatchesStep {
    #[serde(flatten)]
    entities: Entities,
    #[serde(skip)]
    request: Option<RequestId>,
}

impl QuerySwPatchesStep {
    pub const NAME: &'static str = "query-sw-patches";

    pub fn new() -> Self {
        Self {
            entities: Entities::none(),
            request: None,
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }
}

impl Default for QuerySwPatchesStep {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskWork for QuerySwPatchesStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        60
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        tracing::info!(step = Self::NAME, "step apply");
        self.request = Some(ctx.request(NfviOp::GetSwPatches));
        (TaskResult::Wait, String::new())
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match response_to(event, &mut self.request) {
            None => EventOutcome::Ignored,
            Some(NfviResponse::SwPatches(patches)) => {
                ctx.findings.sw_patches = patches.clone();
                succeeded()
            }
            Some(_) => failed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySwPatchHostsStep {
    #[serde(flatten)]
    entities: Entities,
    #[serde(skip)]
    request: Option<RequestId>,
}

impl QuerySwPatchHostsStep {
    pub const NAME: &'static str = "query-sw-patch-hosts";

    pub fn new() -> Self {
        Self {
            entities: Entities::none(),
            request: None,
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }
}

impl Default for QuerySwPatchHostsStep {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskWork for QuerySwPatchHostsStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        60
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        tracing::info!(step = Self::NAME, "step apply");
        self.request = Some(ctx.request(NfviOp::GetSwPatchHosts));
        (TaskResult::Wait, String::new())
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match response_to(event, &mut self.request) {
            None => EventOutcome::Ignored,
            Some(NfviResponse::SwPatchHosts(hosts)) => {
                ctx.findings.sw_patch_hosts = hosts.clone();
                succeeded()
            }
            Some(_) => failed(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryUpgradeStep {
    #[serde(flatten)]
    entities: Entities,
    #[serde(skip)]
    request: Option<RequestId>,
}

impl QueryUpgradeStep {
    pub const NAME: &'static str = "query-upgrade";

    pub fn new() -> Self {
        Self {
            entities: Entities::none(),
            request: None,
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }
}

impl Default for QueryUpgradeStep {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskWork for QueryUpgradeStep {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn timeout_secs(&self) -> u64 {
        60
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        tracing::info!(step = Self::NAME, "step apply");
        self.request = Some(ctx.request(NfviOp::GetUpgrade));
        (TaskResult::Wait, String::new())
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        match response_to(event, &mut self.request) {
            None => EventOutcome::Ignored,
            Some(NfviResponse::Upgrade(upgrade)) => {
                ctx.findings.upgrade = upgrade.clone();
                succeeded()
            }
            Some(_) => failed(),
        }
    }
}

#[cfg(test)]
#[path = "queries_tests.rs"]
mod tests;
