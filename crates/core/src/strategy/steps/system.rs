// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::Entities;
use crate::event::StrategyEvent;
use crate::strategy::context::Context;
use crate::strategy::result::TaskResult;
use crate::strategy::task::{EventOutcome, TaskWork};
use serde::{Deserialize, Serialize};

/// Let the system settle for a fixed time; any state change fails it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStabilizeStep {
    #[serde(flatten)]
    entities: Entities,
    #[serde(skip)]
    timeout_secs: u64,
}

impl SystemStabilizeStep {
    pub const NAME: &'static str = "system-stabilize";
    pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

    pub fn new(timeout_secs: u64) -> Self {
        Self {
            entities: Entities::none(),
            timeout_secs,
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    pub(crate) fn set_timeout_secs(&mut self, secs: u64) {
        self.timeout_secs = secs;
    }
}

impl Default for SystemStabilizeStep {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIMEOUT_SECS)
    }
}

impl TaskWork for SystemStabilizeStep {
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

    /// Running out the clock is the expected outcome
    fn on_timeout(&mut self, _ctx: &mut Context<'_>) -> (TaskResult, String) {
        (TaskResult::Success, String::new())
    }

    fn handle_event(&mut self, event: &StrategyEvent, _ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::HostStateChanged { host_name } => EventOutcome::Complete(
                TaskResult::Failed,
                format!("host {} changed state unexpectedly", host_name),
            ),
            StrategyEvent::InstanceStateChanged { instance_name } => EventOutcome::Complete(
                TaskResult::Failed,
                format!("instance {} changed state unexpectedly", instance_name),
            ),
            _ => EventOutcome::Ignored,
        }
    }
}

#[cfg(test)]
#[path = "system_tests.rs"]
mod tests;
