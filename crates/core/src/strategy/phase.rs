// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A phase runs its stages in order, optionally stopping after a given stage

use super::context::Context;
use super::result::{Outcome, Progress, TaskResult};
use super::stage::StrategyStage;
use super::task::total_timeout;
use crate::event::StrategyEvent;
use crate::timers::TimerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhaseName {
    #[default]
    Initial,
    Build,
    Apply,
    Abort,
}

impl PhaseName {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseName::Initial => "initial",
            PhaseName::Build => "build",
            PhaseName::Apply => "apply",
            PhaseName::Abort => "abort",
        }
    }
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "PhaseRecord")]
pub struct StrategyPhase {
    phase_name: PhaseName,
    total_stages: usize,
    current_stage: usize,
    stop_at_stage: usize,
    #[serde(rename = "timeout")]
    timeout_secs: u64,
    start_date_time: String,
    end_date_time: String,
    inprogress: bool,
    completion_percentage: u32,
    result: TaskResult,
    reason: String,
    stages: Vec<StrategyStage>,
    #[serde(skip)]
    timer: Option<TimerId>,
}

impl StrategyPhase {
    pub fn new(phase_name: PhaseName) -> Self {
        Self {
            phase_name,
            total_stages: 0,
            current_stage: 0,
            stop_at_stage: 0,
            timeout_secs: 0,
            start_date_time: String::new(),
            end_date_time: String::new(),
            inprogress: false,
            completion_percentage: 0,
            result: TaskResult::Initial,
            reason: String::new(),
            stages: Vec::new(),
            timer: None,
        }
    }

    pub fn add_stage(&mut self, mut stage: StrategyStage) {
        stage.set_id(self.stages.len());
        self.stages.push(stage);
        self.total_stages = self.stages.len();
    }

    pub fn name(&self) -> PhaseName {
        self.phase_name
    }

    pub fn stages(&self) -> &[StrategyStage] {
        &self.stages
    }

    pub fn total_stages(&self) -> usize {
        self.total_stages
    }

    pub fn current_stage(&self) -> usize {
        self.current_stage
    }

    pub fn stop_at_stage(&self) -> usize {
        self.stop_at_stage
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn inprogress(&self) -> bool {
        self.inprogress
    }

    pub fn result(&self) -> TaskResult {
        self.result
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn start_date_time(&self) -> &str {
        &self.start_date_time
    }

    pub fn end_date_time(&self) -> &str {
        &self.end_date_time
    }

    pub fn completion_percentage(&self) -> u32 {
        self.completion_percentage
    }

    /// True while the phase has a stage actually running
    pub fn is_inprogress(&self) -> bool {
        self.inprogress
            && self
                .stages
                .get(self.current_stage)
                .is_some_and(|stage| stage.inprogress())
    }

    /// Record a failure found after the phase itself finished
    pub(crate) fn set_failed(&mut self, reason: String) {
        self.result = TaskResult::Failed;
        self.reason = reason;
    }

    fn aborting(&self) -> bool {
        self.inprogress && self.result == TaskResult::Aborted
    }

    fn update_percentage(&mut self) {
        self.completion_percentage = if self.stages.is_empty() {
            0
        } else {
            let done = self.current_stage.min(self.stages.len());
            (100 * done / self.stages.len()) as u32
        };
    }

    /// Sum of the stage budgets still to run before the stop point
    fn remaining_timeout(&self) -> u64 {
        total_timeout(
            self.stages
                .iter()
                .take(self.stop_at_stage)
                .skip(self.current_stage)
                .map(|s| s.timeout_secs()),
        )
    }

    fn cleanup(&mut self, ctx: &mut Context<'_>) {
        ctx.cancel_timer(&mut self.timer);
    }

    fn complete(&mut self, ctx: &mut Context<'_>) -> Progress {
        self.inprogress = false;
        self.cleanup(ctx);
        ctx.save();
        self.end_date_time = ctx.date_time.clone();
        tracing::info!(phase = %self.phase_name, result = %self.result, reason = %self.reason, "phase complete");
        Progress::done(self.result, self.reason.clone())
    }

    /// Run stages up to `stop_at_stage` (all of them if `None`).
    ///
    /// Stopping early leaves the phase inprogress and reports `Waiting`;
    /// a later apply resumes from the next stage.
    pub fn apply(&mut self, stop_at_stage: Option<usize>, ctx: &mut Context<'_>) -> Progress {
        match stop_at_stage {
            None => self.stop_at_stage = self.stages.len(),
            Some(stop) if stop <= self.stages.len() => self.stop_at_stage = stop,
            Some(stop) => {
                tracing::warn!(phase = %self.phase_name, stop, "invalid stop-at-stage ignored");
            }
        }

        if !self.inprogress {
            if self.current_stage != 0 {
                tracing::debug!(phase = %self.phase_name, "phase not inprogress");
                return Progress::Waiting;
            }
            self.cleanup(ctx);
            self.inprogress = true;
            self.result = TaskResult::Inprogress;
            self.reason.clear();
            self.start_date_time = ctx.date_time.clone();
            self.end_date_time.clear();
            self.update_percentage();
        }

        if self.timer.is_none() {
            let timeout = self.remaining_timeout();
            if timeout > 0 {
                self.timeout_secs = timeout;
                self.timer = Some(ctx.arm_timer(self.phase_name.as_str(), timeout));
            }
        }

        tracing::info!(
            phase = %self.phase_name,
            current_stage = self.current_stage,
            stop_at_stage = self.stop_at_stage,
            "phase apply"
        );
        self.run(ctx)
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> Progress {
        while self.current_stage < self.stop_at_stage && self.current_stage < self.stages.len() {
            let idx = self.current_stage;
            let Progress::Done(outcome) = self.stages[idx].apply(ctx) else {
                tracing::debug!(phase = %self.phase_name, stage = %self.stages[idx].name(), "phase waiting for stage");
                ctx.save();
                return Progress::Waiting;
            };

            (self.result, self.reason) = self.result.combine(&self.reason, outcome.result, &outcome.reason);
            if self.result.is_failure() {
                return self.complete(ctx);
            }
            ctx.save();
            self.current_stage += 1;
            self.update_percentage();
        }

        if self.stop_at_stage < self.stages.len() {
            tracing::info!(phase = %self.phase_name, stop_at_stage = self.stop_at_stage, "phase stopped at stage");
            self.cleanup(ctx);
            ctx.save();
            return Progress::Waiting;
        }

        if self.stages.is_empty() {
            self.result = TaskResult::Success;
            self.reason.clear();
        }
        self.complete(ctx)
    }

    fn stage_done(&mut self, outcome: Outcome, ctx: &mut Context<'_>) -> Progress {
        if self.aborting() {
            self.reason.clear();
            return self.complete(ctx);
        }

        (self.result, self.reason) = self.result.combine(&self.reason, outcome.result, &outcome.reason);
        if self.result.is_failure() {
            return self.complete(ctx);
        }
        self.current_stage += 1;
        self.update_percentage();
        self.run(ctx)
    }

    /// Route an event to the current stage
    pub fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> Option<Progress> {
        if !self.inprogress {
            tracing::debug!(phase = %self.phase_name, event = event.name(), "phase not inprogress, event dropped");
            return None;
        }
        let stage = self.stages.get_mut(self.current_stage)?;
        match stage.handle_event(event, ctx)? {
            Progress::Waiting => Some(Progress::Waiting),
            Progress::Done(outcome) => Some(self.stage_done(outcome, ctx)),
        }
    }

    pub fn owns_timer(&self, id: TimerId) -> bool {
        self.timer == Some(id) || self.stages.iter().any(|s| s.owns_timer(id))
    }

    /// Returns `None` if no part of this phase armed the timer
    pub fn handle_timer(&mut self, id: TimerId, ctx: &mut Context<'_>) -> Option<Progress> {
        if self.timer == Some(id) {
            self.timer = None;
            if !self.inprogress {
                tracing::info!(phase = %self.phase_name, "phase timer fired, phase not inprogress");
                return Some(Progress::Waiting);
            }
            tracing::info!(phase = %self.phase_name, timeout = self.timeout_secs, "phase timed out");
            self.result = TaskResult::TimedOut;
            self.reason = "timeout".to_string();
            return Some(self.complete(ctx));
        }

        if !self.inprogress {
            return None;
        }
        let stage = self.stages.get_mut(self.current_stage)?;
        match stage.handle_timer(id, ctx)? {
            Progress::Waiting => Some(Progress::Waiting),
            Progress::Done(outcome) => Some(self.stage_done(outcome, ctx)),
        }
    }

    /// Mark the phase aborted and build the abort phase that undoes it
    pub fn abort(&mut self) -> StrategyPhase {
        if self.result == TaskResult::Initial || self.inprogress {
            self.result = TaskResult::Aborted;
            self.reason.clear();
        }

        let mut abort_phase = StrategyPhase::new(PhaseName::Abort);
        if self.current_stage < self.stages.len() {
            for idx in (0..=self.current_stage).rev() {
                tracing::info!(phase = %self.phase_name, stage = %self.stages[idx].name(), "phase abort stage");
                for stage in self.stages[idx].abort() {
                    abort_phase.add_stage(stage);
                }
            }
        }
        tracing::info!(phase = %self.phase_name, abort_stages = abort_phase.total_stages, "phase abort");
        abort_phase
    }

    /// Recompute the budget of the stages still to run and re-arm timers
    pub fn refresh_timeouts(&mut self, ctx: &mut Context<'_>) {
        if !self.inprogress {
            return;
        }
        self.cleanup(ctx);
        let timeout = self.remaining_timeout();
        if timeout == 0 {
            return;
        }
        self.timeout_secs = timeout;
        self.timer = Some(ctx.arm_timer(self.phase_name.as_str(), timeout));
        tracing::debug!(phase = %self.phase_name, timeout, "phase timer restarted");

        if let Some(stage) = self.stages.get_mut(self.current_stage) {
            stage.refresh_timeouts(ctx);
        }
    }
}

/// Persisted form of a [`StrategyPhase`]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct PhaseRecord {
    phase_name: PhaseName,
    #[serde(default)]
    current_stage: usize,
    #[serde(default)]
    stop_at_stage: usize,
    #[serde(default)]
    timeout: u64,
    #[serde(default)]
    start_date_time: String,
    #[serde(default)]
    end_date_time: String,
    #[serde(default)]
    inprogress: bool,
    #[serde(default)]
    result: TaskResult,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    stages: Vec<StrategyStage>,
}

impl From<PhaseRecord> for StrategyPhase {
    fn from(record: PhaseRecord) -> Self {
        let mut phase = StrategyPhase::new(record.phase_name);
        for stage in record.stages {
            phase.add_stage(stage);
        }
        phase.current_stage = record.current_stage;
        phase.stop_at_stage = record.stop_at_stage;
        phase.timeout_secs = record.timeout;
        phase.start_date_time = record.start_date_time;
        phase.end_date_time = record.end_date_time;
        phase.inprogress = record.inprogress;
        phase.result = record.result;
        phase.reason = record.reason;

        if phase.inprogress
            && phase.current_stage == 0
            && phase.stages.first().is_some_and(|stage| !stage.inprogress())
        {
            phase.inprogress = false;
            phase.result = TaskResult::Initial;
            phase.reason.clear();
        }
        phase.update_percentage();
        phase
    }
}

#[cfg(test)]
#[path = "phase_tests.rs"]
mod tests;
