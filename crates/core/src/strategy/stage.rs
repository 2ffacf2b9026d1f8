// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A stage runs its steps strictly in order under one overall timer

use super::context::Context;
use super::result::{Outcome, Progress, TaskResult};
use super::step::StrategyStep;
use super::task::total_timeout;
use crate::event::StrategyEvent;
use crate::timers::TimerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", from = "StageRecord")]
pub struct StrategyStage {
    stage_id: usize,
    #[serde(rename = "stage-name")]
    name: String,
    total_steps: usize,
    current_step: usize,
    #[serde(rename = "timeout")]
    timeout_secs: u64,
    start_date_time: String,
    end_date_time: String,
    inprogress: bool,
    result: TaskResult,
    reason: String,
    steps: Vec<StrategyStep>,
    #[serde(skip)]
    timer: Option<TimerId>,
}

impl StrategyStage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            stage_id: 0,
            name: name.into(),
            total_steps: 0,
            current_step: 0,
            timeout_secs: 0,
            start_date_time: String::new(),
            end_date_time: String::new(),
            inprogress: false,
            result: TaskResult::Initial,
            reason: String::new(),
            steps: Vec::new(),
            timer: None,
        }
    }

    pub fn add_step(&mut self, mut step: StrategyStep) {
        step.set_id(self.steps.len());
        self.steps.push(step);
        self.total_steps = self.steps.len();
        self.timeout_secs = total_timeout(self.steps.iter().map(|s| s.timeout_secs()));
    }

    pub fn with_step(mut self, step: StrategyStep) -> Self {
        self.add_step(step);
        self
    }

    pub fn id(&self) -> usize {
        self.stage_id
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.stage_id = id;
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[StrategyStep] {
        &self.steps
    }

    pub fn total_steps(&self) -> usize {
        self.total_steps
    }

    pub fn current_step(&self) -> usize {
        self.current_step
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

    /// Abort was requested while a step was still running
    fn aborting(&self) -> bool {
        self.inprogress && self.result == TaskResult::Aborted
    }

    fn cleanup(&mut self, ctx: &mut Context<'_>) {
        ctx.cancel_timer(&mut self.timer);
    }

    fn complete(&mut self, ctx: &mut Context<'_>) -> Progress {
        self.inprogress = false;
        self.cleanup(ctx);
        // A step still waiting here was cut off by the stage timer
        if let Some(step) = self.steps.get_mut(self.current_step) {
            step.abort(ctx);
        }
        ctx.save();
        self.end_date_time = ctx.date_time.clone();
        tracing::info!(stage = %self.name, result = %self.result, reason = %self.reason, "stage complete");
        Progress::done(self.result, self.reason.clone())
    }

    pub fn apply(&mut self, ctx: &mut Context<'_>) -> Progress {
        if !self.inprogress {
            if self.current_step != 0 {
                tracing::debug!(stage = %self.name, "stage not inprogress");
                return Progress::done(self.result, self.reason.clone());
            }
            self.cleanup(ctx);
            self.inprogress = true;
            self.result = TaskResult::Inprogress;
            self.reason.clear();
            self.start_date_time = ctx.date_time.clone();
            self.end_date_time.clear();
            if self.timeout_secs > 0 {
                self.timer = Some(ctx.arm_timer(&self.name, self.timeout_secs));
            }
            tracing::info!(stage = %self.name, steps = self.steps.len(), timeout = self.timeout_secs, "stage apply");
        }
        self.run(ctx)
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> Progress {
        while self.current_step < self.steps.len() {
            let idx = self.current_step;
            let progress = self.steps[idx].apply(ctx);
            let Progress::Done(outcome) = progress else {
                tracing::debug!(
                    stage = %self.name,
                    step = %self.steps[idx].name(),
                    timeout = self.steps[idx].timeout_secs(),
                    "stage waiting for step"
                );
                ctx.save();
                return Progress::Waiting;
            };

            (self.result, self.reason) = self.result.combine(&self.reason, outcome.result, &outcome.reason);
            if self.result.is_failure() {
                return self.complete(ctx);
            }
            ctx.save();
            self.current_step += 1;
        }

        if self.steps.is_empty() {
            self.result = TaskResult::Success;
            self.reason.clear();
        }
        self.complete(ctx)
    }

    fn step_done(&mut self, outcome: Outcome, ctx: &mut Context<'_>) -> Progress {
        if self.aborting() {
            self.reason.clear();
            return self.complete(ctx);
        }

        (self.result, self.reason) = self.result.combine(&self.reason, outcome.result, &outcome.reason);
        if self.result.is_failure() {
            return self.complete(ctx);
        }
        self.current_step += 1;
        self.run(ctx)
    }

    /// Route an event to the running step.
    /// Returns `None` if nothing consumed it.
    pub fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> Option<Progress> {
        if !self.inprogress {
            return None;
        }
        let step = self.steps.get_mut(self.current_step)?;
        match step.handle_event(event, ctx)? {
            Progress::Waiting => Some(Progress::Waiting),
            Progress::Done(outcome) => Some(self.step_done(outcome, ctx)),
        }
    }

    /// Returns `None` if the timer belongs to neither the stage nor its running step
    pub fn handle_timer(&mut self, id: TimerId, ctx: &mut Context<'_>) -> Option<Progress> {
        if self.timer == Some(id) {
            self.timer = None;
            if !self.inprogress {
                tracing::info!(stage = %self.name, "stage timer fired, stage not inprogress");
                return Some(Progress::Waiting);
            }
            tracing::info!(stage = %self.name, timeout = self.timeout_secs, "stage timed out");
            self.result = TaskResult::TimedOut;
            self.reason = "timeout".to_string();
            return Some(self.complete(ctx));
        }

        if !self.inprogress {
            return None;
        }
        let step = self.steps.get_mut(self.current_step)?;
        if !step.owns_timer(id) {
            return None;
        }
        match step.handle_timer(id, ctx)? {
            Progress::Waiting => Some(Progress::Waiting),
            Progress::Done(outcome) if outcome.result == TaskResult::TimedOut => {
                if self.aborting() {
                    self.reason.clear();
                } else {
                    self.result = TaskResult::TimedOut;
                    self.reason = outcome.reason;
                }
                Some(self.complete(ctx))
            }
            Progress::Done(outcome) => Some(self.step_done(outcome, ctx)),
        }
    }

    pub fn owns_timer(&self, id: TimerId) -> bool {
        self.timer == Some(id) || self.steps.iter().any(|s| s.owns_timer(id))
    }

    /// Mark the stage aborted and collect the stages that undo its steps.
    ///
    /// A running stage keeps running: its current step finishes and the
    /// stage then completes as aborted.
    pub fn abort(&mut self) -> Vec<StrategyStage> {
        if self.result == TaskResult::Initial || self.inprogress {
            self.result = TaskResult::Aborted;
            self.reason.clear();
        }

        let mut undo = StrategyStage::new(self.name.clone());
        if self.current_step < self.steps.len() {
            for idx in (0..=self.current_step).rev() {
                let step = &self.steps[idx];
                tracing::info!(stage = %self.name, step = %step.name(), "stage abort step");
                for abort_step in step.abort_steps() {
                    undo.add_step(abort_step);
                }
            }
        }
        tracing::info!(stage = %self.name, "stage abort");

        if undo.steps.is_empty() {
            Vec::new()
        } else {
            vec![undo]
        }
    }

    /// Recompute the stage budget and re-arm the running timers
    pub fn refresh_timeouts(&mut self, ctx: &mut Context<'_>) {
        if !self.inprogress {
            return;
        }
        self.cleanup(ctx);
        self.timeout_secs = total_timeout(self.steps.iter().map(|s| s.timeout_secs()));
        if self.timeout_secs > 0 {
            self.timer = Some(ctx.arm_timer(&self.name, self.timeout_secs));
        }
        if let Some(step) = self.steps.get_mut(self.current_step) {
            step.refresh_timeouts(ctx);
        }
    }
}

/// Persisted form of a [`StrategyStage`]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StageRecord {
    #[serde(default)]
    stage_id: usize,
    stage_name: String,
    #[serde(default)]
    current_step: usize,
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
    steps: Vec<StrategyStep>,
}

impl From<StageRecord> for StrategyStage {
    fn from(record: StageRecord) -> Self {
        let mut stage = StrategyStage::new(record.stage_name);
        for step in record.steps {
            stage.add_step(step);
        }
        stage.stage_id = record.stage_id;
        stage.current_step = record.current_step;
        stage.start_date_time = record.start_date_time;
        stage.end_date_time = record.end_date_time;
        stage.inprogress = record.inprogress;
        stage.result = record.result;
        stage.reason = record.reason;

        // A stage saved before its first step started never really began,
        // and a stage saved after a step finished resumes past it
        if stage.inprogress && !stage.steps.is_empty() {
            if stage.current_step == 0 {
                if stage.steps[0].result() == TaskResult::Initial {
                    stage.inprogress = false;
                    stage.result = TaskResult::Initial;
                    stage.reason.clear();
                }
            } else if let Some(step) = stage.steps.get(stage.current_step) {
                if !matches!(
                    step.result(),
                    TaskResult::Initial | TaskResult::Inprogress | TaskResult::Wait
                ) {
                    stage.current_step += 1;
                }
            }
        }
        stage
    }
}

#[cfg(test)]
#[path = "stage_tests.rs"]
mod tests;
