// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequential task-work runner with per-unit and per-task timeouts
//!
//! A [`StateTask`] runs its units in order. A unit either finishes
//! synchronously or returns [`TaskResult::Wait`], in which case the task
//! suspends until [`StateTask::task_work_complete`], an event, or a timer
//! resolves it. Completion flows back to the caller as a [`Progress`].

use super::context::Context;
use super::result::{Progress, TaskResult};
use crate::event::StrategyEvent;
use crate::timers::TimerId;

/// Answer of a unit to an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventOutcome {
    Ignored,
    /// Consumed, the unit keeps waiting
    Handled,
    /// Consumed and the unit is done
    Complete(TaskResult, String),
}

/// One unit of work inside a [`StateTask`]
pub trait TaskWork {
    fn name(&self) -> &str;

    /// Zero disables the per-unit timer
    fn timeout_secs(&self) -> u64;

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String);

    /// May rewrite the result reported by an asynchronous completion
    fn complete(
        &mut self,
        result: TaskResult,
        reason: String,
        _ctx: &mut Context<'_>,
    ) -> (TaskResult, String) {
        (result, reason)
    }

    fn on_timeout(&mut self, _ctx: &mut Context<'_>) -> (TaskResult, String) {
        (TaskResult::TimedOut, String::new())
    }

    fn abort(&mut self, _ctx: &mut Context<'_>) {}

    fn handle_event(&mut self, _event: &StrategyEvent, _ctx: &mut Context<'_>) -> EventOutcome {
        EventOutcome::Ignored
    }
}

/// Total budget for a list of units: the sum plus one second of slack
pub fn total_timeout(timeouts: impl IntoIterator<Item = u64>) -> u64 {
    let total: u64 = timeouts.into_iter().sum();
    if total > 0 {
        total + 1
    } else {
        0
    }
}

#[derive(Debug, Clone)]
pub struct StateTask<W> {
    name: String,
    work: Vec<W>,
    current: usize,
    result: TaskResult,
    reason: String,
    timeout_secs: u64,
    inprogress: bool,
    timer: Option<TimerId>,
    work_timer: Option<TimerId>,
}

impl<W: TaskWork> StateTask<W> {
    pub fn new(name: impl Into<String>, work: Vec<W>) -> Self {
        let timeout_secs = total_timeout(work.iter().map(|w| w.timeout_secs()));
        Self {
            name: name.into(),
            work,
            current: 0,
            result: TaskResult::Success,
            reason: String::new(),
            timeout_secs,
            inprogress: false,
            timer: None,
            work_timer: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn work(&self) -> &[W] {
        &self.work
    }

    pub fn work_mut(&mut self) -> &mut [W] {
        &mut self.work
    }

    pub fn current_unit(&self) -> usize {
        self.current
    }

    pub fn timeout_secs(&self) -> u64 {
        self.timeout_secs
    }

    pub fn result(&self) -> TaskResult {
        self.result
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }

    pub fn inprogress(&self) -> bool {
        self.inprogress
    }

    /// True if the id belongs to one of this task's timers
    pub fn owns_timer(&self, id: TimerId) -> bool {
        self.timer == Some(id) || self.work_timer == Some(id)
    }

    fn cleanup(&mut self, ctx: &mut Context<'_>) {
        ctx.cancel_timer(&mut self.timer);
        ctx.cancel_timer(&mut self.work_timer);
    }

    /// Abort every unit from the current one back to the first
    fn unwind(&mut self, ctx: &mut Context<'_>) {
        if self.inprogress && !self.work.is_empty() {
            let last = self.current.min(self.work.len() - 1);
            for idx in (0..=last).rev() {
                self.work[idx].abort(ctx);
                tracing::debug!(task = %self.name, work = self.work[idx].name(), "aborted work");
            }
        }
        self.current = 0;
        self.inprogress = false;
        self.cleanup(ctx);
    }

    /// External abort; does not report completion
    pub fn abort(&mut self, ctx: &mut Context<'_>) {
        self.result = TaskResult::Aborted;
        self.reason = "aborted".to_string();
        self.unwind(ctx);
    }

    pub fn start(&mut self, ctx: &mut Context<'_>) -> Progress {
        self.cleanup(ctx);
        self.current = 0;
        self.inprogress = true;
        self.result = TaskResult::Success;
        self.reason = String::new();
        if self.timeout_secs > 0 {
            self.timer = Some(ctx.arm_timer(&self.name, self.timeout_secs));
        }
        self.run(ctx)
    }

    fn finish(&mut self) -> Progress {
        Progress::done(self.result, self.reason.clone())
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> Progress {
        if !self.inprogress {
            tracing::debug!(task = %self.name, "task not inprogress");
            return Progress::Waiting;
        }

        while self.current < self.work.len() {
            ctx.cancel_timer(&mut self.work_timer);

            let idx = self.current;
            tracing::debug!(task = %self.name, work = self.work[idx].name(), "running work");
            let (result, reason) = self.work[idx].run(ctx);

            if result == TaskResult::Wait {
                let timeout = self.work[idx].timeout_secs();
                if timeout > 0 {
                    self.work_timer = Some(ctx.arm_timer(self.work[idx].name(), timeout));
                }
                tracing::debug!(task = %self.name, work = self.work[idx].name(), timeout, "waiting for work");
                return Progress::Waiting;
            }

            (self.result, self.reason) = self.result.combine(&self.reason, result, &reason);
            if self.result.is_failure() {
                self.unwind(ctx);
                return self.finish();
            }
            self.current += 1;
        }

        tracing::debug!(task = %self.name, result = %self.result, "task done running");
        self.inprogress = false;
        self.cleanup(ctx);
        self.finish()
    }

    /// Resolve the unit the task is waiting on
    pub fn task_work_complete(
        &mut self,
        result: TaskResult,
        reason: String,
        ctx: &mut Context<'_>,
    ) -> Progress {
        if !self.inprogress || self.current >= self.work.len() {
            tracing::warn!(task = %self.name, %result, "late work completion ignored");
            return Progress::Waiting;
        }
        let idx = self.current;
        let (result, reason) = self.work[idx].complete(result, reason, ctx);

        (self.result, self.reason) = self.result.combine(&self.reason, result, &reason);
        if self.result.is_failure() {
            self.unwind(ctx);
            return self.finish();
        }
        self.current += 1;
        self.run(ctx)
    }

    /// Returns `None` if the timer does not belong to this task
    pub fn handle_timer(&mut self, id: TimerId, ctx: &mut Context<'_>) -> Option<Progress> {
        if self.timer == Some(id) {
            self.timer = None;
            tracing::info!(task = %self.name, timeout = self.timeout_secs, "task timed out");
            self.unwind(ctx);
            self.result = TaskResult::TimedOut;
            self.reason = "timeout".to_string();
            return Some(self.finish());
        }

        if self.work_timer == Some(id) {
            self.work_timer = None;
            if !self.inprogress || self.current >= self.work.len() {
                tracing::error!(task = %self.name, current = self.current, "work timer fired for invalid work");
                return Some(Progress::Waiting);
            }
            let idx = self.current;
            tracing::info!(task = %self.name, work = self.work[idx].name(), "work timed out");
            let (result, reason) = self.work[idx].on_timeout(ctx);
            if result == TaskResult::TimedOut {
                self.unwind(ctx);
                self.result = TaskResult::TimedOut;
                self.reason = reason;
                return Some(self.finish());
            }
            return Some(self.task_work_complete(result, reason, ctx));
        }

        None
    }

    /// Forward an event to the unit being waited on.
    /// Returns `None` if the event was not handled.
    pub fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> Option<Progress> {
        if !self.inprogress || self.current >= self.work.len() {
            return None;
        }
        let idx = self.current;
        match self.work[idx].handle_event(event, ctx) {
            EventOutcome::Ignored => None,
            EventOutcome::Handled => Some(Progress::Waiting),
            EventOutcome::Complete(result, reason) => {
                Some(self.task_work_complete(result, reason, ctx))
            }
        }
    }

    /// Recompute the task budget and re-arm running timers
    pub fn refresh_timeouts(&mut self, ctx: &mut Context<'_>) {
        let Some(timer) = self.timer.take() else {
            return;
        };
        ctx.timers.delete_timer(timer);

        self.timeout_secs = total_timeout(self.work.iter().map(|w| w.timeout_secs()));
        if self.timeout_secs > 0 {
            self.timer = Some(ctx.arm_timer(&self.name, self.timeout_secs));
        }

        let Some(work_timer) = self.work_timer.take() else {
            return;
        };
        ctx.timers.delete_timer(work_timer);
        if let Some(work) = self.work.get(self.current) {
            if work.timeout_secs() > 0 {
                self.work_timer = Some(ctx.arm_timer(work.name(), work.timeout_secs()));
            }
        }
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
