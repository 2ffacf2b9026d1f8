// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Strategy lifecycle: build, apply (all stages or one at a time), abort
//!
//! A strategy owns its build, apply and abort phases for its whole life.
//! Phase completions come back as [`Progress`] values and drive the state
//! transitions here; the owner hears about them as [`StrategyNotice`]s.

use super::context::Context;
use super::phase::{PhaseName, StrategyPhase};
use super::result::{Outcome, Progress, TaskResult};
use crate::event::StrategyEvent;
use crate::timers::TimerId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyState {
    #[default]
    Initial,
    Building,
    BuildFailed,
    BuildTimeout,
    ReadyToApply,
    Applying,
    ApplyFailed,
    ApplyTimeout,
    Applied,
    Aborting,
    AbortFailed,
    AbortTimeout,
    Aborted,
}

impl StrategyState {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyState::Initial => "initial",
            StrategyState::Building => "building",
            StrategyState::BuildFailed => "build-failed",
            StrategyState::BuildTimeout => "build-timeout",
            StrategyState::ReadyToApply => "ready-to-apply",
            StrategyState::Applying => "applying",
            StrategyState::ApplyFailed => "apply-failed",
            StrategyState::ApplyTimeout => "apply-timeout",
            StrategyState::Applied => "applied",
            StrategyState::Aborting => "aborting",
            StrategyState::AbortFailed => "abort-failed",
            StrategyState::AbortTimeout => "abort-timeout",
            StrategyState::Aborted => "aborted",
        }
    }
}

impl std::fmt::Display for StrategyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Milestones reported to the owner of a strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyNotice {
    BuildComplete(Outcome),
    ApplyComplete(Outcome),
    AbortComplete(Outcome),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Strategy {
    uuid: String,
    name: String,
    state: StrategyState,
    current_phase: PhaseName,
    build_phase: StrategyPhase,
    apply_phase: StrategyPhase,
    abort_phase: StrategyPhase,
}

impl Strategy {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            state: StrategyState::Initial,
            current_phase: PhaseName::Initial,
            build_phase: StrategyPhase::new(PhaseName::Build),
            apply_phase: StrategyPhase::new(PhaseName::Apply),
            abort_phase: StrategyPhase::new(PhaseName::Abort),
        }
    }

    pub fn uuid(&self) -> &str {
        &self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> StrategyState {
        self.state
    }

    pub fn current_phase(&self) -> PhaseName {
        self.current_phase
    }

    pub fn build_phase(&self) -> &StrategyPhase {
        &self.build_phase
    }

    pub fn apply_phase(&self) -> &StrategyPhase {
        &self.apply_phase
    }

    pub fn abort_phase(&self) -> &StrategyPhase {
        &self.abort_phase
    }

    pub(crate) fn build_phase_mut(&mut self) -> &mut StrategyPhase {
        &mut self.build_phase
    }

    pub(crate) fn apply_phase_mut(&mut self) -> &mut StrategyPhase {
        &mut self.apply_phase
    }

    fn phase_mut(&mut self, name: PhaseName) -> Option<&mut StrategyPhase> {
        match name {
            PhaseName::Build => Some(&mut self.build_phase),
            PhaseName::Apply => Some(&mut self.apply_phase),
            PhaseName::Abort => Some(&mut self.abort_phase),
            PhaseName::Initial => None,
        }
    }

    pub fn current_phase_completion_percentage(&self) -> u32 {
        match self.current_phase {
            PhaseName::Build => self.build_phase.completion_percentage(),
            PhaseName::Apply => self.apply_phase.completion_percentage(),
            PhaseName::Abort => self.abort_phase.completion_percentage(),
            PhaseName::Initial => 0,
        }
    }

    /// Something is running that a delete would cut off
    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            StrategyState::Building | StrategyState::Applying | StrategyState::Aborting
        )
    }

    /// Build-complete checks that fail turn a ready strategy into a failed build
    pub(crate) fn build_failed(&mut self, reason: impl Into<String>) {
        self.state = StrategyState::BuildFailed;
        self.build_phase.set_failed(reason.into());
    }

    pub fn build(&mut self, ctx: &mut Context<'_>) -> Vec<StrategyNotice> {
        let mut notices = Vec::new();
        if self.current_phase == PhaseName::Initial && self.state == StrategyState::Initial {
            tracing::info!(strategy = %self.uuid, "strategy build");
            self.state = StrategyState::Building;
            self.current_phase = PhaseName::Build;
            if let Progress::Done(outcome) = self.build_phase.apply(None, ctx) {
                self.phase_complete(PhaseName::Build, outcome, ctx, &mut notices);
            }
        }
        ctx.save();
        notices
    }

    /// Apply every remaining stage, or only `stage_id`.
    /// A rejection carries the reason for the caller to surface verbatim.
    pub fn apply(
        &mut self,
        stage_id: Option<usize>,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<StrategyNotice>, String> {
        let mut notices = Vec::new();
        let result = self.apply_inner(stage_id, ctx, &mut notices);
        ctx.save();
        result.map(|()| notices)
    }

    fn apply_inner(
        &mut self,
        stage_id: Option<usize>,
        ctx: &mut Context<'_>,
        notices: &mut Vec<StrategyNotice>,
    ) -> Result<(), String> {
        let total = self.apply_phase.total_stages();
        let stop_at = match self.current_phase {
            PhaseName::Build => {
                if self.state != StrategyState::ReadyToApply {
                    return Err(match stage_id {
                        None => self.build_phase.reason().to_string(),
                        Some(id) => format!("apply of stage id {} failed: {} ", id, self.build_phase.reason()),
                    });
                }
                match stage_id {
                    None => None,
                    Some(0) if total > 0 => Some(1),
                    Some(id) => {
                        return Err(format!(
                            "invalid stage id {} for the apply, total-stages are {}",
                            id, total
                        ))
                    }
                }
            }
            PhaseName::Apply => {
                if matches!(
                    self.state,
                    StrategyState::Applied
                        | StrategyState::ApplyFailed
                        | StrategyState::ApplyTimeout
                        | StrategyState::Aborted
                        | StrategyState::AbortFailed
                        | StrategyState::AbortTimeout
                ) {
                    return Err("apply already completed".to_string());
                }
                let current = self.apply_phase.current_stage();
                match stage_id {
                    None if current == self.apply_phase.stop_at_stage() => None,
                    None => return Err("apply already inprogress".to_string()),
                    Some(_) if self.apply_phase.is_inprogress() => {
                        return Err("apply already inprogress".to_string())
                    }
                    Some(id) if id < current => {
                        return Err(format!("apply already complete for stage id {}", id))
                    }
                    Some(id) if id >= total => {
                        return Err(format!(
                            "invalid stage id {} for the apply, total-stages are {}",
                            id, total
                        ))
                    }
                    Some(id) if id != current => {
                        return Err(format!(
                            "stage id {} is not the next stage to be applied, next-stage = {}",
                            id, current
                        ))
                    }
                    Some(id) => Some(id + 1),
                }
            }
            // An unbuilt strategy gets the same answer as one aborting
            PhaseName::Abort | PhaseName::Initial => {
                return Err(match stage_id {
                    None => "apply not supported during an abort".to_string(),
                    Some(id) => format!("apply of stage id {} not supported during an abort", id),
                });
            }
        };

        tracing::info!(strategy = %self.uuid, ?stage_id, "strategy apply");
        if self.current_phase == PhaseName::Build {
            self.state = StrategyState::Applying;
            self.current_phase = PhaseName::Apply;
        }
        if let Progress::Done(outcome) = self.apply_phase.apply(stop_at, ctx) {
            self.phase_complete(PhaseName::Apply, outcome, ctx, notices);
        }
        Ok(())
    }

    /// Abort the apply, or only the in-flight `stage_id`
    pub fn abort(
        &mut self,
        stage_id: Option<usize>,
        ctx: &mut Context<'_>,
    ) -> Result<Vec<StrategyNotice>, String> {
        let mut notices = Vec::new();
        let result = self.abort_inner(stage_id, &mut notices);
        ctx.save();
        result.map(|()| notices)
    }

    fn abort_inner(&mut self, stage_id: Option<usize>, notices: &mut Vec<StrategyNotice>) -> Result<(), String> {
        if self.current_phase != PhaseName::Apply {
            return Err("apply not inprogress".to_string());
        }
        if let Some(id) = stage_id {
            if !self.apply_phase.is_inprogress() || id != self.apply_phase.current_stage() {
                return Err(format!("apply not inprogress for stage id {}", id));
            }
        }

        match self.state {
            StrategyState::Applying | StrategyState::ApplyFailed | StrategyState::ApplyTimeout => {
                tracing::info!(strategy = %self.uuid, ?stage_id, "strategy abort");
                self.state = StrategyState::Aborting;
                self.abort_phase = self.apply_phase.abort();

                // Between single-stage applies nothing is running, so there
                // is nothing to wait for
                if self.apply_phase.current_stage() == self.apply_phase.stop_at_stage() {
                    self.state = StrategyState::Aborted;
                    notices.push(StrategyNotice::AbortComplete(Outcome::new(TaskResult::Aborted, "")));
                }
                Ok(())
            }
            StrategyState::Applied => Err("apply not inprogress".to_string()),
            _ => {
                self.state = StrategyState::Aborted;
                Ok(())
            }
        }
    }

    /// Route an external event to whichever phase is running
    pub fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> Vec<StrategyNotice> {
        let target = match (self.state, self.current_phase) {
            (StrategyState::Building, PhaseName::Build) => PhaseName::Build,
            (StrategyState::Applying, PhaseName::Apply) => PhaseName::Apply,
            (StrategyState::Aborting, PhaseName::Apply) => PhaseName::Apply,
            (StrategyState::Aborting, PhaseName::Abort) => PhaseName::Abort,
            _ => {
                tracing::debug!(strategy = %self.uuid, event = event.name(), state = %self.state, "event dropped");
                return Vec::new();
            }
        };

        let mut notices = Vec::new();
        let progress = self.phase_mut(target).and_then(|phase| phase.handle_event(event, ctx));
        if let Some(Progress::Done(outcome)) = progress {
            self.phase_complete(target, outcome, ctx, &mut notices);
        }
        notices
    }

    /// Returns `None` if the timer was not armed by this strategy
    pub fn handle_timer(&mut self, id: TimerId, ctx: &mut Context<'_>) -> Option<Vec<StrategyNotice>> {
        let target = [PhaseName::Build, PhaseName::Apply, PhaseName::Abort]
            .into_iter()
            .find(|name| match name {
                PhaseName::Build => self.build_phase.owns_timer(id),
                PhaseName::Apply => self.apply_phase.owns_timer(id),
                PhaseName::Abort => self.abort_phase.owns_timer(id),
                PhaseName::Initial => false,
            })?;

        let mut notices = Vec::new();
        let progress = self.phase_mut(target).and_then(|phase| phase.handle_timer(id, ctx));
        if let Some(Progress::Done(outcome)) = progress {
            self.phase_complete(target, outcome, ctx, &mut notices);
        }
        Some(notices)
    }

    fn phase_complete(
        &mut self,
        phase: PhaseName,
        outcome: Outcome,
        ctx: &mut Context<'_>,
        notices: &mut Vec<StrategyNotice>,
    ) {
        ctx.save();
        tracing::info!(
            strategy = %self.uuid,
            %phase,
            state = %self.state,
            result = %outcome.result,
            reason = %outcome.reason,
            "phase complete"
        );

        match (self.state, phase) {
            (StrategyState::Building, PhaseName::Build) => {
                let next = match outcome.result {
                    TaskResult::Success | TaskResult::Degraded => Some(StrategyState::ReadyToApply),
                    TaskResult::Failed => Some(StrategyState::BuildFailed),
                    TaskResult::TimedOut => Some(StrategyState::BuildTimeout),
                    _ => None,
                };
                if let Some(next) = next {
                    self.state = next;
                    notices.push(StrategyNotice::BuildComplete(outcome));
                }
            }
            (StrategyState::Applying, PhaseName::Apply) => match outcome.result {
                TaskResult::Success | TaskResult::Degraded => {
                    self.state = StrategyState::Applied;
                    notices.push(StrategyNotice::ApplyComplete(outcome));
                }
                TaskResult::Failed | TaskResult::TimedOut => {
                    self.state = if outcome.result == TaskResult::Failed {
                        StrategyState::ApplyFailed
                    } else {
                        StrategyState::ApplyTimeout
                    };
                    notices.push(StrategyNotice::ApplyComplete(outcome));
                    // A failed apply is unwound without waiting to be asked
                    let _ = self.abort_inner(None, notices);
                    self.start_abort_phase(ctx, notices);
                }
                _ => {}
            },
            (StrategyState::Aborting, PhaseName::Apply) => {
                let next = match outcome.result {
                    TaskResult::Success | TaskResult::Degraded => Some(StrategyState::Applied),
                    TaskResult::Failed => Some(StrategyState::ApplyFailed),
                    TaskResult::TimedOut => Some(StrategyState::ApplyTimeout),
                    _ => None,
                };
                if let Some(next) = next {
                    self.state = next;
                    notices.push(StrategyNotice::ApplyComplete(outcome));
                }
                self.start_abort_phase(ctx, notices);
            }
            (StrategyState::Aborting, PhaseName::Abort) => {
                let next = match outcome.result {
                    TaskResult::Success | TaskResult::Degraded => Some(StrategyState::Aborted),
                    TaskResult::Failed => Some(StrategyState::AbortFailed),
                    TaskResult::TimedOut => Some(StrategyState::AbortTimeout),
                    _ => None,
                };
                if let Some(next) = next {
                    self.state = next;
                    notices.push(StrategyNotice::AbortComplete(outcome));
                }
            }
            _ => {}
        }
        ctx.save();
    }

    fn start_abort_phase(&mut self, ctx: &mut Context<'_>, notices: &mut Vec<StrategyNotice>) {
        self.current_phase = PhaseName::Abort;
        if let Progress::Done(outcome) = self.abort_phase.apply(None, ctx) {
            self.phase_complete(PhaseName::Abort, outcome, ctx, notices);
        }
    }

    /// Re-arm every phase timer after step timeouts changed
    pub fn refresh_timeouts(&mut self, ctx: &mut Context<'_>) {
        self.build_phase.refresh_timeouts(ctx);
        self.apply_phase.refresh_timeouts(ctx);
        self.abort_phase.refresh_timeouts(ctx);
    }
}

#[derive(Serialize)]
struct StrategyRef<'a> {
    uuid: &'a str,
    name: &'a str,
    state: StrategyState,
    current_phase: PhaseName,
    current_phase_completion_percentage: u32,
    build_phase: &'a StrategyPhase,
    apply_phase: &'a StrategyPhase,
    abort_phase: &'a StrategyPhase,
}

impl Serialize for Strategy {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StrategyRef {
            uuid: &self.uuid,
            name: &self.name,
            state: self.state,
            current_phase: self.current_phase,
            current_phase_completion_percentage: self.current_phase_completion_percentage(),
            build_phase: &self.build_phase,
            apply_phase: &self.apply_phase,
            abort_phase: &self.abort_phase,
        }
        .serialize(serializer)
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
