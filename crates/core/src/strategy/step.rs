// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A strategy step: one catalog entry driven by a single-unit [`StateTask`]

use super::context::Context;
use super::result::{Progress, TaskResult};
use super::steps::*;
use super::task::{EventOutcome, StateTask, TaskWork};
use crate::event::StrategyEvent;
use crate::timers::TimerId;
use serde::{Deserialize, Serialize};

/// Every kind of step, tagged by its persisted `step-name`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "step-name", rename_all = "kebab-case")]
pub enum StepWork {
    UnlockHosts(UnlockHostsStep),
    LockHosts(LockHostsStep),
    RebootHosts(RebootHostsStep),
    SwactHosts(SwactHostsStep),
    SwPatchHosts(SwPatchHostsStep),
    UpgradeHosts(UpgradeHostsStep),
    StartUpgrade(StartUpgradeStep),
    ActivateUpgrade(ActivateUpgradeStep),
    CompleteUpgrade(CompleteUpgradeStep),
    MigrateInstances(MigrateInstancesStep),
    StopInstances(StopInstancesStep),
    StartInstances(StartInstancesStep),
    SystemStabilize(SystemStabilizeStep),
    QueryAlarms(QueryAlarmsStep),
    WaitDataSync(WaitDataSyncStep),
    QuerySwPatches(QuerySwPatchesStep),
    QuerySwPatchHosts(QuerySwPatchHostsStep),
    QueryUpgrade(QueryUpgradeStep),
    DisableHostServices(DisableHostServicesStep),
    EnableHostServices(EnableHostServicesStep),
    #[cfg(test)]
    Recording(crate::test_support::RecordingStep),
}

macro_rules! step_work_from {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for StepWork {
                fn from(step: $ty) -> Self {
                    StepWork::$variant(step)
                }
            }
        )*
    };
}

step_work_from!(
    UnlockHosts(UnlockHostsStep),
    LockHosts(LockHostsStep),
    RebootHosts(RebootHostsStep),
    SwactHosts(SwactHostsStep),
    SwPatchHosts(SwPatchHostsStep),
    UpgradeHosts(UpgradeHostsStep),
    StartUpgrade(StartUpgradeStep),
    ActivateUpgrade(ActivateUpgradeStep),
    CompleteUpgrade(CompleteUpgradeStep),
    MigrateInstances(MigrateInstancesStep),
    StopInstances(StopInstancesStep),
    StartInstances(StartInstancesStep),
    SystemStabilize(SystemStabilizeStep),
    QueryAlarms(QueryAlarmsStep),
    WaitDataSync(WaitDataSyncStep),
    QuerySwPatches(QuerySwPatchesStep),
    QuerySwPatchHosts(QuerySwPatchHostsStep),
    QueryUpgrade(QueryUpgradeStep),
    DisableHostServices(DisableHostServicesStep),
    EnableHostServices(EnableHostServicesStep),
);

#[cfg(test)]
step_work_from!(Recording(crate::test_support::RecordingStep));

impl StepWork {
    fn as_work(&self) -> &dyn TaskWork {
        match self {
            StepWork::UnlockHosts(s) => s,
            StepWork::LockHosts(s) => s,
            StepWork::RebootHosts(s) => s,
            StepWork::SwactHosts(s) => s,
            StepWork::SwPatchHosts(s) => s,
            StepWork::UpgradeHosts(s) => s,
            StepWork::StartUpgrade(s) => s,
            StepWork::ActivateUpgrade(s) => s,
            StepWork::CompleteUpgrade(s) => s,
            StepWork::MigrateInstances(s) => s,
            StepWork::StopInstances(s) => s,
            StepWork::StartInstances(s) => s,
            StepWork::SystemStabilize(s) => s,
            StepWork::QueryAlarms(s) => s,
            StepWork::WaitDataSync(s) => s,
            StepWork::QuerySwPatches(s) => s,
            StepWork::QuerySwPatchHosts(s) => s,
            StepWork::QueryUpgrade(s) => s,
            StepWork::DisableHostServices(s) => s,
            StepWork::EnableHostServices(s) => s,
            #[cfg(test)]
            StepWork::Recording(s) => s,
        }
    }

    fn as_work_mut(&mut self) -> &mut dyn TaskWork {
        match self {
            StepWork::UnlockHosts(s) => s,
            StepWork::LockHosts(s) => s,
            StepWork::RebootHosts(s) => s,
            StepWork::SwactHosts(s) => s,
            StepWork::SwPatchHosts(s) => s,
            StepWork::UpgradeHosts(s) => s,
            StepWork::StartUpgrade(s) => s,
            StepWork::ActivateUpgrade(s) => s,
            StepWork::CompleteUpgrade(s) => s,
            StepWork::MigrateInstances(s) => s,
            StepWork::StopInstances(s) => s,
            StepWork::StartInstances(s) => s,
            StepWork::SystemStabilize(s) => s,
            StepWork::QueryAlarms(s) => s,
            StepWork::WaitDataSync(s) => s,
            StepWork::QuerySwPatches(s) => s,
            StepWork::QuerySwPatchHosts(s) => s,
            StepWork::QueryUpgrade(s) => s,
            StepWork::DisableHostServices(s) => s,
            StepWork::EnableHostServices(s) => s,
            #[cfg(test)]
            StepWork::Recording(s) => s,
        }
    }

    pub fn entities(&self) -> &Entities {
        match self {
            StepWork::UnlockHosts(s) => s.entities(),
            StepWork::LockHosts(s) => s.entities(),
            StepWork::RebootHosts(s) => s.entities(),
            StepWork::SwactHosts(s) => s.entities(),
            StepWork::SwPatchHosts(s) => s.entities(),
            StepWork::UpgradeHosts(s) => s.entities(),
            StepWork::StartUpgrade(s) => s.entities(),
            StepWork::ActivateUpgrade(s) => s.entities(),
            StepWork::CompleteUpgrade(s) => s.entities(),
            StepWork::MigrateInstances(s) => s.entities(),
            StepWork::StopInstances(s) => s.entities(),
            StepWork::StartInstances(s) => s.entities(),
            StepWork::SystemStabilize(s) => s.entities(),
            StepWork::QueryAlarms(s) => s.entities(),
            StepWork::WaitDataSync(s) => s.entities(),
            StepWork::QuerySwPatches(s) => s.entities(),
            StepWork::QuerySwPatchHosts(s) => s.entities(),
            StepWork::QueryUpgrade(s) => s.entities(),
            StepWork::DisableHostServices(s) => s.entities(),
            StepWork::EnableHostServices(s) => s.entities(),
            #[cfg(test)]
            StepWork::Recording(s) => s.entities(),
        }
    }

    /// Steps that undo this one when its stage is aborted
    pub fn abort_steps(&self) -> Vec<StepWork> {
        match self {
            StepWork::LockHosts(s) => vec![s.abort_step().into()],
            StepWork::StopInstances(s) => vec![s.abort_step().into()],
            StepWork::DisableHostServices(s) => vec![s.abort_step().into()],
            _ => Vec::new(),
        }
    }

    /// Steps with a configurable duration keep it outside their own record
    fn restore_timeout(&mut self, secs: u64) {
        match self {
            StepWork::SystemStabilize(s) => s.set_timeout_secs(secs),
            StepWork::WaitDataSync(s) => s.set_timeout_secs(secs),
            _ => {}
        }
    }
}

impl TaskWork for StepWork {
    fn name(&self) -> &str {
        self.as_work().name()
    }

    fn timeout_secs(&self) -> u64 {
        self.as_work().timeout_secs()
    }

    fn run(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        self.as_work_mut().run(ctx)
    }

    fn complete(&mut self, result: TaskResult, reason: String, ctx: &mut Context<'_>) -> (TaskResult, String) {
        self.as_work_mut().complete(result, reason, ctx)
    }

    fn on_timeout(&mut self, ctx: &mut Context<'_>) -> (TaskResult, String) {
        self.as_work_mut().on_timeout(ctx)
    }

    fn abort(&mut self, ctx: &mut Context<'_>) {
        self.as_work_mut().abort(ctx)
    }

    fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> EventOutcome {
        self.as_work_mut().handle_event(event, ctx)
    }
}

/// One step of a stage with its recorded result
#[derive(Debug, Clone, Deserialize)]
#[serde(from = "StepRecord")]
pub struct StrategyStep {
    id: usize,
    task: StateTask<StepWork>,
    timeout_secs: u64,
    result: TaskResult,
    reason: String,
    start_date_time: String,
    end_date_time: String,
}

impl StrategyStep {
    pub fn new(work: impl Into<StepWork>) -> Self {
        let work: StepWork = work.into();
        let timeout_secs = work.timeout_secs();
        let name = work.name().to_string();
        Self {
            id: 0,
            task: StateTask::new(name, vec![work]),
            timeout_secs,
            result: TaskResult::Initial,
            reason: String::new(),
            start_date_time: String::new(),
            end_date_time: String::new(),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: usize) {
        self.id = id;
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn work(&self) -> Option<&StepWork> {
        self.task.work().first()
    }

    pub fn entities(&self) -> Entities {
        self.work().map(|w| w.entities().clone()).unwrap_or_default()
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

    pub fn start_date_time(&self) -> &str {
        &self.start_date_time
    }

    pub fn end_date_time(&self) -> &str {
        &self.end_date_time
    }

    pub fn owns_timer(&self, id: TimerId) -> bool {
        self.task.owns_timer(id)
    }

    pub fn abort_steps(&self) -> Vec<StrategyStep> {
        self.work()
            .map(|w| w.abort_steps().into_iter().map(StrategyStep::new).collect())
            .unwrap_or_default()
    }

    /// Start the step; a finished step has its result recorded
    pub fn apply(&mut self, ctx: &mut Context<'_>) -> Progress {
        self.start_date_time = ctx.date_time.clone();
        self.end_date_time.clear();
        self.result = TaskResult::Inprogress;
        self.reason.clear();
        let progress = self.task.start(ctx);
        self.record(&progress, ctx);
        progress
    }

    pub fn handle_event(&mut self, event: &StrategyEvent, ctx: &mut Context<'_>) -> Option<Progress> {
        let progress = self.task.handle_event(event, ctx)?;
        self.record(&progress, ctx);
        Some(progress)
    }

    pub fn handle_timer(&mut self, id: TimerId, ctx: &mut Context<'_>) -> Option<Progress> {
        let progress = self.task.handle_timer(id, ctx)?;
        self.record(&progress, ctx);
        Some(progress)
    }

    /// Stop a waiting step without reporting completion
    pub fn abort(&mut self, ctx: &mut Context<'_>) {
        if self.task.inprogress() {
            self.task.abort(ctx);
        }
    }

    pub fn refresh_timeouts(&mut self, ctx: &mut Context<'_>) {
        self.task.refresh_timeouts(ctx);
    }

    fn record(&mut self, progress: &Progress, ctx: &Context<'_>) {
        if let Progress::Done(outcome) = progress {
            self.result = outcome.result;
            self.reason = outcome.reason.clone();
            self.end_date_time = ctx.date_time.clone();
            tracing::debug!(step = %self.name(), result = %self.result, reason = %self.reason, "step complete");
        }
    }
}

/// Persisted form of a [`StrategyStep`]
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StepRecord {
    step_id: usize,
    #[serde(flatten)]
    work: StepWork,
    timeout: u64,
    #[serde(default)]
    start_date_time: String,
    #[serde(default)]
    end_date_time: String,
    #[serde(default)]
    result: TaskResult,
    #[serde(default)]
    reason: String,
}

#[derive(Serialize)]
#[serde(rename_all = "kebab-case")]
struct StepRecordRef<'a> {
    step_id: usize,
    #[serde(flatten)]
    work: Option<&'a StepWork>,
    timeout: u64,
    start_date_time: &'a str,
    end_date_time: &'a str,
    result: TaskResult,
    reason: &'a str,
}

impl Serialize for StrategyStep {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        StepRecordRef {
            step_id: self.id,
            work: self.work(),
            timeout: self.timeout_secs,
            start_date_time: &self.start_date_time,
            end_date_time: &self.end_date_time,
            result: self.result,
            reason: &self.reason,
        }
        .serialize(serializer)
    }
}

impl From<StepRecord> for StrategyStep {
    fn from(record: StepRecord) -> Self {
        let mut work = record.work;
        work.restore_timeout(record.timeout);
        let mut step = StrategyStep::new(work);
        step.id = record.step_id;
        step.result = record.result;
        step.reason = record.reason;
        step.start_date_time = record.start_date_time;
        step.end_date_time = record.end_date_time;
        step
    }
}

#[cfg(test)]
#[path = "step_tests.rs"]
mod tests;
