// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The software-update object: one strategy plus the alarms, customer
//! logs and periodic audit that accompany applying it

mod alarm;
mod builder;
mod host_lists;
mod params;
mod sw_patch;
mod sw_upgrade;

pub use alarm::{AlarmCondition, AutoApplyEvent, SwUpdateAlarm, SwUpdateEventLog};
pub use builder::{
    builder_for, BuildInput, StrategyBuilder, SW_PATCH_CONTROLLERS, SW_PATCH_QUERY,
    SW_PATCH_STORAGE_HOSTS, SW_PATCH_SWIFT_HOSTS, SW_PATCH_WORKER_HOSTS, SW_UPGRADE_COMPLETE,
    SW_UPGRADE_CONTROLLERS, SW_UPGRADE_QUERY, SW_UPGRADE_STORAGE_HOSTS, SW_UPGRADE_WORKER_HOSTS,
};
pub use params::{AlarmRestrictions, ApplyType, InstanceAction, SwUpdateParams, SwUpdateType};
pub use sw_patch::SwPatchBuilder;
pub use sw_upgrade::SwUpgradeBuilder;

use crate::config::SwMgmtConfig;
use crate::effect::Effect;
use crate::event::StrategyEvent;
use crate::id::RequestId;
use crate::inventory::Inventory;
use crate::nfvi::{HostSwPatch, NfviOp, NfviResponse};
use crate::strategy::{Context, Findings, Strategy, StrategyNotice, StrategyState, TaskResult};
use crate::timers::{TimerId, Timers};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

const AUDIT_INTERVAL: Duration = Duration::from_secs(30);
/// Delay between the audit's alarm query and its next stage
const AUDIT_FOLLOW_UP: Duration = Duration::from_secs(2);

/// What the director lends a sw-update object for one operation
pub struct Env<'a> {
    pub now: Instant,
    pub date_time: String,
    pub timers: &'a mut Timers,
    pub inventory: &'a Inventory,
    pub effects: &'a mut Vec<Effect>,
    pub next_request: &'a mut u64,
}

impl Env<'_> {
    fn request(&mut self, op: NfviOp) -> RequestId {
        *self.next_request += 1;
        let request_id = RequestId(*self.next_request);
        tracing::debug!(%request_id, op = op.name(), "audit request");
        self.effects.push(Effect::Nfvi { request_id, op });
        request_id
    }
}

/// Persisted form of a sw-update object
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwUpdateRecord {
    pub sw_update_type: SwUpdateType,
    pub uuid: String,
    pub params: SwUpdateParams,
    #[serde(default)]
    pub findings: Findings,
    pub strategy: Strategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum AuditState {
    #[default]
    Idle,
    Alarms(RequestId),
    AlarmsDone,
    PatchHosts(RequestId),
    PatchHostsDone,
}

#[derive(Debug, Default)]
struct Audit {
    timer: Option<TimerId>,
    state: AuditState,
    sw_patch_hosts: Vec<HostSwPatch>,
}

#[derive(Debug)]
pub struct SwUpdate {
    sw_update_type: SwUpdateType,
    params: SwUpdateParams,
    settings: SwMgmtConfig,
    ignore_alarms: Vec<String>,
    findings: Findings,
    strategy: Strategy,
    raised: Option<SwUpdateAlarm>,
    audit: Audit,
    dirty: bool,
}

impl SwUpdate {
    /// Create a strategy and start building it.
    /// Returns the reason when the parameters are refused outright.
    pub fn create(
        uuid: impl Into<String>,
        params: SwUpdateParams,
        settings: &SwMgmtConfig,
        env: &mut Env<'_>,
    ) -> Result<Self, String> {
        if params.sw_update_type == SwUpdateType::SwUpgrade && params.start_upgrade {
            return Err("start upgrade is not supported".to_string());
        }

        let kind = builder_for(params.sw_update_type);
        let ignore_alarms = builder::ignore_alarms(kind, &settings.ignore_alarms);
        let mut strategy = Strategy::new(uuid, params.sw_update_type.as_str());
        strategy
            .build_phase_mut()
            .add_stage(kind.query_stage(&ignore_alarms));

        let mut sw_update = Self::assemble(params, settings, ignore_alarms, Findings::default(), strategy);
        tracing::info!(
            strategy = %sw_update.uuid(),
            sw_update_type = %sw_update.sw_update_type,
            "strategy created"
        );
        sw_update.start_audit(env);
        let notices = sw_update.with_strategy(env, |strategy, ctx| strategy.build(ctx));
        sw_update.dirty = true;
        sw_update.handle_notices(notices, env);
        Ok(sw_update)
    }

    /// Bring back a persisted object. Steps that were in flight are not
    /// resumed; their phase and stage timers are re-armed so they run out.
    pub fn restore(record: SwUpdateRecord, settings: &SwMgmtConfig, env: &mut Env<'_>) -> Self {
        let kind = builder_for(record.sw_update_type);
        let ignore_alarms = builder::ignore_alarms(kind, &settings.ignore_alarms);
        let mut sw_update = Self::assemble(
            record.params,
            settings,
            ignore_alarms,
            record.findings,
            record.strategy,
        );
        tracing::info!(
            strategy = %sw_update.uuid(),
            state = %sw_update.strategy.state(),
            "strategy restored"
        );
        sw_update.with_strategy(env, |strategy, ctx| strategy.refresh_timeouts(ctx));
        sw_update.start_audit(env);
        sw_update
    }

    fn assemble(
        params: SwUpdateParams,
        settings: &SwMgmtConfig,
        ignore_alarms: Vec<String>,
        findings: Findings,
        strategy: Strategy,
    ) -> Self {
        Self {
            sw_update_type: params.sw_update_type,
            params,
            settings: settings.clone(),
            ignore_alarms,
            findings,
            strategy,
            raised: None,
            audit: Audit::default(),
            dirty: false,
        }
    }

    pub fn sw_update_type(&self) -> SwUpdateType {
        self.sw_update_type
    }

    pub fn uuid(&self) -> &str {
        self.strategy.uuid()
    }

    pub fn params(&self) -> &SwUpdateParams {
        &self.params
    }

    pub fn findings(&self) -> &Findings {
        &self.findings
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    pub fn ignore_alarms(&self) -> &[String] {
        &self.ignore_alarms
    }

    /// The orchestration alarm currently raised, if any
    pub fn raised_alarm(&self) -> Option<SwUpdateAlarm> {
        self.raised
    }

    pub fn audit_timer(&self) -> Option<TimerId> {
        self.audit.timer
    }

    pub fn record(&self) -> SwUpdateRecord {
        SwUpdateRecord {
            sw_update_type: self.sw_update_type,
            uuid: self.uuid().to_string(),
            params: self.params.clone(),
            findings: self.findings.clone(),
            strategy: self.strategy.clone(),
        }
    }

    /// True while a change has not reached the store
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    /// Strategy JSON as shown to clients, with the create parameters
    pub fn to_wire(&self) -> Result<serde_json::Value, serde_json::Error> {
        let mut value = serde_json::to_value(&self.strategy)?;
        if let Some(object) = value.as_object_mut() {
            let params = &self.params;
            object.insert("controller_apply_type".into(), params.controller_apply_type.as_str().into());
            object.insert("storage_apply_type".into(), params.storage_apply_type.as_str().into());
            object.insert("swift_apply_type".into(), params.swift_apply_type.as_str().into());
            object.insert("worker_apply_type".into(), params.worker_apply_type.as_str().into());
            object.insert("max_parallel_worker_hosts".into(), params.max_parallel_worker_hosts.into());
            object.insert("default_instance_action".into(), params.default_instance_action.as_str().into());
            object.insert("alarm_restrictions".into(), params.alarm_restrictions.as_str().into());
        }
        Ok(value)
    }

    pub fn apply(&mut self, uuid: &str, stage_id: Option<usize>, env: &mut Env<'_>) -> Result<(), String> {
        if uuid != self.uuid() {
            return Err("strategy does not exist".to_string());
        }
        self.log_event(AutoApplyEvent::Start, "", env);

        match self.with_strategy(env, |strategy, ctx| strategy.apply(stage_id, ctx)) {
            Ok(notices) => {
                self.clear_alarm(env);
                self.raise_alarm(AlarmCondition::Inprogress, env);
                self.log_event(AutoApplyEvent::Inprogress, "", env);
                self.start_audit(env);
                self.handle_notices(notices, env);
                Ok(())
            }
            Err(reason) => {
                tracing::info!(strategy = %self.uuid(), ?stage_id, %reason, "apply rejected");
                self.log_event(AutoApplyEvent::Rejected, &reason, env);
                Err(reason)
            }
        }
    }

    pub fn abort(&mut self, uuid: &str, stage_id: Option<usize>, env: &mut Env<'_>) -> Result<(), String> {
        if uuid != self.uuid() {
            return Err("strategy does not exist".to_string());
        }
        self.log_event(AutoApplyEvent::Abort, "", env);

        match self.with_strategy(env, |strategy, ctx| strategy.abort(stage_id, ctx)) {
            Ok(notices) => {
                self.clear_alarm(env);
                self.raise_alarm(AlarmCondition::Aborting, env);
                self.log_event(AutoApplyEvent::Aborting, "", env);
                self.handle_notices(notices, env);
                Ok(())
            }
            Err(reason) => {
                tracing::info!(strategy = %self.uuid(), ?stage_id, %reason, "abort rejected");
                self.log_event(AutoApplyEvent::AbortRejected, &reason, env);
                Err(reason)
            }
        }
    }

    /// Checks whether the object may be dropped, and releases what it holds
    /// The reason a delete would be refused, without changing anything
    pub fn check_delete(&self, uuid: &str, force: bool) -> Result<(), String> {
        if uuid != self.uuid() {
            return Err("strategy does not exist".to_string());
        }
        if !force {
            match self.strategy.state() {
                StrategyState::Building => return Err("strategy is being built, can't delete".to_string()),
                StrategyState::Applying => return Err("strategy is being applied, can't delete".to_string()),
                StrategyState::Aborting => return Err("strategy is being aborted, can't delete".to_string()),
                _ => {}
            }
        }
        Ok(())
    }

    pub fn delete(&mut self, uuid: &str, force: bool, env: &mut Env<'_>) -> Result<(), String> {
        self.check_delete(uuid, force)?;
        tracing::info!(strategy = %self.uuid(), force, "strategy deleted");
        self.clear_alarm(env);
        self.stop_audit(env);
        Ok(())
    }

    pub fn handle_event(&mut self, event: &StrategyEvent, env: &mut Env<'_>) {
        let notices = self.with_strategy(env, |strategy, ctx| strategy.handle_event(event, ctx));
        self.handle_notices(notices, env);
    }

    /// Returns false if the timer belongs to neither the audit nor the strategy
    pub fn handle_timer(&mut self, id: TimerId, env: &mut Env<'_>) -> bool {
        if self.audit.timer == Some(id) {
            self.audit_tick(env);
            return true;
        }
        match self.with_strategy(env, |strategy, ctx| strategy.handle_timer(id, ctx)) {
            Some(notices) => {
                self.handle_notices(notices, env);
                true
            }
            None => false,
        }
    }

    /// Answers to audit queries stay here; everything else goes to the strategy
    pub fn nfvi_response(&mut self, request_id: RequestId, response: NfviResponse, env: &mut Env<'_>) {
        match self.audit.state {
            AuditState::Alarms(id) if id == request_id => {
                match &response {
                    NfviResponse::Alarms(alarms) => {
                        tracing::debug!(alarms = alarms.len(), "audit alarms");
                    }
                    other => tracing::error!(response = ?other, "audit alarms not completed"),
                }
                self.audit.state = AuditState::AlarmsDone;
                self.reschedule_audit(AUDIT_FOLLOW_UP, env);
            }
            AuditState::PatchHosts(id) if id == request_id => {
                match response {
                    NfviResponse::SwPatchHosts(hosts) => self.audit.sw_patch_hosts = hosts,
                    other => tracing::error!(response = ?other, "audit sw-patch hosts not completed"),
                }
                self.audit.state = AuditState::PatchHostsDone;
                self.reschedule_audit(AUDIT_INTERVAL, env);
            }
            _ => {
                let event = StrategyEvent::NfviResponse { request_id, response };
                self.handle_event(&event, env);
            }
        }
    }

    fn with_strategy<R>(
        &mut self,
        env: &mut Env<'_>,
        f: impl FnOnce(&mut Strategy, &mut Context<'_>) -> R,
    ) -> R {
        let mut ctx = Context::new(
            env.now,
            env.date_time.clone(),
            &mut *env.timers,
            env.inventory,
            &mut self.findings,
            self.params.alarm_restrictions,
            &mut *env.effects,
            &mut *env.next_request,
        );
        let result = f(&mut self.strategy, &mut ctx);
        if ctx.save_requested() {
            self.dirty = true;
        }
        result
    }

    fn handle_notices(&mut self, notices: Vec<StrategyNotice>, env: &mut Env<'_>) {
        for notice in notices {
            match notice {
                StrategyNotice::BuildComplete(outcome) => {
                    if self.strategy.state() == StrategyState::ReadyToApply {
                        self.build_complete(env);
                    } else {
                        tracing::warn!(strategy = %self.uuid(), reason = %outcome.reason, "strategy build failed");
                    }
                }
                StrategyNotice::ApplyComplete(outcome) => {
                    self.clear_alarm(env);
                    if matches!(outcome.result, TaskResult::Success | TaskResult::Degraded) {
                        self.log_event(AutoApplyEvent::Completed, "", env);
                    } else {
                        self.raise_alarm(AlarmCondition::Failed, env);
                        self.log_event(AutoApplyEvent::Failed, &outcome.reason, env);
                    }
                }
                StrategyNotice::AbortComplete(outcome) => {
                    if matches!(
                        outcome.result,
                        TaskResult::Success | TaskResult::Degraded | TaskResult::Aborted
                    ) {
                        self.log_event(AutoApplyEvent::Aborted, "", env);
                    } else {
                        self.log_event(AutoApplyEvent::AbortFailed, &outcome.reason, env);
                    }
                    self.reschedule_audit(AUDIT_FOLLOW_UP, env);
                }
            }
        }
    }

    /// Lay out the apply phase from what the build phase found
    fn build_complete(&mut self, env: &Env<'_>) {
        let stages = builder_for(self.sw_update_type).apply_stages(&BuildInput {
            params: &self.params,
            settings: &self.settings,
            inventory: env.inventory,
            findings: &self.findings,
            ignore_alarms: &self.ignore_alarms,
        });

        match stages {
            Ok(stages) => {
                tracing::info!(strategy = %self.uuid(), stages = stages.len(), "strategy ready to apply");
                let phase = self.strategy.apply_phase_mut();
                for stage in stages {
                    phase.add_stage(stage);
                }
            }
            Err(reason) => {
                tracing::warn!(strategy = %self.uuid(), %reason, "strategy build failed");
                self.strategy.build_failed(reason);
            }
        }
        self.dirty = true;
    }

    fn raise_alarm(&mut self, condition: AlarmCondition, env: &mut Env<'_>) {
        let alarm = SwUpdateAlarm::new(self.sw_update_type, condition);
        tracing::info!(alarm = %alarm.alarm_type(), "raise alarm");
        self.raised = Some(alarm);
        env.effects.push(Effect::RaiseAlarm(alarm));
    }

    fn clear_alarm(&mut self, env: &mut Env<'_>) {
        if let Some(alarm) = self.raised.take() {
            tracing::info!(alarm = %alarm.alarm_type(), "clear alarm");
            env.effects.push(Effect::ClearAlarm(alarm));
        }
    }

    fn log_event(&self, event: AutoApplyEvent, reason: &str, env: &mut Env<'_>) {
        env.effects.push(Effect::LogEvent {
            event: SwUpdateEventLog::new(self.sw_update_type, event),
            reason: reason.to_string(),
        });
    }

    fn audit_timer_name(&self) -> String {
        format!("{} nfvi audit", self.sw_update_type)
    }

    /// (Re)start the repeating audit from scratch
    fn start_audit(&mut self, env: &mut Env<'_>) {
        self.stop_audit(env);
        let id = env
            .timers
            .create_timer(&self.audit_timer_name(), AUDIT_INTERVAL, AUDIT_INTERVAL, env.now);
        self.audit.timer = Some(id);
    }

    fn stop_audit(&mut self, env: &mut Env<'_>) {
        if let Some(id) = self.audit.timer.take() {
            env.timers.delete_timer(id);
        }
        self.audit.state = AuditState::Idle;
    }

    fn reschedule_audit(&mut self, delay: Duration, env: &mut Env<'_>) {
        if let Some(id) = self.audit.timer {
            env.timers.reschedule_timer(id, delay, env.now);
        }
    }

    fn audit_tick(&mut self, env: &mut Env<'_>) {
        match self.audit.state {
            AuditState::Idle => {
                tracing::info!(sw_update_type = %self.sw_update_type, "audit alarms");
                self.audit.state = AuditState::Alarms(env.request(NfviOp::GetAlarms));
            }
            AuditState::Alarms(_) | AuditState::PatchHosts(_) => {
                tracing::debug!("audit query in flight");
            }
            AuditState::AlarmsDone if self.sw_update_type == SwUpdateType::SwPatch => {
                tracing::info!("audit software patch hosts");
                self.audit.state = AuditState::PatchHosts(env.request(NfviOp::GetSwPatchHosts));
            }
            AuditState::AlarmsDone | AuditState::PatchHostsDone => {
                self.audit.state = AuditState::Idle;
                if !self.reconcile_alarms(env) {
                    tracing::info!(sw_update_type = %self.sw_update_type, "audit no longer needed");
                    self.stop_audit(env);
                }
            }
        }
    }

    /// Keep the raised alarm in line with the strategy state.
    /// Returns whether the audit should keep running.
    fn reconcile_alarms(&mut self, env: &mut Env<'_>) -> bool {
        let condition = match self.strategy.state() {
            StrategyState::Applying => AlarmCondition::Inprogress,
            StrategyState::ApplyFailed | StrategyState::ApplyTimeout => {
                // A patch that failed without leaving a host awaiting reboot
                // leaves nothing for the operator to act on
                let pending_reboot = self
                    .audit
                    .sw_patch_hosts
                    .iter()
                    .any(|h| !h.patch_current && h.requires_reboot);
                if self.sw_update_type == SwUpdateType::SwPatch && !pending_reboot {
                    self.clear_alarm(env);
                    return false;
                }
                AlarmCondition::Failed
            }
            StrategyState::Aborting => AlarmCondition::Aborting,
            _ => {
                self.clear_alarm(env);
                return false;
            }
        };

        if self.raised.is_none() {
            self.raise_alarm(condition, env);
            let event = match condition {
                AlarmCondition::Inprogress => AutoApplyEvent::Inprogress,
                AlarmCondition::Aborting => AutoApplyEvent::Aborting,
                AlarmCondition::Failed => AutoApplyEvent::Failed,
            };
            self.log_event(event, "", env);
        }
        true
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
