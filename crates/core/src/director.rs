// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Software management director
//!
//! Owns the single sw-update object and everything it borrows while
//! running: timers, the inventory, queued effects and the store. At most
//! one strategy of either kind exists at a time.

use crate::clock::Clock;
use crate::config::SwMgmtConfig;
use crate::effect::Effect;
use crate::event::StrategyEvent;
use crate::id::{IdGen, RequestId};
use crate::inventory::Inventory;
use crate::nfvi::{Host, HostAggregate, HostGroup, Instance, InstanceGroup, NfviResponse};
use crate::storage::{StorageError, SwUpdateStore};
use crate::sw_update::{Env, SwUpdate, SwUpdateParams, SwUpdateType};
use crate::timers::Timers;
use std::time::Instant;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DirectorError {
    /// Refused by a guard; the text goes back to the operator as is
    #[error("{0}")]
    Rejected(String),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl DirectorError {
    fn rejected(reason: impl Into<String>) -> Self {
        DirectorError::Rejected(reason.into())
    }
}

/// Delivered to the creator once the build has started
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyReply {
    pub success: bool,
    pub reason: String,
    /// Wire form of the new strategy
    pub strategy: Option<serde_json::Value>,
}

pub struct Director<S: SwUpdateStore, C: Clock, G: IdGen> {
    settings: SwMgmtConfig,
    store: S,
    clock: C,
    ids: G,
    timers: Timers,
    inventory: Inventory,
    sw_update: Option<SwUpdate>,
    effects: Vec<Effect>,
    next_request: u64,
}

impl<S: SwUpdateStore, C: Clock, G: IdGen> Director<S, C, G> {
    /// Start a director, bringing back whatever strategy the store holds
    pub fn open(settings: SwMgmtConfig, store: S, clock: C, ids: G) -> Result<Self, DirectorError> {
        let mut records = store.load_all()?;
        if records.len() > 1 {
            tracing::error!(count = records.len(), "more than one software update found");
        }

        let mut director = Self {
            settings,
            store,
            clock,
            ids,
            timers: Timers::new(),
            inventory: Inventory::new(),
            sw_update: None,
            effects: Vec::new(),
            next_request: 0,
        };

        if let Some(record) = records.pop() {
            let now = director.clock.now();
            let date_time = director.clock.date_time();
            let mut env = Env {
                now,
                date_time,
                timers: &mut director.timers,
                inventory: &director.inventory,
                effects: &mut director.effects,
                next_request: &mut director.next_request,
            };
            director.sw_update = Some(SwUpdate::restore(record, &director.settings, &mut env));
        }
        Ok(director)
    }

    pub fn settings(&self) -> &SwMgmtConfig {
        &self.settings
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    /// When the next timer is due, for sleeping between ticks
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timers.next_fire_time()
    }

    /// Effects queued since the last call
    pub fn take_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    /// Returns the new strategy's uuid, or why it was refused.
    /// `callback` runs unless a strategy already exists.
    ///
    /// A strategy whose first save fails is dropped again, so nothing
    /// runs that the store does not know about.
    pub fn create_strategy(
        &mut self,
        params: SwUpdateParams,
        callback: impl FnOnce(StrategyReply),
    ) -> Result<String, DirectorError> {
        if self.sw_update.is_some() {
            tracing::info!(sw_update_type = %params.sw_update_type, "strategy already exists");
            return Err(DirectorError::rejected("strategy already exists"));
        }

        let uuid = self.ids.next_uuid();
        let mark = self.effects.len();
        let mut env = Env {
            now: self.clock.now(),
            date_time: self.clock.date_time(),
            timers: &mut self.timers,
            inventory: &self.inventory,
            effects: &mut self.effects,
            next_request: &mut self.next_request,
        };
        let created = SwUpdate::create(uuid.clone(), params, &self.settings, &mut env);
        let error = match created {
            Ok(sw_update) => {
                let strategy = sw_update.to_wire().ok();
                self.sw_update = Some(sw_update);
                match self.persist() {
                    Ok(()) => {
                        callback(StrategyReply {
                            success: true,
                            reason: String::new(),
                            strategy,
                        });
                        return Ok(uuid);
                    }
                    Err(e) => {
                        self.discard(mark);
                        DirectorError::Storage(e)
                    }
                }
            }
            Err(reason) => {
                tracing::info!(strategy = %uuid, %reason, "strategy create refused");
                DirectorError::Rejected(reason)
            }
        };
        callback(StrategyReply {
            success: false,
            reason: error.to_string(),
            strategy: None,
        });
        Err(error)
    }

    pub fn apply_strategy(&mut self, uuid: &str, stage_id: Option<usize>) -> Result<(), DirectorError> {
        let (result, saved) = self
            .route(|sw_update, env| sw_update.apply(uuid, stage_id, env))
            .ok_or_else(|| DirectorError::rejected("strategy not created"))?;
        saved?;
        result.map_err(DirectorError::Rejected)
    }

    pub fn abort_strategy(&mut self, uuid: &str, stage_id: Option<usize>) -> Result<(), DirectorError> {
        let (result, saved) = self
            .route(|sw_update, env| sw_update.abort(uuid, stage_id, env))
            .ok_or_else(|| DirectorError::rejected("strategy not created"))?;
        saved?;
        result.map_err(DirectorError::Rejected)
    }

    /// The record goes first; if the store keeps it, so does the director
    pub fn delete_strategy(&mut self, uuid: &str, force: bool) -> Result<(), DirectorError> {
        let sw_update = self
            .sw_update
            .as_ref()
            .ok_or_else(|| DirectorError::rejected("strategy not created"))?;
        sw_update.check_delete(uuid, force).map_err(DirectorError::Rejected)?;

        if let Err(e) = self.store.delete(uuid) {
            tracing::error!(strategy = %uuid, error = %e, "failed to remove strategy record");
            return Err(e.into());
        }

        if let Some(mut sw_update) = self.sw_update.take() {
            let mut env = Env {
                now: self.clock.now(),
                date_time: self.clock.date_time(),
                timers: &mut self.timers,
                inventory: &self.inventory,
                effects: &mut self.effects,
                next_request: &mut self.next_request,
            };
            sw_update.delete(uuid, force, &mut env).map_err(DirectorError::Rejected)?;
        }
        Ok(())
    }

    /// The current strategy, if it is of `sw_update_type`
    pub fn get_strategy(&self, sw_update_type: SwUpdateType) -> Option<&SwUpdate> {
        self.sw_update
            .as_ref()
            .filter(|sw_update| sw_update.sw_update_type() == sw_update_type)
    }

    pub fn host_lock_failed(&mut self, host: Host) {
        self.host_event(host, |host_name| StrategyEvent::HostLockFailed { host_name });
    }

    pub fn host_unlock_failed(&mut self, host: Host) {
        self.host_event(host, |host_name| StrategyEvent::HostUnlockFailed { host_name });
    }

    pub fn host_reboot_failed(&mut self, host: Host) {
        self.host_event(host, |host_name| StrategyEvent::HostRebootFailed { host_name });
    }

    pub fn host_swact_failed(&mut self, host: Host) {
        self.host_event(host, |host_name| StrategyEvent::HostSwactFailed { host_name });
    }

    pub fn host_upgrade_failed(&mut self, host: Host) {
        self.host_event(host, |host_name| StrategyEvent::HostUpgradeFailed { host_name });
    }

    pub fn disable_host_services_failed(&mut self, host: Host) {
        self.host_event(host, |host_name| StrategyEvent::DisableHostServicesFailed { host_name });
    }

    pub fn enable_host_services_failed(&mut self, host: Host) {
        self.host_event(host, |host_name| StrategyEvent::EnableHostServicesFailed { host_name });
    }

    pub fn host_audit(&mut self, host: Host) {
        self.host_event(host, |_| StrategyEvent::HostAudit);
    }

    pub fn host_state_change(&mut self, host: Host) {
        self.host_event(host, |host_name| StrategyEvent::HostStateChanged { host_name });
    }

    pub fn instance_audit(&mut self, instance: Instance) {
        self.inventory.upsert_instance(instance);
        self.handle_event(StrategyEvent::InstanceAudit);
    }

    pub fn instance_state_change(&mut self, instance: Instance) {
        let instance_name = instance.name.clone();
        self.inventory.upsert_instance(instance);
        self.handle_event(StrategyEvent::InstanceStateChanged { instance_name });
    }

    pub fn migrate_instances_failed(&mut self, reason: impl Into<String>) {
        self.handle_event(StrategyEvent::MigrateInstancesFailed { reason: reason.into() });
    }

    /// Swap in a fresh inventory snapshot without notifying the strategy
    pub fn replace_inventory(&mut self, hosts: Vec<Host>, instances: Vec<Instance>) {
        self.inventory.replace(hosts, instances);
    }

    pub fn replace_groups(
        &mut self,
        instance_groups: Vec<InstanceGroup>,
        host_groups: Vec<HostGroup>,
        host_aggregates: Vec<HostAggregate>,
    ) {
        let inventory = std::mem::take(&mut self.inventory);
        self.inventory = inventory
            .with_instance_groups(instance_groups)
            .with_host_groups(host_groups)
            .with_host_aggregates(host_aggregates);
    }

    /// Deliver the answer to an NFVI request
    pub fn nfvi_response(&mut self, request_id: RequestId, response: NfviResponse) {
        let routed = self.route(|sw_update, env| sw_update.nfvi_response(request_id, response, env));
        if routed.is_none() {
            tracing::debug!(%request_id, "nfvi response with no strategy, dropped");
        }
    }

    /// Fire every timer that has come due, then retry any save that
    /// failed earlier
    pub fn tick(&mut self) {
        let fired = self.timers.poll(self.clock.now());
        for timer in fired {
            let handled = self
                .route(|sw_update, env| sw_update.handle_timer(timer.id, env))
                .is_some_and(|(handled, _)| handled);
            if !handled {
                tracing::debug!(timer = %timer.name, "timer fired with no owner");
            }
        }
        let _ = self.persist();
    }

    /// Whether the store is behind the strategy held in memory
    pub fn save_pending(&self) -> bool {
        self.sw_update.as_ref().is_some_and(SwUpdate::is_dirty)
    }

    fn host_event(&mut self, host: Host, event: impl FnOnce(String) -> StrategyEvent) {
        let event = event(host.name.clone());
        self.inventory.upsert_host(host);
        self.handle_event(event);
    }

    fn handle_event(&mut self, event: StrategyEvent) {
        tracing::debug!(event = event.name(), "strategy event");
        // A failed save stays pending for the next call
        let _ = self.route(|sw_update, env| sw_update.handle_event(&event, env));
    }

    /// Run `f` against the current sw-update object, then persist it if
    /// anything changed. None when there is no strategy.
    fn route<R>(
        &mut self,
        f: impl FnOnce(&mut SwUpdate, &mut Env<'_>) -> R,
    ) -> Option<(R, Result<(), StorageError>)> {
        let sw_update = self.sw_update.as_mut()?;
        let mut env = Env {
            now: self.clock.now(),
            date_time: self.clock.date_time(),
            timers: &mut self.timers,
            inventory: &self.inventory,
            effects: &mut self.effects,
            next_request: &mut self.next_request,
        };
        let result = f(sw_update, &mut env);
        Some((result, self.persist()))
    }

    /// Write the record at most once per call. The object stays dirty
    /// until a save succeeds.
    fn persist(&mut self) -> Result<(), StorageError> {
        let Some(sw_update) = self.sw_update.as_mut() else {
            return Ok(());
        };
        if !sw_update.is_dirty() {
            return Ok(());
        }
        match self.store.save(&sw_update.record()) {
            Ok(()) => {
                sw_update.mark_saved();
                Ok(())
            }
            Err(e) => {
                tracing::error!(strategy = %sw_update.uuid(), error = %e, "failed to save strategy");
                Err(e)
            }
        }
    }

    /// Tear down a strategy that never reached the store, along with the
    /// effects its build queued
    fn discard(&mut self, mark: usize) {
        if let Some(mut sw_update) = self.sw_update.take() {
            let uuid = sw_update.uuid().to_string();
            let mut env = Env {
                now: self.clock.now(),
                date_time: self.clock.date_time(),
                timers: &mut self.timers,
                inventory: &self.inventory,
                effects: &mut self.effects,
                next_request: &mut self.next_request,
            };
            if let Err(reason) = sw_update.delete(&uuid, true, &mut env) {
                tracing::warn!(strategy = %uuid, %reason, "discard refused");
            }
        }
        self.effects.truncate(mark);
    }
}

#[cfg(test)]
#[path = "director_tests.rs"]
mod tests;
