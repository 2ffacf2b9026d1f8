// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Everything a strategy operation may touch besides its own state

use crate::effect::Effect;
use crate::id::RequestId;
use crate::inventory::Inventory;
use crate::nfvi::{Alarm, HostSwPatch, NfviOp, SwPatch, Upgrade};
use crate::sw_update::AlarmRestrictions;
use crate::timers::{TimerId, Timers};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Query results gathered by build and apply steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Findings {
    #[serde(default)]
    pub alarms: Vec<Alarm>,
    #[serde(default)]
    pub sw_patches: Vec<SwPatch>,
    #[serde(default)]
    pub sw_patch_hosts: Vec<HostSwPatch>,
    #[serde(default)]
    pub upgrade: Option<Upgrade>,
}

/// Borrowed view of the owning sw-update object and director
pub struct Context<'a> {
    pub now: Instant,
    pub date_time: String,
    pub timers: &'a mut Timers,
    pub inventory: &'a Inventory,
    pub findings: &'a mut Findings,
    pub alarm_restrictions: AlarmRestrictions,
    effects: &'a mut Vec<Effect>,
    next_request: &'a mut u64,
    save_requested: bool,
}

impl<'a> Context<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        now: Instant,
        date_time: String,
        timers: &'a mut Timers,
        inventory: &'a Inventory,
        findings: &'a mut Findings,
        alarm_restrictions: AlarmRestrictions,
        effects: &'a mut Vec<Effect>,
        next_request: &'a mut u64,
    ) -> Self {
        Self {
            now,
            date_time,
            timers,
            inventory,
            findings,
            alarm_restrictions,
            effects,
            next_request,
            save_requested: false,
        }
    }

    /// Queue an NFVI request and return its correlation id
    pub fn request(&mut self, op: NfviOp) -> RequestId {
        *self.next_request += 1;
        let request_id = RequestId(*self.next_request);
        tracing::debug!(%request_id, op = op.name(), "nfvi request");
        self.effects.push(Effect::Nfvi { request_id, op });
        request_id
    }

    pub fn emit(&mut self, effect: Effect) {
        self.effects.push(effect);
    }

    /// Arm a one-shot timer
    pub fn arm_timer(&mut self, name: &str, secs: u64) -> TimerId {
        self.timers
            .create_timer(name, Duration::from_secs(secs), Duration::ZERO, self.now)
    }

    /// Delete the timer held in `slot`, if any
    pub fn cancel_timer(&mut self, slot: &mut Option<TimerId>) {
        if let Some(id) = slot.take() {
            self.timers.delete_timer(id);
        }
    }

    /// Ask the owner to persist the strategy before returning
    pub fn save(&mut self) {
        self.save_requested = true;
    }

    pub fn save_requested(&self) -> bool {
        self.save_requested
    }
}
