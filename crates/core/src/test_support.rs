// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Builders shared by unit tests

use crate::clock::{Clock, FakeClock};
use crate::effect::Effect;
use crate::event::StrategyEvent;
use crate::id::RequestId;
use crate::inventory::Inventory;
use crate::nfvi::{AdminState, AvailStatus, Host, HostPersonality, Instance, NfviOp, OperState};
use crate::strategy::steps::Entities;
use crate::strategy::{Context, EventOutcome, Findings, TaskResult, TaskWork};
use crate::sw_update::AlarmRestrictions;
use crate::timers::{TimerId, Timers};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::Duration;

/// An unlocked-enabled-available host
pub fn host(name: &str, personality: &[HostPersonality]) -> Host {
    Host {
        uuid: format!("{}-uuid", name),
        name: name.to_string(),
        personality: personality.to_vec(),
        admin_state: AdminState::Unlocked,
        oper_state: OperState::Enabled,
        avail_status: AvailStatus::Available,
        software_load: "1.0".to_string(),
        target_load: "1.0".to_string(),
        services: BTreeMap::new(),
    }
}

pub fn locked_host(name: &str, personality: &[HostPersonality]) -> Host {
    Host {
        admin_state: AdminState::Locked,
        oper_state: OperState::Disabled,
        avail_status: AvailStatus::Online,
        ..host(name, personality)
    }
}

/// A running instance
pub fn instance(name: &str, host_name: &str) -> Instance {
    Instance {
        uuid: format!("{}-uuid", name),
        name: name.to_string(),
        host_name: host_name.to_string(),
        admin_state: AdminState::Unlocked,
        oper_state: OperState::Enabled,
    }
}

pub fn stopped_instance(name: &str, host_name: &str) -> Instance {
    Instance {
        admin_state: AdminState::Locked,
        oper_state: OperState::Disabled,
        ..instance(name, host_name)
    }
}

/// Owns everything a [`Context`] borrows so tests can drive the engine
pub struct Harness {
    pub clock: FakeClock,
    pub timers: Timers,
    pub inventory: Inventory,
    pub findings: Findings,
    pub alarm_restrictions: AlarmRestrictions,
    pub effects: Vec<Effect>,
    pub next_request: u64,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    pub fn new() -> Self {
        Self {
            clock: FakeClock::new(),
            timers: Timers::new(),
            inventory: Inventory::new(),
            findings: Findings::default(),
            alarm_restrictions: AlarmRestrictions::Strict,
            effects: Vec::new(),
            next_request: 0,
        }
    }

    pub fn with_inventory(inventory: Inventory) -> Self {
        Self {
            inventory,
            ..Self::new()
        }
    }

    pub fn ctx(&mut self) -> Context<'_> {
        Context::new(
            self.clock.now(),
            self.clock.date_time(),
            &mut self.timers,
            &self.inventory,
            &mut self.findings,
            self.alarm_restrictions,
            &mut self.effects,
            &mut self.next_request,
        )
    }

    /// Advance the clock and return the timers that came due
    pub fn advance(&mut self, secs: u64) -> Vec<TimerId> {
        self.clock.advance(Duration::from_secs(secs));
        self.timers
            .poll(self.clock.now())
            .into_iter()
            .map(|f| f.id)
            .collect()
    }

    /// Drain queued NFVI requests
    pub fn take_requests(&mut self) -> Vec<(RequestId, NfviOp)> {
        let mut requests = Vec::new();
        self.effects.retain(|effect| match effect {
            Effect::Nfvi { request_id, op } => {
                requests.push((*request_id, op.clone()));
                false
            }
            _ => true,
        });
        requests
    }
}

/// Shared record of what [`RecordingStep`]s did, in order
pub type Journal = Rc<RefCell<Vec<String>>>;

pub fn journal() -> Journal {
    Rc::new(RefCell::new(Vec::new()))
}

/// Step that journals every call. It finishes at once with `immediate`,
/// or waits until a host named after its label changes state and then
/// reports `result`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingStep {
    label: String,
    immediate: Option<TaskResult>,
    result: TaskResult,
    #[serde(skip)]
    entities: Entities,
    #[serde(skip)]
    journal: Journal,
}

impl RecordingStep {
    pub fn waiting(label: &str, result: TaskResult, journal: &Journal) -> Self {
        Self {
            label: label.to_string(),
            immediate: None,
            result,
            entities: Entities::none(),
            journal: Rc::clone(journal),
        }
    }

    pub fn immediate(label: &str, result: TaskResult, journal: &Journal) -> Self {
        Self {
            immediate: Some(result),
            ..Self::waiting(label, result, journal)
        }
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    fn note(&self, call: &str) {
        self.journal.borrow_mut().push(format!("{}:{}", call, self.label));
    }

    fn reason(&self, result: TaskResult) -> String {
        if result.is_failure() {
            format!("{} failed", self.label)
        } else {
            String::new()
        }
    }
}

impl TaskWork for RecordingStep {
    fn name(&self) -> &str {
        "recording"
    }

    fn timeout_secs(&self) -> u64 {
        60
    }

    fn run(&mut self, _ctx: &mut Context<'_>) -> (TaskResult, String) {
        self.note("start");
        match self.immediate {
            Some(result) => {
                self.note("done");
                (result, self.reason(result))
            }
            None => (TaskResult::Wait, String::new()),
        }
    }

    fn abort(&mut self, _ctx: &mut Context<'_>) {
        self.note("abort");
    }

    fn handle_event(&mut self, event: &StrategyEvent, _ctx: &mut Context<'_>) -> EventOutcome {
        match event {
            StrategyEvent::HostStateChanged { host_name } if *host_name == self.label => {
                self.note("done");
                EventOutcome::Complete(self.result, self.reason(self.result))
            }
            _ => EventOutcome::Ignored,
        }
    }
}
