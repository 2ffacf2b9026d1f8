// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Side effects requested by the engine
//!
//! The engine stays free of I/O: NFVI requests, alarms and customer
//! logs are queued here and executed by the daemon.

use crate::id::RequestId;
use crate::nfvi::NfviOp;
use crate::sw_update::{SwUpdateAlarm, SwUpdateEventLog};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Issue a request to the infrastructure
    Nfvi { request_id: RequestId, op: NfviOp },
    RaiseAlarm(SwUpdateAlarm),
    ClearAlarm(SwUpdateAlarm),
    /// Write a customer event log
    LogEvent { event: SwUpdateEventLog, reason: String },
}

impl Effect {
    pub fn name(&self) -> &'static str {
        match self {
            Effect::Nfvi { .. } => "nfvi",
            Effect::RaiseAlarm(_) => "raise-alarm",
            Effect::ClearAlarm(_) => "clear-alarm",
            Effect::LogEvent { .. } => "log-event",
        }
    }
}
