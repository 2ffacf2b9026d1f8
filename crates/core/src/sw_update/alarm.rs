// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Alarms and customer event logs raised while a strategy is applied

use super::params::SwUpdateType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AlarmCondition {
    Inprogress,
    Aborting,
    Failed,
}

/// An orchestration alarm, scoped to the kind of update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwUpdateAlarm {
    pub sw_update_type: SwUpdateType,
    pub condition: AlarmCondition,
}

impl SwUpdateAlarm {
    pub fn new(sw_update_type: SwUpdateType, condition: AlarmCondition) -> Self {
        Self {
            sw_update_type,
            condition,
        }
    }

    /// e.g. `sw-patch-auto-apply-inprogress`
    pub fn alarm_type(&self) -> String {
        let condition = match self.condition {
            AlarmCondition::Inprogress => "inprogress",
            AlarmCondition::Aborting => "aborting",
            AlarmCondition::Failed => "failed",
        };
        format!("{}-auto-apply-{}", self.sw_update_type, condition)
    }

    pub fn entity(&self) -> String {
        format!("orchestration={}", self.sw_update_type)
    }

    pub fn reason_text(&self) -> String {
        let kind = match self.sw_update_type {
            SwUpdateType::SwPatch => "Software patch",
            SwUpdateType::SwUpgrade => "Software upgrade",
        };
        let condition = match self.condition {
            AlarmCondition::Inprogress => "inprogress",
            AlarmCondition::Aborting => "aborting",
            AlarmCondition::Failed => "failed",
        };
        format!("{} auto-apply {}", kind, condition)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AutoApplyEvent {
    Start,
    Inprogress,
    Rejected,
    Cancelled,
    Failed,
    Completed,
    Abort,
    Aborting,
    AbortRejected,
    AbortFailed,
    Aborted,
}

impl AutoApplyEvent {
    fn suffix(&self) -> &'static str {
        match self {
            AutoApplyEvent::Start => "start",
            AutoApplyEvent::Inprogress => "inprogress",
            AutoApplyEvent::Rejected => "rejected",
            AutoApplyEvent::Cancelled => "cancelled",
            AutoApplyEvent::Failed => "failed",
            AutoApplyEvent::Completed => "completed",
            AutoApplyEvent::Abort => "abort",
            AutoApplyEvent::Aborting => "aborting",
            AutoApplyEvent::AbortRejected => "abort-rejected",
            AutoApplyEvent::AbortFailed => "abort-failed",
            AutoApplyEvent::Aborted => "aborted",
        }
    }
}

/// A customer event log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SwUpdateEventLog {
    pub sw_update_type: SwUpdateType,
    pub event: AutoApplyEvent,
}

impl SwUpdateEventLog {
    pub fn new(sw_update_type: SwUpdateType, event: AutoApplyEvent) -> Self {
        Self {
            sw_update_type,
            event,
        }
    }

    /// e.g. `sw-upgrade-auto-apply-abort-rejected`
    pub fn event_id(&self) -> String {
        format!("{}-auto-apply-{}", self.sw_update_type, self.event.suffix())
    }
}
