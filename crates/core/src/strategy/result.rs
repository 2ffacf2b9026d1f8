// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result lattice shared by task work, steps, stages, phases and strategies

use serde::{Deserialize, Serialize};

/// Result of a unit of work at any level of a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskResult {
    #[default]
    Initial,
    Inprogress,
    /// Suspended on an asynchronous request
    Wait,
    Success,
    Degraded,
    Failed,
    Aborted,
    TimedOut,
}

impl TaskResult {
    fn severity(self) -> u8 {
        match self {
            TaskResult::Initial => 0,
            TaskResult::Inprogress => 1,
            TaskResult::Wait => 1,
            TaskResult::Success => 2,
            TaskResult::Degraded => 3,
            TaskResult::Failed => 4,
            TaskResult::Aborted => 5,
            TaskResult::TimedOut => 6,
        }
    }

    /// Failed, aborted and timed-out results stop further work
    pub fn is_failure(self) -> bool {
        matches!(
            self,
            TaskResult::Failed | TaskResult::Aborted | TaskResult::TimedOut
        )
    }

    pub fn is_success(self) -> bool {
        matches!(self, TaskResult::Success | TaskResult::Degraded)
    }

    pub fn is_terminal(self) -> bool {
        self.is_success() || self.is_failure()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskResult::Initial => "initial",
            TaskResult::Inprogress => "inprogress",
            TaskResult::Wait => "wait",
            TaskResult::Success => "success",
            TaskResult::Degraded => "degraded",
            TaskResult::Failed => "failed",
            TaskResult::Aborted => "aborted",
            TaskResult::TimedOut => "timed-out",
        }
    }

    /// Fold `new` into `self`, keeping the more severe result.
    ///
    /// A waiting accumulator is left untouched and a waiting update is
    /// ignored. On a tie the current reason is kept.
    pub fn combine(
        self,
        reason: &str,
        new: TaskResult,
        new_reason: &str,
    ) -> (TaskResult, String) {
        if self == TaskResult::Wait || new == TaskResult::Wait {
            return (self, reason.to_string());
        }
        if new.severity() > self.severity() {
            (new, new_reason.to_string())
        } else {
            (self, reason.to_string())
        }
    }
}

impl std::fmt::Display for TaskResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A terminal result with its reason
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub result: TaskResult,
    pub reason: String,
}

impl Outcome {
    pub fn new(result: TaskResult, reason: impl Into<String>) -> Self {
        Self {
            result,
            reason: reason.into(),
        }
    }
}

/// Whether a piece of work has finished
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    Waiting,
    Done(Outcome),
}

impl Progress {
    pub fn done(result: TaskResult, reason: impl Into<String>) -> Self {
        Progress::Done(Outcome::new(result, reason))
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
