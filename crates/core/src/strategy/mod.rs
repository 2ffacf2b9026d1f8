// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Strategy engine: task work, steps, stages, phases and the lifecycle

mod context;
mod lifecycle;
mod phase;
mod result;
mod stage;
mod step;
pub mod steps;
mod task;

pub use context::{Context, Findings};
pub use lifecycle::{Strategy, StrategyNotice, StrategyState};
pub use phase::{PhaseName, StrategyPhase};
pub use result::{Outcome, Progress, TaskResult};
pub use stage::StrategyStage;
pub use step::{StepWork, StrategyStep};
pub use task::{total_timeout, EventOutcome, StateTask, TaskWork};
