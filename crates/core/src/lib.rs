// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! nfv-core: software-update orchestration engine
//!
//! This crate provides:
//! - The strategy state machine (phases, stages, steps, task work)
//! - Patch and upgrade strategy builders
//! - The sw-update object with its alarms, customer logs and audit
//! - A director owning the single strategy, its timers and persistence
//!
//! Nothing here performs I/O against the infrastructure. Requests leave
//! as [`Effect`]s and their answers come back as events.

pub mod clock;
pub mod config;
pub mod director;
pub mod effect;
pub mod event;
pub mod id;
pub mod inventory;
pub mod nfvi;
pub mod storage;
pub mod strategy;
pub mod sw_update;
pub mod timers;

#[cfg(test)]
mod test_support;

// Re-exports
pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{Config, ConfigError, SwMgmtConfig};
pub use director::{Director, DirectorError, StrategyReply};
pub use effect::Effect;
pub use event::StrategyEvent;
pub use id::{IdGen, RequestId, SequentialIdGen, UuidIdGen};
pub use inventory::Inventory;
pub use storage::{JsonStore, MemoryStore, StorageError, SwUpdateStore};
pub use strategy::{Strategy, StrategyState, TaskResult};
pub use sw_update::{SwUpdate, SwUpdateParams, SwUpdateRecord, SwUpdateType};
