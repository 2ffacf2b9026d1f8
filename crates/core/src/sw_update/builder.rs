// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! What differs between kinds of software update
//!
//! A kind contributes the build-phase query stage and, once the build
//! phase has gathered its findings, either the apply stages or the reason
//! the strategy cannot be applied.

use super::params::{SwUpdateParams, SwUpdateType};
use super::sw_patch::SwPatchBuilder;
use super::sw_upgrade::SwUpgradeBuilder;
use crate::config::SwMgmtConfig;
use crate::inventory::Inventory;
use crate::nfvi::Host;
use crate::strategy::{Findings, StepWork, StrategyStage, StrategyStep};

pub const SW_PATCH_QUERY: &str = "sw-patch-query";
pub const SW_PATCH_CONTROLLERS: &str = "sw-patch-controllers";
pub const SW_PATCH_STORAGE_HOSTS: &str = "sw-patch-storage-hosts";
pub const SW_PATCH_SWIFT_HOSTS: &str = "sw-patch-swift-hosts";
pub const SW_PATCH_WORKER_HOSTS: &str = "sw-patch-worker-hosts";
pub const SW_UPGRADE_QUERY: &str = "sw-upgrade-query";
pub const SW_UPGRADE_CONTROLLERS: &str = "sw-upgrade-controllers";
pub const SW_UPGRADE_STORAGE_HOSTS: &str = "sw-upgrade-storage-hosts";
pub const SW_UPGRADE_WORKER_HOSTS: &str = "sw-upgrade-worker-hosts";
pub const SW_UPGRADE_COMPLETE: &str = "sw-upgrade-complete";

/// Everything a kind may consult when laying out the apply phase
pub struct BuildInput<'a> {
    pub params: &'a SwUpdateParams,
    pub settings: &'a SwMgmtConfig,
    pub inventory: &'a Inventory,
    pub findings: &'a Findings,
    /// Configured plus built-in alarm ids that never block this kind
    pub ignore_alarms: &'a [String],
}

pub trait StrategyBuilder {
    /// Alarm ids this kind always tolerates
    fn builtin_ignore_alarms(&self) -> &'static [&'static str];

    /// The single build-phase stage
    fn query_stage(&self, ignore_alarms: &[String]) -> StrategyStage;

    /// Apply stages in execution order, or why the build failed
    fn apply_stages(&self, input: &BuildInput<'_>) -> Result<Vec<StrategyStage>, String>;
}

pub fn builder_for(sw_update_type: SwUpdateType) -> &'static dyn StrategyBuilder {
    match sw_update_type {
        SwUpdateType::SwPatch => &SwPatchBuilder,
        SwUpdateType::SwUpgrade => &SwUpgradeBuilder,
    }
}

/// Configured ids first, then the kind's own
pub(crate) fn ignore_alarms(builder: &dyn StrategyBuilder, configured: &[String]) -> Vec<String> {
    configured
        .iter()
        .cloned()
        .chain(builder.builtin_ignore_alarms().iter().map(|id| id.to_string()))
        .collect()
}

pub(crate) fn push(stage: &mut StrategyStage, work: impl Into<StepWork>) {
    stage.add_step(StrategyStep::new(work));
}

pub(crate) fn unlocked_enabled_available(host: &Host) -> bool {
    host.is_unlocked() && host.is_enabled() && host.is_available()
}
