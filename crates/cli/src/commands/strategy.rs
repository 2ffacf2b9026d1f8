// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Patch and upgrade strategy commands

use std::process::ExitCode;

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use nfv_core::sw_update::{AlarmRestrictions, ApplyType, InstanceAction};
use nfv_core::{SwUpdateParams, SwUpdateType};
use serde_json::Value;

use crate::client::{ClientError, DaemonClient};
use crate::output::format_strategy;

#[derive(Subcommand)]
pub enum PatchCommand {
    /// Create a strategy
    Create(PatchCreateArgs),
    #[command(flatten)]
    Common(CommonCommand),
}

#[derive(Subcommand)]
pub enum UpgradeCommand {
    /// Create a strategy
    Create(UpgradeCreateArgs),
    #[command(flatten)]
    Common(CommonCommand),
}

/// Commands shared by both strategy kinds
#[derive(Subcommand)]
pub enum CommonCommand {
    /// Delete a strategy
    Delete {
        #[arg(long, hide = true)]
        force: bool,
    },
    /// Apply a strategy
    Apply {
        /// Stage identifier to apply
        #[arg(long)]
        stage_id: Option<usize>,
    },
    /// Abort a strategy
    Abort {
        /// Stage identifier to abort
        #[arg(long)]
        stage_id: Option<usize>,
    },
    /// Show a strategy
    Show {
        /// Show strategy details
        #[arg(long)]
        details: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ControllerApplyType {
    Serial,
    Ignore,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum HostApplyType {
    Serial,
    Parallel,
    Ignore,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum InstanceActionArg {
    Migrate,
    StopStart,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum AlarmRestrictionsArg {
    Strict,
    Relaxed,
}

impl From<ControllerApplyType> for ApplyType {
    fn from(value: ControllerApplyType) -> Self {
        match value {
            ControllerApplyType::Serial => ApplyType::Serial,
            ControllerApplyType::Ignore => ApplyType::Ignore,
        }
    }
}

impl From<HostApplyType> for ApplyType {
    fn from(value: HostApplyType) -> Self {
        match value {
            HostApplyType::Serial => ApplyType::Serial,
            HostApplyType::Parallel => ApplyType::Parallel,
            HostApplyType::Ignore => ApplyType::Ignore,
        }
    }
}

impl From<InstanceActionArg> for InstanceAction {
    fn from(value: InstanceActionArg) -> Self {
        match value {
            InstanceActionArg::Migrate => InstanceAction::Migrate,
            InstanceActionArg::StopStart => InstanceAction::StopStart,
        }
    }
}

impl From<AlarmRestrictionsArg> for AlarmRestrictions {
    fn from(value: AlarmRestrictionsArg) -> Self {
        match value {
            AlarmRestrictionsArg::Strict => AlarmRestrictions::Strict,
            AlarmRestrictionsArg::Relaxed => AlarmRestrictions::Relaxed,
        }
    }
}

#[derive(Args, Debug)]
pub struct PatchCreateArgs {
    /// Defaults to serial
    #[arg(long, value_enum, default_value = "serial")]
    controller_apply_type: ControllerApplyType,

    /// Defaults to serial
    #[arg(long, value_enum, default_value = "serial")]
    storage_apply_type: HostApplyType,

    /// Defaults to serial
    #[arg(long, value_enum, default_value = "serial")]
    compute_apply_type: HostApplyType,

    /// Maximum compute hosts to patch in parallel
    #[arg(long, value_parser = clap::value_parser!(u32).range(2..=100))]
    max_parallel_compute_hosts: Option<u32>,

    /// Defaults to stop-start
    #[arg(long, value_enum, default_value = "stop-start")]
    instance_action: InstanceActionArg,

    /// Defaults to strict
    #[arg(long, value_enum, default_value = "strict")]
    alarm_restrictions: AlarmRestrictionsArg,
}

impl PatchCreateArgs {
    pub fn params(&self) -> SwUpdateParams {
        let defaults = SwUpdateParams::sw_patch();
        SwUpdateParams {
            controller_apply_type: self.controller_apply_type.into(),
            storage_apply_type: self.storage_apply_type.into(),
            swift_apply_type: ApplyType::Ignore,
            worker_apply_type: self.compute_apply_type.into(),
            max_parallel_worker_hosts: self
                .max_parallel_compute_hosts
                .unwrap_or(defaults.max_parallel_worker_hosts),
            default_instance_action: self.instance_action.into(),
            alarm_restrictions: self.alarm_restrictions.into(),
            ..defaults
        }
    }
}

#[derive(Args, Debug)]
pub struct UpgradeCreateArgs {
    /// Defaults to serial
    #[arg(long, value_enum, default_value = "serial")]
    storage_apply_type: HostApplyType,

    /// Defaults to serial
    #[arg(long, value_enum, default_value = "serial")]
    compute_apply_type: HostApplyType,

    /// Maximum compute hosts to upgrade in parallel
    #[arg(long, value_parser = clap::value_parser!(u32).range(2..=10))]
    max_parallel_compute_hosts: Option<u32>,

    #[arg(long, hide = true)]
    complete_upgrade: bool,

    /// Defaults to strict
    #[arg(long, value_enum, default_value = "strict")]
    alarm_restrictions: AlarmRestrictionsArg,
}

impl UpgradeCreateArgs {
    /// Controllers are upgraded by the upgrade steps themselves
    pub fn params(&self) -> SwUpdateParams {
        let defaults = SwUpdateParams::sw_upgrade();
        SwUpdateParams {
            controller_apply_type: ApplyType::Ignore,
            storage_apply_type: self.storage_apply_type.into(),
            worker_apply_type: self.compute_apply_type.into(),
            max_parallel_worker_hosts: self
                .max_parallel_compute_hosts
                .unwrap_or(defaults.max_parallel_worker_hosts),
            alarm_restrictions: self.alarm_restrictions.into(),
            complete_upgrade: self.complete_upgrade,
            ..defaults
        }
    }
}

pub async fn patch(client: &DaemonClient, command: PatchCommand) -> Result<ExitCode> {
    match command {
        PatchCommand::Create(args) => create(client, args.params()).await,
        PatchCommand::Common(command) => common(client, SwUpdateType::SwPatch, command).await,
    }
}

pub async fn upgrade(client: &DaemonClient, command: UpgradeCommand) -> Result<ExitCode> {
    match command {
        UpgradeCommand::Create(args) => create(client, args.params()).await,
        UpgradeCommand::Common(command) => common(client, SwUpdateType::SwUpgrade, command).await,
    }
}

async fn create(client: &DaemonClient, params: SwUpdateParams) -> Result<ExitCode> {
    let result = client.create_strategy(params).await;
    show_or_fail(result, "Strategy creation failed")
}

async fn common(
    client: &DaemonClient,
    sw_update_type: SwUpdateType,
    command: CommonCommand,
) -> Result<ExitCode> {
    match command {
        CommonCommand::Delete { force } => match client.delete_strategy(sw_update_type, force).await {
            Ok(true) => {
                println!("Strategy deleted");
                Ok(ExitCode::SUCCESS)
            }
            Ok(false) | Err(ClientError::Rejected(_)) => fail("Strategy delete failed"),
            Err(e) => Err(e.into()),
        },
        CommonCommand::Apply { stage_id } => {
            let result = client.apply_strategy(sw_update_type, stage_id).await;
            show_or_fail(result, &failure("apply", stage_id))
        }
        CommonCommand::Abort { stage_id } => {
            let result = client.abort_strategy(sw_update_type, stage_id).await;
            show_or_fail(result, &failure("abort", stage_id))
        }
        CommonCommand::Show { details } => match client.get_strategy(sw_update_type).await? {
            Some(strategy) => {
                print!("{}", format_strategy(&strategy, details));
                Ok(ExitCode::SUCCESS)
            }
            None => {
                println!("No strategy available");
                Ok(ExitCode::SUCCESS)
            }
        },
    }
}

fn failure(action: &str, stage_id: Option<usize>) -> String {
    match stage_id {
        Some(stage_id) => format!("Strategy stage {} {} failed", stage_id, action),
        None => format!("Strategy {} failed", action),
    }
}

/// Refusals by the daemon become the command's failure message; transport
/// errors propagate
fn show_or_fail(
    result: Result<Option<Value>, ClientError>,
    failure: &str,
) -> Result<ExitCode> {
    match result {
        Ok(Some(strategy)) => {
            print!("{}", format_strategy(&strategy, false));
            Ok(ExitCode::SUCCESS)
        }
        Ok(None) | Err(ClientError::Rejected(_)) => fail(failure),
        Err(e) => Err(e.into()),
    }
}

fn fail(message: &str) -> Result<ExitCode> {
    println!("{}", message);
    Ok(ExitCode::FAILURE)
}

#[cfg(test)]
#[path = "strategy_tests.rs"]
mod tests;
