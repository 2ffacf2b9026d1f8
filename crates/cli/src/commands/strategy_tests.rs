// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use clap::Parser;

#[derive(Parser)]
struct PatchCli {
    #[command(subcommand)]
    command: PatchCommand,
}

#[derive(Parser)]
struct UpgradeCli {
    #[command(subcommand)]
    command: UpgradeCommand,
}

fn patch_params(args: &[&str]) -> SwUpdateParams {
    let cli = PatchCli::try_parse_from(std::iter::once("patch-strategy").chain(args.iter().copied())).unwrap();
    match cli.command {
        PatchCommand::Create(args) => args.params(),
        PatchCommand::Common(_) => panic!("expected create"),
    }
}

fn upgrade_params(args: &[&str]) -> SwUpdateParams {
    let cli = UpgradeCli::try_parse_from(std::iter::once("upgrade-strategy").chain(args.iter().copied())).unwrap();
    match cli.command {
        UpgradeCommand::Create(args) => args.params(),
        UpgradeCommand::Common(_) => panic!("expected create"),
    }
}

#[test]
fn patch_create_defaults() {
    let params = patch_params(&["create"]);

    assert_eq!(params.sw_update_type, SwUpdateType::SwPatch);
    assert_eq!(params.controller_apply_type, ApplyType::Serial);
    assert_eq!(params.swift_apply_type, ApplyType::Ignore);
    assert_eq!(params.worker_apply_type, ApplyType::Serial);
    assert_eq!(params.max_parallel_worker_hosts, 2);
    assert_eq!(params.default_instance_action, InstanceAction::StopStart);
    assert_eq!(params.alarm_restrictions, AlarmRestrictions::Strict);
}

#[test]
fn patch_create_options() {
    let params = patch_params(&[
        "create",
        "--controller-apply-type",
        "ignore",
        "--compute-apply-type",
        "parallel",
        "--max-parallel-compute-hosts",
        "50",
        "--instance-action",
        "migrate",
        "--alarm-restrictions",
        "relaxed",
    ]);

    assert_eq!(params.controller_apply_type, ApplyType::Ignore);
    assert_eq!(params.worker_apply_type, ApplyType::Parallel);
    assert_eq!(params.max_parallel_worker_hosts, 50);
    assert_eq!(params.default_instance_action, InstanceAction::Migrate);
    assert_eq!(params.alarm_restrictions, AlarmRestrictions::Relaxed);
}

#[test]
fn patch_controller_cannot_be_parallel() {
    let result = PatchCli::try_parse_from(["patch-strategy", "create", "--controller-apply-type", "parallel"]);
    assert!(result.is_err());
}

#[test]
fn parallel_host_limits() {
    assert!(PatchCli::try_parse_from(["p", "create", "--max-parallel-compute-hosts", "1"]).is_err());
    assert!(PatchCli::try_parse_from(["p", "create", "--max-parallel-compute-hosts", "101"]).is_err());
    assert!(UpgradeCli::try_parse_from(["u", "create", "--max-parallel-compute-hosts", "11"]).is_err());
    assert_eq!(
        upgrade_params(&["create", "--max-parallel-compute-hosts", "10"]).max_parallel_worker_hosts,
        10
    );
}

#[test]
fn upgrade_create_defaults() {
    let params = upgrade_params(&["create", "--complete-upgrade"]);

    assert_eq!(params.sw_update_type, SwUpdateType::SwUpgrade);
    assert_eq!(params.controller_apply_type, ApplyType::Ignore);
    assert_eq!(params.swift_apply_type, ApplyType::Ignore);
    assert_eq!(params.default_instance_action, InstanceAction::Migrate);
    assert!(params.complete_upgrade);
    assert!(!params.start_upgrade);
}

#[test]
fn common_commands_parse() {
    let cli = PatchCli::try_parse_from(["p", "apply", "--stage-id", "3"]).unwrap();
    assert!(matches!(
        cli.command,
        PatchCommand::Common(CommonCommand::Apply { stage_id: Some(3) })
    ));

    let cli = UpgradeCli::try_parse_from(["u", "delete", "--force"]).unwrap();
    assert!(matches!(
        cli.command,
        UpgradeCommand::Common(CommonCommand::Delete { force: true })
    ));

    let cli = PatchCli::try_parse_from(["p", "show", "--details"]).unwrap();
    assert!(matches!(
        cli.command,
        PatchCommand::Common(CommonCommand::Show { details: true })
    ));
}

#[test]
fn failure_messages() {
    assert_eq!(failure("apply", None), "Strategy apply failed");
    assert_eq!(failure("apply", Some(2)), "Strategy stage 2 apply failed");
    assert_eq!(failure("abort", Some(0)), "Strategy stage 0 abort failed");
}
