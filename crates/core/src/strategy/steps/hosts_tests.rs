// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::nfvi::{AdminState, HostPersonality, HostSwPatch, OperState};
use crate::test_support::{host, instance, locked_host, stopped_instance, Harness};

const WORKER: &[HostPersonality] = &[HostPersonality::Worker];

fn audit() -> StrategyEvent {
    StrategyEvent::HostAudit
}

fn harness(hosts: Vec<Host>) -> Harness {
    Harness::with_inventory(Inventory::new().with_hosts(hosts))
}

#[test]
fn unlock_of_unlocked_hosts_succeeds_at_once() {
    let mut h = harness(vec![host("compute-0", WORKER)]);
    let mut step = UnlockHostsStep::new([&host("compute-0", WORKER)]);

    assert_eq!(step.run(&mut h.ctx()), (TaskResult::Success, String::new()));
    assert!(h.take_requests().is_empty());
}

#[test]
fn unlock_waits_for_hosts_to_enable() {
    let locked = locked_host("compute-0", WORKER);
    let mut h = harness(vec![locked.clone()]);
    let mut step = UnlockHostsStep::new([&locked]);

    assert_eq!(step.run(&mut h.ctx()).0, TaskResult::Wait);
    let requests = h.take_requests();
    assert_eq!(
        requests[0].1,
        NfviOp::UnlockHosts {
            host_names: vec!["compute-0".to_string()]
        }
    );

    assert_eq!(step.handle_event(&audit(), &mut h.ctx()), EventOutcome::Ignored);

    h.inventory.upsert_host(host("compute-0", WORKER));
    assert_eq!(
        step.handle_event(&audit(), &mut h.ctx()),
        EventOutcome::Complete(TaskResult::Success, String::new())
    );
}

#[test]
fn unlock_fails_when_host_disappears() {
    let locked = locked_host("compute-0", WORKER);
    let mut h = harness(vec![locked.clone()]);
    let mut step = UnlockHostsStep::new([&locked]);
    step.run(&mut h.ctx());

    h.inventory.remove_host("compute-0");
    assert_eq!(
        step.handle_event(&audit(), &mut h.ctx()),
        EventOutcome::Complete(TaskResult::Failed, "host no longer exists".to_string())
    );
}

#[test]
fn unlock_failure_only_counts_for_listed_hosts() {
    let locked = locked_host("compute-0", WORKER);
    let mut h = harness(vec![locked.clone(), locked_host("compute-1", WORKER)]);
    let mut step = UnlockHostsStep::new([&locked]);
    step.run(&mut h.ctx());

    let other = StrategyEvent::HostUnlockFailed {
        host_name: "compute-1".to_string(),
    };
    assert_eq!(step.handle_event(&other, &mut h.ctx()), EventOutcome::Ignored);

    let ours = StrategyEvent::HostUnlockFailed {
        host_name: "compute-0".to_string(),
    };
    assert_eq!(
        step.handle_event(&ours, &mut h.ctx()),
        EventOutcome::Complete(TaskResult::Failed, "host unlock failed".to_string())
    );
}

#[test]
fn lock_refuses_hosts_with_running_instances() {
    let hosts = vec![host("compute-0", WORKER), host("compute-1", WORKER)];
    let inventory = Inventory::new().with_hosts(hosts.clone()).with_instances([
        instance("vm-a", "compute-0"),
        stopped_instance("vm-b", "compute-0"),
        instance("vm-c", "compute-1"),
    ]);
    let mut h = Harness::with_inventory(inventory);
    let mut step = LockHostsStep::new(&hosts, true);

    let (result, reason) = step.run(&mut h.ctx());

    assert_eq!(result, TaskResult::Failed);
    assert_eq!(
        reason,
        "Lock of host(s) compute-0,compute-1 failed because instance(s) vm-a,vm-c were not migrated or stopped."
    );
    assert!(h.take_requests().is_empty());
}

#[test]
fn lock_without_disabled_wait_holds_events_for_fifteen_seconds() {
    let unlocked = host("compute-0", WORKER);
    let mut h = harness(vec![unlocked.clone()]);
    let mut step = LockHostsStep::new([&unlocked], false);

    assert_eq!(step.run(&mut h.ctx()).0, TaskResult::Wait);
    h.inventory.upsert_host(Host {
        admin_state: AdminState::Locked,
        ..unlocked.clone()
    });

    assert_eq!(step.handle_event(&audit(), &mut h.ctx()), EventOutcome::Handled);
    h.advance(10);
    assert_eq!(step.handle_event(&audit(), &mut h.ctx()), EventOutcome::Handled);
    h.advance(10);
    assert_eq!(
        step.handle_event(&audit(), &mut h.ctx()),
        EventOutcome::Complete(TaskResult::Success, String::new())
    );
}

#[test]
fn lock_with_disabled_wait_needs_disabled_hosts() {
    let unlocked = host("compute-0", WORKER);
    let mut h = harness(vec![unlocked.clone()]);
    let mut step = LockHostsStep::new([&unlocked], true);
    step.run(&mut h.ctx());

    h.inventory.upsert_host(Host {
        admin_state: AdminState::Locked,
        ..unlocked.clone()
    });
    assert_eq!(step.handle_event(&audit(), &mut h.ctx()), EventOutcome::Ignored);

    h.inventory.upsert_host(Host {
        admin_state: AdminState::Locked,
        oper_state: OperState::Disabled,
        ..unlocked
    });
    assert_eq!(
        step.handle_event(&audit(), &mut h.ctx()),
        EventOutcome::Complete(TaskResult::Success, String::new())
    );
}

#[test]
fn lock_failure_and_abort_step() {
    let unlocked = host("compute-0", WORKER);
    let mut h = harness(vec![unlocked.clone()]);
    let mut step = LockHostsStep::new([&unlocked], true);
    step.run(&mut h.ctx());

    let failed = StrategyEvent::HostLockFailed {
        host_name: "compute-0".to_string(),
    };
    assert_eq!(
        step.handle_event(&failed, &mut h.ctx()),
        EventOutcome::Complete(TaskResult::Failed, "host lock failed".to_string())
    );

    let undo = step.abort_step();
    assert_eq!(undo.entities(), step.entities());
}

#[test]
fn reboot_settles_for_a_minute() {
    let locked = locked_host("compute-0", WORKER);
    let mut h = harness(vec![locked.clone()]);
    let mut step = RebootHostsStep::new([&locked]);

    assert_eq!(step.run(&mut h.ctx()).0, TaskResult::Wait);
    assert_eq!(h.take_requests().len(), 1);

    assert_eq!(step.handle_event(&audit(), &mut h.ctx()), EventOutcome::Handled);
    h.advance(59);
    assert_eq!(step.handle_event(&audit(), &mut h.ctx()), EventOutcome::Handled);
    h.advance(1);
    assert_eq!(
        step.handle_event(&audit(), &mut h.ctx()),
        EventOutcome::Complete(TaskResult::Success, String::new())
    );
}

#[test]
fn swact_settles_for_two_minutes() {
    let controller = host("controller-0", &[HostPersonality::Controller]);
    let mut h = harness(vec![controller.clone()]);
    let mut step = SwactHostsStep::new([&controller]);
    step.run(&mut h.ctx());

    step.handle_event(&audit(), &mut h.ctx());
    h.advance(60);
    assert_eq!(step.handle_event(&audit(), &mut h.ctx()), EventOutcome::Handled);
    h.advance(60);
    assert_eq!(
        step.handle_event(&audit(), &mut h.ctx()),
        EventOutcome::Complete(TaskResult::Success, String::new())
    );

    let failed = StrategyEvent::HostSwactFailed {
        host_name: "controller-0".to_string(),
    };
    assert_eq!(
        step.handle_event(&failed, &mut h.ctx()),
        EventOutcome::Complete(TaskResult::Failed, "host swact failed".to_string())
    );
}

#[test]
fn disable_services_waits_for_every_host() {
    let mut a = host("compute-0", WORKER);
    a.services.insert("compute".to_string(), ServiceState::Enabled);
    let mut b = host("compute-1", WORKER);
    b.services.insert("compute".to_string(), ServiceState::Enabled);
    let mut h = harness(vec![a.clone(), b.clone()]);
    let mut step = DisableHostServicesStep::new([&a, &b], HostService::Compute);

    assert_eq!(step.run(&mut h.ctx()).0, TaskResult::Wait);
    assert_eq!(
        h.take_requests()[0].1,
        NfviOp::DisableHostServices {
            host_names: vec!["compute-0".to_string(), "compute-1".to_string()],
            service: HostService::Compute,
        }
    );

    a.services.insert("compute".to_string(), ServiceState::Disabled);
    h.inventory.upsert_host(a);
    assert_eq!(step.handle_event(&audit(), &mut h.ctx()), EventOutcome::Ignored);

    b.services.insert("compute".to_string(), ServiceState::Disabled);
    h.inventory.upsert_host(b);
    assert_eq!(
        step.handle_event(&audit(), &mut h.ctx()),
        EventOutcome::Complete(TaskResult::Success, String::new())
    );

    let undo = step.abort_step();
    assert_eq!(undo.service(), HostService::Compute);
    assert_eq!(undo.entities(), step.entities());
}

#[test]
fn enable_services_failure() {
    let a = host("compute-0", WORKER);
    let mut h = harness(vec![a.clone()]);
    let mut step = EnableHostServicesStep::new([&a], HostService::Compute);
    step.run(&mut h.ctx());

    let failed = StrategyEvent::EnableHostServicesFailed {
        host_name: "compute-0".to_string(),
    };
    assert_eq!(
        step.handle_event(&failed, &mut h.ctx()),
        EventOutcome::Complete(TaskResult::Failed, "enable host services failed".to_string())
    );
}

fn patch_host(name: &str, current: bool, failed: bool) -> HostSwPatch {
    HostSwPatch {
        name: name.to_string(),
        personality: WORKER.to_vec(),
        sw_version: "1.0".to_string(),
        requires_reboot: true,
        patch_current: current,
        state: "idle".to_string(),
        patch_failed: failed,
        interim_state: false,
    }
}

fn response(request_id: RequestId, response: NfviResponse) -> StrategyEvent {
    StrategyEvent::NfviResponse { request_id, response }
}

#[test]
fn sw_patch_hosts_failed_update_request() {
    let a = locked_host("compute-0", WORKER);
    let mut h = harness(vec![a.clone()]);
    let mut step = SwPatchHostsStep::new([&a]);
    step.run(&mut h.ctx());
    let (request_id, _) = h.take_requests()[0].clone();

    assert_eq!(
        step.handle_event(&response(request_id, NfviResponse::Failed("busy".to_string())), &mut h.ctx()),
        EventOutcome::Complete(TaskResult::Failed, String::new())
    );
}

#[test]
fn sw_patch_hosts_tracks_each_host_until_done() {
    let a = locked_host("compute-0", WORKER);
    let b = locked_host("compute-1", WORKER);
    let mut h = harness(vec![a.clone(), b.clone()]);
    let mut step = SwPatchHostsStep::new([&a, &b]);

    step.run(&mut h.ctx());
    let (update_id, _) = h.take_requests()[0].clone();
    assert_eq!(
        step.handle_event(&response(update_id, NfviResponse::Accepted), &mut h.ctx()),
        EventOutcome::Handled
    );

    // One query in flight at a time
    step.handle_event(&audit(), &mut h.ctx());
    step.handle_event(&audit(), &mut h.ctx());
    let queries = h.take_requests();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].1, NfviOp::GetSwPatchHosts);

    let partial = NfviResponse::SwPatchHosts(vec![
        patch_host("compute-0", false, true),
        patch_host("compute-1", false, false),
    ]);
    assert_eq!(
        step.handle_event(&response(queries[0].0, partial), &mut h.ctx()),
        EventOutcome::Handled
    );
    assert_eq!(
        step.host_completion("compute-0").map(|c| c.completed),
        Some(true)
    );

    step.handle_event(&audit(), &mut h.ctx());
    let (query_id, _) = h.take_requests()[0].clone();
    let done = NfviResponse::SwPatchHosts(vec![patch_host("compute-1", true, false)]);
    assert_eq!(
        step.handle_event(&response(query_id, done), &mut h.ctx()),
        EventOutcome::Complete(
            TaskResult::Failed,
            "software update failed to apply on host compute-0".to_string()
        )
    );
}

#[test]
fn sw_patch_hosts_ignores_failed_query() {
    let a = locked_host("compute-0", WORKER);
    let mut h = harness(vec![a.clone()]);
    let mut step = SwPatchHostsStep::new([&a]);
    step.run(&mut h.ctx());
    h.take_requests();

    step.handle_event(&audit(), &mut h.ctx());
    let (query_id, _) = h.take_requests()[0].clone();
    assert_eq!(
        step.handle_event(&response(query_id, NfviResponse::Failed("down".to_string())), &mut h.ctx()),
        EventOutcome::Handled
    );
    assert_eq!(step.host_completion("compute-0"), Some(&HostCompletion::default()));
}
