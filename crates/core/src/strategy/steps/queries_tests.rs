// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::nfvi::{Alarm, HostPersonality, HostSwPatch, SwPatch, Upgrade, UpgradeState};
use crate::sw_update::AlarmRestrictions;
use crate::test_support::Harness;

fn alarm(alarm_id: &str, mgmt_affecting: bool) -> Alarm {
    Alarm {
        alarm_uuid: format!("{}-uuid", alarm_id),
        alarm_id: alarm_id.to_string(),
        entity_instance_id: "host=controller-0".to_string(),
        severity: "major".to_string(),
        reason_text: String::new(),
        timestamp: String::new(),
        mgmt_affecting,
    }
}

fn respond(
    step: &mut impl TaskWork,
    h: &mut Harness,
    response: NfviResponse,
) -> EventOutcome {
    let (request_id, _) = h.take_requests()[0].clone();
    step.handle_event(&StrategyEvent::NfviResponse { request_id, response }, &mut h.ctx())
}

#[test]
fn query_alarms_stores_filtered_alarms() {
    let mut h = Harness::new();
    let mut step = QueryAlarmsStep::new(false, vec!["900.001".to_string()]);
    assert_eq!(step.run(&mut h.ctx()).0, TaskResult::Wait);

    let alarms = vec![alarm("900.001", true), alarm("200.001", true)];
    assert_eq!(
        respond(&mut step, &mut h, NfviResponse::Alarms(alarms)),
        EventOutcome::Complete(TaskResult::Success, String::new())
    );
    assert_eq!(h.findings.alarms, vec![alarm("200.001", true)]);
}

#[test]
fn query_alarms_fails_when_alarms_remain() {
    let mut h = Harness::new();
    let mut step = QueryAlarmsStep::new(true, Vec::new());
    step.run(&mut h.ctx());

    assert_eq!(
        respond(&mut step, &mut h, NfviResponse::Alarms(vec![alarm("200.001", true)])),
        EventOutcome::Complete(TaskResult::Failed, "alarms are present".to_string())
    );
}

#[test]
fn query_alarms_relaxed_drops_non_mgmt_affecting() {
    let mut h = Harness::new();
    h.alarm_restrictions = AlarmRestrictions::Relaxed;
    let mut step = QueryAlarmsStep::new(true, Vec::new());
    step.run(&mut h.ctx());

    assert_eq!(
        respond(&mut step, &mut h, NfviResponse::Alarms(vec![alarm("100.101", false)])),
        EventOutcome::Complete(TaskResult::Success, String::new())
    );
    assert!(h.findings.alarms.is_empty());
}

#[test]
fn query_failure_fails_the_step() {
    let mut h = Harness::new();
    let mut step = QueryAlarmsStep::new(false, Vec::new());
    step.run(&mut h.ctx());

    assert_eq!(
        respond(&mut step, &mut h, NfviResponse::Failed("timeout".to_string())),
        EventOutcome::Complete(TaskResult::Failed, String::new())
    );
}

#[test]
fn unrelated_responses_are_ignored() {
    let mut h = Harness::new();
    let mut step = QuerySwPatchesStep::new();
    step.run(&mut h.ctx());
    let (request_id, _) = h.take_requests()[0].clone();

    let other = StrategyEvent::NfviResponse {
        request_id: RequestId(request_id.0 + 1),
        response: NfviResponse::Accepted,
    };
    assert_eq!(step.handle_event(&other, &mut h.ctx()), EventOutcome::Ignored);
}

#[test]
fn wait_data_sync_polls_until_alarms_clear() {
    let mut h = Harness::new();
    let mut step = WaitDataSyncStep::new(1800, Vec::new());
    assert_eq!(step.run(&mut h.ctx()).0, TaskResult::Wait);
    assert!(h.take_requests().is_empty());

    step.handle_event(&StrategyEvent::HostAudit, &mut h.ctx());
    assert!(h.take_requests().is_empty());

    h.advance(120);
    step.handle_event(&StrategyEvent::HostAudit, &mut h.ctx());
    let (first, op) = h.take_requests()[0].clone();
    assert_eq!(op, NfviOp::GetAlarms);

    // One query at a time
    step.handle_event(&StrategyEvent::HostAudit, &mut h.ctx());
    assert!(h.take_requests().is_empty());

    let still_alarmed = StrategyEvent::NfviResponse {
        request_id: first,
        response: NfviResponse::Alarms(vec![alarm("400.005", true)]),
    };
    assert_eq!(step.handle_event(&still_alarmed, &mut h.ctx()), EventOutcome::Handled);

    step.handle_event(&StrategyEvent::HostAudit, &mut h.ctx());
    assert_eq!(
        respond(&mut step, &mut h, NfviResponse::Alarms(Vec::new())),
        EventOutcome::Complete(TaskResult::Success, String::new())
    );
}

#[test]
fn queries_record_findings() {
    let mut h = Harness::new();

    let patch = SwPatch {
        name: "PATCH_0001".to_string(),
        sw_version: "1.0".to_string(),
        repo_state: "Applied".to_string(),
        patch_state: "Partial-Apply".to_string(),
    };
    let mut patches = QuerySwPatchesStep::new();
    patches.run(&mut h.ctx());
    respond(&mut patches, &mut h, NfviResponse::SwPatches(vec![patch.clone()]));
    assert_eq!(h.findings.sw_patches, vec![patch]);

    let patch_host = HostSwPatch {
        name: "controller-0".to_string(),
        personality: vec![HostPersonality::Controller],
        sw_version: "1.0".to_string(),
        requires_reboot: true,
        patch_current: false,
        state: "idle".to_string(),
        patch_failed: false,
        interim_state: false,
    };
    let mut hosts = QuerySwPatchHostsStep::new();
    hosts.run(&mut h.ctx());
    respond(&mut hosts, &mut h, NfviResponse::SwPatchHosts(vec![patch_host.clone()]));
    assert_eq!(h.findings.sw_patch_hosts, vec![patch_host]);

    let upgrade = Upgrade {
        state: UpgradeState::UpgradingHosts,
        from_release: "1.0".to_string(),
        to_release: "2.0".to_string(),
    };
    let mut query = QueryUpgradeStep::new();
    query.run(&mut h.ctx());
    assert_eq!(
        respond(&mut query, &mut h, NfviResponse::Upgrade(Some(upgrade.clone()))),
        EventOutcome::Complete(TaskResult::Success, String::new())
    );
    assert_eq!(h.findings.upgrade, Some(upgrade));
}
