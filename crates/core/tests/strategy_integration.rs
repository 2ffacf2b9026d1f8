// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

//! Integration tests for strategy execution.
//!
//! Drives a director through whole patch strategies, answering NFVI
//! requests the way a small lab would.

use nfv_core::clock::FakeClock;
use nfv_core::nfvi::{
    AdminState, AvailStatus, Host, HostPersonality, HostSwPatch, NfviOp, NfviResponse, OperState,
    SwPatch,
};
use nfv_core::strategy::PhaseName;
use nfv_core::{
    Director, Effect, MemoryStore, RequestId, SequentialIdGen, StrategyState, SwMgmtConfig,
    SwUpdateParams, SwUpdateType,
};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

type LabDirector = Director<MemoryStore, FakeClock, SequentialIdGen>;

fn host(name: &str, personality: HostPersonality) -> Host {
    Host {
        uuid: format!("{}-uuid", name),
        name: name.to_string(),
        personality: vec![personality],
        admin_state: AdminState::Unlocked,
        oper_state: OperState::Enabled,
        avail_status: AvailStatus::Available,
        software_load: "1.0".to_string(),
        target_load: "1.0".to_string(),
        services: BTreeMap::new(),
    }
}

struct Lab {
    director: LabDirector,
    clock: FakeClock,
    /// Whether the patch needs a reboot to take effect
    reboot: bool,
    needs_patch: Vec<String>,
    patched: BTreeSet<String>,
    log: Vec<String>,
}

impl Lab {
    fn new(reboot: bool) -> Self {
        Self::with_workers(reboot, &["compute-0"])
    }

    fn with_workers(reboot: bool, workers: &[&str]) -> Self {
        let clock = FakeClock::new();
        let mut director = Director::open(
            SwMgmtConfig::default(),
            MemoryStore::new(),
            clock.clone(),
            SequentialIdGen::default(),
        )
        .unwrap();
        let mut hosts = vec![
            host("controller-0", HostPersonality::Controller),
            host("controller-1", HostPersonality::Controller),
        ];
        hosts.extend(workers.iter().map(|name| host(name, HostPersonality::Worker)));
        director.replace_inventory(hosts, Vec::new());
        Self {
            director,
            clock,
            reboot,
            needs_patch: workers.iter().map(|name| name.to_string()).collect(),
            patched: BTreeSet::new(),
            log: Vec::new(),
        }
    }

    fn respond(&mut self, op: &NfviOp) -> NfviResponse {
        match op {
            NfviOp::GetAlarms => NfviResponse::Alarms(Vec::new()),
            NfviOp::GetSwPatches => NfviResponse::SwPatches(vec![SwPatch {
                name: "PATCH_0001".to_string(),
                sw_version: "1.0".to_string(),
                repo_state: "Applied".to_string(),
                patch_state: "Partial-Apply".to_string(),
            }]),
            NfviOp::GetSwPatchHosts => NfviResponse::SwPatchHosts(
                self.needs_patch
                    .iter()
                    .map(|name| HostSwPatch {
                        name: name.clone(),
                        personality: vec![HostPersonality::Worker],
                        sw_version: "1.0".to_string(),
                        requires_reboot: self.reboot,
                        patch_current: self.patched.contains(name),
                        state: "idle".to_string(),
                        patch_failed: false,
                        interim_state: false,
                    })
                    .collect(),
            ),
            NfviOp::UpdateSwPatchHosts { host_names } => {
                self.patched.extend(host_names.iter().cloned());
                NfviResponse::Accepted
            }
            _ => NfviResponse::Accepted,
        }
    }

    /// Answer every request, returning the ops seen that need more than an answer
    fn pump(&mut self) -> Vec<NfviOp> {
        let mut pending = Vec::new();
        for _ in 0..20 {
            let effects = self.director.take_effects();
            let requests: Vec<(RequestId, NfviOp)> = effects
                .into_iter()
                .filter_map(|effect| match effect {
                    Effect::Nfvi { request_id, op } => Some((request_id, op)),
                    Effect::LogEvent { event, .. } => {
                        self.log.push(event.event_id());
                        None
                    }
                    _ => None,
                })
                .collect();
            if requests.is_empty() {
                break;
            }
            for (request_id, op) in requests {
                let response = self.respond(&op);
                pending.push(op);
                self.director.nfvi_response(request_id, response);
            }
        }
        pending
    }

    fn advance(&mut self, secs: u64) {
        self.clock.advance(Duration::from_secs(secs));
        self.director.tick();
        self.pump();
    }

    fn state(&self) -> StrategyState {
        self.director
            .get_strategy(SwUpdateType::SwPatch)
            .unwrap()
            .strategy()
            .state()
    }
}

#[test]
fn in_service_patch_applies_end_to_end() {
    let mut lab = Lab::new(false);
    let uuid = lab.director.create_strategy(SwUpdateParams::sw_patch(), |_| {}).unwrap();
    lab.pump();
    assert_eq!(lab.state(), StrategyState::ReadyToApply);

    lab.director.apply_strategy(&uuid, None).unwrap();
    let ops = lab.pump();
    assert!(ops.iter().any(|op| matches!(op, NfviOp::UpdateSwPatchHosts { .. })));

    // The step waits for an audit to see the host patch-current
    lab.director.host_audit(host("compute-0", HostPersonality::Worker));
    lab.pump();
    lab.advance(31);

    assert_eq!(lab.state(), StrategyState::Applied);
    assert_eq!(
        lab.director.store().get(&uuid).unwrap().strategy.state(),
        StrategyState::Applied
    );
    assert!(lab.log.contains(&"sw-patch-auto-apply-completed".to_string()));
}

#[test]
fn failed_lock_unwinds_through_abort_phase() {
    let mut lab = Lab::new(true);
    let uuid = lab.director.create_strategy(SwUpdateParams::sw_patch(), |_| {}).unwrap();
    lab.pump();
    assert_eq!(lab.state(), StrategyState::ReadyToApply);

    lab.director.apply_strategy(&uuid, None).unwrap();
    let ops = lab.pump();
    assert!(ops.iter().any(|op| matches!(op, NfviOp::LockHosts { .. })));

    lab.director.host_lock_failed(host("compute-0", HostPersonality::Worker));
    lab.pump();

    let sw_update = lab.director.get_strategy(SwUpdateType::SwPatch).unwrap();
    assert_eq!(sw_update.strategy().current_phase(), PhaseName::Abort);
    assert!(matches!(
        sw_update.strategy().state(),
        StrategyState::Aborting | StrategyState::Aborted
    ));
    assert_eq!(sw_update.strategy().apply_phase().reason(), "host lock failed");
    assert!(lab.log.contains(&"sw-patch-auto-apply-failed".to_string()));
}

#[test]
fn single_stage_apply_walks_stage_by_stage() {
    let mut lab = Lab::with_workers(false, &["compute-0", "compute-1"]);
    let uuid = lab.director.create_strategy(SwUpdateParams::sw_patch(), |_| {}).unwrap();
    lab.pump();
    let total = lab
        .director
        .get_strategy(SwUpdateType::SwPatch)
        .unwrap()
        .strategy()
        .apply_phase()
        .total_stages();
    assert_eq!(total, 2);

    assert_eq!(
        lab.director.apply_strategy(&uuid, Some(1)).unwrap_err().to_string(),
        "invalid stage id 1 for the apply, total-stages are 2"
    );

    for (stage_id, worker) in ["compute-0", "compute-1"].into_iter().enumerate() {
        lab.director.apply_strategy(&uuid, Some(stage_id)).unwrap();
        lab.pump();
        lab.director.host_audit(host(worker, HostPersonality::Worker));
        lab.pump();
        lab.advance(31);

        if stage_id == 0 {
            assert_eq!(lab.state(), StrategyState::Applying);
            assert_eq!(
                lab.director.apply_strategy(&uuid, Some(0)).unwrap_err().to_string(),
                "apply already complete for stage id 0"
            );
        }
    }

    assert_eq!(lab.state(), StrategyState::Applied);
}
