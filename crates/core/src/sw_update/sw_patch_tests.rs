// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::config::SwMgmtConfig;
use crate::inventory::Inventory;
use crate::nfvi::{Alarm, HostSwPatch, ServiceState, SwPatch};
use crate::strategy::Findings;
use crate::sw_update::params::SwUpdateParams;
use crate::test_support::{host, instance, locked_host};

const CONTROLLER: &[HostPersonality] = &[HostPersonality::Controller];
const CPE: &[HostPersonality] = &[HostPersonality::Controller, HostPersonality::Worker];
const STORAGE: &[HostPersonality] = &[HostPersonality::Storage];
const WORKER: &[HostPersonality] = &[HostPersonality::Worker];

struct Fixture {
    params: SwUpdateParams,
    settings: SwMgmtConfig,
    inventory: Inventory,
    findings: Findings,
}

impl Fixture {
    fn new(hosts: Vec<Host>) -> Self {
        let findings = Findings {
            sw_patches: vec![SwPatch {
                name: "PATCH_0001".to_string(),
                sw_version: "1.0".to_string(),
                repo_state: "Applied".to_string(),
                patch_state: "Partial-Apply".to_string(),
            }],
            ..Findings::default()
        };
        Self {
            params: SwUpdateParams::sw_patch(),
            settings: SwMgmtConfig::default(),
            inventory: Inventory::new().with_hosts(hosts),
            findings,
        }
    }

    fn needs_patch(mut self, name: &str, reboot: bool) -> Self {
        let personality = self
            .inventory
            .host(name)
            .map(|h| h.personality.clone())
            .unwrap_or_default();
        self.findings.sw_patch_hosts.push(HostSwPatch {
            name: name.to_string(),
            personality,
            sw_version: "1.0".to_string(),
            requires_reboot: reboot,
            patch_current: false,
            state: "idle".to_string(),
            patch_failed: false,
            interim_state: false,
        });
        self
    }

    fn stages(&self) -> Result<Vec<StrategyStage>, String> {
        let ignore = ignore_alarms(&SwPatchBuilder, &[]);
        SwPatchBuilder.apply_stages(&BuildInput {
            params: &self.params,
            settings: &self.settings,
            inventory: &self.inventory,
            findings: &self.findings,
            ignore_alarms: &ignore,
        })
    }

    fn layout(&self) -> Vec<(String, Vec<String>)> {
        self.stages()
            .unwrap()
            .iter()
            .map(|stage| {
                let steps = stage.steps().iter().map(|s| s.name().to_string()).collect();
                (stage.name().to_string(), steps)
            })
            .collect()
    }
}

fn standard_hosts() -> Vec<Host> {
    vec![
        host("controller-0", CONTROLLER),
        host("controller-1", CONTROLLER),
        host("compute-0", WORKER),
    ]
}

fn steps(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[test]
fn query_stage_gathers_alarms_and_patch_state() {
    let ignore = vec!["100.101".to_string()];
    let stage = SwPatchBuilder.query_stage(&ignore);

    assert_eq!(stage.name(), SW_PATCH_QUERY);
    let names: Vec<&str> = stage.steps().iter().map(|s| s.name()).collect();
    assert_eq!(names, vec!["query-alarms", "query-sw-patches", "query-sw-patch-hosts"]);
}

#[test]
fn configured_alarms_come_before_builtin_ones() {
    let ids = ignore_alarms(&SwPatchBuilder, &["100.101".to_string()]);
    assert_eq!(ids[0], "100.101");
    assert!(ids.contains(&"900.001".to_string()));
    assert_eq!(ids.len(), 7);
}

#[test]
fn rebooting_patch_swacts_controllers_and_runs_local_last() {
    let mut fixture = Fixture::new(standard_hosts())
        .needs_patch("controller-0", true)
        .needs_patch("controller-1", true)
        .needs_patch("compute-0", true);
    fixture.inventory.upsert_instance(instance("vm-a", "compute-0"));

    let layout = fixture.layout();
    let controller_steps = steps(&[
        "query-alarms",
        "swact-hosts",
        "lock-hosts",
        "sw-patch-hosts",
        "system-stabilize",
        "unlock-hosts",
        "system-stabilize",
    ]);
    assert_eq!(layout.len(), 3);
    assert_eq!(layout[0], (SW_PATCH_CONTROLLERS.to_string(), controller_steps.clone()));
    assert_eq!(layout[1], (SW_PATCH_CONTROLLERS.to_string(), controller_steps));
    assert_eq!(
        layout[2],
        (
            SW_PATCH_WORKER_HOSTS.to_string(),
            steps(&[
                "query-alarms",
                "stop-instances",
                "lock-hosts",
                "sw-patch-hosts",
                "system-stabilize",
                "unlock-hosts",
                "start-instances",
                "system-stabilize",
            ])
        )
    );

    let stages = fixture.stages().unwrap();
    let first = stages[0].steps()[1].entities();
    assert_eq!(first.names(), ["controller-1"]);
    let last = stages[1].steps()[1].entities();
    assert_eq!(last.names(), ["controller-0"]);
}

#[test]
fn in_service_patches_go_before_rebooting_ones() {
    let fixture = Fixture::new(standard_hosts())
        .needs_patch("controller-0", false)
        .needs_patch("controller-1", true);

    let stages = fixture.stages().unwrap();
    assert_eq!(stages.len(), 2);

    let in_service: Vec<&str> = stages[0].steps().iter().map(|s| s.name()).collect();
    assert_eq!(in_service, vec!["query-alarms", "sw-patch-hosts", "system-stabilize"]);
    assert_eq!(stages[0].steps()[2].timeout_secs(), 30);
    assert_eq!(stages[0].steps()[1].entities().names(), ["controller-0"]);
    assert_eq!(stages[1].steps()[1].entities().names(), ["controller-1"]);
}

#[test]
fn locked_worker_is_rebooted_instead_of_unlocked() {
    let mut hosts = standard_hosts();
    hosts.push(locked_host("compute-1", WORKER));
    let fixture = Fixture::new(hosts).needs_patch("compute-1", true);

    assert_eq!(
        fixture.layout(),
        vec![(
            SW_PATCH_WORKER_HOSTS.to_string(),
            steps(&[
                "query-alarms",
                "sw-patch-hosts",
                "system-stabilize",
                "reboot-hosts",
                "system-stabilize",
            ])
        )]
    );
}

#[test]
fn parallel_migration_disables_compute_service_first() {
    let compute = |name: &str| {
        let mut h = host(name, WORKER);
        h.services.insert("compute".to_string(), ServiceState::Enabled);
        h
    };
    let mut hosts = standard_hosts();
    hosts[2] = compute("compute-0");
    hosts.push(compute("compute-1"));

    let mut fixture = Fixture::new(hosts)
        .needs_patch("compute-0", true)
        .needs_patch("compute-1", true);
    fixture.params.worker_apply_type = ApplyType::Parallel;
    fixture.params.default_instance_action = InstanceAction::Migrate;
    fixture.inventory.upsert_instance(instance("vm-a", "compute-0"));
    fixture.inventory.upsert_instance(instance("vm-b", "compute-1"));

    let stages = fixture.stages().unwrap();
    assert_eq!(stages.len(), 1);
    let names: Vec<&str> = stages[0].steps().iter().map(|s| s.name()).collect();
    assert_eq!(
        names,
        vec![
            "query-alarms",
            "disable-host-services",
            "migrate-instances",
            "lock-hosts",
            "sw-patch-hosts",
            "system-stabilize",
            "unlock-hosts",
            "system-stabilize",
        ]
    );
    assert_eq!(stages[0].steps()[3].entities().names(), ["compute-0", "compute-1"]);
}

#[test]
fn rebooted_storage_waits_for_data_sync() {
    let mut hosts = standard_hosts();
    hosts.push(host("storage-0", STORAGE));
    hosts.push(host("storage-1", STORAGE));
    let fixture = Fixture::new(hosts)
        .needs_patch("storage-0", true)
        .needs_patch("storage-1", true);

    let layout = fixture.layout();
    assert_eq!(layout.len(), 2);
    for (name, stage_steps) in &layout {
        assert_eq!(name, SW_PATCH_STORAGE_HOSTS);
        assert_eq!(
            stage_steps,
            &steps(&[
                "query-alarms",
                "lock-hosts",
                "sw-patch-hosts",
                "system-stabilize",
                "unlock-hosts",
                "wait-data-sync",
            ])
        );
    }
}

#[test]
fn build_refusals() {
    let mut fixture = Fixture::new(standard_hosts()).needs_patch("compute-0", true);
    fixture.findings.sw_patches.clear();
    assert_eq!(fixture.stages().unwrap_err(), "no software patches found");

    let mut fixture = Fixture::new(standard_hosts()).needs_patch("compute-0", true);
    fixture.findings.alarms.push(Alarm {
        alarm_uuid: "a-1".to_string(),
        alarm_id: "100.101".to_string(),
        entity_instance_id: "host=compute-0".to_string(),
        severity: "major".to_string(),
        reason_text: String::new(),
        timestamp: String::new(),
        mgmt_affecting: true,
    });
    assert_eq!(fixture.stages().unwrap_err(), "active alarms present");

    let mut hosts = standard_hosts();
    hosts[0] = locked_host("controller-0", CPE);
    let fixture = Fixture::new(hosts).needs_patch("compute-0", true);
    assert_eq!(
        fixture.stages().unwrap_err(),
        "all controller,worker hosts must be unlocked-enabled-available"
    );

    let fixture = Fixture::new(standard_hosts()).needs_patch("compute-9", true);
    assert_eq!(fixture.stages().unwrap_err(), "host inventory mismatch detected");

    let mut fixture = Fixture::new(standard_hosts()).needs_patch("compute-0", true);
    fixture.findings.sw_patch_hosts[0].interim_state = true;
    assert_eq!(
        fixture.stages().unwrap_err(),
        "at least one host is in pending patch current state"
    );

    let mut fixture = Fixture::new(standard_hosts()).needs_patch("compute-0", true);
    fixture.findings.sw_patch_hosts[0].patch_current = true;
    assert_eq!(
        fixture.stages().unwrap_err(),
        "no software patches need to be applied"
    );
}

#[test]
fn controller_rules() {
    let mut fixture = Fixture::new(standard_hosts()).needs_patch("controller-0", true);
    fixture.params.controller_apply_type = ApplyType::Parallel;
    assert_eq!(
        fixture.stages().unwrap_err(),
        "parallel apply type not allowed for controllers"
    );

    let fixture =
        Fixture::new(vec![host("controller-0", CONTROLLER)]).needs_patch("controller-0", true);
    assert_eq!(
        fixture.stages().unwrap_err(),
        "not enough controllers to apply software patches"
    );

    let mut fixture =
        Fixture::new(vec![host("controller-0", CONTROLLER)]).needs_patch("controller-0", true);
    fixture.settings.single_controller = true;
    assert_eq!(fixture.stages().unwrap().len(), 1);
}

#[test]
fn single_controller_cpe_cannot_migrate() {
    let mut fixture = Fixture::new(vec![host("controller-0", CPE)]).needs_patch("controller-0", true);
    fixture.settings.single_controller = true;
    fixture.params.default_instance_action = InstanceAction::Migrate;
    assert_eq!(
        fixture.stages().unwrap_err(),
        "cannot migrate instances in a single controller configuration"
    );

    // Stop-start on a single CPE locks without waiting for disabled
    fixture.params.default_instance_action = InstanceAction::StopStart;
    fixture.inventory.upsert_instance(instance("vm-a", "controller-0"));
    let layout = fixture.layout();
    assert_eq!(layout.len(), 1);
    assert_eq!(layout[0].0, SW_PATCH_WORKER_HOSTS);
    assert_eq!(
        layout[0].1,
        steps(&[
            "query-alarms",
            "stop-instances",
            "lock-hosts",
            "sw-patch-hosts",
            "system-stabilize",
            "unlock-hosts",
            "start-instances",
            "system-stabilize",
        ])
    );
}
