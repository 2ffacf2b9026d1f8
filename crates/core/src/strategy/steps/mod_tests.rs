// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::nfvi::HostPersonality;
use crate::test_support::{host, instance};
use std::time::Duration;

fn alarm(alarm_id: &str, mgmt_affecting: bool) -> Alarm {
    Alarm {
        alarm_uuid: format!("{}-uuid", alarm_id),
        alarm_id: alarm_id.to_string(),
        entity_instance_id: "host=compute-0".to_string(),
        severity: "minor".to_string(),
        reason_text: String::new(),
        timestamp: String::new(),
        mgmt_affecting,
    }
}

#[test]
fn entities_keep_names_and_uuids_aligned() {
    let hosts = [
        host("compute-0", &[HostPersonality::Worker]),
        host("compute-1", &[HostPersonality::Worker]),
    ];
    let entities = Entities::hosts(&hosts);

    assert_eq!(entities.entity_type, EntityType::Hosts);
    assert_eq!(entities.names(), ["compute-0", "compute-1"]);
    assert_eq!(entities.uuids(), ["compute-0-uuid", "compute-1-uuid"]);
    assert!(entities.contains_name("compute-1"));
    assert!(!entities.contains_name("compute-2"));

    let vms = [instance("vm-a", "compute-0")];
    let entities = Entities::instances(&vms);
    assert_eq!(entities.entity_type, EntityType::Instances);
    assert_eq!(entities.uuids(), ["vm-a-uuid"]);
}

#[test]
fn entities_wire_format() {
    let none = serde_json::to_value(Entities::none()).unwrap();
    assert_eq!(
        none,
        serde_json::json!({"entity-type": "", "entity-names": [], "entity-uuids": []})
    );

    let restored: Entities = serde_json::from_value(serde_json::json!({
        "entity-type": "instances",
        "entity-names": ["vm-a"],
        "entity-uuids": ["vm-a-uuid"],
    }))
    .unwrap();
    assert_eq!(restored.entity_type.as_str(), "instances");
    assert_eq!(restored.names(), ["vm-a"]);
}

#[test]
fn filter_alarms_strict_keeps_all_but_ignored() {
    let alarms = vec![alarm("100.101", false), alarm("900.001", true)];
    let kept = filter_alarms(alarms, &["900.001".to_string()], AlarmRestrictions::Strict);
    assert_eq!(kept, vec![alarm("100.101", false)]);
}

#[test]
fn filter_alarms_relaxed_drops_non_mgmt_affecting() {
    let alarms = vec![alarm("100.101", false), alarm("200.001", true)];
    let kept = filter_alarms(alarms, &[], AlarmRestrictions::Relaxed);
    assert_eq!(kept, vec![alarm("200.001", true)]);
}

#[test]
fn wait_window_starts_at_first_call() {
    let start = Instant::now();
    let mut window = WaitWindow::default();

    assert_eq!(window.elapsed_secs(start + Duration::from_secs(30)), 0.0);
    assert_eq!(window.elapsed_secs(start + Duration::from_secs(150)), 120.0);
}
