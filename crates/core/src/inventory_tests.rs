// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{host, instance};

#[test]
fn instances_are_found_by_host() {
    let inventory = Inventory::new()
        .with_hosts([
            host("compute-0", &[HostPersonality::Worker]),
            host("compute-1", &[HostPersonality::Worker]),
        ])
        .with_instances([instance("vm-0", "compute-0"), instance("vm-1", "compute-0")]);

    assert!(inventory.exist_on_host("compute-0"));
    assert!(!inventory.exist_on_host("compute-1"));
    assert_eq!(inventory.instances_on_host("compute-0").count(), 2);
}

#[test]
fn personality_totals_count_cpe_hosts_twice() {
    let inventory = Inventory::new().with_hosts([
        host(
            "controller-0",
            &[HostPersonality::Controller, HostPersonality::Worker],
        ),
        host("compute-0", &[HostPersonality::Worker]),
    ]);

    assert_eq!(inventory.total_by_personality(HostPersonality::Controller), 1);
    assert_eq!(inventory.total_by_personality(HostPersonality::Worker), 2);
    assert_eq!(inventory.total_by_personality(HostPersonality::Storage), 0);
}

#[test]
fn replace_drops_hosts_missing_from_audit() {
    let mut inventory = Inventory::new().with_hosts([
        host("compute-0", &[HostPersonality::Worker]),
        host("compute-1", &[HostPersonality::Worker]),
    ]);

    inventory.replace(vec![host("compute-1", &[HostPersonality::Worker])], vec![]);

    assert!(inventory.host("compute-0").is_none());
    assert!(inventory.host("compute-1").is_some());
}

#[test]
fn replication_groups_match_only_storage_replication_policy() {
    let inventory = Inventory::new().with_host_groups(vec![
        HostGroup {
            name: "group-0".to_string(),
            member_names: vec!["storage-0".to_string(), "storage-1".to_string()],
            policies: vec![HostGroupPolicy::StorageReplication],
        },
        HostGroup {
            name: "other".to_string(),
            member_names: vec!["storage-0".to_string()],
            policies: vec![],
        },
    ]);

    let groups: Vec<_> = inventory
        .replication_groups_of_host("storage-0")
        .map(|g| g.name.as_str())
        .collect();
    assert_eq!(groups, vec!["group-0"]);
}
