// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Last-known view of hosts, instances and their groupings
//!
//! Steps read the inventory to decide whether a host or instance has
//! reached its target state. The director keeps it current from audit
//! and state-change events.

use crate::nfvi::{Host, HostAggregate, HostGroup, HostGroupPolicy, HostPersonality, Instance, InstanceGroup};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    hosts: BTreeMap<String, Host>,
    /// Keyed by uuid
    #[serde(default)]
    instances: BTreeMap<String, Instance>,
    #[serde(default)]
    instance_groups: Vec<InstanceGroup>,
    #[serde(default)]
    host_groups: Vec<HostGroup>,
    #[serde(default)]
    host_aggregates: Vec<HostAggregate>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hosts(mut self, hosts: impl IntoIterator<Item = Host>) -> Self {
        for host in hosts {
            self.upsert_host(host);
        }
        self
    }

    pub fn with_instances(mut self, instances: impl IntoIterator<Item = Instance>) -> Self {
        for instance in instances {
            self.upsert_instance(instance);
        }
        self
    }

    pub fn with_instance_groups(mut self, groups: Vec<InstanceGroup>) -> Self {
        self.instance_groups = groups;
        self
    }

    pub fn with_host_groups(mut self, groups: Vec<HostGroup>) -> Self {
        self.host_groups = groups;
        self
    }

    pub fn with_host_aggregates(mut self, aggregates: Vec<HostAggregate>) -> Self {
        self.host_aggregates = aggregates;
        self
    }

    pub fn upsert_host(&mut self, host: Host) {
        self.hosts.insert(host.name.clone(), host);
    }

    pub fn remove_host(&mut self, name: &str) -> Option<Host> {
        self.hosts.remove(name)
    }

    pub fn upsert_instance(&mut self, instance: Instance) {
        self.instances.insert(instance.uuid.clone(), instance);
    }

    pub fn remove_instance(&mut self, uuid: &str) -> Option<Instance> {
        self.instances.remove(uuid)
    }

    /// Replace hosts and instances with a fresh audit snapshot
    pub fn replace(&mut self, hosts: Vec<Host>, instances: Vec<Instance>) {
        self.hosts = hosts.into_iter().map(|h| (h.name.clone(), h)).collect();
        self.instances = instances.into_iter().map(|i| (i.uuid.clone(), i)).collect();
    }

    pub fn host(&self, name: &str) -> Option<&Host> {
        self.hosts.get(name)
    }

    pub fn hosts(&self) -> impl Iterator<Item = &Host> {
        self.hosts.values()
    }

    pub fn instance(&self, uuid: &str) -> Option<&Instance> {
        self.instances.get(uuid)
    }

    pub fn instance_by_name(&self, name: &str) -> Option<&Instance> {
        self.instances.values().find(|i| i.name == name)
    }

    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values()
    }

    pub fn instances_on_host<'a>(&'a self, host_name: &'a str) -> impl Iterator<Item = &'a Instance> + 'a {
        self.instances.values().filter(move |i| i.host_name == host_name)
    }

    /// True if any instance is placed on the host
    pub fn exist_on_host(&self, host_name: &str) -> bool {
        self.instances_on_host(host_name).next().is_some()
    }

    pub fn total_by_personality(&self, personality: HostPersonality) -> usize {
        self.hosts
            .values()
            .filter(|h| h.has_personality(personality))
            .count()
    }

    pub fn instance_groups(&self) -> &[InstanceGroup] {
        &self.instance_groups
    }

    /// Groups the instance is a member of
    pub fn groups_of_instance<'a>(&'a self, uuid: &'a str) -> impl Iterator<Item = &'a InstanceGroup> + 'a {
        self.instance_groups
            .iter()
            .filter(move |g| g.member_uuids.iter().any(|m| m == uuid))
    }

    /// Storage-replication groups the host belongs to
    pub fn replication_groups_of_host<'a>(&'a self, host_name: &'a str) -> impl Iterator<Item = &'a HostGroup> + 'a {
        self.host_groups.iter().filter(move |g| {
            g.policies.contains(&HostGroupPolicy::StorageReplication)
                && g.member_names.iter().any(|m| m == host_name)
        })
    }

    pub fn host_aggregates(&self) -> &[HostAggregate] {
        &self.host_aggregates
    }
}

#[cfg(test)]
#[path = "inventory_tests.rs"]
mod tests;
