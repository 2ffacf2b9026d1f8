// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Grouping of storage and worker hosts into the lists updated together

use super::params::ApplyType;
use crate::inventory::Inventory;
use crate::nfvi::{Host, HostPersonality};
use std::collections::BTreeMap;

type HostLists = Vec<Vec<Host>>;

/// Storage hosts in update order. Parallel lists never hold two hosts of
/// the same replication group.
pub(crate) fn storage_host_lists(
    apply_type: ApplyType,
    hosts: &[Host],
    inventory: &Inventory,
) -> Result<HostLists, String> {
    if apply_type != ApplyType::Ignore {
        if let Some(host) = hosts.iter().find(|h| !h.has_personality(HostPersonality::Storage)) {
            tracing::error!(host = %host.name, "host inventory personality storage mismatch");
            return Err("host inventory personality storage mismatch detected".to_string());
        }
        if inventory.total_by_personality(HostPersonality::Storage) < 2 {
            tracing::warn!("not enough storage hosts to apply software updates");
            return Err("not enough storage hosts to apply software updates".to_string());
        }
    }

    let mut lists: HostLists = Vec::new();
    match apply_type {
        ApplyType::Serial => lists.extend(hosts.iter().map(|h| vec![h.clone()])),
        ApplyType::Parallel => {
            for host in hosts {
                let slot = lists.iter_mut().find(|list| {
                    !list
                        .iter()
                        .any(|peer| same_replication_group(inventory, &host.name, &peer.name))
                });
                match slot {
                    Some(list) => list.push(host.clone()),
                    None => lists.push(vec![host.clone()]),
                }
            }
        }
        ApplyType::Ignore => tracing::debug!("storage apply type set to ignore"),
    }
    Ok(lists)
}

fn same_replication_group(inventory: &Inventory, a: &str, b: &str) -> bool {
    inventory
        .replication_groups_of_host(a)
        .any(|group| group.member_names.iter().any(|m| m == b))
}

/// Worker hosts in update order, each list at most `max_parallel` long
pub(crate) fn worker_host_lists(
    apply_type: ApplyType,
    hosts: &[Host],
    inventory: &Inventory,
    max_parallel: usize,
    reboot: bool,
) -> Result<HostLists, String> {
    let max_parallel = max_parallel.max(1);

    if apply_type != ApplyType::Ignore {
        if let Some(host) = hosts.iter().find(|h| !h.has_personality(HostPersonality::Worker)) {
            tracing::error!(host = %host.name, "host inventory personality worker mismatch");
            return Err("host inventory personality worker mismatch detected".to_string());
        }

        // Taking down the rest of a group while one member is already
        // stopped would leave the group without service
        if reboot {
            for instance in inventory.instances().filter(|i| i.is_locked()) {
                if let Some(group) = inventory.groups_of_instance(&instance.uuid).next() {
                    tracing::warn!(instance = %instance.name, group = %group.name, "locked instance in group");
                    return Err(format!(
                        "instance {} in group {} must not be shut down",
                        instance.name, group.name
                    ));
                }
            }
        }
    }

    let mut lists: HostLists = Vec::new();
    match apply_type {
        ApplyType::Serial => {
            let (idle, busy): (Vec<&Host>, Vec<&Host>) =
                hosts.iter().partition(|h| !inventory.exist_on_host(&h.name));
            lists.extend(idle.into_iter().chain(busy).map(|h| vec![h.clone()]));
        }
        ApplyType::Parallel => {
            let limits = aggregate_limits(inventory, max_parallel);
            let mut controllers: HostLists = Vec::new();
            lists.push(Vec::new());

            for host in hosts {
                if host.has_personality(HostPersonality::Controller) {
                    // Needs a swact first, so it goes alone
                    controllers.push(vec![host.clone()]);
                    continue;
                }
                if !reboot || !inventory.exist_on_host(&host.name) {
                    lists[0].push(host.clone());
                    continue;
                }

                let slot = lists.iter_mut().skip(1).find(|list| {
                    list.len() < max_parallel
                        && !list.iter().any(|peer| anti_affinity_conflict(inventory, host, peer))
                        && !aggregate_limit_reached(inventory, &limits, list, host)
                });
                match slot {
                    Some(list) => list.push(host.clone()),
                    None => lists.push(vec![host.clone()]),
                }
            }
            lists.extend(controllers);
        }
        ApplyType::Ignore => tracing::debug!("worker apply type set to ignore"),
    }

    Ok(lists
        .into_iter()
        .filter(|list| !list.is_empty())
        .flat_map(|list| {
            list.chunks(max_parallel)
                .map(<[Host]>::to_vec)
                .collect::<Vec<_>>()
        })
        .collect())
}

/// True if an instance on `host` shares an anti-affinity group with one on `peer`
fn anti_affinity_conflict(inventory: &Inventory, host: &Host, peer: &Host) -> bool {
    inventory.instances_on_host(&host.name).any(|instance| {
        inventory
            .groups_of_instance(&instance.uuid)
            .filter(|group| group.is_anti_affinity())
            .any(|group| {
                inventory
                    .instances_on_host(&peer.name)
                    .any(|p| group.member_uuids.contains(&p.uuid))
            })
    })
}

/// How many hosts of each aggregate may be updated together.
///
/// The share is max_parallel over the worker count, capped at one half,
/// rounded down and never below one.
fn aggregate_limits(inventory: &Inventory, max_parallel: usize) -> BTreeMap<String, usize> {
    let workers = inventory.total_by_personality(HostPersonality::Worker).max(1);
    let ratio = (max_parallel as f64 / workers as f64).min(0.5);

    inventory
        .host_aggregates()
        .iter()
        .map(|aggregate| {
            let count = aggregate.host_names.len();
            let limit = if count == 1 {
                1
            } else {
                ((count as f64 * ratio) as usize).max(1)
            };
            (aggregate.name.clone(), limit)
        })
        .collect()
}

fn aggregate_limit_reached(
    inventory: &Inventory,
    limits: &BTreeMap<String, usize>,
    list: &[Host],
    host: &Host,
) -> bool {
    inventory
        .host_aggregates()
        .iter()
        .filter(|aggregate| aggregate.host_names.contains(&host.name))
        .any(|aggregate| {
            let in_list = list
                .iter()
                .filter(|h| aggregate.host_names.contains(&h.name))
                .count();
            in_list > 0 && limits.get(&aggregate.name).is_some_and(|limit| in_list >= *limit)
        })
}

#[cfg(test)]
#[path = "host_lists_tests.rs"]
mod tests;
