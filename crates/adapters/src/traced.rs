// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced plugin wrapper for consistent observability

use crate::nfvi::{NfviError, NfviPlugin};
use async_trait::async_trait;
use nfv_core::nfvi::{
    Alarm, Host, HostAggregate, HostGroup, HostService, HostSwPatch, Instance, InstanceGroup,
    SwPatch, Upgrade,
};
use std::future::Future;
use std::time::Instant;
use tracing::{Instrument, Span};

/// Wrapper that adds tracing to any NfviPlugin
#[derive(Clone)]
pub struct TracedNfvi<P> {
    inner: P,
}

impl<P> TracedNfvi<P> {
    pub fn new(inner: P) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

/// State-changing operation: logged at info, failures at error
async fn op<F>(span: Span, fut: F) -> Result<(), NfviError>
where
    F: Future<Output = Result<(), NfviError>>,
{
    async move {
        tracing::info!("starting");
        let start = Instant::now();
        let result = fut.await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(()) => tracing::info!(elapsed_ms, "done"),
            Err(e) => tracing::error!(elapsed_ms, error = %e, "failed"),
        }
        result
    }
    .instrument(span)
    .await
}

/// Read-only query: logged at debug
async fn query<T, F>(span: Span, fut: F) -> Result<T, NfviError>
where
    F: Future<Output = Result<T, NfviError>>,
{
    async move {
        let start = Instant::now();
        let result = fut.await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::debug!(elapsed_ms, "answered"),
            Err(e) => tracing::warn!(elapsed_ms, error = %e, "query failed"),
        }
        result
    }
    .instrument(span)
    .await
}

#[async_trait]
impl<P: NfviPlugin> NfviPlugin for TracedNfvi<P> {
    async fn lock_host(&self, host_name: &str) -> Result<(), NfviError> {
        op(tracing::info_span!("nfvi.lock_host", host_name), self.inner.lock_host(host_name)).await
    }

    async fn unlock_host(&self, host_name: &str) -> Result<(), NfviError> {
        op(tracing::info_span!("nfvi.unlock_host", host_name), self.inner.unlock_host(host_name)).await
    }

    async fn reboot_host(&self, host_name: &str) -> Result<(), NfviError> {
        op(tracing::info_span!("nfvi.reboot_host", host_name), self.inner.reboot_host(host_name)).await
    }

    async fn swact_host(&self, host_name: &str) -> Result<(), NfviError> {
        op(tracing::info_span!("nfvi.swact_host", host_name), self.inner.swact_host(host_name)).await
    }

    async fn upgrade_host(&self, host_name: &str) -> Result<(), NfviError> {
        op(tracing::info_span!("nfvi.upgrade_host", host_name), self.inner.upgrade_host(host_name)).await
    }

    async fn disable_host_services(&self, host_name: &str, service: HostService) -> Result<(), NfviError> {
        let span = tracing::info_span!("nfvi.disable_host_services", host_name, %service);
        op(span, self.inner.disable_host_services(host_name, service)).await
    }

    async fn enable_host_services(&self, host_name: &str, service: HostService) -> Result<(), NfviError> {
        let span = tracing::info_span!("nfvi.enable_host_services", host_name, %service);
        op(span, self.inner.enable_host_services(host_name, service)).await
    }

    async fn migrate_instance(&self, instance_uuid: &str) -> Result<(), NfviError> {
        let span = tracing::info_span!("nfvi.migrate_instance", instance_uuid);
        op(span, self.inner.migrate_instance(instance_uuid)).await
    }

    async fn stop_instance(&self, instance_uuid: &str) -> Result<(), NfviError> {
        let span = tracing::info_span!("nfvi.stop_instance", instance_uuid);
        op(span, self.inner.stop_instance(instance_uuid)).await
    }

    async fn start_instance(&self, instance_uuid: &str) -> Result<(), NfviError> {
        let span = tracing::info_span!("nfvi.start_instance", instance_uuid);
        op(span, self.inner.start_instance(instance_uuid)).await
    }

    async fn get_alarms(&self) -> Result<Vec<Alarm>, NfviError> {
        query(tracing::debug_span!("nfvi.get_alarms"), self.inner.get_alarms()).await
    }

    async fn get_sw_patches(&self) -> Result<Vec<SwPatch>, NfviError> {
        query(tracing::debug_span!("nfvi.get_sw_patches"), self.inner.get_sw_patches()).await
    }

    async fn get_sw_patch_hosts(&self) -> Result<Vec<HostSwPatch>, NfviError> {
        query(tracing::debug_span!("nfvi.get_sw_patch_hosts"), self.inner.get_sw_patch_hosts()).await
    }

    async fn update_sw_patch_hosts(&self, host_names: &[String]) -> Result<(), NfviError> {
        let span = tracing::info_span!("nfvi.update_sw_patch_hosts", hosts = %host_names.join(","));
        op(span, self.inner.update_sw_patch_hosts(host_names)).await
    }

    async fn get_upgrade(&self) -> Result<Option<Upgrade>, NfviError> {
        query(tracing::debug_span!("nfvi.get_upgrade"), self.inner.get_upgrade()).await
    }

    async fn upgrade_start(&self) -> Result<(), NfviError> {
        op(tracing::info_span!("nfvi.upgrade_start"), self.inner.upgrade_start()).await
    }

    async fn upgrade_activate(&self) -> Result<(), NfviError> {
        op(tracing::info_span!("nfvi.upgrade_activate"), self.inner.upgrade_activate()).await
    }

    async fn upgrade_complete(&self) -> Result<(), NfviError> {
        op(tracing::info_span!("nfvi.upgrade_complete"), self.inner.upgrade_complete()).await
    }

    async fn get_hosts(&self) -> Result<Vec<Host>, NfviError> {
        query(tracing::debug_span!("nfvi.get_hosts"), self.inner.get_hosts()).await
    }

    async fn get_instances(&self) -> Result<Vec<Instance>, NfviError> {
        query(tracing::debug_span!("nfvi.get_instances"), self.inner.get_instances()).await
    }

    async fn get_instance_groups(&self) -> Result<Vec<InstanceGroup>, NfviError> {
        query(tracing::debug_span!("nfvi.get_instance_groups"), self.inner.get_instance_groups()).await
    }

    async fn get_host_groups(&self) -> Result<Vec<HostGroup>, NfviError> {
        query(tracing::debug_span!("nfvi.get_host_groups"), self.inner.get_host_groups()).await
    }

    async fn get_host_aggregates(&self) -> Result<Vec<HostAggregate>, NfviError> {
        query(tracing::debug_span!("nfvi.get_host_aggregates"), self.inner.get_host_aggregates()).await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
