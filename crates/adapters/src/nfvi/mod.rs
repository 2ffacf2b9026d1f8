// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The infrastructure boundary: hosts, instances, patching and upgrades

mod lab;

pub use lab::{LabFailure, LabInventory, LabNfvi};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeNfvi, NfviCall};

use async_trait::async_trait;
use nfv_core::nfvi::{
    Alarm, Host, HostAggregate, HostGroup, HostService, HostSwPatch, Instance, InstanceGroup,
    SwPatch, Upgrade,
};
use thiserror::Error;

/// Errors from infrastructure operations
#[derive(Debug, Error)]
pub enum NfviError {
    #[error("host not found: {0}")]
    HostNotFound(String),
    #[error("instance not found: {0}")]
    InstanceNotFound(String),
    #[error("{op} failed: {reason}")]
    OperationFailed { op: String, reason: String },
    #[error("lab inventory {path}: {reason}")]
    Lab { path: String, reason: String },
}

impl NfviError {
    pub fn failed(op: &str, reason: impl Into<String>) -> Self {
        NfviError::OperationFailed {
            op: op.to_string(),
            reason: reason.into(),
        }
    }
}

/// Operations the orchestrator needs from the infrastructure.
///
/// Host and instance operations act on one target at a time so each
/// failure can be reported against its host.
#[async_trait]
pub trait NfviPlugin: Clone + Send + Sync + 'static {
    async fn lock_host(&self, host_name: &str) -> Result<(), NfviError>;

    async fn unlock_host(&self, host_name: &str) -> Result<(), NfviError>;

    async fn reboot_host(&self, host_name: &str) -> Result<(), NfviError>;

    /// Move active services off `host_name`
    async fn swact_host(&self, host_name: &str) -> Result<(), NfviError>;

    async fn upgrade_host(&self, host_name: &str) -> Result<(), NfviError>;

    async fn disable_host_services(&self, host_name: &str, service: HostService) -> Result<(), NfviError>;

    async fn enable_host_services(&self, host_name: &str, service: HostService) -> Result<(), NfviError>;

    async fn migrate_instance(&self, instance_uuid: &str) -> Result<(), NfviError>;

    async fn stop_instance(&self, instance_uuid: &str) -> Result<(), NfviError>;

    async fn start_instance(&self, instance_uuid: &str) -> Result<(), NfviError>;

    async fn get_alarms(&self) -> Result<Vec<Alarm>, NfviError>;

    async fn get_sw_patches(&self) -> Result<Vec<SwPatch>, NfviError>;

    async fn get_sw_patch_hosts(&self) -> Result<Vec<HostSwPatch>, NfviError>;

    /// Apply the current patches to `host_names`
    async fn update_sw_patch_hosts(&self, host_names: &[String]) -> Result<(), NfviError>;

    async fn get_upgrade(&self) -> Result<Option<Upgrade>, NfviError>;

    async fn upgrade_start(&self) -> Result<(), NfviError>;

    async fn upgrade_activate(&self) -> Result<(), NfviError>;

    async fn upgrade_complete(&self) -> Result<(), NfviError>;

    async fn get_hosts(&self) -> Result<Vec<Host>, NfviError>;

    async fn get_instances(&self) -> Result<Vec<Instance>, NfviError>;

    async fn get_instance_groups(&self) -> Result<Vec<InstanceGroup>, NfviError>;

    async fn get_host_groups(&self) -> Result<Vec<HostGroup>, NfviError>;

    async fn get_host_aggregates(&self) -> Result<Vec<HostAggregate>, NfviError>;
}
