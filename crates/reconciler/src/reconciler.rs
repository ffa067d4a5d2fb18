//! Reconciler implementation.

use std::sync::Arc;

use async_trait::async_trait;
use ec2_operator_core::GenericResultExt;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::store::RecordStore;
use crate::types::{InstanceId, InstanceStatus, ProvisioningRequest, ReconcileOutcome, RecordKey};

/// Trait for creating compute instances at a provider.
#[async_trait]
pub trait InstanceProvisioner: Send + Sync {
    /// Create exactly one instance and return its identifier.
    async fn create_instance(&self, request: &ProvisioningRequest) -> Result<InstanceId>;
}

/// K8s-style reconciler for `EC2Instance` records.
///
/// One call handles one key. The dispatcher is expected to serialize calls
/// for the same key and to own retry and backoff; every error is handed
/// back to it unchanged.
pub struct Reconciler {
    /// Desired-state record store.
    store: Arc<dyn RecordStore>,
    /// Provisioning backend.
    provisioner: Arc<dyn InstanceProvisioner>,
}

impl Reconciler {
    /// Create a new reconciler.
    pub fn new(store: Arc<dyn RecordStore>, provisioner: Arc<dyn InstanceProvisioner>) -> Self {
        Self { store, provisioner }
    }

    /// Converge one record: create its instance unless one is already
    /// recorded, then record the new instance id in status.
    ///
    /// Makes at most one create call and at most one status write.
    ///
    /// # Errors
    ///
    /// Store, provisioning, and status-write failures are returned as-is.
    /// A failed status write after a successful create leaves the instance
    /// unrecorded; the next attempt reuses the same client token.
    pub async fn reconcile(&self, key: &RecordKey) -> Result<ReconcileOutcome> {
        let record = match self.store.get(key).await {
            Ok(Some(record)) => record,
            Ok(None) | Err(Error::RecordNotFound { .. }) => {
                debug!(key = %key, "Record not found, nothing to reconcile");
                return Ok(ReconcileOutcome::RecordMissing);
            }
            Err(e) => return Err(e),
        };

        if record.status.is_provisioned() {
            debug!(
                key = %key,
                instance_id = %record.status.instance_id,
                "Instance already provisioned"
            );
            return Ok(ReconcileOutcome::AlreadyProvisioned {
                instance_id: InstanceId::new(record.status.instance_id),
            });
        }

        let request = ProvisioningRequest::from_record(&record);
        info!(
            key = %key,
            image_id = %request.image_id,
            instance_type = %request.instance_type,
            subnet_id = %request.subnet_id,
            tags = request.tags.len(),
            "Creating a new EC2 instance"
        );

        let instance_id = self
            .provisioner
            .create_instance(&request)
            .await
            .and_then(|id| {
                if id.is_empty() {
                    Err(Error::EmptyProvisioningResponse)
                } else {
                    Ok(id)
                }
            })
            .tap_err(|e| error!(key = %key, error = %e, "Failed to create EC2 instance"))?;

        info!(key = %key, instance_id = %instance_id, "Created EC2 instance");

        let status = InstanceStatus::provisioned(&instance_id);
        self.store
            .update_status(&record.meta, &status)
            .await
            .tap_err(|e| {
                error!(
                    key = %key,
                    instance_id = %instance_id,
                    error = %e,
                    "Instance created but status update failed"
                );
            })?;

        Ok(ReconcileOutcome::Provisioned { instance_id })
    }
}

/// Builder for Reconciler.
#[derive(Default)]
pub struct ReconcilerBuilder {
    store: Option<Arc<dyn RecordStore>>,
    provisioner: Option<Arc<dyn InstanceProvisioner>>,
}

impl ReconcilerBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the record store.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn RecordStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the provisioner.
    #[must_use]
    pub fn with_provisioner(mut self, provisioner: Arc<dyn InstanceProvisioner>) -> Self {
        self.provisioner = Some(provisioner);
        self
    }

    /// Build the reconciler.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if a collaborator is missing.
    pub fn build(self) -> Result<Reconciler> {
        let store = self
            .store
            .ok_or_else(|| Error::invalid_config("record store is required"))?;

        let provisioner = self
            .provisioner
            .ok_or_else(|| Error::invalid_config("provisioner is required"))?;

        Ok(Reconciler::new(store, provisioner))
    }
}
