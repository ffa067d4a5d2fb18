//! K8s-style reconciliation for `EC2Instance` records.
//!
//! This crate implements a level-triggered reconcile step inspired by
//! Kubernetes controllers:
//!
//! - **Desired State**: An `EC2Instance` record (image, size, subnet, tags)
//! - **Observed State**: The record's status (`instanceID`, `state`)
//! - **Guard**: A non-empty `instanceID` means the work is done
//! - **Action**: Create one instance and record its id
//!
//! # Key Concepts
//!
//! ## Reconciliation
//!
//! Each call to [`Reconciler::reconcile`]:
//! 1. Fetches the record by key (missing records are a no-op)
//! 2. Stops if the status already carries an instance id
//! 3. Builds a [`ProvisioningRequest`] from the spec
//! 4. Asks the [`InstanceProvisioner`] for exactly one instance
//! 5. Writes `{instanceID, state: "running"}` back through the [`RecordStore`]
//!
//! Retry, backoff, and per-key serialization belong to whatever dispatches
//! reconcile calls. Errors are returned unchanged for it to act on.
//!
//! # Example
//!
//! ```ignore
//! use ec2_operator_reconciler::{
//!     DesiredStateRecord, InMemoryRecordStore, InstanceSpec, RecordKey, RecordMeta,
//!     ReconcilerBuilder,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let store = InMemoryRecordStore::new_arc();
//!     store
//!         .insert(DesiredStateRecord::new(
//!             RecordMeta::new("default", "web-1"),
//!             InstanceSpec::new("ami-123", "t3.micro", "subnet-abc").with_tag("env", "prod"),
//!         ))
//!         .await;
//!
//!     let reconciler = ReconcilerBuilder::new()
//!         .with_store(store)
//!         .with_provisioner(Arc::new(my_provisioner))
//!         .build()?;
//!
//!     let outcome = reconciler.reconcile(&RecordKey::new("default", "web-1")).await?;
//! }
//! ```

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod reconciler;
pub mod store;
pub mod types;

// Re-export main types
pub use error::{Error, Result};
pub use reconciler::{InstanceProvisioner, Reconciler, ReconcilerBuilder};
pub use store::{InMemoryRecordStore, RecordStore, TracingRecordStore};
pub use types::{
    DesiredStateRecord, INSTANCE_COUNT, InstanceId, InstanceSpec, InstanceStatus,
    ProvisioningRequest, RUNNING_STATE, ReconcileOutcome, RecordKey, RecordMeta, Tag,
    client_token_for,
};
