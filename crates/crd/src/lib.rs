//! `EC2Instance` custom resource and its Kubernetes-backed record store.
//!
//! The reconciler never sees kube types; this crate translates between the
//! custom resource and the reconciler's records.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod resource;
pub mod store;

pub use resource::{Ec2Instance, Ec2InstanceSpec, Ec2InstanceStatus, GROUP, VERSION};
pub use store::KubeRecordStore;
