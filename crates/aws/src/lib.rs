//! EC2 provisioning backend.
//!
//! Translates a [`ec2_operator_reconciler::ProvisioningRequest`] into one
//! `RunInstances` call and hands back the created instance id.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod provisioner;

pub use provisioner::Ec2Provisioner;
