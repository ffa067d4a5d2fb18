#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # ec2-operator
//!
//! Kubernetes operator that launches one EC2 instance per `EC2Instance`
//! object and records the instance id in the object's status.

pub mod cli;
pub mod controller;
