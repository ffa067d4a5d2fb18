//! CLI command definitions using clap.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// EC2 operator
#[derive(Parser, Debug)]
#[command(name = "ec2-operator")]
#[command(version)]
#[command(about = "Provision EC2 instances from EC2Instance resources")]
#[command(
    long_about = "Watches EC2Instance objects and launches one EC2 instance per object, recording the instance id in the object's status."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller until interrupted
    Run {
        /// Only watch this namespace (all namespaces when omitted)
        #[arg(short, long)]
        namespace: Option<String>,

        /// Configuration file (TOML, or JSON with a .json extension)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Print the EC2Instance CustomResourceDefinition as YAML
    Crd,
}
