//! # Command-line Flags
//!
//! Process flags for the updater binary.

use crate::constants::DEFAULT_PORT;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "webhook-ca-updater")]
#[command(about = "Keeps an admission webhook's caBundle in sync with a CA file on disk", long_about = None)]
#[command(version)]
pub struct Args {
    /// Port on which the process listens to commands
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Absolute path to the kubeconfig file (in-cluster configuration when omitted)
    #[arg(short = 'c', long)]
    pub kubeconfig: Option<PathBuf>,
}

impl Args {
    /// Reject a kubeconfig path that is missing or not a regular file
    pub fn validate(&self) -> Result<()> {
        if let Some(path) = &self.kubeconfig {
            let metadata = std::fs::metadata(path)
                .with_context(|| format!("cannot access kubeconfig '{}'", path.display()))?;
            if metadata.is_dir() {
                bail!("kubeconfig '{}' does not point to a file", path.display());
            }
        }
        Ok(())
    }
}
