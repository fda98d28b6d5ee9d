//! Offline emergency-report queue: reports that cannot be sent right away are
//! buffered on the device and reconciled with the remote service once the
//! network and a location fix are available again.

pub mod app;
mod cli;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod location;
pub mod models;
pub mod permission;
pub mod queue;
pub mod reconcile;
pub mod reporter;
pub mod settings;
pub mod submission;
pub mod utils;

use anyhow::Context;
use clap::Parser;

pub use app::{AppState, Collaborators};
pub use cli::Cli;

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(cli::execute(cli))
}
