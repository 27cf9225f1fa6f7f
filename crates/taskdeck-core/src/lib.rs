pub mod api;
pub mod cli;
pub mod commands;
pub mod config;
pub mod duedate;
pub mod error;
pub mod partition;
pub mod progress;
pub mod render;
pub mod session;
pub mod status;
pub mod task;
pub mod view;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let cli = cli::GlobalCli::parse_from(raw_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting taskdeck CLI"
    );

    let cfg = config::Config::load(cli.config.as_deref(), cli.server.as_deref())?;
    debug!(server = %cfg.server_url, "configuration loaded");

    let session_path = config::session_path().context("failed to resolve session path")?;
    let store = session::SessionStore::new(&session_path);
    let mut renderer = render::Renderer::new(&cfg);

    let inv = cli::Invocation::parse(cli.rest)?;

    // The engine itself is synchronous; the API calls are the only
    // suspension points, so a single-threaded runtime is all this needs.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(commands::dispatch(&cfg, &store, &mut renderer, inv))?;

    info!("done");
    Ok(())
}
