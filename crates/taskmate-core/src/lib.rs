pub mod cli;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod filter;
pub mod render;
pub mod seed;
pub mod store;
pub mod task;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

pub use controller::{Notice, NoticeLevel, TaskController, ViewState};
pub use error::{ErrorKind, StoreError, TaskError, ValidationError};
pub use filter::{CategoryFilter, filter_tasks};
pub use store::TaskStore;
pub use task::{Category, Task, TaskFormData, TaskId, TaskPatch};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let pre = cli::preprocess_args(&raw_args)?;
    let cli = cli::GlobalCli::parse_from(pre.cleaned_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(verbose = cli.verbose, quiet = cli.quiet, "starting taskmate");
    debug!(?pre.rc_overrides, "preprocessed rc overrides");

    let mut cfg = config::Config::load(cli.taskmaterc.as_deref())?;
    cfg.apply_overrides(
        pre.rc_overrides
            .into_iter()
            .chain(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value))),
    );

    let settings = config::StoreSettings::from_config(&cfg, cli.data.as_deref())
        .context("failed to resolve store settings")?;
    let mut renderer = render::Renderer::new(&cfg)?;
    let command = cli.command.unwrap_or_default();

    // One logical thread of control: every store call is awaited on this runtime.
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let store = store::open(&settings).context("failed to open task store")?;
        let mut controller = TaskController::new(store);
        commands::dispatch(&mut controller, &cfg, &mut renderer, command).await
    })?;

    info!("done");
    Ok(())
}
