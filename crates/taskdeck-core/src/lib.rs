pub mod cli;
pub mod color_scheme;
pub mod commands;
pub mod config;
pub mod datastore;
pub mod datetime;
pub mod document;
pub mod filter;
pub mod locale;
pub mod render;
pub mod session;
pub mod settings;
pub mod sort;
pub mod state;
pub mod storage;
pub mod tasks;
pub mod theme;
pub mod view;

use std::ffi::OsString;
use std::io;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use tracing::{
  debug,
  info
};

pub use crate::state::{
  AppState,
  Host,
  SharedAppState
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting taskdeck CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.rc_file.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );

  let data_dir =
    config::resolve_data_dir(
      &cfg,
      cli.data.as_deref()
    )
    .context(
      "failed to resolve data \
       directory"
    )?;

  let renderer =
    render::Renderer::new(&cfg)?;
  let mut workspace =
    commands::Workspace::open(
      &cfg, &data_dir, renderer
    )
    .with_context(|| {
      format!(
        "failed to open workspace at \
         {}",
        data_dir.display()
      )
    })?;

  let command =
    cli.command.unwrap_or_else(|| {
      cli::Command::Task(
        cli::TaskCommand::List(
          cli::TaskListArgs::default()
        )
      )
    });

  let mut out = io::stdout().lock();
  commands::dispatch(
    &mut workspace,
    command,
    Utc::now(),
    &mut out
  )?;

  info!("done");
  Ok(())
}
