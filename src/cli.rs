use anyhow::{bail, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

use crate::config::ENV_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(
    name = "release-metrics",
    version,
    about = "Reconcile QA milestone results into reporting tables and emit commit cadence metrics",
    long_about = None
)]
pub struct Cli {
  /// Settings file (TOML or JSON); defaults to $RELEASE_METRICS_CONFIG, then ./release-metrics.{toml,json}
  #[arg(long, global = true)]
  pub config: Option<PathBuf>,

  /// More log output on stderr (-v debug, -vv trace)
  #[arg(short, long, action = ArgAction::Count, global = true)]
  pub verbose: u8,

  /// Only log errors
  #[arg(short, long, global = true, conflicts_with = "verbose")]
  pub quiet: bool,

  /// Emit a troff man page to stdout (internal; for packaging)
  #[arg(long, hide = true)]
  pub gen_man: bool,

  #[command(subcommand)]
  pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
  /// Run reconciliation pipelines (all configured pipelines when none are named)
  Reconcile {
    /// Pipeline names, e.g. performance alp realtime
    names: Vec<String>,
  },

  /// Print commit-per-day line protocol for projects (all when none are named)
  Commits {
    /// Project names as configured, e.g. SUSE/qa-testsuites
    names: Vec<String>,
  },

  /// Print configured pipeline and project names
  List,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectiveConfig {
  /// Explicit settings file (flag or environment); `None` means search `search_dir`.
  pub config_file: Option<PathBuf>,
  pub search_dir: PathBuf,
  pub verbose: u8,
  pub quiet: bool,
  pub command: Command,
}

pub fn normalize(cli: Cli) -> Result<EffectiveConfig> {
  let Some(command) = cli.command else {
    bail!("Provide a subcommand: reconcile, commits or list (see --help)")
  };

  let config_file = cli.config.or_else(|| {
    std::env::var_os(ENV_CONFIG_PATH)
      .filter(|v| !v.is_empty())
      .map(PathBuf::from)
  });

  let search_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

  Ok(EffectiveConfig {
    config_file,
    search_dir,
    verbose: cli.verbose,
    quiet: cli.quiet,
    command,
  })
}
