use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;

use release_metrics::cli::{normalize, Cli, Command, EffectiveConfig};
use release_metrics::config::{Settings, SettingsLoader};
use release_metrics::{logging, runner, util};

fn main() -> ExitCode {
  let cli = Cli::parse();

  if cli.gen_man {
    return match util::render_man_page::<Cli>() {
      Ok(page) => {
        print!("{}", page);
        ExitCode::SUCCESS
      }
      Err(e) => {
        eprintln!("error: {e:#}");
        ExitCode::FAILURE
      }
    };
  }

  // Phase 1: normalize CLI
  let cfg = match normalize(cli) {
    Ok(cfg) => cfg,
    Err(e) => {
      eprintln!("error: {e:#}");
      return ExitCode::from(2);
    }
  };

  // Phase 2: settings, then logging at the configured level
  let settings = load_settings(&cfg);
  let level = settings.as_ref().map(|s| s.log_level).unwrap_or_default();
  logging::init(logging::env_filter(cfg.quiet, cfg.verbose, level.as_str()));

  let settings = match settings {
    Ok(s) => s,
    Err(e) => {
      tracing::error!(error = %format!("{e:#}"), "configuration unusable");
      return ExitCode::FAILURE;
    }
  };

  // Phase 3: run the subcommand
  match dispatch(&cfg.command, &settings) {
    Ok(true) => ExitCode::SUCCESS,
    Ok(false) => ExitCode::FAILURE,
    Err(e) => {
      tracing::error!(error = %format!("{e:#}"), "run aborted");
      ExitCode::FAILURE
    }
  }
}

fn load_settings(cfg: &EffectiveConfig) -> Result<Settings> {
  let loader = match &cfg.config_file {
    Some(path) => SettingsLoader::new().with_file(path),
    None => SettingsLoader::new().with_search_dir(&cfg.search_dir),
  };

  Ok(loader.load()?)
}

fn dispatch(command: &Command, settings: &Settings) -> Result<bool> {
  let stdout = std::io::stdout();
  let mut out = stdout.lock();

  match command {
    Command::Reconcile { names } => Ok(runner::run_reconcile(settings, names)?.is_clean()),
    Command::Commits { names } => Ok(runner::run_commits(settings, names, &mut out)?.is_clean()),
    Command::List => {
      runner::run_list(settings, &mut out)?;
      Ok(true)
    }
  }
}
