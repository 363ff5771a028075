// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Orchestrate subcommands: run selected pipelines or projects in sequence and write their output
// role: processing/orchestrator
// inputs: Settings, selected names, output writer
// outputs: RunSummary (failure count); line protocol or name listings on the writer
// side_effects: Database writes (reconcile); HTTP calls; writes to the given writer
// invariants:
// - Pipelines and projects run strictly one after another
// - A ConfigError aborts the whole run; other pipeline failures are logged and counted
// - Pagination failures still emit the partial buckets and are not counted as failures
// errors: anyhow with pipeline/project context
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::io::Write;

use anyhow::{Context, Result};
use chrono::Utc;

use crate::cadence::{collect_commit_days, write_lines, HttpPageFetcher};
use crate::config::{Backend, SecretSource, Settings};
use crate::error::PipelineError;
use crate::reconcile::run_configured;
use crate::util;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
  pub succeeded: usize,
  pub failed: usize,
}

impl RunSummary {
  pub fn is_clean(&self) -> bool {
    self.failed == 0
  }
}

pub fn run_reconcile(settings: &Settings, names: &[String]) -> Result<RunSummary> {
  let pipelines = settings.select_pipelines(names)?;
  let mut summary = RunSummary::default();

  for pipeline in pipelines {
    match run_configured(settings, pipeline, Utc::now()) {
      Ok(report) => {
        tracing::info!(
          pipeline = %pipeline.name,
          inserted = report.inserted,
          skipped = report.skipped,
          "reconciled"
        );
        summary.succeeded += 1;
      }
      Err(PipelineError::Config(e)) => {
        return Err(e).with_context(|| format!("pipeline `{}`", pipeline.name));
      }
      Err(e) => {
        tracing::error!(pipeline = %pipeline.name, error = %e, "pipeline failed; nothing inserted");
        summary.failed += 1;
      }
    }
  }

  Ok(summary)
}

pub fn run_commits<W: Write>(settings: &Settings, names: &[String], out: &mut W) -> Result<RunSummary> {
  let projects = settings.select_projects(names)?;
  let machine = util::machine_name(settings.machine.as_deref());
  let mut summary = RunSummary::default();

  for project in projects {
    let token = project
      .token_key
      .as_deref()
      .map(|key| settings.secrets.require(key))
      .transpose()
      .with_context(|| format!("project `{}`", project.name))?;

    let fetcher = HttpPageFetcher::new(settings.http_timeout(), token);
    let report = collect_commit_days(&fetcher, project, settings.max_pages);

    write_lines(out, &report, &machine).context("writing line protocol")?;
    summary.succeeded += 1;
  }

  out.flush().context("flushing output")?;

  Ok(summary)
}

pub fn run_list<W: Write>(settings: &Settings, out: &mut W) -> Result<()> {
  for p in &settings.pipelines {
    writeln!(out, "pipeline\t{}\t{}", p.name, p.table)?;
  }

  for p in &settings.projects {
    let backend = match p.backend {
      Backend::Github => "github",
      Backend::Gitlab => "gitlab",
    };
    writeln!(out, "project\t{}\t{}", p.name, backend)?;
  }

  Ok(())
}
