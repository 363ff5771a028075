// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Milestone Reconciler: join source counts with bug counts, skip milestones already recorded, commit the rest at once
// role: orchestration/reconcile
// inputs: SourceCounts, BugCounts, DestinationStore, processing instant
// outputs: ReconcileReport {inserted, skipped}
// side_effects: One destination transaction per pipeline run
// invariants:
// - One summary per source milestone; zero totals are kept
// - bug_count falls back to 0 when the annotation map has no entry
// - Existing milestones are skipped (info log), never updated
// - Staged rows are committed together or not at all
// errors: PipelineError (Config | Source | Destination)
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use chrono::{DateTime, Utc};

use crate::annotation::{fetch_bug_counts, DocumentSource, HttpDocumentSource};
use crate::config::{PipelineConfig, SecretSource, Settings};
use crate::destination::{DestinationStore, SqliteDestination};
use crate::error::{DestinationWriteError, PipelineError};
use crate::model::{BugCounts, MilestoneSummary, SourceCounts};
use crate::source::{count_statuses, SourceStore, SqliteSource};

/// Outcome of one reconciliation batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
  pub inserted: usize,
  pub skipped: usize,
}

/// The three stores a pipeline run talks to.
pub struct PipelineDeps<'a> {
  pub source: &'a dyn SourceStore,
  pub documents: &'a dyn DocumentSource,
  pub destination: &'a mut dyn DestinationStore,
}

/// One summary per milestone in `counts`, in milestone order.
pub fn build_summaries(counts: &SourceCounts, bugs: &BugCounts, recorded_at: DateTime<Utc>) -> Vec<MilestoneSummary> {
  counts
    .iter()
    .map(|(milestone, c)| MilestoneSummary::new(milestone.clone(), *c, bugs.get(milestone), recorded_at))
    .collect()
}

/// Stage every summary whose milestone is not yet recorded, then commit once.
pub fn reconcile(
  destination: &mut dyn DestinationStore,
  summaries: Vec<MilestoneSummary>,
) -> Result<ReconcileReport, DestinationWriteError> {
  let mut staged = Vec::with_capacity(summaries.len());
  let mut skipped = 0;

  for summary in summaries {
    if destination.milestone_exists(summary.milestone())? {
      tracing::info!(milestone = %summary.milestone(), "milestone already recorded; skipping");
      skipped += 1;
      continue;
    }

    tracing::debug!(
      milestone = %summary.milestone(),
      total = summary.total_count(),
      bugs = summary.bug_count(),
      "staging summary"
    );
    staged.push(summary);
  }

  let inserted = if staged.is_empty() {
    0
  } else {
    destination.commit_batch(&staged)?
  };

  Ok(ReconcileReport { inserted, skipped })
}

/// Source Counter, then Annotation Fetcher, then the Reconciler.
#[tracing::instrument(skip_all, fields(pipeline = %pipeline.name))]
pub fn run_pipeline(
  pipeline: &PipelineConfig,
  deps: PipelineDeps<'_>,
  now: DateTime<Utc>,
) -> Result<ReconcileReport, PipelineError> {
  let counts = count_statuses(deps.source, &pipeline.source_filter())?;
  let bugs = fetch_bug_counts(deps.documents, &pipeline.bug_labels);

  let summaries = build_summaries(&counts, &bugs, now);
  let report = reconcile(deps.destination, summaries)?;

  tracing::info!(inserted = report.inserted, skipped = report.skipped, "pipeline finished");

  Ok(report)
}

/// Wire the production stores from settings and run `pipeline`.
///
/// Every secret is resolved before any connection is opened; the destination
/// is opened first so an unreachable destination fails before the source is touched.
pub fn run_configured(
  settings: &Settings,
  pipeline: &PipelineConfig,
  now: DateTime<Utc>,
) -> Result<ReconcileReport, PipelineError> {
  let secrets = &settings.secrets;
  let destination_path = secrets.require("new_db_path")?;
  let source_path = secrets.require("db_path")?;
  let document_url = secrets.require(&pipeline.document_url_key)?;
  let username = secrets.require("username")?;
  let password = secrets.require("password")?;

  let mut destination = SqliteDestination::open(&destination_path, &pipeline.table)?;
  let source = SqliteSource::open(&source_path)?;
  let documents = HttpDocumentSource::new(document_url, &username, &password, settings.http_timeout());

  run_pipeline(
    pipeline,
    PipelineDeps {
      source: &source,
      documents: &documents,
      destination: &mut destination,
    },
    now,
  )
}
