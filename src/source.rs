// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Source Counter: aggregate pass/fail test counts per milestone from the test-result store
// role: source/aggregation
// inputs: SourceStore (SQLite report_view), SourceFilter {role, selections}
// outputs: SourceCounts (milestone → pass/fail)
// side_effects: One read-only aggregation query per call
// invariants:
// - Statuses other than pass/fail are excluded in the WHERE clause, never after the fact
// - A build seen with only one status resolves the other to 0
// - Builds fold into the configured label with the same canonical (lower-case) form
// errors: SourceUnavailable; no partial aggregation, no retry
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{params_from_iter, Connection, OpenFlags};
use serde::{Deserialize, Serialize};

use crate::error::SourceUnavailable;
use crate::model::{canonical_label, MilestoneKey, RawStatusRow, SourceCounts, Status, StatusCounts};

/// Builds to count within one release; `release: None` matches any release.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BuildSelection {
  pub release: Option<String>,
  pub builds: Vec<String>,
}

/// What the aggregation query is restricted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFilter {
  pub role: String,
  pub selections: Vec<BuildSelection>,
}

impl SourceFilter {
  /// Configured labels by canonical form; the first spelling wins.
  fn labels(&self) -> HashMap<String, String> {
    let mut out = HashMap::new();

    for b in self.selections.iter().flat_map(|s| s.builds.iter()) {
      out.entry(canonical_label(b)).or_insert_with(|| b.clone());
    }

    out
  }
}

/// Test-result store seam.
pub trait SourceStore {
  /// Run the aggregation for `filter`, one row per (build, status) group.
  fn status_rows(&self, filter: &SourceFilter) -> Result<Vec<RawStatusRow>, SourceUnavailable>;
}

/// Aggregation SQL and its positional parameters.
///
/// Every build list becomes `LOWER(q_build) IN (...)`, with the release
/// pinned when the selection names one. Parameters are bound in order.
pub fn aggregation_query(filter: &SourceFilter) -> (String, Vec<String>) {
  let mut params = vec![filter.role.clone()];
  let mut groups = Vec::new();

  for sel in filter.selections.iter().filter(|s| !s.builds.is_empty()) {
    let placeholders = vec!["?"; sel.builds.len()].join(", ");
    let builds_clause = format!("LOWER(q_build) IN ({placeholders})");

    match &sel.release {
      Some(release) => {
        params.push(release.clone());
        groups.push(format!("(q_release = ? AND {builds_clause})"));
      }
      None => groups.push(format!("({builds_clause})")),
    }

    params.extend(sel.builds.iter().map(|b| canonical_label(b)));
  }

  // an empty selection list must match nothing rather than everything
  let selection_clause = if groups.is_empty() { "0".to_string() } else { groups.join(" OR ") };

  let sql = format!(
    "SELECT q_build, LOWER(status) AS status, COUNT(*) AS count \
     FROM report_view \
     WHERE q_role_name = ? \
       AND LOWER(status) IN ('pass', 'fail') \
       AND ({selection_clause}) \
     GROUP BY q_build, LOWER(status) \
     ORDER BY q_build, LOWER(status)"
  );

  (sql, params)
}

/// Fold aggregation rows into per-milestone counts.
pub fn fold_rows(filter: &SourceFilter, rows: Vec<RawStatusRow>) -> SourceCounts {
  let labels = filter.labels();
  let mut out = SourceCounts::new();

  for row in rows {
    let canonical = canonical_label(&row.build);
    let label = labels.get(&canonical).cloned().unwrap_or(row.build);

    out.entry(MilestoneKey::new(label)).or_insert_with(StatusCounts::default).add(row.status, row.count);
  }

  out
}

/// Source Counter entry point.
#[tracing::instrument(skip_all, fields(role = %filter.role))]
pub fn count_statuses(store: &dyn SourceStore, filter: &SourceFilter) -> Result<SourceCounts, SourceUnavailable> {
  let rows = store.status_rows(filter)?;
  tracing::debug!(groups = rows.len(), "aggregation rows fetched");

  let counts = fold_rows(filter, rows);
  tracing::info!(milestones = counts.len(), "source counts ready");

  Ok(counts)
}

/// `report_view` reader over SQLite, opened read-only for one pipeline run.
pub struct SqliteSource {
  conn: Connection,
  path: PathBuf,
}

impl SqliteSource {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, SourceUnavailable> {
    let path = path.as_ref().to_path_buf();
    let conn = Connection::open_with_flags(&path, OpenFlags::SQLITE_OPEN_READ_ONLY).map_err(|source| {
      SourceUnavailable::Connect {
        path: path.display().to_string(),
        source,
      }
    })?;
    tracing::debug!(path = %path.display(), "source database opened");

    Ok(Self { conn, path })
  }

  /// Wrap an existing connection (in-memory stores in tests).
  pub fn from_connection(conn: Connection) -> Self {
    Self {
      conn,
      path: PathBuf::from(":memory:"),
    }
  }
}

impl SourceStore for SqliteSource {
  fn status_rows(&self, filter: &SourceFilter) -> Result<Vec<RawStatusRow>, SourceUnavailable> {
    let (sql, params) = aggregation_query(filter);
    let mut stmt = self.conn.prepare(&sql)?;
    let mapped = stmt.query_map(params_from_iter(params.iter()), |row| {
      Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, i64>(2)?))
    })?;

    let mut rows = Vec::new();

    for item in mapped {
      let (build, status, count) = item?;
      let status: Status = status.parse().map_err(SourceUnavailable::UnexpectedStatus)?;
      let count = u64::try_from(count).map_err(|_| SourceUnavailable::NegativeCount {
        build: build.clone(),
        count,
      })?;

      rows.push(RawStatusRow { build, status, count });
    }

    Ok(rows)
  }
}

impl Drop for SqliteSource {
  fn drop(&mut self) {
    tracing::debug!(path = %self.path.display(), "source database connection released");
  }
}
