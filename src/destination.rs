// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Destination store for milestone summaries: existence check and single-transaction batch insert
// role: persistence/destination
// inputs: MilestoneSummary rows; table name validated by config
// outputs: Persisted rows (no_tests_total, no_tests_pass, no_tests_fail, no_tests_bug, mileStone_Version, execution_date)
// side_effects: Writes to the destination database; creates the table when absent
// invariants:
// - commit_batch is all-or-nothing
// - milestone_exists matches the stored label exactly
// errors: DestinationWriteError; opening failures are ConfigError (startup)
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{ConfigError, DestinationWriteError};
use crate::model::{MilestoneKey, MilestoneSummary};

/// `execution_date` column format (DATETIME-compatible).
pub const EXECUTION_DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Reporting table seam.
pub trait DestinationStore {
  fn milestone_exists(&mut self, milestone: &MilestoneKey) -> Result<bool, DestinationWriteError>;

  /// Insert every row in one transaction; returns the number written.
  fn commit_batch(&mut self, rows: &[MilestoneSummary]) -> Result<usize, DestinationWriteError>;
}

/// One row as read back from the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSummary {
  pub milestone: String,
  pub total: i64,
  pub pass: i64,
  pub fail: i64,
  pub bugs: i64,
  pub execution_date: String,
}

pub struct SqliteDestination {
  conn: Connection,
  table: String,
  path: PathBuf,
}

impl SqliteDestination {
  /// Open (or create) the database and make sure `table` exists.
  ///
  /// `table` must already be validated as an identifier (see `PipelineConfig::validate`).
  pub fn open<P: AsRef<Path>>(path: P, table: &str) -> Result<Self, ConfigError> {
    let path = path.as_ref().to_path_buf();
    let conn = Connection::open(&path).map_err(|source| ConfigError::DestinationUnreachable {
      path: path.display().to_string(),
      source,
    })?;

    let dest = Self {
      conn,
      table: table.to_string(),
      path,
    };
    dest.ensure_table().map_err(|e| match e {
      DestinationWriteError::Schema { source, .. } => ConfigError::DestinationUnreachable {
        path: dest.path.display().to_string(),
        source,
      },
      other => ConfigError::Invalid {
        field: "destination".into(),
        reason: other.to_string(),
      },
    })?;
    tracing::debug!(path = %dest.path.display(), table = %dest.table, "destination database opened");

    Ok(dest)
  }

  pub fn from_connection(conn: Connection, table: &str) -> Result<Self, DestinationWriteError> {
    let dest = Self {
      conn,
      table: table.to_string(),
      path: PathBuf::from(":memory:"),
    };
    dest.ensure_table()?;
    Ok(dest)
  }

  fn ensure_table(&self) -> Result<(), DestinationWriteError> {
    let sql = format!(
      "CREATE TABLE IF NOT EXISTS {} (\
         id INTEGER PRIMARY KEY AUTOINCREMENT, \
         no_tests_total INTEGER NOT NULL, \
         no_tests_pass INTEGER NOT NULL, \
         no_tests_fail INTEGER NOT NULL, \
         no_tests_bug INTEGER NOT NULL, \
         mileStone_Version TEXT NOT NULL, \
         execution_date TEXT NOT NULL)",
      self.table
    );

    self
      .conn
      .execute_batch(&sql)
      .map_err(|source| DestinationWriteError::Schema {
        table: self.table.clone(),
        source,
      })
  }

  /// All rows in insertion order.
  pub fn rows(&self) -> rusqlite::Result<Vec<StoredSummary>> {
    let sql = format!(
      "SELECT mileStone_Version, no_tests_total, no_tests_pass, no_tests_fail, no_tests_bug, execution_date \
       FROM {} ORDER BY id",
      self.table
    );
    let mut stmt = self.conn.prepare(&sql)?;
    let rows = stmt.query_map([], |r| {
      Ok(StoredSummary {
        milestone: r.get(0)?,
        total: r.get(1)?,
        pass: r.get(2)?,
        fail: r.get(3)?,
        bugs: r.get(4)?,
        execution_date: r.get(5)?,
      })
    })?;

    rows.collect()
  }
}

/// SQLite integers are signed; counts past `i64::MAX` are rejected, never clamped.
fn as_sql_int(v: u64) -> rusqlite::Result<i64> {
  i64::try_from(v).map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))
}

fn row_values(row: &MilestoneSummary) -> rusqlite::Result<[i64; 4]> {
  Ok([
    as_sql_int(row.total_count())?,
    as_sql_int(row.pass_count())?,
    as_sql_int(row.fail_count())?,
    as_sql_int(row.bug_count())?,
  ])
}

impl DestinationStore for SqliteDestination {
  fn milestone_exists(&mut self, milestone: &MilestoneKey) -> Result<bool, DestinationWriteError> {
    let sql = format!("SELECT 1 FROM {} WHERE mileStone_Version = ?1 LIMIT 1", self.table);

    self
      .conn
      .query_row(&sql, params![milestone.label()], |_| Ok(()))
      .optional()
      .map(|hit| hit.is_some())
      .map_err(|source| DestinationWriteError::Lookup {
        milestone: milestone.label().to_string(),
        source,
      })
  }

  fn commit_batch(&mut self, rows: &[MilestoneSummary]) -> Result<usize, DestinationWriteError> {
    let sql = format!(
      "INSERT INTO {} (no_tests_total, no_tests_pass, no_tests_fail, no_tests_bug, mileStone_Version, execution_date) \
       VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
      self.table
    );

    // dropping the transaction without commit rolls everything back
    let tx = self.conn.transaction().map_err(DestinationWriteError::Commit)?;

    for row in rows {
      row_values(row)
        .and_then(|[total, pass, fail, bugs]| {
          tx.execute(
            &sql,
            params![
              total,
              pass,
              fail,
              bugs,
              row.milestone().label(),
              row.recorded_at().format(EXECUTION_DATE_FORMAT).to_string(),
            ],
          )
        })
        .map_err(|source| DestinationWriteError::Insert {
          milestone: row.milestone().label().to_string(),
          source,
        })?;
    }

    tx.commit().map_err(DestinationWriteError::Commit)?;

    Ok(rows.len())
  }
}

impl Drop for SqliteDestination {
  fn drop(&mut self) {
    tracing::debug!(path = %self.path.display(), "destination database connection released");
  }
}
