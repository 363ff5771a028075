// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Value types shared by the source counter, annotation fetcher, reconciler and cadence reporter
// role: model/types
// outputs: MilestoneKey, Status, RawStatusRow, StatusCounts, SourceCounts, BugCounts, MilestoneSummary, CommitDayBucket
// invariants:
// - MilestoneKey equality/order/hash use the lower-cased label only
// - MilestoneSummary.total_count == pass_count + fail_count (no constructor accepts a total)
// - Count arithmetic saturates at u64::MAX instead of overflowing
// - BugCounts lookups never fail; a miss yields 0
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Release checkpoint label such as `Beta1`, `RC2` or `Build2.1`.
///
/// The label keeps the spelling it was created with (that is what gets
/// persisted); comparisons go through [`MilestoneKey::canonical`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MilestoneKey(String);

impl MilestoneKey {
  pub fn new(label: impl Into<String>) -> Self {
    Self(label.into())
  }

  pub fn label(&self) -> &str {
    &self.0
  }

  /// Lower-cased form used for every cross-reference.
  pub fn canonical(&self) -> String {
    canonical_label(&self.0)
  }
}

/// Lower-case normalization applied to milestone labels everywhere they are matched.
pub fn canonical_label(label: &str) -> String {
  label.to_lowercase()
}

impl PartialEq for MilestoneKey {
  fn eq(&self, other: &Self) -> bool {
    self.canonical() == other.canonical()
  }
}

impl Eq for MilestoneKey {}

impl Hash for MilestoneKey {
  fn hash<H: Hasher>(&self, state: &mut H) {
    self.canonical().hash(state);
  }
}

impl PartialOrd for MilestoneKey {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Ord for MilestoneKey {
  fn cmp(&self, other: &Self) -> Ordering {
    self.canonical().cmp(&other.canonical())
  }
}

impl fmt::Display for MilestoneKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Test outcome kinds that contribute to a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
  Pass,
  Fail,
}

impl FromStr for Status {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_lowercase().as_str() {
      "pass" => Ok(Status::Pass),
      "fail" => Ok(Status::Fail),
      other => Err(other.to_string()),
    }
  }
}

/// One `(build, status, count)` group returned by the source aggregation query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatusRow {
  pub build: String,
  pub status: Status,
  pub count: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
  pub pass: u64,
  pub fail: u64,
}

impl StatusCounts {
  pub fn add(&mut self, status: Status, count: u64) {
    match status {
      Status::Pass => self.pass = self.pass.saturating_add(count),
      Status::Fail => self.fail = self.fail.saturating_add(count),
    }
  }
}

/// Source Counter output: milestone → pass/fail counts.
pub type SourceCounts = BTreeMap<MilestoneKey, StatusCounts>;

/// Annotation Fetcher output: canonical label → bug count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BugCounts(BTreeMap<String, u64>);

impl BugCounts {
  pub fn insert(&mut self, label: &str, count: u64) {
    self.0.insert(canonical_label(label), count);
  }

  /// Bug count for a milestone; 0 when the document had nothing for it.
  pub fn get(&self, milestone: &MilestoneKey) -> u64 {
    self.0.get(&milestone.canonical()).copied().unwrap_or(0)
  }

  pub fn is_empty(&self) -> bool {
    self.0.is_empty()
  }

  pub fn len(&self) -> usize {
    self.0.len()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
    self.0.iter().map(|(k, v)| (k.as_str(), *v))
  }
}

/// One row destined for the reporting table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MilestoneSummary {
  milestone: MilestoneKey,
  pass_count: u64,
  fail_count: u64,
  total_count: u64,
  bug_count: u64,
  recorded_at: DateTime<Utc>,
}

impl MilestoneSummary {
  pub fn new(milestone: MilestoneKey, counts: StatusCounts, bug_count: u64, recorded_at: DateTime<Utc>) -> Self {
    Self {
      milestone,
      pass_count: counts.pass,
      fail_count: counts.fail,
      total_count: counts.pass.saturating_add(counts.fail),
      bug_count,
      recorded_at,
    }
  }

  pub fn milestone(&self) -> &MilestoneKey {
    &self.milestone
  }

  pub fn pass_count(&self) -> u64 {
    self.pass_count
  }

  pub fn fail_count(&self) -> u64 {
    self.fail_count
  }

  pub fn total_count(&self) -> u64 {
    self.total_count
  }

  pub fn bug_count(&self) -> u64 {
    self.bug_count
  }

  pub fn recorded_at(&self) -> DateTime<Utc> {
    self.recorded_at
  }
}

/// Commits observed on one UTC day for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitDayBucket {
  pub series: String,
  pub day: String,
  pub count: u64,
}
