// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Commit Cadence Reporter: page through a project's commit list, count commits per UTC day, emit line protocol
// role: reporting/cadence
// inputs: PageFetcher (GitHub or GitLab REST), ProjectConfig, machine tag
// outputs: CadenceReport (encounter-ordered day buckets); `<series>,machine=<host> commits=<n> <unix_nanos>` lines
// side_effects: One HTTP GET per page; lines written to the caller's writer (stdout in the binary)
// invariants:
// - Pages are requested from 1 upward and never past the terminating page or `max_pages`
// - GitHub ends on an empty array or any non-array body; GitLab ends when X-Next-Page is missing or empty
// - A failed page keeps the buckets of earlier pages
// - Day = first 10 characters of the committer date; timestamp = that day at 00:00:00 UTC in nanoseconds
// errors: PaginationError, carried in the report and logged
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::HashMap;
use std::io::{self, Write};
use std::time::Duration;

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

use crate::config::{Backend, ProjectConfig};
use crate::error::PaginationError;
use crate::ext::serde_json::JsonFetch;
use crate::model::CommitDayBucket;

pub const PER_PAGE: u32 = 100;

/// One decoded page of a commit listing.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
  pub status: u16,
  pub body: Value,
  /// `X-Next-Page` response header, when the server sent one.
  pub next_page: Option<String>,
}

impl Page {
  pub fn ok(body: Value) -> Self {
    Self {
      status: 200,
      body,
      next_page: None,
    }
  }

  pub fn with_next_page(mut self, next: impl Into<String>) -> Self {
    self.next_page = Some(next.into());
    self
  }
}

/// Commit listing seam. `page` starts at 1.
pub trait PageFetcher {
  fn fetch_page(&self, project: &ProjectConfig, page: u32) -> Result<Page, PaginationError>;
}

/// Everything learned about one project in one run.
#[derive(Debug)]
pub struct CadenceReport {
  pub series: String,
  pub buckets: Vec<CommitDayBucket>,
  /// Pages whose commits were counted.
  pub pages: u32,
  /// Set when pagination stopped on a failure rather than the end signal.
  pub error: Option<PaginationError>,
}

impl CadenceReport {
  pub fn total_commits(&self) -> u64 {
    self.buckets.iter().map(|b| b.count).sum()
  }
}

/// Series (measurement) name: the project name with `/` replaced by `_`.
pub fn series_name(project: &str) -> String {
  project.replace('/', "_")
}

/// Day part (`YYYY-MM-DD`) of an ISO-8601 timestamp.
pub fn bucket_day(date: &str) -> Option<&str> {
  date.get(..10)
}

/// Nanoseconds since the UNIX epoch of `day` at 00:00:00 UTC.
pub fn to_timestamp(day: &str) -> Option<i64> {
  NaiveDate::parse_from_str(day, "%Y-%m-%d")
    .ok()?
    .and_hms_opt(0, 0, 0)?
    .and_utc()
    .timestamp_nanos_opt()
}

/// Inverse of [`to_timestamp`] for midnight timestamps.
pub fn day_from_timestamp(nanos: i64) -> String {
  DateTime::from_timestamp_nanos(nanos).format("%Y-%m-%d").to_string()
}

/// One line-protocol record, or `None` when `day` is not a calendar date.
pub fn format_line(series: &str, machine: &str, count: u64, day: &str) -> Option<String> {
  let ts = to_timestamp(day)?;
  Some(format!("{series},machine={machine} commits={count} {ts}"))
}

/// Counts per day, keeping the order days were first seen.
#[derive(Debug, Default)]
struct DayCounter {
  order: Vec<String>,
  counts: HashMap<String, u64>,
}

impl DayCounter {
  fn add(&mut self, day: &str) {
    match self.counts.get_mut(day) {
      Some(n) => *n += 1,
      None => {
        self.order.push(day.to_string());
        self.counts.insert(day.to_string(), 1);
      }
    }
  }

  fn into_buckets(mut self, series: &str) -> Vec<CommitDayBucket> {
    self
      .order
      .into_iter()
      .map(|day| CommitDayBucket {
        series: series.to_string(),
        count: self.counts.remove(&day).unwrap_or(0),
        day,
      })
      .collect()
  }
}

fn date_path(backend: Backend) -> &'static str {
  match backend {
    Backend::Github => "commit.committer.date",
    Backend::Gitlab => "committed_date",
  }
}

fn count_commits(commits: &[Value], backend: Backend, page: u32, days: &mut DayCounter) {
  for commit in commits {
    let date = commit.fetch(date_path(backend)).as_str();
    let day = date.and_then(bucket_day).filter(|d| to_timestamp(d).is_some());

    match day {
      Some(d) => days.add(d),
      None => tracing::debug!(page, date = ?date, "commit without a usable committer date; ignored"),
    }
  }
}

/// What to do after looking at one page.
enum Step<'a> {
  Count { commits: &'a [Value], more: bool },
  Stop,
  Fail(PaginationError),
}

fn github_step(page: u32, resp: &Page) -> Step<'_> {
  if resp.status >= 400 {
    if let Some(message) = resp.body.get("message").and_then(Value::as_str) {
      tracing::warn!(page, status = resp.status, reason = message, "GitHub returned an error object");
    }
    return Step::Fail(PaginationError::Status { page, status: resp.status });
  }

  match resp.body.as_array() {
    Some(items) if !items.is_empty() => Step::Count { commits: items, more: true },
    Some(_) => Step::Stop,
    None => {
      // error-shaped or unexpected object: treat as end of listing
      if let Some(message) = resp.body.get("message").and_then(Value::as_str) {
        tracing::warn!(page, reason = message, "GitHub returned an error object");
      }
      Step::Stop
    }
  }
}

fn gitlab_step(page: u32, resp: &Page) -> Step<'_> {
  if resp.status >= 400 {
    return Step::Fail(PaginationError::Status { page, status: resp.status });
  }

  let Some(items) = resp.body.as_array() else {
    return Step::Fail(PaginationError::Decode {
      page,
      message: "expected a JSON array of commits".into(),
    });
  };

  let more = resp.next_page.as_deref().is_some_and(|n| !n.trim().is_empty());
  Step::Count { commits: items, more }
}

/// Page through `project` and bucket its commits per UTC day, fetching at most `max_pages` pages.
#[tracing::instrument(skip_all, fields(project = %project.name))]
pub fn collect_commit_days(fetcher: &dyn PageFetcher, project: &ProjectConfig, max_pages: u32) -> CadenceReport {
  let series = series_name(&project.name);
  let mut days = DayCounter::default();
  let mut pages = 0;
  let mut error = None;
  let mut page = 1;

  loop {
    let resp = match fetcher.fetch_page(project, page) {
      Ok(r) => r,
      Err(e) => {
        error = Some(e);
        break;
      }
    };

    let step = match project.backend {
      Backend::Github => github_step(page, &resp),
      Backend::Gitlab => gitlab_step(page, &resp),
    };

    match step {
      Step::Count { commits, more } => {
        count_commits(commits, project.backend, page, &mut days);
        pages += 1;
        tracing::debug!(page, commits = commits.len(), "page counted");
        if !more {
          break;
        }
        if page >= max_pages {
          tracing::warn!(max_pages, "page limit reached with more pages advertised");
          error = Some(PaginationError::PageLimit { limit: max_pages });
          break;
        }
      }
      Step::Stop => break,
      Step::Fail(e) => {
        error = Some(e);
        break;
      }
    }

    page += 1;
  }

  if let Some(e) = &error {
    tracing::error!(error = %e, pages, "pagination stopped early; emitting partial counts");
  }

  let buckets = days.into_buckets(&series);
  tracing::info!(pages, days = buckets.len(), "commit days collected");

  CadenceReport {
    series,
    buckets,
    pages,
    error,
  }
}

/// Write one line per bucket; returns how many lines were written.
pub fn write_lines<W: Write>(out: &mut W, report: &CadenceReport, machine: &str) -> io::Result<usize> {
  let mut written = 0;

  for b in &report.buckets {
    if let Some(line) = format_line(&b.series, machine, b.count, &b.day) {
      writeln!(out, "{line}")?;
      written += 1;
    }
  }

  Ok(written)
}

/// Listing URL for `page` of `project`.
pub fn page_url(project: &ProjectConfig, page: u32) -> String {
  let base = project.base_url.trim_end_matches('/');

  match project.backend {
    Backend::Github => format!("{base}/{}/commits?page={page}&per_page={PER_PAGE}", project.name),
    Backend::Gitlab => {
      let id = project.id.clone().unwrap_or_else(|| project.name.replace('/', "%2F"));
      format!("{base}/projects/{id}/repository/commits?page={page}&per_page={PER_PAGE}")
    }
  }
}

/// GitHub/GitLab REST listing over the shared blocking agent.
pub struct HttpPageFetcher {
  agent: ureq::Agent,
  token: Option<String>,
}

impl HttpPageFetcher {
  pub fn new(timeout: Duration, token: Option<String>) -> Self {
    Self {
      agent: crate::http::agent(timeout),
      token,
    }
  }
}

impl PageFetcher for HttpPageFetcher {
  fn fetch_page(&self, project: &ProjectConfig, page: u32) -> Result<Page, PaginationError> {
    let url = page_url(project, page);
    tracing::debug!(%url, page, "fetching commit page");

    let mut req = self.agent.get(&url).set("Accept", "application/json");
    if let Some(token) = &self.token {
      req = match project.backend {
        Backend::Github => req.set("Authorization", &format!("token {token}")),
        Backend::Gitlab => req.set("PRIVATE-TOKEN", token),
      };
    }

    let resp = match req.call() {
      Ok(r) => r,
      // error statuses still carry a body worth inspecting (GitHub's `message`)
      Err(ureq::Error::Status(_, r)) => r,
      Err(ureq::Error::Transport(t)) => {
        return Err(PaginationError::Transport {
          page,
          message: t.to_string(),
        })
      }
    };

    let status = resp.status();
    let next_page = resp.header("X-Next-Page").map(str::to_string);
    let text = resp.into_string().map_err(|e| PaginationError::Transport {
      page,
      message: e.to_string(),
    })?;

    let body = if text.trim().is_empty() && status >= 400 {
      Value::Null
    } else {
      serde_json::from_str(&text).map_err(|e| PaginationError::Decode {
        page,
        message: e.to_string(),
      })?
    };

    Ok(Page {
      status,
      body,
      next_page,
    })
  }
}
