// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Annotation Fetcher: scrape per-milestone bug counts from a wiki page
// role: enrichment/annotation
// inputs: DocumentSource (Confluence REST page with basic auth), configured bug labels
// outputs: BugCounts keyed by lower-cased label
// side_effects: One HTTP GET per pipeline run
// invariants:
// - Labels match case-sensitively and literally inside `<Label> Total Bugs =<digits>`
// - A label without a match is 0, not an error
// - Any fetch/decode failure degrades to an empty map with a warning
// errors: AnnotationUnavailable, logged and swallowed by fetch_bug_counts
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use crate::error::AnnotationUnavailable;
use crate::ext::serde_json::JsonFetch;
use crate::model::BugCounts;

/// Where the rendered page text lives in the Confluence content envelope.
const BODY_PATH: &str = "body.view.value";

/// Wiki page seam: returns the decoded JSON envelope.
pub trait DocumentSource {
  fn fetch_document(&self) -> Result<Value, AnnotationUnavailable>;
}

/// Pull the rendered body text out of a page envelope.
pub fn extract_body(envelope: &Value) -> Result<String, AnnotationUnavailable> {
  envelope
    .fetch(BODY_PATH)
    .as_str()
    .map(str::to_string)
    .ok_or(AnnotationUnavailable::MissingBody)
}

/// Search `text` for each label's `"<Label> Total Bugs =<digits>"` marker.
///
/// Every label gets an entry; labels with no marker (or a number too large
/// to represent) map to 0.
pub fn parse_bug_counts(text: &str, labels: &[String]) -> BugCounts {
  let mut out = BugCounts::default();

  for label in labels {
    let pattern = format!(r"{} Total Bugs =(\d+)", regex::escape(label));
    let count = Regex::new(&pattern)
      .ok()
      .and_then(|re| re.captures(text))
      .and_then(|c| c.get(1))
      .and_then(|m| m.as_str().parse::<u64>().ok())
      .unwrap_or(0);

    out.insert(label, count);
  }

  out
}

/// Annotation Fetcher entry point; never fails.
#[tracing::instrument(skip_all, fields(labels = labels.len()))]
pub fn fetch_bug_counts(source: &dyn DocumentSource, labels: &[String]) -> BugCounts {
  let body = source.fetch_document().and_then(|doc| extract_body(&doc));

  match body {
    Ok(text) => {
      let counts = parse_bug_counts(&text, labels);
      tracing::info!(found = counts.iter().filter(|(_, n)| *n > 0).count(), "bug counts parsed");
      counts
    }
    Err(err) => {
      tracing::warn!(error = %err, "bug counts unavailable; every milestone gets bug_count 0");
      BugCounts::default()
    }
  }
}

/// Confluence page fetched over HTTPS with basic auth.
pub struct HttpDocumentSource {
  agent: ureq::Agent,
  url: String,
  authorization: String,
}

impl HttpDocumentSource {
  pub fn new(url: impl Into<String>, username: &str, password: &str, timeout: Duration) -> Self {
    Self {
      agent: crate::http::agent(timeout),
      url: url.into(),
      authorization: crate::http::basic_auth(username, password),
    }
  }
}

impl DocumentSource for HttpDocumentSource {
  fn fetch_document(&self) -> Result<Value, AnnotationUnavailable> {
    tracing::debug!(url = %self.url, "fetching bug-count document");

    let resp = self
      .agent
      .get(&self.url)
      .set("Accept", "application/json")
      .set("Authorization", &self.authorization)
      .call();

    match resp {
      Ok(r) => r.into_json::<Value>().map_err(|e| AnnotationUnavailable::Decode(e.to_string())),
      Err(ureq::Error::Status(status, _)) => Err(AnnotationUnavailable::Http { status }),
      Err(ureq::Error::Transport(t)) => Err(AnnotationUnavailable::Transport(t.to_string())),
    }
  }
}
