// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Closed set of typed error kinds shared by the pipelines and the cadence reporter
// role: errors/types
// outputs: ConfigError, SourceUnavailable, AnnotationUnavailable, DestinationWriteError, PaginationError, PipelineError
// invariants:
// - AnnotationUnavailable and PaginationError are never fatal for a whole run
// - PipelineError only wraps kinds that abort a pipeline
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use thiserror::Error;

/// Settings, secrets or startup resources are unusable.
#[derive(Error, Debug)]
pub enum ConfigError {
  /// The layered settings could not be merged or deserialized.
  #[error("invalid configuration: {0}")]
  Load(#[from] Box<figment::Error>),

  /// A required secret is absent or empty.
  #[error("missing required configuration key `{key}`")]
  Missing { key: String },

  /// A value is present but not acceptable.
  #[error("invalid value for `{field}`: {reason}")]
  Invalid { field: String, reason: String },

  #[error("no pipeline named `{0}` is configured")]
  UnknownPipeline(String),

  #[error("no project named `{0}` is configured")]
  UnknownProject(String),

  /// The destination store could not be opened at startup.
  #[error("destination database {path} is unreachable: {source}")]
  DestinationUnreachable {
    path: String,
    #[source]
    source: rusqlite::Error,
  },
}

/// The test-result store could not be read; the pipeline aborts with no partial counts.
#[derive(Error, Debug)]
pub enum SourceUnavailable {
  #[error("cannot open source database {path}: {source}")]
  Connect {
    path: String,
    #[source]
    source: rusqlite::Error,
  },

  #[error("status aggregation query failed: {0}")]
  Query(#[from] rusqlite::Error),

  #[error("source returned status `{0}` outside pass/fail")]
  UnexpectedStatus(String),

  #[error("source returned a negative count {count} for build `{build}`")]
  NegativeCount { build: String, count: i64 },
}

/// The bug-count document could not be used. Callers degrade to an empty map.
#[derive(Error, Debug)]
pub enum AnnotationUnavailable {
  #[error("document request returned HTTP {status}")]
  Http { status: u16 },

  #[error("document request failed: {0}")]
  Transport(String),

  #[error("document is not valid JSON: {0}")]
  Decode(String),

  #[error("document envelope has no `body.view.value` text")]
  MissingBody,
}

/// Writing to the destination store failed; nothing from the batch is persisted.
#[derive(Error, Debug)]
pub enum DestinationWriteError {
  #[error("existence check for milestone `{milestone}` failed: {source}")]
  Lookup {
    milestone: String,
    #[source]
    source: rusqlite::Error,
  },

  #[error("insert of milestone `{milestone}` failed: {source}")]
  Insert {
    milestone: String,
    #[source]
    source: rusqlite::Error,
  },

  #[error("commit of staged rows failed: {0}")]
  Commit(#[source] rusqlite::Error),

  #[error("preparing destination table `{table}` failed: {source}")]
  Schema {
    table: String,
    #[source]
    source: rusqlite::Error,
  },
}

/// A commit page could not be fetched or decoded; pagination stops for that project.
#[derive(Error, Debug)]
pub enum PaginationError {
  #[error("page {page} request failed: {message}")]
  Transport { page: u32, message: String },

  #[error("page {page} returned HTTP {status}")]
  Status { page: u32, status: u16 },

  #[error("page {page} body could not be decoded: {message}")]
  Decode { page: u32, message: String },

  /// The listing still advertised more pages after `limit` of them.
  #[error("stopped after {limit} pages; the listing did not end")]
  PageLimit { limit: u32 },
}

/// Fatal outcome of one reconciliation pipeline run.
#[derive(Error, Debug)]
pub enum PipelineError {
  #[error(transparent)]
  Config(#[from] ConfigError),

  #[error(transparent)]
  Source(#[from] SourceUnavailable),

  #[error(transparent)]
  Destination(#[from] DestinationWriteError),
}
