// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Layered settings (presets, settings file, environment) plus secrets lookup for pipelines and projects
// role: configuration/loader
// inputs: optional settings file (TOML or JSON), RELEASE_METRICS_* environment variables
// outputs: validated Settings with PipelineConfig and ProjectConfig value objects; Secrets behind SecretSource
// side_effects: Reads files and environment
// invariants:
// - Precedence: environment > settings file > built-in presets
// - A missing or empty required secret is ConfigError::Missing, never an empty string
// - Destination table names are plain SQL identifiers
// errors: ConfigError only
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Format, Json, Serialized, Toml};
use figment::Figment;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::source::{BuildSelection, SourceFilter};

const APP_NAME: &str = "release-metrics";
const ENV_PREFIX: &str = "RELEASE_METRICS_";
const SECRETS_ENV_PREFIX: &str = "RELEASE_METRICS_SECRETS__";

/// Environment variable naming a settings file when `--config` is not given.
pub const ENV_CONFIG_PATH: &str = "RELEASE_METRICS_CONFIG";

const CONFIG_EXTENSIONS: &[&str] = &["toml", "json"];

pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_PAGES: u32 = 1000;

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
  Trace,
  Debug,
  #[default]
  Info,
  Warn,
  Error,
}

impl LogLevel {
  pub const fn as_str(&self) -> &'static str {
    match self {
      Self::Trace => "trace",
      Self::Debug => "debug",
      Self::Info => "info",
      Self::Warn => "warn",
      Self::Error => "error",
    }
  }
}

/// Everything a run needs, constructed once in `main` and passed down.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Settings {
  pub log_level: LogLevel,
  /// Timeout applied to every outbound HTTP call.
  pub http_timeout_secs: u64,
  /// Ceiling on commit pages fetched per project.
  pub max_pages: u32,
  /// Overrides the `machine` tag on cadence lines (defaults to the host FQDN).
  pub machine: Option<String>,
  pub secrets: Secrets,
  pub pipelines: Vec<PipelineConfig>,
  pub projects: Vec<ProjectConfig>,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      log_level: LogLevel::default(),
      http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
      max_pages: DEFAULT_MAX_PAGES,
      machine: None,
      secrets: Secrets::default(),
      pipelines: default_pipelines(),
      projects: default_projects(),
    }
  }
}

impl Settings {
  pub fn http_timeout(&self) -> Duration {
    Duration::from_secs(self.http_timeout_secs)
  }

  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.http_timeout_secs == 0 {
      return Err(ConfigError::Invalid {
        field: "http_timeout_secs".into(),
        reason: "must be greater than zero".into(),
      });
    }

    if self.max_pages == 0 {
      return Err(ConfigError::Invalid {
        field: "max_pages".into(),
        reason: "must be greater than zero".into(),
      });
    }

    for p in &self.pipelines {
      p.validate()?;
    }

    for p in &self.projects {
      p.validate()?;
    }

    Ok(())
  }

  /// Resolve pipeline names; an empty selection means every configured pipeline.
  pub fn select_pipelines(&self, names: &[String]) -> Result<Vec<&PipelineConfig>, ConfigError> {
    if names.is_empty() {
      return Ok(self.pipelines.iter().collect());
    }

    names
      .iter()
      .map(|n| {
        self
          .pipelines
          .iter()
          .find(|p| p.name == *n)
          .ok_or_else(|| ConfigError::UnknownPipeline(n.clone()))
      })
      .collect()
  }

  /// Resolve project names; an empty selection means every configured project.
  pub fn select_projects(&self, names: &[String]) -> Result<Vec<&ProjectConfig>, ConfigError> {
    if names.is_empty() {
      return Ok(self.projects.iter().collect());
    }

    names
      .iter()
      .map(|n| {
        self
          .projects
          .iter()
          .find(|p| p.name == *n)
          .ok_or_else(|| ConfigError::UnknownProject(n.clone()))
      })
      .collect()
  }
}

/// Credential and endpoint lookup, keyed by the pillar field names.
pub trait SecretSource {
  fn secret(&self, key: &str) -> Option<String>;

  fn require(&self, key: &str) -> Result<String, ConfigError> {
    self
      .secret(key)
      .ok_or_else(|| ConfigError::Missing { key: key.to_string() })
  }
}

/// Flat secrets map as stored in the settings file (`[secrets]`).
///
/// File values may be strings, numbers or booleans and are rendered back to
/// text on lookup. Environment overrides are always stored as strings.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(transparent)]
pub struct Secrets(BTreeMap<String, serde_json::Value>);

impl Secrets {
  pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
    Self(
      pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
        .collect(),
    )
  }
}

impl SecretSource for Secrets {
  fn secret(&self, key: &str) -> Option<String> {
    let text = match self.0.get(key)? {
      serde_json::Value::String(s) => s.trim().to_string(),
      serde_json::Value::Number(n) => n.to_string(),
      serde_json::Value::Bool(b) => b.to_string(),
      _ => return None,
    };

    (!text.is_empty()).then_some(text)
  }
}

/// One reconciliation job: where to count, which labels to scrape, where to write.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PipelineConfig {
  pub name: String,
  /// Value of `q_role_name` in the source store.
  pub role: String,
  pub selections: Vec<BuildSelection>,
  /// Destination table (one per pipeline).
  pub table: String,
  /// Secret key holding the wiki page URL.
  pub document_url_key: String,
  /// Labels searched as `<Label> Total Bugs =<n>` in the wiki page.
  pub bug_labels: Vec<String>,
}

static RE_IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier regex"));

impl PipelineConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if !RE_IDENTIFIER.is_match(&self.table) {
      return Err(ConfigError::Invalid {
        field: format!("pipelines.{}.table", self.name),
        reason: format!("`{}` is not a plain SQL identifier", self.table),
      });
    }

    if self.selections.iter().all(|s| s.builds.is_empty()) {
      return Err(ConfigError::Invalid {
        field: format!("pipelines.{}.selections", self.name),
        reason: "at least one build is required".into(),
      });
    }

    Ok(())
  }

  pub fn source_filter(&self) -> SourceFilter {
    SourceFilter {
      role: self.role.clone(),
      selections: self.selections.clone(),
    }
  }
}

/// Git hosting flavour; decides URL shape, auth header, date field and end-of-pages signal.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
  Github,
  Gitlab,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProjectConfig {
  /// Project path (`owner/repo`) or display name; also the series name source.
  pub name: String,
  pub backend: Backend,
  /// API root, e.g. `https://api.github.com/repos` or `https://gitlab.example.com/api/v4`.
  pub base_url: String,
  /// GitLab numeric project id; the URL-encoded name is used when absent.
  #[serde(default)]
  pub id: Option<String>,
  /// Secret key holding an API token, when the endpoint needs one.
  #[serde(default)]
  pub token_key: Option<String>,
}

impl ProjectConfig {
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.name.trim().is_empty() {
      return Err(ConfigError::Invalid {
        field: "projects.name".into(),
        reason: "must not be empty".into(),
      });
    }

    if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
      return Err(ConfigError::Invalid {
        field: format!("projects.{}.base_url", self.name),
        reason: format!("`{}` is not an http(s) URL", self.base_url),
      });
    }

    Ok(())
  }
}

fn selection(release: Option<&str>, builds: &[&str]) -> BuildSelection {
  BuildSelection {
    release: release.map(str::to_string),
    builds: builds.iter().map(|b| b.to_string()).collect(),
  }
}

fn strings(items: &[&str]) -> Vec<String> {
  items.iter().map(|s| s.to_string()).collect()
}

/// The three reconciliation jobs that run by default.
pub fn default_pipelines() -> Vec<PipelineConfig> {
  vec![
    PipelineConfig {
      name: "performance".into(),
      role: "performance".into(),
      selections: vec![selection(
        Some("SLES-15-SP5"),
        &["Beta1", "Beta2", "Beta3", "PublicBeta", "RC1", "PublicRC", "GMC"],
      )],
      table: "perfData".into(),
      document_url_key: "confluence_url".into(),
      bug_labels: strings(&["Beta1", "Beta2", "Beta3", "PublicBeta", "RC1", "PublicRC", "GMC"]),
    },
    PipelineConfig {
      name: "alp".into(),
      role: "ALP".into(),
      selections: vec![
        selection(Some("ALP_Micro"), &["Build4.1"]),
        selection(Some("ALP_Dolomite1.0"), &["Build2.1", "Build2.4"]),
      ],
      table: "ALPData".into(),
      document_url_key: "alp_confluence_url".into(),
      bug_labels: strings(&["Build2.1", "Build2.4", "Build4.1"]),
    },
    PipelineConfig {
      name: "realtime".into(),
      role: "RealTime".into(),
      selections: vec![selection(None, &["beta1", "RC1", "RC2", "GMC"])],
      table: "RealTimeData".into(),
      document_url_key: "rt_confluence_url".into(),
      bug_labels: strings(&["Beta1", "RC1", "RC2", "GMC"]),
    },
  ]
}

/// The commit cadence projects that run by default.
pub fn default_projects() -> Vec<ProjectConfig> {
  vec![
    ProjectConfig {
      name: "os-autoinst/os-autoinst-distri-opensuse".into(),
      backend: Backend::Github,
      base_url: "https://api.github.com/repos".into(),
      id: None,
      token_key: None,
    },
    ProjectConfig {
      name: "SUSE/qa-testsuites".into(),
      backend: Backend::Github,
      base_url: "https://api.github.com/repos".into(),
      id: None,
      token_key: Some("github_token".into()),
    },
    ProjectConfig {
      name: "Project_C".into(),
      backend: Backend::Gitlab,
      base_url: "https://gitlab.suse.de/api/v4".into(),
      id: Some("5575".into()),
      token_key: None,
    },
    ProjectConfig {
      name: "Project_D".into(),
      backend: Backend::Gitlab,
      base_url: "https://gitlab.suse.de/api/v4".into(),
      id: Some("6354".into()),
      token_key: None,
    },
  ]
}

/// Builder merging presets, an optional settings file and the environment.
#[derive(Debug)]
pub struct SettingsLoader {
  search_dir: Option<PathBuf>,
  explicit_file: Option<PathBuf>,
  include_env: bool,
}

impl Default for SettingsLoader {
  fn default() -> Self {
    Self::new()
  }
}

impl SettingsLoader {
  pub fn new() -> Self {
    Self {
      search_dir: None,
      explicit_file: None,
      include_env: true,
    }
  }

  /// Look for `release-metrics.toml` / `release-metrics.json` in `dir`.
  pub fn with_search_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
    self.search_dir = Some(dir.as_ref().to_path_buf());
    self
  }

  /// Load this file instead of searching; it must exist.
  pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
    self.explicit_file = Some(path.as_ref().to_path_buf());
    self
  }

  pub fn with_env(mut self, include: bool) -> Self {
    self.include_env = include;
    self
  }

  /// Precedence (highest first): environment, explicit or discovered file, presets.
  #[tracing::instrument(skip(self), fields(file = ?self.explicit_file, search_dir = ?self.search_dir))]
  pub fn load(self) -> Result<Settings, ConfigError> {
    let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

    let file = match &self.explicit_file {
      Some(path) => {
        if !path.is_file() {
          return Err(ConfigError::Invalid {
            field: "config".into(),
            reason: format!("settings file {} does not exist", path.display()),
          });
        }
        Some(path.clone())
      }
      None => self.search_dir.as_deref().and_then(find_settings_file),
    };

    if let Some(path) = &file {
      tracing::debug!(path = %path.display(), "merging settings file");
      figment = merge_file(figment, path);
    }

    if self.include_env {
      figment = figment
        .merge(Env::prefixed(ENV_PREFIX).split("__").filter(|key| !is_secret_key(key.as_str())))
        .merge(Serialized::default("secrets", raw_env_secrets()));
    }

    let settings: Settings = figment.extract().map_err(|e| ConfigError::Load(Box::new(e)))?;
    settings.validate()?;

    tracing::debug!(
      pipelines = settings.pipelines.len(),
      projects = settings.projects.len(),
      log_level = settings.log_level.as_str(),
      "settings loaded"
    );

    Ok(settings)
  }
}

fn is_secret_key(key: &str) -> bool {
  key.to_ascii_lowercase().starts_with("secrets.")
}

/// Secret overrides keep the exact text of the variable; `0123` stays `"0123"`.
fn raw_env_secrets() -> BTreeMap<String, String> {
  Env::prefixed(SECRETS_ENV_PREFIX)
    .iter()
    .map(|(key, value)| (key.as_str().to_ascii_lowercase(), value))
    .collect()
}

fn find_settings_file(dir: &Path) -> Option<PathBuf> {
  CONFIG_EXTENSIONS
    .iter()
    .map(|ext| dir.join(format!("{APP_NAME}.{ext}")))
    .find(|p| p.is_file())
}

fn merge_file(figment: Figment, path: &Path) -> Figment {
  match path.extension().and_then(|e| e.to_str()) {
    Some("json") => figment.merge(Json::file_exact(path)),
    _ => figment.merge(Toml::file_exact(path)),
  }
}
