// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Shared construction of the blocking HTTP agent used for wiki and Git hosting calls
// role: transport/http
// outputs: ureq::Agent with explicit timeout and user agent; auth header helpers
// invariants: Every outbound request goes through an agent built here, so none is issued without a timeout
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

pub const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

pub fn agent(timeout: Duration) -> ureq::Agent {
  ureq::AgentBuilder::new().timeout(timeout).user_agent(USER_AGENT).build()
}

/// `Authorization` value for HTTP basic auth.
pub fn basic_auth(username: &str, password: &str) -> String {
  format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
}
