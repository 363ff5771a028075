// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Install the process-wide tracing subscriber for the binary
// role: observability/logging
// inputs: --quiet / -v count from the CLI, RUST_LOG, settings log_level
// outputs: fmt subscriber writing to stderr
// invariants: Never writes to stdout (reserved for line-protocol output)
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::io::IsTerminal;

use tracing_subscriber::filter::EnvFilter;

/// Priority: quiet flag > verbose flag > RUST_LOG > `default_level`.
pub fn env_filter(quiet: bool, verbose: u8, default_level: &str) -> EnvFilter {
  if quiet {
    return EnvFilter::new("error");
  }

  if verbose > 0 {
    let level = match verbose {
      1 => "debug",
      _ => "trace",
    };
    return EnvFilter::new(level);
  }

  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init(filter: EnvFilter) {
  let _ = tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .with_ansi(std::io::stderr().is_terminal())
    .with_target(false)
    .try_init();
}
