// === Module Header (agents-tooling) START ===
// header: Parsed by scripts/check_module_headers.sh for purpose/role presence; keep keys on single-line entries.
// purpose: Utilities for subprocess calls, host name discovery, and man page rendering
// role: utilities/helpers
// inputs: Program + args; optional machine override; clap CommandFactory
// outputs: Command stdout, machine tag for line protocol, man page text
// side_effects: run_command invokes subprocesses; machine_name may read /etc/hostname
// invariants:
// - machine_name never returns an empty string (falls back to "localhost")
// - A configured machine override is used verbatim after trimming
// errors: run_command surfaces command + stderr
// tie_breakers: contracts > orchestration > correctness > performance > minimal_diffs
// === Module Header END ===

use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result};
use clap::CommandFactory;

const HOSTNAME_FILE: &str = "/etc/hostname";
const FALLBACK_MACHINE: &str = "localhost";

pub fn run_command(program: &str, args: &[&str]) -> Result<String> {
  let out = Command::new(program)
    .args(args)
    .output()
    .with_context(|| format!("spawning {program} {:?}", args))?;

  if out.status.success() {
    Ok(String::from_utf8_lossy(&out.stdout).to_string())
  } else {
    let stderr = String::from_utf8_lossy(&out.stderr);
    anyhow::bail!("{program} {:?} failed: {}", args, stderr)
  }
}

fn non_empty(s: &str) -> Option<String> {
  let t = s.trim();
  (!t.is_empty()).then(|| t.to_string())
}

fn hostname_from_file(path: &Path) -> Option<String> {
  std::fs::read_to_string(path).ok().as_deref().and_then(non_empty)
}

/// Fully qualified host name: `hostname -f`, then `/etc/hostname`, then `localhost`.
pub fn host_fqdn() -> String {
  match run_command("hostname", &["-f"]) {
    Ok(out) => {
      if let Some(name) = non_empty(&out) {
        return name;
      }
    }
    Err(e) => tracing::debug!(error = %format!("{e:#}"), "hostname -f unavailable"),
  }

  hostname_from_file(Path::new(HOSTNAME_FILE)).unwrap_or_else(|| FALLBACK_MACHINE.to_string())
}

/// `machine` tag value: the configured override when set, else [`host_fqdn`].
pub fn machine_name(configured: Option<&str>) -> String {
  configured.and_then(non_empty).unwrap_or_else(host_fqdn)
}

/// Render a section-1 man page for a clap `CommandFactory` implementor.
/// Returns the troff content as a UTF-8 string.
pub fn render_man_page<T: CommandFactory>() -> Result<String> {
  let cmd = T::command();
  let man = clap_mangen::Man::new(cmd);
  let mut buf: Vec<u8> = Vec::new();

  man.render(&mut buf)?;

  Ok(String::from_utf8_lossy(&buf).to_string())
}
