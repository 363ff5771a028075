use std::path::Path;

use release_metrics::destination::SqliteDestination;
use test_support::{read_fixture_text, seed_report_view, CannedResponse, CannedServer};

const ROWS: &[(&str, &str, &str, &str)] = &[
  ("Beta1", "SLES-15-SP5", "performance", "pass"),
  ("Beta1", "SLES-15-SP5", "performance", "pass"),
  ("Beta1", "SLES-15-SP5", "performance", "fail"),
  ("Beta1", "SLES-15-SP5", "performance", "skip"),
  ("RC1", "SLES-15-SP5", "performance", "FAIL"),
  ("GMC", "SLES-15-SP5", "performance", "pass"),
  ("GMC", "SLES-15-SP4", "performance", "pass"),
  ("Beta2", "SLES-15-SP5", "kernel", "pass"),
];

fn write_config(dir: &Path, document_url: &str) {
  let body = format!(
    r#"
[secrets]
username = "qa-bot"
password = "s3cret"
db_path = '{}'
new_db_path = '{}'
confluence_url = "{document_url}"
"#,
    dir.join("source.sqlite").display(),
    dir.join("dest.sqlite").display(),
  );
  std::fs::write(dir.join("release-metrics.toml"), body).unwrap();
}

#[test]
fn performance_pipeline_inserts_once_then_skips() {
  let server = CannedServer::start(vec![
    CannedResponse::json(read_fixture_text("confluence_page.json")),
    CannedResponse::json(read_fixture_text("confluence_page.json")),
  ]);
  let td = test_support::tempdir();
  seed_report_view(&td.path().join("source.sqlite"), ROWS);
  write_config(td.path(), &format!("{}/rest/api/content/123456?expand=body.view", server.base_url()));

  for _ in 0..2 {
    let out = test_support::cmd_bin("release-metrics")
      .current_dir(td.path())
      .args(["reconcile", "performance"])
      .output()
      .unwrap();
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert!(out.stdout.is_empty());
  }
  let requests = server.finish();

  let dest = SqliteDestination::open(td.path().join("dest.sqlite"), "perfData").unwrap();
  let rows = dest.rows().unwrap();
  let summary: Vec<(&str, i64, i64, i64, i64)> = rows
    .iter()
    .map(|r| (r.milestone.as_str(), r.total, r.pass, r.fail, r.bugs))
    .collect();

  // Beta2 only has kernel rows, so it never shows up; second run adds nothing
  assert_eq!(summary, [("Beta1", 3, 2, 1, 12), ("GMC", 1, 1, 0, 0), ("RC1", 1, 0, 1, 2)]);
  assert_eq!(rows[0].execution_date.len(), "YYYY-MM-DD HH:MM:SS".len());

  assert_eq!(requests.len(), 2);
  assert_eq!(requests[0].header("authorization"), Some("Basic cWEtYm90OnMzY3JldA=="));
}

#[test]
fn unreachable_wiki_still_records_rows_with_zero_bugs() {
  let server = CannedServer::start(vec![CannedResponse::json(r#"{"message":"gone"}"#).with_status(404)]);
  let td = test_support::tempdir();
  seed_report_view(&td.path().join("source.sqlite"), ROWS);
  write_config(td.path(), &server.base_url());

  let out = test_support::cmd_bin("release-metrics")
    .current_dir(td.path())
    .args(["reconcile", "performance"])
    .output()
    .unwrap();
  server.finish();

  assert!(out.status.success());
  assert!(String::from_utf8_lossy(&out.stderr).contains("bug counts unavailable"));

  let dest = SqliteDestination::open(td.path().join("dest.sqlite"), "perfData").unwrap();
  let rows = dest.rows().unwrap();
  assert_eq!(rows.len(), 3);
  assert!(rows.iter().all(|r| r.bugs == 0));
}

#[test]
fn missing_source_database_fails_the_pipeline() {
  let td = test_support::tempdir();
  write_config(td.path(), "http://127.0.0.1:9/unused");

  let out = test_support::cmd_bin("release-metrics")
    .current_dir(td.path())
    .args(["reconcile", "performance"])
    .output()
    .unwrap();

  assert!(!out.status.success());
  assert!(String::from_utf8_lossy(&out.stderr).contains("source.sqlite"));

  // destination was opened (and its table created) before the source failed
  let dest = SqliteDestination::open(td.path().join("dest.sqlite"), "perfData").unwrap();
  assert!(dest.rows().unwrap().is_empty());
}
