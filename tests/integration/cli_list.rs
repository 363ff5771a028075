use predicates::prelude::*;

#[test]
fn list_shows_presets_from_an_empty_directory() {
  let td = test_support::tempdir();

  test_support::cmd_bin("release-metrics")
    .current_dir(td.path())
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("pipeline\tperformance\tperfData"))
    .stdout(predicate::str::contains("pipeline\trealtime\tRealTimeData"))
    .stdout(predicate::str::contains("project\tos-autoinst/os-autoinst-distri-opensuse\tgithub"));
}

#[test]
fn discovered_settings_file_replaces_pipelines() {
  let td = test_support::tempdir();
  std::fs::write(
    td.path().join("release-metrics.toml"),
    r#"
[[pipelines]]
name = "kernel"
role = "kernel"
table = "KernelData"
document_url_key = "kernel_url"
bug_labels = ["RC1"]
selections = [{ release = "SLES-16.0", builds = ["RC1"] }]
"#,
  )
  .unwrap();

  let out = test_support::cmd_bin("release-metrics")
    .current_dir(td.path())
    .arg("list")
    .output()
    .unwrap();

  assert!(out.status.success());
  let stdout = String::from_utf8(out.stdout).unwrap();
  assert!(stdout.starts_with("pipeline\tkernel\tKernelData\nproject\t"), "{stdout}");
  assert!(!stdout.contains("perfData"));
}
