use predicates::prelude::*;

#[test]
fn missing_subcommand_exits_with_usage_error() {
  test_support::cmd_bin("release-metrics")
    .assert()
    .code(2)
    .stderr(predicate::str::contains("subcommand"));
}

#[test]
fn explicit_missing_config_file_fails() {
  let td = test_support::tempdir();

  test_support::cmd_bin("release-metrics")
    .current_dir(td.path())
    .args(["--config", "nowhere.toml", "list"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn config_path_from_environment_is_honored() {
  let td = test_support::tempdir();

  test_support::cmd_bin("release-metrics")
    .current_dir(td.path())
    .env("RELEASE_METRICS_CONFIG", td.path().join("absent.json"))
    .arg("list")
    .assert()
    .failure()
    .stderr(predicate::str::contains("absent.json"));
}

#[test]
fn reconcile_without_secrets_names_the_missing_key() {
  let td = test_support::tempdir();

  test_support::cmd_bin("release-metrics")
    .current_dir(td.path())
    .args(["reconcile", "alp"])
    .assert()
    .failure()
    .stdout(predicate::str::is_empty())
    .stderr(predicate::str::contains("new_db_path"));
}

#[test]
fn unknown_pipeline_is_rejected() {
  let td = test_support::tempdir();

  test_support::cmd_bin("release-metrics")
    .current_dir(td.path())
    .args(["reconcile", "nightly"])
    .assert()
    .failure()
    .stderr(predicate::str::contains("no pipeline named `nightly`"));
}

#[test]
fn invalid_table_name_is_a_configuration_error() {
  let td = test_support::tempdir();
  let cfg = td.path().join("bad.json");
  std::fs::write(
    &cfg,
    r#"{ "pipelines": [{ "name": "x", "role": "x", "table": "a-b", "document_url_key": "u",
          "bug_labels": [], "selections": [{ "builds": ["RC1"] }] }] }"#,
  )
  .unwrap();

  test_support::cmd_bin("release-metrics")
    .current_dir(td.path())
    .arg("--config")
    .arg(&cfg)
    .arg("list")
    .assert()
    .failure()
    .stderr(predicate::str::contains("not a plain SQL identifier"));
}
