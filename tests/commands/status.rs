//! Integration tests for `qgep-datamodel status`.

use crate::common::{parse_json, stdout, TestDatabase, TestProject};

#[test]
fn test_status_without_service() {
    let project = TestProject::new();

    let output = project.run_fails(&["--json", "status"], 1);
    let json = parse_json(&output);
    assert_eq!(json["ok"], true);
    assert_eq!(json["evaluation"]["state"], "no_profile_selected");
    assert_eq!(json["evaluation"]["target_version"], "1.1.0");
    assert_eq!(json["checks"]["pgconfig"], false);
    assert_eq!(json["ready"], false);
}

#[test]
fn test_status_without_deltas() {
    let project = TestProject::with_deltas(&[]);
    project.add_service("pg_qgep", "postgres://qgep@127.0.0.1:1/qgep");

    let output = project.run_fails(&["--json", "-s", "pg_qgep", "status"], 1);
    let json = parse_json(&output);
    assert_eq!(json["evaluation"]["state"], "no_target_found");
    assert_eq!(json["evaluation"]["label"], "no delta in datamodel");
    assert_eq!(json["checks"]["datamodel"], false);
}

#[test]
fn test_status_connection_unavailable() {
    let project = TestProject::new();
    project.add_service("pg_qgep", "postgres://qgep@127.0.0.1:1/qgep");

    let output = project.run_fails(&["--json", "-s", "pg_qgep", "status"], 1);
    let json = parse_json(&output);
    assert_eq!(json["evaluation"]["state"], "connection_unavailable");
    assert_eq!(json["evaluation"]["severity"], "error");
    assert_eq!(json["evaluation"]["actions"]["initialize_visible"], false);
    assert_eq!(json["evaluation"]["actions"]["upgrade_visible"], false);
    assert_eq!(json["requirements"]["satisfied"], true);
}

#[test]
fn test_status_quiet_prints_state_only() {
    let project = TestProject::new();
    let output = project.run_fails(&["--quiet", "status"], 1);
    assert_eq!(stdout(&output).trim(), "no_profile_selected");
}

#[test]
fn test_status_uses_config_default_service() {
    let project = TestProject::new();
    project.add_service("pg_default", "postgres://qgep@127.0.0.1:1/qgep");
    project.write_file(
        "qgep-datamodel.toml",
        "[service]\ndefault = \"pg_default\"\n",
    );

    let json = parse_json(&project.run_fails(&["--json", "status"], 1));
    assert_eq!(json["service"], "pg_default");
    assert_eq!(json["evaluation"]["state"], "connection_unavailable");
}

#[test]
fn test_status_not_initialized() {
    skip_if_no_db!();
    let db = TestDatabase::new();
    let project = TestProject::new();
    project.add_service("pg_qgep", db.url());

    let output = project.run_fails(&["--json", "-s", "pg_qgep", "status"], 1);
    let json = parse_json(&output);
    assert_eq!(json["evaluation"]["state"], "not_initialized");
    assert_eq!(json["evaluation"]["severity"], "warning");
    assert_eq!(json["evaluation"]["actions"]["initialize_visible"], true);
    assert_eq!(json["evaluation"]["actions"]["upgrade_visible"], false);
    assert_eq!(json["checks"]["project"], false);
}

#[test]
fn test_status_database_missing() {
    skip_if_no_db!();
    let project = TestProject::new();
    project.add_service("pg_qgep", &TestDatabase::missing_url());

    let output = project.run_fails(&["--json", "-s", "pg_qgep", "status"], 1);
    let json = parse_json(&output);
    assert_eq!(json["evaluation"]["state"], "database_missing");
    assert_eq!(json["evaluation"]["label"], "database does not exist");
}

#[test]
fn test_status_up_to_date_with_upgrade_available() {
    skip_if_no_db!();
    let db = TestDatabase::new();
    db.init_pum_info(&["1.0.0"]);
    let project = TestProject::new();
    project.add_service("pg_qgep", db.url());

    let output = project.run_ok(&["--json", "-s", "pg_qgep", "status"]);
    let json = parse_json(&output);
    assert_eq!(json["evaluation"]["state"], "up_to_date");
    assert_eq!(json["evaluation"]["current_version"], "1.0.0");
    assert_eq!(json["evaluation"]["target_version"], "1.1.0");
    assert_eq!(json["evaluation"]["upgrade_available"], true);
    assert_eq!(json["evaluation"]["actions"]["upgrade_enabled"], true);
    assert_eq!(json["ready"], true);
}

#[test]
fn test_status_cannot_downgrade() {
    skip_if_no_db!();
    let db = TestDatabase::new();
    db.init_pum_info(&["1.0.0", "2.0.0"]);
    let project = TestProject::new();
    project.add_service("pg_qgep", db.url());

    let output = project.run_fails(&["-s", "pg_qgep", "status"], 1);
    assert!(stdout(&output).contains("2.0.0 (cannot downgrade)"));
}
