//! Integration tests for `init`, `upgrade`, `project` and `deps`.
//!
//! The setup script and the migration tool are replaced with small shell
//! scripts that write the metadata table through psql, using the same
//! pg_service file as the binary.

use crate::common::{parse_json, read, stderr, stdout, TestDatabase, TestProject};

#[test]
fn test_init_requires_service() {
    let project = TestProject::new();
    let output = project.run_fails(&["init", "--yes"], 12);
    assert!(stderr(&output).contains("no service selected"));
}

#[test]
fn test_init_rejected_when_unreachable() {
    let project = TestProject::new();
    project.add_service("pg_qgep", "postgres://qgep@127.0.0.1:1/qgep");

    let output = project.run_fails(&["-s", "pg_qgep", "init", "--yes"], 1);
    assert!(stderr(&output).contains("cannot initialize"));
}

#[test]
fn test_upgrade_error_json_envelope() {
    let project = TestProject::new();
    project.add_service("pg_qgep", "postgres://qgep@127.0.0.1:1/qgep");

    let output = project.run_fails(&["--json", "-s", "pg_qgep", "upgrade", "--yes"], 1);
    let json = parse_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["errors"][0]["code"], "invalid_state");
}

#[test]
fn test_project_forced_writes_template() {
    let project = TestProject::new();
    let out = project.path("out.qgs");

    let output = project.run_ok(&[
        "-s",
        "pg_custom",
        "project",
        "--force",
        "--output",
        out.to_str().unwrap(),
    ]);
    assert_eq!(stdout(&output).trim(), out.display().to_string());
    assert!(read(&out).contains("service='pg_custom'"));
}

#[test]
fn test_project_to_temporary_file() {
    let project = TestProject::new();
    let json = parse_json(&project.run_ok(&["--json", "-s", "pg_custom", "project", "--force"]));
    let path = std::path::PathBuf::from(json["path"].as_str().unwrap());
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("qgs"));
    assert!(read(&path).contains("service='pg_custom'"));
    std::fs::remove_file(path).unwrap();
}

#[test]
fn test_deps_check_without_requirements_file() {
    let project = TestProject::new();
    std::fs::remove_file(project.path("datamodel/requirements.txt")).unwrap();

    let json = parse_json(&project.run_fails(&["--json", "deps", "check"], 1));
    assert_eq!(json["requirements"]["satisfied"], false);
    assert!(json["requirements"]["message"]
        .as_str()
        .unwrap()
        .contains("requirements.txt"));
}

#[test]
fn test_deps_check_empty_requirements() {
    let project = TestProject::new();
    project.run_ok(&["deps", "check"]);
}

#[cfg(unix)]
#[test]
fn test_init_then_upgrade() {
    skip_if_no_db!();
    let db = TestDatabase::new();
    let project = TestProject::new();
    project.add_service("pg_qgep", db.url());

    // <script> -s <srid> -p <service>
    project.write_script(
        "datamodel/scripts/db_setup.sh",
        r#"psql "service=$4" -v ON_ERROR_STOP=1 -c "CREATE SCHEMA qgep_sys; CREATE TABLE qgep_sys.pum_info (version text, srid text); INSERT INTO qgep_sys.pum_info VALUES ('1.0.0', '$2');""#,
    );
    // <pum> upgrade -p <service> -t <table> -d <delta> -u <version> -v int SRID <srid>
    project.write_script(
        "fake_pum.sh",
        r#"test -d "$7"
psql "service=$3" -v ON_ERROR_STOP=1 -c "INSERT INTO $5 VALUES ('$9', '${13}');""#,
    );
    project.write_file(
        "qgep-datamodel.toml",
        &format!(
            "[tools]\npum = [\"{}\"]\n",
            project.path("fake_pum.sh").display()
        ),
    );

    let output = project.run_ok(&["-s", "pg_qgep", "init", "--yes", "--srid", "21781"]);
    assert!(stdout(&output).contains("successfully initialized"));
    assert_eq!(db.query("SELECT srid FROM qgep_sys.pum_info"), "21781");

    let json = parse_json(&project.run_ok(&["--json", "-s", "pg_qgep", "upgrade", "--yes"]));
    assert_eq!(json["ok"], true);
    assert_eq!(json["evaluation"]["state"], "up_to_date");
    assert_eq!(json["evaluation"]["current_version"], "1.1.0");
    assert_eq!(json["evaluation"]["upgrade_available"], false);

    let project_file = project.path("bound.qgs");
    project.run_ok(&[
        "-s",
        "pg_qgep",
        "project",
        "-o",
        project_file.to_str().unwrap(),
    ]);
    assert!(read(&project_file).contains("service='pg_qgep'"));
}

#[cfg(unix)]
#[test]
fn test_failed_upgrade_reports_command_error() {
    skip_if_no_db!();
    let db = TestDatabase::new();
    db.init_pum_info(&["1.0.0"]);
    let project = TestProject::new();
    project.add_service("pg_qgep", db.url());

    project.write_script("fake_pum.sh", "echo 'delta failed' >&2\nexit 3");
    project.write_file(
        "qgep-datamodel.toml",
        &format!(
            "[tools]\npum = [\"{}\"]\n",
            project.path("fake_pum.sh").display()
        ),
    );

    let output = project.run_fails(&["--json", "-s", "pg_qgep", "upgrade", "--yes"], 14);
    let json = parse_json(&output);
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "command_failed");
    assert!(json["error"]["message"]
        .as_str()
        .unwrap()
        .contains("delta failed"));
    // re-evaluated after the failure
    assert_eq!(json["evaluation"]["current_version"], "1.0.0");
}

#[cfg(unix)]
#[test]
fn test_upgrade_refused_with_unmet_requirements() {
    skip_if_no_db!();
    let db = TestDatabase::new();
    db.init_pum_info(&["1.0.0"]);
    let project = TestProject::new();
    project.add_service("pg_qgep", db.url());

    project.write_file("datamodel/requirements.txt", "pum==0.9.2\n");
    project.write_script("fake_python.sh", "echo 'pum==0.9.2: missing'\nexit 1");
    project.write_script("fake_pum.sh", "touch pum_ran");
    project.write_file(
        "qgep-datamodel.toml",
        &format!(
            "[tools]\npython = \"{}\"\npum = [\"{}\"]\n",
            project.path("fake_python.sh").display(),
            project.path("fake_pum.sh").display()
        ),
    );

    let output = project.run_fails(&["--json", "-s", "pg_qgep", "upgrade", "--yes"], 1);
    let json = parse_json(&output);
    assert_eq!(json["errors"][0]["code"], "invalid_state");
    assert!(json["errors"][0]["message"]
        .as_str()
        .unwrap()
        .contains("requirements"));
    assert!(!project.path("pum_ran").exists());
    assert!(!project.path("datamodel/pum_ran").exists());
}
