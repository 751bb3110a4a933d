use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const SCENARIO: &str = "Plan 1 (Start: Rice)\n{'Year': 1, 'Crop': 'Rice', 'NPK Before': [80.0, 40.0, 60.0], 'Fertilizer Added': [0.0, 0.0, 0.0], 'Predicted Yield (q/ha)': 45.2, 'Area (ha)': 2.5, 'Revenue (INR)': 95000.0}\n";

fn cropbridge() -> Command {
    let mut cmd = Command::cargo_bin("cropbridge").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn parse_reads_stdin() {
    cropbridge()
        .arg("parse")
        .write_stdin(SCENARIO)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"startCrop\": \"Rice\""))
        .stdout(predicate::str::contains("\"revenue\": 95000.0"));
}

#[test]
fn parse_reads_file_and_reports_skipped_records() {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}{{'Year': 2, 'Crop': oops}}\n", SCENARIO).unwrap();

    cropbridge()
        .arg("parse")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("\"details\""));

    cropbridge()
        .args(["parse", "--strict"])
        .arg(file.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("MalformedOutput"));
}

#[test]
fn parse_rejects_output_without_plans() {
    cropbridge()
        .arg("parse")
        .write_stdin("Traceback (most recent call last):\n")
        .assert()
        .failure()
        .stdout(predicate::str::contains("MalformedOutput"));
}

#[test]
fn schema_describes_config() {
    cropbridge()
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("rate_limit"))
        .stdout(predicate::str::contains("allowed_origins"));
}

#[test]
fn predict_rejects_unknown_region_before_spawning() {
    cropbridge()
        .args([
            "predict", "kharif", "-n", "80", "-p", "40", "-k", "60", "--region", "Delhi",
            "--area", "2.5",
        ])
        .assert()
        .failure()
        .stdout(predicate::str::contains("InvalidInput"))
        .stdout(predicate::str::contains("region"));
}

#[test]
fn predict_rejects_unknown_season() {
    cropbridge()
        .args([
            "predict", "zaid", "-n", "80", "-p", "40", "-k", "60", "--region", "Bangalore",
            "--area", "2.5",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown season"));
}

#[test]
fn check_fails_without_interpreter() {
    let mut config = NamedTempFile::new().unwrap();
    writeln!(
        config,
        "worker:\n  interpreter: /nonexistent/python\n  models_dir: /nonexistent/models"
    )
    .unwrap();

    cropbridge()
        .arg("check")
        .arg("--config")
        .arg(config.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"ready\": false"));
}
