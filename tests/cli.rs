use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const SAMPLE: &str = "\
[DEFAULT]

; --------- Battery Current limits ---------
MAX_BATTERY_CHARGE_CURRENT = 50.0
MAX_BATTERY_DISCHARGE_CURRENT = 60.0

; --------- Cell Voltages ---------
MIN_CELL_VOLTAGE = 2.900
MAX_CELL_VOLTAGE = 3.450
";

fn base_cmd(state: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("sbc"));
    cmd.env("SBC_STATE_DIR", state)
        .env_remove("SBC_RESTART_COMMAND")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

fn sample_file(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("driver.ini");
    fs::write(&path, SAMPLE).unwrap();
    path
}

fn save_profile(state: &Path) {
    base_cmd(state)
        .args([
            "profile",
            "set",
            "--host",
            "venus.local",
            "--user",
            "root",
            "--password",
            "s3cret",
            "--remote-path",
            "/data/etc/dbus-serialbattery/config.ini",
        ])
        .assert()
        .success()
        .stdout(contains("SSH settings saved successfully."));
}

#[test]
fn show_groups_fields_by_section() {
    let dir = TempDir::new().unwrap();
    let file = sample_file(&dir);

    base_cmd(dir.path())
        .arg("show")
        .arg(&file)
        .assert()
        .success()
        .stdout(contains("--------- Battery Current limits ---------"))
        .stdout(contains("  MAX_BATTERY_CHARGE_CURRENT = 50.0"))
        .stdout(contains("  MAX_CELL_VOLTAGE = 3.450"));
}

#[test]
fn show_json_lists_sections() {
    let dir = TempDir::new().unwrap();
    let file = sample_file(&dir);

    let output = base_cmd(dir.path())
        .args(["--json", "show"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["state"], "loaded");
    let sections = json["sections"].as_array().unwrap();
    let limits = sections
        .iter()
        .find(|s| s["title"] == "--------- Battery Current limits ---------")
        .unwrap();
    assert_eq!(limits["fields"][0][0], "MAX_BATTERY_CHARGE_CURRENT");
    assert_eq!(limits["fields"][0][1], "50.0");
}

#[test]
fn set_then_get_preserves_layout() {
    let dir = TempDir::new().unwrap();
    let file = sample_file(&dir);

    base_cmd(dir.path())
        .arg("set")
        .arg(&file)
        .arg("MAX_CELL_VOLTAGE=3.500")
        .assert()
        .success()
        .stdout(contains("Saved 1 field(s)"));

    base_cmd(dir.path())
        .arg("get")
        .arg(&file)
        .arg("MAX_CELL_VOLTAGE")
        .assert()
        .success()
        .stdout("3.500\n");

    let expected = SAMPLE.replace("MAX_CELL_VOLTAGE = 3.450", "MAX_CELL_VOLTAGE = 3.500");
    assert_eq!(fs::read_to_string(&file).unwrap(), expected);
}

#[test]
fn set_unknown_field_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let file = sample_file(&dir);

    base_cmd(dir.path())
        .arg("set")
        .arg(&file)
        .arg("MAX_CELL_VOLTAGE=3.500")
        .arg("NO_SUCH_FIELD=1")
        .assert()
        .code(3)
        .stderr(contains("Unknown field: NO_SUCH_FIELD"));

    assert_eq!(fs::read_to_string(&file).unwrap(), SAMPLE);
}

#[test]
fn get_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();

    base_cmd(dir.path())
        .arg("get")
        .arg(dir.path().join("absent.ini"))
        .arg("X")
        .assert()
        .code(8);
}

#[test]
fn remote_commands_need_a_profile() {
    let dir = TempDir::new().unwrap();
    let file = sample_file(&dir);

    for args in [vec!["pull"], vec!["push", file.to_str().unwrap(), "--yes"], vec!["apply", "--yes"]] {
        base_cmd(dir.path())
            .args(&args)
            .assert()
            .code(7)
            .stderr(contains("Remote connection is not configured"))
            .stderr(contains("sbc profile set"));
    }
}

#[test]
fn remote_error_as_json() {
    let dir = TempDir::new().unwrap();

    let output = base_cmd(dir.path()).args(["--json", "pull"]).output().unwrap();
    assert_eq!(output.status.code(), Some(7));

    let json: Value = serde_json::from_slice(&output.stderr).unwrap();
    assert_eq!(json["error"]["code"], "NOT_CONFIGURED");
    assert_eq!(json["error"]["exit_code"], 7);
}

#[test]
fn profile_round_trip_masks_password() {
    let dir = TempDir::new().unwrap();
    save_profile(dir.path());

    base_cmd(dir.path())
        .args(["profile", "show"])
        .assert()
        .success()
        .stdout(contains("venus.local"))
        .stdout(contains("********"))
        .stdout(contains("s3cret").not());

    let stored = fs::read_to_string(dir.path().join("ssh_config.txt")).unwrap();
    assert_eq!(
        stored,
        "hostname=venus.local\nusername=root\npassword=s3cret\nremote_config_path=/data/etc/dbus-serialbattery/config.ini\n"
    );

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(dir.path().join("ssh_config.txt")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn profile_set_merges_and_clear_removes() {
    let dir = TempDir::new().unwrap();
    save_profile(dir.path());

    base_cmd(dir.path())
        .args(["profile", "set", "--host", "192.168.1.20"])
        .assert()
        .success();

    let output = base_cmd(dir.path()).args(["--json", "profile", "show"]).output().unwrap();
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["profile"]["host"], "192.168.1.20");
    assert_eq!(json["profile"]["username"], "root");
    assert_eq!(json["has_password"], true);
    assert!(json["profile"].get("secret").is_none());

    base_cmd(dir.path()).args(["profile", "clear"]).assert().success();
    assert!(!dir.path().join("ssh_config.txt").exists());
    base_cmd(dir.path())
        .args(["profile", "show"])
        .assert()
        .success()
        .stdout(contains("No connection profile saved yet."));
}

#[test]
fn push_without_yes_is_cancelled_off_terminal() {
    let dir = TempDir::new().unwrap();
    let file = sample_file(&dir);
    save_profile(dir.path());

    base_cmd(dir.path())
        .arg("push")
        .arg(&file)
        .write_stdin("")
        .assert()
        .code(5)
        .stderr(contains("Operation cancelled"));
}

#[test]
fn push_without_local_file() {
    let dir = TempDir::new().unwrap();
    save_profile(dir.path());

    base_cmd(dir.path())
        .args(["push", "--yes"])
        .assert()
        .code(3)
        .stderr(contains("Local config file is missing"));
}

#[test]
fn apply_without_yes_is_cancelled_off_terminal() {
    let dir = TempDir::new().unwrap();
    save_profile(dir.path());

    base_cmd(dir.path())
        .arg("apply")
        .write_stdin("")
        .assert()
        .code(5);
}

#[test]
fn shell_session_from_stdin() {
    let dir = TempDir::new().unwrap();
    let file = sample_file(&dir);
    let script = format!(
        "load {}\nget MIN_CELL_VOLTAGE\nset MIN_CELL_VOLTAGE 3.000\nstatus\nsave\nbogus\nquit\n",
        file.display()
    );

    base_cmd(dir.path())
        .arg("shell")
        .write_stdin(script)
        .assert()
        .success()
        .stdout(contains("Loaded 4 fields"))
        .stdout(contains("MIN_CELL_VOLTAGE = 2.900"))
        .stdout(contains("State:   modified"))
        .stdout(contains("Config file saved successfully"))
        .stdout(contains("Error: Invalid argument: unknown command 'bogus'"));

    assert!(fs::read_to_string(&file).unwrap().contains("MIN_CELL_VOLTAGE = 3.000\n"));
}

#[test]
fn version_and_completions() {
    let dir = TempDir::new().unwrap();

    base_cmd(dir.path())
        .arg("version")
        .assert()
        .success()
        .stdout(contains("sbc version"));

    base_cmd(dir.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(contains("sbc"));
}
