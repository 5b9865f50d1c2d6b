//! Corruption recovery tests for the sip binary.
//!
//! Damaged WAL lines, torn writes, broken sleep signals, and absent
//! files must degrade to warnings, never to a crash or data loss. A
//! malformed config file is the one exception: it fails loudly.

use assert_cmd::Command;
use chrono::{Duration, Utc};
use std::fs;
use std::io::Write as IoWrite;
use tempfile::TempDir;

fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("sip"))
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_corrupted_wal_lines_ignored_during_read() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    // WAL where every line is garbage
    fs::create_dir_all(data_dir.join("wal")).unwrap();
    let wal_path = data_dir.join("wal/doses.wal");
    fs::write(&wal_path, "{ bad json }\nnot json either")
        .expect("Failed to write corrupted WAL");

    // CLI can still report status (corrupted lines are logged as warnings)
    cli()
        .arg("status")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    // Logging a new dose on top of the damage also works
    cli()
        .arg("log")
        .arg("80")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();
}

#[test]
fn test_partial_wal_line() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    // WAL whose last line was torn mid-write, as after a crash
    fs::create_dir_all(data_dir.join("wal")).unwrap();
    let wal_path = data_dir.join("wal/doses.wal");

    let mut file = fs::File::create(&wal_path).unwrap();
    writeln!(
        file,
        r#"{{"id":"00000000-0000-0000-0000-000000000001","beverage_id":null,"amount_mg":95.0,"occurred_at":"2024-03-01T08:00:00Z","note":null}}"#
    )
    .unwrap();
    // Truncated record with no trailing newline
    write!(file, r#"{{"id":"partial"#).unwrap();
    drop(file);

    // Reads keep the good line and skip the torn one
    cli()
        .arg("status")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    cli()
        .arg("curve")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();
}

#[test]
fn test_missing_sleep_signal() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    // Don't create a sleep signal file - CLI should work fine
    cli()
        .arg("status")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    cli()
        .arg("next")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();
}

#[test]
fn test_corrupted_sleep_signal() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    // Create signals directory with a corrupted signal
    let signals_dir = data_dir.join("signals");
    fs::create_dir_all(&signals_dir).unwrap();

    let signal_path = signals_dir.join("sleep.json");
    fs::write(&signal_path, "{ woke_at: broken").expect("Failed to write corrupted signal");

    cli()
        .arg("status")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    cli()
        .arg("next")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();
}

#[test]
fn test_fresh_sleep_signal_accepted() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let signals_dir = data_dir.join("signals");
    fs::create_dir_all(&signals_dir).unwrap();

    // A wake time an hour ago should be picked up without error
    let woke_at = (Utc::now() - Duration::hours(1)).to_rfc3339();
    fs::write(
        signals_dir.join("sleep.json"),
        format!(r#"{{"woke_at":"{}","source":"wearable"}}"#, woke_at),
    )
    .unwrap();

    cli()
        .arg("next")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();
}

#[test]
fn test_empty_wal_file() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    fs::create_dir_all(data_dir.join("wal")).unwrap();
    fs::write(data_dir.join("wal/doses.wal"), "").unwrap();

    // CLI works with an empty WAL
    cli()
        .arg("status")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();
}

#[test]
fn test_rollup_with_valid_wal() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    cli()
        .arg("log")
        .arg("drip_coffee")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    cli()
        .arg("rollup")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    assert!(data_dir.join("doses.csv").exists());
}

#[test]
fn test_undo_preserves_corrupt_lines() {
    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    fs::create_dir_all(data_dir.join("wal")).unwrap();
    let wal_path = data_dir.join("wal/doses.wal");

    let mut file = fs::File::create(&wal_path).unwrap();
    writeln!(file, "not json at all").unwrap();
    writeln!(
        file,
        r#"{{"id":"00000000-0000-0000-0000-000000000001","beverage_id":null,"amount_mg":95.0,"occurred_at":"2024-03-01T08:00:00Z","note":null}}"#
    )
    .unwrap();
    writeln!(
        file,
        r#"{{"id":"00000000-0000-0000-0000-000000000002","beverage_id":null,"amount_mg":63.0,"occurred_at":"2024-03-01T12:00:00Z","note":null}}"#
    )
    .unwrap();
    drop(file);

    // Undo removes the newest parseable dose
    cli()
        .arg("undo")
        .arg("--data-dir")
        .arg(&data_dir)
        .assert()
        .success();

    // The unparseable line is kept for manual inspection
    let content = fs::read_to_string(&wal_path).unwrap();
    assert!(content.contains("not json at all"));
    assert!(content.contains("\"amount_mg\":95.0"));
    assert!(!content.contains("\"amount_mg\":63.0"));
}

#[test]
fn test_corrupted_config_rejected() {
    if cfg!(target_os = "macos") {
        // dirs ignores XDG_CONFIG_HOME on macOS
        return;
    }

    let temp_dir = setup_test_dir();
    let config_home = temp_dir.path().join("config");
    let sip_dir = config_home.join("sip");
    fs::create_dir_all(&sip_dir).unwrap();
    fs::write(sip_dir.join("config.toml"), "this is [[ not toml").unwrap();

    // A broken config is a hard error, not something to silently ignore
    cli()
        .arg("status")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .env("XDG_CONFIG_HOME", &config_home)
        .assert()
        .failure();
}

#[test]
fn test_negative_half_life_config_rejected() {
    if cfg!(target_os = "macos") {
        // dirs ignores XDG_CONFIG_HOME on macOS
        return;
    }

    let temp_dir = setup_test_dir();
    let config_home = temp_dir.path().join("config");
    let sip_dir = config_home.join("sip");
    fs::create_dir_all(&sip_dir).unwrap();
    fs::write(sip_dir.join("config.toml"), "[decay]\nhalf_life_hours = -5.0\n").unwrap();

    // With a negative half-life the model amplifies doses instead of
    // decaying them; both the write and read paths must refuse it
    cli()
        .arg("log")
        .arg("100")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .env("XDG_CONFIG_HOME", &config_home)
        .assert()
        .failure();

    cli()
        .arg("status")
        .arg("--data-dir")
        .arg(temp_dir.path())
        .env("XDG_CONFIG_HOME", &config_home)
        .assert()
        .failure();
}

#[test]
fn test_permission_denied_sleep_signal() {
    // chmod-based test, unix only
    if cfg!(windows) {
        return;
    }

    let temp_dir = setup_test_dir();
    let data_dir = temp_dir.path().to_path_buf();

    let signals_dir = data_dir.join("signals");
    fs::create_dir_all(&signals_dir).unwrap();
    let signal_path = signals_dir.join("sleep.json");
    fs::write(&signal_path, "{}").unwrap();

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mut perms = fs::metadata(&signal_path).unwrap().permissions();
        perms.set_mode(0o000);
        fs::set_permissions(&signal_path, perms).unwrap();

        // An unreadable signal is treated like a missing one
        cli()
            .arg("status")
            .arg("--data-dir")
            .arg(&data_dir)
            .assert()
            .success();

        // Restore mode so TempDir can delete the file
        let mut perms = fs::metadata(&signal_path).unwrap().permissions();
        perms.set_mode(0o644);
        fs::set_permissions(&signal_path, perms).unwrap();
    }
}
