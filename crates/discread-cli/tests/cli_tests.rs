//! Integration tests for the discread CLI
//!
//! Every test runs against simulated device profiles, so no hardware or
//! privileges are needed.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Get a command for the discread binary
#[allow(deprecated)]
fn discread() -> Command {
    let mut cmd = Command::cargo_bin("discread").unwrap();
    cmd.env_remove("DISCREAD_CONFIG").env_remove("RUST_LOG");
    cmd
}

/// Path to a bundled profile
fn profile(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("profiles")
        .join(name)
}

/// Write a profile into a temp dir
fn temp_profile(dir: &TempDir, contents: &str) -> PathBuf {
    let path = dir.path().join("device.toml");
    fs::write(&path, contents).unwrap();
    path
}

// ============================================================================
// Help and Version Tests
// ============================================================================

#[test]
fn test_help_flag() {
    discread()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("sector reader"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("probe"))
        .stdout(predicate::str::contains("read"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_flag() {
    discread()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("discread"))
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_no_args_shows_help() {
    discread()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}

#[test]
fn test_read_help() {
    discread()
        .args(["read", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("<PROFILE>"))
        .stdout(predicate::str::contains("<START>"))
        .stdout(predicate::str::contains("--output"))
        .stdout(predicate::str::contains("--raw"));
}

// ============================================================================
// Probe Tests
// ============================================================================

#[test]
fn test_probe_usb_stick() {
    discread()
        .arg("probe")
        .arg(profile("usb-stick.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("GENERIC FLASH DISK"))
        .stdout(predicate::str::contains("262144 blocks of 512 bytes"))
        .stdout(predicate::str::contains("Transfer: 64 blocks per command"));
}

#[test]
fn test_probe_json() {
    let output = discread()
        .args(["probe", "--json"])
        .arg(profile("usb-stick.toml"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["transport"], "scsi");
    assert_eq!(summary["geometry"]["blocks"], 262144);
    assert_eq!(summary["read_command"], "read16");
    assert_eq!(summary["blocks_to_read"], 64);
    assert!(summary["raw"].is_null());
}

#[test]
fn test_probe_transfer_start_override() {
    let output = discread()
        .args(["probe", "--json", "--blocks", "1000"])
        .arg(profile("usb-stick.toml"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let blocks = summary["blocks_to_read"].as_u64().unwrap();
    assert!(blocks > 0 && blocks <= 240);
}

#[test]
fn test_probe_raw_plextor() {
    let output = discread()
        .args(["probe", "--raw", "--json"])
        .arg(profile("plextor-dvd.toml"))
        .output()
        .unwrap();
    assert!(output.status.success());

    let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(summary["raw"]["command"], "plextor-read-raw-dvd");
    assert_eq!(summary["raw"]["long_block_size"], 2064);
}

#[test]
fn test_probe_raw_syquest() {
    discread()
        .args(["probe", "--raw"])
        .arg(profile("syquest.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("520 bytes per sector"));
}

#[test]
fn test_probe_chs_disk() {
    discread()
        .arg("probe")
        .arg(profile("chs-disk.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("1048/2/40"))
        .stdout(predicate::str::contains("CHS only"));
}

#[test]
fn test_probe_empty_drive_fails() {
    discread()
        .arg("probe")
        .arg(profile("empty-dvd-drive.toml"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Negotiation failed"))
        .stderr(predicate::str::contains("Cannot read medium"));
}

#[test]
fn test_probe_missing_profile() {
    discread()
        .args(["probe", "/nonexistent/device.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load device profile"));
}

#[test]
fn test_probe_invalid_profile() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_profile(&temp_dir, "blocks = 100\nwarp_drive = true\n");

    discread()
        .arg("probe")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid device profile"));
}

#[test]
fn test_probe_read6_only_large_medium() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_profile(&temp_dir, "blocks = 2097153\nreads = [\"read6\"]\n");

    discread()
        .arg("probe")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("READ (6)"));
}

// ============================================================================
// Read Tests
// ============================================================================

#[test]
fn test_read_hex_dump() {
    discread()
        .arg("read")
        .arg(profile("usb-stick.toml"))
        .args(["16", "1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "00000000  10 00 00 00 00 00 00 00 18 19 1a 1b 1c 1d 1e 1f",
        ))
        .stdout(predicate::str::contains("000001f0"));
}

#[test]
fn test_read_to_file() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("out.bin");

    discread()
        .arg("read")
        .arg(profile("usb-stick.toml"))
        .args(["0", "300", "--quiet", "--output"])
        .arg(&output)
        .assert()
        .success();

    let data = fs::read(&output).unwrap();
    assert_eq!(data.len(), 300 * 512);
    assert_eq!(&data[512..520], &1u64.to_le_bytes());
    assert_eq!(&data[299 * 512..299 * 512 + 8], &299u64.to_le_bytes());
}

#[test]
fn test_read_backing_image() {
    let temp_dir = TempDir::new().unwrap();
    let image: Vec<u8> = (0..8 * 256).map(|i| (i / 256) as u8 + b'a').collect();
    fs::write(temp_dir.path().join("disk.img"), &image).unwrap();
    let path = temp_profile(
        &temp_dir,
        "blocks = 8\nblock_size = 256\nimage = \"disk.img\"\n",
    );
    let output = temp_dir.path().join("copy.bin");

    discread()
        .arg("read")
        .arg(&path)
        .arg("0")
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("Read 8 blocks"));

    assert_eq!(fs::read(&output).unwrap(), image);
}

#[test]
fn test_read_raw_sectors() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("raw.bin");

    discread()
        .arg("read")
        .arg(profile("syquest.toml"))
        .args(["10", "2", "--raw", "-q", "-o"])
        .arg(&output)
        .assert()
        .success();

    assert_eq!(fs::read(&output).unwrap().len(), 2 * 520);
}

#[test]
fn test_read_raw_unavailable() {
    discread()
        .arg("read")
        .arg(profile("usb-stick.toml"))
        .args(["0", "1", "--raw"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no raw sector read path"));
}

#[test]
fn test_read_chs_disk() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("chs.bin");

    discread()
        .arg("read")
        .arg(profile("chs-disk.toml"))
        .args(["79", "3", "-q", "-o"])
        .arg(&output)
        .assert()
        .success();

    let data = fs::read(&output).unwrap();
    assert_eq!(data.len(), 3 * 512);
    assert_eq!(&data[..8], &79u64.to_le_bytes());
}

#[test]
fn test_read_bad_block() {
    let temp_dir = TempDir::new().unwrap();
    let output = temp_dir.path().join("bad.bin");

    discread()
        .arg("read")
        .arg(profile("ata-disk.toml"))
        .args(["1000", "100", "-o"])
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed reading"));
}

#[test]
fn test_read_past_end() {
    discread()
        .arg("read")
        .arg(profile("usb-stick.toml"))
        .args(["262140", "10"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("past the end"));
}

#[test]
fn test_read_start_beyond_medium() {
    discread()
        .arg("read")
        .arg(profile("usb-stick.toml"))
        .arg("262144")
        .assert()
        .failure()
        .stderr(predicate::str::contains("past the end"));
}

#[test]
fn test_read_zero_count() {
    discread()
        .arg("read")
        .arg(profile("usb-stick.toml"))
        .args(["0", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("count is 0"));
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_path_flag() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("discread_config.toml");

    discread()
        .arg("--config")
        .arg(&config)
        .args(["config", "--path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("discread_config.toml"));
}

#[test]
fn test_config_init_and_show() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("discread_config.toml");

    discread()
        .arg("--config")
        .arg(&config)
        .args(["config", "--init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));
    assert!(config.exists());

    discread()
        .arg("--config")
        .arg(&config)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[reader]"))
        .stdout(predicate::str::contains("start_blocks = 64"))
        .stdout(predicate::str::contains("hex_width = 16"));
}

#[test]
fn test_config_env_var() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("from_env.toml");
    fs::write(&config, "[output]\nhex_width = 8\n").unwrap();

    discread()
        .env("DISCREAD_CONFIG", &config)
        .args(["config", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"hex_width\": 8"));
}

#[test]
fn test_settings_apply_to_read() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("discread_config.toml");
    fs::write(&config, "[output]\nhex_width = 8\n").unwrap();

    discread()
        .arg("--config")
        .arg(&config)
        .arg("read")
        .arg(profile("usb-stick.toml"))
        .args(["0", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("00000008 "))
        .stdout(predicate::str::contains("000001f8 "));
}

#[test]
fn test_settings_json_default_for_probe() {
    let temp_dir = TempDir::new().unwrap();
    let config = temp_dir.path().join("discread_config.toml");
    fs::write(&config, "[output]\njson = true\n").unwrap();

    discread()
        .arg("--config")
        .arg(&config)
        .arg("probe")
        .arg(profile("usb-stick.toml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("\"blocks_to_read\": 64"));
}

// ============================================================================
// Completions Tests
// ============================================================================

#[test]
fn test_completions_bash() {
    discread()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("discread"));
}

#[test]
fn test_completions_invalid_shell() {
    discread()
        .args(["completions", "cmd"])
        .assert()
        .failure();
}
