use super::*;
use clap::error::ErrorKind;
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use swupgrade_core::{InstallerMode, UpgradeConfig};
use anyhow::{anyhow, Result};
use swupgrade_installer::{
    Collaborators, CopyOutcome, CopyReport, CopyStatus, InstalledPackage, InstallerCommand,
    InstallerExit, LogLevel, LogSink, Operator, PackageRegistry, PrivilegeProbe, ProcessRunner,
    StaleRemovalReport, UpgradeLog, UpgradeReport,
};

use crate::dispatch::{format_report_lines, resolve_config, run_upgrade};
use crate::render::{render_status_line, resolve_output_style, OutputStyle};

static TEST_DIR_COUNTER: AtomicU64 = AtomicU64::new(0);

fn test_dir() -> PathBuf {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system time")
        .as_nanos();
    let seq = TEST_DIR_COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join(format!(
        "swupgrade-cli-{}-{nanos}-{seq}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("must create test dir");
    dir
}

fn parse(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("swupgrade").chain(args.iter().copied()))
        .expect("arguments must parse")
}

#[test]
fn no_arguments_resolve_to_defaults() {
    let config = resolve_config(&parse(&[])).expect("defaults must resolve");
    assert_eq!(config, UpgradeConfig::default());
}

#[test]
fn command_line_options_override_defaults() {
    let cli = parse(&[
        "--version-label",
        "2026",
        "--archive",
        "Viewer_2026.zip",
        "--installer",
        "Install.exe",
        "--network-base",
        "/mnt/share",
        "--payload-b",
        "Plot.dwg",
        "--scratch-dir",
        "/tmp/scratch",
        "--log-file",
        "/tmp/upgrade.log",
        "--install-base",
        "/opt/viewer",
        "--destination",
        "Viewer {version}",
        "--interactive",
    ]);
    let config = resolve_config(&cli).expect("must resolve");
    let defaults = UpgradeConfig::default();

    assert_eq!(config.version, "2026");
    assert_eq!(config.archive_name, "Viewer_2026.zip");
    assert_eq!(config.installer_name, "Install.exe");
    assert_eq!(config.network_base, PathBuf::from("/mnt/share"));
    assert_eq!(
        config.payload_files,
        [defaults.payload_files[0].clone(), "Plot.dwg".to_string()]
    );
    assert_eq!(config.installer_mode, InstallerMode::Interactive);
    assert_eq!(
        config.destination_dir(),
        PathBuf::from("/opt/viewer").join("Viewer 2026")
    );
}

#[test]
fn config_file_sits_between_defaults_and_flags() {
    let dir = test_dir();
    let path = dir.join("upgrade.toml");
    fs::write(
        &path,
        r#"
version = "2024"
payload_files = ["A.DWG", "B.DWG"]
settle_delay_secs = 2
cleanup_scratch = false
"#,
    )
    .expect("must write config");

    let path_arg = path.display().to_string();
    let cli = parse(&["--config", &path_arg, "--payload-a", "C.DWG"]);
    let config = resolve_config(&cli).expect("must resolve");
    assert_eq!(config.version, "2024");
    assert_eq!(config.payload_files, ["C.DWG".to_string(), "B.DWG".to_string()]);
    assert_eq!(config.settle_delay, Duration::from_secs(2));
    assert!(!config.cleanup_scratch);
    assert_eq!(config.installer_mode, InstallerMode::Unattended);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn missing_config_file_is_an_error() {
    let dir = test_dir();
    let missing = dir.join("absent.toml").display().to_string();
    let err = resolve_config(&parse(&["--config", &missing])).expect_err("must fail");
    assert!(err.to_string().contains("failed to read config file"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn duplicate_payload_flags_fail_validation() {
    let cli = parse(&["--payload-a", "Same.dwg", "--payload-b", "same.DWG"]);
    let err = resolve_config(&cli).expect_err("duplicate payloads must fail");
    assert!(err.to_string().contains("payload files must be distinct"));
}

#[test]
fn unknown_flags_are_rejected() {
    let err = Cli::try_parse_from(["swupgrade", "--dry-run"]).expect_err("must reject");
    assert_eq!(err.kind(), ErrorKind::UnknownArgument);
}

#[test]
fn resolve_output_style_prefers_rich_on_tty() {
    assert_eq!(resolve_output_style(true, false), OutputStyle::Rich);
    assert_eq!(resolve_output_style(true, true), OutputStyle::Plain);
    assert_eq!(resolve_output_style(false, false), OutputStyle::Plain);
}

#[test]
fn render_status_line_plain_uses_ascii_badges() {
    assert_eq!(
        render_status_line(OutputStyle::Plain, "warn", "1 of 2 files copied successfully"),
        "[WARN] 1 of 2 files copied successfully"
    );
    assert_eq!(
        render_status_line(OutputStyle::Plain, "info", "found installer"),
        "[..] found installer"
    );
}

#[test]
fn render_status_line_rich_wraps_badge_in_ansi() {
    let line = render_status_line(OutputStyle::Rich, "error", "archive missing");
    assert!(line.starts_with('\u{1b}'), "{line:?}");
    assert!(line.contains("[ERR]"));
    assert!(line.ends_with(" archive missing"));
}

#[test]
fn report_lines_summarize_partial_copy() {
    let report = UpgradeReport {
        removals: StaleRemovalReport::default(),
        extracted_files: 1,
        installer: PathBuf::from("scratch/Setup.exe"),
        installer_exit: InstallerExit::Unreported,
        copies: CopyReport {
            outcomes: vec![
                CopyOutcome {
                    file_name: "A.DWG".to_string(),
                    source: PathBuf::from("share/A.DWG"),
                    destination: PathBuf::from("dest/A.DWG"),
                    status: CopyStatus::Copied { bytes: 10 },
                },
                CopyOutcome {
                    file_name: "B.DWG".to_string(),
                    source: PathBuf::from("share/B.DWG"),
                    destination: PathBuf::from("dest/B.DWG"),
                    status: CopyStatus::Failed {
                        error: "source file not found".to_string(),
                    },
                },
            ],
        },
        verified: Vec::new(),
        scratch_removed: true,
    };

    let lines = format_report_lines(&report, Path::new("upgrade.log"), false, OutputStyle::Plain);
    assert_eq!(
        lines,
        vec![
            "[OK] upgrade complete: 0 old version(s) removed, installer exit unreported",
            "[WARN] 1 of 2 payload files copied",
            "[..] log: upgrade.log",
        ]
    );

    let lines = format_report_lines(&report, Path::new("upgrade.log"), true, OutputStyle::Plain);
    assert_eq!(lines[2], "[WARN] log: upgrade.log (incomplete, writes failed)");
}

struct NotElevated;

impl PrivilegeProbe for NotElevated {
    fn is_elevated(&mut self) -> Result<bool> {
        Ok(false)
    }
}

struct Untouched;

impl PackageRegistry for Untouched {
    fn list_installed(&mut self, _pattern: &str) -> Result<Vec<InstalledPackage>> {
        Err(anyhow!("registry must not be queried"))
    }

    fn uninstall(&mut self, _package: &InstalledPackage) -> Result<()> {
        Err(anyhow!("registry must not be modified"))
    }
}

impl ProcessRunner for Untouched {
    fn run(&mut self, _command: &InstallerCommand) -> Result<InstallerExit> {
        Err(anyhow!("installer must not run"))
    }
}

impl Operator for Untouched {
    fn confirm(&mut self, _prompt: &str) -> Result<bool> {
        Ok(false)
    }
}

#[derive(Clone, Default)]
struct CountingSink {
    events: Rc<RefCell<Vec<(LogLevel, String)>>>,
}

impl LogSink for CountingSink {
    fn emit(&mut self, level: LogLevel, message: &str) {
        self.events.borrow_mut().push((level, message.to_string()));
    }
}

#[test]
fn aborted_run_is_reported_once_through_the_log() {
    let dir = test_dir();
    let config = UpgradeConfig {
        log_file: dir.join("upgrade.log"),
        scratch_dir: dir.join("scratch"),
        ..UpgradeConfig::default()
    };
    let sink = CountingSink::default();
    let mut log = UpgradeLog::open(&config.log_file)
        .expect("must open log")
        .with_sink(Box::new(sink.clone()));

    let mut privileges = NotElevated;
    let mut packages = Untouched;
    let mut processes = Untouched;
    let mut operator = Untouched;
    let report = run_upgrade(
        &config,
        &mut log,
        Collaborators {
            privileges: &mut privileges,
            packages: &mut packages,
            processes: &mut processes,
            operator: &mut operator,
        },
    );
    assert!(report.is_none());

    let events = sink.events.borrow();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].0, LogLevel::Error);
    assert!(events[0].1.starts_with("upgrade aborted: administrative privileges"));
    drop(events);

    let raw = fs::read_to_string(&config.log_file).expect("must read log");
    assert_eq!(raw.lines().count(), 1);
    assert!(!config.scratch_dir.exists());

    let _ = fs::remove_dir_all(&dir);
}
