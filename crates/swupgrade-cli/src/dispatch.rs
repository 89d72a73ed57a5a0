use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use swupgrade_core::{ConfigFile, InstallerMode, UpgradeConfig};
use swupgrade_installer::{
    Collaborators, CommandRunner, HostPrivilegeProbe, InstallerExit, StdinOperator, UpgradeLog,
    UpgradeOrchestrator, UpgradeReport, WmiPackageRegistry,
};

use crate::render::{current_output_style, render_status_line, OutputStyle, TerminalSink};
use crate::Cli;

/// Returns the process exit code. Errors raised before the log is open are
/// returned to the caller; a failed run has already been reported through
/// the log and its terminal sink.
pub(crate) fn run_cli(cli: Cli) -> Result<ExitCode> {
    let config = resolve_config(&cli)?;
    let style = current_output_style();
    let mut log =
        UpgradeLog::open(&config.log_file)?.with_sink(Box::new(TerminalSink::new(style)));

    let mut privileges = HostPrivilegeProbe;
    let mut packages = WmiPackageRegistry;
    let mut processes = CommandRunner;
    let mut operator = StdinOperator;
    let host = Collaborators {
        privileges: &mut privileges,
        packages: &mut packages,
        processes: &mut processes,
        operator: &mut operator,
    };
    let Some(report) = run_upgrade(&config, &mut log, host) else {
        return Ok(ExitCode::FAILURE);
    };

    for line in format_report_lines(&report, log.path(), log.write_failed(), style) {
        println!("{line}");
    }
    Ok(ExitCode::SUCCESS)
}

/// `None` when the run aborted; the orchestrator has logged the reason.
pub(crate) fn run_upgrade<'a>(
    config: &'a UpgradeConfig,
    log: &'a mut UpgradeLog,
    host: Collaborators<'a>,
) -> Option<UpgradeReport> {
    UpgradeOrchestrator::new(config, log, host).run().ok()
}

pub(crate) fn resolve_config(cli: &Cli) -> Result<UpgradeConfig> {
    let file = match &cli.config {
        Some(path) => ConfigFile::load(path)?,
        None => ConfigFile::default(),
    };
    let overrides = cli_overrides(cli, &file);
    file.layered(overrides).into_config()
}

/// A single `--payload-a`/`--payload-b` keeps the other name from the layer
/// underneath.
fn cli_overrides(cli: &Cli, lower: &ConfigFile) -> ConfigFile {
    let payload_files = if cli.payload_a.is_none() && cli.payload_b.is_none() {
        None
    } else {
        let [lower_a, lower_b] = lower
            .payload_files
            .clone()
            .unwrap_or_else(|| UpgradeConfig::default().payload_files);
        Some([
            cli.payload_a.clone().unwrap_or(lower_a),
            cli.payload_b.clone().unwrap_or(lower_b),
        ])
    };

    ConfigFile {
        version: cli.version.clone(),
        archive_name: cli.archive_name.clone(),
        installer_name: cli.installer_name.clone(),
        network_base: cli.network_base.clone(),
        payload_files,
        scratch_dir: cli.scratch_dir.clone(),
        log_file: cli.log_file.clone(),
        install_base: cli.install_base.clone(),
        destination_template: cli.destination_template.clone(),
        installer_mode: cli.interactive.then_some(InstallerMode::Interactive),
        ..ConfigFile::default()
    }
}

pub(crate) fn format_report_lines(
    report: &UpgradeReport,
    log_path: &Path,
    log_write_failed: bool,
    style: OutputStyle,
) -> Vec<String> {
    let installer = match report.installer_exit {
        InstallerExit::Success => "installer exit 0".to_string(),
        InstallerExit::Unreported => "installer exit unreported".to_string(),
        InstallerExit::Failed(code) => format!("installer exit {code}"),
    };
    let payload_status = if report.copies.copied() == report.copies.attempted() {
        "ok"
    } else {
        "warn"
    };

    vec![
        render_status_line(
            style,
            "ok",
            &format!(
                "upgrade complete: {} old version(s) removed, {installer}",
                report.removals.removed.len()
            ),
        ),
        render_status_line(
            style,
            payload_status,
            &format!(
                "{} of {} payload files copied",
                report.copies.copied(),
                report.copies.attempted()
            ),
        ),
        if log_write_failed {
            render_status_line(
                style,
                "warn",
                &format!("log: {} (incomplete, writes failed)", log_path.display()),
            )
        } else {
            render_status_line(style, "info", &format!("log: {}", log_path.display()))
        },
    ]
}
