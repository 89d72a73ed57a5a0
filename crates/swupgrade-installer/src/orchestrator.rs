use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::thread;
use swupgrade_core::{InstallerMode, UpgradeConfig};

use crate::archive::{extract_archive, find_installer, list_installer_candidates, reset_scratch_dir};
use crate::fs_utils::remove_path_if_exists;
use crate::host::{
    build_installer_command, Operator, PackageRegistry, PrivilegeProbe, ProcessRunner,
};
use crate::log::{format_system_time, UpgradeLog};
use crate::payload::{copy_payloads, verify_payload};
use crate::types::{
    CopyReport, CopyStatus, InstallerExit, StaleRemovalReport, UpgradeReport, VerifiedFile,
};

/// Host services the upgrade depends on.
pub struct Collaborators<'a> {
    pub privileges: &'a mut dyn PrivilegeProbe,
    pub packages: &'a mut dyn PackageRegistry,
    pub processes: &'a mut dyn ProcessRunner,
    pub operator: &'a mut dyn Operator,
}

/// Runs the upgrade steps in a fixed order. Fatal steps return an error that
/// is logged once by [`UpgradeOrchestrator::run`]; advisory steps log and carry
/// on.
pub struct UpgradeOrchestrator<'a> {
    config: &'a UpgradeConfig,
    log: &'a mut UpgradeLog,
    host: Collaborators<'a>,
    remove_scratch: fn(&Path) -> io::Result<()>,
}

impl<'a> UpgradeOrchestrator<'a> {
    pub fn new(config: &'a UpgradeConfig, log: &'a mut UpgradeLog, host: Collaborators<'a>) -> Self {
        Self {
            config,
            log,
            host,
            remove_scratch: remove_path_if_exists,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_scratch_remover(mut self, remover: fn(&Path) -> io::Result<()>) -> Self {
        self.remove_scratch = remover;
        self
    }

    pub fn run(mut self) -> Result<UpgradeReport> {
        match self.run_steps() {
            Ok(report) => Ok(report),
            Err(err) => {
                self.log.error(format!("upgrade aborted: {err:#}"));
                Err(err)
            }
        }
    }

    fn run_steps(&mut self) -> Result<UpgradeReport> {
        self.check_privileges()?;
        self.log.info(format!(
            "starting upgrade to version {} ({} install)",
            self.config.version,
            self.config.installer_mode.as_str()
        ));

        let removals = self.remove_stale_versions();
        let archive_path = self.check_archive()?;

        self.log.info(format!(
            "resetting scratch directory {}",
            self.config.scratch_dir.display()
        ));
        reset_scratch_dir(&self.config.scratch_dir)?;

        let extracted_files = self.extract(&archive_path)?;
        let installer = self.discover_installer()?;
        let installer_exit = self.install(&installer)?;
        self.settle();

        let copies = self.copy_payloads();
        let verified = self.verify_payloads();
        let scratch_removed = self.cleanup();

        self.log.ok(format!(
            "upgrade to version {} finished",
            self.config.version
        ));
        Ok(UpgradeReport {
            removals,
            extracted_files,
            installer,
            installer_exit,
            copies,
            verified,
            scratch_removed,
        })
    }

    fn check_privileges(&mut self) -> Result<()> {
        let elevated = self
            .host
            .privileges
            .is_elevated()
            .context("failed to determine administrative privileges")?;
        if !elevated {
            return Err(anyhow!(
                "administrative privileges are required; re-run from an elevated prompt"
            ));
        }
        Ok(())
    }

    fn remove_stale_versions(&mut self) -> StaleRemovalReport {
        let mut report = StaleRemovalReport::default();
        let pattern = self.config.product_pattern();
        self.log
            .info(format!("checking installed products matching '{pattern}'"));

        let installed = match self.host.packages.list_installed(&pattern) {
            Ok(installed) => installed,
            Err(err) => {
                self.log.warn(format!(
                    "could not list installed products, old versions were not removed: {err:#}"
                ));
                return report;
            }
        };
        if installed.is_empty() {
            self.log.info("no installed products matched");
        }

        for package in installed {
            if package.carries_version(&self.config.version) {
                self.log.info(format!(
                    "keeping '{}' {}: already the target version",
                    package.name, package.version
                ));
                report.kept.push(package);
                continue;
            }

            self.log.info(format!(
                "uninstalling '{}' {}",
                package.name, package.version
            ));
            match self.host.packages.uninstall(&package) {
                Ok(()) => {
                    self.log
                        .ok(format!("uninstalled '{}' {}", package.name, package.version));
                    report.removed.push(package);
                }
                Err(err) => {
                    self.log.warn(format!(
                        "failed to uninstall '{}' {}, continuing: {err:#}",
                        package.name, package.version
                    ));
                    report.failed.push((package, format!("{err:#}")));
                }
            }
        }
        report
    }

    fn check_archive(&mut self) -> Result<PathBuf> {
        let archive_path = self.config.archive_path();
        if !archive_path.is_file() {
            return Err(anyhow!(
                "installer archive not found: {}; check that the network share is reachable and that the archive name '{}' is correct",
                archive_path.display(),
                self.config.archive_name
            ));
        }
        self.log
            .info(format!("found installer archive {}", archive_path.display()));
        Ok(archive_path)
    }

    fn extract(&mut self, archive_path: &Path) -> Result<usize> {
        self.log.info(format!(
            "extracting {} into {}",
            archive_path.display(),
            self.config.scratch_dir.display()
        ));
        let extracted = extract_archive(archive_path, &self.config.scratch_dir)
            .with_context(|| format!("failed to extract {}", archive_path.display()))?;
        self.log.ok(format!("extracted {extracted} files"));
        Ok(extracted)
    }

    fn discover_installer(&mut self) -> Result<PathBuf> {
        let scratch_dir = &self.config.scratch_dir;
        if let Some(installer) = find_installer(scratch_dir, &self.config.installer_name)? {
            self.log
                .info(format!("found installer {}", installer.display()));
            return Ok(installer);
        }

        let candidates = list_installer_candidates(scratch_dir)?;
        if candidates.is_empty() {
            self.log
                .warn("no executables were found anywhere in the extracted archive");
        } else {
            self.log.warn(format!(
                "executables found in the extracted archive ({}):",
                candidates.len()
            ));
            for candidate in &candidates {
                self.log.warn(format!("  {}", candidate.display()));
            }
        }

        Err(anyhow!(
            "installer '{}' not found under {}; check the installer name",
            self.config.installer_name,
            scratch_dir.display()
        ))
    }

    fn install(&mut self, installer: &Path) -> Result<InstallerExit> {
        let interactive = self.config.installer_mode == InstallerMode::Interactive;
        let command = build_installer_command(installer, !interactive, &self.config.silent_args);

        if interactive {
            self.log.warn(
                "interactive install: complete the installer window manually; the upgrade resumes when it closes",
            );
        }
        self.log.info(format!("running {}", command.display()));

        let exit = self.host.processes.run(&command)?;
        match exit {
            InstallerExit::Success => self.log.ok("installer finished with exit code 0"),
            InstallerExit::Unreported => self
                .log
                .warn("installer exited without reporting an exit code; assuming success"),
            InstallerExit::Failed(code) => {
                self.log.warn(format!(
                    "installer finished with exit code {code}; the install may be incomplete"
                ));
                if interactive {
                    let prompt = format!(
                        "The installer returned exit code {code}. Continue copying payload files?"
                    );
                    if !self.host.operator.confirm(&prompt)? {
                        return Err(anyhow!(
                            "upgrade stopped by operator after installer exit code {code}"
                        ));
                    }
                    self.log.info("operator confirmed continuing");
                }
            }
        }
        Ok(exit)
    }

    fn settle(&mut self) {
        let delay = self.config.settle_delay;
        if !delay.is_zero() {
            self.log.info(format!(
                "waiting {}s for the installer to finish background setup",
                delay.as_secs_f32()
            ));
        }
        thread::sleep(delay);
    }

    fn payload_sources(&self) -> Vec<(String, PathBuf)> {
        self.config
            .payload_files
            .iter()
            .map(|name| (name.clone(), self.config.payload_source(name)))
            .collect()
    }

    fn copy_payloads(&mut self) -> CopyReport {
        let destination_dir = self.config.destination_dir();
        if let Err(err) = fs::create_dir_all(&destination_dir) {
            self.log.error(format!(
                "failed to create destination directory {}: {err}",
                destination_dir.display()
            ));
        }
        self.log.info(format!(
            "copying payload files to {}",
            destination_dir.display()
        ));

        let report = copy_payloads(&destination_dir, &self.payload_sources());
        for outcome in &report.outcomes {
            match &outcome.status {
                CopyStatus::Copied { bytes } => self.log.ok(format!(
                    "copied {} ({bytes} bytes)",
                    outcome.file_name
                )),
                CopyStatus::Failed { error } => self
                    .log
                    .error(format!("failed to copy {}: {error}", outcome.file_name)),
            }
        }

        let summary = format!(
            "{} of {} files copied successfully",
            report.copied(),
            report.attempted()
        );
        if report.copied() == report.attempted() {
            self.log.ok(summary);
        } else {
            self.log.warn(summary);
        }
        report
    }

    fn verify_payloads(&mut self) -> Vec<VerifiedFile> {
        let destination_dir = self.config.destination_dir();
        let mut verified = Vec::new();
        for (name, source) in self.payload_sources() {
            let file = verify_payload(&destination_dir.join(&name), &source);
            if !file.present {
                self.log.warn(format!(
                    "expected file missing after copy: {}",
                    file.path.display()
                ));
                verified.push(file);
                continue;
            }

            self.log.info(format!(
                "verified {}: {} bytes, modified {}, sha256 {}",
                file.path.display(),
                file.size.unwrap_or_default(),
                file.modified
                    .map(format_system_time)
                    .unwrap_or_else(|| "unknown".to_string()),
                file.sha256.as_deref().unwrap_or("unavailable")
            ));
            if file.matches_source == Some(false) {
                self.log.warn(format!(
                    "{} differs from its source {}",
                    file.path.display(),
                    source.display()
                ));
            }
            verified.push(file);
        }
        verified
    }

    fn cleanup(&mut self) -> bool {
        let scratch_dir = &self.config.scratch_dir;
        if !self.config.cleanup_scratch {
            self.log.info(format!(
                "keeping scratch directory {}",
                scratch_dir.display()
            ));
            return false;
        }

        match (self.remove_scratch)(scratch_dir) {
            Ok(()) => {
                self.log
                    .info(format!("removed scratch directory {}", scratch_dir.display()));
                true
            }
            Err(err) => {
                self.log.warn(format!(
                    "failed to remove scratch directory {}: {err}; delete it manually",
                    scratch_dir.display()
                ));
                false
            }
        }
    }
}
