use anyhow::{anyhow, Context, Result};
use std::ffi::OsString;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use crate::types::{InstalledPackage, InstallerExit};

/// Answers whether the current process may install software machine-wide.
pub trait PrivilegeProbe {
    fn is_elevated(&mut self) -> Result<bool>;
}

/// Installed-product database of the host.
pub trait PackageRegistry {
    fn list_installed(&mut self, pattern: &str) -> Result<Vec<InstalledPackage>>;
    fn uninstall(&mut self, package: &InstalledPackage) -> Result<()>;
}

/// Launches a process and blocks until it exits.
pub trait ProcessRunner {
    fn run(&mut self, command: &InstallerCommand) -> Result<InstallerExit>;
}

/// Asked to approve continuing after an interactive install ends badly.
pub trait Operator {
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallerCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
}

impl InstallerCommand {
    pub fn display(&self) -> String {
        let mut rendered = self.program.display().to_string();
        for arg in &self.args {
            rendered.push(' ');
            rendered.push_str(&arg.to_string_lossy());
        }
        rendered
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct HostPrivilegeProbe;

impl PrivilegeProbe for HostPrivilegeProbe {
    fn is_elevated(&mut self) -> Result<bool> {
        if cfg!(windows) {
            // `net session` only succeeds for members of the Administrators group.
            let status = Command::new("net")
                .arg("session")
                .output()
                .context("failed to run 'net session' for privilege check")?
                .status;
            return Ok(status.success());
        }

        let output = Command::new("id")
            .arg("-u")
            .output()
            .context("failed to run 'id -u' for privilege check")?;
        if !output.status.success() {
            return Err(command_failure("failed to query effective user id", &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim() == "0")
    }
}

/// Products registered with Windows Installer, queried through WMI.
#[derive(Debug, Default, Clone, Copy)]
pub struct WmiPackageRegistry;

impl PackageRegistry for WmiPackageRegistry {
    fn list_installed(&mut self, pattern: &str) -> Result<Vec<InstalledPackage>> {
        if !cfg!(windows) {
            return Err(anyhow!(
                "installed product enumeration is supported only on Windows hosts"
            ));
        }

        let mut command = build_product_query_command(pattern);
        let output = command
            .output()
            .context("failed to query installed products: powershell failed to start")?;
        if !output.status.success() {
            return Err(command_failure("failed to query installed products", &output));
        }
        Ok(parse_product_rows(&String::from_utf8_lossy(&output.stdout)))
    }

    fn uninstall(&mut self, package: &InstalledPackage) -> Result<()> {
        if !cfg!(windows) {
            return Err(anyhow!(
                "product uninstall is supported only on Windows hosts"
            ));
        }
        if package.id.trim().is_empty() {
            return Err(anyhow!(
                "cannot uninstall '{}' {}: product code is unknown",
                package.name,
                package.version
            ));
        }

        let mut command = build_product_uninstall_command(&package.id);
        let output = command.output().with_context(|| {
            format!(
                "failed to uninstall '{}' {}: msiexec failed to start",
                package.name, package.version
            )
        })?;
        if uninstall_exit_is_success(output.status.code()) {
            return Ok(());
        }
        Err(command_failure(
            &format!("failed to uninstall '{}' {}", package.name, package.version),
            &output,
        ))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CommandRunner;

impl ProcessRunner for CommandRunner {
    fn run(&mut self, command: &InstallerCommand) -> Result<InstallerExit> {
        let status = Command::new(&command.program)
            .args(&command.args)
            .status()
            .with_context(|| format!("failed to start installer: {}", command.display()))?;
        Ok(InstallerExit::from_code(status.code()))
    }
}

/// Reads the answer from standard input; anything but `y`/`yes` declines.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdinOperator;

impl Operator for StdinOperator {
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let mut stdout = io::stdout();
        write!(stdout, "{prompt} [y/N] ").context("failed to write confirmation prompt")?;
        stdout.flush().context("failed to flush confirmation prompt")?;

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("failed to read operator confirmation")?;
        Ok(is_affirmative(&answer))
    }
}

pub(crate) fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub(crate) fn build_product_query_command(pattern: &str) -> Command {
    let script = format!(
        "$ErrorActionPreference = 'Stop'; \
         $pattern = '*' + [WildcardPattern]::Escape('{}') + '*'; \
         Get-CimInstance -ClassName Win32_Product | \
         Where-Object {{ $_.Name -like $pattern }} | \
         ForEach-Object {{ ($_.Name, $_.Version, $_.IdentifyingNumber) -join [char]9 }}",
        escape_ps_single_quote(pattern)
    );
    let mut command = Command::new("powershell");
    command.arg("-NoProfile").arg("-Command").arg(script);
    command
}

pub(crate) fn build_product_uninstall_command(product_code: &str) -> Command {
    let mut command = Command::new("msiexec");
    command
        .arg("/x")
        .arg(product_code)
        .arg("/qn")
        .arg("/norestart");
    command
}

/// `name<TAB>version<TAB>product code` rows; rows without a name are skipped.
pub(crate) fn parse_product_rows(raw: &str) -> Vec<InstalledPackage> {
    raw.lines()
        .filter_map(|line| {
            let mut fields = line.trim_end_matches('\r').split('\t');
            let name = fields.next()?.trim();
            if name.is_empty() {
                return None;
            }
            Some(InstalledPackage {
                name: name.to_string(),
                version: fields.next().unwrap_or_default().trim().to_string(),
                id: fields.next().unwrap_or_default().trim().to_string(),
            })
        })
        .collect()
}

/// 1605: product already gone. 3010/1641: removed, reboot pending.
pub(crate) fn uninstall_exit_is_success(code: Option<i32>) -> bool {
    matches!(code, Some(0 | 1605 | 1641 | 3010))
}

/// Windows Installer packages go through `msiexec`; everything else is
/// launched directly.
pub fn build_installer_command(
    installer: &Path,
    unattended: bool,
    silent_args: &[String],
) -> InstallerCommand {
    let is_msi = installer
        .extension()
        .and_then(|value| value.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("msi"));

    if is_msi {
        let mut args = vec![OsString::from("/i"), installer.as_os_str().to_os_string()];
        if unattended {
            args.push(OsString::from("/qn"));
            args.push(OsString::from("/norestart"));
        }
        return InstallerCommand {
            program: PathBuf::from("msiexec"),
            args,
        };
    }

    let args = if unattended {
        silent_args.iter().map(OsString::from).collect()
    } else {
        Vec::new()
    };
    InstallerCommand {
        program: installer.to_path_buf(),
        args,
    }
}

fn command_failure(context_message: &str, output: &Output) -> anyhow::Error {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stdout = String::from_utf8_lossy(&output.stdout);
    anyhow!(
        "{context_message}: status={} stdout='{}' stderr='{}'",
        output.status,
        stdout.trim(),
        stderr.trim()
    )
}

fn escape_ps_single_quote(value: &str) -> String {
    value.replace('\'', "''")
}
