use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

mod dispatch;
mod render;

#[cfg(test)]
mod tests;

/// Every option falls back to the config file, then to the built-in default.
#[derive(Parser, Debug)]
#[command(name = "swupgrade")]
#[command(
    about = "Upgrade a Windows application from an installer archive on a network share",
    long_about = None
)]
struct Cli {
    /// TOML file with upgrade settings.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Target version label, e.g. 2025.
    #[arg(long = "version-label")]
    version: Option<String>,
    /// Archive file name on the network share.
    #[arg(long = "archive")]
    archive_name: Option<String>,
    /// Installer file name inside the archive.
    #[arg(long = "installer")]
    installer_name: Option<String>,
    #[arg(long)]
    network_base: Option<PathBuf>,
    /// First payload file copied into the install directory.
    #[arg(long)]
    payload_a: Option<String>,
    /// Second payload file copied into the install directory.
    #[arg(long)]
    payload_b: Option<String>,
    #[arg(long)]
    scratch_dir: Option<PathBuf>,
    #[arg(long)]
    log_file: Option<PathBuf>,
    #[arg(long)]
    install_base: Option<PathBuf>,
    /// Install subdirectory under the install base; `{version}` is replaced.
    #[arg(long = "destination")]
    destination_template: Option<String>,
    /// Run the installer with its UI and wait for the operator.
    #[arg(long)]
    interactive: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match dispatch::run_cli(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
