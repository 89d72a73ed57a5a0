mod archive;
mod fs_utils;
mod host;
mod log;
mod orchestrator;
mod payload;
mod types;

pub use archive::{extract_archive, find_installer, list_installer_candidates, reset_scratch_dir};
pub use host::{
    build_installer_command, CommandRunner, HostPrivilegeProbe, InstallerCommand, Operator,
    PackageRegistry, PrivilegeProbe, ProcessRunner, StdinOperator, WmiPackageRegistry,
};
pub use log::{format_log_line, format_system_time, LogLevel, LogSink, UpgradeLog};
pub use orchestrator::{Collaborators, UpgradeOrchestrator};
pub use payload::{copy_payloads, sha256_file_hex, verify_payload};
pub use types::{
    CopyOutcome, CopyReport, CopyStatus, InstalledPackage, InstallerExit, StaleRemovalReport,
    UpgradeReport, VerifiedFile,
};
