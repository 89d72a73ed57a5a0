use std::path::PathBuf;
use std::time::SystemTime;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    pub name: String,
    pub version: String,
    /// Identity handed back to the registry for uninstall (an MSI product code
    /// on Windows).
    pub id: String,
}

impl InstalledPackage {
    /// Substring match against the target version label, the same test the
    /// stale-version sweep uses to decide what to keep.
    pub fn carries_version(&self, target_version: &str) -> bool {
        self.version.contains(target_version)
    }
}

/// How the installer process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallerExit {
    Success,
    /// No exit code was reported, typically because the launched process
    /// handed off to a child and returned. Treated as success without any
    /// further verification; this can hide a failed install.
    Unreported,
    Failed(i32),
}

impl InstallerExit {
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(0) => Self::Success,
            Some(code) => Self::Failed(code),
            None => Self::Unreported,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaleRemovalReport {
    pub removed: Vec<InstalledPackage>,
    pub kept: Vec<InstalledPackage>,
    pub failed: Vec<(InstalledPackage, String)>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyStatus {
    Copied { bytes: u64 },
    Failed { error: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    pub file_name: String,
    pub source: PathBuf,
    pub destination: PathBuf,
    pub status: CopyStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub outcomes: Vec<CopyOutcome>,
}

impl CopyReport {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    pub fn copied(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|outcome| matches!(outcome.status, CopyStatus::Copied { .. }))
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedFile {
    pub path: PathBuf,
    pub present: bool,
    pub size: Option<u64>,
    pub modified: Option<SystemTime>,
    pub sha256: Option<String>,
    /// `None` when either side could not be hashed.
    pub matches_source: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeReport {
    pub removals: StaleRemovalReport,
    pub extracted_files: usize,
    pub installer: PathBuf,
    pub installer_exit: InstallerExit,
    pub copies: CopyReport,
    pub verified: Vec<VerifiedFile>,
    pub scratch_removed: bool,
}
