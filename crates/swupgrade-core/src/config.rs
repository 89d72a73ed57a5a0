use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

pub const VERSION_PLACEHOLDER: &str = "{version}";

const DEFAULT_VERSION: &str = "2025";
const DEFAULT_ARCHIVE_NAME: &str = "Viewer_2025.zip";
const DEFAULT_INSTALLER_NAME: &str = "Setup.exe";
const DEFAULT_NETWORK_BASE: &str = r"\\fileserver\software\Viewer";
const DEFAULT_PAYLOAD_FILES: [&str; 2] = ["Titleblock.dwg", "Template.dwg"];
const DEFAULT_SCRATCH_DIR: &str = r"C:\Temp\ViewerUpgrade";
const DEFAULT_LOG_FILE: &str = r"C:\Temp\ViewerUpgrade.log";
const DEFAULT_INSTALL_BASE: &str = r"C:\Program Files\Viewer";
const DEFAULT_DESTINATION_TEMPLATE: &str = r"Viewer {version}\Support";
const DEFAULT_SILENT_ARGS: [&str; 1] = ["/S"];
const DEFAULT_SETTLE_DELAY_SECS: u64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstallerMode {
    #[default]
    Unattended,
    Interactive,
}

impl InstallerMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unattended => "unattended",
            Self::Interactive => "interactive",
        }
    }
}

/// Parameters of one upgrade run. Built once, then only read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeConfig {
    pub version: String,
    pub archive_name: String,
    pub installer_name: String,
    pub network_base: PathBuf,
    pub payload_files: [String; 2],
    pub scratch_dir: PathBuf,
    pub log_file: PathBuf,
    pub install_base: PathBuf,
    pub destination_template: String,
    pub package_pattern: String,
    pub installer_mode: InstallerMode,
    pub silent_args: Vec<String>,
    pub settle_delay: Duration,
    pub cleanup_scratch: bool,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            version: DEFAULT_VERSION.to_string(),
            archive_name: DEFAULT_ARCHIVE_NAME.to_string(),
            installer_name: DEFAULT_INSTALLER_NAME.to_string(),
            network_base: PathBuf::from(DEFAULT_NETWORK_BASE),
            payload_files: DEFAULT_PAYLOAD_FILES.map(str::to_string),
            scratch_dir: PathBuf::from(DEFAULT_SCRATCH_DIR),
            log_file: PathBuf::from(DEFAULT_LOG_FILE),
            install_base: PathBuf::from(DEFAULT_INSTALL_BASE),
            destination_template: DEFAULT_DESTINATION_TEMPLATE.to_string(),
            package_pattern: String::new(),
            installer_mode: InstallerMode::Unattended,
            silent_args: DEFAULT_SILENT_ARGS.iter().map(|arg| arg.to_string()).collect(),
            settle_delay: Duration::from_secs(DEFAULT_SETTLE_DELAY_SECS),
            cleanup_scratch: true,
        }
    }
}

impl UpgradeConfig {
    pub fn archive_path(&self) -> PathBuf {
        self.network_base.join(&self.archive_name)
    }

    pub fn payload_source(&self, file_name: &str) -> PathBuf {
        self.network_base.join(file_name)
    }

    /// Install directory that receives the payload files. The template may use
    /// either separator; each segment becomes one path component.
    pub fn destination_dir(&self) -> PathBuf {
        let expanded = self
            .destination_template
            .replace(VERSION_PLACEHOLDER, &self.version);
        let mut dir = self.install_base.clone();
        for segment in expanded.split(['/', '\\']).filter(|s| !s.is_empty()) {
            dir.push(segment);
        }
        dir
    }

    /// Name fragment used to find installed copies of the product. Falls back
    /// to the archive stem with the version label removed.
    pub fn product_pattern(&self) -> String {
        let explicit = self.package_pattern.trim();
        if !explicit.is_empty() {
            return explicit.to_string();
        }

        let stem = Path::new(&self.archive_name)
            .file_stem()
            .and_then(|value| value.to_str())
            .unwrap_or(&self.archive_name);
        let derived = stem
            .replace(self.version.as_str(), "")
            .trim_matches(|ch: char| ch == '_' || ch == '-' || ch == '.' || ch.is_whitespace())
            .to_string();
        if derived.is_empty() {
            stem.to_string()
        } else {
            derived
        }
    }

    pub fn validate(&self) -> Result<()> {
        let required = [
            ("version", self.version.as_str()),
            ("archive_name", self.archive_name.as_str()),
            ("installer_name", self.installer_name.as_str()),
            ("destination_template", self.destination_template.as_str()),
        ];
        for (key, value) in required {
            if value.trim().is_empty() {
                return Err(anyhow!("config value '{key}' must not be empty"));
            }
        }

        let paths = [
            ("network_base", &self.network_base),
            ("scratch_dir", &self.scratch_dir),
            ("log_file", &self.log_file),
            ("install_base", &self.install_base),
        ];
        for (key, value) in paths {
            if value.as_os_str().is_empty() {
                return Err(anyhow!("config path '{key}' must not be empty"));
            }
        }

        for name in &self.payload_files {
            validate_plain_file_name("payload file", name)?;
        }
        validate_plain_file_name("archive", &self.archive_name)?;
        validate_plain_file_name("installer", &self.installer_name)?;
        if self.payload_files[0].eq_ignore_ascii_case(&self.payload_files[1]) {
            return Err(anyhow!(
                "payload files must be distinct, both are '{}'",
                self.payload_files[0]
            ));
        }

        if self
            .destination_template
            .split(['/', '\\'])
            .any(|segment| segment == "..")
        {
            return Err(anyhow!(
                "destination template must not leave the install base: {}",
                self.destination_template
            ));
        }

        Ok(())
    }
}

fn validate_plain_file_name(kind: &str, name: &str) -> Result<()> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(anyhow!("{kind} name must not be empty"));
    }
    if trimmed.contains(['/', '\\']) || trimmed == "." || trimmed == ".." {
        return Err(anyhow!("{kind} name must be a bare file name: {name}"));
    }
    Ok(())
}

/// Optional overrides read from a TOML file or the command line. Unset fields
/// keep the value of the layer underneath.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub version: Option<String>,
    pub archive_name: Option<String>,
    pub installer_name: Option<String>,
    pub network_base: Option<PathBuf>,
    pub payload_files: Option<[String; 2]>,
    pub scratch_dir: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
    pub install_base: Option<PathBuf>,
    pub destination_template: Option<String>,
    pub package_pattern: Option<String>,
    pub installer_mode: Option<InstallerMode>,
    pub silent_args: Option<Vec<String>>,
    pub settle_delay_secs: Option<u64>,
    pub cleanup_scratch: Option<bool>,
}

impl ConfigFile {
    pub fn from_toml_str(input: &str) -> Result<Self> {
        toml::from_str(input).context("failed to parse upgrade config")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&raw)
            .with_context(|| format!("invalid config file: {}", path.display()))
    }

    /// Fields set in `overrides` win over fields set in `self`.
    pub fn layered(self, overrides: ConfigFile) -> Self {
        Self {
            version: overrides.version.or(self.version),
            archive_name: overrides.archive_name.or(self.archive_name),
            installer_name: overrides.installer_name.or(self.installer_name),
            network_base: overrides.network_base.or(self.network_base),
            payload_files: overrides.payload_files.or(self.payload_files),
            scratch_dir: overrides.scratch_dir.or(self.scratch_dir),
            log_file: overrides.log_file.or(self.log_file),
            install_base: overrides.install_base.or(self.install_base),
            destination_template: overrides.destination_template.or(self.destination_template),
            package_pattern: overrides.package_pattern.or(self.package_pattern),
            installer_mode: overrides.installer_mode.or(self.installer_mode),
            silent_args: overrides.silent_args.or(self.silent_args),
            settle_delay_secs: overrides.settle_delay_secs.or(self.settle_delay_secs),
            cleanup_scratch: overrides.cleanup_scratch.or(self.cleanup_scratch),
        }
    }

    pub fn into_config(self) -> Result<UpgradeConfig> {
        let defaults = UpgradeConfig::default();
        let config = UpgradeConfig {
            version: self.version.unwrap_or(defaults.version),
            archive_name: self.archive_name.unwrap_or(defaults.archive_name),
            installer_name: self.installer_name.unwrap_or(defaults.installer_name),
            network_base: self.network_base.unwrap_or(defaults.network_base),
            payload_files: self.payload_files.unwrap_or(defaults.payload_files),
            scratch_dir: self.scratch_dir.unwrap_or(defaults.scratch_dir),
            log_file: self.log_file.unwrap_or(defaults.log_file),
            install_base: self.install_base.unwrap_or(defaults.install_base),
            destination_template: self
                .destination_template
                .unwrap_or(defaults.destination_template),
            package_pattern: self.package_pattern.unwrap_or(defaults.package_pattern),
            installer_mode: self.installer_mode.unwrap_or(defaults.installer_mode),
            silent_args: self.silent_args.unwrap_or(defaults.silent_args),
            settle_delay: self
                .settle_delay_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.settle_delay),
            cleanup_scratch: self.cleanup_scratch.unwrap_or(defaults.cleanup_scratch),
        };
        config.validate()?;
        Ok(config)
    }
}
