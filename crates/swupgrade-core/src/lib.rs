mod archive;
mod config;

pub use archive::ArchiveType;
pub use config::{ConfigFile, InstallerMode, UpgradeConfig, VERSION_PLACEHOLDER};
