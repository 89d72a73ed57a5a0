use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveType {
    Zip,
    Exe,
    Msi,
}

impl ArchiveType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Exe => "exe",
            Self::Msi => "msi",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_lowercase().as_str() {
            "zip" => Some(Self::Zip),
            "exe" => Some(Self::Exe),
            "msi" => Some(Self::Msi),
            _ => None,
        }
    }

    pub fn infer_from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|value| value.to_str())
            .and_then(Self::parse)
    }

    /// Whether files of this type are launched as installers.
    pub fn is_installer(self) -> bool {
        matches!(self, Self::Exe | Self::Msi)
    }
}
