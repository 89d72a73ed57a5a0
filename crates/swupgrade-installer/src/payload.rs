use anyhow::{anyhow, Context, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::types::{CopyOutcome, CopyReport, CopyStatus, VerifiedFile};

/// Copies each `(file_name, source)` into `destination_dir`, overwriting what
/// is there. One failed copy never prevents the next attempt.
pub fn copy_payloads(destination_dir: &Path, sources: &[(String, PathBuf)]) -> CopyReport {
    let outcomes = sources
        .iter()
        .map(|(file_name, source)| {
            let destination = destination_dir.join(file_name);
            let status = match copy_payload(source, &destination) {
                Ok(bytes) => CopyStatus::Copied { bytes },
                Err(err) => CopyStatus::Failed {
                    error: format!("{err:#}"),
                },
            };
            CopyOutcome {
                file_name: file_name.clone(),
                source: source.clone(),
                destination,
                status,
            }
        })
        .collect();
    CopyReport { outcomes }
}

fn copy_payload(source: &Path, destination: &Path) -> Result<u64> {
    if !source.is_file() {
        return Err(anyhow!("source file not found: {}", source.display()));
    }
    fs::copy(source, destination).with_context(|| {
        format!(
            "failed to copy {} to {}",
            source.display(),
            destination.display()
        )
    })
}

/// Stats and hashes `destination`, comparing against `source` when it can be
/// read. Never fails; missing data is left as `None`.
pub fn verify_payload(destination: &Path, source: &Path) -> VerifiedFile {
    let metadata = match fs::metadata(destination) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => {
            return VerifiedFile {
                path: destination.to_path_buf(),
                present: false,
                size: None,
                modified: None,
                sha256: None,
                matches_source: None,
            };
        }
    };

    let sha256 = sha256_file_hex(destination).ok();
    let matches_source = match (&sha256, sha256_file_hex(source)) {
        (Some(copied), Ok(original)) => Some(*copied == original),
        _ => None,
    };

    VerifiedFile {
        path: destination.to_path_buf(),
        present: true,
        size: Some(metadata.len()),
        modified: metadata.modified().ok(),
        sha256,
        matches_source,
    }
}

pub fn sha256_file_hex(path: &Path) -> Result<String> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .with_context(|| format!("failed to hash {}", path.display()))?;
    Ok(hex::encode(hasher.finalize()))
}
