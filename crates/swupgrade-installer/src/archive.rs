use anyhow::{anyhow, Context, Result};
use std::fs::{self, File};
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use swupgrade_core::ArchiveType;
use zip::ZipArchive;

use crate::fs_utils::{remove_path_if_exists, walk_files};

/// Deletes `scratch_dir` with everything in it, then recreates it empty.
pub fn reset_scratch_dir(scratch_dir: &Path) -> Result<()> {
    remove_path_if_exists(scratch_dir).with_context(|| {
        format!(
            "failed to remove existing scratch path: {}",
            scratch_dir.display()
        )
    })?;
    fs::create_dir_all(scratch_dir).with_context(|| {
        format!(
            "failed to create scratch directory: {}",
            scratch_dir.display()
        )
    })
}

/// Unpacks the whole archive into `dst` and returns the number of files
/// written.
pub fn extract_archive(archive_path: &Path, dst: &Path) -> Result<usize> {
    match ArchiveType::infer_from_path(archive_path) {
        Some(ArchiveType::Zip) => extract_zip(archive_path, dst),
        Some(other) => Err(anyhow!(
            "unsupported archive type '{}' for {}; expected a zip archive",
            other.as_str(),
            archive_path.display()
        )),
        None => Err(anyhow!(
            "cannot infer archive type from file name: {}",
            archive_path.display()
        )),
    }
}

fn extract_zip(archive_path: &Path, dst: &Path) -> Result<usize> {
    let file = File::open(archive_path)
        .with_context(|| format!("failed to open zip archive: {}", archive_path.display()))?;
    let mut archive = ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("failed to read zip archive: {}", archive_path.display()))?;

    let mut extracted = 0_usize;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).with_context(|| {
            format!(
                "failed to read entry #{index} of zip archive: {}",
                archive_path.display()
            )
        })?;
        let Some(relative) = entry.enclosed_name() else {
            return Err(anyhow!(
                "zip entry escapes the extraction directory: '{}' in {}",
                entry.name(),
                archive_path.display()
            ));
        };
        let out_path = dst.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&out_path)
                .with_context(|| format!("failed to create {}", out_path.display()))?;
            continue;
        }

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let mut out_file = File::create(&out_path)
            .with_context(|| format!("failed to create {}", out_path.display()))?;
        io::copy(&mut entry, &mut out_file)
            .with_context(|| format!("failed to extract {}", out_path.display()))?;
        extracted += 1;
    }

    Ok(extracted)
}

/// First file under `root` whose name equals `installer_name`, ignoring ASCII
/// case.
pub fn find_installer(root: &Path, installer_name: &str) -> Result<Option<PathBuf>> {
    Ok(walk_files(root)?.into_iter().find(|path| {
        path.file_name()
            .and_then(|value| value.to_str())
            .is_some_and(|name| name.eq_ignore_ascii_case(installer_name))
    }))
}

/// Every installer-like file under `root`, relative to it.
pub fn list_installer_candidates(root: &Path) -> Result<Vec<PathBuf>> {
    let mut candidates = Vec::new();
    for path in walk_files(root)? {
        let is_installer = ArchiveType::infer_from_path(&path).is_some_and(ArchiveType::is_installer);
        if !is_installer {
            continue;
        }
        let relative = path
            .strip_prefix(root)
            .with_context(|| format!("failed to relativize {}", path.display()))?;
        candidates.push(relative.to_path_buf());
    }
    Ok(candidates)
}
