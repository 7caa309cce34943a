use std::path::{Path, PathBuf};

/// Files a database directory may contain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FileType {
    Log(u64),
    Table(u64),
    Lock,
    Manifest,
    ManifestTemp,
}

pub(crate) const LOCK_FILE: &str = "LOCK";
pub(crate) const MANIFEST_FILE: &str = "MANIFEST";
pub(crate) const MANIFEST_TEMP_FILE: &str = "MANIFEST.tmp";
/// Subdirectory where repair moves files it could not use.
pub(crate) const LOST_DIR: &str = "lost";

pub(crate) fn log_file_name(dir: &Path, number: u64) -> PathBuf {
    dir.join(format!("{number:06}.log"))
}

pub(crate) fn table_file_name(dir: &Path, number: u64) -> PathBuf {
    dir.join(format!("{number:06}.sst"))
}

pub(crate) fn lock_file_name(dir: &Path) -> PathBuf {
    dir.join(LOCK_FILE)
}

pub(crate) fn manifest_file_name(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_FILE)
}

pub(crate) fn manifest_temp_file_name(dir: &Path) -> PathBuf {
    dir.join(MANIFEST_TEMP_FILE)
}

/// Classify a directory entry. `None` for names the engine did not create.
pub(crate) fn parse_file_name(name: &str) -> Option<FileType> {
    match name {
        LOCK_FILE => return Some(FileType::Lock),
        MANIFEST_FILE => return Some(FileType::Manifest),
        MANIFEST_TEMP_FILE => return Some(FileType::ManifestTemp),
        _ => {}
    }
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let number = stem.parse().ok()?;
    match ext {
        "log" => Some(FileType::Log(number)),
        "sst" => Some(FileType::Table(number)),
        _ => None,
    }
}
