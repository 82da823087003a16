//! Packaging of capture output.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Seek, Write};
use std::path::{Component, Path, PathBuf};

use spherecam_core::{Result, SphereCamError};
use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Packages a directory into a single archive file.
pub trait Archiver {
    /// Archives the contents of `source` into `<destination_stem>.<ext>`.
    ///
    /// Returns the path of the written archive. `source` is left untouched,
    /// and an existing archive at the destination is only replaced once the
    /// new one is complete.
    fn archive(&self, source: &Path, destination_stem: &Path) -> Result<PathBuf>;
}

/// Writes deflate-compressed zip archives.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZipArchiver;

impl ZipArchiver {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    fn write_archive<W>(source: &Path, out: W) -> std::result::Result<(), String>
    where
        W: Write + Seek,
    {
        let mut zip = ZipWriter::new(out);
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for entry in collect_entries(source).map_err(|e| e.to_string())? {
            let name = entry_name(source, &entry);
            if entry.is_dir() {
                zip.add_directory(format!("{name}/"), options)
                    .map_err(|e| e.to_string())?;
            } else {
                zip.start_file(name, options).map_err(|e| e.to_string())?;
                let mut input = File::open(&entry).map_err(|e| e.to_string())?;
                io::copy(&mut input, &mut zip).map_err(|e| e.to_string())?;
            }
        }
        zip.finish().map_err(|e| e.to_string())?;
        Ok(())
    }
}

impl Archiver for ZipArchiver {
    fn archive(&self, source: &Path, destination_stem: &Path) -> Result<PathBuf> {
        let fail = |reason: String| SphereCamError::ArchiveFailed {
            dir: source.to_path_buf(),
            reason,
        };
        if !source.is_dir() {
            return Err(fail("not a directory".to_string()));
        }

        let destination = with_appended_extension(destination_stem, "zip");
        let parent = match destination.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        // The partial archive lives in a temp file that is dropped on failure.
        let mut partial = NamedTempFile::new_in(parent).map_err(|e| fail(e.to_string()))?;
        Self::write_archive(source, &mut partial).map_err(fail)?;
        partial
            .persist(&destination)
            .map_err(|e| fail(e.error.to_string()))?;
        log::info!(
            "archived {} -> {}",
            source.display(),
            destination.display()
        );
        Ok(destination)
    }
}

/// All files and directories below `root`, parents before children.
fn collect_entries(root: &Path) -> io::Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let mut children = fs::read_dir(&dir)?
            .map(|e| e.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()?;
        children.sort();
        for child in children {
            if child.is_dir() {
                stack.push(child.clone());
            }
            entries.push(child);
        }
    }
    Ok(entries)
}

/// Archive entry name of `path`, relative to `root` with `/` separators.
fn entry_name(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// `stem` with `.ext` appended, keeping any dots already in the file name.
fn with_appended_extension(stem: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}

/// Replaces characters that are unsafe in file names with `_`.
///
/// Only ASCII letters, digits and `_` are kept, so the result never contains
/// a path separator and can never be `.` or `..`.
#[must_use]
pub fn clean_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

/// Archives `dir` next to itself and deletes it once the archive exists.
///
/// On archive failure the directory is kept for manual recovery and the
/// failure is returned. Paths ending in `.` or `..` are refused.
pub fn package_and_remove(archiver: &dyn Archiver, dir: &Path) -> Result<PathBuf> {
    if !matches!(dir.components().next_back(), Some(Component::Normal(_))) {
        return Err(SphereCamError::ArchiveFailed {
            dir: dir.to_path_buf(),
            reason: "not a named directory".to_string(),
        });
    }
    let archive = archiver.archive(dir, dir).map_err(|err| match err {
        SphereCamError::ArchiveFailed { .. } => err,
        other => SphereCamError::ArchiveFailed {
            dir: dir.to_path_buf(),
            reason: other.to_string(),
        },
    })?;
    if !archive.is_file() {
        return Err(SphereCamError::ArchiveFailed {
            dir: dir.to_path_buf(),
            reason: format!(
                "archiver reported {} but it does not exist",
                archive.display()
            ),
        });
    }
    fs::remove_dir_all(dir)?;
    Ok(archive)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingArchiver;

    impl Archiver for FailingArchiver {
        fn archive(&self, source: &Path, _destination_stem: &Path) -> Result<PathBuf> {
            Err(SphereCamError::ArchiveFailed {
                dir: source.to_path_buf(),
                reason: "disk full".to_string(),
            })
        }
    }

    fn populated_dir(root: &Path) -> PathBuf {
        let dir = root.join("my_dataset");
        fs::create_dir_all(dir.join("train")).unwrap();
        fs::write(dir.join("transforms.json"), b"{}").unwrap();
        fs::write(dir.join("train").join("r_0.png"), b"png").unwrap();
        dir
    }

    #[test]
    fn test_clean_name() {
        assert_eq!(clean_name("my dataset/v2:*"), "my_dataset_v2__");
        assert_eq!(clean_name("scene-01_final.v3"), "scene_01_final_v3");
        assert_eq!(clean_name("café"), "caf_");
        assert_eq!(clean_name(".."), "__");
        assert_eq!(clean_name("."), "_");
        assert_eq!(clean_name("../../etc"), "______etc");
    }

    #[test]
    fn test_appended_extension_keeps_dots() {
        assert_eq!(
            with_appended_extension(Path::new("/out/data.v2"), "zip"),
            PathBuf::from("/out/data.v2.zip")
        );
    }

    #[test]
    fn test_zip_then_remove() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = populated_dir(tmp.path());

        let archive = package_and_remove(&ZipArchiver::new(), &dir).unwrap();
        assert_eq!(archive, tmp.path().join("my_dataset.zip"));
        assert!(archive.is_file());
        assert!(!dir.exists());

        let reader = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let mut names: Vec<_> = reader.file_names().map(str::to_string).collect();
        names.sort();
        assert_eq!(names, vec!["train/", "train/r_0.png", "transforms.json"]);
    }

    #[test]
    fn test_failure_keeps_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = populated_dir(tmp.path());

        let err = package_and_remove(&FailingArchiver, &dir).unwrap_err();
        assert!(matches!(err, SphereCamError::ArchiveFailed { .. }));
        assert!(dir.join("train").join("r_0.png").is_file());
    }

    #[test]
    fn test_rearchive_replaces_previous_zip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = populated_dir(tmp.path());
        let stale = tmp.path().join("my_dataset.zip");
        fs::write(&stale, b"stale").unwrap();

        let archive = ZipArchiver::new().archive(&dir, &dir).unwrap();
        assert_eq!(archive, stale);
        assert!(zip::ZipArchive::new(File::open(&archive).unwrap()).is_ok());
        // Only the archive and the source are left in the parent.
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn test_failed_write_keeps_previous_zip() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = populated_dir(tmp.path());
        std::os::unix::fs::symlink(tmp.path().join("gone"), dir.join("dangling.png")).unwrap();
        let previous = tmp.path().join("my_dataset.zip");
        fs::write(&previous, b"previous archive").unwrap();

        let err = ZipArchiver::new().archive(&dir, &dir).unwrap_err();
        assert!(matches!(err, SphereCamError::ArchiveFailed { .. }));
        assert_eq!(fs::read(&previous).unwrap(), b"previous archive");
        assert_eq!(fs::read_dir(tmp.path()).unwrap().count(), 2);
    }

    #[test]
    fn test_parent_directory_paths_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = populated_dir(tmp.path());
        let sibling = tmp.path().join("keep.txt");
        fs::write(&sibling, b"keep").unwrap();

        let err = package_and_remove(&ZipArchiver::new(), &dir.join("..")).unwrap_err();
        assert!(matches!(err, SphereCamError::ArchiveFailed { .. }));
        assert!(sibling.is_file());
        assert!(dir.join("transforms.json").is_file());
    }

    #[test]
    fn test_missing_directory_is_archive_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let err = package_and_remove(&ZipArchiver::new(), &tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, SphereCamError::ArchiveFailed { .. }));
        assert!(!tmp.path().join("nope.zip").exists());
    }
}
