//! Filesystem helpers for source input and atomic output
//!
//! Output artefacts (`*.beautified.js`, `*.offsetmap.json`,
//! `*.map.json`) are written through a temp file and renamed into
//! place, so a failed command never leaves a partial file on disk.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{BundleError, Result};

/// Read a source bundle into memory.
///
/// Invalid UTF-8 sequences are replaced rather than rejected; minified
/// bundles occasionally embed stray bytes in string literals and every
/// analysis degrades gracefully around them.
pub fn read_source(path: &Path) -> Result<String> {
    if !path.exists() {
        return Err(BundleError::InvalidInput {
            message: format!("file not found: {}", path.display()),
        });
    }
    let bytes = fs::read(path)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Cross-platform atomic rename; Windows needs the target removed first
pub fn atomic_rename(src: &Path, dst: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        if dst.exists() {
            fs::remove_file(dst)?;
        }
    }
    fs::rename(src, dst)
}

/// Write `contents` to `path` atomically via a sibling temp file
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let tmp = sibling_tmp_path(path);
    fs::write(&tmp, contents)?;
    atomic_rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        BundleError::FileIo(e)
    })
}

fn sibling_tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    name.push_str(".tmp");
    path.with_file_name(name)
}

/// Derive an output path by appending a suffix to the input file name:
/// `bundle.js` + `.map.json` -> `bundle.js.map.json`
pub fn derived_path(input: &Path, suffix: &str) -> PathBuf {
    let mut name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "bundle".to_string());
    name.push_str(suffix);
    input.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_atomic_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.json");
        write_atomic(&target, "[1,2,3]").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "[1,2,3]");
        // no temp file left behind
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("out.json");
        fs::write(&target, "old").unwrap();
        write_atomic(&target, "new").unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn test_read_source_missing_file() {
        let err = read_source(Path::new("/nonexistent/bundle.js")).unwrap_err();
        assert!(matches!(err, BundleError::InvalidInput { .. }));
    }

    #[test]
    fn test_derived_path() {
        assert_eq!(
            derived_path(Path::new("/tmp/bundle.js"), ".map.json"),
            PathBuf::from("/tmp/bundle.js.map.json")
        );
    }
}
