//! Artifact store: JSON records and SBOM documents under the checkout.
//!
//! Artifact files double as completion markers: their presence means the
//! corresponding unit of work already finished, so re-runs skip it.

use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::io::write_file;

/// Artifact area relative to the checkout.
pub const IMAGE_DIGESTS_PATH: &str = ".ods/artifacts/image-digests";
pub const SBOMS_PATH: &str = ".ods/artifacts/sboms";

/// SBOM document format, also the cosign attestation predicate type.
pub const SBOM_FORMAT: &str = "spdx";

/// Serialize `value` as pretty JSON into `dir/filename`, creating the
/// directory as needed. Returns the written path.
pub fn write_json_artifact<T: Serialize>(value: &T, dir: &Path, filename: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| Error::artifact_io(dir.to_string_lossy(), e.to_string()))?;
    let content = serde_json::to_string_pretty(value)
        .map_err(|e| Error::internal_json(e.to_string(), Some(filename.to_string())))?;
    let path = dir.join(filename);
    write_file(&path, &content, "write artifact")?;
    Ok(path)
}

/// Copy a file into the artifact directory, creating it as needed.
pub fn copy_into(src: &Path, dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(dir).map_err(|e| Error::artifact_io(dir.to_string_lossy(), e.to_string()))?;
    let filename = src
        .file_name()
        .ok_or_else(|| Error::artifact_io(src.to_string_lossy(), "not a file path"))?;
    let dest = dir.join(filename);
    fs::copy(src, &dest).map_err(|e| Error::artifact_io(src.to_string_lossy(), e.to_string()))?;
    Ok(dest)
}

/// Check whether a completion marker exists.
///
/// Absence is the normal "do the work" signal, so only a real I/O failure
/// (e.g. permission denied) is an error.
pub fn marker_exists(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(Error::artifact_io(path.to_string_lossy(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Record {
        name: String,
        tag: String,
    }

    #[test]
    fn write_json_artifact_creates_directories_and_valid_json() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested/image-digests");
        let record = Record {
            name: "app".to_string(),
            tag: "latest".to_string(),
        };

        let path = write_json_artifact(&record, &target, "app.json").unwrap();
        assert_eq!(path, target.join("app.json"));

        let content = fs::read_to_string(&path).unwrap();
        let parsed: Record = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed, record);
    }

    #[test]
    fn copy_into_places_file_under_target_dir() {
        let dir = TempDir::new().unwrap();
        let src = dir.path().join("app.spdx");
        fs::write(&src, "sbom").unwrap();

        let dest = copy_into(&src, &dir.path().join("sboms")).unwrap();
        assert_eq!(fs::read_to_string(dest).unwrap(), "sbom");
    }

    #[test]
    fn marker_exists_distinguishes_presence_from_absence() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("app.json");

        assert!(!marker_exists(&marker).unwrap());
        fs::write(&marker, "{}").unwrap();
        assert!(marker_exists(&marker).unwrap());
    }

    #[test]
    fn marker_in_missing_directory_is_plain_absence() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("no-such-dir/app.json");
        assert!(!marker_exists(&marker).unwrap());
    }
}
