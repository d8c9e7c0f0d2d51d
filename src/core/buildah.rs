//! buildah invocations: image build, local archive export, registry push.

use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::identity::ImageIdentity;
use crate::options::PackageOptions;
use crate::utils::command::run_streamed;
use crate::utils::io::read_trimmed_line;

/// Single-line digest file written while exporting the local archive,
/// relative to the checkout.
pub const IMAGE_DIGEST_FILE: &str = ".ods/image-digest";

/// Local OCI archive of the built image, relative to the checkout. Input for
/// the SBOM scanner.
pub const IMAGE_ARCHIVE_FILE: &str = ".ods/image.tar";

/// Build the image from the docker context directory, tagging it with the
/// full registry reference.
pub fn build(
    opts: &PackageOptions,
    image: &ImageIdentity,
    extra_args: &[String],
    stdout_sink: &mut (dyn Write + Send),
    stderr_sink: &mut (dyn Write + Send),
) -> Result<()> {
    let mut args: Vec<String> = vec![
        format!("--storage-driver={}", opts.storage_driver),
        "bud".to_string(),
        format!("--format={}", opts.format),
        format!("--tls-verify={}", opts.tls_verify),
        "--no-cache".to_string(),
        "-f".to_string(),
        opts.dockerfile.clone(),
        "-t".to_string(),
        image.tagged_ref(),
    ];
    args.extend(extra_args.iter().cloned());
    args.push(opts.docker_dir.clone());

    run_streamed(
        &opts.tools.buildah,
        &args,
        &[],
        Some(&opts.checkout_dir),
        stdout_sink,
        stderr_sink,
    )
}

/// Export the built image to a local OCI archive, recording its digest in
/// the digest file.
pub fn push_archive(
    opts: &PackageOptions,
    image: &ImageIdentity,
    stdout_sink: &mut (dyn Write + Send),
    stderr_sink: &mut (dyn Write + Send),
) -> Result<()> {
    let digest_file = opts.checkout_dir.join(IMAGE_DIGEST_FILE);
    let archive = opts.checkout_dir.join(IMAGE_ARCHIVE_FILE);
    let args: Vec<String> = vec![
        format!("--storage-driver={}", opts.storage_driver),
        "push".to_string(),
        format!("--digestfile={}", digest_file.display()),
        image.tagged_ref(),
        format!("oci-archive:{}", archive.display()),
    ];

    run_streamed(
        &opts.tools.buildah,
        &args,
        &[],
        Some(&opts.checkout_dir),
        stdout_sink,
        stderr_sink,
    )
}

/// Push the tagged image to the registry.
pub fn push(
    opts: &PackageOptions,
    image: &ImageIdentity,
    stdout_sink: &mut (dyn Write + Send),
    stderr_sink: &mut (dyn Write + Send),
) -> Result<()> {
    let args: Vec<String> = vec![
        format!("--storage-driver={}", opts.storage_driver),
        "push".to_string(),
        format!("--tls-verify={}", opts.tls_verify),
        image.tagged_ref(),
        format!("docker://{}", image.tagged_ref()),
    ];

    run_streamed(
        &opts.tools.buildah,
        &args,
        &[],
        Some(&opts.checkout_dir),
        stdout_sink,
        stderr_sink,
    )
}

/// Read and validate the digest recorded by `push_archive`.
pub fn read_image_digest(checkout_dir: &Path) -> Result<String> {
    let path: PathBuf = checkout_dir.join(IMAGE_DIGEST_FILE);
    let digest = read_trimmed_line(&path, "read image digest")?;

    let valid = Regex::new(r"^sha256:[0-9a-f]{64}$")
        .map_err(|e| Error::internal_unexpected(e.to_string()))?;
    if !valid.is_match(&digest) {
        return Err(Error::validation_invalid_argument(
            "image_digest",
            format!("Not a sha256 digest: '{}'", digest),
        ));
    }
    Ok(digest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use std::fs;
    use tempfile::TempDir;

    const DIGEST: &str = "sha256:4bc453b53cb3d914b45f4b250294236adba2c0e09ff6f03793949e7e39fd4cc1";

    fn write_digest_file(checkout: &Path, content: &str) {
        let path = checkout.join(IMAGE_DIGEST_FILE);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    #[test]
    fn reads_valid_digest() {
        let dir = TempDir::new().unwrap();
        write_digest_file(dir.path(), &format!("{}\n", DIGEST));
        assert_eq!(read_image_digest(dir.path()).unwrap(), DIGEST);
    }

    #[test]
    fn rejects_malformed_digest() {
        let dir = TempDir::new().unwrap();
        write_digest_file(dir.path(), "not-a-digest\n");
        let err = read_image_digest(dir.path()).unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
    }

    #[test]
    fn missing_digest_file_is_an_io_error() {
        let dir = TempDir::new().unwrap();
        let err = read_image_digest(dir.path()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InternalIoError);
    }
}
