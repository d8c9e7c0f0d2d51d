//! SBOM generation with the trivy scanner.

use std::io::Write;
use std::path::Path;

use crate::artifact::SBOM_FORMAT;
use crate::error::Result;
use crate::options::PackageOptions;
use crate::utils::command::run_streamed;

/// Scan the local image archive and write the SBOM document to `output`.
pub fn generate_sbom(
    opts: &PackageOptions,
    archive: &Path,
    output: &Path,
    stdout_sink: &mut (dyn Write + Send),
    stderr_sink: &mut (dyn Write + Send),
) -> Result<()> {
    let args: Vec<String> = vec![
        "image".to_string(),
        "--format".to_string(),
        SBOM_FORMAT.to_string(),
        "--input".to_string(),
        archive.to_string_lossy().to_string(),
        "--output".to_string(),
        output.to_string_lossy().to_string(),
    ];

    run_streamed(
        &opts.tools.trivy,
        &args,
        &[],
        Some(&opts.checkout_dir),
        stdout_sink,
        stderr_sink,
    )
}
