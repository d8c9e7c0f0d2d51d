//! skopeo invocation for re-tagging an already-pushed image.

use std::io::Write;

use crate::error::Result;
use crate::options::PackageOptions;
use crate::utils::command::run_streamed;

/// Copy `src_ref` to `dest_ref` within the registry, effectively attaching
/// another tag to the pushed image.
pub fn copy_tag(
    opts: &PackageOptions,
    src_ref: &str,
    dest_ref: &str,
    stdout_sink: &mut (dyn Write + Send),
    stderr_sink: &mut (dyn Write + Send),
) -> Result<()> {
    let args: Vec<String> = vec![
        "copy".to_string(),
        format!("--src-tls-verify={}", opts.tls_verify),
        format!("--dest-tls-verify={}", opts.tls_verify),
        format!("docker://{}", src_ref),
        format!("docker://{}", dest_ref),
    ];

    run_streamed(
        &opts.tools.skopeo,
        &args,
        &[],
        Some(&opts.checkout_dir),
        stdout_sink,
        stderr_sink,
    )
}
