use clap::Parser;
use std::path::PathBuf;

mod output;

use imagepack::options::{self, PackageOptions, ToolExes};
use imagepack::package;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "imagepack")]
#[command(version = VERSION)]
#[command(about = "Build, scan, sign and push a container image as one CI pipeline stage")]
struct Cli {
    /// Directory of the checked-out workspace
    #[arg(long, default_value = ".")]
    checkout_dir: PathBuf,

    /// Registry to push the image to
    #[arg(long, default_value = options::DEFAULT_REGISTRY)]
    registry: String,

    /// Verify registry TLS certificates
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    tls_verify: bool,

    /// Image repository (defaults to the cached context namespace)
    #[arg(long, default_value = "")]
    image_namespace: String,

    /// Image name (defaults to the cached context component)
    #[arg(long, default_value = "")]
    image_stream: String,

    /// Dockerfile path, relative to the docker context directory
    #[arg(long, default_value = options::DEFAULT_DOCKERFILE)]
    dockerfile: String,

    /// Docker context directory, relative to the checkout
    #[arg(long, default_value = ".")]
    docker_dir: String,

    /// Image format to build (oci or docker)
    #[arg(long, default_value = options::DEFAULT_IMAGE_FORMAT)]
    format: String,

    /// Storage driver passed to buildah
    #[arg(long, default_value = options::DEFAULT_STORAGE_DRIVER)]
    storage_driver: String,

    /// Extra buildah build arguments (one shell-lexed string)
    #[arg(long, default_value = "")]
    buildah_build_extra_args: String,

    /// Extra tags to push in addition to the commit tag (one shell-lexed string)
    #[arg(long, default_value = "")]
    extra_tags: String,

    /// Signing key reference; empty disables signing
    #[arg(long, default_value = "")]
    cosign_key: String,

    /// Directory the CI system collects result files from
    #[arg(long, default_value = options::DEFAULT_RESULTS_DIR)]
    results_dir: PathBuf,

    /// buildah executable
    #[arg(long, default_value = "buildah", hide = true)]
    buildah_bin: String,

    /// skopeo executable
    #[arg(long, default_value = "skopeo", hide = true)]
    skopeo_bin: String,

    /// trivy executable
    #[arg(long, default_value = "trivy", hide = true)]
    trivy_bin: String,

    /// cosign executable
    #[arg(long, default_value = "cosign", hide = true)]
    cosign_bin: String,
}

impl Cli {
    fn into_options(self) -> PackageOptions {
        PackageOptions {
            checkout_dir: self.checkout_dir,
            registry: self.registry,
            tls_verify: self.tls_verify,
            image_namespace: self.image_namespace,
            image_stream: self.image_stream,
            dockerfile: self.dockerfile,
            docker_dir: self.docker_dir,
            format: self.format,
            storage_driver: self.storage_driver,
            build_extra_args: self.buildah_build_extra_args,
            extra_tags: self.extra_tags,
            cosign_key: self.cosign_key,
            results_dir: self.results_dir,
            tools: ToolExes {
                buildah: self.buildah_bin,
                skopeo: self.skopeo_bin,
                trivy: self.trivy_bin,
                cosign: self.cosign_bin,
            },
        }
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    let result = package::run(cli.into_options());

    let (json_result, exit_code) = output::map_cmd_result_to_json(result);
    let _ = output::print_json_result(json_result);
    std::process::ExitCode::from(exit_code_to_u8(exit_code))
}

fn exit_code_to_u8(code: i32) -> u8 {
    if code <= 0 {
        0
    } else if code >= 255 {
        255
    } else {
        code as u8
    }
}
