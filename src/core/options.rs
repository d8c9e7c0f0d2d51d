//! Resolved run-time options for a package run.

use std::path::PathBuf;

/// Registry host prefix for the local KinD registry. TLS verification of
/// that registry is not possible as requests error out with "server gave
/// HTTP response to HTTPS client", so verification is forced off for it.
pub const KIND_REGISTRY_PREFIX: &str = "kind-registry.kind";

pub const DEFAULT_REGISTRY: &str = "image-registry.openshift-image-registry.svc:5000";
pub const DEFAULT_STORAGE_DRIVER: &str = "vfs";
pub const DEFAULT_IMAGE_FORMAT: &str = "oci";
pub const DEFAULT_DOCKERFILE: &str = "./Dockerfile";
pub const DEFAULT_RESULTS_DIR: &str = "/tekton/results";

/// External tool executables. Overridable so tests can substitute stubs.
#[derive(Debug, Clone)]
pub struct ToolExes {
    pub buildah: String,
    pub skopeo: String,
    pub trivy: String,
    pub cosign: String,
}

impl Default for ToolExes {
    fn default() -> Self {
        Self {
            buildah: "buildah".to_string(),
            skopeo: "skopeo".to_string(),
            trivy: "trivy".to_string(),
            cosign: "cosign".to_string(),
        }
    }
}

/// Options for one package run, resolved from the CLI surface.
///
/// Immutable after context setup; the only mutation is the TLS override
/// applied by `apply_registry_overrides`.
#[derive(Debug, Clone)]
pub struct PackageOptions {
    /// Directory of the checked-out workspace.
    pub checkout_dir: PathBuf,
    /// Registry to push the image to.
    pub registry: String,
    /// Verify registry TLS certificates.
    pub tls_verify: bool,
    /// Image repository; falls back to the context namespace when empty.
    pub image_namespace: String,
    /// Image name; falls back to the context component when empty.
    pub image_stream: String,
    /// Dockerfile path, relative to the docker context directory.
    pub dockerfile: String,
    /// Docker context directory, relative to the checkout.
    pub docker_dir: String,
    /// Image format to build (`oci` or `docker`).
    pub format: String,
    /// Storage driver passed to buildah.
    pub storage_driver: String,
    /// Extra buildah build arguments, as one shell-lexed string.
    pub build_extra_args: String,
    /// Extra tags to push in addition to the commit tag, shell-lexed.
    pub extra_tags: String,
    /// Signing key reference; empty disables signing.
    pub cosign_key: String,
    /// Directory the CI system collects result files from.
    pub results_dir: PathBuf,
    pub tools: ToolExes,
}

impl PackageOptions {
    /// Apply registry-specific workarounds. Only the documented KinD registry
    /// prefix is recognized.
    pub fn apply_registry_overrides(&mut self) {
        if self.registry.starts_with(KIND_REGISTRY_PREFIX) {
            self.tls_verify = false;
        }
    }

    /// Validate option values that buildah would only reject mid-build.
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.format != "oci" && self.format != "docker" {
            return Err(crate::error::Error::config_invalid_value(
                "format",
                format!("Must be 'oci' or 'docker', got '{}'", self.format),
            ));
        }
        if self.registry.is_empty() {
            return Err(crate::error::Error::config_invalid_value(
                "registry",
                "Must not be empty",
            ));
        }
        Ok(())
    }
}
