//! cosign client for image signing and SBOM attestation.

use std::path::Path;

use crate::error::{Error, Result};
use crate::options::KIND_REGISTRY_PREFIX;
use crate::utils::command::run_buffered;

pub struct CosignClient {
    exe: String,
    key: String,
}

impl CosignClient {
    pub fn new(exe: &str, key: &str) -> Self {
        Self {
            exe: exe.to_string(),
            key: key.to_string(),
        }
    }

    /// Sign an image reference with the configured key.
    pub fn sign(&self, image_ref: &str) -> Result<()> {
        let mut args = vec!["sign".to_string()];
        args.extend(self.common_args(image_ref));
        args.push(image_ref.to_string());
        self.run(&args)
    }

    /// Attest a predicate file of the given type against an image reference.
    pub fn attest(&self, image_ref: &str, predicate_type: &str, predicate: &Path) -> Result<()> {
        let mut args = vec!["attest".to_string()];
        args.extend(self.common_args(image_ref));
        args.push("--type".to_string());
        args.push(predicate_type.to_string());
        args.push("--predicate".to_string());
        args.push(predicate.to_string_lossy().to_string());
        args.push(image_ref.to_string());
        self.run(&args)
    }

    fn common_args(&self, image_ref: &str) -> Vec<String> {
        let mut args = vec![
            "--tlog-upload=false".to_string(),
            "--key".to_string(),
            self.key.clone(),
        ];
        if image_ref.starts_with(KIND_REGISTRY_PREFIX) {
            args.push("--allow-insecure-registry=true".to_string());
            args.push("--allow-http-registry=true".to_string());
        }
        args
    }

    fn run(&self, args: &[String]) -> Result<()> {
        let output = run_buffered(&self.exe, args)?;
        if output.success {
            Ok(())
        } else {
            Err(Error::sign_command_failed(
                format!("{} {}", self.exe, args.join(" ")),
                output.diagnostic_text(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn common_args_carry_key_and_disable_tlog() {
        let client = CosignClient::new("cosign", "k8s://ns/key");
        let args = client.common_args("registry.example.com/ns/app@sha256:cafe");
        assert_eq!(args, ["--tlog-upload=false", "--key", "k8s://ns/key"]);
    }

    #[test]
    fn insecure_registry_flags_only_for_the_kind_registry() {
        let client = CosignClient::new("cosign", "k8s://ns/key");
        let args = client.common_args("kind-registry.kind:5000/ns/app@sha256:cafe");
        assert!(args.contains(&"--allow-insecure-registry=true".to_string()));
        assert!(args.contains(&"--allow-http-registry=true".to_string()));

        let args = client.common_args("registry.example.com/ns/app@sha256:cafe");
        assert!(!args.iter().any(|a| a.contains("insecure")));
    }

    #[test]
    fn failing_invocation_surfaces_stderr() {
        let client = CosignClient::new("sh", "unused");
        let args = vec![
            "-c".to_string(),
            "echo key not found >&2; exit 1".to_string(),
        ];
        let err = client.run(&args).unwrap_err();
        assert_eq!(err.code, ErrorCode::SignCommandFailed);
        assert!(err.message.contains("key not found"));
    }
}
