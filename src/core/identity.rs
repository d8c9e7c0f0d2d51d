//! Image identity derivation and artifact records.

use serde::{Deserialize, Serialize};

use crate::context::BuildContext;
use crate::options::PackageOptions;

/// Where a built image lives: `registry/repository/name:tag`.
///
/// Derived exactly once per run: repository and name fall back to the cached
/// namespace and component, the tag is the git commit SHA.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageIdentity {
    pub registry: String,
    pub repository: String,
    pub name: String,
    pub tag: String,
}

impl ImageIdentity {
    pub fn derive(ctx: &BuildContext, opts: &PackageOptions) -> Self {
        let repository = if opts.image_namespace.is_empty() {
            ctx.namespace.clone()
        } else {
            opts.image_namespace.clone()
        };
        let name = if opts.image_stream.is_empty() {
            ctx.component.clone()
        } else {
            opts.image_stream.clone()
        };
        Self {
            registry: opts.registry.clone(),
            repository,
            name,
            tag: ctx.git_commit_sha.clone(),
        }
    }

    /// The same image under a different tag.
    pub fn with_tag(&self, tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            ..self.clone()
        }
    }

    /// `registry/repository/name:tag`
    pub fn tagged_ref(&self) -> String {
        format!(
            "{}/{}/{}:{}",
            self.registry, self.repository, self.name, self.tag
        )
    }

    /// `registry/repository/name@digest`
    pub fn digest_ref(&self, digest: &str) -> String {
        format!(
            "{}/{}/{}@{}",
            self.registry, self.repository, self.name, digest
        )
    }

    /// Short `name:tag` form for progress messages.
    pub fn display_name(&self) -> String {
        format!("{}:{}", self.name, self.tag)
    }

    pub fn artifact(&self, digest: &str) -> ImageArtifact {
        ImageArtifact {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            name: self.name.clone(),
            tag: self.tag.clone(),
            digest: digest.to_string(),
        }
    }

    /// Artifact record filename for the built image.
    pub fn artifact_filename(&self) -> String {
        format!("{}.json", self.name)
    }

    /// Artifact record filename for an extra tag.
    pub fn tag_artifact_filename(&self, tag: &str) -> String {
        format!("{}-{}.json", self.name, tag)
    }
}

/// Durable record of a pushed image, one JSON file per image or extra tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageArtifact {
    pub registry: String,
    pub repository: String,
    pub name: String,
    pub tag: String,
    pub digest: String,
}

impl ImageArtifact {
    /// Fully qualified `registry/repository/name@digest` reference.
    pub fn reference(&self) -> String {
        format!(
            "{}/{}/{}@{}",
            self.registry, self.repository, self.name, self.digest
        )
    }
}
