//! The package pipeline: build, scan, push, sign, record.
//!
//! Steps mirror the stage's contract with the surrounding CI system: earlier
//! pipeline stages leave a context cache in the checkout, this stage leaves
//! artifact records, an SBOM and result files behind.

use serde::Serialize;
use std::path::PathBuf;

use crate::artifact;
use crate::buildah;
use crate::context::BuildContext;
use crate::cosign::CosignClient;
use crate::error::{Error, Result};
use crate::identity::{ImageArtifact, ImageIdentity};
use crate::options::PackageOptions;
use crate::pipeline::{run_steps, RunOutcome, Step};
use crate::skopeo;
use crate::tags;
use crate::trivy;
use crate::utils::io::write_file;
use crate::utils::shell::split_words;

/// Result file names under the results directory.
pub const RESULT_IMAGE_REF_FILE: &str = "image-ref";
pub const RESULT_IMAGE_DIGEST_FILE: &str = "image-digest";

/// State threaded through the pipeline steps.
///
/// Derived fields are set exactly once by the step responsible for them and
/// only read afterwards: `build` by context setup, `extra_tags` by tag
/// parsing, `image` by identity derivation, `digest` by the build step.
#[derive(Debug)]
pub struct PackageContext {
    pub opts: PackageOptions,
    pub build: Option<BuildContext>,
    pub extra_tags: Vec<String>,
    pub image: Option<ImageIdentity>,
    pub digest: Option<String>,
}

impl PackageContext {
    pub fn new(opts: PackageOptions) -> Self {
        Self {
            opts,
            build: None,
            extra_tags: Vec::new(),
            image: None,
            digest: None,
        }
    }

    pub fn image(&self) -> Result<&ImageIdentity> {
        self.image
            .as_ref()
            .ok_or_else(|| Error::internal_unexpected("image identity not derived yet"))
    }

    pub fn digest(&self) -> Result<&str> {
        self.digest
            .as_deref()
            .ok_or_else(|| Error::internal_unexpected("image digest not recorded yet"))
    }

    pub fn image_digests_dir(&self) -> PathBuf {
        self.opts.checkout_dir.join(artifact::IMAGE_DIGESTS_PATH)
    }

    pub fn sboms_dir(&self) -> PathBuf {
        self.opts.checkout_dir.join(artifact::SBOMS_PATH)
    }

    pub fn sbom_file(&self) -> Result<PathBuf> {
        Ok(self
            .opts
            .checkout_dir
            .join(format!("{}.{}", self.image()?.name, artifact::SBOM_FORMAT)))
    }
}

/// Validate options, read the cached build context and apply
/// registry-specific overrides.
pub fn setup_context() -> Step<PackageContext> {
    Step::new("setup-context", |mut ctx: PackageContext| {
        ctx.opts.validate()?;
        let cache = BuildContext::read_cache(&ctx.opts.checkout_dir).map_err(|e| {
            e.wrap("read cache")
                .with_hint("Ensure the pipeline checkout stage ran for this workspace")
        })?;
        ctx.build = Some(cache);
        ctx.opts.apply_registry_overrides();
        Ok(ctx)
    })
}

/// Lex the extra-tags option string into individual tags.
pub fn parse_extra_tags() -> Step<PackageContext> {
    Step::new("parse-extra-tags", |mut ctx: PackageContext| {
        ctx.extra_tags = split_words(&ctx.opts.extra_tags, "extra_tags")?;
        Ok(ctx)
    })
}

/// Derive the image identity from options and cached context.
pub fn set_image_identity() -> Step<PackageContext> {
    Step::new("set-image-identity", |mut ctx: PackageContext| {
        let image = {
            let cache = ctx
                .build
                .as_ref()
                .ok_or_else(|| Error::internal_unexpected("build context not read yet"))?;
            ImageIdentity::derive(cache, &ctx.opts)
        };
        ctx.image = Some(image);
        Ok(ctx)
    })
}

/// Skip the remaining steps when the image artifact record is already in
/// place from a previous run.
pub fn skip_if_image_artifact_exists() -> Step<PackageContext> {
    Step::new("check-image-artifact", |ctx: PackageContext| {
        let marker = {
            let image = ctx.image()?;
            println!(
                "Checking if image artifact for {} exists already ...",
                image.display_name()
            );
            ctx.image_digests_dir().join(image.artifact_filename())
        };
        if artifact::marker_exists(&marker)? {
            return Err(Error::pipeline_skipped("image artifact exists already"));
        }
        Ok(ctx)
    })
}

/// Build the image, export the local archive and record the digest.
pub fn build_image() -> Step<PackageContext> {
    Step::new("build-image", |mut ctx: PackageContext| {
        let extra_args = split_words(&ctx.opts.build_extra_args, "buildah_build_extra_args")?;
        {
            let image = ctx.image()?;
            println!("Building image {} ...", image.display_name());
            buildah::build(&ctx.opts, image, &extra_args, &mut stdout(), &mut stderr())
                .map_err(|e| e.wrap("buildah bud"))?;
            println!(
                "Creating local image archive for {} ...",
                image.display_name()
            );
            buildah::push_archive(&ctx.opts, image, &mut stdout(), &mut stderr())
                .map_err(|e| e.wrap("buildah push archive"))?;
        }
        let digest = buildah::read_image_digest(&ctx.opts.checkout_dir)?;
        ctx.digest = Some(digest);
        Ok(ctx)
    })
}

/// Generate the image SBOM from the local archive.
pub fn generate_sbom() -> Step<PackageContext> {
    Step::new("generate-sbom", |ctx: PackageContext| {
        println!("Generating image SBOM with trivy scanner ...");
        let archive = ctx.opts.checkout_dir.join(buildah::IMAGE_ARCHIVE_FILE);
        let sbom = ctx.sbom_file()?;
        trivy::generate_sbom(&ctx.opts, &archive, &sbom, &mut stdout(), &mut stderr())
            .map_err(|e| e.wrap("generate SBOM"))?;
        Ok(ctx)
    })
}

/// Push the image to the registry.
pub fn push_image() -> Step<PackageContext> {
    Step::new("push-image", |ctx: PackageContext| {
        {
            let image = ctx.image()?;
            println!("Pushing image {} ...", image.display_name());
            buildah::push(&ctx.opts, image, &mut stdout(), &mut stderr())
                .map_err(|e| e.wrap("buildah push"))?;
        }
        Ok(ctx)
    })
}

/// Sign the pushed image and attest its SBOM. A no-op without a signing key;
/// no signing subprocess is invoked in that case.
pub fn sign_image() -> Step<PackageContext> {
    Step::new("sign-image", |ctx: PackageContext| {
        if !ctx.opts.cosign_key.is_empty() {
            let image_ref = ctx.image()?.digest_ref(ctx.digest()?);
            let client = CosignClient::new(&ctx.opts.tools.cosign, &ctx.opts.cosign_key);
            crate::log_status!(
                "package",
                "Signing image {} with {}",
                ctx.image()?.display_name(),
                ctx.opts.cosign_key
            );
            client.sign(&image_ref).map_err(|e| e.wrap("signing"))?;
            crate::log_status!("package", "Generating SBOM attestation ...");
            client
                .attest(&image_ref, artifact::SBOM_FORMAT, &ctx.sbom_file()?)
                .map_err(|e| e.wrap("attesting SBOM"))?;
        }
        Ok(ctx)
    })
}

/// Write the image artifact record and copy the SBOM into the artifact store.
pub fn store_artifacts() -> Step<PackageContext> {
    Step::new("store-artifacts", |ctx: PackageContext| {
        println!("Writing image artifact ...");
        let record = ctx.image()?.artifact(ctx.digest()?);
        let filename = ctx.image()?.artifact_filename();
        artifact::write_json_artifact(&record, &ctx.image_digests_dir(), &filename)?;

        println!("Writing SBOM artifact ...");
        artifact::copy_into(&ctx.sbom_file()?, &ctx.sboms_dir())
            .map_err(|e| e.wrap("copy SBOM report to artifacts"))?;
        Ok(ctx)
    })
}

/// Write the result files consumed by the orchestrating CI system.
pub fn store_results() -> Step<PackageContext> {
    Step::new("store-results", |ctx: PackageContext| {
        println!("Writing image-ref result ...");
        let record = ctx.image()?.artifact(ctx.digest()?);
        std::fs::create_dir_all(&ctx.opts.results_dir)
            .map_err(|e| Error::internal_io(e.to_string(), Some("create results dir".into())))?;
        write_file(
            &ctx.opts.results_dir.join(RESULT_IMAGE_REF_FILE),
            &record.reference(),
            "write image-ref result",
        )?;
        write_file(
            &ctx.opts.results_dir.join(RESULT_IMAGE_DIGEST_FILE),
            &record.digest,
            "write image-digest result",
        )?;
        Ok(ctx)
    })
}

/// Push the parsed extra tags, skipping tags whose artifact record already
/// exists.
pub fn process_extra_tags() -> Step<PackageContext> {
    Step::new("process-extra-tags", |ctx: PackageContext| {
        if !ctx.extra_tags.is_empty() {
            crate::log_status!("package", "Processing extra tags: {:?}", ctx.extra_tags);
            let image = ctx.image()?.clone();
            let digest = ctx.digest()?.to_string();
            let src_ref = image.tagged_ref();
            let opts = ctx.opts.clone();
            let artifacts_dir = ctx.image_digests_dir();
            let mut push = |retagged: &ImageIdentity| {
                skopeo::copy_tag(
                    &opts,
                    &src_ref,
                    &retagged.tagged_ref(),
                    &mut stdout(),
                    &mut stderr(),
                )
            };
            tags::process_tags(&ctx.extra_tags, &image, &digest, &artifacts_dir, &mut push)?;
        }
        Ok(ctx)
    })
}

fn stdout() -> std::io::Stdout {
    std::io::stdout()
}

fn stderr() -> std::io::Stderr {
    std::io::stderr()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageOutput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageArtifact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_tags: Vec<String>,
    pub signed: bool,
    pub skipped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

/// Run the whole package pipeline for the given options.
pub fn run(opts: PackageOptions) -> Result<(PackageOutput, i32)> {
    let signing = !opts.cosign_key.is_empty();
    let ctx = PackageContext::new(opts);

    let outcome = run_steps(
        ctx,
        vec![
            setup_context(),
            parse_extra_tags(),
            set_image_identity(),
            skip_if_image_artifact_exists(),
            build_image(),
            generate_sbom(),
            push_image(),
            sign_image(),
            store_artifacts(),
            store_results(),
            process_extra_tags(),
        ],
    )?;

    match outcome {
        RunOutcome::Completed(ctx) => {
            let record = ctx.image()?.artifact(ctx.digest()?);
            Ok((
                PackageOutput {
                    image_ref: Some(record.reference()),
                    image: Some(record),
                    extra_tags: ctx.extra_tags.clone(),
                    signed: signing,
                    skipped: false,
                    skip_reason: None,
                },
                0,
            ))
        }
        RunOutcome::Skipped { reason } => Ok((
            PackageOutput {
                image: None,
                image_ref: None,
                extra_tags: Vec::new(),
                signed: false,
                skipped: true,
                skip_reason: Some(reason),
            },
            0,
        )),
    }
}
