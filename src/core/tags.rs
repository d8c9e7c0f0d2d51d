//! Idempotent processing of extra image tags.
//!
//! Each tag's artifact record doubles as its completion marker: a tag whose
//! record already exists is never pushed again. Re-running after a partial
//! failure therefore only touches the tags that did not complete.

use std::path::Path;

use crate::artifact;
use crate::error::Result;
use crate::identity::ImageIdentity;

/// Process `tags` in input order. For each tag without a marker, invoke
/// `push` for the re-tagged image and then write the tag's artifact record.
///
/// A push failure aborts immediately, naming the failing tag; records written
/// for earlier tags in the same run remain valid. Returns the tags that were
/// actually pushed.
pub fn process_tags(
    tags: &[String],
    image: &ImageIdentity,
    digest: &str,
    artifacts_dir: &Path,
    push: &mut dyn FnMut(&ImageIdentity) -> Result<()>,
) -> Result<Vec<String>> {
    let mut pushed = Vec::new();
    for tag in tags {
        let marker = artifacts_dir.join(image.tag_artifact_filename(tag));
        if artifact::marker_exists(&marker)? {
            crate::log_status!("tags", "Artifact exists for tag: {}", tag);
            continue;
        }

        crate::log_status!("tags", "Pushing extra tag: {}", tag);
        let retagged = image.with_tag(tag);
        push(&retagged).map_err(|e| e.wrap(&format!("push tag '{}'", tag)))?;

        crate::log_status!("tags", "Writing image artifact for tag: {}", tag);
        let record = retagged.artifact(digest);
        artifact::write_json_artifact(&record, artifacts_dir, &image.tag_artifact_filename(tag))?;
        pushed.push(tag.clone());
    }
    Ok(pushed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::fs;
    use tempfile::TempDir;

    const DIGEST: &str = "sha256:4bc453b53cb3d914b45f4b250294236adba2c0e09ff6f03793949e7e39fd4cc1";

    fn image() -> ImageIdentity {
        ImageIdentity {
            registry: "registry.example.com:5000".to_string(),
            repository: "myproject-cd".to_string(),
            name: "app".to_string(),
            tag: "deadbeef".to_string(),
        }
    }

    fn tags(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn pushes_only_tags_without_markers_in_order() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("app-stable.json"), "{}").unwrap();

        let mut seen = Vec::new();
        let pushed = process_tags(
            &tags(&["latest", "stable", "edge"]),
            &image(),
            DIGEST,
            dir.path(),
            &mut |retagged| {
                seen.push(retagged.tag.clone());
                Ok(())
            },
        )
        .unwrap();

        assert_eq!(seen, ["latest", "edge"]);
        assert_eq!(pushed, ["latest", "edge"]);
        for tag in ["latest", "stable", "edge"] {
            assert!(dir.path().join(format!("app-{}.json", tag)).exists());
        }
    }

    #[test]
    fn second_run_performs_no_pushes() {
        let dir = TempDir::new().unwrap();
        let all = tags(&["latest", "stable"]);

        process_tags(&all, &image(), DIGEST, dir.path(), &mut |_| Ok(())).unwrap();

        let mut count = 0;
        let pushed = process_tags(&all, &image(), DIGEST, dir.path(), &mut |_| {
            count += 1;
            Ok(())
        })
        .unwrap();

        assert_eq!(count, 0);
        assert!(pushed.is_empty());
    }

    #[test]
    fn push_failure_aborts_and_keeps_earlier_markers() {
        let dir = TempDir::new().unwrap();

        let err = process_tags(
            &tags(&["latest", "edge", "extra"]),
            &image(),
            DIGEST,
            dir.path(),
            &mut |retagged| {
                if retagged.tag == "edge" {
                    Err(Error::process_exited_nonzero("skopeo", Some(1)))
                } else {
                    Ok(())
                }
            },
        )
        .unwrap_err();

        assert!(err.message.contains("push tag 'edge'"));
        assert!(dir.path().join("app-latest.json").exists());
        assert!(!dir.path().join("app-edge.json").exists());
        assert!(!dir.path().join("app-extra.json").exists());
    }

    #[test]
    fn records_carry_the_retagged_coordinates() {
        let dir = TempDir::new().unwrap();

        process_tags(&tags(&["latest"]), &image(), DIGEST, dir.path(), &mut |_| {
            Ok(())
        })
        .unwrap();

        let content = fs::read_to_string(dir.path().join("app-latest.json")).unwrap();
        let record: crate::identity::ImageArtifact = serde_json::from_str(&content).unwrap();
        assert_eq!(record.tag, "latest");
        assert_eq!(record.digest, DIGEST);
        assert_eq!(record.name, "app");
    }
}
