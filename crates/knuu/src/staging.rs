//! Forwarding of file-injection requests to the image builder.

use thiserror::Error;
use tracing::debug;

use crate::error::{InstanceError, Result};
use crate::instance::Instance;

/// Failure reported by an [`ImageBuilder`].
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// Collaborator that assembles the build context of an instance image.
///
/// Shared between instances; its lifetime exceeds any one of them.
pub trait ImageBuilder: Send + Sync {
    /// Copy `src` from the build context to `dest` in the image, owned by
    /// `chown` (`user:group`).
    fn add_to_builder(&self, src: &str, dest: &str, chown: &str) -> Result<(), BuilderError>;
}

/// Check that all arguments are set and `chown` is `user:group`.
pub fn validate_file_args(src: &str, dest: &str, chown: &str) -> Result<()> {
    if src.is_empty() {
        return Err(InstanceError::InvalidFileArgs("src must be set".into()));
    }
    if dest.is_empty() {
        return Err(InstanceError::InvalidFileArgs("dest must be set".into()));
    }
    if chown.is_empty() {
        return Err(InstanceError::InvalidFileArgs("chown must be set".into()));
    }
    if chown.split(':').count() != 2 {
        return Err(InstanceError::InvalidFileArgs(
            "chown must be in format 'user:group'".into(),
        ));
    }
    Ok(())
}

/// Stage a file into the instance image.
///
/// The file is expected to already sit in the build directory under the
/// layout of `dest`, so `dest` is passed to the builder as both source and
/// destination.
pub fn stage_file(instance: &Instance, src: &str, dest: &str, chown: &str) -> Result<()> {
    validate_file_args(src, dest, chown)?;
    instance
        .builder()
        .add_to_builder(dest, dest, chown)
        .map_err(|source| InstanceError::FileStaging {
            name: instance.cluster_name().to_string(),
            dest: dest.to_string(),
            source,
        })?;
    debug!(cluster_name = %instance.cluster_name(), src, dest, chown, "Staged file");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceType;
    use mockall::mock;
    use mockall::predicate::eq;
    use std::sync::Arc;

    mock! {
        Builder {}

        impl ImageBuilder for Builder {
            fn add_to_builder(&self, src: &str, dest: &str, chown: &str) -> Result<(), BuilderError>;
        }
    }

    fn instance_with(builder: MockBuilder) -> Instance {
        Instance::new("app", InstanceType::Basic, Arc::new(builder)).unwrap()
    }

    #[test]
    fn rejects_missing_arguments() {
        let mut builder = MockBuilder::new();
        builder.expect_add_to_builder().never();
        let inst = instance_with(builder);

        for (src, dest, chown) in [("", "/dest", "u:g"), ("/src", "", "u:g"), ("/src", "/dest", "")] {
            let err = stage_file(&inst, src, dest, chown).unwrap_err();
            assert!(matches!(err, InstanceError::InvalidFileArgs(_)));
        }
    }

    #[test]
    fn rejects_malformed_owner() {
        for chown in ["u", "u:g:x", "ug"] {
            let err = validate_file_args("/src", "/dest", chown).unwrap_err();
            assert!(
                matches!(err, InstanceError::InvalidFileArgs(_)),
                "{chown} should be rejected"
            );
        }
    }

    #[test]
    fn forwards_destination_as_source() {
        let mut builder = MockBuilder::new();
        builder
            .expect_add_to_builder()
            .with(eq("/dest"), eq("/dest"), eq("u:g"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        let inst = instance_with(builder);

        stage_file(&inst, "/src", "/dest", "u:g").unwrap();
    }

    #[test]
    fn wraps_builder_failure() {
        let mut builder = MockBuilder::new();
        builder
            .expect_add_to_builder()
            .returning(|_, _, _| Err(BuilderError::Other("context closed".into())));
        let inst = instance_with(builder);

        let err = stage_file(&inst, "/src", "/etc/app.toml", "0:0").unwrap_err();
        match err {
            InstanceError::FileStaging { name, dest, .. } => {
                assert_eq!(name, inst.cluster_name());
                assert_ne!(name, "app");
                assert_eq!(dest, "/etc/app.toml");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
