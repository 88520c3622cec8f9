//! Container image reference resolution.

use crate::config::KnuuConfig;
use crate::error::Result;
use crate::identity;
use crate::instance::Instance;

/// Image reference the instance will run.
///
/// Returns the instance's image when one is set, otherwise a fresh
/// short-lived reference of the form `<registry>/<uuid>:<ttl>`. The caller
/// caches the result on the instance so it is never regenerated.
pub fn resolve_image(instance: &Instance, config: &KnuuConfig) -> Result<String> {
    if let Some(image) = instance.image_name() {
        return Ok(image.to_string());
    }
    let id = identity::random_uuid()?;
    Ok(format!("{}/{}:{}", config.image_registry, id, config.image_ttl))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instance::InstanceType;
    use crate::staging::{BuilderError, ImageBuilder};
    use std::sync::Arc;

    struct NoopBuilder;

    impl ImageBuilder for NoopBuilder {
        fn add_to_builder(&self, _: &str, _: &str, _: &str) -> Result<(), BuilderError> {
            Ok(())
        }
    }

    #[test]
    fn generates_ttl_reference_when_unset() {
        let inst = Instance::new("app", InstanceType::Basic, Arc::new(NoopBuilder)).unwrap();
        let image = resolve_image(&inst, &KnuuConfig::default()).unwrap();

        let rest = image.strip_prefix("ttl.sh/").unwrap();
        let (id, ttl) = rest.split_once(':').unwrap();
        assert_eq!(ttl, "1h");
        assert!(uuid::Uuid::parse_str(id).is_ok());
    }

    #[test]
    fn keeps_explicit_image() {
        let mut inst = Instance::new("app", InstanceType::Basic, Arc::new(NoopBuilder)).unwrap();
        inst.set_image("alpine:3.19").unwrap();

        let first = resolve_image(&inst, &KnuuConfig::default()).unwrap();
        let second = resolve_image(&inst, &KnuuConfig::default()).unwrap();
        assert_eq!(first, "alpine:3.19");
        assert_eq!(first, second);
    }
}
