use crate::error::Result;
use crate::registry::{ImageIdentifier, RegistryApi, ScanResult, TagStatus};
use crate::scan::spec::ScanSpec;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A scan request that was accepted by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanOutcome {
    pub image_id: ImageIdentifier,
    pub result: ScanResult,
}

/// Turns a [`ScanSpec`] into scan-start calls against the registry.
pub struct ScanRequestBuilder<'a, R: ?Sized> {
    registry: &'a R,
}

impl<'a, R: RegistryApi + ?Sized> ScanRequestBuilder<'a, R> {
    pub fn new(registry: &'a R) -> Self {
        Self { registry }
    }

    /// Image identifiers a spec expands to.
    ///
    /// Without tags this lists every tagged image of the repository, in
    /// listing order. With tags each tag becomes a tag-only identifier; tags
    /// are not checked for existence.
    pub async fn resolve(&self, spec: &ScanSpec) -> Result<Vec<ImageIdentifier>> {
        if spec.scans_all_tags() {
            debug!(repository = %spec.repository, "scanning all tags");
            return self
                .registry
                .list_images(
                    spec.registry_id.as_deref(),
                    &spec.repository,
                    Some(TagStatus::Tagged),
                )
                .await;
        }

        debug!(repository = %spec.repository, tags = ?spec.tags, "scanning selected tags");
        Ok(spec
            .tags
            .iter()
            .map(|tag| ImageIdentifier::from_tag(tag))
            .collect())
    }

    /// Start a scan of one image of the spec's repository.
    pub async fn submit(&self, spec: &ScanSpec, image: &ImageIdentifier) -> Result<ScanResult> {
        let result = self
            .registry
            .start_image_scan(spec.registry_id.as_deref(), &spec.repository, image)
            .await?;

        info!(
            spec = %spec.id,
            repository = %spec.repository,
            image = %image.display_name(),
            status = result
                .image_scan_status
                .as_ref()
                .map(|s| s.status.as_str())
                .unwrap_or("UNKNOWN"),
            "scan started"
        );
        Ok(result)
    }

    /// Resolve a spec and start a scan for every image it covers.
    ///
    /// Stops at the first failed scan and returns its error.
    pub async fn start(&self, spec: &ScanSpec) -> Result<Vec<ScanOutcome>> {
        let images = self.resolve(spec).await?;
        let mut outcomes = Vec::with_capacity(images.len());

        for image_id in images {
            let result = self.submit(spec, &image_id).await?;
            outcomes.push(ScanOutcome { image_id, result });
        }

        Ok(outcomes)
    }
}
