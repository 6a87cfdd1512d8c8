use crate::registry::ImageIdentifier;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One scan target: a repository and the tags to scan in it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSpec {
    pub id: String,
    #[serde(rename = "created")]
    pub creation_time: DateTime<Utc>,
    pub region: String,
    #[serde(rename = "registry")]
    pub registry_id: Option<String>,
    pub repository: String,
    /// Tags to scan. Empty means every tagged image in the repository.
    #[serde(default)]
    pub tags: Vec<String>,
}

impl ScanSpec {
    /// Spec for a targeted scan, e.g. from the command line.
    pub fn new(region: &str, registry_id: Option<&str>, repository: &str, tags: Vec<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            creation_time: Utc::now(),
            region: region.to_string(),
            registry_id: registry_id.map(str::to_string),
            repository: repository.to_string(),
            tags,
        }
    }

    /// Spec for an image found while walking the registry.
    ///
    /// The id is the image digest when the listing returned one.
    pub fn for_image(
        region: &str,
        registry_id: Option<&str>,
        repository: &str,
        image: &ImageIdentifier,
    ) -> Self {
        let mut spec = Self::new(
            region,
            registry_id,
            repository,
            image.image_tag.iter().cloned().collect(),
        );
        if let Some(digest) = &image.image_digest {
            spec.id = digest.clone();
        }
        spec
    }

    pub fn scans_all_tags(&self) -> bool {
        self.tags.is_empty()
    }
}
