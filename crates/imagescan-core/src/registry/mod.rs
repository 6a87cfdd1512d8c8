pub mod ecr;
pub mod sigv4;

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub use ecr::EcrClient;

/// A repository as returned by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Repository {
    #[serde(default)]
    pub registry_id: Option<String>,
    pub repository_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_arn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository_uri: Option<String>,
}

impl Repository {
    pub fn new(name: &str) -> Self {
        Self {
            registry_id: None,
            repository_name: name.to_string(),
            repository_arn: None,
            repository_uri: None,
        }
    }
}

/// Digest and/or tag addressing one image manifest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageIdentifier {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_tag: Option<String>,
}

impl ImageIdentifier {
    pub fn from_tag(tag: &str) -> Self {
        Self {
            image_digest: None,
            image_tag: Some(tag.to_string()),
        }
    }

    pub fn from_digest(digest: &str) -> Self {
        Self {
            image_digest: Some(digest.to_string()),
            image_tag: None,
        }
    }

    /// Human-readable reference, `tag@digest` when both are known.
    pub fn display_name(&self) -> String {
        match (&self.image_tag, &self.image_digest) {
            (Some(tag), Some(digest)) => format!("{}@{}", tag, digest),
            (Some(tag), None) => tag.clone(),
            (None, Some(digest)) => digest.clone(),
            (None, None) => "<unidentified>".to_string(),
        }
    }
}

/// Tag status filter for image listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TagStatus {
    Tagged,
    Untagged,
    Any,
}

/// Scan status reported by the registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStatus {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ScanStatus {
    /// Whether the scan has reached a final state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            "COMPLETE" | "FAILED" | "UNSUPPORTED_IMAGE" | "SCAN_ELIGIBILITY_EXPIRED"
        )
    }
}

/// Response to a start-scan request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanResult {
    #[serde(default)]
    pub registry_id: Option<String>,
    #[serde(default)]
    pub repository_name: Option<String>,
    #[serde(default)]
    pub image_id: Option<ImageIdentifier>,
    #[serde(default)]
    pub image_scan_status: Option<ScanStatus>,
}

/// Scan findings document, kept as returned by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FindingsReport(pub serde_json::Value);

impl FindingsReport {
    pub fn scan_status(&self) -> Option<ScanStatus> {
        self.0
            .get("imageScanStatus")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Finding counts keyed by severity (`CRITICAL`, `HIGH`, ...).
    pub fn severity_counts(&self) -> BTreeMap<String, u64> {
        self.0
            .pointer("/imageScanFindings/findingSeverityCounts")
            .and_then(|v| v.as_object())
            .map(|counts| {
                counts
                    .iter()
                    .filter_map(|(severity, n)| n.as_u64().map(|n| (severity.clone(), n)))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn finding_count(&self) -> usize {
        self.0
            .pointer("/imageScanFindings/findings")
            .and_then(|v| v.as_array())
            .map(Vec::len)
            .unwrap_or(0)
    }

    pub fn is_complete(&self) -> bool {
        self.scan_status().is_some_and(|s| s.is_terminal())
    }
}

/// Operations the scanner needs from the registry service.
///
/// Every call is a single request/response (one per page for listings).
/// `registry_id` of `None` addresses the caller's default registry.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    async fn list_repositories(&self, registry_id: Option<&str>) -> Result<Vec<Repository>>;

    async fn list_images(
        &self,
        registry_id: Option<&str>,
        repository: &str,
        tag_filter: Option<TagStatus>,
    ) -> Result<Vec<ImageIdentifier>>;

    async fn start_image_scan(
        &self,
        registry_id: Option<&str>,
        repository: &str,
        image_id: &ImageIdentifier,
    ) -> Result<ScanResult>;

    async fn get_findings(
        &self,
        registry_id: Option<&str>,
        repository: &str,
        image_id: &ImageIdentifier,
    ) -> Result<FindingsReport>;
}
