use crate::registry::{FindingsReport, ImageIdentifier, ScanResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stage of a run at which a logged-and-skipped failure happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    ListRepositories,
    ListImages,
    FetchFindings,
}

impl Stage {
    pub fn label(&self) -> &str {
        match self {
            Stage::ListRepositories => "list repositories",
            Stage::ListImages => "list images",
            Stage::FetchFindings => "fetch findings",
        }
    }
}

/// A failure that was logged and did not stop the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedError {
    pub stage: Stage,
    pub repository: Option<String>,
    pub message: String,
}

/// Everything the run learned about one scanned image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageScanRecord {
    pub spec_id: String,
    pub repository: String,
    pub image_id: ImageIdentifier,
    pub scan: ScanResult,
    pub findings: Option<FindingsReport>,
    pub findings_error: Option<String>,
}

impl ImageScanRecord {
    pub fn severity_counts(&self) -> BTreeMap<String, u64> {
        self.findings
            .as_ref()
            .map(FindingsReport::severity_counts)
            .unwrap_or_default()
    }
}

/// Result of scanning a whole registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub region: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub repositories: Vec<String>,
    pub images: Vec<ImageScanRecord>,
    pub skipped: Vec<SkippedError>,
}

impl RunReport {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            repositories: Vec::new(),
            images: Vec::new(),
            skipped: Vec::new(),
        }
    }

    pub fn scanned_count(&self) -> usize {
        self.images.len()
    }

    pub fn findings_available(&self) -> usize {
        self.images.iter().filter(|i| i.findings.is_some()).count()
    }

    /// Severity counts summed over every image with findings.
    pub fn total_severity_counts(&self) -> BTreeMap<String, u64> {
        let mut totals = BTreeMap::new();
        for image in &self.images {
            for (severity, count) in image.severity_counts() {
                *totals.entry(severity).or_insert(0) += count;
            }
        }
        totals
    }

    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(findings: Option<serde_json::Value>) -> ImageScanRecord {
        ImageScanRecord {
            spec_id: "sha256:abc".to_string(),
            repository: "app".to_string(),
            image_id: ImageIdentifier::from_tag("latest"),
            scan: ScanResult {
                registry_id: None,
                repository_name: Some("app".to_string()),
                image_id: None,
                image_scan_status: None,
            },
            findings: findings.map(FindingsReport),
            findings_error: None,
        }
    }

    #[test]
    fn test_total_severity_counts() {
        let mut report = RunReport::new("us-east-2");
        report.images.push(record(Some(json!({
            "imageScanFindings": {"findingSeverityCounts": {"HIGH": 1, "LOW": 3}}
        }))));
        report.images.push(record(Some(json!({
            "imageScanFindings": {"findingSeverityCounts": {"HIGH": 2}}
        }))));
        report.images.push(record(None));

        let totals = report.total_severity_counts();
        assert_eq!(totals.get("HIGH"), Some(&3));
        assert_eq!(totals.get("LOW"), Some(&3));
        assert_eq!(report.scanned_count(), 3);
        assert_eq!(report.findings_available(), 2);
    }

    #[test]
    fn test_stage_serialization() {
        assert_eq!(
            serde_json::to_value(Stage::ListImages).unwrap(),
            json!("list_images")
        );
        assert_eq!(Stage::FetchFindings.label(), "fetch findings");
    }
}
