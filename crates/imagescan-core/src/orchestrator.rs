use crate::config::{FindingsPolicy, RegistryConfig};
use crate::error::Result;
use crate::registry::{RegistryApi, Repository};
use crate::report::{ImageScanRecord, RunReport, SkippedError, Stage};
use crate::scan::{fetch_findings, ScanRequestBuilder, ScanSpec};
use chrono::Utc;
use tracing::{debug, info, warn};

/// Walks a registry and scans every image in it.
///
/// Listing failures are logged, recorded in the report and skipped. A failed
/// scan start aborts the run. Findings failures are recorded on the image.
pub struct Orchestrator<'a, R: ?Sized> {
    registry: &'a R,
    region: String,
    registry_id: Option<String>,
    findings: FindingsPolicy,
}

impl<'a, R: RegistryApi + ?Sized> Orchestrator<'a, R> {
    pub fn new(registry: &'a R, config: &RegistryConfig) -> Self {
        Self {
            registry,
            region: config.region.clone(),
            registry_id: config.registry_id.clone(),
            findings: config.findings.clone(),
        }
    }

    pub async fn run(&self) -> Result<RunReport> {
        info!(region = %self.region, "starting image scan run");
        let mut report = RunReport::new(&self.region);

        let repositories = match self
            .registry
            .list_repositories(self.registry_id.as_deref())
            .await
        {
            Ok(repositories) => repositories,
            Err(e) => {
                warn!(error = %e, "failed to list repositories");
                report.skipped.push(SkippedError {
                    stage: Stage::ListRepositories,
                    repository: None,
                    message: e.to_string(),
                });
                Vec::new()
            }
        };

        info!(count = repositories.len(), "found repositories");

        for repository in &repositories {
            report.repositories.push(repository.repository_name.clone());
            self.scan_repository(repository, &mut report).await?;
        }

        report.finished_at = Some(Utc::now());
        info!(
            scanned = report.scanned_count(),
            skipped = report.skipped.len(),
            "image scan run finished"
        );
        Ok(report)
    }

    async fn scan_repository(&self, repository: &Repository, report: &mut RunReport) -> Result<()> {
        let name = repository.repository_name.as_str();
        let registry_id = repository
            .registry_id
            .as_deref()
            .or(self.registry_id.as_deref());

        let images = match self.registry.list_images(registry_id, name, None).await {
            Ok(images) => images,
            Err(e) => {
                warn!(repository = name, error = %e, "failed to list images, skipping repository");
                report.skipped.push(SkippedError {
                    stage: Stage::ListImages,
                    repository: Some(name.to_string()),
                    message: e.to_string(),
                });
                return Ok(());
            }
        };

        info!(repository = name, count = images.len(), "scanning images");
        let builder = ScanRequestBuilder::new(self.registry);

        for image in images {
            let spec = ScanSpec::for_image(&self.region, registry_id, name, &image);
            let scan = builder.submit(&spec, &image).await?;

            let (findings, findings_error) =
                match fetch_findings(self.registry, registry_id, name, &image, &self.findings).await
                {
                    Ok(findings) => {
                        info!(
                            repository = name,
                            image = %image.display_name(),
                            severities = ?findings.severity_counts(),
                            "scan output"
                        );
                        debug!(findings = %findings.0, "raw scan findings");
                        (Some(findings), None)
                    }
                    Err(e) => {
                        warn!(
                            repository = name,
                            image = %image.display_name(),
                            error = %e,
                            "failed to fetch scan findings"
                        );
                        report.skipped.push(SkippedError {
                            stage: Stage::FetchFindings,
                            repository: Some(name.to_string()),
                            message: e.to_string(),
                        });
                        (None, Some(e.to_string()))
                    }
                };

            report.images.push(ImageScanRecord {
                spec_id: spec.id,
                repository: name.to_string(),
                image_id: image,
                scan,
                findings,
                findings_error,
            });
        }

        Ok(())
    }
}
