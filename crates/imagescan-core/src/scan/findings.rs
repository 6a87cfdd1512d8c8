use crate::config::FindingsPolicy;
use crate::error::Result;
use crate::registry::{FindingsReport, ImageIdentifier, RegistryApi};
use tracing::debug;

const SCAN_NOT_FOUND: &str = "ScanNotFoundException";

/// Fetch the findings for one image.
///
/// With `poll_attempts == 0` this is a single call. Otherwise the findings
/// are fetched again after `poll_interval` while the scan is still running,
/// up to `poll_attempts` extra times. A scan the registry has not registered
/// yet counts as running until the attempts are used up.
pub async fn fetch_findings<R: RegistryApi + ?Sized>(
    registry: &R,
    registry_id: Option<&str>,
    repository: &str,
    image: &ImageIdentifier,
    policy: &FindingsPolicy,
) -> Result<FindingsReport> {
    let mut remaining = policy.poll_attempts;

    loop {
        match registry.get_findings(registry_id, repository, image).await {
            Ok(report) if report.is_complete() || remaining == 0 => return Ok(report),
            Ok(report) => {
                debug!(
                    repository,
                    image = %image.display_name(),
                    status = ?report.scan_status().map(|s| s.status),
                    remaining,
                    "scan still running"
                );
            }
            Err(e) if e.code() == Some(SCAN_NOT_FOUND) && remaining > 0 => {
                debug!(repository, image = %image.display_name(), remaining, "scan not registered yet");
            }
            Err(e) => return Err(e),
        }

        remaining -= 1;
        tokio::time::sleep(policy.poll_interval()).await;
    }
}
