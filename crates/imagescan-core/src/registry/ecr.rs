use crate::config::RegistryConfig;
use crate::error::{Result, ServiceError};
use crate::registry::sigv4::{self, SigningParams};
use crate::registry::{
    FindingsReport, ImageIdentifier, RegistryApi, Repository, ScanResult, TagStatus,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const SERVICE: &str = "ecr";
const TARGET_PREFIX: &str = "AmazonEC2ContainerRegistry_V20150921";
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const PAGE_SIZE: u32 = 100;

/// Amazon ECR client speaking the JSON 1.1 protocol.
pub struct EcrClient {
    client: reqwest::Client,
    config: RegistryConfig,
    url: String,
    host: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DescribeRepositoriesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    registry_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<String>,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeRepositoriesResponse {
    #[serde(default)]
    repositories: Vec<Repository>,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Serialize)]
struct ListImagesFilter {
    #[serde(rename = "tagStatus")]
    tag_status: TagStatus,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListImagesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    registry_id: Option<&'a str>,
    repository_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<ListImagesFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    next_token: Option<String>,
    max_results: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListImagesResponse {
    #[serde(default)]
    image_ids: Vec<ImageIdentifier>,
    #[serde(default)]
    next_token: Option<String>,
}

/// Body shared by StartImageScan and DescribeImageScanFindings.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    registry_id: Option<&'a str>,
    repository_name: &'a str,
    image_id: &'a ImageIdentifier,
}

impl EcrClient {
    /// Create a client for the configured region and credentials.
    pub fn new(config: RegistryConfig) -> Result<Self> {
        config.validate()?;
        config.require_credentials()?;

        let url = config.endpoint_url();
        let parsed = reqwest::Url::parse(&url)
            .map_err(|e| ServiceError::Config(format!("invalid endpoint '{}': {}", url, e)))?;
        let host = match (parsed.host_str(), parsed.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ServiceError::Config(format!(
                    "endpoint '{}' has no host",
                    url
                )))
            }
        };

        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("imagescan/", env!("CARGO_PKG_VERSION"))),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            config,
            url: format!("{}/", url),
            host,
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    fn registry<'a>(&'a self, registry_id: Option<&'a str>) -> Option<&'a str> {
        registry_id.or(self.config.registry_id.as_deref())
    }

    /// Send one signed request and decode the response body.
    async fn call<B, T>(&self, operation: &'static str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload =
            serde_json::to_vec(body).map_err(|source| ServiceError::Json { operation, source })?;
        let target = format!("{}.{}", TARGET_PREFIX, operation);

        let credentials = self.config.require_credentials()?;
        let signed = sigv4::sign(
            &SigningParams {
                credentials,
                region: &self.config.region,
                service: SERVICE,
                time: Utc::now(),
            },
            "POST",
            "/",
            &[
                ("content-type", JSON_CONTENT_TYPE),
                ("host", self.host.as_str()),
                ("x-amz-target", target.as_str()),
            ],
            &payload,
        );

        debug!(operation, bytes = payload.len(), "sending registry request");

        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .header("x-amz-target", &target)
            .header("x-amz-date", &signed.amz_date)
            .header(AUTHORIZATION, &signed.authorization);
        if let Some(token) = &signed.security_token {
            request = request.header("x-amz-security-token", token);
        }

        let response = request.body(payload).send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(ServiceError::from_response(status.as_u16(), &text));
        }

        serde_json::from_str(&text).map_err(|source| ServiceError::Json { operation, source })
    }
}

fn continuation(token: Option<String>) -> Option<String> {
    token.filter(|t| !t.is_empty())
}

#[async_trait]
impl RegistryApi for EcrClient {
    async fn list_repositories(&self, registry_id: Option<&str>) -> Result<Vec<Repository>> {
        let registry_id = self.registry(registry_id);
        let mut repositories = Vec::new();
        let mut next_token = None;

        loop {
            let page: DescribeRepositoriesResponse = self
                .call(
                    "DescribeRepositories",
                    &DescribeRepositoriesRequest {
                        registry_id,
                        next_token: next_token.take(),
                        max_results: PAGE_SIZE,
                    },
                )
                .await?;

            repositories.extend(page.repositories);
            match continuation(page.next_token) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(repositories)
    }

    async fn list_images(
        &self,
        registry_id: Option<&str>,
        repository: &str,
        tag_filter: Option<TagStatus>,
    ) -> Result<Vec<ImageIdentifier>> {
        let registry_id = self.registry(registry_id);
        let mut images = Vec::new();
        let mut next_token = None;

        loop {
            let page: ListImagesResponse = self
                .call(
                    "ListImages",
                    &ListImagesRequest {
                        registry_id,
                        repository_name: repository,
                        filter: tag_filter.map(|tag_status| ListImagesFilter { tag_status }),
                        next_token: next_token.take(),
                        max_results: PAGE_SIZE,
                    },
                )
                .await?;

            images.extend(page.image_ids);
            match continuation(page.next_token) {
                Some(token) => next_token = Some(token),
                None => break,
            }
        }

        Ok(images)
    }

    async fn start_image_scan(
        &self,
        registry_id: Option<&str>,
        repository: &str,
        image_id: &ImageIdentifier,
    ) -> Result<ScanResult> {
        self.call(
            "StartImageScan",
            &ImageRequest {
                registry_id: self.registry(registry_id),
                repository_name: repository,
                image_id,
            },
        )
        .await
    }

    async fn get_findings(
        &self,
        registry_id: Option<&str>,
        repository: &str,
        image_id: &ImageIdentifier,
    ) -> Result<FindingsReport> {
        self.call(
            "DescribeImageScanFindings",
            &ImageRequest {
                registry_id: self.registry(registry_id),
                repository_name: repository,
                image_id,
            },
        )
        .await
    }
}
