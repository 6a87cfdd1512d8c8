pub mod config;
pub mod error;
pub mod orchestrator;
pub mod registry;
pub mod report;
pub mod scan;

pub use config::{Credentials, FindingsPolicy, RegistryConfig};
pub use error::{Result, ServiceError};
pub use orchestrator::Orchestrator;
pub use registry::{
    EcrClient, FindingsReport, ImageIdentifier, RegistryApi, Repository, ScanResult, TagStatus,
};
pub use report::{ImageScanRecord, RunReport};
pub use scan::{ScanOutcome, ScanRequestBuilder, ScanSpec};
