pub mod builder;
pub mod findings;
pub mod spec;

pub use builder::{ScanOutcome, ScanRequestBuilder};
pub use findings::fetch_findings;
pub use spec::ScanSpec;
