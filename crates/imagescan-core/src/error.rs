use thiserror::Error;

/// Errors raised while talking to the registry service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("request to registry failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("registry returned {code} (HTTP {status}): {message}")]
    Api {
        status: u16,
        code: String,
        message: String,
    },

    #[error("malformed {operation} JSON: {source}")]
    Json {
        operation: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("credentials unavailable: {0}")]
    Credentials(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ServiceError {
    /// Service error code, if the registry answered with one.
    pub fn code(&self) -> Option<&str> {
        match self {
            ServiceError::Api { code, .. } => Some(code),
            _ => None,
        }
    }

    /// Build an API error from a non-success response body.
    ///
    /// The body looks like `{"__type": "ns#RepositoryNotFoundException", "message": "..."}`.
    /// Some operations capitalize `Message`.
    pub(crate) fn from_response(status: u16, body: &str) -> Self {
        let parsed: serde_json::Value = serde_json::from_str(body).unwrap_or_default();

        let code = parsed
            .get("__type")
            .and_then(|v| v.as_str())
            .map(|t| t.rsplit('#').next().unwrap_or(t).to_string())
            .unwrap_or_else(|| "UnknownError".to_string());

        let message = parsed
            .get("message")
            .or_else(|| parsed.get("Message"))
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| body.trim().to_string());

        ServiceError::Api {
            status,
            code,
            message,
        }
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_response_strips_namespace() {
        let body = r#"{"__type":"com.amazonaws.ecr#RepositoryNotFoundException","message":"The repository 'app' does not exist"}"#;
        let err = ServiceError::from_response(400, body);

        assert_eq!(err.code(), Some("RepositoryNotFoundException"));
        match err {
            ServiceError::Api { status, message, .. } => {
                assert_eq!(status, 400);
                assert_eq!(message, "The repository 'app' does not exist");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_from_response_capitalized_message() {
        let body = r#"{"__type":"UnrecognizedClientException","Message":"The security token included in the request is invalid."}"#;
        let err = ServiceError::from_response(400, body);

        assert_eq!(err.code(), Some("UnrecognizedClientException"));
        assert!(err.to_string().contains("security token"));
    }

    #[test]
    fn test_from_response_non_json_body() {
        let err = ServiceError::from_response(503, "Service Unavailable\n");

        assert_eq!(err.code(), Some("UnknownError"));
        assert_eq!(
            err.to_string(),
            "registry returned UnknownError (HTTP 503): Service Unavailable"
        );
    }
}
