use thiserror::Error;

/// Main error type for the cost plugin
#[derive(Error, Debug)]
pub enum CostError {
    /// Reaching the cost service failed
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The cost service answered with something we could not decode
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Writing the report failed
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Kubernetes API errors
    #[error("Kubernetes error: {0}")]
    Kubernetes(#[from] KubernetesError),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The requested mode/dimension combination cannot be served by the backend
    #[error("Unsupported mode: {0}")]
    UnsupportedMode(String),
}

/// Errors raised while fetching raw bytes from the cost service
#[derive(Error, Debug)]
pub enum TransportError {
    /// Could not connect to the service (local tunnel or HTTP client)
    #[error("Connection failed: {0}")]
    Connection(String),

    /// API server proxy request failed before a response arrived
    #[error("Proxy request failed: {0}")]
    Proxy(String),

    /// Setting up or running the port-forward tunnel failed
    #[error("Port forward failed: {0}")]
    PortForward(String),

    /// Non-2xx HTTP status
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The caller's cancellation token fired
    #[error("Request cancelled")]
    Cancelled,
}

/// Errors raised while decoding a 2xx response body
#[derive(Error, Debug)]
pub enum DecodeError {
    /// Body is not the expected JSON shape
    #[error("Malformed response: {0}")]
    Json(#[from] serde_json::Error),

    /// Body decoded but the embedded code reports failure
    #[error("Backend returned code {code}: {message}")]
    BackendCode { code: i64, message: String },

    /// Accumulated queries must produce exactly one bucket
    #[error("Expected {expected} time bucket(s), got {found}")]
    BucketCount { expected: usize, found: usize },
}

/// Errors raised while parsing identifiers. Recoverable per row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The idle allocation carries no dimensional fields
    #[error("Can't parse allocation information for special idle case")]
    IdleAllocation,

    /// Wrong number of slash-separated fields
    #[error("'{key}' could not be split into {expected} fields (found {found})")]
    FieldCount {
        key: String,
        expected: usize,
        found: usize,
    },

    /// Grouping does not include a namespace field
    #[error("No namespace can be extracted from '{0}'")]
    MissingNamespace(String),
}

/// Errors raised while writing the report
#[derive(Error, Debug)]
pub enum RenderError {
    /// Output sink rejected the write
    #[error("Failed to write table output: {0}")]
    Io(#[from] std::io::Error),
}

/// Kubernetes-specific errors
#[derive(Error, Debug)]
pub enum KubernetesError {
    /// API server connection failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    ResourceNotFound(String),

    /// API error
    #[error("API error: {0}")]
    ApiError(String),
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid value: {0}")]
    InvalidValue(String),
}

/// Helper type alias for Results
pub type Result<T> = std::result::Result<T, CostError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_failures_surface_as_render_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "closed");
        let err: CostError = RenderError::from(io).into();

        assert!(matches!(err, CostError::Render(RenderError::Io(_))));
        assert_eq!(err.to_string(), "Render error: Failed to write table output: closed");
    }
}
