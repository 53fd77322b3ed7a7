use thiserror::Error;

/// Application-wide error types.
///
/// Every fallible operation in HerdingCats returns this enum. Catalogue-level
/// failures (sessions, explorers, loaders) get their own variants so callers
/// can tell a bad catalogue apart from a transport problem.
///
/// # Error Conversion
///
/// Library errors convert automatically where a `#[from]` exists:
/// - `serde_json::Error` → `AppError::SerializationError`
/// - `arrow::error::ArrowError` → `AppError::DataFrameError`
/// - `polars::prelude::PolarsError` → `AppError::DataFrameError`
/// - `datafusion::error::DataFusionError` → `AppError::SqlError`
/// - `object_store::Error` → `AppError::StorageError`
///
/// # Examples
///
/// ```no_run
/// use herding_cats_core::error::AppError;
///
/// fn example() -> Result<(), AppError> {
///     Err(AppError::CatExplorer("package_show failed".to_string()))
/// }
/// ```
#[derive(Error, Debug)]
pub enum AppError {
    /// The catalogue URL could not be resolved or did not answer.
    #[error("Session error: {0}")]
    CatSession(String),

    /// An explorer request or response reshaping failed.
    #[error("Explorer error: {0}")]
    CatExplorer(String),

    /// OpenDataSoft explorer or loader failure, with the underlying cause when known.
    #[error("OpenDataSoft error: {message}{}", original.as_ref().map(|o| format!(" ({o})")).unwrap_or_default())]
    OpenDataSoftExplorer {
        message: String,
        original: Option<String>,
    },

    /// data.gouv.fr resource selection or download failed.
    #[error("French catalogue loader error: {0}")]
    FrenchCatDataLoader(String),

    /// An explorer was used with a session pointing at another platform.
    #[error("{message}: expected {expected}, received {received}")]
    WrongCatalogue {
        message: String,
        expected: String,
        received: String,
    },

    /// HTTP client request failed.
    ///
    /// Covers non-success statuses that are not retried and client build errors.
    #[error("API Client error: {0}")]
    ClientError(String),

    /// JSON serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// URL parsing failed.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// A caller-supplied argument was rejected before any I/O happened.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The resource format cannot be handled by the requested operation.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Building or reading a tabular frame failed.
    #[error("DataFrame error: {0}")]
    DataFrameError(String),

    /// An in-memory SQL query failed.
    #[error("SQL error: {0}")]
    SqlError(String),

    /// Writing to object storage (S3 or local) failed.
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Network or connection error.
    ///
    /// DNS failures, refused connections and resets end up here.
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Request timeout.
    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    /// Rate limit exceeded.
    #[error("Rate limit exceeded. Please wait and try again.")]
    RateLimitExceeded,

    /// API response contained no data.
    #[error("Empty response from API")]
    EmptyResponse,

    /// Configuration file error.
    ///
    /// Raised when `catalogues.toml` is missing at a custom path or cannot be parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Generic application error for cases not covered by specific variants.
    #[error("Error: {0}")]
    Generic(String),
}

impl From<arrow::error::ArrowError> for AppError {
    fn from(err: arrow::error::ArrowError) -> Self {
        AppError::DataFrameError(err.to_string())
    }
}

impl From<parquet::errors::ParquetError> for AppError {
    fn from(err: parquet::errors::ParquetError) -> Self {
        AppError::DataFrameError(err.to_string())
    }
}

impl From<polars::prelude::PolarsError> for AppError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        AppError::DataFrameError(err.to_string())
    }
}

impl From<datafusion::error::DataFusionError> for AppError {
    fn from(err: datafusion::error::DataFusionError) -> Self {
        AppError::SqlError(err.to_string())
    }
}

impl From<object_store::Error> for AppError {
    fn from(err: object_store::Error) -> Self {
        AppError::StorageError(err.to_string())
    }
}

impl AppError {
    /// Builds an OpenDataSoft error without an underlying cause.
    pub fn open_data_soft(message: impl Into<String>) -> Self {
        AppError::OpenDataSoftExplorer {
            message: message.into(),
            original: None,
        }
    }

    /// Returns a user-friendly error message suitable for CLI output.
    pub fn user_message(&self) -> String {
        match self {
            AppError::CatSession(msg) => {
                format!(
                    "{}\n   Check the catalogue name or URL. Run `herding-cats catalogues` for the built-in list.",
                    msg
                )
            }
            AppError::WrongCatalogue {
                expected, received, ..
            } => {
                format!(
                    "This explorer works with {} catalogues but the session points at a {} catalogue.",
                    expected, received
                )
            }
            AppError::ClientError(msg) => {
                if msg.contains("timeout") || msg.contains("timed out") {
                    "Request timed out. The catalogue may be slow or unreachable.\n   Try again later or check the catalogue URL.".to_string()
                } else if msg.contains("connect") {
                    format!(
                        "Cannot connect to catalogue: {}\n   Check your internet connection and the catalogue URL.",
                        msg
                    )
                } else {
                    format!("API error: {}", msg)
                }
            }
            AppError::UnsupportedFormat(msg) => format!("Unsupported format: {}", msg),
            AppError::StorageError(msg) => {
                format!(
                    "Storage error: {}\n   Check AWS credentials (AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY, AWS_REGION) or the local directory.",
                    msg
                )
            }
            AppError::NetworkError(msg) => {
                format!("Network error: {}\n   Check your internet connection.", msg)
            }
            AppError::Timeout(secs) => {
                format!(
                    "Request timed out after {} seconds.\n   The server may be overloaded. Try again later.",
                    secs
                )
            }
            AppError::RateLimitExceeded => {
                "Too many requests. Please wait a moment and try again.".to_string()
            }
            AppError::EmptyResponse => {
                "The API returned no data. The catalogue may be temporarily unavailable."
                    .to_string()
            }
            AppError::ConfigError(msg) => {
                format!(
                    "Configuration error: {}\n   Check your configuration file.",
                    msg
                )
            }
            _ => self.to_string(),
        }
    }

    /// Returns true if this error is retryable.
    ///
    /// # Examples
    ///
    /// ```
    /// use herding_cats_core::error::AppError;
    ///
    /// let err = AppError::NetworkError("connection reset".to_string());
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::RateLimitExceeded;
    /// assert!(err.is_retryable());
    ///
    /// let err = AppError::UnsupportedFormat("shp".to_string());
    /// assert!(!err.is_retryable());
    /// ```
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::NetworkError(_)
                | AppError::Timeout(_)
                | AppError::RateLimitExceeded
                | AppError::ClientError(_)
        )
    }
}
