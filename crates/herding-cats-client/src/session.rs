//! Catalogue sessions.
//!
//! A [`CatSession`] pins a base URL, checks that it answers, and carries the
//! shared HTTP client every explorer and loader uses.

use herding_cats_core::catalogue::Catalogue;
use herding_cats_core::config::CatalogueType;
use herding_cats_core::error::AppError;
use reqwest::Url;
use tracing::{error, info};

use crate::http::HttpFetcher;

/// What a session is opened against: a built-in catalogue or a free-form string.
///
/// Strings are matched against built-in catalogue names first (`"uk gov"`,
/// `"UK_GOV"`), then treated as a domain or URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogueSource {
    Catalogue(Catalogue),
    Url(String),
}

impl From<Catalogue> for CatalogueSource {
    fn from(catalogue: Catalogue) -> Self {
        Self::Catalogue(catalogue)
    }
}

impl From<&str> for CatalogueSource {
    fn from(source: &str) -> Self {
        Self::Url(source.to_string())
    }
}

impl From<String> for CatalogueSource {
    fn from(source: String) -> Self {
        Self::Url(source)
    }
}

/// A resolved catalogue location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Base URL, always ending in `/` so API paths can be joined onto it.
    pub base_url: Url,
    pub catalogue_type: Option<CatalogueType>,
}

/// Resolves a source to a base URL without touching the network.
///
/// A bare domain gets an `https://` prefix. The platform is known when the
/// source is a built-in catalogue or its URL points at one.
pub fn resolve_source(source: &CatalogueSource) -> Result<ResolvedSource, AppError> {
    let (raw, catalogue) = match source {
        CatalogueSource::Catalogue(c) => (c.url().to_string(), Some(*c)),
        CatalogueSource::Url(s) => match Catalogue::from_name(s) {
            Some(c) => (c.url().to_string(), Some(c)),
            None => {
                let trimmed = s.trim().trim_end_matches('/');
                if trimmed.is_empty() {
                    return Err(AppError::CatSession(
                        "Catalogue source cannot be empty".to_string(),
                    ));
                }
                if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
                    (trimmed.to_string(), None)
                } else {
                    (format!("https://{}", trimmed), None)
                }
            }
        },
    };

    let base_url = Url::parse(&format!("{}/", raw.trim_end_matches('/')))
        .map_err(|e| AppError::InvalidUrl(format!("{}: {}", raw, e)))?;
    if base_url.host_str().is_none() {
        return Err(AppError::InvalidUrl(raw));
    }

    let catalogue_type = catalogue
        .or_else(|| Catalogue::from_url(&base_url))
        .map(|c| c.catalogue_type());

    Ok(ResolvedSource {
        base_url,
        catalogue_type,
    })
}

/// An open connection to one data catalogue.
///
/// # Examples
///
/// ```no_run
/// use herding_cats_client::CatSession;
/// use herding_cats_core::Catalogue;
///
/// # async fn example() -> Result<(), herding_cats_core::AppError> {
/// let session = CatSession::connect(Catalogue::LondonDataStore).await?;
/// let other = CatSession::connect("data.humdata.org").await?;
/// println!("{} {}", session.domain(), other.base_url());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CatSession {
    http: HttpFetcher,
    base_url: Url,
    domain: String,
    catalogue_type: Option<CatalogueType>,
}

impl CatSession {
    /// Resolves `source` and checks that it answers.
    ///
    /// # Errors
    ///
    /// Returns `AppError::CatSession` if the URL is unreachable or returns a
    /// non-success status.
    pub async fn connect(source: impl Into<CatalogueSource>) -> Result<Self, AppError> {
        Self::connect_with(source, None, HttpFetcher::new()?).await
    }

    /// Like [`CatSession::connect`], declaring the platform explicitly.
    ///
    /// Useful for catalogues that are not built in, such as entries from
    /// `catalogues.toml`.
    pub async fn connect_as(
        source: impl Into<CatalogueSource>,
        catalogue_type: CatalogueType,
    ) -> Result<Self, AppError> {
        Self::connect_with(source, Some(catalogue_type), HttpFetcher::new()?).await
    }

    /// Opens a session with a caller-supplied HTTP client.
    ///
    /// `catalogue_type` overrides whatever the source resolved to.
    pub async fn connect_with(
        source: impl Into<CatalogueSource>,
        catalogue_type: Option<CatalogueType>,
        http: HttpFetcher,
    ) -> Result<Self, AppError> {
        let resolved = resolve_source(&source.into())?;
        let domain = resolved
            .base_url
            .host_str()
            .map(|h| match resolved.base_url.port() {
                Some(port) => format!("{}:{}", h, port),
                None => h.to_string(),
            })
            .unwrap_or_default();

        info!("You are using: {}", domain);

        let session = Self {
            http,
            base_url: resolved.base_url,
            domain,
            catalogue_type: catalogue_type.or(resolved.catalogue_type),
        };
        session.validate_url().await?;
        Ok(session)
    }

    async fn validate_url(&self) -> Result<(), AppError> {
        self.http.probe(&self.base_url).await.map_err(|e| {
            error!("Failed to connect to {}: {}", self.base_url_str(), e);
            AppError::CatSession(format!(
                "Invalid or unreachable URL: {}. Error: {}",
                self.base_url_str(),
                e
            ))
        })
    }

    /// Hits the base URL once more and logs the result.
    pub async fn start_session(&self) -> Result<(), AppError> {
        self.http
            .request_with_retry(&self.base_url)
            .await
            .map_err(|e| {
                error!("Failed to start session: {}", e);
                AppError::CatSession(format!("Failed to start session: {}", e))
            })?;
        info!("Session started successfully with {}", self.domain);
        Ok(())
    }

    /// Logs the end of the session. Connections are released on drop.
    pub fn close_session(&self) {
        info!("Session closed");
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL without the trailing slash, as users write it.
    pub fn base_url_str(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn catalogue_type(&self) -> Option<CatalogueType> {
        self.catalogue_type
    }

    pub fn http(&self) -> &HttpFetcher {
        &self.http
    }

    /// Joins an API path onto the base URL.
    pub fn url_for(&self, path: &str) -> Result<Url, AppError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| AppError::InvalidUrl(format!("{}{}: {}", self.base_url, path, e)))
    }

    /// Fails unless the session is of `expected` type or of unknown type.
    pub fn ensure_catalogue(&self, expected: CatalogueType) -> Result<(), AppError> {
        match self.catalogue_type {
            Some(received) if received != expected => Err(AppError::WrongCatalogue {
                message: "Invalid catalogue type for this explorer".to_string(),
                expected: expected.to_string(),
                received: received.to_string(),
            }),
            _ => Ok(()),
        }
    }
}
