use herding_cats_core::error::AppError;
use herding_cats_core::frame::Frame;
use herding_cats_core::models::{FrenchResource, ValidatedResource};
use herding_cats_core::validate::select_french_gouv_resource;
use reqwest::Url;
use tracing::info;

use super::{ResourceLoader, with_api_key};
use crate::http::HttpFetcher;

/// Loads data.gouv.fr resources as returned by
/// `FrenchGouvCatExplorer::get_dataset_resource_meta`.
///
/// `format` is required: `csv`, `xls`, `xlsx` or `parquet`.
#[derive(Clone, Debug)]
pub struct FrenchGouvLoader {
    http: HttpFetcher,
    api_key: Option<String>,
}

impl FrenchGouvLoader {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self::with_http(HttpFetcher::new()?))
    }

    pub fn with_http(http: HttpFetcher) -> Self {
        Self { http, api_key: None }
    }

    /// Sends `apikey=KEY` with every download.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

impl ResourceLoader for FrenchGouvLoader {
    type Source = [FrenchResource];

    fn resolve(
        &self,
        source: &[FrenchResource],
        format: Option<&str>,
    ) -> Result<ValidatedResource, AppError> {
        let format = format.ok_or_else(|| {
            AppError::FrenchCatDataLoader("A format type is required to pick a resource".to_string())
        })?;
        let resource = select_french_gouv_resource(source, format)?;
        info!(
            "Loading '{}' as {}",
            resource.title.as_deref().unwrap_or_default(),
            resource.format
        );
        Ok(resource)
    }

    fn http(&self) -> &HttpFetcher {
        &self.http
    }

    fn download_url(&self, resource: &ValidatedResource) -> Result<Url, AppError> {
        with_api_key(&resource.url, self.api_key.as_deref())
    }

    fn download_error(&self, err: AppError) -> AppError {
        AppError::FrenchCatDataLoader(format!("Failed to download resource: {}", err))
    }

    fn check_loaded(&self, frame: &Frame) -> Result<(), AppError> {
        if frame.is_empty() && self.api_key.is_none() {
            return Err(AppError::FrenchCatDataLoader(
                "Received empty DataFrame. This likely means an API key is required. \
                 Please provide an API key and try again."
                    .to_string(),
            ));
        }
        Ok(())
    }
}
