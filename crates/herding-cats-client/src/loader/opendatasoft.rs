use herding_cats_core::error::AppError;
use herding_cats_core::frame::Frame;
use herding_cats_core::models::{ExportOption, ValidatedResource};
use herding_cats_core::validate::select_opendatasoft_export;
use reqwest::Url;

use super::{ResourceLoader, with_api_key};
use crate::http::HttpFetcher;

/// Loads OpenDataSoft exports as returned by
/// `OpenDataSoftCatExplorer::show_dataset_export_options`.
///
/// `format` is required: a concrete format (`csv`, `xlsx`, `parquet`) or the
/// `spreadsheet` group.
#[derive(Clone, Debug)]
pub struct OpenDataSoftLoader {
    http: HttpFetcher,
    api_key: Option<String>,
}

impl OpenDataSoftLoader {
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

impl ResourceLoader for OpenDataSoftLoader {
    type Source = [ExportOption];

    fn resolve(
        &self,
        source: &[ExportOption],
        format: Option<&str>,
    ) -> Result<ValidatedResource, AppError> {
        let format = format.ok_or_else(|| {
            AppError::open_data_soft("A format type is required to pick an export")
        })?;
        select_opendatasoft_export(source, format)
    }

    fn http(&self) -> &HttpFetcher {
        &self.http
    }

    fn download_url(&self, resource: &ValidatedResource) -> Result<Url, AppError> {
        with_api_key(&resource.url, self.api_key.as_deref())
    }

    fn download_error(&self, err: AppError) -> AppError {
        AppError::OpenDataSoftExplorer {
            message: "Failed to download resource".to_string(),
            original: Some(err.to_string()),
        }
    }

    fn check_loaded(&self, frame: &Frame) -> Result<(), AppError> {
        if frame.is_empty() && self.api_key.is_none() {
            return Err(AppError::open_data_soft(
                "Received empty DataFrame. This likely means an API key is required. \
                 Please provide an API key and try again.",
            ));
        }
        Ok(())
    }
}
