use herding_cats_core::error::AppError;
use herding_cats_core::models::ValidatedResource;
use herding_cats_core::validate::validate_ons_nomis_resource;

use super::ResourceLoader;
use crate::http::HttpFetcher;

/// Loads Nomis extracts from a download URL.
///
/// Nomis serves extracts as xlsx, so the `format` argument is ignored. Use
/// `OnsNomisCatExplorer::generate_full_dataset_download_url` to build the URL.
#[derive(Clone, Debug)]
pub struct OnsNomisLoader {
    http: HttpFetcher,
}

impl OnsNomisLoader {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self::with_http(HttpFetcher::new()?))
    }

    pub fn with_http(http: HttpFetcher) -> Self {
        Self { http }
    }
}

impl ResourceLoader for OnsNomisLoader {
    type Source = str;

    fn resolve(&self, source: &str, _format: Option<&str>) -> Result<ValidatedResource, AppError> {
        validate_ons_nomis_resource(source)
    }

    fn http(&self) -> &HttpFetcher {
        &self.http
    }
}
