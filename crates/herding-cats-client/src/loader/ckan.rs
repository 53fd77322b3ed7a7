use herding_cats_core::error::AppError;
use herding_cats_core::models::{CkanResourceRef, ValidatedResource};
use herding_cats_core::validate::validate_ckan_resource;

use super::ResourceLoader;
use crate::http::HttpFetcher;

/// Loads CKAN resources as returned by `CkanCatExplorer::extract_resource_url`.
///
/// `format` picks the first resource of that format (case-insensitive).
/// Without it the first resource is loaded.
///
/// # Examples
///
/// ```no_run
/// use herding_cats_client::{CatSession, CkanCatExplorer, CkanLoader, ResourceLoader};
/// use herding_cats_core::{Catalogue, LoadOptions};
///
/// # async fn example() -> Result<(), herding_cats_core::AppError> {
/// let session = CatSession::connect(Catalogue::LondonDataStore).await?;
/// let explorer = CkanCatExplorer::new(&session)?;
/// let info = explorer.package_show_info("violence-reduction-unit").await?;
/// let resources = CkanCatExplorer::extract_resource_url(&info);
///
/// let loader = CkanLoader::new()?;
/// let df = loader
///     .polars_data_loader(&resources, Some("spreadsheet"), &LoadOptions::default())
///     .await?;
/// println!("{}", df);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CkanLoader {
    http: HttpFetcher,
}

impl CkanLoader {
    pub fn new() -> Result<Self, AppError> {
        Ok(Self::with_http(HttpFetcher::new()?))
    }

    pub fn with_http(http: HttpFetcher) -> Self {
        Self { http }
    }
}

impl ResourceLoader for CkanLoader {
    type Source = [CkanResourceRef];

    fn resolve(
        &self,
        source: &[CkanResourceRef],
        format: Option<&str>,
    ) -> Result<ValidatedResource, AppError> {
        validate_ckan_resource(source, format)
    }

    fn http(&self) -> &HttpFetcher {
        &self.http
    }
}
