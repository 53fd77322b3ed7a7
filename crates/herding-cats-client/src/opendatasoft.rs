//! Explorer for OpenDataSoft catalogues.
//!
//! OpenDataSoft portals expose the catalog API under two prefixes. The older
//! `api/v2/catalog` is tried first and `api/explore/v2.0/catalog` is the
//! fallback.

use std::collections::BTreeMap;

use herding_cats_core::catalogue::opendatasoft as paths;
use herding_cats_core::config::CatalogueType;
use herding_cats_core::error::AppError;
use herding_cats_core::models::ExportOption;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::session::CatSession;

#[derive(Deserialize, Debug, Default)]
struct CatalogPage {
    #[serde(default)]
    total_count: Option<usize>,
    #[serde(default)]
    datasets: Vec<CatalogEntry>,
}

#[derive(Deserialize, Debug)]
struct CatalogEntry {
    #[serde(default)]
    dataset: Option<CatalogDataset>,
}

#[derive(Deserialize, Debug)]
struct CatalogDataset {
    #[serde(default)]
    dataset_id: Option<String>,
    #[serde(default)]
    metas: Option<Value>,
}

impl CatalogEntry {
    /// `(title, dataset_id)` when both are present.
    fn title_and_id(&self) -> Option<(String, String)> {
        let dataset = self.dataset.as_ref()?;
        let title = dataset
            .metas
            .as_ref()?
            .get("default")?
            .get("title")?
            .as_str()?;
        let id = dataset.dataset_id.as_ref()?;
        Some((title.to_string(), id.clone()))
    }
}

#[derive(Deserialize, Debug, Default)]
struct ExportsResponse {
    #[serde(default)]
    links: Vec<ExportLink>,
}

#[derive(Deserialize, Debug)]
struct ExportLink {
    rel: String,
    href: String,
}

/// Explorer for OpenDataSoft portals such as ukpowernetworks.opendatasoft.com.
#[derive(Clone, Debug)]
pub struct OpenDataSoftCatExplorer {
    session: CatSession,
}

impl OpenDataSoftCatExplorer {
    /// Creates an explorer over `session`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::WrongCatalogue` if the session is known to point at
    /// another platform.
    pub fn new(session: &CatSession) -> Result<Self, AppError> {
        session.ensure_catalogue(CatalogueType::OpenDataSoft)?;
        Ok(Self {
            session: session.clone(),
        })
    }

    pub fn session(&self) -> &CatSession {
        &self.session
    }

    /// Walks one catalog endpoint page by page.
    async fn fetch_from(
        &self,
        base: &str,
        datasets: &mut BTreeMap<String, String>,
    ) -> Result<Option<usize>, AppError> {
        let mut offset = 0;
        let mut total_count = None;

        loop {
            let mut url = self.session.url_for(base)?;
            url.query_pairs_mut()
                .append_pair("offset", &offset.to_string())
                .append_pair("limit", &paths::PAGE_LIMIT.to_string());

            let page: CatalogPage = self.session.http().get_json(&url).await?;
            datasets.extend(page.datasets.iter().filter_map(CatalogEntry::title_and_id));

            if page.total_count.is_some() {
                total_count = page.total_count;
            }
            if page.datasets.len() < paths::PAGE_LIMIT {
                break;
            }
            offset += paths::PAGE_LIMIT;
        }

        Ok(total_count)
    }

    /// Every dataset in the catalogue as `title -> dataset_id`.
    ///
    /// Returns `None` when neither endpoint yields a dataset.
    pub async fn fetch_all_datasets(&self) -> Result<Option<BTreeMap<String, String>>, AppError> {
        let endpoints = [paths::DATASETS, paths::DATASETS_ALT];
        let mut datasets = BTreeMap::new();
        let mut total_count = 0;

        for (i, endpoint) in endpoints.iter().enumerate() {
            let is_last = i == endpoints.len() - 1;
            match self.fetch_from(endpoint, &mut datasets).await {
                Ok(count) => {
                    total_count = count.unwrap_or(total_count);
                    if !datasets.is_empty() {
                        break;
                    }
                }
                Err(e) if is_last => {
                    error!("Failed to fetch datasets: {}", e);
                    return Err(AppError::CatExplorer(format!(
                        "Failed to fetch datasets: {}",
                        e
                    )));
                }
                Err(e) => {
                    warn!(
                        "Failed to fetch datasets from {}: {}. Trying next URL.",
                        endpoint, e
                    );
                }
            }
        }

        if datasets.is_empty() {
            warn!("No datasets were retrieved.");
            return Ok(None);
        }

        let returned_count = datasets.len();
        if returned_count == total_count {
            info!(
                "total_count = {} AND returned_count = {}",
                total_count, returned_count
            );
        } else {
            warn!(
                "Mismatch in counts: total_count = {}, returned_count = {}",
                total_count, returned_count
            );
        }
        Ok(Some(datasets))
    }

    /// Raw metadata of one dataset.
    pub async fn show_dataset_info(&self, dataset_id: &str) -> Result<Value, AppError> {
        require_dataset_id(dataset_id)?;

        let mut last_error = None;
        for base in [paths::DATASETS, paths::DATASETS_ALT] {
            let url = self.session.url_for(&paths::dataset(base, dataset_id))?;
            match self.session.http().get_json::<Value>(&url).await {
                Ok(info) => return Ok(info),
                Err(e) => {
                    warn!("Failed to fetch dataset info from {}: {}", url, e);
                    last_error = Some(e);
                }
            }
        }

        let cause = last_error.map(|e| e.to_string());
        Err(AppError::OpenDataSoftExplorer {
            message: format!("Failed to fetch dataset info for '{}'", dataset_id),
            original: cause,
        })
    }

    /// Export formats offered for a dataset and their download links.
    pub async fn show_dataset_export_options(
        &self,
        dataset_id: &str,
    ) -> Result<Vec<ExportOption>, AppError> {
        require_dataset_id(dataset_id)?;

        let url = self
            .session
            .url_for(&paths::dataset_exports(paths::DATASETS, dataset_id))?;
        let exports: ExportsResponse =
            self.session
                .http()
                .get_json(&url)
                .await
                .map_err(|e| AppError::OpenDataSoftExplorer {
                    message: format!("Failed to fetch export options for '{}'", dataset_id),
                    original: Some(e.to_string()),
                })?;

        let options: Vec<ExportOption> = exports
            .links
            .into_iter()
            .filter(|link| link.rel != "self")
            .map(|link| ExportOption::new(link.rel, link.href))
            .collect();

        if options.is_empty() {
            return Err(AppError::open_data_soft(format!(
                "No export options found for dataset '{}'",
                dataset_id
            )));
        }
        Ok(options)
    }
}

fn require_dataset_id(dataset_id: &str) -> Result<(), AppError> {
    if dataset_id.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "dataset id cannot be empty".to_string(),
        ));
    }
    Ok(())
}
