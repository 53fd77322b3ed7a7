//! Explorer for the ONS Nomis API (www.nomisweb.co.uk).
//!
//! Nomis describes datasets with SDMX-flavoured JSON: key families for
//! datasets, components for dimensions and codelists for dimension values.

use herding_cats_core::catalogue::nomis as paths;
use herding_cats_core::config::CatalogueType;
use herding_cats_core::error::AppError;
use herding_cats_core::models::{NomisDataset, NomisDimension};
use reqwest::Url;
use serde_json::Value;
use tracing::{error, info};

use crate::session::CatSession;

/// Explorer for ONS Nomis.
#[derive(Clone, Debug)]
pub struct OnsNomisCatExplorer {
    session: CatSession,
}

impl OnsNomisCatExplorer {
    /// Creates an explorer over `session`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::WrongCatalogue` if the session is known to point at
    /// another platform.
    pub fn new(session: &CatSession) -> Result<Self, AppError> {
        session.ensure_catalogue(CatalogueType::OnsNomis)?;
        Ok(Self {
            session: session.clone(),
        })
    }

    pub fn session(&self) -> &CatSession {
        &self.session
    }

    async fn get_json(&self, url: &Url, context: &str) -> Result<Value, AppError> {
        self.session.http().get_json(url).await.map_err(|e| {
            error!("{}: {}", context, e);
            AppError::CatExplorer(format!("{}: {}", context, e))
        })
    }

    /// Every dataset key family as `{id, name}`.
    pub async fn get_all_datasets(&self) -> Result<Vec<NomisDataset>, AppError> {
        let url = self.session.url_for(paths::DATASETS)?;
        let body = self.get_json(&url, "Failed to fetch datasets").await?;

        let datasets: Vec<NomisDataset> = key_families(&body)
            .iter()
            .filter_map(|family| {
                Some(NomisDataset {
                    id: family.get("id")?.as_str()?.to_string(),
                    name: text_value(family.get("name")?)?,
                })
            })
            .collect();

        info!("Retrieved {} Nomis datasets", datasets.len());
        Ok(datasets)
    }

    /// Raw definition of one dataset.
    pub async fn get_dataset_info(&self, dataset_id: &str) -> Result<Value, AppError> {
        require_id(dataset_id)?;
        let url = self.session.url_for(&paths::dataset_definition(dataset_id))?;
        self.get_json(&url, &format!("Failed to fetch dataset '{}'", dataset_id))
            .await
    }

    /// Raw overview of one dataset.
    pub async fn get_dataset_overview(&self, dataset_id: &str) -> Result<Value, AppError> {
        require_id(dataset_id)?;
        let url = self.session.url_for(&paths::dataset_overview(dataset_id))?;
        self.get_json(
            &url,
            &format!("Failed to fetch overview of '{}'", dataset_id),
        )
        .await
    }

    /// Dimensions of a dataset with the codelist behind each.
    pub async fn get_dataset_dimensions(&self, dataset_id: &str) -> Result<Vec<NomisDimension>, AppError> {
        let info = self.get_dataset_info(dataset_id).await?;
        let families = key_families(&info);
        let Some(family) = families.first() else {
            return Err(AppError::CatExplorer(format!(
                "No definition found for dataset '{}'",
                dataset_id
            )));
        };
        Ok(dimensions(family))
    }

    /// Raw definition of a codelist, e.g. `CL_1_1_GEOGRAPHY`.
    pub async fn get_codelist_info(&self, codelist_id: &str) -> Result<Value, AppError> {
        require_id(codelist_id)?;
        let url = self.session.url_for(&paths::codelist(codelist_id))?;
        self.get_json(
            &url,
            &format!("Failed to fetch codelist '{}'", codelist_id),
        )
        .await
    }

    /// Download URL for the latest xlsx extract of a dataset.
    ///
    /// Geography codes, when given, are sent comma separated.
    pub fn generate_full_dataset_download_url(
        &self,
        dataset_id: &str,
        geography_codes: &[&str],
    ) -> Result<String, AppError> {
        require_id(dataset_id)?;
        let mut url = format!(
            "{}/{}?date=latest",
            self.session.base_url_str(),
            paths::dataset_download(dataset_id.trim())
        );
        if !geography_codes.is_empty() {
            url.push_str("&geography=");
            url.push_str(&geography_codes.join(","));
        }
        Ok(url)
    }
}

fn require_id(id: &str) -> Result<(), AppError> {
    if id.trim().is_empty() {
        return Err(AppError::InvalidInput("dataset id cannot be empty".to_string()));
    }
    Ok(())
}

/// `structure.keyfamilies.keyfamily[]`, or nothing.
fn key_families(body: &Value) -> &[Value] {
    body.pointer("/structure/keyfamilies/keyfamily")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Nomis names are either plain strings or `{"value": ..., "lang": ...}`.
fn text_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        other => other.get("value")?.as_str().map(str::to_string),
    }
}

fn dimensions(family: &Value) -> Vec<NomisDimension> {
    family
        .pointer("/components/dimension")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
        .iter()
        .filter_map(|d| {
            Some(NomisDimension {
                concept: d.get("conceptref")?.as_str()?.to_string(),
                codelist: d.get("codelist")?.as_str()?.to_string(),
            })
        })
        .collect()
}
