//! Explorer for data.gouv.fr, the French government catalogue.
//!
//! The full catalogue listing comes from a daily parquet export rather than
//! the paginated API. Per-dataset metadata uses the `api/1` REST endpoints.

use std::collections::BTreeMap;

use arrow::array::{Array, AsArray};
use arrow::compute::cast;
use arrow::datatypes::DataType;
use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use herding_cats_core::catalogue::french_gouv as paths;
use herding_cats_core::config::CatalogueType;
use herding_cats_core::error::AppError;
use herding_cats_core::formats::{LoadOptions, create_dataframe, read_arrow};
use herding_cats_core::frame::{Frame, FrameKind};
use herding_cats_core::models::FrenchResource;
use reqwest::Url;
use serde_json::Value;
use tracing::{error, info, warn};

use crate::session::CatSession;

/// Explorer for www.data.gouv.fr.
#[derive(Clone, Debug)]
pub struct FrenchGouvCatExplorer {
    session: CatSession,
    catalogue_url: String,
}

impl FrenchGouvCatExplorer {
    /// Creates an explorer over `session`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::WrongCatalogue` if the session is known to point at
    /// another platform.
    pub fn new(session: &CatSession) -> Result<Self, AppError> {
        session.ensure_catalogue(CatalogueType::FrenchGouv)?;
        Ok(Self {
            session: session.clone(),
            catalogue_url: paths::CATALOGUE_PARQUET.to_string(),
        })
    }

    /// Reads the catalogue export from `url` instead of the public one.
    pub fn with_catalogue_url(mut self, url: impl Into<String>) -> Self {
        self.catalogue_url = url.into();
        self
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

    async fn catalogue_bytes(&self) -> Result<Bytes, AppError> {
        let url = Url::parse(&self.catalogue_url)
            .map_err(|e| AppError::InvalidUrl(format!("{}: {}", self.catalogue_url, e)))?;
        self.session.http().get_bytes(&url).await.map_err(|e| {
            error!("Failed to download catalogue export: {}", e);
            AppError::CatExplorer(format!("Failed to download catalogue export: {}", e))
        })
    }

    /// Every dataset as `id -> title`, falling back to the slug when the
    /// title is missing.
    pub async fn get_all_datasets(&self) -> Result<BTreeMap<String, String>, AppError> {
        let bytes = self.catalogue_bytes().await?;
        let batch = read_arrow(&bytes, "parquet", &LoadOptions::default())?;
        let datasets = id_title_pairs(&batch)?;
        info!("Retrieved {} datasets", datasets.len());
        Ok(datasets)
    }

    /// The catalogue export as a frame.
    pub async fn catalogue_frame(&self, kind: FrameKind) -> Result<Frame, AppError> {
        let bytes = self.catalogue_bytes().await?;
        create_dataframe(&bytes, "parquet", kind, &LoadOptions::default())
    }

    /// Raw metadata for one dataset.
    pub async fn get_dataset_meta(&self, dataset_id: &str) -> Result<Value, AppError> {
        require_id(dataset_id)?;
        let url = self.session.url_for(&paths::dataset(dataset_id))?;
        self.get_json(&url, &format!("Failed to fetch dataset '{}'", dataset_id))
            .await
    }

    /// Metadata for several datasets. Ids that fail are logged and skipped.
    pub async fn get_multiple_datasets_meta(
        &self,
        dataset_ids: &[&str],
    ) -> Result<BTreeMap<String, Value>, AppError> {
        let mut results = BTreeMap::new();
        for id in dataset_ids {
            match self.get_dataset_meta(id).await {
                Ok(meta) => {
                    results.insert(id.to_string(), meta);
                }
                Err(e) => warn!("Skipping dataset '{}': {}", id, e),
            }
        }
        Ok(results)
    }

    /// Resources of a dataset, each tagged with the dataset id and title.
    pub fn get_dataset_resource_meta(meta: &Value) -> Result<Vec<FrenchResource>, AppError> {
        let Some(dataset) = meta.as_object() else {
            return Err(AppError::InvalidInput(
                "Dataset metadata must be a JSON object".to_string(),
            ));
        };

        let dataset_id = dataset.get("id").and_then(Value::as_str);
        let dataset_title = dataset.get("title").and_then(Value::as_str);
        let resources = dataset
            .get("resources")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();

        Ok(resources
            .iter()
            .map(|r| to_french_resource(r, dataset_id, dataset_title))
            .collect())
    }

    /// Resources of a dataset from the `/resources/` endpoint.
    pub async fn get_dataset_resources(&self, dataset_id: &str) -> Result<Vec<FrenchResource>, AppError> {
        require_id(dataset_id)?;
        let url = self.session.url_for(&paths::dataset_resources(dataset_id))?;
        let body = self
            .get_json(
                &url,
                &format!("Failed to fetch resources of '{}'", dataset_id),
            )
            .await?;

        // Either a bare list or a paginated `{"data": [...]}` page
        let items = match &body {
            Value::Array(items) => items.as_slice(),
            other => other
                .get("data")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or_default(),
        };

        Ok(items
            .iter()
            .map(|r| to_french_resource(r, Some(dataset_id), None))
            .collect())
    }
}

fn require_id(dataset_id: &str) -> Result<(), AppError> {
    if dataset_id.trim().is_empty() {
        return Err(AppError::InvalidInput(
            "dataset id cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn to_french_resource(
    resource: &Value,
    dataset_id: Option<&str>,
    dataset_title: Option<&str>,
) -> FrenchResource {
    FrenchResource {
        resource_id: str_field(resource, "id"),
        resource_title: str_field(resource, "title"),
        resource_format: str_field(resource, "format"),
        resource_url: str_field(resource, "url"),
        resource_created: str_field(resource, "created_at"),
        resource_last_modified: str_field(resource, "last_modified"),
        resource_filesize: resource.get("filesize").and_then(Value::as_u64),
        dataset_id: dataset_id.map(str::to_string),
        dataset_title: dataset_title.map(str::to_string),
    }
}

fn string_column(batch: &RecordBatch, name: &str) -> Result<Option<Vec<Option<String>>>, AppError> {
    let Ok(index) = batch.schema().index_of(name) else {
        return Ok(None);
    };
    let column = cast(batch.column(index), &DataType::Utf8)?;
    let strings = column.as_string::<i32>();
    Ok(Some(
        (0..strings.len())
            .map(|i| (!strings.is_null(i)).then(|| strings.value(i).to_string()))
            .collect(),
    ))
}

/// `id -> title` (or slug) from the catalogue export.
fn id_title_pairs(batch: &RecordBatch) -> Result<BTreeMap<String, String>, AppError> {
    let ids = string_column(batch, "id")?.ok_or_else(|| {
        AppError::DataFrameError("Catalogue export has no 'id' column".to_string())
    })?;
    let titles = string_column(batch, "title")?.unwrap_or_default();
    let slugs = string_column(batch, "slug")?.unwrap_or_default();

    let mut datasets = BTreeMap::new();
    for (i, id) in ids.into_iter().enumerate() {
        let Some(id) = id else { continue };
        let label = titles
            .get(i)
            .cloned()
            .flatten()
            .filter(|t| !t.is_empty())
            .or_else(|| slugs.get(i).cloned().flatten());
        if let Some(label) = label {
            datasets.insert(id, label);
        }
    }
    Ok(datasets)
}
