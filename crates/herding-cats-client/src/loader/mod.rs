//! Resource loaders.
//!
//! A loader turns explorer output into data: it validates the resources a
//! caller passes in, picks one, downloads it, and then parses it into a
//! frame, registers it for SQL, or uploads it to storage.
//!
//! Every platform implements [`ResourceLoader`] by saying how to pick a
//! resource ([`ResourceLoader::resolve`]). The load, query and upload
//! operations are provided methods shared by all of them.

mod ckan;
mod french_gouv;
mod nomis;
mod opendatasoft;

pub use ckan::CkanLoader;
pub use french_gouv::FrenchGouvLoader;
pub use nomis::OnsNomisLoader;
pub use opendatasoft::OpenDataSoftLoader;

use std::future::Future;

use arrow::record_batch::RecordBatch;
use bytes::Bytes;
use herding_cats_core::error::AppError;
use herding_cats_core::formats::{LoadOptions, create_dataframe, get_sheet_names};
use herding_cats_core::frame::{Frame, FrameKind};
use herding_cats_core::models::ValidatedResource;
use herding_cats_core::sql::SqlSession;
use herding_cats_core::storage::{StorageEnum, StorageTrait, StorageType, UploadMode};
use polars::prelude::DataFrame;
use reqwest::Url;
use tracing::{debug, info};
use uuid::Uuid;

use crate::http::HttpFetcher;

/// A downloaded resource and the format it was selected as.
#[derive(Debug, Clone)]
pub struct FetchedResource {
    pub bytes: Bytes,
    /// Lowercased format, e.g. `csv` or `xlsx`.
    pub format: String,
    pub url: String,
}

/// Appends `apikey=KEY` to a download URL.
pub(crate) fn with_api_key(url: &str, api_key: Option<&str>) -> Result<Url, AppError> {
    let mut url =
        Url::parse(url).map_err(|e| AppError::InvalidUrl(format!("{}: {}", url, e)))?;
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        url.query_pairs_mut().append_pair("apikey", key);
    }
    Ok(url)
}

/// Object key for an upload: the caller's name plus a random suffix.
pub fn upload_key(custom_name: &str) -> String {
    format!("{}-{}", custom_name, Uuid::new_v4())
}

/// Loads resources of one catalogue platform.
///
/// # Type Parameters
///
/// * `Source` - What the explorer hands over: a list of resources, export
///   options, or a bare URL
///
/// The `format` argument on every method selects among the resources. Its
/// meaning depends on the platform: CKAN treats it as an optional preferred
/// format, OpenDataSoft and data.gouv.fr require it, Nomis ignores it.
pub trait ResourceLoader: Send + Sync {
    type Source: ?Sized + Sync;

    /// Validates `source` and picks the resource to download.
    fn resolve(
        &self,
        source: &Self::Source,
        format: Option<&str>,
    ) -> Result<ValidatedResource, AppError>;

    /// HTTP client used for downloads.
    fn http(&self) -> &HttpFetcher;

    /// Final download URL, e.g. with credentials appended.
    fn download_url(&self, resource: &ValidatedResource) -> Result<Url, AppError> {
        with_api_key(&resource.url, None)
    }

    /// Maps a download failure into this platform's error.
    fn download_error(&self, err: AppError) -> AppError {
        err
    }

    /// Checks a freshly parsed frame. The default accepts anything.
    fn check_loaded(&self, _frame: &Frame) -> Result<(), AppError> {
        Ok(())
    }

    /// Picks and downloads a resource.
    fn fetch_resource(
        &self,
        source: &Self::Source,
        format: Option<&str>,
    ) -> impl Future<Output = Result<FetchedResource, AppError>> + Send {
        async move {
            let resource = self.resolve(source, format)?;
            let url = self.download_url(&resource)?;
            let bytes = self
                .http()
                .get_bytes(&url)
                .await
                .map_err(|e| self.download_error(e))?;

            debug!("Fetched {} ({} bytes)", resource.url, bytes.len());
            Ok(FetchedResource {
                bytes,
                format: resource.format,
                url: resource.url,
            })
        }
    }

    /// Downloads a resource and parses it into a frame of `kind`.
    fn load_frame(
        &self,
        source: &Self::Source,
        format: Option<&str>,
        kind: FrameKind,
        opts: &LoadOptions,
    ) -> impl Future<Output = Result<Frame, AppError>> + Send {
        async move {
            let fetched = self.fetch_resource(source, format).await?;
            let frame = create_dataframe(&fetched.bytes, &fetched.format, kind, opts)?;
            self.check_loaded(&frame)?;
            info!("Loaded {} rows from {}", frame.num_rows(), fetched.url);
            Ok(frame)
        }
    }

    /// Loads a resource into a polars frame.
    fn polars_data_loader(
        &self,
        source: &Self::Source,
        format: Option<&str>,
        opts: &LoadOptions,
    ) -> impl Future<Output = Result<DataFrame, AppError>> + Send {
        async move {
            self.load_frame(source, format, FrameKind::Polars, opts)
                .await?
                .into_polars()
        }
    }

    /// Loads a resource into an Arrow batch.
    fn arrow_data_loader(
        &self,
        source: &Self::Source,
        format: Option<&str>,
        opts: &LoadOptions,
    ) -> impl Future<Output = Result<RecordBatch, AppError>> + Send {
        async move {
            self.load_frame(source, format, FrameKind::Arrow, opts)
                .await?
                .into_arrow()
        }
    }

    /// Sheet names of a spreadsheet resource.
    fn get_sheet_names(
        &self,
        source: &Self::Source,
        format: Option<&str>,
    ) -> impl Future<Output = Result<Vec<String>, AppError>> + Send {
        async move {
            let fetched = self.fetch_resource(source, format).await?;
            get_sheet_names(&fetched.bytes)
        }
    }

    /// Loads a resource into a fresh SQL session as `table_name`.
    fn duckdb_data_loader(
        &self,
        source: &Self::Source,
        format: Option<&str>,
        table_name: &str,
        opts: &LoadOptions,
    ) -> impl Future<Output = Result<SqlSession, AppError>> + Send {
        async move {
            let frame = self.load_frame(source, format, FrameKind::Arrow, opts).await?;
            let session = SqlSession::new();
            session.register_frame(table_name, frame)?;
            info!("Registered resource as table '{}'", table_name);
            Ok(session)
        }
    }

    /// Loads a resource as `table_name` and runs `query` over it.
    fn execute_query(
        &self,
        source: &Self::Source,
        format: Option<&str>,
        table_name: &str,
        query: &str,
        opts: &LoadOptions,
    ) -> impl Future<Output = Result<RecordBatch, AppError>> + Send {
        async move {
            let session = self
                .duckdb_data_loader(source, format, table_name, opts)
                .await?;
            session.execute_query(query).await
        }
    }

    /// Like [`ResourceLoader::execute_query`], returning a frame of `kind`.
    fn query_to_frame(
        &self,
        source: &Self::Source,
        format: Option<&str>,
        table_name: &str,
        query: &str,
        kind: FrameKind,
        opts: &LoadOptions,
    ) -> impl Future<Output = Result<Frame, AppError>> + Send {
        async move {
            let session = self
                .duckdb_data_loader(source, format, table_name, opts)
                .await?;
            session.query_to_frame(query, kind).await
        }
    }

    /// Downloads a resource and stores it in an already opened backend.
    ///
    /// The object key is `{custom_name}-{uuid}` plus the extension for `mode`.
    fn upload_with<S: StorageTrait>(
        &self,
        source: &Self::Source,
        format: Option<&str>,
        storage: &S,
        custom_name: &str,
        mode: UploadMode,
    ) -> impl Future<Output = Result<String, AppError>> + Send {
        async move {
            if custom_name.trim().is_empty() {
                return Err(AppError::InvalidInput(
                    "Bucket name and custom name must be non-empty strings".to_string(),
                ));
            }
            let fetched = self.fetch_resource(source, format).await?;
            storage
                .upload(
                    fetched.bytes,
                    &upload_key(custom_name),
                    mode,
                    Some(&fetched.format),
                )
                .await
        }
    }

    /// Downloads a resource and uploads it to S3 or a local directory.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if `bucket` or `custom_name` is blank,
    /// and `AppError::StorageError` if the bucket does not exist.
    fn upload_data(
        &self,
        source: &Self::Source,
        format: Option<&str>,
        bucket: &str,
        custom_name: &str,
        mode: UploadMode,
        storage_type: StorageType,
    ) -> impl Future<Output = Result<String, AppError>> + Send {
        async move {
            if bucket.trim().is_empty() || custom_name.trim().is_empty() {
                return Err(AppError::InvalidInput(
                    "Bucket name and custom name must be non-empty strings".to_string(),
                ));
            }
            let storage = StorageEnum::connect(storage_type, bucket).await?;
            self.upload_with(source, format, &storage, custom_name, mode)
                .await
        }
    }
}
