//! Uploading downloaded resources to object storage.
//!
//! Resources are stored either as the raw bytes (`key.{format}`) or
//! converted to parquet (`key.parquet`). Storage is reached through
//! `object_store`, so S3 and local directories share one upload path.
//!
//! # Why an Enum Instead of `dyn Trait`?
//!
//! [`StorageTrait`] returns `impl Future` (RPITIT), which is not object-safe.
//! [`StorageEnum`] gives runtime selection with static dispatch.

use std::fmt;
use std::future::Future;
use std::path::{Path as FsPath, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use tracing::info;

use crate::error::AppError;
use crate::formats::{normalise_format, to_parquet};

/// How a resource is written to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UploadMode {
    /// Bytes as downloaded.
    #[default]
    Raw,
    /// Converted to ZSTD-compressed parquet.
    Parquet,
}

impl fmt::Display for UploadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw => write!(f, "raw"),
            Self::Parquet => write!(f, "parquet"),
        }
    }
}

impl FromStr for UploadMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "raw" => Ok(Self::Raw),
            "parquet" => Ok(Self::Parquet),
            _ => Err(AppError::InvalidInput(format!(
                "Unknown upload mode: '{}'. Valid options: raw, parquet",
                s
            ))),
        }
    }
}

/// Where uploads go.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageType {
    #[default]
    S3,
    /// A local directory standing in for a bucket.
    Local,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::S3 => write!(f, "s3"),
            Self::Local => write!(f, "local"),
        }
    }
}

impl FromStr for StorageType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(Self::S3),
            "local" => Ok(Self::Local),
            _ => Err(AppError::InvalidInput(format!(
                "Unsupported storage type: '{}'. Valid options: s3, local",
                s
            ))),
        }
    }
}

/// Destination for downloaded resources.
pub trait StorageTrait: Send + Sync {
    /// Writes `data` under `key` and returns the stored object name.
    ///
    /// # Arguments
    ///
    /// * `key` - Object name without extension
    /// * `mode` - Store raw bytes or convert to parquet
    /// * `file_format` - Format of `data`; required for parquet mode
    fn upload(
        &self,
        data: Bytes,
        key: &str,
        mode: UploadMode,
        file_format: Option<&str>,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

fn require_non_blank(value: &str, what: &str) -> Result<(), AppError> {
    if value.trim().is_empty() {
        return Err(AppError::InvalidInput(format!("{} cannot be empty", what)));
    }
    Ok(())
}

fn missing_bucket(bucket: &str) -> AppError {
    AppError::StorageError(format!("Bucket '{}' does not exist", bucket))
}

/// Resolves the object name and payload for an upload.
fn prepare_object(
    data: Bytes,
    key: &str,
    mode: UploadMode,
    file_format: Option<&str>,
) -> Result<(String, Bytes), AppError> {
    require_non_blank(key, "Key")?;

    match mode {
        UploadMode::Raw => {
            let name = match file_format.map(normalise_format) {
                Some(format) if !format.is_empty() => format!("{}.{}", key, format),
                _ => key.to_string(),
            };
            Ok((name, data))
        }
        UploadMode::Parquet => {
            let format = file_format.ok_or_else(|| {
                AppError::InvalidInput("file_format is required for parquet mode".to_string())
            })?;
            Ok((format!("{}.parquet", key), to_parquet(&data, format)?))
        }
    }
}

async fn put_object(
    store: &dyn ObjectStore,
    bucket: &str,
    data: Bytes,
    key: &str,
    mode: UploadMode,
    file_format: Option<&str>,
) -> Result<String, AppError> {
    let (name, payload) = prepare_object(data, key, mode, file_format)?;
    let size = payload.len();

    store
        .put(&Path::from(name.as_str()), PutPayload::from(payload))
        .await?;

    info!("Uploaded {} to {} ({} bytes, {} mode)", name, bucket, size, mode);
    Ok(name)
}

// =============================================================================
// S3
// =============================================================================

/// Uploads to an S3 bucket.
///
/// Credentials and region come from the standard `AWS_*` environment variables.
pub struct S3Uploader {
    store: Arc<dyn ObjectStore>,
    bucket: String,
}

impl S3Uploader {
    /// Connects to `bucket` and checks that it exists.
    pub async fn connect(bucket: &str) -> Result<Self, AppError> {
        require_non_blank(bucket, "Bucket name")?;
        let store = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .build()?;
        Self::with_store(Arc::new(store), bucket).await
    }

    /// Wraps an existing store, e.g. an in-memory one in tests.
    pub async fn with_store(store: Arc<dyn ObjectStore>, bucket: &str) -> Result<Self, AppError> {
        require_non_blank(bucket, "Bucket name")?;
        let uploader = Self {
            store,
            bucket: bucket.to_string(),
        };
        uploader.verify_bucket().await?;
        Ok(uploader)
    }

    async fn verify_bucket(&self) -> Result<(), AppError> {
        match self.store.list_with_delimiter(None).await {
            Ok(_) => Ok(()),
            Err(object_store::Error::NotFound { .. }) => Err(missing_bucket(&self.bucket)),
            Err(e) if e.to_string().contains("NoSuchBucket") => Err(missing_bucket(&self.bucket)),
            Err(e) => Err(e.into()),
        }
    }
}

impl StorageTrait for S3Uploader {
    async fn upload(
        &self,
        data: Bytes,
        key: &str,
        mode: UploadMode,
        file_format: Option<&str>,
    ) -> Result<String, AppError> {
        put_object(self.store.as_ref(), &self.bucket, data, key, mode, file_format).await
    }
}

// =============================================================================
// Local directory
// =============================================================================

/// Uploads into an existing local directory.
pub struct LocalUploader {
    store: LocalFileSystem,
    root: PathBuf,
}

impl LocalUploader {
    pub fn new(dir: impl AsRef<FsPath>) -> Result<Self, AppError> {
        let root = dir.as_ref().to_path_buf();
        require_non_blank(&root.to_string_lossy(), "Bucket name")?;
        if !root.is_dir() {
            return Err(missing_bucket(&root.to_string_lossy()));
        }
        let store = LocalFileSystem::new_with_prefix(&root)?;
        Ok(Self { store, root })
    }

    pub fn root(&self) -> &FsPath {
        &self.root
    }
}

impl StorageTrait for LocalUploader {
    async fn upload(
        &self,
        data: Bytes,
        key: &str,
        mode: UploadMode,
        file_format: Option<&str>,
    ) -> Result<String, AppError> {
        let bucket = self.root.to_string_lossy();
        put_object(&self.store, &bucket, data, key, mode, file_format).await
    }
}

// =============================================================================
// Enum dispatch
// =============================================================================

/// Runtime-selected storage backend.
pub enum StorageEnum {
    S3(S3Uploader),
    Local(LocalUploader),
}

impl StorageEnum {
    /// Opens the backend for `storage_type`. For local storage `bucket` is a directory.
    pub async fn connect(storage_type: StorageType, bucket: &str) -> Result<Self, AppError> {
        match storage_type {
            StorageType::S3 => S3Uploader::connect(bucket).await.map(Self::S3),
            StorageType::Local => LocalUploader::new(bucket).map(Self::Local),
        }
    }
}

impl StorageTrait for StorageEnum {
    async fn upload(
        &self,
        data: Bytes,
        key: &str,
        mode: UploadMode,
        file_format: Option<&str>,
    ) -> Result<String, AppError> {
        match self {
            Self::S3(s) => s.upload(data, key, mode, file_format).await,
            Self::Local(l) => l.upload(data, key, mode, file_format).await,
        }
    }
}
