//! HerdingCats Core - Domain types, resource parsing, and storage.
//!
//! This crate holds everything that does not talk HTTP:
//!
//! - **Catalogues**: [`Catalogue`] lists the built-in open data portals and their API paths
//! - **Domain models**: [`CondensedPackage`], [`PackageExtra`], [`FrenchResource`], etc.
//! - **Frames**: [`Frame`] wraps an Arrow batch or a polars frame, built from JSON records
//! - **Formats**: [`create_dataframe`] parses csv, json, parquet and Excel bytes
//! - **SQL**: [`SqlSession`] runs DataFusion queries over loaded resources
//! - **Validation**: per-platform resource selection, e.g. [`validate_ckan_resource`]
//! - **Storage**: [`StorageTrait`] uploads to S3 or a local directory
//!
//! # Architecture
//!
//! The HTTP side lives in `herding-cats-client`. Its explorers return the
//! models defined here and its loaders hand downloaded bytes to
//! [`formats`], [`sql`] and [`storage`].
//!
//! # Example
//!
//! ```ignore
//! use herding_cats_core::{FrameKind, LoadOptions, create_dataframe};
//!
//! let frame = create_dataframe(&bytes, "csv", FrameKind::Arrow, &LoadOptions::default())?;
//! println!("{}", frame);
//! ```

pub mod catalogue;
pub mod config;
pub mod error;
pub mod formats;
pub mod frame;
pub mod models;
pub mod sql;
pub mod storage;
pub mod validate;

// Catalogues
pub use catalogue::Catalogue;

// Configuration
pub use config::{
    CatalogueEntry, CatalogueType, CataloguesConfig, HttpConfig, default_config_path,
    load_catalogues_config,
};

// Error handling
pub use error::AppError;

// Domain models
pub use models::{
    CkanResourceRef, CondensedPackage, CondensedResourceRow, ExportOption, FrenchResource,
    NomisDataset, NomisDimension, PackageExtra, ResourceRow, ValidatedResource,
};

// Frames and formats
pub use formats::{LoadOptions, create_dataframe, get_sheet_names, to_parquet};
pub use frame::{Frame, FrameKind, records_to_frame, values_to_frame};

// SQL
pub use sql::{FRESHNESS_QUERY, FRESHNESS_TABLE, SqlSession, explore_packages, flatten_packages};

// Storage
pub use storage::{LocalUploader, S3Uploader, StorageEnum, StorageTrait, StorageType, UploadMode};

// Validation
pub use validate::{
    select_french_gouv_resource, select_opendatasoft_export, validate_ckan_resource,
    validate_french_gouv_resource, validate_ons_nomis_resource, validate_opendatasoft_resource,
};
