//! Record types produced by explorers and consumed by loaders.
//!
//! Explorers reshape raw platform JSON into these structs. Loaders take
//! slices of them, validate the entries and pick one resource to download.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Reads a JSON list, treating `null` like a missing field.
///
/// Use with `#[serde(default, deserialize_with = "null_as_empty")]`.
pub fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

/// A downloadable CKAN resource reduced to what a loader needs.
///
/// Produced by `CkanCatExplorer::extract_resource_url`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CkanResourceRef {
    pub name: Option<String>,
    pub created: Option<String>,
    pub format: Option<String>,
    pub url: Option<String>,
}

/// One row of `package_show` output: package fields repeated per resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResourceRow {
    pub name: String,
    pub notes_markdown: Option<String>,
    pub resource_url: Option<String>,
    pub resource_name: Option<String>,
    pub resource_format: Option<String>,
    pub resource_created: Option<String>,
    pub resource_last_modified: Option<String>,
}

/// A package search hit with only the fields worth showing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CondensedPackage {
    pub name: String,
    pub notes_markdown: Option<String>,
    pub num_resources: usize,
    pub resources: Vec<CkanResourceRef>,
}

/// A [`CondensedPackage`] exploded to one row per resource.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CondensedResourceRow {
    pub name: String,
    pub notes_markdown: Option<String>,
    pub resource_name: Option<String>,
    pub resource_created: Option<String>,
    pub resource_format: Option<String>,
    pub resource_url: Option<String>,
}

impl CondensedPackage {
    /// Explodes the package into one row per resource. Packages without
    /// resources yield nothing.
    pub fn unpack(&self) -> Vec<CondensedResourceRow> {
        self.resources
            .iter()
            .map(|r| CondensedResourceRow {
                name: self.name.clone(),
                notes_markdown: self.notes_markdown.clone(),
                resource_name: r.name.clone(),
                resource_created: r.created.clone(),
                resource_format: r.format.clone(),
                resource_url: r.url.clone(),
            })
            .collect()
    }
}

/// Catalogue-wide package summary from `current_package_list_with_resources`.
///
/// `resources` and `groups` stay as raw JSON; they are flattened only when
/// the list is turned into a SQL table.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PackageExtra {
    pub owner_org: Option<String>,
    pub name: String,
    pub title: Option<String>,
    pub maintainer: Option<String>,
    pub metadata_created: Option<String>,
    pub metadata_modified: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub resources: Vec<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub groups: Vec<Value>,
}

/// An OpenDataSoft export link: the format name and where to fetch it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExportOption {
    pub format: Option<String>,
    pub download_url: Option<String>,
}

impl ExportOption {
    pub fn new(format: impl Into<String>, download_url: impl Into<String>) -> Self {
        Self {
            format: Some(format.into()),
            download_url: Some(download_url.into()),
        }
    }
}

/// A data.gouv.fr resource flattened with its parent dataset.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrenchResource {
    pub resource_id: Option<String>,
    pub resource_title: Option<String>,
    pub resource_format: Option<String>,
    pub resource_url: Option<String>,
    pub resource_created: Option<String>,
    pub resource_last_modified: Option<String>,
    pub resource_filesize: Option<u64>,
    pub dataset_id: Option<String>,
    pub dataset_title: Option<String>,
}

/// A Nomis dataset key family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NomisDataset {
    pub id: String,
    pub name: String,
}

/// A Nomis dataset dimension and the codelist describing its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NomisDimension {
    pub concept: String,
    pub codelist: String,
}

/// A resource that passed validation and is ready to download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedResource {
    /// Lowercased format, e.g. `csv` or `xlsx`.
    pub format: String,
    pub url: String,
    pub title: Option<String>,
}
