//! Explorer for CKAN catalogues.
//!
//! Wraps the CKAN action API (`/api/3/action/*`) and reshapes its responses
//! into the records defined in `herding_cats_core::models`.
//!
//! CKAN API reference: <https://docs.ckan.org/en/2.11/api/>

use std::collections::BTreeMap;

use arrow::record_batch::RecordBatch;
use herding_cats_core::catalogue::ckan as paths;
use herding_cats_core::config::CatalogueType;
use herding_cats_core::error::AppError;
use herding_cats_core::frame::{Frame, FrameKind, records_to_frame};
use herding_cats_core::models::{
    CkanResourceRef, CondensedPackage, CondensedResourceRow, PackageExtra, ResourceRow,
    null_as_empty,
};
use herding_cats_core::sql::{FRESHNESS_QUERY, FRESHNESS_TABLE, explore_packages};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::session::CatSession;

/// Generic wrapper for CKAN API responses.
///
/// CKAN always returns responses with the structure:
/// ```json
/// {
///     "success": bool,
///     "result": T
/// }
/// ```
#[derive(Deserialize, Debug)]
struct CkanResponse<T> {
    success: bool,
    result: T,
}

/// Package as returned by `package_show` and `package_search`.
#[derive(Deserialize, Debug, Default)]
struct CkanPackage {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    notes_markdown: Option<String>,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    num_resources: Option<usize>,
    #[serde(default, deserialize_with = "null_as_empty")]
    resources: Vec<CkanResource>,
}

impl CkanPackage {
    /// Some portals only fill `notes`.
    fn notes_markdown(&self) -> Option<String> {
        self.notes_markdown.clone().or_else(|| self.notes.clone())
    }
}

#[derive(Deserialize, Debug, Default)]
struct CkanResource {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    format: Option<String>,
    #[serde(default)]
    created: Option<String>,
    #[serde(default)]
    last_modified: Option<String>,
}

#[derive(Serialize)]
struct PackageNameRow<'a> {
    package_name: &'a str,
}

/// Explorer for CKAN portals such as data.london.gov.uk or data.gov.uk.
///
/// # Examples
///
/// ```no_run
/// use herding_cats_client::{CatSession, CkanCatExplorer};
/// use herding_cats_core::Catalogue;
///
/// # async fn example() -> Result<(), herding_cats_core::AppError> {
/// let session = CatSession::connect(Catalogue::LondonDataStore).await?;
/// let explorer = CkanCatExplorer::new(&session)?;
/// let info = explorer.package_show_info("violence-reduction-unit").await?;
/// let resources = CkanCatExplorer::extract_resource_url(&info);
/// println!("{} resources", resources.len());
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct CkanCatExplorer {
    session: CatSession,
}

impl CkanCatExplorer {
    /// Creates an explorer over `session`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::WrongCatalogue` if the session is known to point at
    /// a non-CKAN catalogue.
    pub fn new(session: &CatSession) -> Result<Self, AppError> {
        session.ensure_catalogue(CatalogueType::Ckan)?;
        Ok(Self {
            session: session.clone(),
        })
    }

    pub fn session(&self) -> &CatSession {
        &self.session
    }

    /// GETs a CKAN action and unwraps its `result`.
    async fn get_result<T: DeserializeOwned>(&self, url: &Url, context: &str) -> Result<T, AppError> {
        let resp: CkanResponse<T> = self.session.http().get_json(url).await.map_err(|e| {
            error!("{}: {}", context, e);
            AppError::CatExplorer(format!("{}: {}", context, e))
        })?;

        if !resp.success {
            return Err(AppError::CatExplorer(format!(
                "{}: CKAN API returned success: false",
                context
            )));
        }
        Ok(resp.result)
    }

    // =========================================================================
    // Health and package lists
    // =========================================================================

    /// Calls `site_read` and reports whether CKAN is up.
    pub async fn check_site_health(&self) -> Result<bool, AppError> {
        let url = self.session.url_for(paths::SITE_READ)?;
        let resp: CkanResponse<Value> = self.session.http().get_json(&url).await.map_err(|e| {
            error!("Health check request failed: {}", e);
            AppError::CatExplorer(format!("Health check failed: {}", e))
        })?;

        if resp.success {
            info!("Health Check Passed: CKAN is running and available");
        } else {
            error!("Health Check Failed: Something went wrong and CKAN is currently not available");
        }
        Ok(resp.success)
    }

    async fn package_list(&self) -> Result<Vec<String>, AppError> {
        let url = self.session.url_for(paths::PACKAGE_LIST)?;
        self.get_result(&url, "Failed to get package list").await
    }

    /// Number of packages in the catalogue.
    pub async fn get_package_count(&self) -> Result<usize, AppError> {
        Ok(self.package_list().await?.len())
    }

    /// Every package name, keyed by itself.
    pub async fn package_list_dictionary(&self) -> Result<BTreeMap<String, String>, AppError> {
        let names = self.package_list().await?;
        Ok(names.into_iter().map(|n| (n.clone(), n)).collect())
    }

    /// Every package name as a one-column frame (`package_name`).
    pub async fn package_list_dataframe(&self, kind: FrameKind) -> Result<Frame, AppError> {
        let names = self.package_list().await?;
        let rows: Vec<PackageNameRow<'_>> = names
            .iter()
            .map(|n| PackageNameRow { package_name: n })
            .collect();
        records_to_frame(&rows, kind)
    }

    /// Every package with owner, maintainer, timestamps, resources and groups.
    pub async fn package_list_dictionary_extra(&self) -> Result<Vec<PackageExtra>, AppError> {
        let url = self.session.url_for(paths::CURRENT_PACKAGE_LIST_WITH_RESOURCES)?;
        self.get_result(&url, "Failed to list packages with resources")
            .await
    }

    /// How much of the catalogue changed in the last six months.
    ///
    /// Returns a single row with `total_packages`, `total_resources`,
    /// `updated_packages_last_6_months` and
    /// `percentage_updated_packages_last_6_months`.
    pub async fn catalogue_freshness(&self) -> Result<RecordBatch, AppError> {
        warn!("This method might not work for all catalogues, and will return 0s");
        let packages = self.package_list_dictionary_extra().await?;
        explore_packages(&packages, FRESHNESS_TABLE, FRESHNESS_QUERY).await
    }

    // =========================================================================
    // Package metadata and search
    // =========================================================================

    /// Metadata for one package, one row per resource.
    pub async fn package_show_info(&self, package_name: &str) -> Result<Vec<ResourceRow>, AppError> {
        if package_name.trim().is_empty() {
            return Err(AppError::InvalidInput(
                "package name cannot be empty".to_string(),
            ));
        }

        let mut url = self.session.url_for(paths::PACKAGE_SHOW)?;
        url.query_pairs_mut().append_pair("id", package_name);

        let package: CkanPackage = self
            .get_result(&url, &format!("Failed to show package '{}'", package_name))
            .await?;

        let name = package.name.clone().unwrap_or_else(|| package_name.to_string());
        let notes = package.notes_markdown();
        Ok(package
            .resources
            .into_iter()
            .map(|r| ResourceRow {
                name: name.clone(),
                notes_markdown: notes.clone(),
                resource_url: r.url,
                resource_name: r.name,
                resource_format: r.format,
                resource_created: r.created,
                resource_last_modified: r.last_modified,
            })
            .collect())
    }

    fn search_url(&self, query: &str, rows: usize) -> Result<Url, AppError> {
        let mut url = self.session.url_for(paths::PACKAGE_SEARCH)?;
        if !query.is_empty() {
            url.query_pairs_mut()
                .append_pair("q", query)
                .append_pair("rows", &rows.to_string());
        }
        Ok(url)
    }

    /// Raw `package_search` result object.
    ///
    /// `q` and `rows` are only sent when `query` is non-empty.
    pub async fn package_search_json(&self, query: &str, rows: usize) -> Result<Value, AppError> {
        let url = self.search_url(query, rows)?;
        self.get_result(&url, "Failed to search datasets").await
    }

    /// Search hits reduced to name, notes and resource links.
    pub async fn package_search_condense(
        &self,
        query: &str,
        rows: usize,
    ) -> Result<Vec<CondensedPackage>, AppError> {
        let result = self.package_search_json(query, rows).await?;

        let hits = result
            .get("results")
            .or_else(|| result.get("result"))
            .cloned()
            .ok_or_else(|| {
                AppError::CatExplorer(
                    "Neither 'result' nor 'results' key found in the API response".to_string(),
                )
            })?;
        let packages: Vec<CkanPackage> = serde_json::from_value(hits).map_err(|e| {
            AppError::CatExplorer(format!("Failed to parse package search results: {}", e))
        })?;

        Ok(packages.into_iter().map(condense).collect())
    }

    /// Condensed search hits as a frame, resources kept as a nested column.
    pub async fn package_search_condense_dataframe_packed(
        &self,
        query: &str,
        rows: usize,
        kind: FrameKind,
    ) -> Result<Frame, AppError> {
        let packages = self.package_search_condense(query, rows).await?;
        records_to_frame(&packages, kind)
    }

    /// Condensed search hits as a frame with one row per resource.
    pub async fn package_search_condense_dataframe_unpacked(
        &self,
        query: &str,
        rows: usize,
        kind: FrameKind,
    ) -> Result<Frame, AppError> {
        let packages = self.package_search_condense(query, rows).await?;
        let rows: Vec<CondensedResourceRow> =
            packages.iter().flat_map(CondensedPackage::unpack).collect();
        records_to_frame(&rows, kind)
    }

    // =========================================================================
    // Resource extraction
    // =========================================================================

    /// Loader input for every resource of a package.
    pub fn extract_resource_url(package_info: &[ResourceRow]) -> Vec<CkanResourceRef> {
        package_info
            .iter()
            .map(|row| CkanResourceRef {
                name: row.resource_name.clone(),
                created: row.resource_created.clone(),
                format: row.resource_format.clone(),
                url: row.resource_url.clone(),
            })
            .collect()
    }

    /// `[format, url]` of the resource called `resource_name`.
    ///
    /// Returns `None` if no resource has that name or it lacks a format or URL.
    pub fn find_resource_url(package_info: &[ResourceRow], resource_name: &str) -> Option<[String; 2]> {
        let row = package_info
            .iter()
            .find(|r| r.resource_name.as_deref() == Some(resource_name))?;

        match (row.resource_format.as_deref(), row.resource_url.as_deref()) {
            (Some(format), Some(url)) if !format.is_empty() && !url.is_empty() => {
                info!("Found URL for resource '{}'. Format is: {}", resource_name, format);
                Some([format.to_string(), url.to_string()])
            }
            _ => {
                warn!(
                    "Resource '{}' found in package, but no URL available",
                    resource_name
                );
                None
            }
        }
    }

    // =========================================================================
    // Organisations
    // =========================================================================

    /// Number of organisations and their names.
    pub async fn get_organisation_list(&self) -> Result<(usize, Vec<String>), AppError> {
        let url = self.session.url_for(paths::ORGANIZATION_LIST)?;
        let names: Vec<String> = self
            .get_result(&url, "Failed to get organisation list")
            .await?;
        Ok((names.len(), names))
    }
}

fn condense(package: CkanPackage) -> CondensedPackage {
    let notes_markdown = package.notes_markdown();
    let resources: Vec<CkanResourceRef> = package
        .resources
        .into_iter()
        .map(|r| CkanResourceRef {
            name: r.name,
            created: r.created,
            format: r.format,
            url: r.url,
        })
        .collect();

    CondensedPackage {
        name: package.name.unwrap_or_default(),
        notes_markdown,
        num_resources: package.num_resources.unwrap_or(resources.len()),
        resources,
    }
}
