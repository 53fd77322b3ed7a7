//! Resource validation and selection.
//!
//! Each platform describes its downloadable files differently. The functions
//! here check what an explorer returned and pick the single resource a
//! loader should fetch, returning it as a [`ValidatedResource`].

use tracing::{error, info};

use crate::error::AppError;
use crate::models::{CkanResourceRef, ExportOption, FrenchResource, ValidatedResource};

/// Format groups accepted by the OpenDataSoft loader.
pub const OPENDATASOFT_FORMATS: &[(&str, &[&str])] = &[
    ("spreadsheet", &["xls", "xlsx"]),
    ("csv", &["csv"]),
    ("parquet", &["parquet"]),
    ("geopackage", &["gpkg", "geopackage"]),
];

/// Format groups accepted by the data.gouv.fr loader.
pub const FRENCH_GOUV_FORMATS: &[(&str, &[&str])] = &[
    ("xls", &["xls"]),
    ("xlsx", &["xlsx"]),
    ("csv", &["csv"]),
    ("parquet", &["parquet"]),
    ("geopackage", &["gpkg", "geopackage"]),
];

const SUPPORTED_FORMATS_HINT: &str = "csv, parquet, xls, xlsx, geopackage";

/// Expands a requested format into the concrete formats it stands for.
///
/// Returns `None` when the format is neither a group name nor a member of one.
fn expand_format(groups: &[(&str, &[&str])], format_type: &str) -> Option<Vec<String>> {
    if let Some((_, members)) = groups.iter().find(|(name, _)| *name == format_type) {
        return Some(members.iter().map(|m| m.to_string()).collect());
    }
    groups
        .iter()
        .any(|(_, members)| members.contains(&format_type))
        .then(|| vec![format_type.to_string()])
}

fn lower(value: &Option<String>) -> String {
    value.as_deref().unwrap_or_default().to_lowercase()
}

/// Picks the CKAN resource to load.
///
/// With `desired_format`, the first resource whose format matches
/// case-insensitively wins. Without it, the first resource is used.
pub fn validate_ckan_resource(
    resources: &[CkanResourceRef],
    desired_format: Option<&str>,
) -> Result<ValidatedResource, AppError> {
    let Some(first) = resources.first() else {
        error!("Invalid resource data: must be a non-empty list");
        return Err(AppError::InvalidInput(
            "Resource data must be a non-empty list".to_string(),
        ));
    };

    let target = match desired_format {
        Some(wanted) => resources
            .iter()
            .find(|r| {
                r.format
                    .as_deref()
                    .is_some_and(|f| f.eq_ignore_ascii_case(wanted))
            })
            .ok_or_else(|| {
                let available: Vec<&str> = resources
                    .iter()
                    .map(|r| r.format.as_deref().unwrap_or("unknown"))
                    .collect();
                error!("No resource found with format: {}", wanted);
                AppError::InvalidInput(format!(
                    "No resource with format '{}' found. Available formats: {}",
                    wanted,
                    available.join(", ")
                ))
            })?,
        None => first,
    };

    let (Some(format), Some(url)) = (target.format.as_deref(), target.url.as_deref()) else {
        error!("Invalid resource: a format and a URL are required");
        return Err(AppError::InvalidInput(
            "Resource must contain a name, date, format and URL".to_string(),
        ));
    };

    if !(url.starts_with("http://") || url.starts_with("https://")) {
        error!("Invalid URL format: {}", url);
        return Err(AppError::InvalidInput("Invalid URL format".to_string()));
    }

    let resource = ValidatedResource {
        format: format.to_lowercase(),
        url: url.to_string(),
        title: target.name.clone(),
    };
    info!(
        "You're currently working with this resource [{}, {}]",
        resource.format, resource.url
    );
    Ok(resource)
}

/// Checks that at least one export option carries a format and a download URL.
pub fn validate_opendatasoft_resource(options: &[ExportOption]) -> Result<(), AppError> {
    if options.is_empty() {
        error!("Resource data must be a non-empty list");
        return Err(AppError::open_data_soft("No resource data provided"));
    }
    if !options
        .iter()
        .any(|o| o.format.is_some() && o.download_url.is_some())
    {
        error!("Resource data must contain entries with a format and a download_url");
        return Err(AppError::open_data_soft(
            "Invalid resource data format for OpenDataSoft",
        ));
    }
    Ok(())
}

/// Picks the OpenDataSoft export matching `format_type`.
///
/// `format_type` may be a group (`spreadsheet` matches xls and xlsx) or a
/// concrete format.
pub fn select_opendatasoft_export(
    options: &[ExportOption],
    format_type: &str,
) -> Result<ValidatedResource, AppError> {
    validate_opendatasoft_resource(options)?;

    let format_type = format_type.trim().to_lowercase();
    let valid = expand_format(OPENDATASOFT_FORMATS, &format_type).ok_or_else(|| {
        AppError::open_data_soft(format!(
            "Unsupported format: {}. Supported formats: {}",
            format_type, SUPPORTED_FORMATS_HINT
        ))
    })?;

    let matched = options.iter().find_map(|o| {
        let format = lower(&o.format);
        let url = o.download_url.as_deref().filter(|u| !u.is_empty())?;
        valid.contains(&format).then(|| (format, url.to_string()))
    });

    let Some((format, url)) = matched else {
        let available: Vec<&str> = options.iter().filter_map(|o| o.format.as_deref()).collect();
        return Err(AppError::open_data_soft(format!(
            "No resource found with format: {}. Available formats: {}",
            format_type,
            available.join(", ")
        )));
    };

    Ok(ValidatedResource {
        format,
        url,
        title: None,
    })
}

/// Checks that at least one resource carries a format and a URL.
pub fn validate_french_gouv_resource(resources: &[FrenchResource]) -> Result<(), AppError> {
    if resources.is_empty() {
        error!("Resource data must be a non-empty list");
        return Err(AppError::FrenchCatDataLoader(
            "No resource data provided".to_string(),
        ));
    }
    if !resources
        .iter()
        .any(|r| r.resource_format.is_some() && r.resource_url.is_some())
    {
        error!("Resource data must contain entries with resource_format and resource_url");
        return Err(AppError::FrenchCatDataLoader(
            "Invalid resource data format for French Government data".to_string(),
        ));
    }
    Ok(())
}

/// Picks the data.gouv.fr resource matching `format_type`.
///
/// The title falls back to "Unnamed Resource".
pub fn select_french_gouv_resource(
    resources: &[FrenchResource],
    format_type: &str,
) -> Result<ValidatedResource, AppError> {
    validate_french_gouv_resource(resources)?;

    let format_type = format_type.trim().to_lowercase();
    let valid = expand_format(FRENCH_GOUV_FORMATS, &format_type).ok_or_else(|| {
        AppError::FrenchCatDataLoader(format!(
            "Unsupported format: {}. Supported formats: {}",
            format_type, SUPPORTED_FORMATS_HINT
        ))
    })?;

    let Some(matched) = resources
        .iter()
        .find(|r| valid.contains(&lower(&r.resource_format)))
    else {
        let available: Vec<&str> = resources
            .iter()
            .filter_map(|r| r.resource_format.as_deref())
            .collect();
        return Err(AppError::FrenchCatDataLoader(format!(
            "No resource found with format: {}. Available formats: {}",
            format_type,
            available.join(", ")
        )));
    };

    let url = matched
        .resource_url
        .as_deref()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| AppError::FrenchCatDataLoader("Resource URL not found in data".to_string()))?;

    Ok(ValidatedResource {
        format: lower(&matched.resource_format),
        url: url.to_string(),
        title: Some(
            matched
                .resource_title
                .clone()
                .unwrap_or_else(|| "Unnamed Resource".to_string()),
        ),
    })
}

/// Nomis downloads are addressed by URL alone and always come back as xlsx.
pub fn validate_ons_nomis_resource(url: &str) -> Result<ValidatedResource, AppError> {
    if url.trim().is_empty() {
        error!("Resource data must be a non-empty URL string");
        return Err(AppError::InvalidInput(
            "Resource data must be a non-empty URL string".to_string(),
        ));
    }
    info!("Resource data validated");
    Ok(ValidatedResource {
        format: "xlsx".to_string(),
        url: url.trim().to_string(),
        title: None,
    })
}
