//! Configuration types for HerdingCats components.
//!
//! Two layers are covered here: the HTTP policy used by every explorer and
//! loader, and the optional `catalogues.toml` file that lets users name their
//! own catalogues next to the built-in ones.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

/// HTTP client configuration for catalogue API calls.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    /// Timeout for the reachability probe run when a session is opened.
    pub validation_timeout: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 3,
            retry_base_delay: Duration::from_millis(500),
            validation_timeout: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// Catalogue Configuration (catalogues.toml)
// =============================================================================

/// Catalogue platform identifier.
///
/// Determines which explorer and loader family can talk to a catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogueType {
    /// CKAN open data portal (default).
    #[default]
    Ckan,
    /// OpenDataSoft portal (explore API v2).
    OpenDataSoft,
    /// French government catalogue, data.gouv.fr.
    FrenchGouv,
    /// UK Office for National Statistics Nomis API.
    OnsNomis,
}

impl fmt::Display for CatalogueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ckan => write!(f, "ckan"),
            Self::OpenDataSoft => write!(f, "opendatasoft"),
            Self::FrenchGouv => write!(f, "frenchgouv"),
            Self::OnsNomis => write!(f, "onsnomis"),
        }
    }
}

impl FromStr for CatalogueType {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ckan" => Ok(Self::Ckan),
            "opendatasoft" | "ods" => Ok(Self::OpenDataSoft),
            "frenchgouv" | "french" => Ok(Self::FrenchGouv),
            "onsnomis" | "nomis" => Ok(Self::OnsNomis),
            _ => Err(AppError::ConfigError(format!(
                "Unknown catalogue type: '{}'. Valid options: ckan, opendatasoft, frenchgouv, onsnomis",
                s
            ))),
        }
    }
}

fn default_enabled() -> bool {
    true
}

/// Root configuration structure for catalogues.toml.
///
/// # Example
///
/// ```toml
/// [[catalogues]]
/// name = "bristol"
/// url = "https://opendata.bristol.gov.uk"
/// type = "opendatasoft"
/// description = "Bristol City Council open data"
///
/// [[catalogues]]
/// name = "leeds"
/// url = "https://datamillnorth.org"
/// enabled = false
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CataloguesConfig {
    pub catalogues: Vec<CatalogueEntry>,
}

impl CataloguesConfig {
    /// Returns only enabled catalogues.
    pub fn enabled_catalogues(&self) -> Vec<&CatalogueEntry> {
        self.catalogues.iter().filter(|c| c.enabled).collect()
    }

    /// Find a catalogue by name (case-insensitive).
    pub fn find_by_name(&self, name: &str) -> Option<&CatalogueEntry> {
        self.catalogues
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }
}

/// A single user-defined catalogue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogueEntry {
    /// Name used for `--catalogue <name>` lookup.
    pub name: String,

    /// Base URL of the catalogue, e.g. "<https://data.london.gov.uk>".
    pub url: String,

    /// Platform type. Defaults to `Ckan` if not specified.
    #[serde(rename = "type", default)]
    pub catalogue_type: CatalogueType,

    /// Defaults to `true` if not specified.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    pub description: Option<String>,
}

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = "catalogues.toml";

/// Returns the default configuration directory path: `~/.config/herding-cats/`
pub fn default_config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("herding-cats"))
}

/// Returns the default configuration file path: `~/.config/herding-cats/catalogues.toml`
pub fn default_config_path() -> Option<PathBuf> {
    default_config_dir().map(|p| p.join(CONFIG_FILE_NAME))
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# HerdingCats catalogue configuration
#
# Built-in catalogues (UK_GOV, PARIS, GOUV_FR, ONS_NOMIS, ...) are always
# available. Entries here add your own catalogues by name:
#
#   herding-cats health --catalogue bristol
#   herding-cats ods datasets --catalogue bristol
#
# type is one of: ckan, opendatasoft, frenchgouv, onsnomis
# Set enabled = false to hide an entry without deleting it.

# Bristol open data (OpenDataSoft)
[[catalogues]]
name = "bristol"
url = "https://opendata.bristol.gov.uk"
type = "opendatasoft"
description = "Bristol City Council open data"

# NHS England open data (CKAN)
[[catalogues]]
name = "nhs-england"
url = "https://data.england.nhs.uk"
type = "ckan"
description = "NHS England CKAN portal"
"#;

/// Load catalogue configuration from a TOML file.
///
/// # Returns
/// * `Ok(Some(config))` - Configuration loaded successfully
/// * `Ok(None)` - No configuration file and none could be created
/// * `Err(e)` - A custom path is missing, or the file exists but is invalid
///
/// When the default path has no file yet, a commented template is written there first.
pub fn load_catalogues_config(path: Option<PathBuf>) -> Result<Option<CataloguesConfig>, AppError> {
    let using_default_path = path.is_none();
    let config_path = match path {
        Some(p) => p,
        None => match default_config_path() {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    if !config_path.exists() {
        if using_default_path {
            if let Err(e) = create_default_config(&config_path) {
                tracing::warn!("Could not create default config template: {}", e);
                return Ok(None);
            }
        } else {
            return Err(AppError::ConfigError(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }
    }

    let content = std::fs::read_to_string(&config_path).map_err(|e| {
        AppError::ConfigError(format!(
            "Failed to read config file '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    let config: CataloguesConfig = toml::from_str(&content).map_err(|e| {
        AppError::ConfigError(format!(
            "Invalid TOML in '{}': {}",
            config_path.display(),
            e
        ))
    })?;

    Ok(Some(config))
}

fn create_default_config(path: &Path) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, DEFAULT_CONFIG_TEMPLATE)?;
    tracing::info!("Created default config template at: {}", path.display());

    Ok(())
}
