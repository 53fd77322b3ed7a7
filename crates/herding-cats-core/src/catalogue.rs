//! Built-in catalogues and the API paths each platform exposes.
//!
//! A [`Catalogue`] pairs a well-known open data portal with its platform
//! ([`CatalogueType`]) so sessions can pick the right explorer without the
//! user spelling out URLs.

use std::fmt;
use std::str::FromStr;

use url::Url;

use crate::config::CatalogueType;
use crate::error::AppError;

/// Well-known open data catalogues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Catalogue {
    // CKAN
    LondonDataStore,
    UkGov,
    Subak,
    HumanitarianDataStore,
    OpenAfrica,
    CanadaGov,
    // OpenDataSoft
    UkPowerNetworks,
    Infrabel,
    Paris,
    Toulouse,
    EliaBelgianEnergy,
    EdfEnergy,
    CadentGas,
    OreEnergy,
    // data.gouv.fr
    GouvFr,
    // ONS Nomis
    OnsNomis,
}

impl Catalogue {
    const ALL: [Catalogue; 16] = [
        Catalogue::LondonDataStore,
        Catalogue::UkGov,
        Catalogue::Subak,
        Catalogue::HumanitarianDataStore,
        Catalogue::OpenAfrica,
        Catalogue::CanadaGov,
        Catalogue::UkPowerNetworks,
        Catalogue::Infrabel,
        Catalogue::Paris,
        Catalogue::Toulouse,
        Catalogue::EliaBelgianEnergy,
        Catalogue::EdfEnergy,
        Catalogue::CadentGas,
        Catalogue::OreEnergy,
        Catalogue::GouvFr,
        Catalogue::OnsNomis,
    ];

    /// Every built-in catalogue, grouped by platform.
    pub fn all() -> &'static [Catalogue] {
        &Self::ALL
    }

    /// Upper snake case name, e.g. `UK_GOV`.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LondonDataStore => "LONDON_DATA_STORE",
            Self::UkGov => "UK_GOV",
            Self::Subak => "SUBAK",
            Self::HumanitarianDataStore => "HUMANITARIAN_DATA_STORE",
            Self::OpenAfrica => "OPEN_AFRICA",
            Self::CanadaGov => "CANADA_GOV",
            Self::UkPowerNetworks => "UK_POWER_NETWORKS",
            Self::Infrabel => "INFRABEL",
            Self::Paris => "PARIS",
            Self::Toulouse => "TOULOUSE",
            Self::EliaBelgianEnergy => "ELIA_BELGIAN_ENERGY",
            Self::EdfEnergy => "EDF_ENERGY",
            Self::CadentGas => "CADENT_GAS",
            Self::OreEnergy => "ORE_ENERGY",
            Self::GouvFr => "GOUV_FR",
            Self::OnsNomis => "ONS_NOMIS",
        }
    }

    /// Base URL of the catalogue, without a trailing slash.
    pub fn url(&self) -> &'static str {
        match self {
            Self::LondonDataStore => "https://data.london.gov.uk",
            Self::UkGov => "https://data.gov.uk",
            Self::Subak => "https://data.subak.org",
            Self::HumanitarianDataStore => "https://data.humdata.org",
            Self::OpenAfrica => "https://open.africa",
            Self::CanadaGov => "https://search.open.canada.ca/opendata",
            Self::UkPowerNetworks => "https://ukpowernetworks.opendatasoft.com",
            Self::Infrabel => "https://opendata.infrabel.be",
            Self::Paris => "https://opendata.paris.fr",
            Self::Toulouse => "https://data.toulouse-metropole.fr",
            Self::EliaBelgianEnergy => "https://opendata.elia.be",
            Self::EdfEnergy => "https://opendata.edf.fr",
            Self::CadentGas => "https://cadentgas.opendatasoft.com",
            Self::OreEnergy => "https://opendata.agenceore.fr",
            Self::GouvFr => "https://www.data.gouv.fr",
            Self::OnsNomis => "https://www.nomisweb.co.uk",
        }
    }

    pub fn catalogue_type(&self) -> CatalogueType {
        match self {
            Self::LondonDataStore
            | Self::UkGov
            | Self::Subak
            | Self::HumanitarianDataStore
            | Self::OpenAfrica
            | Self::CanadaGov => CatalogueType::Ckan,
            Self::UkPowerNetworks
            | Self::Infrabel
            | Self::Paris
            | Self::Toulouse
            | Self::EliaBelgianEnergy
            | Self::EdfEnergy
            | Self::CadentGas
            | Self::OreEnergy => CatalogueType::OpenDataSoft,
            Self::GouvFr => CatalogueType::FrenchGouv,
            Self::OnsNomis => CatalogueType::OnsNomis,
        }
    }

    /// Host part of the catalogue URL.
    pub fn domain(&self) -> &'static str {
        let url = self.url();
        let rest = url.trim_start_matches("https://");
        rest.split('/').next().unwrap_or(rest)
    }

    /// Looks up a catalogue by name.
    ///
    /// Matching ignores case and treats `_` as a space, so `"uk gov"`,
    /// `"UK_GOV"` and `"Uk Gov"` all resolve to [`Catalogue::UkGov`].
    pub fn from_name(name: &str) -> Option<Catalogue> {
        let wanted = normalise_name(name);
        Self::ALL
            .iter()
            .copied()
            .find(|c| normalise_name(c.name()) == wanted)
    }

    /// Looks up a catalogue by the host (and path prefix) of a URL.
    pub fn from_url(url: &Url) -> Option<Catalogue> {
        let host = url.host_str()?;
        Self::ALL.iter().copied().find(|c| {
            if !c.domain().eq_ignore_ascii_case(host) {
                return false;
            }
            // CANADA_GOV lives under a path on a shared host
            match c.url().split_once(c.domain()) {
                Some((_, prefix)) if !prefix.is_empty() => url.path().starts_with(prefix),
                _ => true,
            }
        })
    }
}

fn normalise_name(name: &str) -> String {
    name.trim().replace('_', " ").to_lowercase()
}

impl fmt::Display for Catalogue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Catalogue {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| {
            AppError::CatSession(format!("Unknown catalogue name: '{}'", s))
        })
    }
}

// =============================================================================
// API paths
// =============================================================================

/// CKAN action API, relative to the catalogue base URL.
pub mod ckan {
    pub const SITE_READ: &str = "api/3/action/site_read";
    pub const PACKAGE_LIST: &str = "api/3/action/package_list";
    pub const PACKAGE_SEARCH: &str = "api/3/action/package_search";
    pub const PACKAGE_SHOW: &str = "api/3/action/package_show";
    pub const CURRENT_PACKAGE_LIST_WITH_RESOURCES: &str =
        "api/3/action/current_package_list_with_resources";
    pub const ORGANIZATION_LIST: &str = "api/3/action/organization_list";
}

/// OpenDataSoft catalog API. The explore v2.0 path is the fallback for
/// portals that no longer serve the older v2 catalog.
pub mod opendatasoft {
    pub const DATASETS: &str = "api/v2/catalog/datasets";
    pub const DATASETS_ALT: &str = "api/explore/v2.0/catalog/datasets";

    /// Page size used when walking the catalog.
    pub const PAGE_LIMIT: usize = 100;

    pub fn dataset(base: &str, id: &str) -> String {
        format!("{}/{}", base, id)
    }

    pub fn dataset_exports(base: &str, id: &str) -> String {
        format!("{}/{}/exports", base, id)
    }
}

/// data.gouv.fr REST API.
pub mod french_gouv {
    pub const DATASETS: &str = "api/1/datasets";

    /// Daily parquet export of the whole data.gouv.fr catalogue.
    pub const CATALOGUE_PARQUET: &str = "https://object.files.data.gouv.fr/hydra-parquet/hydra-parquet/b06842f8ee27a0302ebbaaa344d35e4c.parquet";

    pub fn dataset(id: &str) -> String {
        format!("{}/{}/", DATASETS, id)
    }

    pub fn dataset_resources(id: &str) -> String {
        format!("{}/{}/resources/", DATASETS, id)
    }
}

/// ONS Nomis v01 API.
pub mod nomis {
    pub const DATASETS: &str = "api/v01/dataset/def.sdmx.json";

    pub fn dataset_definition(id: &str) -> String {
        format!("api/v01/dataset/{}/def.sdmx.json", id)
    }

    pub fn dataset_overview(id: &str) -> String {
        format!("api/v01/dataset/{}.overview.json", id)
    }

    pub fn dataset_download(id: &str) -> String {
        format!("api/v01/dataset/{}.data.xlsx", id)
    }

    pub fn codelist(id: &str) -> String {
        format!("api/v01/codelist/{}.def.sdmx.json", id)
    }
}
