use clap::{Args, Parser, Subcommand, ValueEnum};
use herding_cats_core::{StorageType, UploadMode};
use std::path::PathBuf;
use std::sync::LazyLock;

static VERSION_INFO: LazyLock<String> = LazyLock::new(|| {
    let version = env!("CARGO_PKG_VERSION");

    let commit = option_env!("VERGEN_GIT_SHA")
        .map(|s| s.chars().take(7).collect::<String>())
        .unwrap_or_else(|| "unknown".to_string());

    let built = option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown");
    let target = option_env!("VERGEN_CARGO_TARGET_TRIPLE").unwrap_or("unknown");
    let rustc = option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown");

    format!("{version}\ncommit: {commit}\nbuilt: {built}\ntarget: {target}\nrustc: {rustc}")
});

pub fn version_info() -> &'static str {
    &VERSION_INFO
}

/// CLI configuration parsed from command line arguments and environment variables
#[derive(Parser, Debug)]
#[command(name = "herding-cats")]
#[command(
    author,
    version = version_info(),
    about = "Explore and load data from open data catalogues"
)]
#[command(after_help = "Examples:
  herding-cats catalogues
  herding-cats ckan -c LONDON_DATA_STORE search police --rows 5
  herding-cats ods -c UK_POWER_NETWORKS exports ukpn-flexibility-tender-sites
  herding-cats nomis url NM_1_1 --geography 2092957697
  herding-cats load https://data.london.gov.uk/download/x/y.csv --format csv --query \"SELECT * FROM data LIMIT 5\"

Catalogues are given by built-in name, by a name from catalogues.toml, or by URL.")]
pub struct Config {
    /// Path to catalogues.toml (defaults to ~/.config/herding-cats/catalogues.toml)
    #[arg(long, global = true, env = "HERDING_CATS_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List built-in catalogues and those from catalogues.toml
    Catalogues,
    /// Check that a catalogue answers
    #[command(after_help = "Example: herding-cats health PARIS")]
    Health {
        /// Catalogue name or URL
        catalogue: String,
    },
    /// Explore a CKAN catalogue
    Ckan {
        /// Catalogue name or URL
        #[arg(short, long, default_value = "LONDON_DATA_STORE")]
        catalogue: String,
        #[command(subcommand)]
        command: CkanCommand,
    },
    /// Explore an OpenDataSoft catalogue
    Ods {
        /// Catalogue name or URL
        #[arg(short, long, default_value = "UK_POWER_NETWORKS")]
        catalogue: String,
        #[command(subcommand)]
        command: OdsCommand,
    },
    /// Explore data.gouv.fr
    French {
        #[command(subcommand)]
        command: FrenchCommand,
    },
    /// Explore ONS Nomis
    Nomis {
        #[command(subcommand)]
        command: NomisCommand,
    },
    /// Download a resource and print it, query it or write it as parquet
    #[command(after_help = "Examples:
  herding-cats load https://example.org/data.xlsx --format xlsx --sheet Summary --skip-rows 2
  herding-cats load https://example.org/data.csv --format csv --output data.parquet
  herding-cats load https://example.org/data.csv --format csv --query \"SELECT COUNT(*) FROM data\"")]
    Load {
        #[command(flatten)]
        resource: ResourceArgs,

        /// Sheet to read from a spreadsheet
        #[arg(long)]
        sheet: Option<String>,

        /// Rows to skip above the header row
        #[arg(long, default_value = "0")]
        skip_rows: usize,

        /// SQL to run over the resource, registered as table `data`
        #[arg(short, long)]
        query: Option<String>,

        /// Write the result as parquet instead of printing it
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Rows to print
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
    /// Download a resource and store it in S3 or a local directory
    #[command(after_help = "Examples:
  herding-cats upload https://example.org/data.csv --format csv --bucket my-bucket --name london-crime
  herding-cats upload https://example.org/data.xlsx --format xlsx --bucket ./out --name budget --storage local --mode parquet

S3 credentials come from AWS_ACCESS_KEY_ID, AWS_SECRET_ACCESS_KEY and AWS_REGION.")]
    Upload {
        #[command(flatten)]
        resource: ResourceArgs,

        /// S3 bucket, or a directory for local storage
        #[arg(short, long)]
        bucket: String,

        /// Object name; a unique suffix and extension are appended
        #[arg(short, long)]
        name: String,

        /// Store the raw file or convert it to parquet first
        #[arg(short, long, default_value = "raw")]
        mode: ModeArg,

        /// Storage backend
        #[arg(short, long, default_value = "s3")]
        storage: StorageArg,
    },
}

/// A resource given directly by URL.
#[derive(Args, Debug)]
pub struct ResourceArgs {
    /// Resource URL
    pub url: String,

    /// Resource format: csv, json, parquet, xls or xlsx
    #[arg(short, long)]
    pub format: String,

    /// OpenDataSoft API key, appended to the download URL
    #[arg(long, env = "ODS_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum CkanCommand {
    /// Number of packages in the catalogue
    Count,
    /// Package names
    List,
    /// Packages with their resources and groups
    Extra,
    /// Freshness report for every package
    Freshness,
    /// Resources of one package
    Show {
        package: String,
    },
    /// Search packages
    #[command(after_help = "Example: herding-cats ckan search \"police\" --rows 10 --unpacked")]
    Search {
        /// Search terms; empty returns the first packages
        #[arg(default_value = "")]
        query: String,
        #[arg(short, long, default_value = "10")]
        rows: usize,
        /// One row per resource instead of per package
        #[arg(long)]
        unpacked: bool,
    },
    /// Organisations publishing in the catalogue
    Orgs,
}

#[derive(Subcommand, Debug)]
pub enum OdsCommand {
    /// Every dataset title and id
    Datasets,
    /// Metadata of one dataset
    Info { dataset_id: String },
    /// Export formats of one dataset
    Exports { dataset_id: String },
}

#[derive(Subcommand, Debug)]
pub enum FrenchCommand {
    /// Every dataset id and title from the catalogue export
    Datasets {
        /// Datasets to print
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Metadata of one dataset
    Meta { dataset_id: String },
    /// Resources of one dataset
    Resources { dataset_id: String },
}

#[derive(Subcommand, Debug)]
pub enum NomisCommand {
    /// Every dataset id and name
    Datasets,
    /// Definition of one dataset
    Info { dataset_id: String },
    /// Overview of one dataset
    Overview { dataset_id: String },
    /// Dimensions of one dataset and their codelists
    Dimensions { dataset_id: String },
    /// Definition of a codelist
    Codelist { codelist_id: String },
    /// Download URL of the latest xlsx extract
    #[command(after_help = "Example: herding-cats nomis url NM_1_1 --geography 2092957697,2092957698")]
    Url {
        dataset_id: String,
        /// Geography codes
        #[arg(short, long, value_delimiter = ',')]
        geography: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Upload the file as downloaded
    Raw,
    /// Convert to parquet before uploading
    Parquet,
}

impl From<ModeArg> for UploadMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Raw => UploadMode::Raw,
            ModeArg::Parquet => UploadMode::Parquet,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StorageArg {
    /// Amazon S3
    S3,
    /// An existing local directory
    Local,
}

impl From<StorageArg> for StorageType {
    fn from(storage: StorageArg) -> Self {
        match storage {
            StorageArg::S3 => StorageType::S3,
            StorageArg::Local => StorageType::Local,
        }
    }
}
