use std::path::{Path, PathBuf};

use anyhow::Context;
use arrow::record_batch::RecordBatch;
use arrow::util::pretty::pretty_format_batches;
use clap::Parser;
use dotenvy::dotenv;
use serde::Serialize;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

use herding_cats::{
    CkanCommand, Command, Config, FrenchCommand, NomisCommand, OdsCommand, ResourceArgs,
};
use herding_cats_client::{
    CatSession, CatalogueSource, CkanCatExplorer, CkanLoader, FrenchGouvCatExplorer, HttpFetcher,
    OnsNomisCatExplorer, OpenDataSoftCatExplorer, OpenDataSoftLoader, ResourceLoader,
};
use herding_cats_core::formats::write_parquet;
use herding_cats_core::models::{CkanResourceRef, ExportOption};
use herding_cats_core::{
    AppError, Catalogue, CatalogueType, FrameKind, LoadOptions, StorageType, UploadMode,
    load_catalogues_config,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config = Config::parse();

    if let Err(err) = run(config).await {
        match err.chain().find_map(|cause| cause.downcast_ref::<AppError>()) {
            Some(app_err) => eprintln!("Error: {}", app_err.user_message()),
            None => eprintln!("Error: {:#}", err),
        }
        std::process::exit(1);
    }

    Ok(())
}

async fn run(config: Config) -> anyhow::Result<()> {
    let config_path = config.config;

    match config.command {
        Command::Catalogues => list_catalogues(config_path)?,
        Command::Health { catalogue } => {
            let session = connect(&catalogue, config_path).await?;
            check_health(&session).await?;
        }
        Command::Ckan { catalogue, command } => {
            let session = connect(&catalogue, config_path).await?;
            ckan(&CkanCatExplorer::new(&session)?, command).await?;
        }
        Command::Ods { catalogue, command } => {
            let session = connect(&catalogue, config_path).await?;
            ods(&OpenDataSoftCatExplorer::new(&session)?, command).await?;
        }
        Command::French { command } => {
            let session = CatSession::connect(Catalogue::GouvFr).await?;
            french(&FrenchGouvCatExplorer::new(&session)?, command).await?;
        }
        Command::Nomis { command } => {
            let session = CatSession::connect(Catalogue::OnsNomis).await?;
            nomis(&OnsNomisCatExplorer::new(&session)?, command).await?;
        }
        Command::Load {
            resource,
            sheet,
            skip_rows,
            query,
            output,
            limit,
        } => {
            let opts = LoadOptions {
                sheet_name: sheet,
                skip_rows,
            };
            let target = LoadTarget {
                query: query.as_deref(),
                output: output.as_deref(),
                limit,
            };
            match direct_resource(&resource)? {
                DirectResource::Ckan(loader, source) => {
                    load(&loader, &source, &resource.format, &opts, target).await?
                }
                DirectResource::OpenDataSoft(loader, source) => {
                    load(&loader, &source, &resource.format, &opts, target).await?
                }
            }
        }
        Command::Upload {
            resource,
            bucket,
            name,
            mode,
            storage,
        } => {
            let upload_target = UploadTarget {
                bucket: &bucket,
                name: &name,
                mode: mode.into(),
                storage: storage.into(),
            };
            match direct_resource(&resource)? {
                DirectResource::Ckan(loader, source) => {
                    upload(&loader, &source, &resource.format, upload_target).await?
                }
                DirectResource::OpenDataSoft(loader, source) => {
                    upload(&loader, &source, &resource.format, upload_target).await?
                }
            }
        }
    }

    Ok(())
}

// =============================================================================
// Catalogues and sessions
// =============================================================================

/// Turns a CLI catalogue argument into a session source.
///
/// Built-in names win, then names from catalogues.toml. Anything else is
/// treated as a URL.
fn resolve_catalogue(
    value: &str,
    config_path: Option<PathBuf>,
) -> anyhow::Result<(CatalogueSource, Option<CatalogueType>)> {
    if let Some(catalogue) = Catalogue::from_name(value) {
        return Ok((CatalogueSource::Catalogue(catalogue), None));
    }

    if !looks_like_url(value) {
        if let Some(config) = load_catalogues_config(config_path)? {
            let entry = config.find_by_name(value).ok_or_else(|| {
                anyhow::anyhow!(
                    "Catalogue '{}' not found. Run `herding-cats catalogues` for the known names",
                    value
                )
            })?;
            if !entry.enabled {
                warn!("Catalogue '{}' is disabled in configuration", entry.name);
            }
            return Ok((
                CatalogueSource::Url(entry.url.clone()),
                Some(entry.catalogue_type),
            ));
        }
    }

    Ok((CatalogueSource::from(value), None))
}

fn looks_like_url(value: &str) -> bool {
    value.contains("://") || value.contains('.')
}

async fn connect(value: &str, config_path: Option<PathBuf>) -> anyhow::Result<CatSession> {
    let (source, catalogue_type) = resolve_catalogue(value, config_path)?;
    let session = CatSession::connect_with(source, catalogue_type, HttpFetcher::new()?)
        .await
        .with_context(|| format!("Failed to open a session on '{}'", value))?;
    Ok(session)
}

fn list_catalogues(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    println!("\nBuilt-in catalogues\n");
    for catalogue in Catalogue::all() {
        println!(
            "  {:<25} {:<14} {}",
            catalogue.name(),
            catalogue.catalogue_type().to_string(),
            catalogue.url()
        );
    }

    match load_catalogues_config(config_path)? {
        Some(config) if !config.catalogues.is_empty() => {
            println!("\nFrom catalogues.toml\n");
            for entry in &config.catalogues {
                let state = if entry.enabled { "" } else { " (disabled)" };
                println!(
                    "  {:<25} {:<14} {}{}",
                    entry.name,
                    entry.catalogue_type.to_string(),
                    entry.url,
                    state
                );
            }
        }
        _ => {}
    }
    println!();

    Ok(())
}

async fn check_health(session: &CatSession) -> anyhow::Result<()> {
    let healthy = match session.catalogue_type() {
        Some(CatalogueType::Ckan) => CkanCatExplorer::new(session)?.check_site_health().await?,
        _ => session.start_session().await.is_ok(),
    };

    if healthy {
        println!("{} is up", session.domain());
    } else {
        println!("{} is not responding", session.domain());
    }
    session.close_session();
    Ok(())
}

// =============================================================================
// Explorers
// =============================================================================

async fn ckan(explorer: &CkanCatExplorer, command: CkanCommand) -> anyhow::Result<()> {
    match command {
        CkanCommand::Count => println!("{}", explorer.get_package_count().await?),
        CkanCommand::List => {
            for name in explorer.package_list_dictionary().await?.keys() {
                println!("{}", name);
            }
        }
        CkanCommand::Extra => print_json(&explorer.package_list_dictionary_extra().await?)?,
        CkanCommand::Freshness => {
            let report = explorer.catalogue_freshness().await?;
            print_batch(&report, report.num_rows())?;
        }
        CkanCommand::Show { package } => {
            let rows = explorer.package_show_info(&package).await?;
            for resource in CkanCatExplorer::extract_resource_url(&rows) {
                println!(
                    "{:<8} {:<50} {}",
                    resource.format.as_deref().unwrap_or("-"),
                    resource.name.as_deref().unwrap_or("-"),
                    resource.url.as_deref().unwrap_or("-")
                );
            }
        }
        CkanCommand::Search {
            query,
            rows,
            unpacked,
        } => {
            let frame = if unpacked {
                explorer
                    .package_search_condense_dataframe_unpacked(&query, rows, FrameKind::Arrow)
                    .await?
            } else {
                explorer
                    .package_search_condense_dataframe_packed(&query, rows, FrameKind::Arrow)
                    .await?
            };
            let batch = frame.into_arrow()?;
            print_batch(&batch, batch.num_rows())?;
        }
        CkanCommand::Orgs => {
            let (count, names) = explorer.get_organisation_list().await?;
            println!("{} organisations\n", count);
            for name in names {
                println!("  {}", name);
            }
        }
    }
    Ok(())
}

async fn ods(explorer: &OpenDataSoftCatExplorer, command: OdsCommand) -> anyhow::Result<()> {
    match command {
        OdsCommand::Datasets => match explorer.fetch_all_datasets().await? {
            Some(datasets) => {
                for (title, id) in &datasets {
                    println!("{:<60} {}", id, title);
                }
            }
            None => eprintln!("No datasets were retrieved."),
        },
        OdsCommand::Info { dataset_id } => {
            print_json(&explorer.show_dataset_info(&dataset_id).await?)?
        }
        OdsCommand::Exports { dataset_id } => {
            for option in explorer.show_dataset_export_options(&dataset_id).await? {
                println!(
                    "{:<12} {}",
                    option.format.as_deref().unwrap_or("-"),
                    option.download_url.as_deref().unwrap_or("-")
                );
            }
        }
    }
    Ok(())
}

async fn french(explorer: &FrenchGouvCatExplorer, command: FrenchCommand) -> anyhow::Result<()> {
    match command {
        FrenchCommand::Datasets { limit } => {
            let datasets = explorer.get_all_datasets().await?;
            for (id, title) in datasets.iter().take(limit) {
                println!("{:<26} {}", id, title);
            }
            println!("\n{} datasets in total", datasets.len());
        }
        FrenchCommand::Meta { dataset_id } => {
            print_json(&explorer.get_dataset_meta(&dataset_id).await?)?
        }
        FrenchCommand::Resources { dataset_id } => {
            print_json(&explorer.get_dataset_resources(&dataset_id).await?)?
        }
    }
    Ok(())
}

async fn nomis(explorer: &OnsNomisCatExplorer, command: NomisCommand) -> anyhow::Result<()> {
    match command {
        NomisCommand::Datasets => {
            for dataset in explorer.get_all_datasets().await? {
                println!("{:<12} {}", dataset.id, dataset.name);
            }
        }
        NomisCommand::Info { dataset_id } => {
            print_json(&explorer.get_dataset_info(&dataset_id).await?)?
        }
        NomisCommand::Overview { dataset_id } => {
            print_json(&explorer.get_dataset_overview(&dataset_id).await?)?
        }
        NomisCommand::Dimensions { dataset_id } => {
            for dimension in explorer.get_dataset_dimensions(&dataset_id).await? {
                println!("{:<20} {}", dimension.concept, dimension.codelist);
            }
        }
        NomisCommand::Codelist { codelist_id } => {
            print_json(&explorer.get_codelist_info(&codelist_id).await?)?
        }
        NomisCommand::Url {
            dataset_id,
            geography,
        } => {
            let codes: Vec<&str> = geography.iter().map(String::as_str).collect();
            println!(
                "{}",
                explorer.generate_full_dataset_download_url(&dataset_id, &codes)?
            );
        }
    }
    Ok(())
}

// =============================================================================
// Load and upload
// =============================================================================

/// Loader and input for a resource given by URL.
///
/// With an API key the download goes through the OpenDataSoft loader so the
/// key is appended. Otherwise it is treated as a plain CKAN resource.
enum DirectResource {
    Ckan(CkanLoader, Vec<CkanResourceRef>),
    OpenDataSoft(OpenDataSoftLoader, Vec<ExportOption>),
}

fn direct_resource(args: &ResourceArgs) -> anyhow::Result<DirectResource> {
    match args.api_key.as_deref().filter(|k| !k.is_empty()) {
        Some(key) => Ok(DirectResource::OpenDataSoft(
            OpenDataSoftLoader::new()?.with_api_key(key),
            vec![ExportOption::new(args.format.as_str(), args.url.as_str())],
        )),
        None => Ok(DirectResource::Ckan(
            CkanLoader::new()?,
            vec![CkanResourceRef {
                name: None,
                created: None,
                format: Some(args.format.clone()),
                url: Some(args.url.clone()),
            }],
        )),
    }
}

#[derive(Clone, Copy)]
struct LoadTarget<'a> {
    query: Option<&'a str>,
    output: Option<&'a Path>,
    limit: usize,
}

async fn load<L: ResourceLoader>(
    loader: &L,
    source: &L::Source,
    format: &str,
    opts: &LoadOptions,
    target: LoadTarget<'_>,
) -> anyhow::Result<()> {
    let batch = match target.query {
        Some(sql) => {
            loader
                .execute_query(source, Some(format), "data", sql, opts)
                .await?
        }
        None => loader.arrow_data_loader(source, Some(format), opts).await?,
    };

    match target.output {
        Some(path) => {
            let bytes = write_parquet(&batch)?;
            std::fs::write(path, &bytes)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} rows to {}", batch.num_rows(), path.display());
        }
        None => print_batch(&batch, target.limit)?,
    }
    Ok(())
}

struct UploadTarget<'a> {
    bucket: &'a str,
    name: &'a str,
    mode: UploadMode,
    storage: StorageType,
}

async fn upload<L: ResourceLoader>(
    loader: &L,
    source: &L::Source,
    format: &str,
    target: UploadTarget<'_>,
) -> anyhow::Result<()> {
    let key = loader
        .upload_data(
            source,
            Some(format),
            target.bucket,
            target.name,
            target.mode,
            target.storage,
        )
        .await?;
    info!("Uploaded to {}://{}/{}", target.storage, target.bucket, key);
    println!("{}", key);
    Ok(())
}

// =============================================================================
// Output
// =============================================================================

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Prints the first `limit` rows of `batch` as a table.
fn print_batch(batch: &RecordBatch, limit: usize) -> anyhow::Result<()> {
    let shown = batch.slice(0, limit.min(batch.num_rows()));
    println!("{}", pretty_format_batches(&[shown])?);
    println!(
        "{} rows x {} columns{}",
        batch.num_rows(),
        batch.num_columns(),
        if limit < batch.num_rows() {
            format!(" (showing {})", limit)
        } else {
            String::new()
        }
    );
    Ok(())
}
