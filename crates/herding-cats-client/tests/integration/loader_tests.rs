//! Loader tests: download, parse, query and upload against a mock server.

use std::sync::Arc;

use arrow::array::AsArray;
use arrow::datatypes::{DataType, Float64Type};
use herding_cats_client::{CkanLoader, FrenchGouvLoader, OnsNomisLoader, OpenDataSoftLoader, ResourceLoader};
use herding_cats_core::models::{CkanResourceRef, ExportOption, FrenchResource};
use herding_cats_core::{AppError, FrameKind, LoadOptions, S3Uploader, StorageType, UploadMode};
use object_store::ObjectStore;
use object_store::memory::InMemory;
use object_store::path::Path;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::{fast_http, mount_bytes, nomis_workbook};

const CRIME_CSV: &str = "borough,month,incidents\n\
Camden,2024-01,12\n\
Camden,2024-02,9\n\
Hackney,2024-01,20\n";

fn ckan_resources(server: &MockServer) -> Vec<CkanResourceRef> {
    vec![
        CkanResourceRef {
            name: Some("Notes".to_string()),
            created: Some("2024-03-01T00:00:00".to_string()),
            format: Some("PDF".to_string()),
            url: Some(format!("{}/files/notes.pdf", server.uri())),
        },
        CkanResourceRef {
            name: Some("Crime by borough".to_string()),
            created: Some("2024-03-01T00:00:00".to_string()),
            format: Some("CSV".to_string()),
            url: Some(format!("{}/files/crime.csv", server.uri())),
        },
    ]
}

async fn crime_server() -> MockServer {
    let server = MockServer::start().await;
    mount_bytes(&server, "/files/crime.csv", CRIME_CSV).await;
    server
}

#[tokio::test]
async fn test_ckan_csv_into_arrow_and_polars() {
    let server = crime_server().await;
    let resources = ckan_resources(&server);
    let loader = CkanLoader::with_http(fast_http());
    let opts = LoadOptions::default();

    let batch = loader
        .arrow_data_loader(&resources, Some("csv"), &opts)
        .await
        .unwrap();
    assert_eq!(batch.num_rows(), 3);
    assert_eq!(batch.num_columns(), 3);

    let df = loader
        .polars_data_loader(&resources, Some("CSV"), &opts)
        .await
        .unwrap();
    assert_eq!(df.height(), 3);
    assert_eq!(df.get_column_names()[0].as_str(), "borough");
}

#[tokio::test]
async fn test_ckan_unknown_format_lists_available() {
    let server = crime_server().await;
    let resources = ckan_resources(&server);
    let loader = CkanLoader::with_http(fast_http());

    let err = loader
        .fetch_resource(&resources, Some("geojson"))
        .await
        .unwrap_err();
    match err {
        AppError::InvalidInput(msg) => assert!(msg.contains("Available formats: PDF, CSV")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_ckan_execute_query() {
    let server = crime_server().await;
    let resources = ckan_resources(&server);
    let loader = CkanLoader::with_http(fast_http());

    let batch = loader
        .execute_query(
            &resources,
            Some("csv"),
            "crime",
            "SELECT borough, SUM(incidents) AS total FROM crime GROUP BY borough ORDER BY borough",
            &LoadOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(batch.num_rows(), 2);
    assert_eq!(batch.schema().field(1).name(), "total");

    let frame = loader
        .query_to_frame(
            &resources,
            Some("csv"),
            "crime",
            "SELECT * FROM crime WHERE borough = 'Camden'",
            FrameKind::Polars,
            &LoadOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(frame.num_rows(), 2);
}

#[tokio::test]
async fn test_ckan_download_failure() {
    let server = MockServer::start().await;
    let resources = ckan_resources(&server);
    let loader = CkanLoader::with_http(fast_http());

    let err = loader
        .arrow_data_loader(&resources, Some("csv"), &LoadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ClientError(_)));
}

#[tokio::test]
async fn test_upload_with_in_memory_store() {
    let server = crime_server().await;
    let resources = ckan_resources(&server);
    let loader = CkanLoader::with_http(fast_http());

    let store = Arc::new(InMemory::new());
    let uploader = S3Uploader::with_store(store.clone(), "open-data").await.unwrap();

    let raw = loader
        .upload_with(&resources, Some("csv"), &uploader, "crime", UploadMode::Raw)
        .await
        .unwrap();
    assert!(raw.starts_with("crime-"));
    assert!(raw.ends_with(".csv"));
    let stored = store
        .get(&Path::from(raw.as_str()))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(stored.as_ref(), CRIME_CSV.as_bytes());

    let converted = loader
        .upload_with(&resources, Some("csv"), &uploader, "crime", UploadMode::Parquet)
        .await
        .unwrap();
    assert!(converted.ends_with(".parquet"));
    let stored = store
        .get(&Path::from(converted.as_str()))
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    assert_eq!(&stored[..4], b"PAR1");
}

#[tokio::test]
async fn test_upload_data_to_local_directory() {
    let server = crime_server().await;
    let resources = ckan_resources(&server);
    let loader = CkanLoader::with_http(fast_http());
    let dir = tempfile::tempdir().unwrap();
    let bucket = dir.path().to_string_lossy().to_string();

    let name = loader
        .upload_data(
            &resources,
            Some("csv"),
            &bucket,
            "crime",
            UploadMode::Raw,
            StorageType::Local,
        )
        .await
        .unwrap();
    let written = std::fs::read_to_string(dir.path().join(&name)).unwrap();
    assert_eq!(written, CRIME_CSV);

    let err = loader
        .upload_data(&resources, Some("csv"), " ", "crime", UploadMode::Raw, StorageType::Local)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::InvalidInput(_)));

    let missing = dir.path().join("missing").to_string_lossy().to_string();
    let err = loader
        .upload_data(&resources, Some("csv"), &missing, "crime", UploadMode::Raw, StorageType::Local)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StorageError(_)));
}

#[tokio::test]
async fn test_opendatasoft_loader_sends_api_key() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/exports/csv"))
        .and(query_param("apikey", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(CRIME_CSV.as_bytes().to_vec()))
        .mount(&server)
        .await;
    let options = vec![
        ExportOption::new("xlsx", format!("{}/exports/xlsx", server.uri())),
        ExportOption::new("csv", format!("{}/exports/csv", server.uri())),
    ];

    let loader = OpenDataSoftLoader::with_http(fast_http()).with_api_key("secret");
    let df = loader
        .polars_data_loader(&options, Some("csv"), &LoadOptions::default())
        .await
        .unwrap();
    assert_eq!(df.height(), 3);

    // Without the key the mock does not match and the download fails
    let loader = OpenDataSoftLoader::with_http(fast_http());
    let err = loader
        .polars_data_loader(&options, Some("csv"), &LoadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OpenDataSoftExplorer { .. }));
}

#[tokio::test]
async fn test_opendatasoft_loader_requires_format() {
    let loader = OpenDataSoftLoader::with_http(fast_http());
    let options = vec![ExportOption::new("csv", "https://ods.example/exports/csv")];
    assert!(matches!(
        loader.fetch_resource(&options, None).await,
        Err(AppError::OpenDataSoftExplorer { .. })
    ));
    assert!(matches!(
        loader.fetch_resource(&options, Some("shapefile")).await,
        Err(AppError::OpenDataSoftExplorer { .. })
    ));
}

#[tokio::test]
async fn test_french_gouv_loader_into_sql() {
    let server = crime_server().await;
    let resources = vec![
        FrenchResource {
            resource_title: Some("Notice".to_string()),
            resource_format: Some("pdf".to_string()),
            resource_url: Some(format!("{}/files/notice.pdf", server.uri())),
            ..Default::default()
        },
        FrenchResource {
            resource_title: Some("Délits".to_string()),
            resource_format: Some("CSV".to_string()),
            resource_url: Some(format!("{}/files/crime.csv", server.uri())),
            ..Default::default()
        },
    ];

    let loader = FrenchGouvLoader::with_http(fast_http());
    let session = loader
        .duckdb_data_loader(&resources, Some("csv"), "delits", &LoadOptions::default())
        .await
        .unwrap();
    let batch = session
        .execute_query("SELECT COUNT(*) AS n FROM delits")
        .await
        .unwrap();
    assert_eq!(batch.num_rows(), 1);

    let err = loader
        .fetch_resource(&resources, Some("parquet"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::FrenchCatDataLoader(_)));
}

#[tokio::test]
async fn test_nomis_loader_reads_xlsx_extract() {
    let server = MockServer::start().await;
    mount_bytes(&server, "/api/v01/dataset/NM_1_1.data.xlsx", nomis_workbook()).await;
    let url = format!("{}/api/v01/dataset/NM_1_1.data.xlsx?date=latest", server.uri());
    let loader = OnsNomisLoader::with_http(fast_http());

    let sheets = loader.get_sheet_names(url.as_str(), None).await.unwrap();
    assert_eq!(sheets, vec!["Data".to_string(), "Notes".to_string()]);

    let opts = LoadOptions::default().sheet("Data").skip_rows(2);
    let batch = loader
        .arrow_data_loader(url.as_str(), None, &opts)
        .await
        .unwrap();
    assert_eq!(batch.num_rows(), 3);
    let schema = batch.schema();
    let period = schema.field(schema.index_of("period").unwrap());
    assert_eq!(period.data_type(), &DataType::Date32);

    let df = loader
        .polars_data_loader(url.as_str(), Some("csv"), &opts)
        .await
        .unwrap();
    assert_eq!(df.height(), 3);
    assert_eq!(df.width(), 3);

    let totals = loader
        .execute_query(
            url.as_str(),
            None,
            "claimants",
            "SELECT geography, SUM(claimants) AS total FROM claimants \
             WHERE period >= DATE '2024-03-16' GROUP BY geography ORDER BY geography",
            &opts,
        )
        .await
        .unwrap();
    assert_eq!(totals.num_rows(), 1);
    assert_eq!(totals.column(0).as_string::<i32>().value(0), "Hartlepool");
    assert_eq!(totals.column(1).as_primitive::<Float64Type>().value(0), 1490.0);
}

#[tokio::test]
async fn test_nomis_loader_download_failure() {
    let server = MockServer::start().await;
    let url = format!("{}/api/v01/dataset/NM_1_1.data.xlsx?date=latest", server.uri());

    let loader = OnsNomisLoader::with_http(fast_http());
    let err = loader
        .polars_data_loader(url.as_str(), None, &LoadOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ClientError(_)));

    assert!(matches!(
        loader.fetch_resource("  ", None).await,
        Err(AppError::InvalidInput(_))
    ));
}
