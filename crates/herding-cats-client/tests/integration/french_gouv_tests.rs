//! data.gouv.fr explorer tests.

use herding_cats_client::FrenchGouvCatExplorer;
use herding_cats_core::formats::write_parquet;
use herding_cats_core::frame::values_to_arrow;
use herding_cats_core::{AppError, FrameKind};
use serde_json::json;
use wiremock::MockServer;

use super::common::{catalogue_server, mount_bytes, mount_json, session_for};

async fn explorer() -> (MockServer, FrenchGouvCatExplorer) {
    let server = catalogue_server().await;
    let session = session_for(&server, None).await;
    let explorer = FrenchGouvCatExplorer::new(&session)
        .unwrap()
        .with_catalogue_url(format!("{}/catalogue.parquet", server.uri()));
    (server, explorer)
}

fn dataset_meta() -> serde_json::Value {
    json!({
        "id": "5c4ae55a",
        "title": "Élections européennes 2024",
        "slug": "elections-europeennes-2024",
        "resources": [
            {"id": "r1", "title": "Résultats", "format": "csv",
             "url": "https://static.data.gouv.fr/r1.csv", "created_at": "2024-06-10",
             "last_modified": "2024-06-11", "filesize": 2048},
            {"id": "r2", "title": "Notice", "format": "pdf",
             "url": "https://static.data.gouv.fr/r2.pdf"}
        ]
    })
}

#[tokio::test]
async fn test_get_all_datasets_from_catalogue_export() {
    let (server, explorer) = explorer().await;
    let batch = values_to_arrow(&[
        json!({"id": "a1", "title": "Budget", "slug": "budget"}),
        json!({"id": "b2", "title": null, "slug": "sans-titre"}),
    ])
    .unwrap();
    mount_bytes(
        &server,
        "/catalogue.parquet",
        write_parquet(&batch).unwrap().to_vec(),
    )
    .await;

    let datasets = explorer.get_all_datasets().await.unwrap();
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets["a1"], "Budget");
    assert_eq!(datasets["b2"], "sans-titre");

    let frame = explorer.catalogue_frame(FrameKind::Polars).await.unwrap();
    assert_eq!(frame.num_rows(), 2);
}

#[tokio::test]
async fn test_dataset_meta_and_resources() {
    let (server, explorer) = explorer().await;
    mount_json(&server, "/api/1/datasets/5c4ae55a/", dataset_meta()).await;

    let meta = explorer.get_dataset_meta("5c4ae55a").await.unwrap();
    let resources = FrenchGouvCatExplorer::get_dataset_resource_meta(&meta).unwrap();
    assert_eq!(resources.len(), 2);
    assert_eq!(resources[0].resource_title.as_deref(), Some("Résultats"));
    assert_eq!(resources[0].resource_filesize, Some(2048));
    assert_eq!(
        resources[1].dataset_title.as_deref(),
        Some("Élections européennes 2024")
    );
}

#[tokio::test]
async fn test_multiple_meta_skips_failures() {
    let (server, explorer) = explorer().await;
    mount_json(&server, "/api/1/datasets/5c4ae55a/", dataset_meta()).await;

    let metas = explorer
        .get_multiple_datasets_meta(&["5c4ae55a", "does-not-exist"])
        .await
        .unwrap();
    assert_eq!(metas.len(), 1);
    assert!(metas.contains_key("5c4ae55a"));
}

#[tokio::test]
async fn test_get_dataset_resources_endpoint() {
    let (server, explorer) = explorer().await;
    mount_json(
        &server,
        "/api/1/datasets/5c4ae55a/resources/",
        json!({"data": [{"id": "r1", "format": "parquet", "url": "https://static/r1.parquet"}]}),
    )
    .await;

    let resources = explorer.get_dataset_resources("5c4ae55a").await.unwrap();
    assert_eq!(resources.len(), 1);
    assert_eq!(resources[0].dataset_id.as_deref(), Some("5c4ae55a"));
    assert_eq!(resources[0].resource_format.as_deref(), Some("parquet"));
}

#[tokio::test]
async fn test_missing_dataset_is_explorer_error() {
    let (_server, explorer) = explorer().await;
    assert!(matches!(
        explorer.get_dataset_meta("nope").await,
        Err(AppError::CatExplorer(_))
    ));
    assert!(matches!(
        explorer.get_dataset_meta(" ").await,
        Err(AppError::InvalidInput(_))
    ));
}
