//! OpenDataSoft explorer tests, including the fallback catalog endpoint.

use herding_cats_client::OpenDataSoftCatExplorer;
use herding_cats_core::{AppError, CatalogueType};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::{catalogue_server, mount_json, session_for};

async fn explorer() -> (MockServer, OpenDataSoftCatExplorer) {
    let server = catalogue_server().await;
    let session = session_for(&server, Some(CatalogueType::OpenDataSoft)).await;
    let explorer = OpenDataSoftCatExplorer::new(&session).unwrap();
    (server, explorer)
}

fn dataset(id: &str, title: &str) -> serde_json::Value {
    json!({"links": [], "dataset": {"dataset_id": id, "metas": {"default": {"title": title}}}})
}

#[tokio::test]
async fn test_fetch_all_datasets_primary_endpoint() {
    let (server, explorer) = explorer().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/catalog/datasets"))
        .and(query_param("offset", "0"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 2,
            "datasets": [dataset("ukpn-flex", "Flexibility"), dataset("ukpn-lv", "LV Feeders")]
        })))
        .mount(&server)
        .await;

    let datasets = explorer.fetch_all_datasets().await.unwrap().unwrap();
    assert_eq!(datasets.len(), 2);
    assert_eq!(datasets["Flexibility"], "ukpn-flex");
}

#[tokio::test]
async fn test_fetch_all_datasets_paginates() {
    let (server, explorer) = explorer().await;
    let first_page: Vec<_> = (0..100)
        .map(|i| dataset(&format!("ds-{i}"), &format!("Dataset {i}")))
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/v2/catalog/datasets"))
        .and(query_param("offset", "0"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"total_count": 101, "datasets": first_page})),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/catalog/datasets"))
        .and(query_param("offset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "total_count": 101,
            "datasets": [dataset("ds-100", "Dataset 100")]
        })))
        .mount(&server)
        .await;

    let datasets = explorer.fetch_all_datasets().await.unwrap().unwrap();
    assert_eq!(datasets.len(), 101);
    assert_eq!(datasets["Dataset 100"], "ds-100");
}

#[tokio::test]
async fn test_fetch_all_datasets_falls_back_on_400() {
    let (server, explorer) = explorer().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/catalog/datasets"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    mount_json(
        &server,
        "/api/explore/v2.0/catalog/datasets",
        json!({"total_count": 1, "datasets": [dataset("paris-trees", "Les arbres")]}),
    )
    .await;

    let datasets = explorer.fetch_all_datasets().await.unwrap().unwrap();
    assert_eq!(datasets["Les arbres"], "paris-trees");
}

#[tokio::test]
async fn test_fetch_all_datasets_empty_is_none() {
    let (server, explorer) = explorer().await;
    mount_json(
        &server,
        "/api/v2/catalog/datasets",
        json!({"total_count": 0, "datasets": []}),
    )
    .await;
    mount_json(
        &server,
        "/api/explore/v2.0/catalog/datasets",
        json!({"total_count": 0, "datasets": []}),
    )
    .await;

    assert!(explorer.fetch_all_datasets().await.unwrap().is_none());
}

#[tokio::test]
async fn test_fetch_all_datasets_both_endpoints_failing() {
    let (server, explorer) = explorer().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/catalog/datasets"))
        .respond_with(ResponseTemplate::new(400))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/explore/v2.0/catalog/datasets"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(matches!(
        explorer.fetch_all_datasets().await,
        Err(AppError::CatExplorer(_))
    ));
}

#[tokio::test]
async fn test_show_dataset_info_uses_fallback() {
    let (server, explorer) = explorer().await;
    mount_json(
        &server,
        "/api/explore/v2.0/catalog/datasets/ukpn-flex",
        json!({"dataset": {"dataset_id": "ukpn-flex"}}),
    )
    .await;

    let info = explorer.show_dataset_info("ukpn-flex").await.unwrap();
    assert_eq!(info["dataset"]["dataset_id"], "ukpn-flex");

    let err = explorer.show_dataset_info("missing").await.unwrap_err();
    assert!(matches!(err, AppError::OpenDataSoftExplorer { .. }));
}

#[tokio::test]
async fn test_show_dataset_export_options() {
    let (server, explorer) = explorer().await;
    mount_json(
        &server,
        "/api/v2/catalog/datasets/ukpn-flex/exports",
        json!({"links": [
            {"rel": "self", "href": "https://ods/exports"},
            {"rel": "csv", "href": "https://ods/exports/csv"},
            {"rel": "xlsx", "href": "https://ods/exports/xlsx"}
        ]}),
    )
    .await;
    mount_json(
        &server,
        "/api/v2/catalog/datasets/no-exports/exports",
        json!({"links": [{"rel": "self", "href": "https://ods/exports"}]}),
    )
    .await;

    let options = explorer.show_dataset_export_options("ukpn-flex").await.unwrap();
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].format.as_deref(), Some("csv"));
    assert_eq!(options[1].download_url.as_deref(), Some("https://ods/exports/xlsx"));

    let err = explorer
        .show_dataset_export_options("no-exports")
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::OpenDataSoftExplorer { .. }));
}
