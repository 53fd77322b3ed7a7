//! CKAN explorer tests against a mocked action API.

use arrow::array::AsArray;
use arrow::datatypes::Int64Type;
use herding_cats_client::CkanCatExplorer;
use herding_cats_core::{AppError, FrameKind};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use super::common::{catalogue_server, ckan_ok, mount_json, session_for};

async fn explorer() -> (wiremock::MockServer, CkanCatExplorer) {
    let server = catalogue_server().await;
    let session = session_for(&server, None).await;
    let explorer = CkanCatExplorer::new(&session).unwrap();
    (server, explorer)
}

fn search_result() -> serde_json::Value {
    json!({
        "count": 2,
        "results": [
            {
                "name": "police-force-strength",
                "notes_markdown": "Numbers of police officers",
                "num_resources": 2,
                "resources": [
                    {"name": "Strength", "created": "2024-08-28", "format": "csv", "url": "https://x/s.csv"},
                    {"name": "Strength xlsx", "created": "2024-08-28", "format": "XLSX", "url": "https://x/s.xlsx"}
                ]
            },
            {
                "name": "empty-package",
                "notes_markdown": null,
                "num_resources": 0,
                "resources": []
            }
        ]
    })
}

#[tokio::test]
async fn test_check_site_health() {
    let (server, explorer) = explorer().await;
    mount_json(&server, "/api/3/action/site_read", ckan_ok(json!(true))).await;
    assert!(explorer.check_site_health().await.unwrap());
}

#[tokio::test]
async fn test_package_list_operations() {
    let (server, explorer) = explorer().await;
    mount_json(
        &server,
        "/api/3/action/package_list",
        ckan_ok(json!(["b-package", "a-package", "c-package"])),
    )
    .await;

    assert_eq!(explorer.get_package_count().await.unwrap(), 3);

    let dict = explorer.package_list_dictionary().await.unwrap();
    assert_eq!(dict.len(), 3);
    assert_eq!(dict["a-package"], "a-package");
    assert_eq!(dict.keys().next().map(String::as_str), Some("a-package"));

    let frame = explorer
        .package_list_dataframe(FrameKind::Polars)
        .await
        .unwrap();
    assert_eq!(frame.num_rows(), 3);
    assert_eq!(frame.column_names(), vec!["package_name".to_string()]);
}

#[tokio::test]
async fn test_package_show_info_rows_per_resource() {
    let (server, explorer) = explorer().await;
    Mock::given(method("GET"))
        .and(path("/api/3/action/package_show"))
        .and(query_param("id", "violence-reduction-unit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ckan_ok(json!({
            "name": "violence-reduction-unit",
            "notes_markdown": "VRU data",
            "resources": [
                {"name": "Q1", "format": "spreadsheet", "url": "https://x/q1.xlsx",
                 "created": "2023-11-01", "last_modified": "2023-12-01"},
                {"name": "Q2", "format": "csv", "url": "https://x/q2.csv",
                 "created": "2024-02-01", "last_modified": null}
            ]
        }))))
        .mount(&server)
        .await;

    let info = explorer
        .package_show_info("violence-reduction-unit")
        .await
        .unwrap();
    assert_eq!(info.len(), 2);
    assert_eq!(info[0].name, "violence-reduction-unit");
    assert_eq!(info[0].notes_markdown.as_deref(), Some("VRU data"));
    assert_eq!(info[0].resource_last_modified.as_deref(), Some("2023-12-01"));
    assert_eq!(info[1].resource_format.as_deref(), Some("csv"));

    let refs = CkanCatExplorer::extract_resource_url(&info);
    assert_eq!(refs[0].url.as_deref(), Some("https://x/q1.xlsx"));
    assert_eq!(
        CkanCatExplorer::find_resource_url(&info, "Q2"),
        Some(["csv".to_string(), "https://x/q2.csv".to_string()])
    );
}

#[tokio::test]
async fn test_package_show_info_rejects_empty_name() {
    let (_server, explorer) = explorer().await;
    assert!(matches!(
        explorer.package_show_info("").await,
        Err(AppError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_package_search_condense_and_frames() {
    let (server, explorer) = explorer().await;
    Mock::given(method("GET"))
        .and(path("/api/3/action/package_search"))
        .and(query_param("q", "police"))
        .and(query_param("rows", "10"))
        .respond_with(ResponseTemplate::new(200).set_body_json(ckan_ok(search_result())))
        .mount(&server)
        .await;

    let raw = explorer.package_search_json("police", 10).await.unwrap();
    assert_eq!(raw["count"], 2);

    let condensed = explorer.package_search_condense("police", 10).await.unwrap();
    assert_eq!(condensed.len(), 2);
    assert_eq!(condensed[0].num_resources, 2);
    assert_eq!(condensed[0].resources[1].format.as_deref(), Some("XLSX"));

    let packed = explorer
        .package_search_condense_dataframe_packed("police", 10, FrameKind::Arrow)
        .await
        .unwrap();
    assert_eq!(packed.num_rows(), 2);
    assert!(packed.column_names().contains(&"resources".to_string()));

    let unpacked = explorer
        .package_search_condense_dataframe_unpacked("police", 10, FrameKind::Arrow)
        .await
        .unwrap();
    // The package without resources disappears
    assert_eq!(unpacked.num_rows(), 2);
    let mut columns = unpacked.column_names();
    columns.sort();
    assert_eq!(
        columns,
        vec![
            "name",
            "notes_markdown",
            "resource_created",
            "resource_format",
            "resource_name",
            "resource_url"
        ]
    );
}

#[tokio::test]
async fn test_package_search_accepts_result_key() {
    let (server, explorer) = explorer().await;
    mount_json(
        &server,
        "/api/3/action/package_search",
        ckan_ok(json!({"result": [{"name": "only", "resources": []}]})),
    )
    .await;

    let condensed = explorer.package_search_condense("", 10).await.unwrap();
    assert_eq!(condensed.len(), 1);
    assert_eq!(condensed[0].name, "only");
}

#[tokio::test]
async fn test_package_search_without_results_key_fails() {
    let (server, explorer) = explorer().await;
    mount_json(
        &server,
        "/api/3/action/package_search",
        ckan_ok(json!({"count": 0})),
    )
    .await;

    assert!(matches!(
        explorer.package_search_condense("x", 5).await,
        Err(AppError::CatExplorer(_))
    ));
}

#[tokio::test]
async fn test_package_search_malformed_hits_fail() {
    let (server, explorer) = explorer().await;
    mount_json(
        &server,
        "/api/3/action/package_search",
        ckan_ok(json!({"results": [{"name": 42}]})),
    )
    .await;

    let err = explorer.package_search_condense("x", 5).await.unwrap_err();
    match err {
        AppError::CatExplorer(msg) => assert!(msg.contains("package search results")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_catalogue_freshness() {
    let (server, explorer) = explorer().await;
    mount_json(
        &server,
        "/api/3/action/current_package_list_with_resources",
        ckan_ok(json!([
            {
                "owner_org": "org-1", "name": "stale-one", "title": "Stale",
                "maintainer": null, "metadata_created": "2001-01-01T00:00:00",
                "metadata_modified": "2001-02-01T00:00:00",
                "resources": [{"name": "r1", "format": "CSV"}, {"name": "r2", "format": "PDF"}],
                "groups": [{"name": "transport"}]
            },
            {
                "owner_org": "org-2", "name": "stale-two", "title": "Also stale",
                "maintainer": "someone", "metadata_created": "2002-01-01T00:00:00",
                "metadata_modified": "2002-02-01T00:00:00",
                "resources": [], "groups": []
            }
        ])),
    )
    .await;

    let extra = explorer.package_list_dictionary_extra().await.unwrap();
    assert_eq!(extra.len(), 2);
    assert_eq!(extra[0].owner_org.as_deref(), Some("org-1"));
    assert_eq!(extra[0].resources.len(), 2);

    let freshness = explorer.catalogue_freshness().await.unwrap();
    assert_eq!(freshness.num_rows(), 1);
    let schema = freshness.schema();
    let column = |name: &str| {
        freshness
            .column(schema.index_of(name).unwrap())
            .as_primitive::<Int64Type>()
            .value(0)
    };
    assert_eq!(column("total_packages"), 2);
    assert_eq!(column("total_resources"), 3);
    assert_eq!(column("updated_packages_last_6_months"), 0);
}

#[tokio::test]
async fn test_get_organisation_list() {
    let (server, explorer) = explorer().await;
    mount_json(
        &server,
        "/api/3/action/organization_list",
        ckan_ok(json!(["gla", "met-police"])),
    )
    .await;

    let (count, names) = explorer.get_organisation_list().await.unwrap();
    assert_eq!(count, 2);
    assert_eq!(names, vec!["gla", "met-police"]);
}

#[tokio::test]
async fn test_http_failure_is_explorer_error() {
    let (server, explorer) = explorer().await;
    Mock::given(method("GET"))
        .and(path("/api/3/action/package_list"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    match explorer.get_package_count().await {
        Err(AppError::CatExplorer(msg)) => assert!(msg.contains("HTTP 403")),
        other => panic!("Expected CatExplorer error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let (server, explorer) = explorer().await;
    Mock::given(method("GET"))
        .and(path("/api/3/action/organization_list"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_json(
        &server,
        "/api/3/action/organization_list",
        ckan_ok(json!(["gla"])),
    )
    .await;

    let (count, _) = explorer.get_organisation_list().await.unwrap();
    assert_eq!(count, 1);
}
