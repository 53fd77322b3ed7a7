//! ONS Nomis explorer tests.

use herding_cats_client::OnsNomisCatExplorer;
use herding_cats_core::{AppError, CatalogueType};
use serde_json::json;
use wiremock::MockServer;

use super::common::{catalogue_server, mount_json, session_for};

async fn explorer() -> (MockServer, OnsNomisCatExplorer) {
    let server = catalogue_server().await;
    let session = session_for(&server, Some(CatalogueType::OnsNomis)).await;
    let explorer = OnsNomisCatExplorer::new(&session).unwrap();
    (server, explorer)
}

fn definition() -> serde_json::Value {
    json!({"structure": {"keyfamilies": {"keyfamily": [{
        "id": "NM_1_1",
        "name": {"value": "Jobseeker's Allowance with rates and proportions", "lang": "en"},
        "components": {"dimension": [
            {"codelist": "CL_1_1_GEOGRAPHY", "conceptref": "GEOGRAPHY"},
            {"codelist": "CL_1_1_SEX", "conceptref": "SEX"}
        ]}
    }]}}})
}

#[tokio::test]
async fn test_get_all_datasets() {
    let (server, explorer) = explorer().await;
    mount_json(&server, "/api/v01/dataset/def.sdmx.json", definition()).await;

    let datasets = explorer.get_all_datasets().await.unwrap();
    assert_eq!(datasets.len(), 1);
    assert_eq!(datasets[0].id, "NM_1_1");
    assert!(datasets[0].name.starts_with("Jobseeker's Allowance"));
}

#[tokio::test]
async fn test_dataset_info_dimensions_and_codelist() {
    let (server, explorer) = explorer().await;
    mount_json(&server, "/api/v01/dataset/NM_1_1/def.sdmx.json", definition()).await;
    mount_json(
        &server,
        "/api/v01/dataset/NM_1_1.overview.json",
        json!({"overview": {"id": "NM_1_1"}}),
    )
    .await;
    mount_json(
        &server,
        "/api/v01/codelist/CL_1_1_SEX.def.sdmx.json",
        json!({"structure": {"codelists": {"codelist": [{"id": "CL_1_1_SEX"}]}}}),
    )
    .await;

    let info = explorer.get_dataset_info("NM_1_1").await.unwrap();
    assert!(info.pointer("/structure/keyfamilies").is_some());

    let overview = explorer.get_dataset_overview("NM_1_1").await.unwrap();
    assert_eq!(overview["overview"]["id"], "NM_1_1");

    let dims = explorer.get_dataset_dimensions("NM_1_1").await.unwrap();
    assert_eq!(dims.len(), 2);
    assert_eq!(dims[0].concept, "GEOGRAPHY");
    assert_eq!(dims[1].codelist, "CL_1_1_SEX");

    let codelist = explorer.get_codelist_info("CL_1_1_SEX").await.unwrap();
    assert_eq!(
        codelist["structure"]["codelists"]["codelist"][0]["id"],
        "CL_1_1_SEX"
    );
}

#[tokio::test]
async fn test_generate_full_dataset_download_url() {
    let (server, explorer) = explorer().await;

    let url = explorer
        .generate_full_dataset_download_url("NM_1_1", &[])
        .unwrap();
    assert_eq!(
        url,
        format!("{}/api/v01/dataset/NM_1_1.data.xlsx?date=latest", server.uri())
    );

    let url = explorer
        .generate_full_dataset_download_url("NM_1_1", &["2092957697", "2092957698"])
        .unwrap();
    assert!(url.ends_with("?date=latest&geography=2092957697,2092957698"));

    assert!(matches!(
        explorer.generate_full_dataset_download_url("", &[]),
        Err(AppError::InvalidInput(_))
    ));
}
