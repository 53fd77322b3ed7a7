//! Session resolution, validation and catalogue type checks.

use herding_cats_client::{
    CatSession, CkanCatExplorer, FrenchGouvCatExplorer, OnsNomisCatExplorer,
    OpenDataSoftCatExplorer,
};
use herding_cats_core::{AppError, CatalogueType};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::common::{catalogue_server, fast_http, session_for};

#[tokio::test]
async fn test_connect_to_reachable_catalogue() {
    let server = catalogue_server().await;
    let session = session_for(&server, None).await;

    assert_eq!(session.base_url_str(), server.uri());
    assert!(session.base_url().as_str().ends_with('/'));
    assert!(session.domain().starts_with("127.0.0.1:"));
    assert_eq!(session.catalogue_type(), None);

    session.start_session().await.unwrap();
    session.close_session();
}

#[tokio::test]
async fn test_connect_strips_trailing_slash() {
    let server = catalogue_server().await;
    let session = CatSession::connect_with(format!("{}/", server.uri()), None, fast_http())
        .await
        .unwrap();
    assert_eq!(session.base_url_str(), server.uri());
}

#[tokio::test]
async fn test_unreachable_catalogue_fails_validation() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = CatSession::connect_with(server.uri(), None, fast_http())
        .await
        .unwrap_err();
    match err {
        AppError::CatSession(msg) => {
            assert!(msg.starts_with("Invalid or unreachable URL:"));
            assert!(msg.contains("404"));
        }
        other => panic!("Expected CatSession error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_url_for_joins_api_paths() {
    let server = catalogue_server().await;
    let session = session_for(&server, None).await;
    let url = session.url_for("/api/3/action/package_list").unwrap();
    assert_eq!(
        url.as_str(),
        format!("{}/api/3/action/package_list", server.uri())
    );
}

#[tokio::test]
async fn test_untyped_session_is_accepted_by_every_explorer() {
    let server = catalogue_server().await;
    let session = session_for(&server, None).await;

    assert!(CkanCatExplorer::new(&session).is_ok());
    assert!(OpenDataSoftCatExplorer::new(&session).is_ok());
    assert!(FrenchGouvCatExplorer::new(&session).is_ok());
    assert!(OnsNomisCatExplorer::new(&session).is_ok());
}

#[tokio::test]
async fn test_typed_session_rejects_other_explorers() {
    let server = catalogue_server().await;
    let session = session_for(&server, Some(CatalogueType::OpenDataSoft)).await;

    assert!(OpenDataSoftCatExplorer::new(&session).is_ok());

    match CkanCatExplorer::new(&session) {
        Err(AppError::WrongCatalogue {
            expected, received, ..
        }) => {
            assert_eq!(expected, "ckan");
            assert_eq!(received, "opendatasoft");
        }
        other => panic!("Expected WrongCatalogue, got {:?}", other.map(|_| ())),
    }
    assert!(OnsNomisCatExplorer::new(&session).is_err());
}
