//! Shared helpers for the client integration tests.

use std::time::Duration;

use herding_cats_client::{CatSession, HttpFetcher};
use herding_cats_core::{CatalogueType, HttpConfig};
use rust_xlsxwriter::{ExcelDateTime, Format, Workbook};
use serde_json::{Value, json};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// HTTP client with short delays so retry paths stay fast.
pub fn fast_http() -> HttpFetcher {
    HttpFetcher::with_config(HttpConfig {
        timeout: Duration::from_secs(5),
        max_retries: 2,
        retry_base_delay: Duration::from_millis(10),
        validation_timeout: Duration::from_secs(5),
    })
    .expect("http client")
}

/// Starts a mock server whose root answers the session probe.
pub async fn catalogue_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&server)
        .await;
    server
}

/// Opens a session on `server`, optionally declaring its platform.
pub async fn session_for(server: &MockServer, catalogue_type: Option<CatalogueType>) -> CatSession {
    CatSession::connect_with(server.uri(), catalogue_type, fast_http())
        .await
        .expect("session")
}

/// Wraps `result` in the CKAN response envelope.
pub fn ckan_ok(result: Value) -> Value {
    json!({"success": true, "result": result})
}

/// Mounts a GET handler returning `body` as JSON.
pub async fn mount_json(server: &MockServer, route: &str, body: Value) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts a GET handler returning raw bytes.
pub async fn mount_bytes(server: &MockServer, route: &str, body: impl Into<Vec<u8>>) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.into()))
        .mount(server)
        .await;
}

/// A Nomis-style xlsx extract: a "Data" sheet with two title rows above the
/// header, and a "Notes" sheet.
pub fn nomis_workbook() -> Vec<u8> {
    let mut workbook = Workbook::new();
    let date_format = Format::new().set_num_format("yyyy-mm-dd");

    let data = workbook.add_worksheet();
    data.set_name("Data").expect("sheet name");
    data.write_string(0, 0, "Jobseeker's Allowance with rates and proportions")
        .expect("title");
    data.write_string(1, 0, "ONS Crown Copyright Reserved").expect("title");
    for (c, header) in ["geography", "period", "claimants"].iter().enumerate() {
        data.write_string(2, c as u16, *header).expect("header");
    }
    let rows = [("Hartlepool", 15, 1520.0), ("Middlesbrough", 15, 2310.0), ("Hartlepool", 16, 1490.0)];
    for (r, (place, day, claimants)) in rows.iter().enumerate() {
        let r = r as u32 + 3;
        let date = ExcelDateTime::from_ymd(2024, 3, *day).expect("date");
        data.write_string(r, 0, *place).expect("cell");
        data.write_datetime_with_format(r, 1, &date, &date_format)
            .expect("cell");
        data.write_number(r, 2, *claimants).expect("cell");
    }

    let notes = workbook.add_worksheet();
    notes.set_name("Notes").expect("sheet name");
    notes.write_string(0, 0, "Figures are not seasonally adjusted").expect("cell");

    workbook.save_to_buffer().expect("xlsx")
}
