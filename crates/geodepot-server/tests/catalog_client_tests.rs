//! HTTP-level tests for the GeoServer catalog client

use std::io::Write;
use std::time::Duration;

use geodepot_server::catalog::{
    CatalogClient, CatalogSyncError, GeoServerClient, StoreKind, StoreOptions,
};
use geodepot_server::config::CatalogConfig;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client_for(server: &MockServer, timeout_secs: u64) -> GeoServerClient {
    GeoServerClient::new(&CatalogConfig {
        base_url: server.uri(),
        workspace: "geodepot".to_string(),
        username: Some("admin".to_string()),
        password: Some("geoserver".to_string()),
        timeout_secs,
        log_file: None,
    })
    .expect("client should build")
}

fn payload_file(name: &str) -> tempfile::TempPath {
    let mut file = tempfile::Builder::new()
        .suffix(name)
        .tempfile()
        .expect("temp file");
    file.write_all(b"payload bytes").expect("write payload");
    file.into_temp_path()
}

fn vector_opts(overwrite: bool) -> StoreOptions {
    StoreOptions {
        kind: StoreKind::Vector,
        charset: "UTF-8".to_string(),
        overwrite,
    }
}

#[tokio::test]
async fn create_store_returns_handle_with_bounding_box() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/rest/workspaces/geodepot/datastores/roads/file.shp"))
        .and(query_param("update", "overwrite"))
        .and(query_param("charset", "UTF-8"))
        .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
            "boundingBox": [-10.0, -5.0, 10.0, 5.0]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let base = payload_file("roads.shp");

    let handle = client
        .create_or_replace_store("roads", &base, &vector_opts(true))
        .await
        .expect("create should succeed");

    assert_eq!(handle.type_name, "roads");
    assert_eq!(handle.kind, StoreKind::Vector);
    assert_eq!(handle.bounding_box, Some([-10.0, -5.0, 10.0, 5.0]));
}

#[tokio::test]
async fn zip_archives_upload_through_the_shapefile_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/rest/workspaces/geodepot/datastores/parcels/file.shp"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let base = payload_file("parcels.zip");

    client
        .create_or_replace_store("parcels", &base, &vector_opts(false))
        .await
        .expect("zip upload should succeed");
}

#[tokio::test]
async fn rejected_store_surfaces_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(500).set_body_string("projection unsupported"))
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let base = payload_file("roads.shp");

    let err = client
        .create_or_replace_store("roads", &base, &vector_opts(false))
        .await
        .expect_err("500 must be an error");

    match err {
        CatalogSyncError::Rejected {
            type_name,
            status,
            message,
        } => {
            assert_eq!(type_name, "roads");
            assert_eq!(status, 500);
            assert_eq!(message, "projection unsupported");
        },
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn delete_of_absent_store_is_ok() {
    let server = MockServer::start().await;
    // Both collections report the store missing.
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    client
        .delete_store("ghost")
        .await
        .expect("absent store deletes as success");
}

#[tokio::test]
async fn delete_cascades_with_recurse() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/workspaces/geodepot/datastores/roads"))
        .and(query_param("recurse", "true"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/workspaces/geodepot/coveragestores/roads"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    client.delete_store("roads").await.expect("delete succeeds");
}

#[tokio::test]
async fn delete_rejection_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(403).set_body_string("store is locked"))
        .mount(&server)
        .await;

    let client = client_for(&server, 5);
    let err = client
        .delete_store("roads")
        .await
        .expect_err("403 must be an error");

    assert!(matches!(
        err,
        CatalogSyncError::Rejected { status: 403, .. }
    ));
}

#[tokio::test]
async fn slow_catalog_maps_to_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let client = client_for(&server, 1);
    let base = payload_file("roads.shp");

    let err = client
        .create_or_replace_store("roads", &base, &vector_opts(false))
        .await
        .expect_err("must time out");

    assert!(matches!(err, CatalogSyncError::Timeout(_)));
}
