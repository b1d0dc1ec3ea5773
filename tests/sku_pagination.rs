use inspector::{ClientBuilder, InspectorError, Sku};
use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> inspector::Client {
    ClientBuilder::new()
        .instance(server.uri())
        .api_key("test-key")
        .max_retries(0)
        .build()
        .unwrap()
}

fn page(count: u64, next: Option<String>, results: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "count": count,
        "next": next,
        "previous": null,
        "results": results,
    }))
}

async fn mount_page(server: &MockServer, offset: &str, body: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path("/sku/"))
        .and(query_param("offset", offset))
        .respond_with(body)
        .expect(1)
        .mount(server)
        .await;
}

fn first_page() -> Value {
    json!([
        {
            "id": 1, "cid": "SKU001", "ean13": "1234567890123", "image": 1001,
            "name": "Product 1", "brand": 1, "category": 1, "manufacturer": 1,
            "size_x_mm": 100.0, "size_y_mm": 200.0, "size_z_mm": 50.0
        },
        {
            "id": 2, "cid": "SKU002", "ean13": null, "image": 1002,
            "name": "Product 2", "brand": null, "category": 1, "manufacturer": null,
            "size_x_mm": null, "size_y_mm": null, "size_z_mm": null
        }
    ])
}

fn second_page() -> Value {
    json!([{"id": 3, "cid": "SKU003", "name": "Product 3", "image": 1003}])
}

fn ids(skus: &[Sku]) -> Vec<i64> {
    skus.iter().map(|s| s.id).collect()
}

#[tokio::test]
async fn get_all_sku_follows_next_cursor() {
    let server = MockServer::start().await;
    let next = format!("{}/sku/?limit=2&offset=2", server.uri());
    mount_page(&server, "0", page(3, Some(next), first_page())).await;
    mount_page(&server, "2", page(3, None, second_page())).await;

    let all = client(&server).get_all_sku(2).await.unwrap();

    assert_eq!(ids(&all), vec![1, 2, 3]);
    assert_eq!(all[0].cid.as_deref(), Some("SKU001"));
    assert_eq!(all[0].size_x_mm, Some(100.0));
    assert_eq!(all[1].ean13, None);
    assert_eq!(all[2].cid.as_deref(), Some("SKU003"));

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 2);
    assert!(requests
        .iter()
        .all(|r| r.url.query_pairs().any(|(k, v)| k == "limit" && v == "2")));
}

#[tokio::test]
async fn single_page_then_end_marker() {
    let server = MockServer::start().await;
    mount_page(&server, "0", page(2, None, first_page())).await;

    let client = client(&server);
    let mut it = client.iterate_sku(10);

    assert_eq!(it.next_page().await.unwrap().map(|p| p.len()), Some(2));
    assert!(it.next_page().await.unwrap().is_none());
    assert!(it.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn empty_catalog() {
    let server = MockServer::start().await;
    mount_page(&server, "0", page(0, None, json!([]))).await;

    let client = client(&server);
    let mut it = client.iterate_sku(10);

    assert_eq!(it.next_page().await.unwrap(), Some(vec![]));
    assert_eq!(it.next_page().await.unwrap(), None);
}

#[tokio::test]
async fn default_page_size_is_requested() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sku/"))
        .and(query_param("limit", "100"))
        .and(query_param("offset", "0"))
        .respond_with(page(0, None, json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let all = client(&server).get_all_sku(0).await.unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn server_cursor_loop_is_detected() {
    let server = MockServer::start().await;
    let back_to_start = format!("{}/sku/?limit=2&offset=0", server.uri());
    let to_two = format!("{}/sku/?limit=2&offset=2", server.uri());
    mount_page(&server, "0", page(4, Some(to_two), first_page())).await;
    mount_page(&server, "2", page(4, Some(back_to_start), second_page())).await;

    let err = client(&server).get_all_sku(2).await.unwrap_err();

    assert!(matches!(err, InspectorError::PaginationLoop { offset: 0 }));
}

#[tokio::test]
async fn server_error_aborts_iteration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sku/"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({"error": "internal server error"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let err = client(&server).get_all_sku(10).await.unwrap_err();

    assert!(err.to_string().contains("failed to fetch SKU page at offset 0"));
    match err {
        InspectorError::PageFetch { source, .. } => {
            assert!(matches!(*source, InspectorError::Api { status_code: 500, .. }));
        }
        other => panic!("unexpected error: {other}"),
    }
}
