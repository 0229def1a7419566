use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use bridge_api_server::{AppState, router};
use bridge_relay::{PassthroughDecoder, PublishClient, RelayHandler};
use delta_store::{EventStore, MemoryEventStore, QueryGateway, StoreConfig};

/// One record: key `"a"`, value `{"foo":1}`, both base64.
fn relay_batch() -> serde_json::Value {
    serde_json::json!({
        "records": {
            "taxi-rides-0": [
                { "key": "YQ==", "value": "eyJmb28iOjF9", "partition": 0, "offset": 5, "timestamp": 1000 }
            ]
        }
    })
}

fn app() -> Router {
    let config = StoreConfig::default();
    let store: Arc<dyn EventStore> = Arc::new(MemoryEventStore::new(&config));
    let gateway = Arc::new(QueryGateway::new(store.clone(), config));
    let publisher = Arc::new(PublishClient::new(None, None).unwrap());
    let relay = RelayHandler::new(Arc::new(PassthroughDecoder), publisher).with_archive(store);
    router(AppState::new(gateway, Arc::new(relay)))
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, serde_json::Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn create(
    app: &Router,
    topic: &str,
    key: Option<&str>,
    data: serde_json::Value,
) -> serde_json::Value {
    let (status, event) = call(
        app,
        post_json("/api/events", serde_json::json!({ "topic": topic, "key": key, "data": data })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    event
}

#[tokio::test]
async fn test_create_then_get() {
    let app = app();
    let event = create(&app, "taxi-rides", Some("k1"), serde_json::json!({ "fare": 10 })).await;
    assert_eq!(event["version"], 1);
    assert_eq!(event["deleted"], false);
    assert_eq!(event["topic"], "taxi-rides");

    let id = event["id"].as_str().unwrap();
    let (status, fetched) = call(&app, get(&format!("/api/events/{id}"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched, event);
}

#[tokio::test]
async fn test_get_missing_is_404() {
    let (status, body) = call(&app(), get("/api/events/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].as_str().unwrap().contains("nope"));
}

#[tokio::test]
async fn test_create_with_empty_topic_is_400() {
    let (status, _) = call(
        &app(),
        post_json("/api/events", serde_json::json!({ "topic": "", "data": {} })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_topic_query_pages_with_next_token() {
    let app = app();
    for i in 0..5 {
        create(&app, "taxi-rides", None, serde_json::json!({ "n": i })).await;
    }
    create(&app, "orders", None, serde_json::json!({})).await;

    let (status, first) = call(&app, get("/api/topics/taxi-rides/events?limit=2")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["items"].as_array().unwrap().len(), 2);
    let token = first["nextToken"].as_str().unwrap();

    let (_, rest) = call(
        &app,
        get(&format!("/api/topics/taxi-rides/events?nextToken={token}")),
    )
    .await;
    assert_eq!(rest["items"].as_array().unwrap().len(), 3);
    assert!(rest["nextToken"].is_null());
    assert!(rest["startedAt"].as_i64().unwrap() > 0);
}

#[tokio::test]
async fn test_bad_cursor_is_400() {
    let (status, _) = call(&app(), get("/api/events?nextToken=notjson")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_inverted_time_range_is_400() {
    let (status, _) = call(
        &app(),
        get("/api/topics/t/events?startTime=20&endTime=10"),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_list_filters_by_key() {
    let app = app();
    create(&app, "a", Some("k1"), serde_json::json!(1)).await;
    create(&app, "a", Some("k2"), serde_json::json!(2)).await;

    let (_, page) = call(&app, get("/api/events?topic=a&key=k2")).await;
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["key"], "k2");
}

#[tokio::test]
async fn test_sync_returns_changes_after_last_sync() {
    let app = app();
    let event = create(&app, "taxi-rides", Some("k1"), serde_json::json!({})).await;

    let (status, page) = call(&app, get("/api/sync?lastSync=0")).await;
    assert_eq!(status, StatusCode::OK);
    let items = page["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["event"]["id"], event["id"]);
    assert_eq!(items[0]["kind"], "create");

    let after = page["startedAt"].as_i64().unwrap() + 60_000;
    let (_, page) = call(&app, get(&format!("/api/sync?lastSync={after}"))).await;
    assert!(page["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_latest_scoped_to_topic() {
    let app = app();
    create(&app, "a", None, serde_json::json!(1)).await;
    create(&app, "b", None, serde_json::json!(2)).await;

    let (_, scoped) = call(&app, get("/api/latest?topic=b&limit=5")).await;
    let items = scoped["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["topic"], "b");

    let (_, all) = call(&app, get("/api/latest")).await;
    assert_eq!(all["items"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_relay_counts_and_archives() {
    let app = app();
    let (status, summary) = call(&app, post_json("/api/relay", relay_batch())).await;
    assert_eq!(status, StatusCode::OK);
    // No publish endpoint: the record fails to publish but is still archived.
    assert_eq!(summary, serde_json::json!({ "processed": 0, "errors": 1, "saved": 1 }));

    let (status, stored) = call(&app, get("/api/events/taxi-rides-0-5")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(stored["data"], serde_json::json!({ "foo": 1 }));
    assert_eq!(stored["key"], "a");
    assert_eq!(stored["timestamp"], 1000);
}
