use std::sync::Arc;

use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use catlab_db::CategoryLabelDatabase;
use catlab_normalize::Normalizer;
use catlab_slu::handlers::{AppState, router};
use catlab_slu::preprocess::SluPreprocessing;

fn make_state(normalize: bool) -> AppState {
    let cldb = CategoryLabelDatabase::from_source(&json!({
        "city": {
            "Prague": ["prague", "praha"],
            "Karlovy Vary": ["karlovy vary"],
        },
        "stop": {
            "Florenc": ["florenc", "florenc bus station"],
        },
    }))
    .unwrap();
    AppState {
        preprocessing: Arc::new(SluPreprocessing::new(
            Arc::new(cldb),
            Normalizer::default(),
        )),
        normalize,
    }
}

async fn post_json(state: AppState, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = router(state)
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
    (status, body)
}

fn utterance(text: &str) -> Value {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    json!({"kind": "utterance", "tokens": tokens})
}

#[tokio::test]
async fn healthz_ok() {
    let app = router(make_state(true));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/healthz")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn stats_reports_database_size() {
    let app = router(make_state(true));
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body_bytes = to_bytes(response.into_body(), 1024 * 1024).await.unwrap();
    let body: Value = serde_json::from_slice(&body_bytes).unwrap();
    assert_eq!(body["records"], 5);
    assert_eq!(body["forms"], 5);
    assert_eq!(body["homonyms"], 0);
    assert_eq!(body["rules"], 7);
}

#[tokio::test]
async fn normalize_endpoint_cleans_input() {
    let (status, body) = post_json(
        make_state(true),
        "/v1/normalize",
        json!({"input": utterance("UM I'm at Florenc")}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["input"],
        json!({"kind": "utterance", "tokens": ["i", "am", "at", "florenc"]})
    );
}

#[tokio::test]
async fn abstract_endpoint_labels_values_and_da() {
    let (status, body) = post_json(
        make_state(true),
        "/v1/abstract",
        json!({
            "input": utterance("from Florenc Bus Station to Praha"),
            "da": {"items": [
                {"dat": "inform", "name": "from_stop", "value": "Florenc"},
                {"dat": "inform", "name": "city", "value": "Karlovy Vary"},
            ]},
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let tokens = body["input"]["tokens"].as_array().unwrap();
    assert_eq!(tokens.len(), 4);
    assert_eq!(tokens[1]["label"], "STOP");
    assert_eq!(tokens[3]["label"], "CITY");
    assert_eq!(body["category_labels"]["STOP"]["value"], "Florenc");
    assert_eq!(
        body["category_labels"]["STOP"]["surface"],
        json!(["florenc", "bus", "station"])
    );
    assert_eq!(body["da"]["items"][0]["value"], "STOP");
    assert_eq!(body["da"]["items"][0]["orig_value"], "Florenc");
    assert_eq!(body["da"]["items"][1]["value"], "CITY");
}

#[tokio::test]
async fn abstract_aligns_da_with_nblist_input() {
    let (status, body) = post_json(
        make_state(true),
        "/v1/abstract",
        json!({
            "input": {"kind": "nblist", "hyps": [
                {"prob": 0.7, "utterance": {"tokens": ["to", "Praha"]}},
                {"prob": 0.3, "utterance": {"tokens": ["to", "Prague"]}},
            ]},
            "da": {"items": [{"dat": "inform", "name": "city", "value": "Prague"}]},
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["input"]["kind"], "nblist");
    assert_eq!(body["input"]["hyps"][0]["utterance"]["tokens"][1]["label"], "CITY-1");
    assert_eq!(body["input"]["hyps"][1]["utterance"]["tokens"][1]["label"], "CITY");
    assert_eq!(body["da"]["items"][0]["value"], "CITY");
    assert_eq!(body["category_labels"]["CITY"]["surface"], json!(["prague"]));
}

#[tokio::test]
async fn abstract_without_normalization_keeps_case() {
    let (status, body) = post_json(
        make_state(false),
        "/v1/abstract",
        json!({"input": utterance("to Praha")}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["input"]["tokens"], json!(["to", "Praha"]));
    assert_eq!(body["category_labels"], json!({}));
}

#[tokio::test]
async fn abstract_rejects_unsupported_input() {
    let (status, body) = post_json(
        make_state(true),
        "/v1/abstract",
        json!({"input": {"kind": "lattice", "nodes": []}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(
        body["error"]
            .as_str()
            .unwrap_or_default()
            .contains("unsupported input")
    );
}

#[tokio::test]
async fn restore_round_trips_abstracted_input() {
    let state = make_state(true);
    let (_, abstracted) = post_json(
        state.clone(),
        "/v1/abstract",
        json!({"input": utterance("from florenc to praha")}),
    )
    .await;
    let (status, body) = post_json(
        state,
        "/v1/restore",
        json!({
            "category_labels": abstracted["category_labels"],
            "input": abstracted["input"],
            "da_confnet": {"items": [
                {"prob": 0.9, "dai": {"dat": "inform", "name": "to_city", "value": "CITY"}},
            ]},
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["input"], utterance("from florenc to praha"));
    assert_eq!(body["da_confnet"]["items"][0]["dai"]["value"], "praha");
    assert!(body.get("da").is_none());
}

#[tokio::test]
async fn restore_requires_something_to_restore() {
    let (status, body) = post_json(
        make_state(true),
        "/v1/restore",
        json!({"category_labels": {}}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "nothing to restore");
}

#[tokio::test]
async fn parse_endpoint_reads_slots_from_labels() {
    let (status, body) = post_json(
        make_state(true),
        "/v1/parse",
        json!({"input": {
            "kind": "nblist",
            "hyps": [
                {"prob": 0.6, "utterance": {"tokens": ["to", "Praha"]}},
                {"prob": 0.4, "utterance": {"tokens": ["to", "prada"]}},
            ],
        }}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let items = body["da_confnet"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["prob"], 0.6);
    assert_eq!(
        items[0]["dai"],
        json!({"dat": "inform", "name": "city", "value": "praha"})
    );
    assert_eq!(body["abstracted"]["kind"], "nblist");
}
