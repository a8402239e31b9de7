use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, Query},
    http::{StatusCode, header},
    routing::get,
};
use serde_json::{Value, json};
use stepwise_engine::{FeatureRunner, RunConfig, contextualize, resolve_features};
use stepwise_steps::{RestClient, default_steps};
use stepwise_types::{
    ContextualizedFeature, Feature, RunResult, Scenario, ScenarioResult, Step, StepFailureKind, World,
};

async fn get_thing(Path(id): Path<u32>) -> Json<Value> {
    Json(json!({"id": id, "name": format!("thing-{id}"), "active": true, "tags": ["a", "b"]}))
}

async fn list_things() -> Json<Value> {
    Json(json!([]))
}

async fn create_thing(Json(body): Json<Value>) -> (StatusCode, [(header::HeaderName, String); 1], Json<Value>) {
    let name = body.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
    (
        StatusCode::CREATED,
        [(header::LOCATION, format!("/things/{name}"))],
        Json(json!({"name": name, "created": true})),
    )
}

async fn search(Query(params): Query<HashMap<String, String>>) -> Json<Value> {
    Json(json!({"q": params.get("q")}))
}

async fn plain_text() -> &'static str {
    "plain text"
}

async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/things", get(list_things).post(create_thing))
        .route("/things/{id}", get(get_thing))
        .route("/search", get(search))
        .route("/text", get(plain_text));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind listener");
    let address = listener.local_addr().expect("local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("server runs");
    });
    address
}

fn given(text: &str) -> Step {
    Step::new("Given", text)
}

fn features(scenarios: Vec<Scenario>) -> Vec<ContextualizedFeature> {
    let feature = Feature {
        name: "REST".into(),
        background: vec![given(r#"the endpoint is "<endpoint>""#)],
        scenarios,
        ..Default::default()
    };
    resolve_features(vec![feature])
        .expect("resolved")
        .into_iter()
        .flat_map(contextualize)
        .collect()
}

fn scenario(name: &str, steps: Vec<Step>) -> Scenario {
    Scenario {
        name: name.into(),
        steps,
        ..Default::default()
    }
}

async fn run(address: SocketAddr, scenarios: Vec<Scenario>) -> RunResult {
    let world = World::new(
        json!({"endpoint": format!("http://{address}")})
            .as_object()
            .cloned()
            .unwrap_or_default(),
    );
    let client = Arc::new(RestClient::new().expect("client"));
    let runner = FeatureRunner::new(RunConfig::new("unused").with_world(world)).add_step_handlers(default_steps(client));
    runner.run_features(&features(scenarios)).await.expect("run completes")
}

fn only_scenario(result: &RunResult) -> &ScenarioResult {
    &result.feature_results[0].scenario_results[0]
}

#[tokio::test]
async fn get_request_and_body_assertions_pass() {
    let address = spawn_server().await;
    let result = run(
        address,
        vec![scenario(
            "Fetch a thing",
            vec![
                given("I GET /things/42"),
                given("the response status code should be 200"),
                given(r#"the response content-type should be "application/json""#),
                given(r#""name" of the response body should equal "thing-42""#),
                given(r#""id" of the response body should equal 42"#),
                given(r#""active" of the response body should be true"#),
                given(r#""tags[1]" of the response body is not empty"#),
                given(r#"I store "name" of the response body as "thingName""#),
                given(r#""thingName" should equal "thing-42""#),
            ],
        )],
    )
    .await;

    let scenario = only_scenario(&result);
    assert!(result.success, "scenario failed: {:?}", scenario.error);
    assert_eq!(scenario.steps[1].result, json!(format!("http://{address}/things/42")));
}

#[tokio::test]
async fn post_with_json_payload_and_header_storage() {
    let address = spawn_server().await;
    let result = run(
        address,
        vec![scenario(
            "Create a thing",
            vec![
                given(r#"I have a random UUID in "requestId""#),
                given(r#"the X-Request-Id header is "<requestId>""#),
                given("I POST to /things with this JSON").with_doc_string(r#"{"name": "widget"}"#),
                given("the response status code should be 201"),
                given("the response should match this JSON").with_doc_string(r#"{"created": true}"#),
                given(r#"I store the Location response header as "location""#),
                given(r#""location" should equal "/things/widget""#),
            ],
        )],
    )
    .await;

    assert!(result.success, "scenario failed: {:?}", only_scenario(&result).error);
}

#[tokio::test]
async fn get_with_query_parameters() {
    let address = spawn_server().await;
    let result = run(
        address,
        vec![scenario(
            "Search",
            vec![
                given("I GET /search with this query").with_doc_string(r#"{"q": "rust"}"#),
                given(r#""q" of the response body should equal "rust""#),
                given("the response should equal this JSON").with_doc_string(r#"{"q": "rust"}"#),
            ],
        )],
    )
    .await;

    assert!(result.success, "scenario failed: {:?}", only_scenario(&result).error);
}

#[tokio::test]
async fn unexpected_status_code_fails_the_scenario() {
    let address = spawn_server().await;
    let result = run(
        address,
        vec![scenario(
            "Wrong status",
            vec![given("I GET /things"), given("the response status code should be 404")],
        )],
    )
    .await;

    let scenario = only_scenario(&result);
    assert!(!result.success);
    let error = scenario.error.as_ref().expect("error recorded");
    assert_eq!(error.kind, StepFailureKind::Execution);
    assert!(error.message.contains("expected status code 404, got 200"), "{}", error.message);
}

#[tokio::test]
async fn responses_outside_the_accept_header_fail() {
    let address = spawn_server().await;
    let result = run(address, vec![scenario("Plain text", vec![given("I GET /text")])]).await;

    let error = only_scenario(&result).error.as_ref().expect("error recorded");
    assert!(
        error.message.contains("does not match accepted media-type application/json"),
        "{}",
        error.message
    );
}

#[tokio::test]
async fn storage_steps_transform_the_store() {
    let address = spawn_server().await;
    let result = run(
        address,
        vec![scenario(
            "Encode and decode",
            vec![
                given(r#"I encode this payload into "encoded" using base64"#).with_doc_string("hello"),
                given(r#""encoded" should equal "aGVsbG8=""#),
                given(r#"I decode "encoded" into "decoded" using base64"#),
                given(r#""decoded" should be "hello""#),
                given(r#"I encode this payload into "raw" using replaceNewLines"#).with_doc_string(r#"{"a": [1, 2]}"#),
                given(r#"I store "raw" into "copy""#),
                given(r#"I parse "copy" into "parsed""#),
                given(r#""parsed.a[1]" should equal 2"#),
                given(r#""parsed" should match this JSON"#).with_doc_string(r#"{"a": [2]}"#),
                given(r#"I store a random number between 1 and 3 into "n""#),
            ],
        )],
    )
    .await;

    let scenario = only_scenario(&result);
    assert!(result.success, "scenario failed: {:?}", scenario.error);
    let random = scenario.steps.last().expect("steps").result.as_u64().expect("number");
    assert!((1..=3).contains(&random));
}
