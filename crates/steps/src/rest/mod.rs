//! REST steps.
//!
//! All handlers share one [`RestClient`], so headers and the endpoint set by
//! one step, and the response received by another, are visible to the steps
//! that follow. The client lives as long as the handler set, i.e. across
//! scenarios of a run.

mod client;

use std::{str::FromStr, sync::Arc};

use anyhow::{Context, Result, anyhow, ensure};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Method;
use serde_json::{Value, json};
use stepwise_engine::{Captures, InterpolatedStep, RunnerHandle, StepHandler};
use stepwise_types::FlightRecorder;
use tracing::debug;

pub use client::{DEFAULT_ACCEPT, RequestBody, RestClient, RestResponse, resolve_url};

use crate::{
    encoding::{encode_uri_component, value_as_text},
    json_query::{contains_subset, ensure_matches, query, require},
    step_pattern,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RestAction {
    SetHeader,
    SetEndpoint,
    Request,
    GetWithQuery,
    RequestWithBody,
    StatusCode,
    ResponseHeader,
    ResponseJson,
    ResponsePayload,
    BodyNotEmpty,
    BodyEqualsString,
    BodyEqualsNumber,
    BodyEqualsBool,
    BodyJson,
    StoreBodyValue,
    StoreHeader,
}

const PATTERNS: &[(&str, RestAction)] = &[
    (r#"^the ([^ ]+) header is "([^"]+)"$"#, RestAction::SetHeader),
    (r#"^the endpoint is "([^"]+)"$"#, RestAction::SetEndpoint),
    (r"^I (GET|PUT|POST|PATCH|DELETE) (?:to )?([^ ]+)$", RestAction::Request),
    (r"^I GET ([^ ]+) with this query$", RestAction::GetWithQuery),
    (r"^the response status code should be ([0-9]+)$", RestAction::StatusCode),
    (r#"^the response ([^ ]+) should be "([^"]+)"$"#, RestAction::ResponseHeader),
    (r"^the response should (equal|match) this JSON$", RestAction::ResponseJson),
    (r"^the response (?:body )?should equal this payload$", RestAction::ResponsePayload),
    (r#"^"([^"]+)" of the response body is not empty$"#, RestAction::BodyNotEmpty),
    (r#"^"([^"]+)" of the response body should equal "([^"]+)"$"#, RestAction::BodyEqualsString),
    (r#"^"([^"]+)" of the response body should equal ([0-9]+)$"#, RestAction::BodyEqualsNumber),
    (r#"^"([^"]+)" of the response body should be (true|false)$"#, RestAction::BodyEqualsBool),
    (r#"^"([^"]+)" of the response body should (equal|match) this JSON$"#, RestAction::BodyJson),
    (
        r"^I (POST|PUT|PATCH) (?:to )?([^ ]+) with this (JSON|payload)$",
        RestAction::RequestWithBody,
    ),
    (
        r#"^I store "([^"]+)" of the response body as "([^"]+)"(?: encoded with (encodeURIComponent))?$"#,
        RestAction::StoreBodyValue,
    ),
    (r#"^I store the ([^ ]+) response header as "([^"]+)"$"#, RestAction::StoreHeader),
];

/// REST step handlers sharing `client`.
pub fn rest_steps(client: Arc<RestClient>) -> Vec<Box<dyn StepHandler>> {
    PATTERNS
        .iter()
        .map(|(pattern, action)| {
            Box::new(RestStep {
                pattern: step_pattern(pattern),
                action: *action,
                client: Arc::clone(&client),
            }) as Box<dyn StepHandler>
        })
        .collect()
}

struct RestStep {
    pattern: Regex,
    action: RestAction,
    client: Arc<RestClient>,
}

#[async_trait]
impl StepHandler for RestStep {
    fn try_match(&self, text: &str) -> Option<Captures> {
        self.pattern
            .captures(text)
            .map(|captures| Captures::from_regex(&self.pattern, &captures))
    }

    async fn run(
        &self,
        captures: Captures,
        step: &InterpolatedStep,
        runner: &mut RunnerHandle<'_>,
        _flight_recorder: &mut FlightRecorder,
    ) -> Result<Value> {
        let client = self.client.as_ref();
        match self.action {
            RestAction::SetHeader => {
                client.set_header(captures.require(0)?, captures.require(1)?).await;
                Ok(Value::Null)
            }
            RestAction::SetEndpoint => {
                client.set_endpoint(captures.require(0)?).await;
                Ok(Value::Null)
            }
            RestAction::Request => {
                let url = send(client, runner, captures.require(0)?, captures.require(1)?, None, None).await?;
                Ok(Value::String(url))
            }
            RestAction::GetWithQuery => {
                let query = step.doc_string_json()?;
                let query = query
                    .as_object()
                    .ok_or_else(|| anyhow!("query of step \"{}\" must be a JSON object", step.text))?;
                let url = send(client, runner, "GET", captures.require(0)?, Some(query), None).await?;
                Ok(Value::String(url))
            }
            RestAction::RequestWithBody => {
                let (payload, body) = if captures.require(2)? == "JSON" {
                    let payload = step.doc_string_json()?;
                    (payload.clone(), RequestBody::Json(payload))
                } else {
                    let payload = step
                        .doc_string()
                        .ok_or_else(|| anyhow!("step \"{}\" requires a doc-string argument", step.text))?
                        .to_string();
                    (Value::String(payload.clone()), RequestBody::Text(payload))
                };
                let url = send(client, runner, captures.require(0)?, captures.require(1)?, None, Some(body)).await?;
                Ok(json!([url, payload]))
            }
            RestAction::StatusCode => {
                let expected: u16 = captures.require(0)?.parse().context("invalid status code")?;
                let response = client.response().await?;
                ensure!(
                    response.status_code == expected,
                    "expected status code {expected}, got {} with body {}",
                    response.status_code,
                    response.text
                );
                Ok(json!(response.status_code))
            }
            RestAction::ResponseHeader => {
                let (name, expected) = (captures.require(0)?, captures.require(1)?);
                let response = client.response().await?;
                let actual = response
                    .header(name)
                    .ok_or_else(|| anyhow!("response has no {name} header"))?;
                ensure!(actual == expected, "expected {name} header \"{expected}\", got \"{actual}\"");
                Ok(Value::String(actual.to_string()))
            }
            RestAction::ResponseJson => {
                let expected = step.doc_string_json()?;
                let body = client.response().await?.body_value();
                ensure_matches(&body, &expected, captures.require(0)? == "match")?;
                Ok(body)
            }
            RestAction::ResponsePayload => {
                let expected = step
                    .doc_string()
                    .ok_or_else(|| anyhow!("step \"{}\" requires a doc-string argument", step.text))?
                    .trim();
                let response = client.response().await?;
                let actual = match &response.body {
                    Some(Value::String(text)) => text.clone(),
                    _ => response.text.trim().to_string(),
                };
                ensure!(actual == expected, "expected response body \"{expected}\", got \"{actual}\"");
                Ok(Value::String(actual))
            }
            RestAction::BodyNotEmpty => {
                let body = client.response().await?.body_value();
                Ok(require(&body, captures.require(0)?)?.clone())
            }
            RestAction::BodyEqualsString => {
                let expected = Value::String(captures.require(1)?.to_string());
                assert_body_value(client, captures.require(0)?, &expected).await
            }
            RestAction::BodyEqualsNumber => {
                let expected: u64 = captures.require(1)?.parse().context("invalid number")?;
                assert_body_value(client, captures.require(0)?, &json!(expected)).await
            }
            RestAction::BodyEqualsBool => {
                let expected = Value::Bool(captures.require(1)? == "true");
                assert_body_value(client, captures.require(0)?, &expected).await
            }
            RestAction::BodyJson => {
                let expected = step.doc_string_json()?;
                let body = client.response().await?.body_value();
                let actual = require(&body, captures.require(0)?)?;
                ensure_matches(actual, &expected, captures.require(1)? == "match")?;
                Ok(actual.clone())
            }
            RestAction::StoreBodyValue => {
                let (expression, store_name) = (captures.require(0)?, captures.require(1)?);
                let body = client.response().await?.body_value();
                let value = require(&body, expression)?.clone();
                let stored = match captures.get(2) {
                    Some(_) => Value::String(encode_uri_component(&value_as_text(&value))),
                    None => value.clone(),
                };
                runner.store_mut().insert(store_name, stored);
                Ok(value)
            }
            RestAction::StoreHeader => {
                let (name, store_name) = (captures.require(0)?, captures.require(1)?);
                let response = client.response().await?;
                let value = response
                    .header(name)
                    .ok_or_else(|| anyhow!("response has no {name} header"))?
                    .to_string();
                runner.store_mut().insert(store_name, value.clone());
                Ok(Value::String(value))
            }
        }
    }

    fn describe(&self) -> String {
        self.pattern.as_str().to_string()
    }
}

async fn send(
    client: &RestClient,
    runner: &mut RunnerHandle<'_>,
    method: &str,
    path: &str,
    query: Option<&serde_json::Map<String, Value>>,
    body: Option<RequestBody>,
) -> Result<String> {
    let method = Method::from_str(method).map_err(|error| anyhow!(error))?;
    let url = resolve_url(&client.endpoint().await, path);
    runner.progress(method.as_str(), &url);
    if let Some(RequestBody::Json(payload)) = &body {
        runner.progress(">", payload.to_string());
    }
    let url = client.request(method, path, query, body).await?;
    let response = client.response().await?;
    runner.progress("<", format!("{} {}", response.status_code, response.text));
    debug!(url = %url, status_code = response.status_code, "request completed");
    Ok(url)
}

async fn assert_body_value(client: &RestClient, expression: &str, expected: &Value) -> Result<Value> {
    let body = client.response().await?.body_value();
    let actual = query(&body, expression).cloned().unwrap_or(Value::Null);
    ensure!(
        contains_subset(&actual, expected),
        "expected \"{expression}\" of the response body to equal {expected}, got {actual}"
    );
    Ok(actual)
}
