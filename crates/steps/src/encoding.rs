//! Named encoders and decoders used by the storage steps.
//!
//! Built-in encoders: `base64`, `JSON` (double stringified JSON, ready to be
//! embedded in another JSON string), `replaceNewLines` and `querystring`.
//! Built-in decoder: `base64`.

use std::{fmt, sync::Arc};

use anyhow::{Context, Result, anyhow};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use indexmap::IndexMap;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde_json::Value;

/// Characters escaped by JavaScript's `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_uri_component(input: &str) -> String {
    utf8_percent_encode(input, URI_COMPONENT).to_string()
}

/// Strings as-is, everything else as compact JSON.
pub(crate) fn value_as_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

pub type Codec = Arc<dyn Fn(&Value) -> Result<String> + Send + Sync>;

/// Encoder and decoder tables, looked up by the name used in step text.
#[derive(Clone)]
pub struct Codecs {
    encoders: IndexMap<String, Codec>,
    decoders: IndexMap<String, Codec>,
}

impl fmt::Debug for Codecs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codecs")
            .field("encoders", &self.encoders.keys().collect::<Vec<_>>())
            .field("decoders", &self.decoders.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl Default for Codecs {
    fn default() -> Self {
        Self::empty()
            .with_encoder("base64", |value| Ok(STANDARD.encode(value_as_text(value))))
            .with_encoder("JSON", encode_json)
            .with_encoder("replaceNewLines", |value| Ok(value_as_text(value).replace('\n', "\\n")))
            .with_encoder("querystring", encode_query_string)
            .with_decoder("base64", decode_base64)
    }
}

impl Codecs {
    pub fn empty() -> Self {
        Self {
            encoders: IndexMap::new(),
            decoders: IndexMap::new(),
        }
    }

    pub fn with_encoder<F>(mut self, name: impl Into<String>, encoder: F) -> Self
    where
        F: Fn(&Value) -> Result<String> + Send + Sync + 'static,
    {
        self.encoders.insert(name.into(), Arc::new(encoder));
        self
    }

    pub fn with_decoder<F>(mut self, name: impl Into<String>, decoder: F) -> Self
    where
        F: Fn(&Value) -> Result<String> + Send + Sync + 'static,
    {
        self.decoders.insert(name.into(), Arc::new(decoder));
        self
    }

    pub fn encode(&self, name: &str, value: &Value) -> Result<String> {
        let encoder = self.encoders.get(name).ok_or_else(|| anyhow!("unknown encoder \"{name}\""))?;
        encoder(value).with_context(|| format!("Encoding using {name} failed"))
    }

    pub fn decode(&self, name: &str, value: &Value) -> Result<String> {
        let decoder = self.decoders.get(name).ok_or_else(|| anyhow!("unknown decoder \"{name}\""))?;
        decoder(value).with_context(|| format!("Decoding using {name} failed"))
    }
}

fn encode_json(value: &Value) -> Result<String> {
    let parsed = match value {
        Value::String(text) => serde_json::from_str::<Value>(text).context("input is not valid JSON")?,
        other => other.clone(),
    };
    Ok(serde_json::to_string(&Value::String(parsed.to_string()))?)
}

fn encode_query_string(value: &Value) -> Result<String> {
    let object = value
        .as_object()
        .ok_or_else(|| anyhow!("querystring encoding needs a JSON object, got {value}"))?;
    Ok(object
        .iter()
        .map(|(key, value)| {
            format!(
                "{}={}",
                encode_uri_component(key),
                encode_uri_component(&value_as_text(value))
            )
        })
        .collect::<Vec<_>>()
        .join("&"))
}

fn decode_base64(value: &Value) -> Result<String> {
    let bytes = STANDARD.decode(value_as_text(value).trim())?;
    Ok(String::from_utf8(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn uri_components_are_escaped_like_javascript() {
        assert_eq!(encode_uri_component("a b&c=d/é"), "a%20b%26c%3Dd%2F%C3%A9");
        assert_eq!(encode_uri_component("keep-_.!~*'()"), "keep-_.!~*'()");
    }

    #[test]
    fn built_in_encoders() {
        let codecs = Codecs::default();
        assert_eq!(codecs.encode("base64", &json!("hello")).expect("base64"), "aGVsbG8=");
        assert_eq!(codecs.decode("base64", &json!("aGVsbG8=")).expect("base64"), "hello");
        assert_eq!(
            codecs.encode("JSON", &json!(r#"{ "a": 1 }"#)).expect("json"),
            r#""{\"a\":1}""#
        );
        assert_eq!(codecs.encode("replaceNewLines", &json!("a\nb")).expect("newlines"), "a\\nb");
        assert_eq!(codecs.encode("querystring", &json!({"q": "a b"})).expect("querystring"), "q=a%20b");
        let encoded = codecs.encode("querystring", &json!({"q": "x", "n": 2})).expect("querystring");
        let mut pairs: Vec<&str> = encoded.split('&').collect();
        pairs.sort();
        assert_eq!(pairs, vec!["n=2", "q=x"]);
    }

    #[test]
    fn unknown_codecs_and_bad_input_fail() {
        let codecs = Codecs::default();
        assert!(codecs.encode("rot13", &json!("x")).is_err());
        let error = codecs.encode("querystring", &json!("x")).expect_err("needs object");
        assert!(format!("{error:#}").contains("Encoding using querystring failed"));
    }
}
