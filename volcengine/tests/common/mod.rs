//! Shared setup for the mock-server tests

#![allow(dead_code)]

use mockito::{Matcher, Server, ServerGuard};
use serde_json::{json, Value};
use std::collections::HashMap;
use tfdispatch::Dynamic;
use volcengine::VolcengineProvider;

pub async fn server() -> ServerGuard {
    Server::new_async().await
}

/// Provider pointed at the mock server
pub fn provider(url: &str) -> VolcengineProvider {
    let mut values = HashMap::new();
    values.insert("access_key".to_string(), Dynamic::string("test-ak"));
    values.insert("secret_key".to_string(), Dynamic::string("test-sk"));
    values.insert("region".to_string(), Dynamic::string("cn-beijing"));
    values.insert("endpoint".to_string(), Dynamic::string(url));

    let mut provider = VolcengineProvider::new();
    let diags = provider.configure(&values);
    assert!(!diags.has_errors(), "configure failed: {:?}", diags.errors);
    provider
}

/// Successful response envelope around `result`
pub fn envelope(action: &str, result: Value) -> String {
    json!({
        "ResponseMetadata": {"RequestId": "req-1", "Action": action, "Version": "2020-04-01"},
        "Result": result
    })
    .to_string()
}

pub fn error_envelope(action: &str, code: &str) -> String {
    json!({
        "ResponseMetadata": {
            "RequestId": "req-err",
            "Action": action,
            "Error": {"Code": code, "Message": code}
        }
    })
    .to_string()
}

/// Matches `Action=<action>` plus the given extra query pairs
pub fn action(name: &str, extra: &[(&str, &str)]) -> Matcher {
    let mut matchers = vec![Matcher::UrlEncoded("Action".into(), name.into())];
    matchers.extend(
        extra
            .iter()
            .map(|(k, v)| Matcher::UrlEncoded(k.to_string(), v.to_string())),
    );
    Matcher::AllOf(matchers)
}

pub fn values(pairs: &[(&str, Dynamic)]) -> HashMap<String, Dynamic> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn block(pairs: &[(&str, &str)]) -> Dynamic {
    Dynamic::Map(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), Dynamic::string(*v)))
            .collect(),
    )
}
