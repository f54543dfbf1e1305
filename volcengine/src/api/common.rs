//! Common types and utilities for the Volcengine OpenAPI

use serde::Deserialize;
use serde_json::Value;
use tfdispatch::Params;

/// `{"ResponseMetadata": {...}, "Result": {...}}`
#[derive(Debug, Deserialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "ResponseMetadata")]
    pub metadata: ResponseMetadata,
    #[serde(rename = "Result", default)]
    pub result: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseMetadata {
    #[serde(default)]
    pub request_id: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub error: Option<ResponseError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}

/// Object storage error body
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BypassError {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub request_id: String,
}

#[derive(Debug, Clone, Default)]
pub struct ApiQueryParams {
    params: Vec<(String, String)>,
}

impl ApiQueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<K: Into<String>, V: ToString>(mut self, key: K, value: V) -> Self {
        self.params.push((key.into(), value.to_string()));
        self
    }

    /// Flat request parameters; nested values are sent as JSON text
    pub fn extend_params(mut self, params: &Params) -> Self {
        for (key, value) in params {
            let text = match value {
                Value::Null => continue,
                Value::String(s) => s.clone(),
                Value::Bool(b) => b.to_string(),
                Value::Number(n) => n.to_string(),
                other => other.to_string(),
            };
            self.params.push((key.clone(), text));
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// `a=1&b=2`, keys sorted so requests are canonical
    pub fn encode(&self) -> String {
        let mut pairs = self.params.clone();
        pairs.sort();
        pairs
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&")
    }

    pub fn to_query_string(&self) -> String {
        if self.params.is_empty() {
            String::new()
        } else {
            format!("?{}", self.encode())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_parses_result_and_error() {
        let ok: ResponseEnvelope = serde_json::from_value(json!({
            "ResponseMetadata": {"RequestId": "r-1", "Action": "CreateAcl", "Version": "2020-04-01"},
            "Result": {"AclId": "acl-1"}
        }))
        .unwrap();
        assert!(ok.metadata.error.is_none());
        assert_eq!(ok.result["AclId"], "acl-1");

        let failed: ResponseEnvelope = serde_json::from_value(json!({
            "ResponseMetadata": {
                "RequestId": "r-2",
                "Action": "DescribeAclAttributes",
                "Error": {"Code": "InvalidAcl.NotFound", "Message": "not found"}
            }
        }))
        .unwrap();
        let error = failed.metadata.error.unwrap();
        assert_eq!(error.code, "InvalidAcl.NotFound");
        assert!(failed.result.is_null());
    }

    #[test]
    fn query_is_sorted_and_encoded() {
        let mut params = Params::new();
        params.insert("AclEntries.1.Entry".to_string(), json!("172.20.1.0/24"));
        params.insert("PageSize".to_string(), json!(10));
        params.insert("Skip".to_string(), Value::Null);

        let query = ApiQueryParams::new()
            .add("Version", "2020-04-01")
            .add("Action", "AddAclEntries")
            .extend_params(&params);
        assert_eq!(
            query.to_query_string(),
            "?AclEntries.1.Entry=172.20.1.0%2F24&Action=AddAclEntries&PageSize=10&Version=2020-04-01"
        );
    }
}
