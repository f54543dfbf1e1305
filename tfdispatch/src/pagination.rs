//! Paginated list queries for data sources

use crate::error::{DispatchError, Result};
use crate::request::Params;
use serde_json::Value;
use std::collections::HashSet;
use std::future::Future;
use tracing::{debug, warn};

/// Looks up a dotted path (`Result.Instances`) in a response object
pub fn value_at<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, key| match current {
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => current.get(key),
    })
}

fn items_at(response: &Value, path: &str) -> Result<Vec<Value>> {
    match value_at(response, path) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Array(items)) => Ok(items.clone()),
        Some(other) => Err(DispatchError::Convert(format!(
            "expected a list at {}, found {}",
            path, other
        ))),
    }
}

/// `PageNumber`/`PageSize` style pagination
#[derive(Debug, Clone)]
pub struct PageNumberQuery {
    pub page_number_field: &'static str,
    pub page_size_field: &'static str,
    pub page_size: usize,
    pub start_page: usize,
    pub collection_path: &'static str,
}

impl PageNumberQuery {
    pub fn new(collection_path: &'static str) -> Self {
        Self {
            page_number_field: "PageNumber",
            page_size_field: "PageSize",
            page_size: 100,
            start_page: 1,
            collection_path,
        }
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Requests pages until one comes back short
    pub async fn collect<F, Fut>(&self, condition: &Params, mut fetch: F) -> Result<Vec<Value>>
    where
        F: FnMut(Params) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        if self.page_size == 0 {
            return Err(DispatchError::Validation(
                "page size must be greater than zero".to_string(),
            ));
        }
        let mut results = Vec::new();
        let mut page = self.start_page;
        loop {
            let mut params = condition.clone();
            params.insert(self.page_size_field.to_string(), Value::from(self.page_size));
            params.insert(self.page_number_field.to_string(), Value::from(page));

            let response = fetch(params).await?;
            let items = items_at(&response, self.collection_path)?;
            let count = items.len();
            debug!(page, count, "Fetched page");
            results.extend(items);

            if count < self.page_size {
                break;
            }
            page += 1;
        }
        Ok(results)
    }
}

/// `NextToken`/`MaxResults` style pagination
#[derive(Debug, Clone)]
pub struct NextTokenQuery {
    pub token_field: &'static str,
    pub max_results_field: &'static str,
    pub max_results: usize,
    pub collection_path: &'static str,
    pub next_token_path: &'static str,
}

impl NextTokenQuery {
    pub fn new(collection_path: &'static str) -> Self {
        Self {
            token_field: "NextToken",
            max_results_field: "MaxResults",
            max_results: 100,
            collection_path,
            next_token_path: "NextToken",
        }
    }

    pub fn max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Follows the continuation token until the service stops returning one
    pub async fn collect<F, Fut>(&self, condition: &Params, mut fetch: F) -> Result<Vec<Value>>
    where
        F: FnMut(Params) -> Fut,
        Fut: Future<Output = Result<Value>>,
    {
        let mut results = Vec::new();
        let mut token: Option<String> = None;
        let mut seen = HashSet::new();
        loop {
            let mut params = condition.clone();
            params.insert(
                self.max_results_field.to_string(),
                Value::from(self.max_results),
            );
            if let Some(t) = &token {
                params.insert(self.token_field.to_string(), Value::from(t.as_str()));
            }

            let response = fetch(params).await?;
            results.extend(items_at(&response, self.collection_path)?);

            token = value_at(&response, self.next_token_path)
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            match &token {
                None => break,
                Some(t) if !seen.insert(t.clone()) => {
                    warn!(next_token = %t, "Next token repeated, stopping");
                    break;
                }
                Some(_) => {}
            }
            debug!(next_token = ?token, "Following next token");
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    #[tokio::test]
    async fn page_number_stops_on_short_page() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let query = PageNumberQuery::new("NetworkAcls").page_size(2);
        let record = seen.clone();
        let items = query
            .collect(&Params::new(), |params| {
                let record = record.clone();
                async move {
                    let page = params["PageNumber"].as_u64().unwrap();
                    record.lock().unwrap().push(page);
                    Ok(match page {
                        1 => json!({"NetworkAcls": [{"NetworkAclId": "a"}, {"NetworkAclId": "b"}]}),
                        _ => json!({"NetworkAcls": [{"NetworkAclId": "c"}]}),
                    })
                }
            })
            .await
            .unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test]
    async fn next_token_follows_until_empty() {
        let query = NextTokenQuery::new("Instances");
        let items = query
            .collect(&Params::new(), |params| async move {
                Ok(match params.get("NextToken").and_then(Value::as_str) {
                    None => json!({"Instances": [{"InstanceId": "i-1"}], "NextToken": "t1"}),
                    Some("t1") => json!({"Instances": [{"InstanceId": "i-2"}], "NextToken": ""}),
                    Some(other) => panic!("unexpected token {other}"),
                })
            })
            .await
            .unwrap();
        let ids: Vec<_> = items.iter().map(|i| i["InstanceId"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["i-1", "i-2"]);
    }

    #[tokio::test]
    async fn zero_page_size_is_rejected() {
        let query = PageNumberQuery::new("Acls").page_size(0);
        let result = query
            .collect(&Params::new(), |_| async { Ok(json!({"Acls": []})) })
            .await;
        assert!(matches!(result, Err(DispatchError::Validation(_))));
    }

    #[tokio::test]
    async fn repeated_next_token_stops_the_walk() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let items = NextTokenQuery::new("Instances")
            .collect(&Params::new(), |_| {
                let counter = counter.clone();
                async move {
                    *counter.lock().unwrap() += 1;
                    Ok(json!({"Instances": [{"InstanceId": "i-1"}], "NextToken": "stuck"}))
                }
            })
            .await
            .unwrap();
        assert_eq!(*calls.lock().unwrap(), 2);
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn value_at_walks_dotted_paths() {
        let v = json!({"Result": {"Items": [1]}});
        assert_eq!(value_at(&v, "Result.Items"), Some(&json!([1])));
        assert!(value_at(&v, "Result.Missing").is_none());
        assert_eq!(value_at(&v, "Result.Items.0"), Some(&json!(1)));
        assert!(value_at(&v, "Result.Items.3").is_none());
    }
}
