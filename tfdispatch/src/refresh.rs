//! StatePoller: waits for a remote resource to reach a target status

use crate::error::{DispatchError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Status refresh settings attached to a call
#[derive(Debug, Clone, PartialEq)]
pub struct StateRefresh {
    /// Statuses that end the wait; empty means "wait until gone"
    pub target: Vec<String>,
    pub fail_states: Vec<String>,
    /// Falls back to the operation timeout when unset
    pub timeout: Option<Duration>,
    /// Initial wait before the first status read
    pub delay: Duration,
    /// Wait between status reads
    pub min_timeout: Duration,
}

impl StateRefresh {
    pub fn new(target: &[&str]) -> Self {
        Self {
            target: target.iter().map(|s| s.to_string()).collect(),
            fail_states: Vec::new(),
            timeout: None,
            delay: Duration::from_secs(1),
            min_timeout: Duration::from_secs(1),
        }
    }

    /// Wait until the resource can no longer be found
    pub fn gone() -> Self {
        Self::new(&[])
    }

    pub fn fail_states(mut self, states: &[&str]) -> Self {
        self.fail_states = states.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn min_timeout(mut self, min_timeout: Duration) -> Self {
        self.min_timeout = min_timeout;
        self
    }
}

pub struct StatePoller<'a> {
    refresh: &'a StateRefresh,
    id: &'a str,
    timeout: Duration,
}

impl<'a> StatePoller<'a> {
    pub fn new(refresh: &'a StateRefresh, id: &'a str, default_timeout: Duration) -> Self {
        Self {
            refresh,
            id,
            timeout: refresh.timeout.unwrap_or(default_timeout),
        }
    }

    /// Polls `fetch` until the status is a target, a fail state or the
    /// deadline passes. `fetch` returns `None` (or a not-found error) when
    /// the resource does not exist.
    pub async fn wait<F, Fut>(&self, mut fetch: F) -> Result<Option<String>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<String>>>,
    {
        let deadline = Instant::now() + self.timeout;
        tokio::time::sleep(self.refresh.delay).await;

        loop {
            let status = match fetch().await {
                Ok(status) => status,
                Err(e) if e.is_not_found() => None,
                Err(e) => return Err(e),
            };

            match &status {
                Some(s) if self.refresh.fail_states.iter().any(|f| f == s) => {
                    warn!(id = %self.id, status = %s, "Resource entered failure state");
                    return Err(DispatchError::FailState {
                        id: self.id.to_string(),
                        status: s.clone(),
                    });
                }
                Some(s) if self.refresh.target.iter().any(|t| t == s) => {
                    debug!(id = %self.id, status = %s, "Resource reached target status");
                    return Ok(status);
                }
                None if self.refresh.target.is_empty() => {
                    debug!(id = %self.id, "Resource is gone");
                    return Ok(None);
                }
                _ => {}
            }

            debug!(id = %self.id, status = ?status, target = ?self.refresh.target, "Waiting for resource");

            if Instant::now() + self.refresh.min_timeout > deadline {
                return Err(DispatchError::Timeout {
                    id: self.id.to_string(),
                    target: self.refresh.target.clone(),
                    last: status,
                    timeout: self.timeout,
                });
            }
            tokio::time::sleep(self.refresh.min_timeout).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CallError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn quick(target: &[&str]) -> StateRefresh {
        StateRefresh::new(target)
            .delay(Duration::from_millis(1))
            .min_timeout(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn waits_until_target_status() {
        let calls = Arc::new(AtomicUsize::new(0));
        let refresh = quick(&["Available"]);
        let poller = StatePoller::new(&refresh, "acl-1", Duration::from_secs(5));

        let counter = calls.clone();
        let status = poller
            .wait(|| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok(Some(if n < 2 { "Creating" } else { "Available" }.to_string()))
                }
            })
            .await
            .unwrap();

        assert_eq!(status.as_deref(), Some("Available"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fail_state_stops_the_wait() {
        let refresh = quick(&["Available"]).fail_states(&["Error"]);
        let poller = StatePoller::new(&refresh, "nat-1", Duration::from_secs(5));
        let err = poller
            .wait(|| async { Ok(Some("Error".to_string())) })
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::FailState { status, .. } if status == "Error"));
    }

    #[tokio::test]
    async fn empty_target_waits_for_not_found() {
        let calls = Arc::new(AtomicUsize::new(0));
        let refresh = StateRefresh::gone()
            .delay(Duration::from_millis(1))
            .min_timeout(Duration::from_millis(1));
        let poller = StatePoller::new(&refresh, "acl-1", Duration::from_secs(5));

        let counter = calls.clone();
        let status = poller
            .wait(|| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Ok(Some("Deleting".to_string()))
                    } else {
                        Err(DispatchError::call(
                            "DescribeAcl",
                            "acl-1",
                            CallError::new("gone").with_code("InvalidAcl.NotFound"),
                        ))
                    }
                }
            })
            .await
            .unwrap();
        assert!(status.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_resource_is_not_a_target_when_target_is_set() {
        let refresh = quick(&["Available"]);
        let poller = StatePoller::new(&refresh, "acl-1", Duration::from_millis(20));
        let err = poller.wait(|| async { Ok(None) }).await.unwrap_err();
        assert!(matches!(err, DispatchError::Timeout { last: None, .. }));
    }

    #[tokio::test]
    async fn times_out_with_last_status() {
        let refresh = quick(&["Available"]);
        let poller = StatePoller::new(&refresh, "acl-1", Duration::from_millis(20));
        let err = poller
            .wait(|| async { Ok(Some("Creating".to_string())) })
            .await
            .unwrap_err();
        match err {
            DispatchError::Timeout { last, target, .. } => {
                assert_eq!(last.as_deref(), Some("Creating"));
                assert_eq!(target, vec!["Available".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
