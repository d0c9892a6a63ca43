// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Bounded-retry HTTP client.
//!
//! Every attempt runs under a hard timeout; dropping the timed-out future
//! aborts the in-flight request. Network errors and timeouts are retried
//! after a fixed delay until the attempt ceiling is reached, then the last
//! failure is surfaced.

use std::future::Future;
use std::time::Duration;

use reqwest::header::{HeaderMap, CONTENT_TYPE};
use reqwest::Method;

use crate::error::RequestError;

/// Attempt ceiling, per-attempt timeout and inter-attempt delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub attempt_timeout: Duration,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, attempt_timeout: Duration, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            attempt_timeout,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(21, Duration::from_millis(5000), Duration::from_millis(300))
    }
}

/// Run `attempt` until it succeeds or the policy gives up.
///
/// `attempt` receives the zero-based attempt number. `label` only feeds logs
/// and timeout errors.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, label: &str, mut attempt: F) -> Result<T, RequestError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, RequestError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last = RequestError::Network {
        url: label.to_string(),
        reason: "no attempt made".to_string(),
    };

    for n in 0..max_attempts {
        match tokio::time::timeout(policy.attempt_timeout, attempt(n)).await {
            Ok(Ok(value)) => {
                if n > 0 {
                    tracing::info!(url = %label, retries = n, "Connected after retries");
                }
                return Ok(value);
            }
            Ok(Err(e)) => last = e,
            Err(_) => {
                tracing::debug!(url = %label, attempt = n, "Request timed out");
                last = RequestError::Timeout {
                    url: label.to_string(),
                    timeout_ms: policy.attempt_timeout.as_millis() as u64,
                };
            }
        }

        if n + 1 < max_attempts {
            if n % 5 == 0 {
                tracing::debug!(url = %label, attempt = n, max_attempts, error = %last, "Retrying");
            }
            tokio::time::sleep(policy.delay).await;
        }
    }

    tracing::warn!(url = %label, attempts = max_attempts, error = %last, "Giving up");
    Err(RequestError::Exhausted {
        attempts: max_attempts,
        last: Box::new(last),
    })
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl HttpResponse {
    /// Header value as text, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The `Content-Type` header, if any.
    pub fn content_type(&self) -> Option<&str> {
        self.header(CONTENT_TYPE.as_str())
    }
}

/// HTTP client wrapping every request in the retry policy.
#[derive(Debug, Clone)]
pub struct RetryClient {
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl RetryClient {
    /// Create a client with the given policy.
    pub fn new(policy: RetryPolicy) -> Result<Self, RequestError> {
        let http = reqwest::Client::builder()
            .no_proxy()
            .build()
            .map_err(|e| RequestError::Network {
                url: String::new(),
                reason: format!("Failed to build HTTP client: {}", e),
            })?;

        Ok(Self { http, policy })
    }

    /// Same connection pool, different policy.
    pub fn with_policy(&self, policy: RetryPolicy) -> Self {
        Self {
            http: self.http.clone(),
            policy,
        }
    }

    /// `GET url` with retries.
    pub async fn get(&self, url: &str) -> Result<HttpResponse, RequestError> {
        self.request(Method::GET, url, None).await
    }

    /// `POST url` with a JSON body, with retries.
    pub async fn post_json(&self, url: &str, body: &str) -> Result<HttpResponse, RequestError> {
        self.request(Method::POST, url, Some(body)).await
    }

    /// Issue a request under the retry policy. The body is read inside the
    /// attempt so slow bodies count against the attempt timeout too.
    pub async fn request(
        &self,
        method: Method,
        url: &str,
        json_body: Option<&str>,
    ) -> Result<HttpResponse, RequestError> {
        retry(&self.policy, url, |_| {
            let mut builder = self.http.request(method.clone(), url);
            if let Some(body) = json_body {
                builder = builder
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.to_string());
            }

            async move {
                let response = builder.send().await.map_err(|e| network_error(url, e))?;
                let status = response.status().as_u16();
                let headers = response.headers().clone();
                let body = response.text().await.map_err(|e| network_error(url, e))?;

                Ok(HttpResponse {
                    status,
                    headers,
                    body,
                })
            }
        })
        .await
    }
}

fn network_error(url: &str, e: reqwest::Error) -> RequestError {
    RequestError::Network {
        url: url.to_string(),
        reason: e.to_string(),
    }
}
