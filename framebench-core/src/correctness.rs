// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Ankit Kumar Pandey

//! Correctness suite run against a freshly started server.
//!
//! Any mismatch on the three mandatory checks fails the target. The optional
//! validation probe reports a capability flag instead: a 404 or a network
//! failure on its first endpoint means "not supported".

use serde::{Deserialize, Serialize};

use crate::error::CorrectnessError;
use crate::retry::{HttpResponse, RetryClient};

/// Body posted to `/json`.
pub const JSON_PAYLOAD: &str = r#"{"hello":"world"}"#;

/// Richer body posted to the validation endpoints.
pub const VALIDATION_PAYLOAD: &str = r#"{"hello":"world","count":42,"tags":["a","b","c"]}"#;

/// Header marking a response as produced for this benchmark.
pub const MARKER_HEADER: &str = "x-powered-by";
pub const MARKER_VALUE: &str = "benchmark";

/// Schema-validation endpoints, one per validation engine, probed in order.
pub const VALIDATION_PATHS: [&str; 3] = ["/validate-zod", "/validate-valibot", "/validate-arktype"];

const TEXT_PLAIN: &str = "text/plain";
const APPLICATION_JSON: &str = "application/json";

/// Optional features a target supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// The three validation endpoints echo validated payloads.
    pub validation: bool,
}

/// Fixed request sequence validating the HTTP contract.
pub struct CorrectnessSuite<'a> {
    client: &'a RetryClient,
    base_url: String,
}

impl<'a> CorrectnessSuite<'a> {
    pub fn new(client: &'a RetryClient, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    /// Mandatory checks, then the validation probe when `extended` is set.
    pub async fn run(&self, extended: bool) -> Result<Capabilities, CorrectnessError> {
        self.verify().await?;
        if extended {
            self.probe_validation().await
        } else {
            Ok(Capabilities::default())
        }
    }

    /// `GET /`, `GET /id/1?name=bun` and `POST /json`.
    pub async fn verify(&self) -> Result<(), CorrectnessError> {
        tracing::debug!(base_url = %self.base_url, "Testing GET /");
        let index = self.get("Index", "/").await?;
        expect_body("Index", &index, "Hi")?;
        expect_header("Index", &index, "content-type", TEXT_PLAIN)?;

        tracing::debug!(base_url = %self.base_url, "Testing GET /id/1?name=bun");
        let query = self.get("Query", "/id/1?name=bun").await?;
        expect_body("Query", &query, "1 bun")?;
        expect_header("Query", &query, "content-type", TEXT_PLAIN)?;
        expect_header("Query", &query, MARKER_HEADER, MARKER_VALUE)?;

        tracing::debug!(base_url = %self.base_url, "Testing POST /json");
        let body = self.post("Body", "/json", JSON_PAYLOAD).await?;
        expect_body("Body", &body, JSON_PAYLOAD)?;
        expect_header("Body", &body, "content-type", APPLICATION_JSON)?;

        Ok(())
    }

    /// Probe the validation endpoints.
    pub async fn probe_validation(&self) -> Result<Capabilities, CorrectnessError> {
        for (n, path) in VALIDATION_PATHS.iter().enumerate() {
            let url = format!("{}{}", self.base_url, path);
            let response = match self.client.post_json(&url, VALIDATION_PAYLOAD).await {
                Ok(response) => response,
                Err(e) if n == 0 => {
                    tracing::info!(url = %url, error = %e, "Validation not supported");
                    return Ok(Capabilities { validation: false });
                }
                Err(source) => {
                    return Err(CorrectnessError::Request {
                        check: "Validation",
                        source,
                    })
                }
            };

            if response.status == 404 {
                if n == 0 {
                    tracing::info!(url = %url, "Validation not supported (404)");
                    return Ok(Capabilities { validation: false });
                }
                return Err(CorrectnessError::Status {
                    check: "Validation",
                    status: response.status,
                });
            }

            expect_body("Validation", &response, VALIDATION_PAYLOAD)?;
        }

        Ok(Capabilities { validation: true })
    }

    async fn get(&self, check: &'static str, path: &str) -> Result<HttpResponse, CorrectnessError> {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .get(&url)
            .await
            .map_err(|source| CorrectnessError::Request { check, source })
    }

    async fn post(
        &self,
        check: &'static str,
        path: &str,
        body: &str,
    ) -> Result<HttpResponse, CorrectnessError> {
        let url = format!("{}{}", self.base_url, path);
        self.client
            .post_json(&url, body)
            .await
            .map_err(|source| CorrectnessError::Request { check, source })
    }
}

fn expect_body(
    check: &'static str,
    response: &HttpResponse,
    expected: &str,
) -> Result<(), CorrectnessError> {
    if response.body != expected {
        return Err(CorrectnessError::BodyMismatch {
            check,
            expected: expected.to_string(),
            actual: response.body.clone(),
        });
    }
    Ok(())
}

fn expect_header(
    check: &'static str,
    response: &HttpResponse,
    header: &'static str,
    expected: &'static str,
) -> Result<(), CorrectnessError> {
    let actual = response.header(header);
    if !actual.is_some_and(|value| value.contains(expected)) {
        return Err(CorrectnessError::HeaderMismatch {
            check,
            header,
            expected,
            actual: actual.map(str::to_string),
        });
    }
    Ok(())
}
