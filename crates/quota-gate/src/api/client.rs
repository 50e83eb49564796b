//! `reqwest`-backed [`QuotaApi`] implementation.

use std::time::Instant;

use reqwest::{RequestBuilder, Url};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::{ApiFuture, ProbeFuture, QuotaApi, wire};
use crate::cache::ProbeOutcome;
use crate::config::GateConfig;
use crate::error::GateError;
use crate::estimate::Estimate;
use crate::request::{CacheChoice, OperationKind, OperationParams, OperationRequest};
use crate::result::OperationResult;

/// Async HTTP client for the estimate/search/refresh API.
#[derive(Clone, Debug)]
pub struct HttpApi {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpApi {
    /// Build a client from configuration.
    pub fn new(config: &GateConfig) -> Result<Self, GateError> {
        Self::with_client(config.build_client()?, &config.base_url)
    }

    /// Use an existing `reqwest::Client` against `base_url`.
    pub fn with_client(client: reqwest::Client, base_url: &str) -> Result<Self, GateError> {
        let base_url = Url::parse(base_url)
            .map_err(|e| GateError::validation("base_url", format!("'{base_url}': {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GateError::validation(
                "base_url",
                format!("'{base_url}' cannot carry a path"),
            ));
        }
        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // Checked in the constructor: the base URL always has a path.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn refresh_url(&self, prefix: &[&str], target: &str, region: &str, months: u32) -> Url {
        let segments: Vec<&str> = prefix.iter().copied().chain([target, region]).collect();
        let mut url = self.url(&segments);
        url.query_pairs_mut()
            .append_pair("months", &months.to_string());
        url
    }

    async fn send(&self, endpoint: &str, request: RequestBuilder) -> Result<Value, GateError> {
        let start = Instant::now();
        let resp = request
            .send()
            .await
            .map_err(|e| GateError::Transport(format!("{endpoint}: request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| GateError::Transport(format!("{endpoint}: failed to read response: {e}")))?;

        debug!(
            "API response: {endpoint} HTTP {} in {:.2}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );
        trace!("API response body: {text}");

        let parsed = serde_json::from_str::<Value>(&text);
        if !status.is_success() {
            return match parsed {
                // A JSON body with `success` is a server verdict; let the
                // decoder turn it into a rejection.
                Ok(body) if body.get("success").is_some() => {
                    warn!("{endpoint}: HTTP {status} with a success flag in the body");
                    Ok(body)
                }
                _ => Err(GateError::Transport(format!(
                    "{endpoint}: HTTP {status}: {text}"
                ))),
            };
        }
        parsed.map_err(|e| GateError::malformed(endpoint, format!("invalid JSON: {e}")))
    }

    fn post_json(&self, segments: &[&str], request: &OperationRequest) -> Result<RequestBuilder, GateError> {
        Ok(self.client.post(self.url(segments)).json(&request.to_body()?))
    }
}

impl QuotaApi for HttpApi {
    fn estimate<'a>(&'a self, request: &'a OperationRequest) -> ApiFuture<'a, Estimate> {
        Box::pin(async move {
            request.validate()?;
            let (endpoint, builder) = match request.params() {
                OperationParams::Search(_) => (
                    "/api/search/estimate",
                    self.post_json(&["api", "search", "estimate"], request)?,
                ),
                OperationParams::Step1(_) => (
                    "/api/search/step1/estimate",
                    self.post_json(&["api", "search", "step1", "estimate"], request)?,
                ),
                OperationParams::Refresh(p) => (
                    "/api/refresh/estimate",
                    self.client.get(self.refresh_url(
                        &["api", "refresh", "estimate"],
                        &p.target_name,
                        &p.region_code,
                        p.months,
                    )),
                ),
            };
            debug!("API request: {endpoint} ({})", request.kind());
            let body = self.send(endpoint, builder).await?;
            wire::decode_estimate(endpoint, request.kind(), body)
        })
    }

    fn probe<'a>(&'a self, request: &'a OperationRequest) -> ProbeFuture<'a> {
        Box::pin(async move {
            const ENDPOINT: &str = "/api/search";
            if request.kind() != OperationKind::Search {
                return ProbeOutcome::Failed(GateError::validation(
                    "kind",
                    format!("only search requests can be probed, got {}", request.kind()),
                ));
            }
            if request.is_confirmed() {
                return ProbeOutcome::Failed(GateError::validation(
                    "confirmed",
                    "a probe must not carry confirmed=true",
                ));
            }
            let builder = match request
                .validate()
                .and_then(|()| self.post_json(&["api", "search"], request))
            {
                Ok(builder) => builder,
                Err(e) => return ProbeOutcome::Failed(e),
            };
            debug!("API request: {ENDPOINT} (probe)");
            match self.send(ENDPOINT, builder).await {
                Ok(body) => wire::decode_probe(ENDPOINT, body),
                Err(e) => ProbeOutcome::Failed(e),
            }
        })
    }

    fn execute<'a>(&'a self, request: &'a OperationRequest) -> ApiFuture<'a, OperationResult> {
        Box::pin(async move {
            request.validate()?;
            if !request.is_confirmed() {
                return Err(GateError::validation(
                    "confirmed",
                    "costed calls require a confirmed request",
                ));
            }
            let (endpoint, builder) = match request.params() {
                OperationParams::Search(_) => {
                    ("/api/search", self.post_json(&["api", "search"], request)?)
                }
                OperationParams::Step1(_) => (
                    "/api/search/step1",
                    self.post_json(&["api", "search", "step1"], request)?,
                ),
                OperationParams::Refresh(p) => {
                    let mut url =
                        self.refresh_url(&["api", "refresh"], &p.target_name, &p.region_code, p.months);
                    url.query_pairs_mut().append_pair("confirmed", "true");
                    ("/api/refresh", self.client.get(url))
                }
            };
            debug!("API request: {endpoint} ({}, confirmed)", request.kind());
            let body = self.send(endpoint, builder).await?;
            wire::decode_result(endpoint, request.kind(), body)
        })
    }

    fn use_cache<'a>(&'a self, request: &'a OperationRequest) -> ApiFuture<'a, OperationResult> {
        Box::pin(async move {
            const ENDPOINT: &str = "/api/search";
            request.validate()?;
            if request.cache_choice() != Some(CacheChoice::UseCache) {
                return Err(GateError::validation(
                    "cache_choice",
                    "cached reads require cache_choice=use_cache",
                ));
            }
            debug!("API request: {ENDPOINT} (use_cache)");
            let builder = self.post_json(&["api", "search"], request)?;
            let body = self.send(ENDPOINT, builder).await?;
            wire::decode_result(ENDPOINT, request.kind(), body)
        })
    }
}
