//! GitHub API client
//!
//! Minimal GitHub REST v3 client for repository search, repository details, and
//! language breakdowns. Every response is classified into an [`ApiResult`] so callers
//! can tell throttling, missing resources, transient failures, and permanent failures
//! apart without inspecting HTTP details.

use super::QuotaInfo;
use chrono::{DateTime, Utc};
use core::time::Duration;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

/// Public GitHub API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.github.com";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Bytes of source per language, as reported by `/repos/{owner}/{name}/languages`.
pub type LanguageHistogram = BTreeMap<String, u64>;

/// Repository details with only the fields we need
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RepositoryDetail {
    pub full_name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub stargazers_count: u32,
    #[serde(default)]
    pub forks_count: u32,
    /// Repository size in KiB
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub language: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub clone_url: Url,
    pub html_url: Url,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub has_wiki: bool,
    #[serde(default)]
    pub has_issues: bool,
}

/// One page of `/search/repositories` results.
#[derive(Debug, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub incomplete_results: bool,
    pub items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
pub struct SearchItem {
    pub full_name: String,
}

/// Result of an API call
#[derive(Debug)]
pub enum ApiResult<T> {
    /// Request succeeded - contains data and optional quota info
    Success(T, Option<QuotaInfo>),

    /// The remote side asked us to slow down (403 with an exhausted quota or a
    /// retry hint, or 429)
    Throttled {
        quota: Option<QuotaInfo>,
        retry_after: Option<Duration>,
    },

    /// The requested resource was not found (404)
    NotFound(Option<QuotaInfo>),

    /// Request failed; `transient` failures (network errors, 5xx) may be retried
    Failed {
        error: ohno::AppError,
        transient: bool,
        quota: Option<QuotaInfo>,
    },
}

impl<T> ApiResult<T> {
    /// Quota information reported with the response, if any.
    #[must_use]
    pub const fn quota(&self) -> Option<&QuotaInfo> {
        match self {
            Self::Success(_, quota) | Self::NotFound(quota) | Self::Throttled { quota, .. } | Self::Failed { quota, .. } => {
                quota.as_ref()
            }
        }
    }
}

/// GitHub API client
#[derive(Debug, Clone)]
#[expect(clippy::struct_field_names, reason = "client field stores the underlying HTTP client")]
pub struct Client {
    client: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Create a new API client with optional authentication token and base URL
    pub fn new(token: Option<&str>, base_url: impl Into<String>) -> crate::Result<Self> {
        use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue};

        let mut headers = HeaderMap::new();
        let _ = headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github.v3+json"));

        if let Some(t) = token {
            let mut auth_val = HeaderValue::from_str(&format!("token {t}"))?;
            auth_val.set_sensitive(true);
            let _ = headers.insert(AUTHORIZATION, auth_val);
        }

        let client = reqwest::Client::builder()
            .user_agent("corpus-harvest")
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Get the base URL for this client
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue a GET request for `path` (relative to the base URL) and decode the JSON body
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ApiResult<T> {
        let url = format!("{}{path}", self.base_url);

        let resp = match self.client.get(&url).query(query).send().await {
            Ok(r) => r,
            Err(e) => {
                return ApiResult::Failed {
                    error: e.into(),
                    transient: true,
                    quota: None,
                };
            }
        };

        // Extract quota info from response headers before checking status
        let quota = extract_quota_from_headers(resp.headers());
        let retry_after = extract_retry_after(resp.headers());

        let status = resp.status();
        if status.is_success() {
            let body = match resp.bytes().await {
                Ok(body) => body,
                Err(e) => {
                    return ApiResult::Failed {
                        error: e.into(),
                        transient: true,
                        quota,
                    };
                }
            };

            return match serde_json::from_slice(&body) {
                Ok(value) => ApiResult::Success(value, quota),
                Err(e) => ApiResult::Failed {
                    error: ohno::app_err!("malformed response from '{url}': {e}"),
                    transient: false,
                    quota,
                },
            };
        }

        let status_code = status.as_u16();
        let quota_exhausted = quota.is_some_and(|q| q.remaining == 0);
        if status_code == 429 || (status_code == 403 && (quota_exhausted || retry_after.is_some())) {
            return ApiResult::Throttled { quota, retry_after };
        }

        if status_code == 404 {
            return ApiResult::NotFound(quota);
        }

        let error = resp.error_for_status().expect_err("status is not successful at this point");
        ApiResult::Failed {
            error: error.into(),
            transient: status.is_server_error(),
            quota,
        }
    }
}

/// Extract quota information from API response headers
fn extract_quota_from_headers(headers: &HeaderMap) -> Option<QuotaInfo> {
    let limit = header_u32(headers, "x-ratelimit-limit")?;
    let remaining = header_u32(headers, "x-ratelimit-remaining")?;

    let reset_timestamp = headers.get("x-ratelimit-reset")?.to_str().ok()?.parse::<i64>().ok()?;
    let reset_at = DateTime::from_timestamp(reset_timestamp, 0)?;

    let used = header_u32(headers, "x-ratelimit-used").unwrap_or_else(|| limit.saturating_sub(remaining));

    Some(QuotaInfo {
        limit,
        remaining,
        reset_at,
        used,
    })
}

/// Extract a `retry-after` hint given in seconds
fn extract_retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse::<u64>().ok()?;
    Some(Duration::from_secs(seconds))
}

fn header_u32(headers: &HeaderMap, name: &str) -> Option<u32> {
    headers.get(name)?.to_str().ok()?.trim().parse().ok()
}
