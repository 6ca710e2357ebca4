//! Remote data acquisition from the security platform.
//!
//! One request per call with a bounded timeout and no retry. Responses are
//! normalised to JSON when the platform says so, raw text otherwise.

use std::time::Duration;

use reqwest::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;
use url::Url;

use crate::config::FetchConfig;

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("request to {url} timed out after {secs}s")]
    Timeout { url: String, secs: u64 },

    #[error("connecting to {url} timed out after {secs}s")]
    ConnectTimeout { url: String, secs: u64 },

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// HTTP verb used for a remote query. Anything other than `POST` is sent as `GET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
}

impl Method {
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("post") {
            Method::Post
        } else {
            Method::Get
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Payload returned by the platform.
///
/// Endpoints disagree on shape: some wrap results in `{"response": [...]}`,
/// some return a bare array, some return text.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchedDataset {
    Json(Value),
    Text(String),
}

impl FetchedDataset {
    /// The candidate records a search is matched against.
    ///
    /// A mapping with a `response` array yields that array's items, a bare
    /// array yields its items, and anything else is a single entry.
    pub fn entries(&self) -> Vec<Value> {
        match self {
            FetchedDataset::Json(Value::Object(map)) => match map.get("response") {
                Some(Value::Array(items)) => items.clone(),
                _ => vec![Value::Object(map.clone())],
            },
            FetchedDataset::Json(Value::Array(items)) => items.clone(),
            FetchedDataset::Json(other) => vec![other.clone()],
            FetchedDataset::Text(text) => vec![Value::String(text.clone())],
        }
    }

    /// The whole payload as a JSON value (text becomes a JSON string).
    pub fn to_value(&self) -> Value {
        match self {
            FetchedDataset::Json(v) => v.clone(),
            FetchedDataset::Text(t) => Value::String(t.clone()),
        }
    }
}

/// Resolve `relative` against `base` with standard URL-join rules.
pub fn join_url(base: &str, relative: &str) -> Result<Url, FetchError> {
    let invalid = |reason: String| FetchError::InvalidUrl {
        url: format!("{base} + {relative}"),
        reason,
    };
    let base = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
    base.join(relative).map_err(|e| invalid(e.to_string()))
}

/// Client for the remote platform.
///
/// Certificate validation follows `FetchConfig::accept_invalid_certs`, which
/// defaults to on: exercise platforms are lab instances with self-signed
/// certificates. The relaxation applies to this client only.
#[derive(Debug, Clone)]
pub struct RemoteFetcher {
    client: Client,
    user_agent: String,
    timeout_secs: u64,
    connect_timeout_secs: u64,
}

impl RemoteFetcher {
    pub fn from_config(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
            timeout_secs: config.timeout_secs,
            connect_timeout_secs: config.connect_timeout_secs,
        })
    }

    /// Send one request and normalise the body.
    ///
    /// The HTTP status is not inspected: error bodies are returned like any
    /// other payload so the rules decide what they mean.
    pub async fn fetch(
        &self,
        base_url: &str,
        api_key: &str,
        method: Method,
        relative_path: &str,
        payload: &Value,
    ) -> Result<FetchedDataset, FetchError> {
        let url = join_url(base_url, relative_path)?;
        let url_text = url.to_string();
        log::debug!("{} {}", method.as_str(), url_text);

        let body = serde_json::to_vec(payload).unwrap_or_default();
        let request = match method {
            Method::Get => self.client.get(url),
            Method::Post => self.client.post(url),
        };
        let response = request
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .header(AUTHORIZATION, api_key)
            .header(ACCEPT, "application/json")
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.classify(&url_text, e))?;

        let status = response.status();
        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));
        let text = response
            .text()
            .await
            .map_err(|e| self.classify(&url_text, e))?;
        log::debug!("{url_text} -> {status} ({} bytes, json={is_json})", text.len());

        if is_json {
            match serde_json::from_str(&text) {
                Ok(value) => return Ok(FetchedDataset::Json(value)),
                Err(e) => log::warn!("{url_text}: JSON content-type but unparseable body: {e}"),
            }
        }
        Ok(FetchedDataset::Text(text))
    }

    fn classify(&self, url: &str, source: reqwest::Error) -> FetchError {
        if source.is_timeout() {
            self.timeout_error(url, source.is_connect())
        } else {
            FetchError::Transport {
                url: url.to_string(),
                source,
            }
        }
    }

    /// Name the limit that fired: connect or whole request.
    fn timeout_error(&self, url: &str, connecting: bool) -> FetchError {
        let url = url.to_string();
        if connecting {
            FetchError::ConnectTimeout {
                url,
                secs: self.connect_timeout_secs,
            }
        } else {
            FetchError::Timeout {
                url,
                secs: self.timeout_secs,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn join_relative_replaces_path() {
        let url = join_url("https://misp.local/base/", "events/restSearch").unwrap();
        assert_eq!(url.as_str(), "https://misp.local/base/events/restSearch");
        let url = join_url("https://misp.local/base/", "/attributes/restSearch").unwrap();
        assert_eq!(url.as_str(), "https://misp.local/attributes/restSearch");
    }

    #[test]
    fn join_absolute_overrides() {
        let url = join_url("https://misp.local/", "https://other.local/x").unwrap();
        assert_eq!(url.as_str(), "https://other.local/x");
    }

    #[test]
    fn join_rejects_bad_base() {
        assert!(matches!(
            join_url("not a url", "/events"),
            Err(FetchError::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn timeouts_report_the_limit_that_fired() {
        let config = FetchConfig {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            ..FetchConfig::default()
        };
        let fetcher = RemoteFetcher::from_config(&config).unwrap();
        assert_eq!(
            fetcher.timeout_error("https://misp.local/", true).to_string(),
            "connecting to https://misp.local/ timed out after 10s"
        );
        assert_eq!(
            fetcher.timeout_error("https://misp.local/", false).to_string(),
            "request to https://misp.local/ timed out after 30s"
        );
    }

    #[test]
    fn method_defaults_to_get() {
        assert_eq!(Method::parse("post"), Method::Post);
        assert_eq!(Method::parse("POST"), Method::Post);
        assert_eq!(Method::parse("GET"), Method::Get);
        assert_eq!(Method::parse("PUT"), Method::Get);
    }

    #[test]
    fn entries_by_shape() {
        let wrapped = FetchedDataset::Json(json!({"response": [{"a": 1}, {"a": 2}]}));
        assert_eq!(wrapped.entries().len(), 2);
        let bare = FetchedDataset::Json(json!([1, 2, 3]));
        assert_eq!(bare.entries().len(), 3);
        let single = FetchedDataset::Json(json!({"Event": {}}));
        assert_eq!(single.entries(), vec![json!({"Event": {}})]);
        let text = FetchedDataset::Text("ok".into());
        assert_eq!(text.entries(), vec![json!("ok")]);
    }
}
