use std::time::Duration;

use engine_logging::engine_debug;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use url::Url;

use crate::{ProviderError, ProviderFailure};

#[derive(Debug, Clone, PartialEq)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// Accepted media types. Empty accepts anything.
    pub allowed_content_types: Vec<String>,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            // Rendering proxies take a while to execute page scripts.
            request_timeout: Duration::from_secs(90),
            redirect_limit: 5,
            max_bytes: 10 * 1024 * 1024,
            allowed_content_types: Vec::new(),
        }
    }
}

/// A successfully downloaded response body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBody {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub final_url: String,
}

/// Thin GET client enforcing timeouts, size limits and content types.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    settings: FetchSettings,
}

impl HttpFetcher {
    pub fn new(settings: FetchSettings) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| ProviderError::new(ProviderFailure::Network, err.to_string()))?;
        Ok(Self { client, settings })
    }

    pub fn with_allowed_content_types(mut self, types: &[&str]) -> Self {
        self.settings.allowed_content_types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    pub async fn get(&self, url: Url) -> Result<FetchedBody, ProviderError> {
        engine_debug!("GET {}", redact_query(&url));
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(status_error(status));
        }

        if let Some(content_len) = response.content_length() {
            if content_len > self.settings.max_bytes {
                return Err(self.too_large(Some(content_len)));
            }
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());

        if let Some(ct) = content_type.as_deref() {
            if !self.is_content_type_allowed(ct) {
                return Err(ProviderError::new(
                    ProviderFailure::UnsupportedContentType {
                        content_type: ct.to_string(),
                    },
                    "unsupported content type",
                ));
            }
        }

        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(map_reqwest_error)?;
            let next_len = bytes.len() as u64 + chunk.len() as u64;
            if next_len > self.settings.max_bytes {
                return Err(self.too_large(Some(next_len)));
            }
            bytes.extend_from_slice(&chunk);
        }

        Ok(FetchedBody {
            bytes,
            content_type,
            final_url,
        })
    }

    fn is_content_type_allowed(&self, content_type: &str) -> bool {
        if self.settings.allowed_content_types.is_empty() {
            return true;
        }
        let ct = content_type.split(';').next().unwrap_or(content_type).trim();
        self.settings
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(ct))
    }

    fn too_large(&self, actual: Option<u64>) -> ProviderError {
        ProviderError::new(
            ProviderFailure::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual,
            },
            "response too large",
        )
    }
}

fn status_error(status: StatusCode) -> ProviderError {
    let kind = match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS => {
            ProviderFailure::Blocked
        }
        _ => ProviderFailure::HttpStatus(status.as_u16()),
    };
    ProviderError::new(kind, status.to_string())
}

fn map_reqwest_error(err: reqwest::Error) -> ProviderError {
    if err.is_timeout() {
        return ProviderError::new(ProviderFailure::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return ProviderError::new(ProviderFailure::Network, format!("redirects: {err}"));
    }
    ProviderError::new(ProviderFailure::Network, err.to_string())
}

/// URL for logging with credential-like query values masked.
pub(crate) fn redact_query(url: &Url) -> String {
    let mut shown = url.clone();
    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| {
            let masked = matches!(k.as_ref(), "api_key" | "key" | "token");
            (k.into_owned(), if masked { "***".to_string() } else { v.into_owned() })
        })
        .collect();
    if !pairs.is_empty() {
        shown.query_pairs_mut().clear().extend_pairs(pairs);
    }
    shown.to_string()
}
