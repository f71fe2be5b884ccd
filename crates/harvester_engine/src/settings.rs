use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use harvester_core::DEFAULT_PAGE_BUDGET;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::fetch::{FetchSettings, HttpFetcher};
use crate::html_source::{HtmlPageSource, HtmlSourceOptions};
use crate::json_source::JsonPageSource;
use crate::{CsvSink, FileCursorStore, ResultSource, SearchQuery};

pub const DEFAULT_HTML_ENDPOINT: &str = "https://app.scrapingbee.com/api/v1/";
pub const DEFAULT_JSON_ENDPOINT: &str = "https://maps.googleapis.com/maps/api/place/textsearch/json";

pub const ENV_API_KEY: &str = "HARVEST_API_KEY";
pub const ENV_ENDPOINT: &str = "HARVEST_ENDPOINT";
pub const ENV_COUNTRY: &str = "HARVEST_COUNTRY";
pub const ENV_PAGE_BUDGET: &str = "HARVEST_PAGE_BUDGET";
pub const ENV_DATA_DIR: &str = "HARVEST_DATA_DIR";
pub const ENV_SOURCE: &str = "HARVEST_SOURCE";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("missing setting: {0}")]
    Missing(&'static str),
    #[error("invalid setting {name}: {message}")]
    Invalid { name: &'static str, message: String },
    #[error("cannot read settings file {path}: {message}")]
    File { path: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Rendered search page through a rendering proxy.
    #[default]
    Html,
    /// Structured places-style JSON API.
    Json,
}

impl FromStr for SourceKind {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "html" => Ok(SourceKind::Html),
            "json" => Ok(SourceKind::Json),
            other => Err(SettingsError::Invalid {
                name: "source",
                message: format!("unknown source {other:?}, expected html or json"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvestSettings {
    pub page_budget: u32,
    pub data_dir: PathBuf,
    pub sink_file: String,
    pub source: SourceKind,
    /// Overrides the default endpoint of the chosen source.
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub country_code: Option<String>,
    pub render_js: bool,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub max_bytes: u64,
}

impl Default for HarvestSettings {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        Self {
            page_budget: DEFAULT_PAGE_BUDGET,
            data_dir: PathBuf::from("harvest_data"),
            sink_file: "listings.csv".to_string(),
            source: SourceKind::default(),
            endpoint: None,
            api_key: None,
            country_code: None,
            render_js: true,
            connect_timeout_secs: fetch.connect_timeout.as_secs(),
            request_timeout_secs: fetch.request_timeout.as_secs(),
            max_bytes: fetch.max_bytes,
        }
    }
}

impl HarvestSettings {
    /// Defaults overlaid with a RON settings file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|err| SettingsError::File {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        ron::from_str(&content).map_err(|err| SettingsError::File {
            path: path.display().to_string(),
            message: err.to_string(),
        })
    }

    /// Overlay values from the process environment.
    pub fn apply_env(&mut self) -> Result<(), SettingsError> {
        self.apply_vars(|name| std::env::var(name).ok())
    }

    /// Overlay values from `lookup`; blank values are ignored.
    pub fn apply_vars<F>(&mut self, lookup: F) -> Result<(), SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.api_key = Some(key);
        }
        if let Some(endpoint) = get(ENV_ENDPOINT) {
            self.endpoint = Some(endpoint);
        }
        if let Some(country) = get(ENV_COUNTRY) {
            self.country_code = Some(country);
        }
        if let Some(dir) = get(ENV_DATA_DIR) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(source) = get(ENV_SOURCE) {
            self.source = source.parse()?;
        }
        if let Some(budget) = get(ENV_PAGE_BUDGET) {
            self.page_budget = budget.trim().parse().map_err(|_| SettingsError::Invalid {
                name: ENV_PAGE_BUDGET,
                message: format!("{budget:?} is not a page count"),
            })?;
        }
        Ok(())
    }

    /// Check everything a run needs before any IO happens.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.page_budget == 0 {
            return Err(SettingsError::Invalid {
                name: "page_budget",
                message: "must be at least 1".to_string(),
            });
        }
        if self.sink_file.trim().is_empty() {
            return Err(SettingsError::Missing("sink_file"));
        }
        self.api_key()?;
        self.endpoint_url()?;
        Ok(())
    }

    pub fn api_key(&self) -> Result<&str, SettingsError> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(SettingsError::Missing("api_key"))
    }

    pub fn endpoint_url(&self) -> Result<Url, SettingsError> {
        let raw = self.endpoint.as_deref().unwrap_or(match self.source {
            SourceKind::Html => DEFAULT_HTML_ENDPOINT,
            SourceKind::Json => DEFAULT_JSON_ENDPOINT,
        });
        Url::parse(raw).map_err(|err| SettingsError::Invalid {
            name: "endpoint",
            message: format!("{raw:?}: {err}"),
        })
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            max_bytes: self.max_bytes,
            ..FetchSettings::default()
        }
    }

    pub fn sink_path(&self) -> PathBuf {
        self.data_dir.join(&self.sink_file)
    }

    pub fn sink(&self) -> CsvSink {
        CsvSink::new(self.sink_path())
    }

    pub fn cursor_store(&self) -> FileCursorStore {
        FileCursorStore::new(self.data_dir.join("cursors"))
    }

    /// Build the configured transport for `query`.
    pub fn build_source(&self, query: SearchQuery) -> Result<Box<dyn ResultSource>, SettingsError> {
        self.validate()?;
        let fetcher = HttpFetcher::new(self.fetch_settings()).map_err(|err| SettingsError::Invalid {
            name: "http client",
            message: err.to_string(),
        })?;
        let endpoint = self.endpoint_url()?;
        let api_key = self.api_key()?.to_string();

        match self.source {
            SourceKind::Html => {
                let mut options = HtmlSourceOptions::new(endpoint, api_key);
                options.render_js = self.render_js;
                options.country_code = self.country_code.clone();
                let source = HtmlPageSource::new(fetcher, options, query).map_err(|err| {
                    SettingsError::Invalid {
                        name: "listing selector",
                        message: err.to_string(),
                    }
                })?;
                Ok(Box::new(source))
            }
            SourceKind::Json => Ok(Box::new(JsonPageSource::new(fetcher, endpoint, api_key, query))),
        }
    }
}
