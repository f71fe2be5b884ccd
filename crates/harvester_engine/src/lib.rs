//! Harvester engine: transports, storage and effect execution.
mod controller;
mod cursor_store;
mod decode;
mod fetch;
mod html_source;
mod json_source;
mod query;
mod settings;
mod sink;
mod source;
mod types;

pub use controller::{local_timestamp, Clock, HarvestController, HarvestError};
pub use cursor_store::{slot_filename, CursorStore, CursorStoreError, FileCursorStore};
pub use decode::{decode_body, DecodedBody};
pub use fetch::{FetchSettings, FetchedBody, HttpFetcher};
pub use html_source::{
    HtmlPageSource, HtmlSourceOptions, BLOCK_MARKERS, DEFAULT_FEED_SELECTOR,
    DEFAULT_LISTING_SELECTOR, DEFAULT_SEARCH_BASE, END_OF_LIST_MARKERS,
};
pub use json_source::{parse_search_response, JsonPageSource};
pub use query::{GeoBias, SearchQuery};
pub use settings::{
    HarvestSettings, SettingsError, SourceKind, DEFAULT_HTML_ENDPOINT, DEFAULT_JSON_ENDPOINT,
    ENV_API_KEY, ENV_COUNTRY, ENV_DATA_DIR, ENV_ENDPOINT, ENV_PAGE_BUDGET, ENV_SOURCE,
};
pub use sink::{CsvSink, Sink, SinkError};
pub use source::ResultSource;
pub use types::{ProviderError, ProviderFailure};
