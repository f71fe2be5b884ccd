use engine_logging::{engine_debug, engine_warn};
use harvester_core::{Cursor, PageBatch, RawListing};
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::decode::decode_body;
use crate::fetch::HttpFetcher;
use crate::{ProviderError, ProviderFailure, ResultSource, SearchQuery};

/// Default search page the rendering proxy is asked to load.
pub const DEFAULT_SEARCH_BASE: &str = "https://www.google.com/maps/search/";
/// Anchors that represent one business listing on the rendered page.
pub const DEFAULT_LISTING_SELECTOR: &str = r#"a[href^="https://www.google.com/maps/place/"]"#;

const OFFSET_PREFIX: &str = "start=";
/// Page text that means the provider refused to serve results.
pub const BLOCK_MARKERS: &[&str] = &["unusual traffic", "/sorry/index", "g-recaptcha"];
/// Page text the provider shows once the result list has run out.
pub const END_OF_LIST_MARKERS: &[&str] = &[
    "reached the end of the list",
    "can't find",
    "can\u{2019}t find",
    "no results found",
];
/// Container the provider renders around the result list.
pub const DEFAULT_FEED_SELECTOR: &str = r#"div[role="feed"]"#;

#[derive(Debug, Clone)]
pub struct HtmlSourceOptions {
    /// Rendering proxy endpoint.
    pub endpoint: Url,
    pub api_key: String,
    pub render_js: bool,
    /// Country the proxy should route the request through.
    pub country_code: Option<String>,
    pub search_base: String,
    pub listing_selector: String,
    pub feed_selector: String,
}

impl HtmlSourceOptions {
    pub fn new(endpoint: Url, api_key: impl Into<String>) -> Self {
        Self {
            endpoint,
            api_key: api_key.into(),
            render_js: true,
            country_code: None,
            search_base: DEFAULT_SEARCH_BASE.to_string(),
            listing_selector: DEFAULT_LISTING_SELECTOR.to_string(),
            feed_selector: DEFAULT_FEED_SELECTOR.to_string(),
        }
    }
}

/// Fetches the provider's rendered search page through a rendering proxy and
/// reads listings off the anchors.
///
/// Cursors are result offsets (`start=N`). A page with no listing anchors is
/// the end of results only when it carries an end-of-list marker or an empty
/// result feed. Any other empty render keeps the offset it was fetched with.
pub struct HtmlPageSource {
    fetcher: HttpFetcher,
    options: HtmlSourceOptions,
    query: SearchQuery,
    selector: Selector,
    feed: Selector,
}

impl std::fmt::Debug for HtmlPageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HtmlPageSource")
            .field("endpoint", &self.options.endpoint.as_str())
            .field("query", &self.query.text)
            .finish_non_exhaustive()
    }
}

impl HtmlPageSource {
    pub fn new(
        fetcher: HttpFetcher,
        options: HtmlSourceOptions,
        query: SearchQuery,
    ) -> Result<Self, ProviderError> {
        let selector = parse_selector(&options.listing_selector)?;
        let feed = parse_selector(&options.feed_selector)?;
        let fetcher = fetcher.with_allowed_content_types(&["text/html", "application/xhtml+xml"]);
        Ok(Self {
            fetcher,
            options,
            query,
            selector,
            feed,
        })
    }

    /// Provider page for the given result offset.
    pub fn search_url(&self, offset: usize) -> Result<Url, ProviderError> {
        let path = self.query.text.split_whitespace().collect::<Vec<_>>().join("+");
        let mut url = Url::parse(&format!("{}{}", self.options.search_base, path))
            .map_err(|err| ProviderError::new(ProviderFailure::InvalidUrl, err.to_string()))?;
        {
            let mut pairs = url.query_pairs_mut();
            if offset > 0 {
                pairs.append_pair("start", &offset.to_string());
            }
            if let Some(region) = self.query.region.as_deref() {
                pairs.append_pair("hl", region);
            }
        }
        if let Some(bias) = self.query.geo_bias {
            let zoom = zoom_for_radius(bias.radius_m);
            url.set_path(&format!(
                "{}/@{},{},{}z",
                url.path().trim_end_matches('/'),
                bias.latitude,
                bias.longitude,
                zoom
            ));
        }
        if url.query() == Some("") {
            url.set_query(None);
        }
        Ok(url)
    }

    fn proxy_url(&self, target: &Url) -> Url {
        let mut url = self.options.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("api_key", &self.options.api_key);
            pairs.append_pair("url", target.as_str());
            pairs.append_pair("render_js", if self.options.render_js { "true" } else { "false" });
            if let Some(country) = self.options.country_code.as_deref() {
                pairs.append_pair("country_code", country);
            }
        }
        url
    }

    /// Listings on a rendered page, in document order.
    pub fn extract_listings(&self, html: &str) -> Vec<RawListing> {
        let document = Html::parse_document(html);
        document.select(&self.selector).map(listing_from_anchor).collect()
    }

    /// Whether a page without listings says the result list is over.
    pub fn shows_end_of_list(&self, html: &str) -> bool {
        let lower = html.to_lowercase();
        if END_OF_LIST_MARKERS.iter().any(|marker| lower.contains(marker)) {
            return true;
        }
        Html::parse_document(html).select(&self.feed).next().is_some()
    }
}

#[async_trait::async_trait]
impl ResultSource for HtmlPageSource {
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<PageBatch, ProviderError> {
        let offset = match cursor {
            Some(cursor) => parse_offset(cursor)?,
            None => 0,
        };
        let target = self.search_url(offset)?;
        let body = self.fetcher.get(self.proxy_url(&target)).await?;
        let decoded = decode_body(&body.bytes, body.content_type.as_deref())?;

        let records = self.extract_listings(&decoded.text);
        engine_debug!(
            "offset {} yielded {} listings ({})",
            offset,
            records.len(),
            decoded.encoding
        );

        if records.is_empty() {
            if looks_blocked(&decoded.text) {
                engine_warn!("provider returned a block page at offset {}", offset);
                return Err(ProviderError::new(
                    ProviderFailure::Blocked,
                    "provider served a verification page",
                ));
            }
            if self.shows_end_of_list(&decoded.text) {
                return Ok(PageBatch::exhausted(records));
            }
            engine_warn!(
                "offset {} rendered no listings and no end-of-list marker, keeping the cursor",
                offset
            );
            return Ok(PageBatch::has_more(records, offset_cursor(offset)));
        }

        let next = offset_cursor(offset + records.len());
        Ok(PageBatch::has_more(records, next))
    }
}

fn parse_selector(selector: &str) -> Result<Selector, ProviderError> {
    Selector::parse(selector).map_err(|err| {
        ProviderError::new(
            ProviderFailure::InvalidUrl,
            format!("selector {selector:?}: {err}"),
        )
    })
}

fn listing_from_anchor(anchor: ElementRef<'_>) -> RawListing {
    let label = anchor
        .value()
        .attr("aria-label")
        .or_else(|| anchor.value().attr("title"))
        .map(str::to_string);
    let text = anchor.text().collect::<Vec<_>>().join(" ");
    let text_block = if text.trim().is_empty() { None } else { Some(text) };
    RawListing::from_rendered(label, text_block)
}

fn offset_cursor(offset: usize) -> Cursor {
    Cursor::new(format!("{OFFSET_PREFIX}{offset}"))
}

fn parse_offset(cursor: &Cursor) -> Result<usize, ProviderError> {
    cursor
        .as_str()
        .strip_prefix(OFFSET_PREFIX)
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| {
            ProviderError::new(
                ProviderFailure::InvalidCursor,
                format!("expected {OFFSET_PREFIX}N, got {cursor}"),
            )
        })
}

fn looks_blocked(html: &str) -> bool {
    let lower = html.to_lowercase();
    BLOCK_MARKERS.iter().any(|marker| lower.contains(marker))
}

fn zoom_for_radius(radius_m: u32) -> u8 {
    match radius_m {
        0..=1_000 => 15,
        1_001..=5_000 => 13,
        5_001..=20_000 => 11,
        _ => 9,
    }
}
