use engine_logging::engine_debug;
use harvester_core::{Cursor, PageBatch, RawListing};
use serde::Deserialize;
use url::Url;

use crate::fetch::HttpFetcher;
use crate::{ProviderError, ProviderFailure, ResultSource, SearchQuery};

/// Places-style text search API returning structured results and an opaque
/// `next_page_token`.
pub struct JsonPageSource {
    fetcher: HttpFetcher,
    endpoint: Url,
    api_key: String,
    query: SearchQuery,
}

impl std::fmt::Debug for JsonPageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonPageSource")
            .field("endpoint", &self.endpoint.as_str())
            .field("query", &self.query.text)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<PlaceResult>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct PlaceResult {
    name: Option<String>,
    types: Vec<String>,
    formatted_address: Option<String>,
    vicinity: Option<String>,
    rating: Option<f64>,
    user_ratings_total: Option<u64>,
    website: Option<String>,
    formatted_phone_number: Option<String>,
    international_phone_number: Option<String>,
    price_level: Option<u8>,
    opening_hours: Option<OpeningHours>,
    geometry: Option<Geometry>,
    dine_in: Option<bool>,
    takeout: Option<bool>,
    delivery: Option<bool>,
    curbside_pickup: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct OpeningHours {
    open_now: Option<bool>,
    weekday_text: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

impl JsonPageSource {
    pub fn new(
        fetcher: HttpFetcher,
        endpoint: Url,
        api_key: impl Into<String>,
        query: SearchQuery,
    ) -> Self {
        Self {
            fetcher: fetcher.with_allowed_content_types(&["application/json"]),
            endpoint,
            api_key: api_key.into(),
            query,
        }
    }

    pub fn request_url(&self, cursor: Option<&Cursor>) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("key", &self.api_key);
            match cursor {
                // Continuation requests carry only the token.
                Some(cursor) => {
                    pairs.append_pair("pagetoken", cursor.as_str());
                }
                None => {
                    pairs.append_pair("query", &self.query.text);
                    if let Some(region) = self.query.region.as_deref() {
                        pairs.append_pair("region", region);
                    }
                    if let Some(bias) = self.query.geo_bias {
                        pairs.append_pair(
                            "location",
                            &format!("{},{}", bias.latitude, bias.longitude),
                        );
                        pairs.append_pair("radius", &bias.radius_m.to_string());
                    }
                }
            }
        }
        url
    }
}

#[async_trait::async_trait]
impl ResultSource for JsonPageSource {
    async fn fetch(&self, cursor: Option<&Cursor>) -> Result<PageBatch, ProviderError> {
        let body = self.fetcher.get(self.request_url(cursor)).await?;
        parse_search_response(&body.bytes, cursor.is_some())
    }
}

/// Interpret one API response body.
pub fn parse_search_response(bytes: &[u8], continued: bool) -> Result<PageBatch, ProviderError> {
    let response: SearchResponse = serde_json::from_slice(bytes)
        .map_err(|err| ProviderError::new(ProviderFailure::Malformed, err.to_string()))?;
    let detail = response
        .error_message
        .clone()
        .unwrap_or_else(|| response.status.clone());

    match response.status.as_str() {
        "OK" | "" => {}
        "ZERO_RESULTS" => return Ok(PageBatch::exhausted(Vec::new())),
        "REQUEST_DENIED" | "OVER_QUERY_LIMIT" => {
            return Err(ProviderError::new(ProviderFailure::Blocked, detail));
        }
        "INVALID_REQUEST" if continued => {
            return Err(ProviderError::new(ProviderFailure::InvalidCursor, detail));
        }
        _ => return Err(ProviderError::new(ProviderFailure::Malformed, detail)),
    }

    let records: Vec<RawListing> = response.results.into_iter().map(listing_from_place).collect();
    engine_debug!("api page yielded {} results", records.len());

    match response.next_page_token.as_deref().and_then(Cursor::parse) {
        Some(next) => Ok(PageBatch::has_more(records, next)),
        None => Ok(PageBatch::exhausted(records)),
    }
}

fn listing_from_place(place: PlaceResult) -> RawListing {
    let hours = place.opening_hours.and_then(|hours| {
        if !hours.weekday_text.is_empty() {
            Some(hours.weekday_text.join("; "))
        } else {
            hours
                .open_now
                .map(|open| if open { "Open now" } else { "Closed now" }.to_string())
        }
    });

    let service_options = [
        (place.dine_in, "Dine-in"),
        (place.takeout, "Takeout"),
        (place.delivery, "Delivery"),
        (place.curbside_pickup, "Curbside pickup"),
    ]
    .into_iter()
    .filter(|(offered, _)| *offered == Some(true))
    .map(|(_, label)| label.to_string())
    .collect();

    RawListing {
        title: place.name,
        label: None,
        text_block: None,
        category: place.types.iter().find(|t| !is_generic_type(t)).map(|t| humanize_type(t)),
        address: place.formatted_address.or(place.vicinity),
        rating: place.rating,
        review_count: place.user_ratings_total,
        website: place.website,
        phone: place.formatted_phone_number.or(place.international_phone_number),
        price_level: place.price_level.map(price_symbol),
        hours,
        service_options,
        latitude: place.geometry.as_ref().map(|g| g.location.lat),
        longitude: place.geometry.as_ref().map(|g| g.location.lng),
    }
}

fn is_generic_type(kind: &str) -> bool {
    matches!(kind, "point_of_interest" | "establishment" | "food" | "store")
}

/// `"meal_takeaway"` -> `"Meal takeaway"`.
fn humanize_type(kind: &str) -> String {
    let spaced = kind.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => spaced,
    }
}

fn price_symbol(level: u8) -> String {
    match level {
        0 => "Free".to_string(),
        n => "$".repeat(n.min(4) as usize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harvester_core::PageSignal;

    #[test]
    fn structured_result_maps_every_field() {
        let body = br#"{
            "status": "OK",
            "results": [{
                "name": "Harbor Grill",
                "types": ["point_of_interest", "seafood_restaurant"],
                "formatted_address": "1 Pier Rd",
                "rating": 4.6,
                "user_ratings_total": 1280,
                "price_level": 2,
                "opening_hours": {"open_now": true},
                "geometry": {"location": {"lat": 44.9, "lng": -93.2}},
                "takeout": true,
                "dine_in": true,
                "delivery": false
            }],
            "next_page_token": "tok-2"
        }"#;

        let batch = parse_search_response(body, false).unwrap();
        assert_eq!(batch.signal, PageSignal::HasMore(Cursor::new("tok-2")));
        let place = &batch.records[0];
        assert_eq!(place.title.as_deref(), Some("Harbor Grill"));
        assert_eq!(place.category.as_deref(), Some("Seafood restaurant"));
        assert_eq!(place.price_level.as_deref(), Some("$$"));
        assert_eq!(place.hours.as_deref(), Some("Open now"));
        assert_eq!(place.service_options, vec!["Dine-in", "Takeout"]);
        assert_eq!(place.latitude, Some(44.9));
    }

    #[test]
    fn missing_token_means_exhausted() {
        let batch = parse_search_response(br#"{"status":"OK","results":[{"name":"A"}]}"#, true)
            .unwrap();
        assert_eq!(batch.signal, PageSignal::Exhausted);
        assert_eq!(batch.records.len(), 1);
    }

    #[test]
    fn denied_and_garbled_responses_are_errors() {
        let denied = parse_search_response(br#"{"status":"REQUEST_DENIED"}"#, false).unwrap_err();
        assert_eq!(denied.kind, ProviderFailure::Blocked);

        let garbled = parse_search_response(b"<html>", false).unwrap_err();
        assert_eq!(garbled.kind, ProviderFailure::Malformed);

        let stale = parse_search_response(br#"{"status":"INVALID_REQUEST"}"#, true).unwrap_err();
        assert_eq!(stale.kind, ProviderFailure::InvalidCursor);
    }
}
