use serde::{Deserialize, Serialize};

/// Geographic bias applied to a search.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoBias {
    pub latitude: f64,
    pub longitude: f64,
    /// Search radius in metres.
    pub radius_m: u32,
}

/// What to harvest. Two queries with the same [`SearchQuery::key`] share a
/// cursor slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchQuery {
    pub text: String,
    /// Locale or region hint, e.g. `"in"` or `"en-GB"`.
    pub region: Option<String>,
    pub geo_bias: Option<GeoBias>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            region: None,
            geo_bias: None,
        }
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(region.into());
        self
    }

    pub fn with_geo_bias(mut self, bias: GeoBias) -> Self {
        self.geo_bias = Some(bias);
        self
    }

    /// Stable identity of the logical query target. Case and spacing of the
    /// text do not create a new target.
    pub fn key(&self) -> String {
        let text = self
            .text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();
        let region = self.region.as_deref().unwrap_or("").to_lowercase();
        let bias = self
            .geo_bias
            .map(|b| format!("{:.4},{:.4},{}", b.latitude, b.longitude, b.radius_m))
            .unwrap_or_default();
        format!("{text}|{region}|{bias}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_ignores_case_and_spacing() {
        let a = SearchQuery::new("Cafes  in Pune").with_region("IN");
        let b = SearchQuery::new(" cafes in pune ").with_region("in");
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn region_and_bias_split_targets() {
        let plain = SearchQuery::new("cafes");
        let regional = SearchQuery::new("cafes").with_region("in");
        let biased = SearchQuery::new("cafes").with_geo_bias(GeoBias {
            latitude: 18.52,
            longitude: 73.85,
            radius_m: 5_000,
        });
        assert_ne!(plain.key(), regional.key());
        assert_ne!(plain.key(), biased.key());
    }
}
