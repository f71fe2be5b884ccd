/// Placeholder for any text or numeric field that could not be determined.
pub const NOT_AVAILABLE: &str = "N/A";
/// Placeholder for a review count that could not be determined.
pub const NO_REVIEWS: &str = "0";

/// Output column names, in the order every row is written.
pub const COLUMNS: [&str; 13] = [
    "name",
    "category",
    "address",
    "rating",
    "review_count",
    "website",
    "phone",
    "price_level",
    "hours",
    "service_options",
    "latitude",
    "longitude",
    "timestamp",
];

/// Canonical, fully populated listing. Unknown fields hold sentinels, never
/// empty strings, so every stored row has the complete column set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusinessRecord {
    pub name: String,
    pub category: String,
    pub address: String,
    pub rating: String,
    pub review_count: String,
    pub website: String,
    pub phone: String,
    pub price_level: String,
    pub hours: String,
    pub service_options: String,
    pub latitude: String,
    pub longitude: String,
    pub timestamp: String,
}

impl BusinessRecord {
    /// A record carrying only a name; every other field is a sentinel.
    pub fn named(name: impl Into<String>, timestamp: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category: NOT_AVAILABLE.to_string(),
            address: NOT_AVAILABLE.to_string(),
            rating: NOT_AVAILABLE.to_string(),
            review_count: NO_REVIEWS.to_string(),
            website: NOT_AVAILABLE.to_string(),
            phone: NOT_AVAILABLE.to_string(),
            price_level: NOT_AVAILABLE.to_string(),
            hours: NOT_AVAILABLE.to_string(),
            service_options: NOT_AVAILABLE.to_string(),
            latitude: NOT_AVAILABLE.to_string(),
            longitude: NOT_AVAILABLE.to_string(),
            timestamp: timestamp.into(),
        }
    }

    /// Field values in [`COLUMNS`] order.
    pub fn to_row(&self) -> [&str; 13] {
        [
            self.name.as_str(),
            self.category.as_str(),
            self.address.as_str(),
            self.rating.as_str(),
            self.review_count.as_str(),
            self.website.as_str(),
            self.phone.as_str(),
            self.price_level.as_str(),
            self.hours.as_str(),
            self.service_options.as_str(),
            self.latitude.as_str(),
            self.longitude.as_str(),
            self.timestamp.as_str(),
        ]
    }

    /// Rebuild a record from a stored row. Short rows are padded with sentinels.
    pub fn from_row<S: AsRef<str>>(row: &[S]) -> Option<Self> {
        let get = |idx: usize, fallback: &str| -> String {
            row.get(idx)
                .map(|v| v.as_ref().trim())
                .filter(|v| !v.is_empty())
                .unwrap_or(fallback)
                .to_string()
        };
        let name = row.first()?.as_ref().trim();
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            category: get(1, NOT_AVAILABLE),
            address: get(2, NOT_AVAILABLE),
            rating: get(3, NOT_AVAILABLE),
            review_count: get(4, NO_REVIEWS),
            website: get(5, NOT_AVAILABLE),
            phone: get(6, NOT_AVAILABLE),
            price_level: get(7, NOT_AVAILABLE),
            hours: get(8, NOT_AVAILABLE),
            service_options: get(9, NOT_AVAILABLE),
            latitude: get(10, NOT_AVAILABLE),
            longitude: get(11, NOT_AVAILABLE),
            timestamp: get(12, NOT_AVAILABLE),
        })
    }
}
