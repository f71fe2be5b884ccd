/// One provider result as delivered by a transport, before normalization.
///
/// Providers differ in what they supply: a structured API fills the typed
/// fields directly, while a rendered page usually offers little more than an
/// accessible label and a `·`-separated text fragment. Every field is optional;
/// [`crate::FieldNormalizer`] decides the fallbacks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawListing {
    /// Structured title field.
    pub title: Option<String>,
    /// Accessible label or title attribute of the rendered element.
    pub label: Option<String>,
    /// Rendered text fragment, e.g. `"4.5 (128) · Cafe · 12 Main St"`.
    pub text_block: Option<String>,
    pub category: Option<String>,
    pub address: Option<String>,
    pub rating: Option<f64>,
    pub review_count: Option<u64>,
    pub website: Option<String>,
    pub phone: Option<String>,
    pub price_level: Option<String>,
    pub hours: Option<String>,
    pub service_options: Vec<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl RawListing {
    /// Listing as scraped from a rendered anchor: label plus text fragment.
    pub fn from_rendered(label: Option<String>, text_block: Option<String>) -> Self {
        Self {
            label,
            text_block,
            ..Self::default()
        }
    }
}
