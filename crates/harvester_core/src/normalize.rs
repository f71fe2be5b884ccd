use crate::record::{BusinessRecord, NOT_AVAILABLE, NO_REVIEWS};
use crate::RawListing;

/// Separator glyph used by rendered result fragments.
pub const SEGMENT_SEPARATOR: char = '·';

const HOURS_PREFIXES: &[&str] = &["Open", "Closed", "Closes", "Opens", "Temporarily closed"];
const MIN_PHONE_DIGITS: usize = 7;

/// Values recovered from a rendered text fragment. `None` means the fragment
/// had nothing for that field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextBlockFields {
    pub rating: Option<String>,
    pub review_count: Option<String>,
    pub category: Option<String>,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub hours: Option<String>,
}

/// Maps [`RawListing`]s onto the fixed [`BusinessRecord`] schema.
///
/// Structured fields win over values parsed from the text fragment; anything
/// still unknown gets a sentinel. Only a missing name rejects a listing.
#[derive(Debug, Clone, Copy)]
pub struct FieldNormalizer {
    separator: char,
}

impl Default for FieldNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldNormalizer {
    pub fn new() -> Self {
        Self::with_separator(SEGMENT_SEPARATOR)
    }

    pub fn with_separator(separator: char) -> Self {
        Self { separator }
    }

    /// Normalize one listing, stamping it with `processed_at`. Returns `None`
    /// when no name can be resolved.
    pub fn normalize(&self, raw: &RawListing, processed_at: &str) -> Option<BusinessRecord> {
        let name = resolve_name(raw)?;
        let text = raw
            .text_block
            .as_deref()
            .map(|block| self.parse_text_block(block))
            .unwrap_or_default();

        let mut record = BusinessRecord::named(name, processed_at);
        record.category = pick(clean(raw.category.as_deref()), text.category, NOT_AVAILABLE);
        record.address = pick(clean(raw.address.as_deref()), text.address, NOT_AVAILABLE);
        record.rating = pick(raw.rating.and_then(format_rating), text.rating, NOT_AVAILABLE);
        record.review_count = pick(
            raw.review_count.map(|count| count.to_string()),
            text.review_count,
            NO_REVIEWS,
        );
        record.website = pick(clean(raw.website.as_deref()), None, NOT_AVAILABLE);
        record.phone = pick(clean(raw.phone.as_deref()), text.phone, NOT_AVAILABLE);
        record.price_level = pick(clean(raw.price_level.as_deref()), None, NOT_AVAILABLE);
        record.hours = pick(clean(raw.hours.as_deref()), text.hours, NOT_AVAILABLE);
        record.service_options = pick(join_options(&raw.service_options), None, NOT_AVAILABLE);
        record.latitude = pick(raw.latitude.and_then(format_coordinate), None, NOT_AVAILABLE);
        record.longitude = pick(raw.longitude.and_then(format_coordinate), None, NOT_AVAILABLE);
        Some(record)
    }

    /// Split a rendered fragment and assign its segments to fields.
    ///
    /// A first segment starting with a digit is the rating segment. Anything
    /// else, including later segments, fills category then address, except
    /// segments that look like a phone number or opening hours.
    pub fn parse_text_block(&self, block: &str) -> TextBlockFields {
        let mut fields = TextBlockFields::default();
        let mut segments = block
            .split(self.separator)
            .filter_map(|segment| clean(Some(segment)))
            .peekable();

        let starts_with_digit = segments
            .peek()
            .and_then(|first| first.chars().next())
            .is_some_and(|c| c.is_ascii_digit());
        if starts_with_digit {
            if let Some(first) = segments.next() {
                let (rating, review_count) = parse_rating_segment(&first);
                fields.rating = Some(rating);
                fields.review_count = Some(review_count);
            }
        }

        for segment in segments {
            if fields.phone.is_none() && looks_like_phone(&segment) {
                fields.phone = Some(segment);
            } else if fields.hours.is_none() && looks_like_hours(&segment) {
                fields.hours = Some(segment);
            } else if fields.category.is_none() {
                fields.category = Some(segment);
            } else if fields.address.is_none() {
                fields.address = Some(segment);
            }
        }
        fields
    }
}

fn resolve_name(raw: &RawListing) -> Option<String> {
    clean(raw.title.as_deref()).or_else(|| clean(raw.label.as_deref()))
}

fn pick(structured: Option<String>, parsed: Option<String>, sentinel: &str) -> String {
    structured
        .or(parsed)
        .unwrap_or_else(|| sentinel.to_string())
}

/// The dedup key for a business name, as [`FieldNormalizer::normalize`]
/// writes it. Blank names have no key.
pub fn name_key(name: &str) -> Option<String> {
    clean(Some(name))
}

/// Trim and collapse internal whitespace; empty input is `None`.
fn clean(value: Option<&str>) -> Option<String> {
    let collapsed = value?.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// `"4.5 (1,024)"` -> `("4.5", "1024")`. Each half falls back to its sentinel.
fn parse_rating_segment(segment: &str) -> (String, String) {
    let (head, parenthesized) = match segment.split_once('(') {
        Some((head, rest)) => (head, Some(rest.split(')').next().unwrap_or(rest))),
        None => (segment, None),
    };

    let rating = head
        .split_whitespace()
        .next()
        .and_then(parse_rating)
        .and_then(format_rating)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string());
    let review_count = parenthesized
        .and_then(parse_review_count)
        .unwrap_or_else(|| NO_REVIEWS.to_string());
    (rating, review_count)
}

fn parse_rating(token: &str) -> Option<f64> {
    token.replace(',', ".").parse::<f64>().ok()
}

fn format_rating(rating: f64) -> Option<String> {
    (rating.is_finite() && (0.0..=5.0).contains(&rating)).then(|| format!("{rating:.1}"))
}

fn format_coordinate(value: f64) -> Option<String> {
    value.is_finite().then(|| value.to_string())
}

/// Strip parentheses and thousands separators; accepts `K`/`M` abbreviations.
fn parse_review_count(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(['(', ')']).trim();
    let multiplier = match trimmed.chars().last() {
        Some('K' | 'k') => Some(1_000.0),
        Some('M' | 'm') => Some(1_000_000.0),
        _ => None,
    };
    if let Some(multiplier) = multiplier {
        let number = trimmed[..trimmed.len() - 1].trim().replace(',', ".");
        let value = number.parse::<f64>().ok()?;
        if !value.is_finite() || value < 0.0 {
            return None;
        }
        return Some(((value * multiplier).round() as u64).to_string());
    }

    let digits: String = trimmed
        .chars()
        .filter(|c| !matches!(c, ',' | '.' | '\'' | ' ' | '\u{a0}' | '\u{202f}'))
        .collect();
    if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) {
        let count = digits.trim_start_matches('0');
        Some(if count.is_empty() { "0" } else { count }.to_string())
    } else {
        None
    }
}

fn looks_like_phone(segment: &str) -> bool {
    let digit_count = segment.chars().filter(char::is_ascii_digit).count();
    digit_count >= MIN_PHONE_DIGITS
        && segment
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'))
}

fn looks_like_hours(segment: &str) -> bool {
    HOURS_PREFIXES
        .iter()
        .any(|prefix| segment.starts_with(prefix))
}

fn join_options(options: &[String]) -> Option<String> {
    let cleaned: Vec<String> = options
        .iter()
        .filter_map(|option| clean(Some(option)))
        .collect();
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.join(", "))
    }
}
