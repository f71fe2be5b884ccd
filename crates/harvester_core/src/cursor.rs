use std::fmt;

use crate::RawListing;

/// Opaque continuation token. Only the source that issued it can interpret it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Read a stored token; blank means "no cursor".
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            None
        } else {
            Some(Self(token.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What a source says about the rest of the sequence after a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageSignal {
    /// More pages exist; resume from this cursor.
    HasMore(Cursor),
    /// The sequence is finished; do not fetch again.
    Exhausted,
}

/// One fetched page of raw listings, in provider order.
#[derive(Debug, Clone, PartialEq)]
pub struct PageBatch {
    pub records: Vec<RawListing>,
    pub signal: PageSignal,
}

impl PageBatch {
    pub fn has_more(records: Vec<RawListing>, next: Cursor) -> Self {
        Self {
            records,
            signal: PageSignal::HasMore(next),
        }
    }

    pub fn exhausted(records: Vec<RawListing>) -> Self {
        Self {
            records,
            signal: PageSignal::Exhausted,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
