use serde::Serialize;

/// Column order of a store region. Row 1 of the region carries these names.
pub const HEADER: [&str; 4] = ["date", "title", "url", "source"];

/// One reward link as persisted. `url` is the identity key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Record {
    pub date: String,
    pub title: String,
    pub url: String,
    pub source: String,
}

/// A link as found in the markup, before resolution and validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub title: String,
    /// Text that may contain a `YYYY-MM-DD` date for this block.
    pub date_hint: Option<String>,
    pub block_index: usize,
}

impl Record {
    #[cfg(test)]
    pub fn new(url: &str, title: &str, date: &str) -> Self {
        Record {
            date: date.to_string(),
            title: title.to_string(),
            url: url.to_string(),
            source: crate::settings::DEFAULT_SOURCE_URL.to_string(),
        }
    }
}
