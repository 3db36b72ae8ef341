pub mod extract;
pub mod normalize;

use crate::error::ScrapeError;
use crate::record::Record;
use extract::Selectors;
use normalize::Context;

/// Two-pass pipeline: markup → candidates → records (duplicates still included).
pub fn parse_page(html: &str, selectors: &Selectors, ctx: &Context) -> Result<Vec<Record>, ScrapeError> {
    let candidates = extract::extract(html, selectors)?;
    Ok(normalize::normalize(candidates, ctx))
}
