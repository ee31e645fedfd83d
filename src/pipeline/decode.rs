//! Result decoding: raw `result.pages` array → page texts + page locations.
//!
//! Every field is defaulted on its own, so a page missing `md` or
//! `page_width` still decodes. A payload without `result.pages` decodes to
//! two empty lists and a warning; the job did succeed, there is just nothing
//! to show.

use crate::output::PageLocation;
use once_cell::sync::Lazy;
use regex::{NoExpand, Regex};
use serde_json::Value;
use tracing::warn;

// `\(` and `\)` → `$`
static RE_INLINE_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[()]").unwrap());
// `\[` and `\]` → `$$`
static RE_DISPLAY_MATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\[\[\]]").unwrap());

/// Rewrite escaped math delimiters into dollar delimiters.
///
/// Purely textual: no attempt is made to check that the LaTeX is balanced.
pub fn escape_to_dollar(text: &str) -> String {
    let inline = RE_INLINE_MATH.replace_all(text, NoExpand("$"));
    RE_DISPLAY_MATH
        .replace_all(&inline, NoExpand("$$"))
        .into_owned()
}

/// Decode the `data` object of a successful status response.
pub fn decode_pages(data: &Value, escape_dollar: bool) -> (Vec<String>, Vec<PageLocation>) {
    let Some(pages) = data
        .get("result")
        .and_then(|r| r.get("pages"))
        .and_then(Value::as_array)
    else {
        warn!("Although parsed successfully, the content is empty!");
        return (Vec::new(), Vec::new());
    };

    let mut texts = Vec::with_capacity(pages.len());
    let mut locations = Vec::with_capacity(pages.len());
    for page in pages {
        let md = page.get("md").and_then(Value::as_str).unwrap_or_default();
        texts.push(if escape_dollar {
            escape_to_dollar(md)
        } else {
            md.to_string()
        });
        locations.push(PageLocation {
            url: page
                .get("url")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            page_idx: number(page, "page_idx"),
            page_width: number(page, "page_width"),
            page_height: number(page, "page_height"),
        });
    }
    (texts, locations)
}

/// Non-negative integer field; floats are rounded, anything else is 0.
fn number(page: &Value, key: &str) -> u64 {
    match page.get(key) {
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .unwrap_or(0),
        None => 0,
    }
}
