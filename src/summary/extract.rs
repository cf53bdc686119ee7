// src/summary/extract.rs
//! Readable article text from rendered page markup.

use std::io::Cursor;

use reqwest::Url;
use tracing::debug;

fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Main article text as picked by readability scoring, `None` when the
/// winning node carries no text. `url` resolves relative links in the page.
pub fn extract_article(html: &str, url: &str) -> Option<String> {
    let base = Url::parse(url)
        .or_else(|_| Url::parse("https://localhost/"))
        .ok()?;
    let mut input = Cursor::new(html.as_bytes());
    match readability::extractor::extract(&mut input, &base) {
        Ok(product) => Some(collapse_ws(&product.text)).filter(|t| !t.is_empty()),
        Err(e) => {
            debug!(target: "summary", url, error = %e, "readability extraction failed");
            None
        }
    }
}

/// Generic HTML-to-text conversion of the whole document.
pub fn html_to_plain_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 80).unwrap_or_default()
}

/// Readability extraction first, whole-page conversion when that finds nothing.
pub fn readable_text(html: &str, url: &str) -> String {
    extract_article(html, url)
        .unwrap_or_else(|| html_to_plain_text(html))
        .trim()
        .to_string()
}
