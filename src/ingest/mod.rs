// src/ingest/mod.rs
pub mod providers;
pub mod registry;
pub mod types;

use once_cell::sync::OnceCell;
use regex::Regex;
use sha2::{Digest, Sha256};

pub use registry::{FetcherRegistry, UnsupportedSourceType};
pub use types::{FetchedItem, SourceFetcher, ValidationResult};

const CLEAN_CONTENT_MAX_CHARS: usize = 10_000;

/// Plain-text rendition of feed HTML: entities decoded, tags stripped, whitespace collapsed.
pub fn clean_text(s: &str) -> String {
    // 1) HTML entity decode
    let mut out = html_escape::decode_html_entities(s).to_string();

    // 2) Strip HTML tags
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)<script.*?</script>|</?[^>]+>").unwrap());
    out = re_tags.replace_all(&out, " ").to_string();

    // 3) Normalize typographic quotes to ASCII
    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    // 4) Collapse whitespace
    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > CLEAN_CONTENT_MAX_CHARS {
        out = out.chars().take(CLEAN_CONTENT_MAX_CHARS).collect();
    }
    out
}

/// Deterministic id for entries that carry neither guid nor link.
pub fn hashed_natural_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for p in parts {
        hasher.update(p.as_bytes());
        hasher.update([0u8]);
    }
    let digest = hasher.finalize();
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_text_strips_tags_and_collapses_ws() {
        let s = "  <p>Hello,&nbsp;&nbsp; <b>world</b></p>\n\n<script>x()</script> ";
        assert_eq!(clean_text(s), "Hello, world");
    }

    #[test]
    fn clean_text_normalizes_quotes() {
        assert_eq!(clean_text("\u{201C}quoted\u{201D} it\u{2019}s"), "\"quoted\" it's");
    }

    #[test]
    fn hashed_id_is_stable_and_separator_aware() {
        let a = hashed_natural_id(&["ab", "c"]);
        assert_eq!(a, hashed_natural_id(&["ab", "c"]));
        assert_ne!(a, hashed_natural_id(&["a", "bc"]));
        assert_eq!(a.len(), 32);
    }
}
