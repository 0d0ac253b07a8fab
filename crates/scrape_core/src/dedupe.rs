use std::collections::HashSet;

use sha2::{Digest, Sha256};
use url::Url;

use crate::ScrapedItem;

/// Normalize a URL for duplicate detection: trim, lowercase scheme and host,
/// drop the fragment, and drop a trailing slash from the path.
pub fn normalize_url_for_dedupe(raw: &str) -> String {
    let trimmed = raw.trim();
    match Url::parse(trimmed) {
        Ok(mut url) => {
            url.set_fragment(None);
            let mut normalized = url.to_string();
            if url.query().is_none() && normalized.ends_with('/') {
                normalized.pop();
            }
            normalized
        }
        Err(_) => trimmed.trim_end_matches('/').to_ascii_lowercase(),
    }
}

/// Item keys already emitted during one `scrape` call.
///
/// The context is owned by a single batch: each target stage takes it by value
/// and hands it back, so nothing outlives the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupeContext {
    seen: HashSet<String>,
}

impl DedupeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Drops items already seen in this batch or repeated within `items`.
    ///
    /// A non-empty input never comes back empty: when every item is a repeat,
    /// the first one is kept so the target still has a result.
    pub fn filter(mut self, items: Vec<ScrapedItem>) -> (Self, Vec<ScrapedItem>) {
        let mut kept = Vec::with_capacity(items.len());
        let mut first_repeat = None;
        for item in items {
            if self.seen.insert(item_key(&item)) {
                kept.push(item);
            } else if first_repeat.is_none() {
                first_repeat = Some(item);
            }
        }
        if kept.is_empty() {
            kept.extend(first_repeat);
        }
        (self, kept)
    }
}

fn item_key(item: &ScrapedItem) -> String {
    let mut hasher = Sha256::new();
    hasher.update(item.content.trim().as_bytes());
    let digest = hasher.finalize();
    let mut key = normalize_url_for_dedupe(&item.url);
    key.push('#');
    for byte in digest.iter().take(8) {
        use std::fmt::Write;
        let _ = write!(&mut key, "{byte:02x}");
    }
    key
}
