use std::sync::Arc;

use scrape_core::{truncate_chars, DirectOutcome, ScrapeTarget, ScrapedItem};
use scrape_logging::{scrape_debug, scrape_info, scrape_warn};
use serde_json::{json, Map, Value};

use crate::decode::decode_html_lossy;
use crate::extract::{Extractor, PlainTextExtractor};
use crate::{FailureKind, FetchError, FetchOutput, Fetcher};

pub const DIRECT_SOURCE: &str = "direct";

const FETCHED_CONFIDENCE: f64 = 0.6;
const PROTECTION_CONFIDENCE: f64 = 0.2;

/// Last real rung of the cascade: GET the page and keep its visible text.
pub struct DirectFetcher {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    max_content_chars: usize,
}

impl DirectFetcher {
    pub fn new(fetcher: Arc<dyn Fetcher>, max_content_chars: usize) -> Self {
        Self {
            fetcher,
            extractor: Arc::new(PlainTextExtractor),
            max_content_chars,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.extractor = extractor;
        self
    }

    pub fn max_content_chars(&self) -> usize {
        self.max_content_chars
    }

    /// Fetches `target`. A site that answered without usable content yields a
    /// protection record; only a missing response is unrecoverable.
    pub async fn fetch(&self, target: &ScrapeTarget, extracted_at: &str) -> DirectOutcome {
        scrape_info!("Direct fetch of {}", target.url);
        match self.fetcher.fetch(&target.url).await {
            Ok(output) => self.page_outcome(target, output, extracted_at),
            Err(err) if err.kind.site_responded() => {
                scrape_warn!("Direct fetch of {} refused: {}", target.url, err);
                let status = match err.kind {
                    FailureKind::HttpStatus(code) => Some(code),
                    _ => None,
                };
                let reason = err.kind.to_string();
                let item = self.protection_item(target, status, &reason, extracted_at);
                DirectOutcome::ProtectionDetected {
                    item,
                    status,
                    reason,
                }
            }
            Err(err) => {
                scrape_warn!("Direct fetch of {} unreachable: {}", target.url, err);
                DirectOutcome::Unrecoverable {
                    error: describe(&err),
                }
            }
        }
    }

    fn page_outcome(
        &self,
        target: &ScrapeTarget,
        output: FetchOutput,
        extracted_at: &str,
    ) -> DirectOutcome {
        let meta = output.metadata;
        let decoded = decode_html_lossy(&output.bytes, meta.content_type.as_deref());
        let extracted = self.extractor.extract(&decoded.html);
        let content = truncate_chars(&extracted.text, self.max_content_chars);
        scrape_debug!(
            "Direct fetch of {}: {} bytes as {}, {} chars of text",
            target.url,
            meta.byte_len,
            decoded.encoding_label,
            content.chars().count()
        );

        if content.is_empty() {
            let reason = "page returned no extractable text".to_string();
            let item = self.protection_item(target, Some(meta.status), &reason, extracted_at);
            return DirectOutcome::ProtectionDetected {
                item,
                status: Some(meta.status),
                reason,
            };
        }

        let mut metadata = Map::new();
        metadata.insert("confidence".into(), json!(FETCHED_CONFIDENCE));
        metadata.insert("httpStatus".into(), json!(meta.status));
        metadata.insert("encoding".into(), Value::String(decoded.encoding_label));
        if meta.redirect_count > 0 {
            metadata.insert("redirects".into(), json!(meta.redirect_count));
        }
        if let Some(content_type) = meta.content_type {
            metadata.insert("contentType".into(), Value::String(content_type));
        }

        let title = extracted
            .title
            .unwrap_or_else(|| format!("{} page", target.platform.display_name()));

        DirectOutcome::Fetched {
            item: ScrapedItem {
                url: meta.final_url,
                title,
                content,
                platform: target.platform,
                source: DIRECT_SOURCE.to_string(),
                extracted_at: extracted_at.to_string(),
                synthetic: false,
                protection_detected: false,
                metadata,
            },
        }
    }

    fn protection_item(
        &self,
        target: &ScrapeTarget,
        status: Option<u16>,
        reason: &str,
        extracted_at: &str,
    ) -> ScrapedItem {
        let host = target.display_host();
        let near = target
            .context
            .describe()
            .map(|loc| format!(" for {loc}"))
            .unwrap_or_default();
        let note = format!(
            "{host} was reached{near} but did not return readable content ({reason}). \
             The site likely restricts automated access; open the page in a browser to review it."
        );
        let content = truncate_chars(&note, self.max_content_chars);

        let mut metadata = Map::new();
        metadata.insert("confidence".into(), json!(PROTECTION_CONFIDENCE));
        metadata.insert("reason".into(), Value::String(reason.to_string()));
        if let Some(status) = status {
            metadata.insert("httpStatus".into(), json!(status));
        }

        ScrapedItem {
            url: target.url.clone(),
            title: format!("{} access restricted", target.platform.display_name()),
            content,
            platform: target.platform,
            source: DIRECT_SOURCE.to_string(),
            extracted_at: extracted_at.to_string(),
            synthetic: false,
            protection_detected: true,
            metadata,
        }
    }
}

fn describe(err: &FetchError) -> String {
    format!("{}: {}", err.kind, err.message)
}
