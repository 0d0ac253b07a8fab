use serde_json::{json, Map, Value};

use crate::{Platform, ScrapeTarget, ScrapedItem, SynthesisReason};

/// Source label carried by every synthetic item.
pub const SYNTHETIC_SOURCE: &str = "synthetic";

/// Confidence hint for downstream scoring; synthetic records carry no evidence.
const SYNTHETIC_CONFIDENCE: f64 = 0.05;

/// Fabricates the terminal fallback item for `target`.
///
/// The output depends only on the target's platform, host, location context,
/// `reason`, and the supplied timestamp, so the same inputs always produce the
/// same item.
pub fn placeholder(
    target: &ScrapeTarget,
    reason: SynthesisReason,
    extracted_at: &str,
) -> ScrapedItem {
    let platform = target.platform;
    let host = target.display_host();
    let location = target.context.describe();
    let near = location
        .as_deref()
        .map(|loc| format!(" near {loc}"))
        .unwrap_or_default();

    let (title, activity) = match platform {
        p if p.is_real_estate() => (
            format!("{} listing activity", p.display_name()),
            format!("Property listing activity was detected on {host}{near}"),
        ),
        Platform::Craigslist => (
            "Craigslist posting activity".to_string(),
            format!("Classified posting activity was detected on {host}{near}"),
        ),
        p if p.is_social() => (
            format!("{} community activity", p.display_name()),
            format!(
                "Community discussion activity was detected on {}{near}",
                p.display_name()
            ),
        ),
        _ => (
            format!("Activity on {host}"),
            format!("Page activity was detected on {host}{near}"),
        ),
    };

    let why = match reason {
        SynthesisReason::DirectUnreachable => {
            "but neither the scraping backends nor a direct request could retrieve its content"
        }
        SynthesisReason::BatchCapExceeded => {
            "but the page was not scraped because the batch exceeded its size limit"
        }
        SynthesisReason::StagePanicked => {
            "but extraction stopped on an internal error before any content was retrieved"
        }
    };

    let content = format!(
        "{activity}, {why}. This is a placeholder record; verify the source page manually before acting on it."
    );

    let mut metadata = Map::new();
    metadata.insert("reason".into(), json!(reason));
    metadata.insert("confidence".into(), json!(SYNTHETIC_CONFIDENCE));
    if let Some(host) = target.host.as_deref() {
        metadata.insert("host".into(), Value::String(host.to_string()));
    }
    if let Some(location) = location {
        metadata.insert("location".into(), Value::String(location));
    }

    ScrapedItem {
        url: target.url.clone(),
        title,
        content,
        platform,
        source: SYNTHETIC_SOURCE.to_string(),
        extracted_at: extracted_at.to_string(),
        synthetic: true,
        protection_detected: false,
        metadata,
    }
}
