use serde_json::{Map, Value};

use crate::{truncate_chars, ScrapeTarget, ScrapedItem};

const URL_FIELDS: &[&str] = &["url", "detailUrl", "postUrl", "link", "inputUrl"];
const TITLE_FIELDS: &[&str] = &["title", "name", "streetAddress", "address", "headline"];
const CONTENT_FIELDS: &[&str] = &[
    "text",
    "content",
    "markdown",
    "description",
    "body",
    "caption",
    "selftext",
];
const PROPERTY_FIELDS: &[&str] = &[
    "zpid",
    "price",
    "bedrooms",
    "bathrooms",
    "livingArea",
    "lotSize",
    "yearBuilt",
    "homeStatus",
    "homeType",
    "address",
    "city",
    "state",
    "zipcode",
    "daysOnMarket",
];

/// Converts a backend dataset into items for `target`.
///
/// Items without any usable content (nulls, empty objects, blank strings) are
/// skipped, so a dataset of placeholders normalizes to an empty list.
pub fn normalize_items(
    raw: Vec<Value>,
    target: &ScrapeTarget,
    source: &str,
    extracted_at: &str,
    max_content_chars: usize,
) -> Vec<ScrapedItem> {
    raw.into_iter()
        .filter_map(|value| normalize_one(value, target, source, extracted_at, max_content_chars))
        .collect()
}

fn normalize_one(
    value: Value,
    target: &ScrapeTarget,
    source: &str,
    extracted_at: &str,
    max_content_chars: usize,
) -> Option<ScrapedItem> {
    let (url, title, content, metadata) = match value {
        Value::String(text) => (None, None, text, Map::new()),
        Value::Object(mut fields) => {
            if !fields.values().any(has_substance) {
                return None;
            }
            let property = if target.platform.is_real_estate() {
                property_data(&fields)
            } else {
                Map::new()
            };
            let url = take_string(&mut fields, URL_FIELDS);
            let title = take_string(&mut fields, TITLE_FIELDS);
            let content = match take_string(&mut fields, CONTENT_FIELDS) {
                Some(content) => content,
                None if fields.values().any(has_substance) => {
                    Value::Object(fields.clone()).to_string()
                }
                None => title.clone().unwrap_or_default(),
            };
            let mut metadata = fields;
            if !property.is_empty() {
                metadata.insert("propertyData".into(), Value::Object(property));
            }
            (url, title, content, metadata)
        }
        _ => return None,
    };

    let content = truncate_chars(content.trim(), max_content_chars);
    if content.is_empty() {
        return None;
    }

    Some(ScrapedItem {
        url: url.unwrap_or_else(|| target.url.clone()),
        title: title.unwrap_or_else(|| format!("{} result", target.platform.display_name())),
        content,
        platform: target.platform,
        source: source.to_string(),
        extracted_at: extracted_at.to_string(),
        synthetic: false,
        protection_detected: false,
        metadata,
    })
}

/// Removes and returns the first non-blank string among `keys`.
fn take_string(fields: &mut Map<String, Value>, keys: &[&str]) -> Option<String> {
    for key in keys {
        let is_text = matches!(fields.get(*key), Some(Value::String(s)) if !s.trim().is_empty());
        if is_text {
            if let Some(Value::String(s)) = fields.remove(*key) {
                return Some(s.trim().to_string());
            }
        }
    }
    None
}

fn has_substance(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(values) => !values.is_empty(),
        Value::Object(fields) => !fields.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

fn property_data(fields: &Map<String, Value>) -> Map<String, Value> {
    PROPERTY_FIELDS
        .iter()
        .filter_map(|key| {
            fields
                .get(*key)
                .filter(|value| !value.is_null())
                .map(|value| ((*key).to_string(), value.clone()))
        })
        .collect()
}
