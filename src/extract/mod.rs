//! Listing extraction.
//!
//! A page is digested once into a [`PageView`]; every field is then located
//! by its own ranked list of rules (see [`rules`]). When the listing source
//! changes its markup, only the rule list of the affected field needs to
//! change.

pub mod numbers;
pub mod rules;

use crate::error::ExtractError;
use crate::models::ListingRecord;
use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

/// Everything the field rules look at, parsed out of the raw page once
#[derive(Debug, Default, Clone)]
pub struct PageView {
    /// Property object from the embedded Next.js payload
    pub property: Option<Value>,
    /// All JSON-LD objects on the page, arrays and `@graph` flattened
    pub json_ld: Vec<Value>,
    /// `og:title`, then `<h1>`, then `<title>`
    pub heading: Option<String>,
    /// Visible text with scripts and styles removed
    pub text: String,
}

impl PageView {
    pub fn parse(content: &str) -> Result<Self, ExtractError> {
        if content.trim().is_empty() {
            return Err(ExtractError::Empty);
        }

        let document = Html::parse_document(content);
        if !has_content_elements(&document) {
            return Err(ExtractError::NotMarkup);
        }

        Ok(Self {
            property: next_data_property(&document),
            json_ld: json_ld_blocks(&document),
            heading: heading(&document),
            text: visible_text(&document),
        })
    }
}

/// Turn raw page content into a listing record.
///
/// Only fails when the content is not a page at all. A field whose rules all
/// miss is left as `None` without affecting the others.
pub fn extract_listing(url: &str, content: &str) -> Result<ListingRecord, ExtractError> {
    let page = PageView::parse(content)?;

    let record = ListingRecord {
        url: url.to_string(),
        address: rules::ADDRESS.find(&page),
        rent: rules::RENT.find(&page),
        bedrooms: rules::BEDROOMS.find(&page),
        bathrooms: rules::BATHROOMS.find(&page),
        sqft: rules::SQFT.find(&page),
    };

    debug!(
        "Extracted {}: address={:?} rent={:?} beds={:?} baths={:?} sqft={:?}",
        url, record.address, record.rent, record.bedrooms, record.bathrooms, record.sqft
    );

    Ok(record)
}

fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// html5ever always synthesizes `html`, `head` and `body`; a real page has
/// at least one element beyond those.
fn has_content_elements(document: &Html) -> bool {
    let Some(any) = selector("*") else {
        return false;
    };
    document
        .select(&any)
        .any(|el| !matches!(el.value().name(), "html" | "head" | "body"))
}

fn next_data_property(document: &Html) -> Option<Value> {
    let sel = selector(r#"script[id="__NEXT_DATA__"]"#)?;
    let script = document.select(&sel).next()?;
    let json_text: String = script.text().collect();
    let data: Value = serde_json::from_str(&json_text).ok()?;

    let cache = &data["props"]["pageProps"]["componentProps"]["gdpClientCache"];
    // The client cache is usually a JSON document embedded as a string
    let cache = match cache {
        Value::String(s) => serde_json::from_str::<Value>(s).ok()?,
        Value::Object(_) => cache.clone(),
        _ => return None,
    };

    cache
        .as_object()?
        .values()
        .find_map(|entry| entry.get("property").filter(|p| p.is_object()).cloned())
}

fn json_ld_blocks(document: &Html) -> Vec<Value> {
    let Some(sel) = selector(r#"script[type="application/ld+json"]"#) else {
        return Vec::new();
    };

    let mut blocks = Vec::new();
    for script in document.select(&sel) {
        let json_text: String = script.text().collect();
        if let Ok(value) = serde_json::from_str::<Value>(&json_text) {
            flatten_json_ld(value, &mut blocks);
        }
    }
    blocks
}

fn flatten_json_ld(value: Value, out: &mut Vec<Value>) {
    match value {
        Value::Array(items) => items.into_iter().for_each(|v| flatten_json_ld(v, out)),
        Value::Object(mut map) => {
            if let Some(graph) = map.remove("@graph") {
                flatten_json_ld(graph, out);
            }
            out.push(Value::Object(map));
        }
        _ => {}
    }
}

fn heading(document: &Html) -> Option<String> {
    let og = selector(r#"meta[property="og:title"]"#).and_then(|sel| {
        document
            .select(&sel)
            .find_map(|el| el.value().attr("content").map(str::to_string))
    });

    let text_of = |css: &str| {
        selector(css).and_then(|sel| {
            document
                .select(&sel)
                .next()
                .map(|el| el.text().collect::<String>())
        })
    };

    [og, text_of("h1"), text_of("title")]
        .into_iter()
        .flatten()
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|s| !s.is_empty())
}

fn visible_text(document: &Html) -> String {
    let mut parts = Vec::new();
    for node in document.root_element().descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node
            .parent()
            .and_then(|p| {
                p.value()
                    .as_element()
                    .map(|e| matches!(e.name(), "script" | "style" | "noscript" | "template"))
            })
            .unwrap_or(false);
        let trimmed = text.trim();
        if !hidden && !trimmed.is_empty() {
            parts.push(trimmed.to_string());
        }
    }
    parts.join(" ")
}
