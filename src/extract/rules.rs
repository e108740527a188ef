//! Per-field extraction rules.
//!
//! Each field owns an ordered list of strategies: the embedded Next.js
//! property payload first, then JSON-LD, then text patterns over the visible
//! page. The first strategy returning a value wins.

use super::numbers::{parse_number, value_number, value_text};
use super::PageView;
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use tracing::debug;

/// One way of locating a field in a page
pub struct Strategy<T> {
    pub name: &'static str,
    pub find: fn(&PageView) -> Option<T>,
}

/// Ranked strategies for a single field
pub struct FieldRule<T: 'static> {
    pub field: &'static str,
    pub strategies: &'static [Strategy<T>],
}

impl<T: 'static> FieldRule<T> {
    /// Value from the first strategy that finds one
    pub fn find(&self, page: &PageView) -> Option<T> {
        for strategy in self.strategies {
            if let Some(value) = (strategy.find)(page) {
                debug!("{} found by {}", self.field, strategy.name);
                return Some(value);
            }
        }
        debug!("{} not found", self.field);
        None
    }
}

pub const ADDRESS: FieldRule<String> = FieldRule {
    field: "address",
    strategies: &[
        Strategy { name: "next_data", find: next_data_address },
        Strategy { name: "json_ld", find: json_ld_address },
        Strategy { name: "heading", find: heading_address },
    ],
};

pub const RENT: FieldRule<f64> = FieldRule {
    field: "rent",
    strategies: &[
        Strategy { name: "next_data", find: next_data_rent },
        Strategy { name: "json_ld", find: json_ld_rent },
        Strategy { name: "text_per_month", find: text_rent_per_month },
        Strategy { name: "text_dollar", find: text_rent_any },
    ],
};

pub const BEDROOMS: FieldRule<f64> = FieldRule {
    field: "bedrooms",
    strategies: &[
        Strategy { name: "next_data", find: next_data_bedrooms },
        Strategy { name: "json_ld", find: json_ld_bedrooms },
        Strategy { name: "text", find: text_bedrooms },
    ],
};

pub const BATHROOMS: FieldRule<f64> = FieldRule {
    field: "bathrooms",
    strategies: &[
        Strategy { name: "next_data", find: next_data_bathrooms },
        Strategy { name: "json_ld", find: json_ld_bathrooms },
        Strategy { name: "text", find: text_bathrooms },
    ],
};

pub const SQFT: FieldRule<f64> = FieldRule {
    field: "sqft",
    strategies: &[
        Strategy { name: "next_data", find: next_data_sqft },
        Strategy { name: "json_ld", find: json_ld_sqft },
        Strategy { name: "text", find: text_sqft },
    ],
};

/// Join address parts as "street, city, state". Street is required.
fn compose_address(
    street: Option<String>,
    city: Option<String>,
    state: Option<String>,
) -> Option<String> {
    let street = street?;
    let parts: Vec<String> = [Some(street), city, state].into_iter().flatten().collect();
    Some(parts.join(", "))
}

fn non_negative(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v >= 0.0)
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| *v > 0.0)
}

// Next.js payload

fn property_field<'a>(page: &'a PageView, key: &str) -> Option<&'a Value> {
    page.property.as_ref()?.get(key).filter(|v| !v.is_null())
}

fn next_data_address(page: &PageView) -> Option<String> {
    let text = |key: &str| property_field(page, key).and_then(value_text);
    compose_address(text("streetAddress"), text("city"), text("state")).or_else(|| {
        let address = property_field(page, "address")?;
        compose_address(
            address.get("streetAddress").and_then(value_text),
            address.get("city").and_then(value_text),
            address.get("state").and_then(value_text),
        )
    })
}

fn next_data_rent(page: &PageView) -> Option<f64> {
    positive(property_field(page, "price").and_then(value_number))
}

fn next_data_bedrooms(page: &PageView) -> Option<f64> {
    non_negative(property_field(page, "bedrooms").and_then(value_number))
}

fn next_data_bathrooms(page: &PageView) -> Option<f64> {
    non_negative(property_field(page, "bathrooms").and_then(value_number))
}

fn next_data_sqft(page: &PageView) -> Option<f64> {
    positive(
        property_field(page, "livingAreaValue")
            .or_else(|| property_field(page, "livingArea"))
            .and_then(value_number),
    )
}

// JSON-LD

fn json_ld_find<T>(page: &PageView, f: impl Fn(&Value) -> Option<T>) -> Option<T> {
    page.json_ld.iter().find_map(f)
}

fn json_ld_address(page: &PageView) -> Option<String> {
    json_ld_find(page, |block| {
        let address = block.get("address")?;
        if address.is_string() {
            return value_text(address);
        }
        compose_address(
            address.get("streetAddress").and_then(value_text),
            address.get("addressLocality").and_then(value_text),
            address.get("addressRegion").and_then(value_text),
        )
    })
}

fn json_ld_rent(page: &PageView) -> Option<f64> {
    json_ld_find(page, |block| {
        let offer = match block.get("offers") {
            Some(Value::Array(offers)) => offers.first(),
            Some(offer) if offer.is_object() => Some(offer),
            _ => None,
        };
        let price = match offer {
            Some(offer) => offer.get("price"),
            None if block.get("@type").and_then(Value::as_str) == Some("Offer") => {
                block.get("price")
            }
            None => None,
        };
        positive(price.and_then(value_number))
    })
}

fn json_ld_bedrooms(page: &PageView) -> Option<f64> {
    json_ld_find(page, |block| {
        non_negative(
            block
                .get("numberOfBedrooms")
                .or_else(|| block.get("numberOfRooms"))
                .and_then(value_number),
        )
    })
}

fn json_ld_bathrooms(page: &PageView) -> Option<f64> {
    json_ld_find(page, |block| {
        non_negative(
            block
                .get("numberOfBathroomsTotal")
                .or_else(|| block.get("numberOfFullBathrooms"))
                .and_then(value_number),
        )
    })
}

fn json_ld_sqft(page: &PageView) -> Option<f64> {
    json_ld_find(page, |block| {
        let size = block.get("floorSize")?;
        let value = match size {
            Value::Object(_) => size.get("value").and_then(value_number),
            other => value_number(other),
        };
        positive(value)
    })
}

// Text patterns

static RENT_PER_MONTH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s?([\d,]+(?:\.\d+)?)\+?\s*(?:/\s*mo\b|/\s*month\b|per\s+month\b|monthly\b)")
        .expect("rent per month pattern")
});

static DOLLAR_AMOUNT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\s?(\d[\d,]*(?:\.\d+)?)").expect("dollar amount pattern")
});

static BEDROOMS_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(?:bd|bds|beds?|bedrooms?)\b").expect("bedrooms pattern")
});

static STUDIO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bstudio\b").expect("studio pattern"));

static BATHROOMS_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+(?:\.\d+)?)\s*(?:ba|baths?|bathrooms?)\b").expect("bathrooms pattern")
});

static SQFT_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d[\d,]*(?:\.\d+)?)\s*(?:sq\.?\s*ft\.?|sqft|square\s+feet)")
        .expect("square feet pattern")
});

fn capture_number(text: &str, re: &Regex) -> Option<f64> {
    let caps = re.captures(text)?;
    parse_number(caps.get(1)?.as_str())
}

fn heading_address(page: &PageView) -> Option<String> {
    let heading = page.heading.as_deref()?;
    let candidate = heading.split('|').next()?.trim();
    let looks_like_address =
        candidate.starts_with(|c: char| c.is_ascii_digit()) && candidate.contains(',');
    looks_like_address.then(|| candidate.to_string())
}

fn text_rent_per_month(page: &PageView) -> Option<f64> {
    positive(capture_number(&page.text, &RENT_PER_MONTH))
}

fn text_rent_any(page: &PageView) -> Option<f64> {
    positive(capture_number(&page.text, &DOLLAR_AMOUNT))
}

fn text_bedrooms(page: &PageView) -> Option<f64> {
    capture_number(&page.text, &BEDROOMS_TEXT)
        .or_else(|| STUDIO.is_match(&page.text).then_some(0.0))
}

fn text_bathrooms(page: &PageView) -> Option<f64> {
    capture_number(&page.text, &BATHROOMS_TEXT)
}

fn text_sqft(page: &PageView) -> Option<f64> {
    positive(capture_number(&page.text, &SQFT_TEXT))
}
