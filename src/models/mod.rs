use std::collections::HashMap;
use std::fmt;

/// Value written in place of anything that could not be determined
pub const MISSING_MARKER: &str = "NA";

/// One input row: the listing URL plus every other column, untouched
#[derive(Debug, Clone, PartialEq)]
pub struct ListingRequest {
    /// Position of the row in the input, used to restore order at the end
    pub index: usize,
    pub url: String,
    /// Input cells in input column order (the URL column included)
    pub columns: Vec<String>,
}

/// Fields extracted from a single listing page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListingRecord {
    pub url: String,
    pub address: Option<String>,
    pub rent: Option<f64>,
    pub bedrooms: Option<f64>,
    pub bathrooms: Option<f64>,
    pub sqft: Option<f64>,
}

impl ListingRecord {
    /// Record with every extracted field absent, used when fetch or parse fails
    pub fn empty(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Monthly rent divided by living area
    pub fn price_per_sqft(&self) -> Option<f64> {
        match (self.rent, self.sqft) {
            (Some(rent), Some(sqft)) if sqft > 0.0 => Some(rent / sqft),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.address.is_none()
            && self.rent.is_none()
            && self.bedrooms.is_none()
            && self.bathrooms.is_none()
            && self.sqft.is_none()
    }
}

/// Travel time for one (origin, destination) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommuteDuration {
    Minutes(u32),
    Unavailable,
}

impl CommuteDuration {
    pub fn minutes(&self) -> Option<u32> {
        match self {
            Self::Minutes(m) => Some(*m),
            Self::Unavailable => None,
        }
    }
}

impl fmt::Display for CommuteDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Minutes(m) => write!(f, "{}", m),
            Self::Unavailable => f.write_str(MISSING_MARKER),
        }
    }
}

/// Durations for every (origin, destination) pair that was queried
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CommuteResult {
    durations: HashMap<(String, String), CommuteDuration>,
}

impl CommuteResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, origin: &str, destination: &str, duration: CommuteDuration) {
        self.durations
            .insert((origin.to_string(), destination.to_string()), duration);
    }

    pub fn get(&self, origin: &str, destination: &str) -> Option<CommuteDuration> {
        self.durations
            .get(&(origin.to_string(), destination.to_string()))
            .copied()
    }

    pub fn len(&self) -> usize {
        self.durations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.durations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(String, String), &CommuteDuration)> {
        self.durations.iter()
    }

    /// Number of pairs that resolved to an actual duration
    pub fn available(&self) -> usize {
        self.durations
            .values()
            .filter(|d| matches!(d, CommuteDuration::Minutes(_)))
            .count()
    }
}

/// A finished output row: passthrough cells, extracted fields, one cell per destination
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRow {
    pub index: usize,
    pub passthrough: Vec<String>,
    pub record: ListingRecord,
    pub commutes: Vec<CommuteDuration>,
}

impl OutputRow {
    /// Flatten to CSV cells. Absent values become [`MISSING_MARKER`].
    pub fn cells(&self) -> Vec<String> {
        let mut cells = self.passthrough.clone();
        cells.push(
            self.record
                .address
                .clone()
                .unwrap_or_else(|| MISSING_MARKER.to_string()),
        );
        cells.push(format_number(self.record.rent));
        cells.push(format_number(self.record.bedrooms));
        cells.push(format_number(self.record.bathrooms));
        cells.push(format_number(self.record.sqft));
        cells.push(format_number(
            self.record.price_per_sqft().map(|p| (p * 100.0).round() / 100.0),
        ));
        cells.extend(self.commutes.iter().map(|c| c.to_string()));
        cells
    }
}

/// Column names for the extracted fields, in the order [`OutputRow::cells`] emits them
pub const EXTRACTED_COLUMNS: [&str; 6] = [
    "address",
    "rent",
    "bedrooms",
    "bathrooms",
    "sqft",
    "price_per_sqft",
];

fn format_number(value: Option<f64>) -> String {
    match value {
        Some(v) if v.fract() == 0.0 && v.abs() < 1e15 => format!("{}", v as i64),
        Some(v) => format!("{}", v),
        None => MISSING_MARKER.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_per_sqft_requires_both_fields() {
        let mut record = ListingRecord::empty("https://example.com/a");
        record.rent = Some(2000.0);
        assert_eq!(record.price_per_sqft(), None);

        record.sqft = Some(800.0);
        assert_eq!(record.price_per_sqft(), Some(2.5));

        record.sqft = Some(0.0);
        assert_eq!(record.price_per_sqft(), None);
    }

    #[test]
    fn unavailable_is_not_zero() {
        assert_ne!(CommuteDuration::Unavailable, CommuteDuration::Minutes(0));
        assert_eq!(CommuteDuration::Unavailable.to_string(), "NA");
        assert_eq!(CommuteDuration::Minutes(0).to_string(), "0");
    }

    #[test]
    fn cells_are_rectangular_for_empty_record() {
        let row = OutputRow {
            index: 0,
            passthrough: vec!["https://example.com/b".to_string()],
            record: ListingRecord::empty("https://example.com/b"),
            commutes: vec![CommuteDuration::Unavailable, CommuteDuration::Minutes(12)],
        };
        let cells = row.cells();
        assert_eq!(cells.len(), 1 + EXTRACTED_COLUMNS.len() + 2);
        assert_eq!(&cells[1..7], &["NA", "NA", "NA", "NA", "NA", "NA"]);
        assert_eq!(cells[7], "NA");
        assert_eq!(cells[8], "12");
    }

    #[test]
    fn numbers_format_without_trailing_zero() {
        let mut record = ListingRecord::empty("u");
        record.rent = Some(2150.0);
        record.bathrooms = Some(1.5);
        record.sqft = Some(1000.0);
        let row = OutputRow {
            index: 0,
            passthrough: vec![],
            record,
            commutes: vec![],
        };
        let cells = row.cells();
        assert_eq!(cells[1], "2150");
        assert_eq!(cells[3], "1.5");
        assert_eq!(cells[5], "2.15");
    }
}
