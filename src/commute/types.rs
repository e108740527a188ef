use crate::error::RoutingError;
use crate::models::CommuteDuration;
use async_trait::async_trait;
use serde::Deserialize;

/// A routing service answering one origins x destinations matrix per call.
///
/// Implementations return one row per origin and one element per
/// destination, in request order. Per-pair failures are reported as
/// [`CommuteDuration::Unavailable`]; whole-call failures as [`RoutingError`].
/// Callers pass locations already free of the `|` separator.
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    async fn matrix(
        &self,
        origins: &[String],
        destinations: &[String],
    ) -> Result<Vec<Vec<CommuteDuration>>, RoutingError>;
}

/// Distance Matrix API response body
#[derive(Debug, Deserialize)]
pub struct MatrixResponse {
    pub status: String,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub rows: Vec<MatrixRow>,
}

#[derive(Debug, Deserialize)]
pub struct MatrixRow {
    #[serde(default)]
    pub elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
pub struct MatrixElement {
    pub status: String,
    #[serde(default)]
    pub duration: Option<TextValue>,
    #[serde(default)]
    pub duration_in_traffic: Option<TextValue>,
}

/// `{ "text": "15 mins", "value": 900 }` where value is in seconds
#[derive(Debug, Deserialize)]
pub struct TextValue {
    pub value: f64,
    #[serde(default)]
    pub text: Option<String>,
}

impl MatrixElement {
    /// Whole minutes, preferring the traffic-aware duration when present
    pub fn to_duration(&self) -> CommuteDuration {
        if self.status != "OK" {
            return CommuteDuration::Unavailable;
        }
        match self.duration_in_traffic.as_ref().or(self.duration.as_ref()) {
            Some(tv) if tv.value.is_finite() && tv.value >= 0.0 => {
                CommuteDuration::Minutes((tv.value / 60.0).round() as u32)
            }
            _ => CommuteDuration::Unavailable,
        }
    }
}
