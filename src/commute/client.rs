//! Google Distance Matrix client.

use super::types::{MatrixResponse, RoutingProvider};
use crate::config::RoutingConfig;
use crate::error::RoutingError;
use crate::models::CommuteDuration;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

const MATRIX_PATH: &str = "/maps/api/distancematrix/json";

/// Distance Matrix API client.
pub struct DistanceMatrixClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    mode: String,
    departure_time: Option<i64>,
}

impl DistanceMatrixClient {
    /// Create a client from routing settings. The departure time, if any, is
    /// fixed at construction so every batch in a run uses the same one.
    pub fn from_config(config: &RoutingConfig, api_key: String) -> Result<Self, RoutingError> {
        let mut client = Self::with_base_url(&config.base_url, api_key, config.timeout())?;
        client.mode = config.mode.clone();
        client.departure_time = config.departure_time(chrono::Local::now());
        Ok(client)
    }

    /// Create a client against a custom base URL (for testing with wiremock).
    pub fn with_base_url(
        base_url: &str,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, RoutingError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            mode: "driving".to_string(),
            departure_time: None,
        })
    }
}

#[async_trait]
impl RoutingProvider for DistanceMatrixClient {
    async fn matrix(
        &self,
        origins: &[String],
        destinations: &[String],
    ) -> Result<Vec<Vec<CommuteDuration>>, RoutingError> {
        let url = format!("{}{}", self.base_url, MATRIX_PATH);
        let mut query = vec![
            ("origins", origins.join("|")),
            ("destinations", destinations.join("|")),
            ("mode", self.mode.clone()),
            ("units", "imperial".to_string()),
            ("key", self.api_key.clone()),
        ];
        if let Some(ts) = self.departure_time {
            query.push(("departure_time", ts.to_string()));
        }

        debug!(
            "Distance matrix request: {} origins x {} destinations",
            origins.len(),
            destinations.len()
        );

        let response = self.client.get(&url).query(&query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RoutingError::Status(status));
        }

        let body = response.text().await?;
        let parsed: MatrixResponse = serde_json::from_str(&body).map_err(|e| {
            let snippet: String = body.chars().take(200).collect();
            RoutingError::Parse(format!("{} | body: {}", e, snippet))
        })?;

        if parsed.status != "OK" {
            return Err(RoutingError::Provider {
                status: parsed.status,
                message: parsed.error_message.unwrap_or_default(),
            });
        }

        Ok(parsed
            .rows
            .iter()
            .map(|row| row.elements.iter().map(|e| e.to_duration()).collect())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DistanceMatrixClient {
        DistanceMatrixClient::with_base_url(
            &server.uri(),
            "test-key".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn success_returns_minutes_matrix() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(MATRIX_PATH))
            .and(query_param("origins", "123 Main St|9 Oak Ct"))
            .and(query_param("destinations", "Office X"))
            .and(query_param("mode", "driving"))
            .and(query_param("key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "origin_addresses": ["123 Main St", "9 Oak Ct"],
                "destination_addresses": ["Office X"],
                "rows": [
                    { "elements": [{ "status": "OK", "duration": { "value": 900, "text": "15 mins" } }] },
                    { "elements": [{ "status": "NOT_FOUND" }] }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let matrix = client(&server)
            .matrix(&strings(&["123 Main St", "9 Oak Ct"]), &strings(&["Office X"]))
            .await
            .unwrap();

        assert_eq!(
            matrix,
            vec![
                vec![CommuteDuration::Minutes(15)],
                vec![CommuteDuration::Unavailable]
            ]
        );
    }

    #[tokio::test]
    async fn departure_time_is_sent_when_configured() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(MATRIX_PATH))
            .and(query_param("departure_time", "1700000000"))
            .and(query_param("mode", "transit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "rows": [{ "elements": [{ "status": "OK", "duration": { "value": 60 } }] }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut client = client(&server);
        client.mode = "transit".to_string();
        client.departure_time = Some(1_700_000_000);
        let matrix = client
            .matrix(&strings(&["A"]), &strings(&["B"]))
            .await
            .unwrap();
        assert_eq!(matrix, vec![vec![CommuteDuration::Minutes(1)]]);
    }

    #[tokio::test]
    async fn provider_status_is_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "REQUEST_DENIED",
                "error_message": "The provided API key is invalid.",
                "rows": []
            })))
            .mount(&server)
            .await;

        let err = client(&server)
            .matrix(&strings(&["A"]), &strings(&["B"]))
            .await
            .unwrap_err();
        match err {
            RoutingError::Provider { status, message } => {
                assert_eq!(status, "REQUEST_DENIED");
                assert!(message.contains("invalid"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn http_error_is_status_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client(&server)
            .matrix(&strings(&["A"]), &strings(&["B"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Status(s) if s.as_u16() == 500));
    }

    #[tokio::test]
    async fn garbage_body_is_parse_error() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client(&server)
            .matrix(&strings(&["A"]), &strings(&["B"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Parse(_)));
    }

    #[tokio::test]
    async fn slow_provider_times_out() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "status": "OK", "rows": [] }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let client = DistanceMatrixClient::with_base_url(
            &server.uri(),
            "k".to_string(),
            Duration::from_millis(100),
        )
        .unwrap();
        let err = client
            .matrix(&strings(&["A"]), &strings(&["B"]))
            .await
            .unwrap_err();
        assert!(matches!(err, RoutingError::Timeout));
    }
}
