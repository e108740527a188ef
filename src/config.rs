//! Run configuration: request headers, cache location, destinations, and
//! routing-provider limits.
//!
//! Everything the fetcher and resolver need is passed in through [`Config`]
//! at construction time; nothing is read from globals after startup.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Days, Local, NaiveTime, TimeZone};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Deserialize;

use crate::error::ConfigError;

/// Default location of the routing API key file, relative to the working directory.
pub const DEFAULT_CREDENTIAL_PATH: &str = "GMAPS_API_KEY";

/// Environment variable consulted when the key file is absent.
pub const CREDENTIAL_ENV: &str = "GMAPS_API_KEY";

/// Browser-like headers the listing source expects. Entries in
/// [`Config::headers`] override these by name.
pub fn default_headers() -> BTreeMap<String, String> {
    [
        (
            "sec-ch-ua",
            r#""Chromium";v="124", "Google Chrome";v="124", "Not-A.Brand";v="99""#,
        ),
        (
            "Referer",
            "https://www.zillow.com/homedetails/795-Monroe-Dr-NE-Atlanta-GA-30308/35880144_zpid/",
        ),
        ("DNT", "1"),
        ("sec-ch-ua-mobile", "?0"),
        (
            "User-Agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
        ),
        ("sec-ch-ua-platform", r#""Windows""#),
        (
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        ),
        ("Accept-Language", "en-US,en;q=0.9"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

/// Top-level run configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding cached listing pages; no caching when unset
    pub cache_dir: Option<PathBuf>,
    /// Commute destinations, one output column each
    pub destinations: Vec<String>,
    /// Header overrides merged on top of [`default_headers`]
    pub headers: BTreeMap<String, String>,
    pub fetch_timeout_secs: u64,
    /// Pause after every network fetch (cache hits are not delayed)
    pub fetch_delay_secs: u64,
    /// Number of listing pages fetched in parallel
    pub concurrency: usize,
    /// Name of the input column holding listing URLs
    pub url_column: String,
    pub credential_path: PathBuf,
    pub routing: RoutingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_dir: None,
            destinations: Vec::new(),
            headers: BTreeMap::new(),
            fetch_timeout_secs: 30,
            fetch_delay_secs: 10,
            concurrency: 1,
            url_column: "url".to_string(),
            credential_path: PathBuf::from(DEFAULT_CREDENTIAL_PATH),
            routing: RoutingConfig::default(),
        }
    }
}

/// Routing provider settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    pub base_url: String,
    /// Travel mode understood by the provider (driving, transit, walking, bicycling)
    pub mode: String,
    /// Hour of day (local time, tomorrow) used as departure time
    pub departure_hour: Option<u32>,
    /// Maximum origins x destinations per request
    pub max_elements: usize,
    pub max_origins: usize,
    pub max_destinations: usize,
    pub timeout_secs: u64,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://maps.googleapis.com".to_string(),
            mode: "driving".to_string(),
            departure_hour: None,
            max_elements: 100,
            max_origins: 25,
            max_destinations: 25,
            timeout_secs: 30,
        }
    }
}

impl RoutingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Unix timestamp for tomorrow at `departure_hour`, relative to `now`.
    ///
    /// Always tomorrow so the provider never sees a departure in the past.
    pub fn departure_time(&self, now: DateTime<Local>) -> Option<i64> {
        let hour = self.departure_hour?;
        let time = NaiveTime::from_hms_opt(hour, 0, 0)?;
        let tomorrow = now.date_naive().checked_add_days(Days::new(1))?;
        Local
            .from_local_datetime(&tomorrow.and_time(time))
            .earliest()
            .map(|dt| dt.timestamp())
    }
}

impl Config {
    /// Load a TOML config file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.destinations.iter().all(|d| d.trim().is_empty()) {
            return Err(ConfigError::NoDestinations);
        }
        if self.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be at least 1".into()));
        }
        let r = &self.routing;
        if r.max_elements == 0 || r.max_origins == 0 || r.max_destinations == 0 {
            return Err(ConfigError::Invalid("routing batch limits must be positive".into()));
        }
        if matches!(r.departure_hour, Some(h) if h > 23) {
            return Err(ConfigError::Invalid("departure_hour must be between 0 and 23".into()));
        }
        self.header_map()?;
        Ok(())
    }

    /// Default headers with user overrides applied. Header names compare
    /// case-insensitively.
    pub fn effective_headers(&self) -> BTreeMap<String, String> {
        let mut merged = default_headers();
        for (name, value) in &self.headers {
            merged.retain(|k, _| !k.eq_ignore_ascii_case(name));
            merged.insert(name.clone(), value.clone());
        }
        merged
    }

    pub fn header_map(&self) -> Result<HeaderMap, ConfigError> {
        let mut map = HeaderMap::new();
        for (name, value) in self.effective_headers() {
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|e| ConfigError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            let header_value =
                HeaderValue::from_str(&value).map_err(|e| ConfigError::InvalidHeader {
                    name: name.clone(),
                    reason: e.to_string(),
                })?;
            map.insert(header_name, header_value);
        }
        Ok(map)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn fetch_delay(&self) -> Duration {
        Duration::from_secs(self.fetch_delay_secs)
    }

    /// Destinations with surrounding whitespace removed and blanks dropped
    pub fn destinations(&self) -> Vec<String> {
        self.destinations
            .iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect()
    }
}

/// Read the routing API key from `path`, falling back to the `GMAPS_API_KEY`
/// environment variable when the file does not exist.
pub fn load_api_key(path: &Path) -> Result<String, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(contents) => {
            let key = contents.trim();
            if key.is_empty() {
                return Err(ConfigError::EmptyCredential {
                    path: path.to_path_buf(),
                });
            }
            Ok(key.to_string())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => std::env::var(CREDENTIAL_ENV)
            .ok()
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ConfigError::MissingCredential {
                path: path.to_path_buf(),
            }),
        Err(source) => Err(ConfigError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn config_with_destination() -> Config {
        Config {
            destinations: vec!["Office X".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn empty_destinations_rejected() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(ConfigError::NoDestinations)));

        let config = Config {
            destinations: vec!["  ".to_string()],
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::NoDestinations)));

        assert!(config_with_destination().validate().is_ok());
    }

    #[test]
    fn header_overrides_replace_defaults_case_insensitively() {
        let mut config = config_with_destination();
        config
            .headers
            .insert("user-agent".to_string(), "test-agent".to_string());
        let headers = config.effective_headers();
        assert_eq!(headers.get("user-agent").map(String::as_str), Some("test-agent"));
        assert!(!headers.contains_key("User-Agent"));

        let map = config.header_map().unwrap();
        assert_eq!(map.get("user-agent").unwrap(), "test-agent");
        assert_eq!(map.get("dnt").unwrap(), "1");
    }

    #[test]
    fn invalid_header_rejected() {
        let mut config = config_with_destination();
        config
            .headers
            .insert("bad header".to_string(), "x".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidHeader { .. })
        ));
    }

    #[test]
    fn parses_toml_with_defaults() {
        let config: Config = toml::from_str(
            r#"
            destinations = ["Office X", "Gym"]
            concurrency = 4

            [headers]
            Referer = "https://example.com/"

            [routing]
            mode = "transit"
            max_elements = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.destinations.len(), 2);
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.routing.mode, "transit");
        assert_eq!(config.routing.max_elements, 10);
        assert_eq!(config.routing.max_origins, 25);
        assert_eq!(config.url_column, "url");
        assert_eq!(config.fetch_timeout_secs, 30);
    }

    #[test]
    fn departure_time_is_tomorrow_at_hour() {
        let routing = RoutingConfig {
            departure_hour: Some(8),
            ..Default::default()
        };
        let now = Local::now();
        let ts = routing.departure_time(now).unwrap();
        let departure = Local.timestamp_opt(ts, 0).unwrap();
        assert_eq!(departure.hour(), 8);
        assert!(departure > now);

        assert_eq!(RoutingConfig::default().departure_time(now), None);
    }

    #[test]
    fn api_key_read_from_file() {
        let dir = std::env::temp_dir().join(format!("listing-commute-key-{}", rand::random::<u64>()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("GMAPS_API_KEY");

        std::fs::write(&path, "  secret-key\n").unwrap();
        assert_eq!(load_api_key(&path).unwrap(), "secret-key");

        std::fs::write(&path, "\n").unwrap();
        assert!(matches!(
            load_api_key(&path),
            Err(ConfigError::EmptyCredential { .. })
        ));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    // The only test touching GMAPS_API_KEY; all env cases stay in here.
    #[test]
    fn api_key_falls_back_to_environment() {
        let path = std::env::temp_dir()
            .join(format!("listing-commute-nokey-{}", rand::random::<u64>()))
            .join("GMAPS_API_KEY");
        let saved = std::env::var(CREDENTIAL_ENV).ok();

        std::env::remove_var(CREDENTIAL_ENV);
        assert!(matches!(
            load_api_key(&path),
            Err(ConfigError::MissingCredential { .. })
        ));

        std::env::set_var(CREDENTIAL_ENV, " env-key ");
        assert_eq!(load_api_key(&path).unwrap(), "env-key");

        std::env::set_var(CREDENTIAL_ENV, "   ");
        assert!(matches!(
            load_api_key(&path),
            Err(ConfigError::MissingCredential { .. })
        ));

        match saved {
            Some(value) => std::env::set_var(CREDENTIAL_ENV, value),
            None => std::env::remove_var(CREDENTIAL_ENV),
        }
    }
}
