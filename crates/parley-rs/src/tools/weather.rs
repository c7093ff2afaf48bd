//! Weather lookup tools backed by the Open-Meteo geocoding and forecast APIs.
//!
//! Lookups go through [`WeatherClient::resolve`], which never fails past its
//! boundary: an unresolvable location or an upstream outage produces a
//! sentinel [`WeatherReport`] rather than an error, so callers (the relay,
//! the tool server) always get an answer to hand back.

use crate::tools::core::{Tool, ToolFuture, parse_tool_args};
use crate::{ToolDefinition, json_schema_for};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub const GEOCODING_URL: &str = "https://geocoding-api.open-meteo.com/v1/search";
pub const FORECAST_URL: &str = "https://api.open-meteo.com/v1/forecast";

// ── WMO code mapping ───────────────────────────────────────────────

/// Human-readable condition for a WMO weather code. Unmapped codes return
/// `"Unknown"`.
pub fn condition_for_code(code: u32) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 => "Light freezing drizzle",
        57 => "Dense freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 => "Light freezing rain",
        67 => "Heavy freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 => "Slight snow showers",
        86 => "Heavy snow showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        _ => "Unknown",
    }
}

/// Alert strings for a WMO weather code. Rules are additive: a single code
/// can trigger more than one alert (67 is both heavy rain and freezing
/// precipitation).
pub fn alerts_for_code(code: u32) -> Vec<String> {
    let mut alerts = Vec::new();
    if code >= 95 {
        alerts.push("Thunderstorm Warning".to_string());
    }
    if matches!(code, 65 | 67 | 82) {
        alerts.push("Heavy Rain Warning".to_string());
    }
    if matches!(code, 75 | 86) {
        alerts.push("Heavy Snow Warning".to_string());
    }
    if matches!(code, 56 | 57 | 66 | 67) {
        alerts.push("Freezing Precipitation Warning".to_string());
    }
    alerts
}

// ── WeatherReport ──────────────────────────────────────────────────

/// Current conditions plus alerts for one location.
///
/// `temperature` is a JSON number on success and a sentinel string
/// (`"Unknown"` / `"Error"`) otherwise, matching what clients expect on
/// the wire.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WeatherReport {
    pub temperature: serde_json::Value,
    pub condition: String,
    pub humidity: String,
    pub alerts: Vec<String>,
}

impl WeatherReport {
    /// Sentinel for a location with no geocoding match. Not an error: the
    /// model can tell the user the place wasn't found.
    pub fn location_not_found() -> Self {
        Self {
            temperature: json!("Unknown"),
            condition: "Location not found".to_string(),
            humidity: "Unknown".to_string(),
            alerts: vec![],
        }
    }

    /// Sentinel for an upstream failure (network, HTTP, parse).
    pub fn service_unavailable() -> Self {
        Self {
            temperature: json!("Error"),
            condition: "Service unavailable".to_string(),
            humidity: "Unknown".to_string(),
            alerts: vec!["Weather service unavailable".to_string()],
        }
    }

    /// The forecast subset (`temperature`/`conditions`/`humidity`) in the
    /// shape the tool server returns for `get-forecast`.
    pub fn forecast_json(&self) -> serde_json::Value {
        json!({
            "temperature": self.temperature,
            "conditions": self.condition,
            "humidity": self.humidity,
        })
    }
}

// ── Open-Meteo wire shapes ─────────────────────────────────────────

#[derive(Deserialize, Debug)]
struct GeoResponse {
    #[serde(default)]
    results: Option<Vec<GeoResult>>,
}

#[derive(Deserialize, Debug)]
struct GeoResult {
    latitude: f64,
    longitude: f64,
}

#[derive(Deserialize, Debug)]
struct ForecastResponse {
    #[serde(default)]
    current: Option<CurrentConditions>,
}

#[derive(Deserialize, Debug)]
struct CurrentConditions {
    #[serde(default)]
    temperature_2m: Option<f64>,
    #[serde(default)]
    relative_humidity_2m: Option<f64>,
    #[serde(default)]
    weather_code: Option<u32>,
}

// ── WeatherClient ──────────────────────────────────────────────────

/// Async HTTP client for the Open-Meteo APIs.
pub struct WeatherClient {
    client: reqwest::Client,
}

impl WeatherClient {
    pub fn new() -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent("parley-weather/0.2")
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self { client })
    }

    /// Resolve a location name to a full weather report. Infallible at this
    /// boundary: failures come back as sentinel reports.
    pub async fn resolve(&self, location: &str) -> WeatherReport {
        match self.fetch(location).await {
            Ok(report) => report,
            Err(e) => {
                warn!("weather lookup failed for '{location}': {e}");
                WeatherReport::service_unavailable()
            }
        }
    }

    async fn fetch(&self, location: &str) -> Result<WeatherReport, String> {
        debug!("geocoding '{location}'");
        let geo: GeoResponse = self
            .client
            .get(GEOCODING_URL)
            .query(&[("name", location), ("count", "1")])
            .send()
            .await
            .map_err(|e| format!("geocoding request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("geocoding HTTP error: {e}"))?
            .json()
            .await
            .map_err(|e| format!("failed to parse geocoding response: {e}"))?;

        let Some(hit) = geo.results.and_then(|r| r.into_iter().next()) else {
            debug!("no geocoding match for '{location}'");
            return Ok(WeatherReport::location_not_found());
        };

        let forecast: ForecastResponse = self
            .client
            .get(FORECAST_URL)
            .query(&[
                ("latitude", hit.latitude.to_string()),
                ("longitude", hit.longitude.to_string()),
                (
                    "current",
                    "temperature_2m,relative_humidity_2m,weather_code".to_string(),
                ),
            ])
            .send()
            .await
            .map_err(|e| format!("forecast request failed: {e}"))?
            .error_for_status()
            .map_err(|e| format!("forecast HTTP error: {e}"))?
            .json()
            .await
            .map_err(|e| format!("failed to parse forecast response: {e}"))?;

        let current = forecast
            .current
            .ok_or_else(|| "forecast response missing current conditions".to_string())?;
        let code = current.weather_code.unwrap_or(0);

        Ok(WeatherReport {
            temperature: current
                .temperature_2m
                .map_or_else(|| json!("Unknown"), |t| json!(t)),
            condition: condition_for_code(code).to_string(),
            humidity: current
                .relative_humidity_2m
                .map_or_else(|| "Unknown".to_string(), |h| format!("{h}%")),
            alerts: alerts_for_code(code),
        })
    }
}

// ── Relay-facing tools ─────────────────────────────────────────────

/// Typed input for the weather tools.
#[derive(Deserialize, JsonSchema)]
pub struct LocationArgs {
    /// City or place name, e.g. "San Francisco".
    pub location: String,
}

/// `get_forecast`: current temperature, conditions, and humidity.
pub struct ForecastTool {
    weather: Arc<WeatherClient>,
}

impl ForecastTool {
    pub fn new(weather: Arc<WeatherClient>) -> Self {
        Self { weather }
    }
}

impl Tool for ForecastTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_forecast",
            "Get the current temperature, conditions, and humidity for a location.",
            json_schema_for::<LocationArgs>(),
        )
    }

    fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_> {
        let weather = self.weather.clone();
        let input = input.clone();
        Box::pin(async move {
            let args: LocationArgs = match parse_tool_args(&input) {
                Ok(a) => a,
                Err(e) => return e,
            };
            let report = weather.resolve(&args.location).await;
            report.forecast_json().to_string()
        })
    }
}

/// `get_alerts`: active weather alerts for a location.
pub struct AlertsTool {
    weather: Arc<WeatherClient>,
}

impl AlertsTool {
    pub fn new(weather: Arc<WeatherClient>) -> Self {
        Self { weather }
    }
}

impl Tool for AlertsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(
            "get_alerts",
            "Get active weather alerts for a location.",
            json_schema_for::<LocationArgs>(),
        )
    }

    fn execute(&self, input: &serde_json::Value) -> ToolFuture<'_> {
        let weather = self.weather.clone();
        let input = input.clone();
        Box::pin(async move {
            let args: LocationArgs = match parse_tool_args(&input) {
                Ok(a) => a,
                Err(e) => return e,
            };
            let report = weather.resolve(&args.location).await;
            serde_json::to_string(&report.alerts).unwrap_or_else(|_| "[]".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Every code the mapping knows about.
    const KNOWN_CODES: [u32; 28] = [
        0, 1, 2, 3, 45, 48, 51, 53, 55, 56, 57, 61, 63, 65, 66, 67, 71, 73, 75, 77, 80, 81, 82,
        85, 86, 95, 96, 99,
    ];

    #[test]
    fn known_codes_map_to_conditions() {
        for code in KNOWN_CODES {
            assert_ne!(
                condition_for_code(code),
                "Unknown",
                "code {code} should be mapped"
            );
        }
    }

    #[test]
    fn unmapped_code_is_unknown() {
        assert_eq!(condition_for_code(999), "Unknown");
        assert_eq!(condition_for_code(42), "Unknown");
    }

    #[test]
    fn condition_spot_checks() {
        assert_eq!(condition_for_code(0), "Clear sky");
        assert_eq!(condition_for_code(45), "Fog");
        assert_eq!(condition_for_code(82), "Violent rain showers");
        assert_eq!(condition_for_code(95), "Thunderstorm");
        assert_eq!(condition_for_code(99), "Thunderstorm with heavy hail");
    }

    #[test]
    fn thunderstorm_alert_at_threshold() {
        for code in [95, 96, 99] {
            assert!(
                alerts_for_code(code).contains(&"Thunderstorm Warning".to_string()),
                "code {code}"
            );
        }
        assert!(!alerts_for_code(94).contains(&"Thunderstorm Warning".to_string()));
    }

    #[test]
    fn heavy_rain_alerts() {
        for code in [65, 67, 82] {
            assert!(
                alerts_for_code(code).contains(&"Heavy Rain Warning".to_string()),
                "code {code}"
            );
        }
        // 82 triggers only the rain rule.
        assert_eq!(alerts_for_code(82), vec!["Heavy Rain Warning".to_string()]);
    }

    #[test]
    fn heavy_snow_alerts() {
        for code in [75, 86] {
            assert!(
                alerts_for_code(code).contains(&"Heavy Snow Warning".to_string()),
                "code {code}"
            );
        }
    }

    #[test]
    fn freezing_precipitation_alerts() {
        for code in [56, 57, 66, 67] {
            assert!(
                alerts_for_code(code)
                    .contains(&"Freezing Precipitation Warning".to_string()),
                "code {code}"
            );
        }
    }

    #[test]
    fn code_67_triggers_both_rain_and_freezing() {
        let alerts = alerts_for_code(67);
        assert_eq!(
            alerts,
            vec![
                "Heavy Rain Warning".to_string(),
                "Freezing Precipitation Warning".to_string(),
            ]
        );
    }

    #[test]
    fn clear_sky_has_no_alerts() {
        assert!(alerts_for_code(0).is_empty());
        assert!(alerts_for_code(61).is_empty());
    }

    #[test]
    fn location_not_found_sentinel_shape() {
        let report = WeatherReport::location_not_found();
        assert_eq!(report.temperature, json!("Unknown"));
        assert_eq!(report.condition, "Location not found");
        assert_eq!(report.humidity, "Unknown");
        assert!(report.alerts.is_empty());
    }

    #[test]
    fn service_unavailable_sentinel_shape() {
        let report = WeatherReport::service_unavailable();
        assert_eq!(report.temperature, json!("Error"));
        assert_eq!(report.condition, "Service unavailable");
        assert_eq!(
            report.alerts,
            vec!["Weather service unavailable".to_string()]
        );
    }

    #[test]
    fn forecast_json_uses_conditions_key() {
        let report = WeatherReport {
            temperature: json!(21.4),
            condition: "Partly cloudy".to_string(),
            humidity: "65%".to_string(),
            alerts: vec![],
        };
        let forecast = report.forecast_json();
        assert_eq!(forecast["temperature"], json!(21.4));
        assert_eq!(forecast["conditions"], "Partly cloudy");
        assert_eq!(forecast["humidity"], "65%");
        assert!(forecast.get("alerts").is_none());
    }

    #[test]
    fn weather_tools_register() {
        let registry = crate::tools::core::ToolRegistry::new()
            .with_weather_tools()
            .unwrap();
        assert_eq!(registry.len(), 2);
        let names: Vec<String> = registry.definitions().iter().map(|d| d.name.clone()).collect();
        assert!(names.contains(&"get_forecast".to_string()));
        assert!(names.contains(&"get_alerts".to_string()));
    }
}
