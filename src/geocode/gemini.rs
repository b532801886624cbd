//! Geocoding through the Gemini `generateContent` REST API.
//!
//! The model is prompted to answer with a GeoJSON Point Feature; answers are
//! normalized into [`GeocodedPoint`] or one of the [`GeocodeFailure`] kinds
//! using HTTP status codes and reqwest error kinds only.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use url::Url;

use super::{GeocodeFailure, GeocodedPoint, GeocodingGateway};
use crate::models::LonLat;

const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_REGION_HINT: &str = "Argentina (prioritize Ciudad Autónoma de Buenos Aires \
     or Provincia de Buenos Aires if the address is ambiguous but seems to belong there)";

static FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)^```(\w*)?\s*\n?(.*?)\n?\s*```$").expect("fence pattern is valid")
});

/// Settings for [`GeminiGeocoder`]
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub model: String,
    pub endpoint: String,
    pub region_hint: String,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            region_hint: DEFAULT_REGION_HINT.to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Language-model backed geocoder
pub struct GeminiGeocoder {
    client: Client,
    url: Url,
    api_key: String,
    region_hint: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct PointFeature {
    #[serde(rename = "type")]
    feature_type: String,
    geometry: PointGeometry,
    #[serde(default)]
    properties: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct PointGeometry {
    #[serde(rename = "type")]
    geometry_type: String,
    coordinates: Vec<f64>,
}

impl GeminiGeocoder {
    /// Build the geocoder; a blank key or bad endpoint fails here.
    pub fn new(config: GeminiConfig) -> Result<Self, GeocodeFailure> {
        let api_key = config.api_key.trim();
        if api_key.is_empty() {
            return Err(GeocodeFailure::NotConfigured(
                "no API key provided".to_string(),
            ));
        }

        let base = Url::parse(&config.endpoint).map_err(|e| {
            GeocodeFailure::NotConfigured(format!("invalid endpoint {}: {}", config.endpoint, e))
        })?;
        let url = base
            .join(&format!("models/{}:generateContent", config.model))
            .map_err(|e| {
                GeocodeFailure::NotConfigured(format!("invalid model {}: {}", config.model, e))
            })?;

        let client = Client::builder()
            .user_agent("GeoProtec/0.1 (address area check)")
            .timeout(config.timeout)
            .build()
            .map_err(|e| GeocodeFailure::NotConfigured(e.to_string()))?;

        info!("Geocoding via {}", url);

        Ok(Self {
            client,
            url,
            api_key: api_key.to_string(),
            region_hint: config.region_hint,
        })
    }

    fn prompt(&self, address: &str) -> String {
        format!(
            r#"Given the following address: "{address}", assume it is located in {hint}.
Return the geographic coordinates (longitude and latitude) of this address.
Your answer MUST be a valid GeoJSON Feature of type Point, with no extra explanation.

Example:
{{
  "type": "Feature",
  "geometry": {{ "type": "Point", "coordinates": [-58.3816, -34.6037] }},
  "properties": {{ "fullAddress": "{address}", "query": "{address}" }}
}}

If the address cannot be geocoded or is too ambiguous, return a Point Feature with
coordinates [0, 0] and an "error" property describing the problem:
{{
  "type": "Feature",
  "geometry": {{ "type": "Point", "coordinates": [0, 0] }},
  "properties": {{ "query": "{address}", "error": "Address not found or too ambiguous." }}
}}"#,
            address = address,
            hint = self.region_hint
        )
    }
}

impl GeocodingGateway for GeminiGeocoder {
    async fn geocode(&self, address: &str) -> Result<GeocodedPoint, GeocodeFailure> {
        info!("Geocoding address: {}", address);

        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": self.prompt(address) }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": 0.1
            }
        });

        let response = self
            .client
            .post(self.url.clone())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                warn!("Geocoding request failed: {}", e);
                transport_failure(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ApiErrorBody>(&text)
                .map(|b| b.error.message)
                .unwrap_or(text);
            warn!("Geocoding service returned {}: {}", status, detail);
            return Err(status_failure(status, &detail));
        }

        let data: GenerateResponse = response.json().await.map_err(|e| {
            GeocodeFailure::AmbiguousOrInvalidResponse(format!("unreadable response: {}", e))
        })?;

        let text = data
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .find_map(|p| p.text)
            .ok_or_else(|| {
                GeocodeFailure::AmbiguousOrInvalidResponse("response had no text".to_string())
            })?;

        let result = parse_model_answer(&text);
        match &result {
            Ok(hit) => debug!("Geocoded '{}' to {}", address, hit.point),
            Err(e) => warn!("Geocoding '{}' failed: {}", address, e),
        }
        result
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

fn transport_failure(err: &reqwest::Error) -> GeocodeFailure {
    if err.is_builder() {
        GeocodeFailure::NotConfigured(err.to_string())
    } else {
        GeocodeFailure::Network(err.to_string())
    }
}

fn status_failure(status: StatusCode, detail: &str) -> GeocodeFailure {
    match status {
        StatusCode::BAD_REQUEST
        | StatusCode::UNAUTHORIZED
        | StatusCode::FORBIDDEN
        | StatusCode::NOT_FOUND
        | StatusCode::TOO_MANY_REQUESTS => {
            GeocodeFailure::ServiceUnavailable(format!("{}: {}", status, detail))
        }
        s if s.is_server_error() => {
            GeocodeFailure::ServiceUnavailable(format!("{}: {}", status, detail))
        }
        _ => GeocodeFailure::AmbiguousOrInvalidResponse(format!("{}: {}", status, detail)),
    }
}

/// Strip an optional Markdown fence around the model's JSON.
fn strip_fence(text: &str) -> &str {
    let trimmed = text.trim();
    FENCE
        .captures(trimmed)
        .and_then(|c| c.get(2))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(trimmed)
}

/// Turn the model's text answer into a point or a failure.
fn parse_model_answer(text: &str) -> Result<GeocodedPoint, GeocodeFailure> {
    let feature: PointFeature = serde_json::from_str(strip_fence(text)).map_err(|e| {
        GeocodeFailure::AmbiguousOrInvalidResponse(format!("answer is not a Point Feature: {}", e))
    })?;

    if feature.feature_type != "Feature" || feature.geometry.geometry_type != "Point" {
        return Err(GeocodeFailure::AmbiguousOrInvalidResponse(format!(
            "expected a Point Feature, got {} / {}",
            feature.feature_type, feature.geometry.geometry_type
        )));
    }

    let properties = feature.properties.unwrap_or_default();
    if let Some(error) = properties.get("error").filter(|e| !e.is_null()) {
        let reason = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Err(GeocodeFailure::NotFound(reason));
    }

    let point = match feature.geometry.coordinates.as_slice() {
        [lon, lat] => LonLat::new(*lon, *lat),
        other => {
            return Err(GeocodeFailure::AmbiguousOrInvalidResponse(format!(
                "expected 2 coordinates, got {}",
                other.len()
            )))
        }
    };

    if !point.in_range() {
        return Err(GeocodeFailure::AmbiguousOrInvalidResponse(format!(
            "coordinate {} is out of range",
            point
        )));
    }

    Ok(GeocodedPoint {
        point,
        full_address: properties
            .get("fullAddress")
            .and_then(Value::as_str)
            .map(str::to_string),
    })
}
