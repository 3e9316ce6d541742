//! Météo-France rain forecast client

use super::send_checked;
use crate::error::FetchError;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};
use url::Url;

/// Public Météo-France site
pub const DEFAULT_BASE_URL: &str = "http://www.meteofrance.com";

const RAIN_PATH: [&str; 3] = ["mf3-rpc-portlet", "rest", "pluie"];

/// One five-minute slot of the forecast dial
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RainSlot {
    #[serde(default)]
    pub niveau_pluie: Option<i64>,
    #[serde(default)]
    pub niveau_pluie_text: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct KnownFields {
    id_lieu: Option<String>,
    echeance: Option<String>,
    last_update: Option<String>,
    is_available: Option<bool>,
    has_data: Option<bool>,
    niveau_pluie_text: Vec<String>,
    data_cadran: Vec<RainSlot>,
}

/// Rain forecast payload.
///
/// The payload must be a JSON object. Known fields are exposed typed; the
/// full first-level object is kept as received.
#[derive(Debug, Clone, PartialEq)]
pub struct RainForecast {
    pub location_id: Option<String>,
    /// Forecast reference time, `YYYYMMDDhhmm`
    pub echeance: Option<String>,
    pub last_update: Option<String>,
    pub is_available: Option<bool>,
    pub has_data: Option<bool>,
    /// Human readable summary lines
    pub summary: Vec<String>,
    pub slots: Vec<RainSlot>,
    payload: Map<String, Value>,
}

impl RainForecast {
    pub fn from_payload(payload: Value) -> Result<Self, FetchError> {
        let Value::Object(payload) = payload else {
            return Err(FetchError::malformed(format!(
                "expected a JSON object, got {}",
                json_kind(&payload)
            )));
        };

        let known: KnownFields = serde_json::from_value(Value::Object(payload.clone()))?;
        Ok(Self {
            location_id: known.id_lieu,
            echeance: known.echeance,
            last_update: known.last_update,
            is_available: known.is_available,
            has_data: known.has_data,
            summary: known.niveau_pluie_text,
            slots: known.data_cadran,
            payload,
        })
    }

    /// First-level object as received
    pub fn into_payload(self) -> Map<String, Value> {
        self.payload
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Client for the rain forecast endpoint
#[derive(Debug, Clone)]
pub struct MeteoFranceClient {
    client: Client,
    base_url: Url,
}

impl MeteoFranceClient {
    pub fn new(client: Client, base_url: Url) -> Self {
        Self { client, base_url }
    }

    /// `{base}/mf3-rpc-portlet/rest/pluie/{location_id}/`
    pub fn forecast_url(&self, location_id: &str) -> Result<Url, FetchError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| FetchError::connection(format!("cannot-be-a-base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(RAIN_PATH)
            .push(location_id)
            .push("");
        Ok(url)
    }

    /// Fetch and parse the forecast for one location
    pub async fn fetch_forecast(&self, location_id: &str) -> Result<RainForecast, FetchError> {
        let url = self.forecast_url(location_id)?;
        info!("Meteo France URL {url}");

        let response = send_checked(self.client.get(url)).await?;
        let body = response.text().await?;
        let payload: Value = serde_json::from_str(&body)?;
        let forecast = RainForecast::from_payload(payload)?;

        debug!(
            location_id = location_id,
            keys = forecast.payload.len(),
            slots = forecast.slots.len(),
            "Rain forecast received"
        );
        Ok(forecast)
    }
}
