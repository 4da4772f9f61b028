//! Core data models for the delay predictor

use serde::{de, Deserialize, Deserializer, Serialize};

/// A single flight to score.
///
/// Field aliases accept the Portuguese field names of the legacy payload.
/// Categorical fields take any JSON scalar; numbers and booleans are
/// stringified, so they reach the encoder as unseen categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightQuery {
    #[serde(alias = "companhia", deserialize_with = "scalar_as_string")]
    pub airline: String,
    #[serde(alias = "origem", deserialize_with = "scalar_as_string")]
    pub origin: String,
    #[serde(alias = "destino", deserialize_with = "scalar_as_string")]
    pub destination: String,
    /// ISO-8601 date-time, parsed per request
    #[serde(alias = "data_partida")]
    pub scheduled_departure: String,
}

impl FlightQuery {
    pub fn new(
        airline: impl Into<String>,
        origin: impl Into<String>,
        destination: impl Into<String>,
        scheduled_departure: impl Into<String>,
    ) -> Self {
        Self {
            airline: airline.into(),
            origin: origin.into(),
            destination: destination.into(),
            scheduled_departure: scheduled_departure.into(),
        }
    }
}

fn scalar_as_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(text) => Ok(text),
        serde_json::Value::Number(number) => Ok(number.to_string()),
        serde_json::Value::Bool(flag) => Ok(flag.to_string()),
        other => Err(de::Error::invalid_type(
            de::Unexpected::Other(json_kind(&other)),
            &"a string, number or boolean",
        )),
    }
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
        _ => "scalar",
    }
}

/// Outcome of scoring one flight
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub is_likely_late: bool,
    /// Late-class probability rounded to 4 decimal places
    pub probability: f64,
}

/// One raw historical flight as handed to the training pipeline.
///
/// Every field is optional: the pipeline decides which rows are usable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlightRecord {
    pub airline: Option<String>,
    pub origin: Option<String>,
    pub destination: Option<String>,
    pub status: Option<String>,
    pub scheduled_departure: Option<String>,
    pub actual_departure: Option<String>,
}

/// Categorical inputs of the feature schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CategoryField {
    Airline,
    Origin,
    Destination,
}

impl CategoryField {
    pub const ALL: [CategoryField; 3] = [
        CategoryField::Airline,
        CategoryField::Origin,
        CategoryField::Destination,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CategoryField::Airline => "airline",
            CategoryField::Origin => "origin",
            CategoryField::Destination => "destination",
        }
    }
}

impl std::fmt::Display for CategoryField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
