//! Ridership records as they move through the comparison pipeline.

use serde::{Deserialize, Deserializer, Serialize, de};

/// One ridership observation, straight from the static dataset.
///
/// Several records may share an entity and a calendar month (the upstream
/// datasets are published at daily granularity); they are summed during
/// aggregation, never overwritten.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBoardingRecord {
    #[serde(alias = "route", alias = "station_id")]
    pub entity_id: String,
    pub date: String,
    #[serde(deserialize_with = "loose_u64")]
    pub rides: u64,
}

/// Static descriptive fields for a single route or station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMetadata {
    #[serde(alias = "route", alias = "station_id")]
    pub entity_id: String,
    #[serde(alias = "routename", alias = "stationname", alias = "station_name")]
    pub name: String,
    #[serde(alias = "lat", deserialize_with = "loose_f64")]
    pub latitude: f64,
    #[serde(alias = "lon", alias = "lng", deserialize_with = "loose_f64")]
    pub longitude: f64,
}

/// A raw record joined with its entity's metadata.
///
/// `name` is the mode-specific label (route number and name for buses);
/// `entity_name` is the metadata name as published. Metadata fields are
/// `None` when the entity is missing from the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Boarding {
    pub entity_id: String,
    pub name: Option<String>,
    pub entity_name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub date: String,
    pub rides: u64,
}

impl Boarding {
    /// Builds a boarding with no metadata attached.
    pub fn unassigned(record: &RawBoardingRecord) -> Self {
        Boarding {
            entity_id: record.entity_id.clone(),
            name: None,
            entity_name: None,
            latitude: None,
            longitude: None,
            date: record.date.clone(),
            rides: record.rides,
        }
    }

    pub fn with_metadata(mut self, meta: &EntityMetadata, display_name: String) -> Self {
        self.name = Some(display_name);
        self.entity_name = Some(meta.name.clone());
        self.latitude = Some(meta.latitude);
        self.longitude = Some(meta.longitude);
        self
    }

    /// Coordinates when both halves are known.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

// Open-data exports disagree on whether counts and coordinates are JSON
// numbers or strings, so both are accepted. Entity ids are never reparsed.
#[derive(Deserialize)]
#[serde(untagged)]
enum Loose {
    Int(u64),
    Float(f64),
    Text(String),
}

fn loose_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    match Loose::deserialize(deserializer)? {
        Loose::Int(n) => Ok(n),
        Loose::Float(f) if f >= 0.0 && f.fract() == 0.0 => Ok(f as u64),
        Loose::Float(f) => Err(de::Error::custom(format!("invalid ride count {f}"))),
        Loose::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid ride count '{s}'"))),
    }
}

fn loose_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    match Loose::deserialize(deserializer)? {
        Loose::Int(n) => Ok(n as f64),
        Loose::Float(f) => Ok(f),
        Loose::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| de::Error::custom(format!("invalid coordinate '{s}'"))),
    }
}
