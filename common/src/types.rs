use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    WeatherSensor,
    ParkingSpot,
}

impl EntityKind {
    /// Entity type tag used by the context store.
    pub fn remote_type(&self) -> &'static str {
        match self {
            EntityKind::WeatherSensor => "WeatherObserved",
            EntityKind::ParkingSpot => "ParkingSpot",
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinates {
    /// `"<lat>, <lon>"`, the encoding expected for `geo:point` values.
    pub fn geo_point(&self) -> String {
        format!("{}, {}", self.lat, self.lon)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TrackedEntity {
    pub id: String,
    pub name: String,
    pub kind: EntityKind,
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrType {
    Integer,
    Float,
    DateTime,
    #[serde(rename = "geo:point")]
    GeoPoint,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Attribute {
    pub value: serde_json::Value,
    #[serde(rename = "type")]
    pub attr_type: AttrType,
    #[serde(skip)]
    pub unit: Option<&'static str>,
}

impl Attribute {
    pub fn integer(value: i64) -> Self {
        Self {
            value: value.into(),
            attr_type: AttrType::Integer,
            unit: None,
        }
    }

    pub fn float(value: f64, unit: &'static str) -> Self {
        Self {
            value: value.into(),
            attr_type: AttrType::Float,
            unit: Some(unit),
        }
    }

    pub fn date_time(at: DateTime<Utc>) -> Self {
        Self {
            value: utc_timestamp(at).into(),
            attr_type: AttrType::DateTime,
            unit: None,
        }
    }

    pub fn geo_point(coordinates: &Coordinates) -> Self {
        Self {
            value: coordinates.geo_point().into(),
            attr_type: AttrType::GeoPoint,
            unit: None,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.value, self.unit) {
            (serde_json::Value::String(s), unit) => write!(f, "{}{}", s, unit.unwrap_or("")),
            (v, unit) => write!(f, "{}{}", v, unit.unwrap_or("")),
        }
    }
}

/// Attribute name -> attribute, serialized as the flat NGSI attribute map.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct AttributeSet(BTreeMap<String, Attribute>);

impl AttributeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, attr: Attribute) -> Self {
        self.insert(name, attr);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, attr: Attribute) {
        self.0.insert(name.into(), attr);
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.0.get(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Attribute)> {
        self.0.iter()
    }
}

/// Short `name=value` rendering for log lines.
impl fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (name, attr) in self.iter() {
            if attr.attr_type == AttrType::GeoPoint {
                continue;
            }
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}={}", name, attr)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    Transport(String),
    Rejected { status: u16, body: String },
    Internal(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Transport(msg) => write!(f, "transport error: {}", msg),
            FailureReason::Rejected { status, body } if body.is_empty() => {
                write!(f, "rejected with status {}", status)
            }
            FailureReason::Rejected { status, body } => {
                write!(f, "rejected with status {}: {}", status, body)
            }
            FailureReason::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
    Failed(FailureReason),
}

impl UpsertOutcome {
    pub fn is_success(&self) -> bool {
        !matches!(self, UpsertOutcome::Failed(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub created: usize,
    pub updated: usize,
    /// Entities whose source was unavailable; no remote call was made.
    pub skipped: usize,
    /// Reconciler failures only; `skipped` entities are not counted here.
    /// Both reduce `succeeded`.
    pub failed: usize,
    pub elapsed: Duration,
}

impl CycleReport {
    pub fn record(&mut self, outcome: &UpsertOutcome) {
        self.attempted += 1;
        match outcome {
            UpsertOutcome::Created => {
                self.created += 1;
                self.succeeded += 1;
            }
            UpsertOutcome::Updated => {
                self.updated += 1;
                self.succeeded += 1;
            }
            UpsertOutcome::Failed(_) => self.failed += 1,
        }
    }

    pub fn record_skipped(&mut self) {
        self.attempted += 1;
        self.skipped += 1;
    }
}

/// ISO-8601 UTC with a literal `Z`, e.g. `2025-06-01T12:00:00.123456Z`.
pub fn utc_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
