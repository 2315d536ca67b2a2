use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use common::types::{Coordinates, EntityKind, TrackedEntity};
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_ORION_URL: &str = "http://localhost:1026/v2";
pub const DEFAULT_NOTIFY_URL: &str = "http://quantumleap:8668/v2/notify";
pub const DEFAULT_WEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub orion_url: String,
    pub notify_url: String,
    pub weather_url: String,
    pub weather_api_key: String,
    pub interval: Duration,
    pub pacing: Duration,
    pub request_timeout: Duration,
    pub entities: Vec<TrackedEntity>,
}

impl RuntimeConfig {
    pub fn from_env(entities_file: Option<&Path>) -> Result<Self> {
        let entities = match entities_file {
            Some(path) => load_entities(path)?,
            None => default_entities(),
        };
        Ok(Self::from_lookup(|key| std::env::var(key).ok(), entities)?)
    }

    pub fn from_lookup<F>(lookup: F, entities: Vec<TrackedEntity>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = |name: &'static str, default: &str| -> Result<String, ConfigError> {
            let raw = lookup(name).unwrap_or_else(|| default.to_string());
            validate_url(name, &raw)?;
            Ok(raw.trim_end_matches('/').to_string())
        };
        let number = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match lookup(name) {
                None => Ok(default),
                Some(raw) => raw.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
                    name,
                    reason: format!("'{}': {}", raw, e),
                }),
            }
        };

        let weather_api_key = lookup("WEATHER_API_KEY")
            .filter(|k| !k.trim().is_empty())
            .ok_or(ConfigError::Missing("WEATHER_API_KEY"))?;

        let positive = |name: &'static str, default: u64| -> Result<u64, ConfigError> {
            match number(name, default)? {
                0 => Err(ConfigError::Invalid {
                    name,
                    reason: "must be greater than zero".into(),
                }),
                n => Ok(n),
            }
        };

        let interval = positive("UPDATE_INTERVAL", 300)?;
        let request_timeout = positive("REQUEST_TIMEOUT", 10)?;

        check_unique_ids(&entities)?;

        Ok(Self {
            orion_url: url("ORION_API_URL", DEFAULT_ORION_URL)?,
            notify_url: url("QUANTUMLEAP_NOTIFY_URL", DEFAULT_NOTIFY_URL)?,
            weather_url: url("WEATHER_API_URL", DEFAULT_WEATHER_URL)?,
            weather_api_key,
            interval: Duration::from_secs(interval),
            pacing: Duration::from_millis(number("PACING_MS", 500)?),
            request_timeout: Duration::from_secs(request_timeout),
            entities,
        })
    }
}

fn validate_url(name: &'static str, raw: &str) -> Result<(), ConfigError> {
    let parsed = Url::parse(raw).map_err(|e| ConfigError::Invalid {
        name,
        reason: format!("'{}': {}", raw, e),
    })?;
    if parsed.scheme() != "http" && parsed.scheme() != "https" {
        return Err(ConfigError::Invalid {
            name,
            reason: "must start with http:// or https://".into(),
        });
    }
    Ok(())
}

fn check_unique_ids(entities: &[TrackedEntity]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for entity in entities {
        if !seen.insert(entity.id.as_str()) {
            return Err(ConfigError::DuplicateId(entity.id.clone()));
        }
    }
    Ok(())
}

/// Reads a JSON array of `{id, name, kind, lat, lon}`.
pub fn load_entities(path: &Path) -> Result<Vec<TrackedEntity>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("reading entity file {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing entity file {}", path.display()))
}

fn entity(id: &str, name: &str, kind: EntityKind, lat: f64, lon: f64) -> TrackedEntity {
    TrackedEntity {
        id: id.into(),
        name: name.into(),
        kind,
        coordinates: Coordinates { lat, lon },
    }
}

/// Campus weather stations followed by the parking spots.
pub fn default_entities() -> Vec<TrackedEntity> {
    use EntityKind::{ParkingSpot, WeatherSensor};

    vec![
        entity("Sensor:Weather:FacultyCS", "Faculty of Computer Science", WeatherSensor, 52.13878, 11.64533),
        entity("Sensor:Weather:ScienceHub", "Science Harbor", WeatherSensor, 52.14175, 11.65640),
        entity("Sensor:Weather:UniMensa", "University Mensa", WeatherSensor, 52.13966, 11.64761),
        entity("Sensor:Weather:Library", "University Library", WeatherSensor, 52.13888, 11.64707),
        entity("Sensor:Weather:WelcomeCenter", "OVGU Welcome Center", WeatherSensor, 52.14031, 11.64039),
        entity("Sensor:Weather:NorthPark", "North Park", WeatherSensor, 52.14276, 11.64513),
        entity("Sensor:Weather:GeschwisterPark", "Geschwister-Scholl-Park", WeatherSensor, 52.14020, 11.63655),
        entity("ParkingSpot:ScienceHarbor", "Parking A - Science Harbor", ParkingSpot, 52.1412, 11.6558),
        entity("ParkingSpot:FacultyCS", "Parking B - Faculty CS", ParkingSpot, 52.13878, 11.64533),
        entity("ParkingSpot:NorthPark", "Parking C - North Park", ParkingSpot, 52.1431, 11.6457),
    ]
}
