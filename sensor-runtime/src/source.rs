use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{Attribute, AttributeSet, Coordinates, EntityKind, TrackedEntity};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::SourceError;
use crate::weather::WeatherClient;

pub const MAX_PARKING_SPACES: i64 = 15;

/// Produces the current attribute values for one entity.
#[async_trait]
pub trait EntitySource: Send + Sync {
    async fn fetch(&self, entity: &TrackedEntity) -> Result<AttributeSet, SourceError>;
}

pub struct WeatherSource {
    client: WeatherClient,
}

impl WeatherSource {
    pub fn new(client: WeatherClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EntitySource for WeatherSource {
    async fn fetch(&self, entity: &TrackedEntity) -> Result<AttributeSet, SourceError> {
        let reading = self.client.current(&entity.coordinates).await?;

        Ok(AttributeSet::new()
            .with("temperature", Attribute::float(reading.temperature, "°C"))
            .with("humidity", Attribute::float(reading.humidity, "%"))
            .with("TimeInstant", Attribute::date_time(Utc::now()))
            .with("location", Attribute::geo_point(&entity.coordinates)))
    }
}

/// Synthetic parking occupancy. Never unavailable.
pub struct ParkingSource {
    rng: Mutex<StdRng>,
}

impl ParkingSource {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self {
            rng: Mutex::new(rng),
        }
    }
}

impl Default for ParkingSource {
    fn default() -> Self {
        Self::new()
    }
}

/// Draws `totalSpaces` in `[0, 15]` and `freeSpaces` in `[0, totalSpaces]`.
pub fn parking_attributes<R: Rng + ?Sized>(
    rng: &mut R,
    at: &Coordinates,
    now: DateTime<Utc>,
) -> AttributeSet {
    let total = rng.gen_range(0..=MAX_PARKING_SPACES);
    let free = rng.gen_range(0..=total);

    AttributeSet::new()
        .with("totalSpaces", Attribute::integer(total))
        .with("freeSpaces", Attribute::integer(free))
        .with("location", Attribute::geo_point(at))
        .with("timestamp", Attribute::date_time(now))
}

#[async_trait]
impl EntitySource for ParkingSource {
    async fn fetch(&self, entity: &TrackedEntity) -> Result<AttributeSet, SourceError> {
        // a poisoned rng is still a valid rng
        let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
        Ok(parking_attributes(&mut *rng, &entity.coordinates, Utc::now()))
    }
}

/// Routes each entity to the source for its kind.
pub struct KindSources {
    weather: Box<dyn EntitySource>,
    parking: Box<dyn EntitySource>,
}

impl KindSources {
    pub fn new(weather: Box<dyn EntitySource>, parking: Box<dyn EntitySource>) -> Self {
        Self { weather, parking }
    }
}

#[async_trait]
impl EntitySource for KindSources {
    async fn fetch(&self, entity: &TrackedEntity) -> Result<AttributeSet, SourceError> {
        match entity.kind {
            EntityKind::WeatherSensor => self.weather.fetch(entity).await,
            EntityKind::ParkingSpot => self.parking.fetch(entity).await,
        }
    }
}
