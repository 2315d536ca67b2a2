use std::time::Duration;

use anyhow::{Context, Result};
use common::types::Coordinates;
use reqwest::Client;
use serde::Deserialize;

use crate::error::SourceError;

#[derive(Deserialize, Debug)]
struct CurrentWeather {
    main: MainReadings,
}

#[derive(Deserialize, Debug)]
struct MainReadings {
    temp: f64,
    humidity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub temperature: f64,
    pub humidity: f64,
}

/// Current-weather client (OpenWeatherMap `data/2.5/weather` shape).
#[derive(Clone)]
pub struct WeatherClient {
    url: String,
    api_key: String,
    client: Client,
}

impl WeatherClient {
    pub fn new(url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            url: url.into(),
            api_key: api_key.into(),
            client: Client::builder()
                .timeout(timeout)
                .build()
                .context("Failed to build HTTP client")?,
        })
    }

    pub async fn current(&self, at: &Coordinates) -> Result<Reading, SourceError> {
        let res = self
            .client
            .get(&self.url)
            .query(&[
                ("lat", at.lat.to_string()),
                ("lon", at.lon.to_string()),
                ("appid", self.api_key.clone()),
                ("units", "metric".to_string()),
            ])
            .send()
            .await
            .map_err(transport)?;

        if !res.status().is_success() {
            return Err(SourceError::Status(res.status().as_u16()));
        }

        let body = res
            .text()
            .await
            .map_err(transport)?;
        let parsed: CurrentWeather =
            serde_json::from_str(&body).map_err(|e| SourceError::Malformed(e.to_string()))?;

        Ok(Reading {
            temperature: parsed.main.temp,
            humidity: parsed.main.humidity,
        })
    }
}

// reqwest error text carries the request URL, which holds the api key
fn transport(err: reqwest::Error) -> SourceError {
    let timed_out = err.is_timeout();
    let err = err.without_url();
    if timed_out {
        SourceError::Transport(format!("timed out: {}", err))
    } else {
        SourceError::Transport(err.to_string())
    }
}
