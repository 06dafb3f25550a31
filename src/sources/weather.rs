//! Current weather for the hippodrome, from Open-Meteo.

use serde::{Deserialize, Serialize};

use crate::config;
use crate::prim::client::PrimClient;
use crate::prim::error::PrimResult;

#[derive(Debug, Clone, Deserialize)]
pub struct CurrentWeather {
    pub temperature: f64,
    pub weathercode: u32,
    pub windspeed: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherResponse {
    pub current_weather: Option<CurrentWeather>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct WeatherView {
    pub temperature: f64,
    pub windspeed: f64,
    pub description: &'static str,
}

/// WMO weather interpretation codes, reduced to the buckets the board shows.
pub fn describe(code: u32) -> &'static str {
    match code {
        0 => "Ciel dégagé",
        1 => "Plutôt dégagé",
        2 => "Partiellement nuageux",
        3 => "Couvert",
        45 | 48 => "Brouillard",
        51 | 53 | 55 => "Bruine",
        61 | 63 | 65 => "Pluie",
        80 | 81 | 82 => "Averses",
        95 | 96 | 99 => "Orages",
        _ => "Météo inconnue",
    }
}

pub async fn fetch(client: &PrimClient) -> PrimResult<WeatherResponse> {
    client.get_proxied_json(config::WEATHER_URL).await
}

pub fn view(response: &WeatherResponse) -> Option<WeatherView> {
    response.current_weather.as_ref().map(|current| WeatherView {
        temperature: current.temperature,
        windspeed: current.windspeed,
        description: describe(current.weathercode),
    })
}
