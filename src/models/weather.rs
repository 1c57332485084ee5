// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OpenWeatherMap "timemachine" response and the human-readable
//! description written into activity descriptions.

use serde::Deserialize;

/// Minimum hourly precipitation (inches) worth mentioning.
const PRECIPITATION_EPSILON_IN: f64 = 0.005;
const MM_PER_INCH: f64 = 25.4;

/// Historical weather response (`/data/3.0/onecall/timemachine`).
#[derive(Debug, Clone, Deserialize)]
pub struct WeatherResponse {
    #[serde(default)]
    pub data: Vec<WeatherData>,
}

/// One observation. Units are imperial (°F, mph); precipitation is mm.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WeatherData {
    pub dt: i64,
    #[serde(default)]
    pub sunrise: i64,
    #[serde(default)]
    pub sunset: i64,
    pub temp: f64,
    pub feels_like: f64,
    pub humidity: u32,
    #[serde(default)]
    pub wind_speed: f64,
    #[serde(default)]
    pub wind_deg: f64,
    #[serde(default)]
    pub wind_gust: Option<f64>,
    #[serde(default)]
    pub weather: Vec<WeatherCondition>,
    #[serde(default)]
    pub rain: Option<Precipitation>,
    #[serde(default)]
    pub snow: Option<Precipitation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WeatherCondition {
    pub id: u32,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Precipitation {
    #[serde(rename = "1h", default)]
    pub one_hour: f64,
}

/// Why a response could not be turned into a description.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescribeError {
    #[error("No weather data received")]
    NoData,
    #[error("No weather condition received")]
    NoCondition,
    #[error("Unknown weather condition {0}")]
    UnknownCondition(u32),
}

impl WeatherResponse {
    /// Describe the first observation.
    pub fn describe(&self) -> Result<String, DescribeError> {
        self.data.first().ok_or(DescribeError::NoData)?.describe()
    }
}

impl WeatherData {
    fn is_day(&self) -> bool {
        self.dt >= self.sunrise && self.dt < self.sunset
    }

    /// Emoji label for the first reported condition code.
    pub fn condition(&self) -> Result<&'static str, DescribeError> {
        let id = self.weather.first().ok_or(DescribeError::NoCondition)?.id;
        let day = self.is_day();
        let label = match id {
            200..=202 | 210..=212 | 221 | 230..=232 => "🌩️ Thunderstorm",
            300..=302 | 310..=314 | 321 => "🌧️ Drizzle",
            500..=504 | 511 | 520..=522 | 531 => "🌧️ Rain",
            600..=602 | 611..=613 | 615 | 616 | 620..=622 => "🌨️ Snow",
            701 => "🌫️ Mist",
            711 => "🌫️ Smoke",
            721 => "🌫️ Haze",
            731 | 761 => "🌫️ Dust",
            741 => "🌫️ Fog",
            751 => "🌫️ Sand",
            762 => "🌫️ Ash",
            771 => "🌫️ Squall",
            781 => "🌪️ Tornado",
            800 if day => "☀️ Sunny",
            800 => "🌙 Clear",
            801 if day => "🌤️ Mostly sunny",
            801 => "🌙 Mostly clear",
            802 if day => "⛅ Partly cloudy",
            802 => "☁️ Partly cloudy",
            803 if day => "🌥️ Mostly cloudy",
            803 => "☁️ Mostly cloudy",
            804 => "☁️ Cloudy",
            other => return Err(DescribeError::UnknownCondition(other)),
        };
        Ok(label)
    }

    /// 16-point compass direction the wind blows from.
    pub fn wind_direction(&self) -> &'static str {
        const POINTS: [&str; 16] = [
            "N", "NNE", "NE", "ENE", "E", "ESE", "SE", "SSE", "S", "SSW", "SW", "WSW", "W", "WNW",
            "NW", "NNW",
        ];
        let deg = self.wind_deg.rem_euclid(360.0);
        let sector = ((deg + 11.25) / 22.5).floor() as usize % POINTS.len();
        POINTS[sector]
    }

    /// Hourly rain plus snow, in inches.
    pub fn precipitation_in(&self) -> f64 {
        let rain = self.rain.as_ref().map_or(0.0, |p| p.one_hour);
        let snow = self.snow.as_ref().map_or(0.0, |p| p.one_hour);
        (rain + snow) / MM_PER_INCH
    }

    pub fn describe(&self) -> Result<String, DescribeError> {
        let mut out = format!(
            "{}, {}°F, Feels like {}°F, Humidity {}%, Wind ",
            self.condition()?,
            whole(self.temp),
            whole(self.feels_like),
            self.humidity
        );

        let speed = whole(self.wind_speed);
        if speed == 0.0 {
            out.push_str("0mph");
        } else {
            out.push_str(&format!("{speed}mph "));
            let gust = whole(self.wind_gust.unwrap_or_default());
            if gust > 0.0 {
                out.push_str(&format!("with {gust}mph gusts "));
            }
            out.push_str("from ");
            out.push_str(self.wind_direction());
        }

        let precip = self.precipitation_in();
        if precip >= PRECIPITATION_EPSILON_IN {
            out.push_str(&format!(", Precipitation {precip:.2} in/hr"));
        }

        Ok(out)
    }
}

/// Round to a whole number, normalizing `-0` to `0`.
fn whole(x: f64) -> f64 {
    x.round() + 0.0
}
