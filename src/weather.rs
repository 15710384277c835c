use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::config::Config;
use crate::error::Result;
use crate::fetch::Fetch;

/// Coarse icon category of a forecast condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WeatherKind {
    Sun,
    Cloud,
    Rain,
    Snow,
    Thunder,
    Fog,
    None,
}

impl WeatherKind {
    pub const ALL_ICONS: [WeatherKind; 6] = [
        WeatherKind::Sun,
        WeatherKind::Cloud,
        WeatherKind::Rain,
        WeatherKind::Snow,
        WeatherKind::Thunder,
        WeatherKind::Fog,
    ];

    /// Maps an OpenWeatherMap condition id. Unknown ids count as cloudy.
    pub fn from_condition_code(code: u32) -> Self {
        match code {
            200..=232 => WeatherKind::Thunder,
            300..=531 => WeatherKind::Rain,
            600..=622 => WeatherKind::Snow,
            701..=781 => WeatherKind::Fog,
            800 => WeatherKind::Sun,
            801..=804 => WeatherKind::Cloud,
            _ => WeatherKind::Cloud,
        }
    }

    /// File stem of the icon asset, `None` for [`WeatherKind::None`].
    pub fn asset_name(&self) -> Option<&'static str> {
        match self {
            WeatherKind::Sun => Some("sun"),
            WeatherKind::Cloud => Some("cloud"),
            WeatherKind::Rain => Some("rain"),
            WeatherKind::Snow => Some("snow"),
            WeatherKind::Thunder => Some("thunder"),
            WeatherKind::Fog => Some("fog"),
            WeatherKind::None => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, WeatherKind::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForecastPair {
    pub today: WeatherKind,
    pub tomorrow: WeatherKind,
}

impl ForecastPair {
    pub const NONE: ForecastPair = ForecastPair {
        today: WeatherKind::None,
        tomorrow: WeatherKind::None,
    };
}

impl Default for ForecastPair {
    fn default() -> Self {
        Self::NONE
    }
}

#[derive(Debug, Deserialize)]
struct ForecastPayload {
    list: Vec<ForecastSlot>,
}

#[derive(Debug, Deserialize)]
struct ForecastSlot {
    dt: i64,
    #[serde(default)]
    weather: Vec<Condition>,
}

#[derive(Debug, Deserialize)]
struct Condition {
    id: u32,
}

/// Picks the first slot of `today` and of the day after from a time-ordered
/// forecast payload.
pub fn forecast_from_payload(body: &str, tz: &Tz, today: NaiveDate) -> Result<ForecastPair> {
    let payload: ForecastPayload = serde_json::from_str(body)?;
    let tomorrow = today + Duration::days(1);
    let mut pair = ForecastPair::NONE;

    for slot in payload.list.iter() {
        let date = match Utc.timestamp_opt(slot.dt, 0).single() {
            Some(instant) => instant.with_timezone(tz).date_naive(),
            None => {
                log::debug!("Skipping forecast slot with timestamp {}", slot.dt);
                continue;
            }
        };

        let code = match slot.weather.first() {
            Some(condition) => condition.id,
            None => continue,
        };

        if date == today && pair.today.is_none() {
            pair.today = WeatherKind::from_condition_code(code);
        } else if date == tomorrow && pair.tomorrow.is_none() {
            pair.tomorrow = WeatherKind::from_condition_code(code);
        }

        if !pair.today.is_none() && !pair.tomorrow.is_none() {
            break;
        }
    }

    Ok(pair)
}

pub struct WeatherResolver {
    api_key: Option<String>,
    latitude: f64,
    longitude: f64,
    units: String,
    endpoint: String,
    timeout: std::time::Duration,
    tz: Tz,
}

impl WeatherResolver {
    pub fn from_config(config: &Config) -> Self {
        WeatherResolver {
            api_key: config.weather.api_key.clone(),
            latitude: config.weather.latitude,
            longitude: config.weather.longitude,
            units: config.weather.units.clone(),
            endpoint: config.weather.endpoint.clone(),
            timeout: config.weather_timeout(),
            tz: config.timezone,
        }
    }

    /// Today's and tomorrow's weather at the configured location. Any
    /// failure degrades to [`ForecastPair::NONE`].
    pub fn resolve(&self, fetch: &dyn Fetch, now: DateTime<Tz>) -> ForecastPair {
        let api_key = match self.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => key,
            _ => {
                log::info!("No weather API key configured, skipping forecast");
                return ForecastPair::NONE;
            }
        };

        match self.fetch_forecast(fetch, api_key, now) {
            Ok(pair) => {
                log::debug!("Forecast: today {:?}, tomorrow {:?}", pair.today, pair.tomorrow);
                pair
            }
            Err(err) => {
                log::warn!("Weather unavailable: {}", err);
                ForecastPair::NONE
            }
        }
    }

    fn fetch_forecast(
        &self,
        fetch: &dyn Fetch,
        api_key: &str,
        now: DateTime<Tz>,
    ) -> Result<ForecastPair> {
        let query = [
            ("lat", self.latitude.to_string()),
            ("lon", self.longitude.to_string()),
            ("appid", api_key.to_owned()),
            ("units", self.units.clone()),
        ];

        let body = fetch.get(&self.endpoint, &query, self.timeout)?;
        let today = now.with_timezone(&self.tz).date_naive();

        forecast_from_payload(&body, &self.tz, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::testing::RecordingFetch;

    const ENDPOINT: &str = "https://api.openweathermap.org/data/2.5/forecast";

    fn seoul_noon(y: i32, m: u32, d: u32) -> DateTime<Tz> {
        chrono_tz::Asia::Seoul
            .with_ymd_and_hms(y, m, d, 12, 0, 0)
            .unwrap()
    }

    fn resolver(api_key: Option<&str>) -> WeatherResolver {
        let mut config = Config::default();
        config.weather.api_key = api_key.map(str::to_owned);
        WeatherResolver::from_config(&config)
    }

    #[test]
    fn condition_codes_map_to_kinds() {
        use WeatherKind::*;
        let cases = [
            (200, Thunder),
            (232, Thunder),
            (300, Rain),
            (531, Rain),
            (600, Snow),
            (622, Snow),
            (701, Fog),
            (781, Fog),
            (800, Sun),
            (801, Cloud),
            (802, Cloud),
            (804, Cloud),
            (999, Cloud),
            (0, Cloud),
        ];

        for (code, kind) in cases.iter() {
            assert_eq!(WeatherKind::from_condition_code(*code), *kind, "code {}", code);
        }
    }

    #[test]
    fn missing_key_makes_no_request() {
        let fetch = RecordingFetch::default().with_body(ENDPOINT, "{\"list\": []}");

        let pair = resolver(None).resolve(&fetch, seoul_noon(2024, 2, 15));
        assert_eq!(pair, ForecastPair::NONE);
        assert_eq!(fetch.request_count(), 0);

        let pair = resolver(Some("  ")).resolve(&fetch, seoul_noon(2024, 2, 15));
        assert_eq!(pair, ForecastPair::NONE);
        assert_eq!(fetch.request_count(), 0);
    }

    #[test]
    fn first_slot_of_each_day_wins() {
        // 2024-02-15 00:00 KST == 2024-02-14 15:00 UTC == 1707922800
        let body = r#"{"list": [
            {"dt": 1707919200, "weather": [{"id": 500}]},
            {"dt": 1707922800, "weather": [{"id": 800}]},
            {"dt": 1707933600, "weather": [{"id": 601}]},
            {"dt": 1708009200, "weather": [{"id": 211}]},
            {"dt": 1708020000, "weather": [{"id": 800}]}
        ]}"#;
        let fetch = RecordingFetch::default().with_body(ENDPOINT, body);

        let pair = resolver(Some("key")).resolve(&fetch, seoul_noon(2024, 2, 15));

        assert_eq!(
            pair,
            ForecastPair {
                today: WeatherKind::Sun,
                tomorrow: WeatherKind::Thunder,
            }
        );

        let requests = fetch.requests.borrow();
        assert_eq!(requests.len(), 1);
        assert!(requests[0]
            .1
            .contains(&("appid".to_owned(), "key".to_owned())));
        assert!(requests[0]
            .1
            .contains(&("units".to_owned(), "metric".to_owned())));
    }

    #[test]
    fn absent_day_stays_none() {
        let body = r#"{"list": [{"dt": 1707922800, "weather": [{"id": 741}]}]}"#;
        let pair =
            forecast_from_payload(body, &chrono_tz::Asia::Seoul, seoul_noon(2024, 2, 15).date_naive())
                .unwrap();

        assert_eq!(pair.today, WeatherKind::Fog);
        assert_eq!(pair.tomorrow, WeatherKind::None);
    }

    #[test]
    fn slot_without_condition_is_skipped() {
        let body = r#"{"list": [
            {"dt": 1707922800, "weather": []},
            {"dt": 1707933600, "weather": [{"id": 300}]}
        ]}"#;
        let pair =
            forecast_from_payload(body, &chrono_tz::Asia::Seoul, seoul_noon(2024, 2, 15).date_naive())
                .unwrap();

        assert_eq!(pair.today, WeatherKind::Rain);
    }

    #[test]
    fn out_of_range_slot_keeps_resolved_days() {
        let body = r#"{"list": [
            {"dt": 1707922800, "weather": [{"id": 800}]},
            {"dt": 9223372036854775807, "weather": [{"id": 500}]},
            {"dt": 1708009200, "weather": [{"id": 602}]}
        ]}"#;
        let pair =
            forecast_from_payload(body, &chrono_tz::Asia::Seoul, seoul_noon(2024, 2, 15).date_naive())
                .unwrap();

        assert_eq!(
            pair,
            ForecastPair {
                today: WeatherKind::Sun,
                tomorrow: WeatherKind::Snow,
            }
        );
    }

    #[test]
    fn failures_degrade_to_none() {
        let malformed = RecordingFetch::default().with_body(ENDPOINT, "<html>oops</html>");
        assert_eq!(
            resolver(Some("key")).resolve(&malformed, seoul_noon(2024, 2, 15)),
            ForecastPair::NONE
        );

        let unauthorized = RecordingFetch::default().with_status(ENDPOINT, 401);
        assert_eq!(
            resolver(Some("key")).resolve(&unauthorized, seoul_noon(2024, 2, 15)),
            ForecastPair::NONE
        );

        let unreachable = RecordingFetch::default();
        assert_eq!(
            resolver(Some("key")).resolve(&unreachable, seoul_noon(2024, 2, 15)),
            ForecastPair::NONE
        );
        assert_eq!(unreachable.request_count(), 1);
    }
}
