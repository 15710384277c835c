use chrono_tz::Tz;
use nom::bytes::complete::{tag, take_while_m_n};
use nom::combinator::{all_consuming, map_res};
use nom::sequence::{preceded, tuple};
use serde::{Deserialize, Deserializer};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::calendar::CalendarDate;
use crate::error::{Error, ErrorKind, Result};

const CONFIG_PATH_ENV_VAR: &str = "CALPOSTER_CONFIG_FILE";
const API_KEY_ENV_VAR: &str = "OPENWEATHER_API_KEY";
const LATITUDE_ENV_VAR: &str = "CALPOSTER_LAT";
const LONGITUDE_ENV_VAR: &str = "CALPOSTER_LON";
const FEED_URL_ENV_VAR: &str = "CALPOSTER_ICS_URL";
const TIMEZONE_ENV_VAR: &str = "CALPOSTER_TIMEZONE";

pub(crate) fn find_configfile_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();

    if let Ok(path) = env::var(CONFIG_PATH_ENV_VAR) {
        locations.push(PathBuf::from(path));
    }

    if let Ok(dir) = env::var("XDG_CONFIG_HOME") {
        locations.push([dir.as_str(), "calposter", "config.toml"].iter().collect());
    } else if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".config").join("calposter").join("config.toml"));
    }

    if let Some(home) = dirs::home_dir() {
        locations.push(home.join(".calposter.toml"));
    }

    locations
}

/// Loads the explicitly given config file, or the first existing file of the
/// default locations, or the built-in defaults. Environment overrides are
/// applied last in every case.
pub fn load_suitable_config(path: Option<&Path>) -> Result<Config> {
    let mut config = if let Some(path) = path {
        Config::from_file(path)?
    } else if let Some(found) = find_configfile_locations()
        .into_iter()
        .find(|candidate| candidate.is_file())
    {
        Config::from_file(&found)?
    } else {
        log::info!("No config file found, using defaults");
        Config::default()
    };

    config.apply_env(|key| env::var(key).ok());
    config.layout.validate()?;

    Ok(config)
}

/// An RGB triple written as `#RRGGBB` in the config file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub [u8; 3]);

impl Rgb {
    pub const WHITE: Rgb = Rgb([255, 255, 255]);
}

impl FromStr for Rgb {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        fn channel(input: &str) -> nom::IResult<&str, u8> {
            map_res(take_while_m_n(2, 2, |c: char| c.is_ascii_hexdigit()), |hex| {
                u8::from_str_radix(hex, 16)
            })(input)
        }

        let (_, (r, g, b)) = all_consuming(preceded(tag("#"), tuple((channel, channel, channel))))(
            s.trim(),
        )
        .map_err(|_: nom::Err<nom::error::Error<&str>>| {
            Error::new(
                ErrorKind::Config,
                &format!("'{}' is not a #RRGGBB colour", s),
            )
        })?;

        Ok(Rgb([r, g, b]))
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

fn deserialize_tz<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Tz, D::Error> {
    let s = String::deserialize(deserializer)?;
    parse_tz(&s).map_err(serde::de::Error::custom)
}

pub fn parse_tz(s: &str) -> Result<Tz> {
    s.trim().parse::<Tz>().map_err(|err| {
        Error::new(
            ErrorKind::Timezone,
            &format!("Timezone '{}' not recognized: {}", s, err),
        )
    })
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub background: Rgb,
    pub text: Rgb,
    pub faded: Rgb,
    pub accent: Rgb,
    pub inverted: Rgb,
}

impl Default for Palette {
    fn default() -> Self {
        Palette {
            background: Rgb::WHITE,
            text: Rgb([30, 30, 30]),
            faded: Rgb([175, 175, 175]),
            accent: Rgb([200, 0, 0]),
            inverted: Rgb::WHITE,
        }
    }
}

/// Canvas size and the margins the month grid is placed within.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub width: u32,
    pub height: u32,
    pub side_margin: u32,
    pub top_margin: u32,
    pub header_height: u32,
    pub bottom_margin: u32,
    pub icon_size: u32,
    pub month_font: f32,
    pub label_font: f32,
    pub date_font: f32,
    pub event_font: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        LayoutConfig {
            width: 960,
            height: 1280,
            side_margin: 90,
            top_margin: 90,
            header_height: 300,
            bottom_margin: 120,
            icon_size: 96,
            month_font: 200.0,
            label_font: 26.0,
            date_font: 34.0,
            event_font: 18.0,
        }
    }
}

impl LayoutConfig {
    pub fn grid_top(&self) -> u32 {
        self.top_margin + self.header_height
    }

    pub fn grid_bottom(&self) -> u32 {
        self.height.saturating_sub(self.bottom_margin)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::new(ErrorKind::Config, msg));

        if 2 * self.side_margin >= self.width {
            return invalid("side margins leave no room for the grid");
        }
        if self.grid_top() >= self.grid_bottom() {
            return invalid("grid top must lie above grid bottom");
        }
        if self.icon_size == 0 {
            return invalid("icon size must be positive");
        }
        if [self.month_font, self.label_font, self.date_font, self.event_font]
            .iter()
            .any(|size| !(*size > 0.0))
        {
            return invalid("font sizes must be positive");
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct WeatherConfig {
    pub api_key: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
    pub units: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        WeatherConfig {
            api_key: None,
            latitude: 37.5665,
            longitude: 126.9780,
            units: "metric".to_owned(),
            endpoint: "https://api.openweathermap.org/data/2.5/forecast".to_owned(),
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EventsConfig {
    pub feed_url: Option<String>,
    pub max_per_day: usize,
    pub timeout_secs: u64,
}

impl Default for EventsConfig {
    fn default() -> Self {
        EventsConfig {
            feed_url: None,
            max_per_day: 2,
            timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct HolidaysConfig {
    pub dates: Vec<String>,
    pub feed_url: Option<String>,
}

impl HolidaysConfig {
    pub fn parsed_dates(&self) -> Vec<CalendarDate> {
        self.dates
            .iter()
            .filter_map(|s| match chrono::NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d") {
                Ok(date) => Some(CalendarDate::from(date)),
                Err(err) => {
                    log::warn!("Ignoring holiday '{}': {}", s, err);
                    None
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(deserialize_with = "deserialize_tz")]
    pub timezone: Tz,
    pub output: PathBuf,
    pub font: PathBuf,
    pub icon_dir: PathBuf,
    pub weather: WeatherConfig,
    pub events: EventsConfig,
    pub holidays: HolidaysConfig,
    pub layout: LayoutConfig,
    pub palette: Palette,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            timezone: chrono_tz::Asia::Seoul,
            output: PathBuf::from("docs/latest.png"),
            font: PathBuf::from("assets/NanumGothic.ttf"),
            icon_dir: PathBuf::from("assets/weather"),
            weather: WeatherConfig::default(),
            events: EventsConfig::default(),
            holidays: HolidaysConfig::default(),
            layout: LayoutConfig::default(),
            palette: Palette::default(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|err| {
            Error::new(
                ErrorKind::Config,
                &format!("Could not read '{}': {}", path.display(), err),
            )
        })?;

        log::debug!("Loading config from '{}'", path.display());
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Applies environment-style overrides. Empty values count as absent.
    pub fn apply_env<F: Fn(&str) -> Option<String>>(&mut self, lookup: F) {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        if let Some(key) = lookup(API_KEY_ENV_VAR) {
            self.weather.api_key = Some(key);
        }

        if let Some(url) = lookup(FEED_URL_ENV_VAR) {
            self.events.feed_url = Some(url);
        }

        for (var, target) in [
            (LATITUDE_ENV_VAR, &mut self.weather.latitude),
            (LONGITUDE_ENV_VAR, &mut self.weather.longitude),
        ] {
            if let Some(value) = lookup(var) {
                match value.trim().parse::<f64>() {
                    Ok(parsed) => *target = parsed,
                    Err(err) => log::warn!("Ignoring {}='{}': {}", var, value, err),
                }
            }
        }

        if let Some(value) = lookup(TIMEZONE_ENV_VAR) {
            match parse_tz(&value) {
                Ok(tz) => self.timezone = tz,
                Err(err) => log::warn!("Ignoring {}: {}", TIMEZONE_ENV_VAR, err),
            }
        }
    }

    pub fn weather_timeout(&self) -> Duration {
        Duration::from_secs(self.weather.timeout_secs)
    }

    pub fn events_timeout(&self) -> Duration {
        Duration::from_secs(self.events.timeout_secs)
    }
}
