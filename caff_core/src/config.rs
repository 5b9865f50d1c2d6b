//! Configuration file support for Sip.
//!
//! Configuration is loaded from `$XDG_CONFIG_HOME/sip/config.toml`.
//! Wake and sleep times are stored as wall-clock `"HH:MM"` strings and
//! resolved to concrete instants against the local calendar day.

use crate::{Beverage, DecayProfile, Error, Result, ScheduleProfile};
use chrono::offset::LocalResult;
use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration for the sip binary
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,

    #[serde(default)]
    pub decay: DecayConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub beverages: BeveragesConfig,
}

/// Where the WAL, CSV archive, and signal files live
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Decay model configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DecayConfig {
    #[serde(default = "default_half_life_hours")]
    pub half_life_hours: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            half_life_hours: default_half_life_hours(),
        }
    }
}

impl DecayConfig {
    /// Build the decay profile, rejecting a non-positive half-life
    pub fn to_profile(&self) -> Result<DecayProfile> {
        let profile = DecayProfile {
            half_life_hours: self.half_life_hours,
        };
        profile.validate()?;
        Ok(profile)
    }
}

/// Daily schedule and dosing bounds configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_optimal_daily_mg")]
    pub optimal_daily_mg: f64,

    #[serde(default = "default_wake_time")]
    pub wake_time: String,

    #[serde(default = "default_sleep_time")]
    pub sleep_time: String,

    #[serde(default = "default_min_dose_mg")]
    pub min_dose_mg: f64,

    #[serde(default = "default_max_dose_mg")]
    pub max_dose_mg: f64,

    #[serde(default = "default_min_gap_minutes")]
    pub min_gap_minutes: i64,

    #[serde(default = "default_peak_cap_fraction")]
    pub peak_cap_fraction: f64,

    #[serde(default = "default_sleep_threshold_mg")]
    pub sleep_threshold_mg: f64,

    #[serde(default = "default_sleep_window_hours")]
    pub sleep_window_hours: f64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            optimal_daily_mg: default_optimal_daily_mg(),
            wake_time: default_wake_time(),
            sleep_time: default_sleep_time(),
            min_dose_mg: default_min_dose_mg(),
            max_dose_mg: default_max_dose_mg(),
            min_gap_minutes: default_min_gap_minutes(),
            peak_cap_fraction: default_peak_cap_fraction(),
            sleep_threshold_mg: default_sleep_threshold_mg(),
            sleep_window_hours: default_sleep_window_hours(),
        }
    }
}

impl ScheduleConfig {
    /// Resolve the schedule into a profile anchored to the local day of `now`
    pub fn resolve(&self, now: DateTime<Utc>) -> Result<ScheduleProfile> {
        self.resolve_in(now, &Local)
    }

    /// Resolve the schedule against an explicit time zone
    ///
    /// The wall-clock wake and sleep times are anchored to the calendar
    /// day `now` falls on in `tz`. A bedtime at or before the wake time is
    /// taken as crossing midnight; the engine normalizes it downstream.
    pub fn resolve_in<Tz>(&self, now: DateTime<Utc>, tz: &Tz) -> Result<ScheduleProfile>
    where
        Tz: TimeZone,
    {
        if !(self.peak_cap_fraction > 0.0) || !self.peak_cap_fraction.is_finite() {
            return Err(Error::Config(format!(
                "peak_cap_fraction must be positive, got {}",
                self.peak_cap_fraction
            )));
        }

        let wake = parse_wall_clock(&self.wake_time)?;
        let sleep = parse_wall_clock(&self.sleep_time)?;

        let day = now.with_timezone(tz).date_naive();
        let profile = ScheduleProfile {
            optimal_daily_mg: self.optimal_daily_mg,
            wake_at: anchor_to_day(tz, day, wake)?,
            sleep_at: anchor_to_day(tz, day, sleep)?,
            min_dose_mg: self.min_dose_mg,
            max_dose_mg: self.max_dose_mg,
            min_gap_between_doses: Duration::minutes(self.min_gap_minutes),
            peak_safety_cap_mg: self.optimal_daily_mg * self.peak_cap_fraction,
            sleep_threshold_mg: self.sleep_threshold_mg,
            sleep_window_hours: self.sleep_window_hours,
        };
        profile.validate()?;
        Ok(profile)
    }
}

/// Custom beverages configuration
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct BeveragesConfig {
    #[serde(default)]
    pub custom: Vec<Beverage>,
}

/// Parse an `"HH:MM"` wall-clock string
fn parse_wall_clock(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .map_err(|e| Error::Config(format!("Invalid wall-clock time '{}': {}", value, e)))
}

/// Anchor a wall-clock time to a calendar day in `tz`, yielding UTC
fn anchor_to_day<Tz>(tz: &Tz, day: NaiveDate, time: NaiveTime) -> Result<DateTime<Utc>>
where
    Tz: TimeZone,
{
    match tz.from_local_datetime(&day.and_time(time)) {
        LocalResult::Single(instant) => Ok(instant.with_timezone(&Utc)),
        // A DST fold repeats the wall-clock hour; take the earlier instant
        LocalResult::Ambiguous(earliest, _) => Ok(earliest.with_timezone(&Utc)),
        LocalResult::None => Err(Error::Config(format!(
            "Wall-clock time {} does not exist on {} in this time zone",
            time, day
        ))),
    }
}

// Serde defaults
fn default_data_dir() -> PathBuf {
    let base = dirs::data_local_dir().unwrap_or_else(|| {
        let home = std::env::var("HOME").expect("HOME environment variable not set");
        PathBuf::from(home).join(".local/share")
    });
    base.join("sip")
}

fn default_half_life_hours() -> f64 {
    5.0
}

fn default_optimal_daily_mg() -> f64 {
    300.0
}

fn default_wake_time() -> String {
    "07:00".into()
}

fn default_sleep_time() -> String {
    "23:00".into()
}

fn default_min_dose_mg() -> f64 {
    40.0
}

fn default_max_dose_mg() -> f64 {
    200.0
}

fn default_min_gap_minutes() -> i64 {
    60
}

fn default_peak_cap_fraction() -> f64 {
    0.6
}

fn default_sleep_threshold_mg() -> f64 {
    50.0
}

fn default_sleep_window_hours() -> f64 {
    6.0
}

impl Config {
    /// Load the config file, or fall back to defaults when it is missing
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path();
        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Ok(Self::default())
        }
    }

    /// Load a config file from an explicit path
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        tracing::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Default config file location
    pub fn default_config_path() -> PathBuf {
        let base = dirs::config_dir().unwrap_or_else(|| {
            let home = std::env::var("HOME").expect("HOME environment variable not set");
            PathBuf::from(home).join(".config")
        });
        base.join("sip").join("config.toml")
    }

    /// Write the configuration to the default location
    pub fn save(&self) -> Result<()> {
        let config_path = Self::default_config_path();
        self.save_to(&config_path)
    }

    /// Write the configuration to an explicit path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }
}
