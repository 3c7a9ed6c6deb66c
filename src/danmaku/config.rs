//! Scheduler tuning: lane band, durations, burst and stream cadences.
//!
//! The countdown page and the birthday page run the same scheduler with
//! different numbers; [`PagePreset`] selects between them.

use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// The first instance must be on screen within this many seconds of `start()`.
pub const FIRST_SPAWN_DEADLINE_SECS: f64 = 1.0;

/// Inclusive range, sampled uniformly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Span {
    pub min: f64,
    pub max: f64,
}

impl Span {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub const fn fixed(value: f64) -> Self {
        Self { min: value, max: value }
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        if self.min == self.max {
            return self.min;
        }
        rng.random_range(self.min..=self.max)
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    fn check(&self, what: &str) -> Result<()> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(Error::InvalidConfig(format!(
                "{what}: invalid range {}..={}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// How a stream picks the gap between firings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Cadence {
    /// Interval drawn once when the scheduler starts, then repeated.
    Fixed(Span),
    /// Interval drawn again after every firing.
    Jittered(Span),
}

impl Cadence {
    pub fn span(&self) -> Span {
        match self {
            Cadence::Fixed(span) | Cadence::Jittered(span) => *span,
        }
    }
}

/// One repeating spawn stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub name: String,
    pub cadence: Cadence,
    /// Seconds after `start()` before the stream's first interval begins.
    #[serde(default)]
    pub start_delay: f64,
    /// Chance that a firing actually spawns.
    #[serde(default = "default_probability")]
    pub fire_probability: f64,
}

fn default_probability() -> f64 {
    1.0
}

impl StreamConfig {
    pub fn new(name: &str, cadence: Cadence) -> Self {
        Self {
            name: name.to_string(),
            cadence,
            start_delay: 0.0,
            fire_probability: 1.0,
        }
    }

    pub fn with_start_delay(mut self, seconds: f64) -> Self {
        self.start_delay = seconds;
        self
    }

    pub fn with_probability(mut self, probability: f64) -> Self {
        self.fire_probability = probability;
        self
    }
}

/// Instances spawned right after `start()`, `spacing` seconds apart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BurstConfig {
    pub count: u32,
    pub spacing: f64,
}

/// Full scheduler configuration. Times are in seconds, lanes in percent of
/// viewport height.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DanmakuConfig {
    pub lane_band: Span,
    pub duration: Span,
    /// Extra time after the traversal before the fallback timer retires an instance.
    pub retire_grace: f64,
    pub burst: BurstConfig,
    pub streams: Vec<StreamConfig>,
}

impl DanmakuConfig {
    /// Countdown page: slow 20–30 s traversals, three layered streams.
    pub fn home() -> Self {
        Self {
            lane_band: Span::new(10.0, 85.0),
            duration: Span::new(20.0, 30.0),
            retire_grace: 2.0,
            burst: BurstConfig { count: 4, spacing: 0.2 },
            streams: vec![
                StreamConfig::new("sparse", Cadence::Jittered(Span::new(4.0, 8.0))),
                StreamConfig::new("dense", Cadence::Fixed(Span::new(1.0, 2.0))),
                StreamConfig::new("extra", Cadence::Fixed(Span::new(1.5, 3.0))).with_start_delay(0.5),
            ],
        }
    }

    /// Birthday page: faster 15–25 s traversals, one stream that skips 10 % of its beats.
    pub fn birthday() -> Self {
        Self {
            lane_band: Span::new(10.0, 85.0),
            duration: Span::new(15.0, 25.0),
            retire_grace: 1.0,
            burst: BurstConfig { count: 8, spacing: 0.2 },
            streams: vec![StreamConfig::new("steady", Cadence::Fixed(Span::fixed(1.5))).with_probability(0.9)],
        }
    }

    pub fn for_page(page: PagePreset) -> Self {
        match page {
            PagePreset::Home => Self::home(),
            PagePreset::Birthday => Self::birthday(),
        }
    }

    pub(crate) fn retire_grace(&self) -> Duration {
        Duration::from_secs_f64(self.retire_grace)
    }

    /// Reject configurations the scheduler cannot honour.
    pub fn validate(&self) -> Result<()> {
        self.lane_band.check("lane_band")?;
        if self.lane_band.min < 0.0 || self.lane_band.max > 100.0 {
            return Err(Error::InvalidConfig("lane_band must lie within 0..=100".into()));
        }
        self.duration.check("duration")?;
        if self.duration.min <= 0.0 {
            return Err(Error::InvalidConfig("duration must be positive".into()));
        }
        if !self.retire_grace.is_finite() || self.retire_grace < 0.0 {
            return Err(Error::InvalidConfig("retire_grace must be >= 0".into()));
        }
        if !self.burst.spacing.is_finite() || self.burst.spacing < 0.0 {
            return Err(Error::InvalidConfig("burst spacing must be >= 0".into()));
        }

        for stream in &self.streams {
            let span = stream.cadence.span();
            span.check(&stream.name)?;
            if span.min <= 0.0 {
                return Err(Error::InvalidConfig(format!("{}: interval must be positive", stream.name)));
            }
            if !stream.start_delay.is_finite() || stream.start_delay < 0.0 {
                return Err(Error::InvalidConfig(format!("{}: start_delay must be >= 0", stream.name)));
            }
            if !(0.0..=1.0).contains(&stream.fire_probability) {
                return Err(Error::InvalidConfig(format!(
                    "{}: fire_probability must lie within 0..=1",
                    stream.name
                )));
            }
        }

        if self.first_spawn_bound().is_none_or(|t| t > FIRST_SPAWN_DEADLINE_SECS) {
            return Err(Error::InvalidConfig(format!(
                "nothing is guaranteed to spawn within {FIRST_SPAWN_DEADLINE_SECS}s of start"
            )));
        }
        Ok(())
    }

    /// Latest time after `start()` by which a spawn is certain, if any.
    fn first_spawn_bound(&self) -> Option<f64> {
        let burst = (self.burst.count > 0).then_some(0.0_f64);
        let stream = self
            .streams
            .iter()
            .filter(|s| s.fire_probability >= 1.0)
            .map(|s| s.start_delay + s.cadence.span().max)
            .reduce(f64::min);
        match (burst, stream) {
            (Some(b), Some(s)) => Some(b.min(s)),
            (b, s) => b.or(s),
        }
    }
}

impl Default for DanmakuConfig {
    fn default() -> Self {
        Self::home()
    }
}

/// Which page's numbers to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PagePreset {
    #[default]
    Home,
    Birthday,
}

impl PagePreset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Home => "home",
            Self::Birthday => "birthday",
        }
    }
}

impl fmt::Display for PagePreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PagePreset {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "home" | "index" => Ok(Self::Home),
            "birthday" => Ok(Self::Birthday),
            other => Err(Error::InvalidConfig(format!("unknown page preset: {other}"))),
        }
    }
}
