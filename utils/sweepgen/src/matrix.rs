use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Time unit accepted in a delay specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Ns,
    Us,
    Ms,
    S,
}

impl TimeUnit {
    /// Length of one unit in femtoseconds.
    const fn femtos(self) -> u128 {
        match self {
            TimeUnit::Ns => 1_000_000,
            TimeUnit::Us => 1_000_000_000,
            TimeUnit::Ms => 1_000_000_000_000,
            TimeUnit::S => 1_000_000_000_000_000,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeUnit::Ns => "ns",
            TimeUnit::Us => "us",
            TimeUnit::Ms => "ms",
            TimeUnit::S => "sec",
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DelayParseError {
    #[error("delay `{0}` must have the form `<number> <unit>`")]
    Shape(String),
    #[error("invalid delay magnitude `{0}`")]
    Magnitude(String),
    #[error("unknown time unit `{0}` (expected ns, us, ms, s or sec)")]
    Unit(String),
}

/// A testbench delay such as `1 us`.
///
/// The textual form is what gets written into the `TB_DELAY` declaration,
/// so `Display` always renders `<value> <unit>` with a VHDL unit name
/// (`2 s` renders as `2 sec`).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(try_from = "String")]
pub struct Delay {
    value: f64,
    unit: TimeUnit,
}

impl Delay {
    pub const fn new(value: f64, unit: TimeUnit) -> Self {
        Self { value, unit }
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    fn femtos(&self) -> u128 {
        (self.value * self.unit.femtos() as f64).round() as u128
    }
}

impl fmt::Display for Delay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.as_str())
    }
}

impl FromStr for Delay {
    type Err = DelayParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace();
        let (Some(value), Some(unit), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DelayParseError::Shape(s.to_string()));
        };

        let value: f64 = value
            .parse()
            .ok()
            .filter(|v: &f64| v.is_finite() && *v >= 0.0)
            .ok_or_else(|| DelayParseError::Magnitude(value.to_string()))?;
        let unit = match unit {
            "ns" => TimeUnit::Ns,
            "us" => TimeUnit::Us,
            "ms" => TimeUnit::Ms,
            "s" | "sec" => TimeUnit::S,
            other => return Err(DelayParseError::Unit(other.to_string())),
        };

        Ok(Delay { value, unit })
    }
}

impl TryFrom<String> for Delay {
    type Error = DelayParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// One clock/delay pairing of the sweep.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Configuration {
    pub name: String,
    #[serde(rename = "frequencyHz")]
    pub frequency_hz: u64,
    pub delay: Delay,
    #[serde(default)]
    pub description: String,
}

impl Configuration {
    pub fn new(name: &str, frequency_hz: u64, delay: Delay, description: &str) -> Self {
        Self {
            name: name.to_string(),
            frequency_hz,
            delay,
            description: description.to_string(),
        }
    }

    /// Number of whole clock periods that fit in the delay.
    ///
    /// Computed exactly, so `10 us @ 100 MHz` is 1000 where a float
    /// `delay_seconds * frequency` truncates to 999. Only used for display;
    /// the testbench computes its own count.
    pub fn expected_cycles(&self) -> u64 {
        const FEMTOS_PER_SECOND: u128 = 1_000_000_000_000_000;
        let cycles = self.delay.femtos() * self.frequency_hz as u128 / FEMTOS_PER_SECOND;
        u64::try_from(cycles).unwrap_or(u64::MAX)
    }
}

const DEFAULT_MATRIX: [(&str, u64, Delay, &str); 9] = [
    ("10MHz_1us", 10_000_000, Delay::new(1.0, TimeUnit::Us), "Low frequency"),
    ("50MHz_1us", 50_000_000, Delay::new(1.0, TimeUnit::Us), "Medium frequency"),
    ("100MHz_100ns", 100_000_000, Delay::new(100.0, TimeUnit::Ns), "Standard - short delay"),
    ("100MHz_1us", 100_000_000, Delay::new(1.0, TimeUnit::Us), "Standard - default"),
    ("100MHz_10us", 100_000_000, Delay::new(10.0, TimeUnit::Us), "Standard - long delay"),
    ("150MHz_1us", 150_000_000, Delay::new(1.0, TimeUnit::Us), "High frequency"),
    ("200MHz_1us", 200_000_000, Delay::new(1.0, TimeUnit::Us), "Very high frequency"),
    ("500MHz_10ns", 500_000_000, Delay::new(10.0, TimeUnit::Ns), "Ultra high frequency"),
    ("1GHz_10ns", 1_000_000_000, Delay::new(10.0, TimeUnit::Ns), "At limit (1 GHz)"),
];

/// The built-in sweep, in execution order.
pub fn default_matrix() -> Vec<Configuration> {
    DEFAULT_MATRIX
        .iter()
        .map(|&(name, freq, delay, desc)| Configuration::new(name, freq, delay, desc))
        .collect()
}

/// The single configuration exercised by the long-delay runner.
pub fn long_delay() -> Configuration {
    Configuration::new(
        "10MHz_1s",
        10_000_000,
        Delay::new(1.0, TimeUnit::S),
        "Long delay",
    )
}
