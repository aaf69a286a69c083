//! Link speeds and session configuration.

use crate::error::Error;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Default timeout of every USB transfer.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Default delay between switching a supply rail off and on again.
pub const DEFAULT_POWER_CYCLE_DELAY: Duration = Duration::from_millis(100);

/// Clock speed of a probe link.
///
/// The same codes apply to the link between host and probe and to the link between probe and
/// chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Speed {
    /// 6000 kHz
    Fast = 0x01,
    /// 4000 kHz, known to work with the CH582
    #[default]
    Medium = 0x02,
    /// 400 kHz
    Slow = 0x03,
}

impl Speed {
    /// The code sent in the speed commands.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// The nominal clock in kHz.
    pub fn to_khz(self) -> u32 {
        match self {
            Speed::Fast => 6000,
            Speed::Medium => 4000,
            Speed::Slow => 400,
        }
    }
}

impl fmt::Display for Speed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} kHz", self.to_khz())
    }
}

impl FromStr for Speed {
    type Err = Error;

    /// Accepts `fast`, `medium` and `slow` as well as the clock in kHz.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" | "6000" => Ok(Speed::Fast),
            "medium" | "4000" => Ok(Speed::Medium),
            "slow" | "400" => Ok(Speed::Slow),
            other => Err(Error::InvalidInput(format!(
                "unknown speed '{}' (use fast, medium, slow or 6000, 4000, 400)",
                other
            ))),
        }
    }
}

/// Settings applied to a probe session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Speed of the host to probe link.
    pub probe_speed: Speed,
    /// Speed of the probe to chip link.
    pub chip_speed: Speed,
    /// Timeout of every USB transfer.
    pub timeout: Duration,
    /// Pause between terminal polls that found no character. Zero polls continuously.
    pub poll_interval: Duration,
    /// Delay between switching a supply rail off and on again.
    pub power_cycle_delay: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            probe_speed: Speed::default(),
            chip_speed: Speed::default(),
            timeout: DEFAULT_TIMEOUT,
            poll_interval: Duration::ZERO,
            power_cycle_delay: DEFAULT_POWER_CYCLE_DELAY,
        }
    }
}

impl SessionConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set both link speeds
    pub fn with_speed(mut self, speed: Speed) -> Self {
        self.probe_speed = speed;
        self.chip_speed = speed;
        self
    }

    /// Set the host to probe link speed
    pub fn with_probe_speed(mut self, speed: Speed) -> Self {
        self.probe_speed = speed;
        self
    }

    /// Set the probe to chip link speed
    pub fn with_chip_speed(mut self, speed: Speed) -> Self {
        self.chip_speed = speed;
        self
    }

    /// Set the USB transfer timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the pause between idle terminal polls
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the delay used when power cycling a supply rail
    pub fn with_power_cycle_delay(mut self, delay: Duration) -> Self {
        self.power_cycle_delay = delay;
        self
    }
}
