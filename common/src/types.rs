use serde::Serialize;

use crate::{config::NodeConfig, display::DisplayEngine};

/// A sensor value as clients see it: either an already-formatted number or
/// one of the sentinel states a measurement can end in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading {
    Value(String),
    Unavailable,
    Error,
    NoEcho,
}

impl Reading {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Value(value) => value,
            Self::Unavailable => "N/A",
            Self::Error => "Error",
            Self::NoEcho => "No Echo",
        }
    }
}

impl core::fmt::Display for Reading {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the character display is currently dedicated to. Exactly one mode
/// is active at a time; switching replaces the previous mode wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayMode {
    Idle,
    Distance,
    Temperature,
    Text(String),
}

/// Shared mutable state of one node: latest readings, the requested output
/// level and the display engine. Owned by the scheduler loop and borrowed
/// by the router; there is exactly one thread of control, so no locks.
///
/// Single-writer discipline: the readings are written only by the sampling
/// step, `output_on` and the display mode only by the router.
#[derive(Debug)]
pub struct NodeState {
    pub output_on: bool,
    pub temperature: Reading,
    pub humidity: Reading,
    pub distance: Reading,
    pub display: DisplayEngine,
}

impl NodeState {
    pub fn new(config: &NodeConfig) -> Self {
        Self {
            output_on: false,
            temperature: Reading::Unavailable,
            humidity: Reading::Unavailable,
            distance: Reading::Unavailable,
            display: DisplayEngine::new(config.display_cols, config.display_refresh_s),
        }
    }

    /// Snapshot of the current readings for the `/data` endpoint.
    pub fn telemetry(&self) -> TelemetryReport {
        TelemetryReport {
            temperature: self.temperature.as_str().to_string(),
            humidity: self.humidity.as_str().to_string(),
            distance: self.distance.as_str().to_string(),
            gpio: if self.output_on { "ON" } else { "OFF" }.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryReport {
    pub temperature: String,
    pub humidity: String,
    pub distance: String,
    pub gpio: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_strings_match_wire_format() {
        assert_eq!(Reading::Unavailable.as_str(), "N/A");
        assert_eq!(Reading::Error.as_str(), "Error");
        assert_eq!(Reading::NoEcho.as_str(), "No Echo");
        assert_eq!(Reading::Value("21.50".into()).as_str(), "21.50");
    }

    #[test]
    fn telemetry_reports_output_state() {
        let mut state = NodeState::new(&NodeConfig::default());
        assert_eq!(state.telemetry().gpio, "OFF");

        state.output_on = true;
        state.distance = Reading::NoEcho;
        let report = state.telemetry();
        assert_eq!(report.gpio, "ON");
        assert_eq!(report.distance, "No Echo");
        assert_eq!(report.temperature, "N/A");
    }
}
