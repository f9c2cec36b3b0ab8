use log::warn;

use crate::{
    hal::{ClimateSensor, DelayUs, DigitalOutput, HalError, PulseInput},
    types::Reading,
};

/// Round-trip speed of sound, cm per microsecond.
const SOUND_CM_PER_US: f32 = 0.0343;

const TRIGGER_SETTLE_US: u32 = 5;
const TRIGGER_PULSE_US: u32 = 10;

/// Owns the climate and distance sensors and turns raw driver results into
/// [`Reading`]s, degrading to sentinels instead of failing.
pub struct SensorSampler<C, T, E, W> {
    climate: C,
    trigger: T,
    echo: E,
    delay: W,
    echo_timeout_us: u32,
}

impl<C, T, E, W> SensorSampler<C, T, E, W>
where
    C: ClimateSensor,
    T: DigitalOutput,
    E: PulseInput,
    W: DelayUs,
{
    pub fn new(climate: C, trigger: T, echo: E, delay: W, echo_timeout_us: u32) -> Self {
        Self {
            climate,
            trigger,
            echo,
            delay,
            echo_timeout_us,
        }
    }

    /// Triggers a climate measurement and formats temperature and humidity
    /// to two decimals. Any driver fault degrades both readings to the
    /// `Error` sentinel.
    pub fn refresh_climate(&mut self) -> (Reading, Reading) {
        match self.climate.measure() {
            Ok(sample) => (
                Reading::Value(format!("{:.2}", sample.temperature_c)),
                Reading::Value(format!("{:.2}", sample.humidity_pct)),
            ),
            Err(err) => {
                warn!("climate measurement failed: {err}");
                (Reading::Error, Reading::Error)
            }
        }
    }

    /// Fires the ultrasonic trigger and times the echo, formatted to one
    /// decimal in centimeters. A missing echo is a normal outcome
    /// (`NoEcho`), not a fault.
    pub fn refresh_distance(&mut self) -> Reading {
        if let Err(err) = self.fire_trigger() {
            warn!("distance trigger failed: {err}");
            return Reading::Error;
        }

        match self.echo.measure_pulse_us(true, self.echo_timeout_us) {
            Ok(Some(round_trip_us)) => {
                let distance_cm = round_trip_us as f32 * SOUND_CM_PER_US / 2.0;
                Reading::Value(format!("{distance_cm:.1}"))
            }
            Ok(None) => Reading::NoEcho,
            Err(err) => {
                warn!("echo measurement failed: {err}");
                Reading::Error
            }
        }
    }

    fn fire_trigger(&mut self) -> Result<(), HalError> {
        self.trigger.set(false)?;
        self.delay.delay_us(TRIGGER_SETTLE_US);
        self.trigger.set(true)?;
        self.delay.delay_us(TRIGGER_PULSE_US);
        self.trigger.set(false)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::testing::{RecordingDelay, ScriptedClimate, ScriptedEcho, SharedPin};

    fn sampler(
        climate: ScriptedClimate,
        echo: ScriptedEcho,
    ) -> (
        SensorSampler<ScriptedClimate, SharedPin, ScriptedEcho, RecordingDelay>,
        SharedPin,
        RecordingDelay,
    ) {
        let trigger = SharedPin::default();
        let delay = RecordingDelay::default();
        let sampler = SensorSampler::new(climate, trigger.clone(), echo, delay.clone(), 30_000);
        (sampler, trigger, delay)
    }

    #[test]
    fn climate_values_format_to_two_decimals() {
        let (mut sampler, _, _) = sampler(
            ScriptedClimate::steady(21.5, 48.0),
            ScriptedEcho::timing_out(),
        );

        let (temperature, humidity) = sampler.refresh_climate();
        assert_eq!(temperature, Reading::Value("21.50".into()));
        assert_eq!(humidity, Reading::Value("48.00".into()));
    }

    #[test]
    fn climate_fault_degrades_both_readings() {
        let (mut sampler, _, _) = sampler(
            ScriptedClimate::failing("checksum mismatch"),
            ScriptedEcho::timing_out(),
        );

        let (temperature, humidity) = sampler.refresh_climate();
        assert_eq!(temperature, Reading::Error);
        assert_eq!(humidity, Reading::Error);
    }

    #[test]
    fn distance_converts_round_trip_to_centimeters() {
        let (mut sampler, _, _) = sampler(
            ScriptedClimate::steady(21.5, 48.0),
            ScriptedEcho::echoing(2_000),
        );

        // 2000 us round trip -> 34.3 cm.
        assert_eq!(sampler.refresh_distance(), Reading::Value("34.3".into()));
    }

    #[test]
    fn echo_timeout_is_a_normal_no_echo() {
        let (mut sampler, _, _) = sampler(
            ScriptedClimate::steady(21.5, 48.0),
            ScriptedEcho::timing_out(),
        );

        assert_eq!(sampler.refresh_distance(), Reading::NoEcho);
    }

    #[test]
    fn trigger_fires_the_documented_pulse_train() {
        let (mut sampler, trigger, delay) = sampler(
            ScriptedClimate::steady(21.5, 48.0),
            ScriptedEcho::echoing(1_000),
        );

        let _ = sampler.refresh_distance();
        assert_eq!(trigger.0.borrow().transitions, vec![false, true, false]);
        assert_eq!(*delay.delays_us.borrow(), vec![5, 10]);
    }

    #[test]
    fn echo_sees_the_configured_timeout() {
        let echo = ScriptedEcho::timing_out();
        let observed = echo.observed_timeouts.clone();
        let trigger = SharedPin::default();
        let mut sampler = SensorSampler::new(
            ScriptedClimate::steady(21.5, 48.0),
            trigger,
            echo,
            RecordingDelay::default(),
            30_000,
        );

        let _ = sampler.refresh_distance();
        assert_eq!(*observed.borrow(), vec![30_000]);
    }
}
