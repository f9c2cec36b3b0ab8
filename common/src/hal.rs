use thiserror::Error;

/// Faults surfaced by the hardware seam. All of them are expected during
/// normal operation; callers degrade to sentinel readings or skip a frame
/// and the loop keeps running.
#[derive(Debug, Error)]
pub enum HalError {
    #[error("sensor i/o failure: {0}")]
    SensorIo(String),
    #[error("gpio failure: {0}")]
    Gpio(String),
    #[error("display failure: {0}")]
    Display(String),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClimateSample {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// Combined temperature/humidity sensor. One `measure` call triggers a
/// conversion and reads both values.
pub trait ClimateSensor {
    fn measure(&mut self) -> Result<ClimateSample, HalError>;
}

/// A digital output pin with readback of the last driven level.
pub trait DigitalOutput {
    fn set(&mut self, high: bool) -> Result<(), HalError>;
    fn is_set_high(&self) -> bool;
}

/// A digital input that can time a pulse: waits for the pin to reach
/// `level`, then measures how long it stays there. `Ok(None)` when either
/// phase runs past `timeout_us`.
pub trait PulseInput {
    fn measure_pulse_us(&mut self, level: bool, timeout_us: u32) -> Result<Option<u32>, HalError>;
}

/// Busy-wait microsecond delay.
pub trait DelayUs {
    fn delay_us(&mut self, us: u32);
}

/// A character display addressed by column and row.
pub trait CharacterDisplay {
    fn clear(&mut self) -> Result<(), HalError>;
    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), HalError>;
    fn write(&mut self, text: &str) -> Result<(), HalError>;
}
