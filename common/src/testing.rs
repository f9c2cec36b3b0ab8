//! In-crate hardware mocks shared by the unit tests.

use std::{cell::RefCell, rc::Rc};

use crate::hal::{
    CharacterDisplay, ClimateSample, ClimateSensor, DelayUs, DigitalOutput, HalError, PulseInput,
};

/// Output pin whose level and transition history stay observable after the
/// pin has been moved into the code under test.
#[derive(Clone, Default)]
pub(crate) struct SharedPin(pub Rc<RefCell<PinLog>>);

#[derive(Default)]
pub(crate) struct PinLog {
    pub level: bool,
    pub transitions: Vec<bool>,
}

impl DigitalOutput for SharedPin {
    fn set(&mut self, high: bool) -> Result<(), HalError> {
        let mut log = self.0.borrow_mut();
        log.level = high;
        log.transitions.push(high);
        Ok(())
    }

    fn is_set_high(&self) -> bool {
        self.0.borrow().level
    }
}

pub(crate) struct ScriptedClimate {
    result: Result<ClimateSample, String>,
    pub calls: Rc<RefCell<usize>>,
}

impl ScriptedClimate {
    pub fn steady(temperature_c: f32, humidity_pct: f32) -> Self {
        Self {
            result: Ok(ClimateSample {
                temperature_c,
                humidity_pct,
            }),
            calls: Rc::default(),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(message.to_string()),
            calls: Rc::default(),
        }
    }
}

impl ClimateSensor for ScriptedClimate {
    fn measure(&mut self) -> Result<ClimateSample, HalError> {
        *self.calls.borrow_mut() += 1;
        self.result.clone().map_err(HalError::SensorIo)
    }
}

pub(crate) struct ScriptedEcho {
    response: Option<u32>,
    pub observed_timeouts: Rc<RefCell<Vec<u32>>>,
}

impl ScriptedEcho {
    pub fn echoing(round_trip_us: u32) -> Self {
        Self {
            response: Some(round_trip_us),
            observed_timeouts: Rc::default(),
        }
    }

    pub fn timing_out() -> Self {
        Self {
            response: None,
            observed_timeouts: Rc::default(),
        }
    }
}

impl PulseInput for ScriptedEcho {
    fn measure_pulse_us(&mut self, _level: bool, timeout_us: u32) -> Result<Option<u32>, HalError> {
        self.observed_timeouts.borrow_mut().push(timeout_us);
        Ok(self.response)
    }
}

#[derive(Clone, Default)]
pub(crate) struct RecordingDelay {
    pub delays_us: Rc<RefCell<Vec<u32>>>,
}

impl DelayUs for RecordingDelay {
    fn delay_us(&mut self, us: u32) {
        self.delays_us.borrow_mut().push(us);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum DisplayOp {
    Clear,
    Cursor(u8, u8),
    Write(String),
}

/// Display that records the operation stream instead of driving a panel.
#[derive(Clone, Default)]
pub(crate) struct FrameLog(pub Rc<RefCell<Vec<DisplayOp>>>);

impl CharacterDisplay for FrameLog {
    fn clear(&mut self) -> Result<(), HalError> {
        self.0.borrow_mut().push(DisplayOp::Clear);
        Ok(())
    }

    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), HalError> {
        self.0.borrow_mut().push(DisplayOp::Cursor(col, row));
        Ok(())
    }

    fn write(&mut self, text: &str) -> Result<(), HalError> {
        self.0.borrow_mut().push(DisplayOp::Write(text.to_string()));
        Ok(())
    }
}
