use std::net::TcpListener;

use anyhow::Context;
use tracing::info;

use roomsense_common::{
    hal::{CharacterDisplay, ClimateSample, ClimateSensor, DelayUs, DigitalOutput, HalError, PulseInput},
    NodeConfig, SchedulerLoop, SensorSampler,
};

/// Simulated DHT22: a slow waveform derived from the sample counter.
struct SimClimate {
    tick: u64,
}

impl ClimateSensor for SimClimate {
    fn measure(&mut self) -> Result<ClimateSample, HalError> {
        self.tick = self.tick.wrapping_add(1);
        Ok(ClimateSample {
            temperature_c: 21.5 + (self.tick % 8) as f32 * 0.25,
            humidity_pct: 48.0 + (self.tick % 6) as f32 * 0.5,
        })
    }
}

/// Simulated HC-SR04 echo: sweeps through a few round-trip times and drops
/// every eighth echo to exercise the no-echo path.
struct SimEcho {
    tick: u64,
}

impl PulseInput for SimEcho {
    fn measure_pulse_us(&mut self, _level: bool, _timeout_us: u32) -> Result<Option<u32>, HalError> {
        self.tick = self.tick.wrapping_add(1);
        if self.tick % 8 == 0 {
            return Ok(None);
        }
        Ok(Some(600 + (self.tick % 5) as u32 * 350))
    }
}

struct SimPin {
    name: &'static str,
    high: bool,
}

impl SimPin {
    fn new(name: &'static str) -> Self {
        Self { name, high: false }
    }
}

impl DigitalOutput for SimPin {
    fn set(&mut self, high: bool) -> Result<(), HalError> {
        if self.high != high {
            info!("{} -> {}", self.name, if high { "HIGH" } else { "LOW" });
        }
        self.high = high;
        Ok(())
    }

    fn is_set_high(&self) -> bool {
        self.high
    }
}

struct NoDelay;

impl DelayUs for NoDelay {
    fn delay_us(&mut self, _us: u32) {}
}

/// Logs frames instead of driving a panel.
struct ConsoleDisplay {
    row: u8,
}

impl CharacterDisplay for ConsoleDisplay {
    fn clear(&mut self) -> Result<(), HalError> {
        self.row = 0;
        Ok(())
    }

    fn set_cursor(&mut self, _col: u8, row: u8) -> Result<(), HalError> {
        self.row = row;
        Ok(())
    }

    fn write(&mut self, text: &str) -> Result<(), HalError> {
        info!("display[{}] {text}", self.row);
        Ok(())
    }
}

pub fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let mut config = NodeConfig::default();
    config.http_port = std::env::var("HTTP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let listener = TcpListener::bind(("127.0.0.1", config.http_port))
        .with_context(|| format!("failed to bind 127.0.0.1:{}", config.http_port))?;
    info!("simulated node listening on {}", listener.local_addr()?);

    let sampler = SensorSampler::new(
        SimClimate { tick: 0 },
        SimPin::new("trigger"),
        SimEcho { tick: 0 },
        NoDelay,
        config.echo_timeout_us,
    );
    let scheduler = SchedulerLoop::new(sampler, ConsoleDisplay { row: 0 }, SimPin::new("led"), config);

    scheduler.run(listener)
}
