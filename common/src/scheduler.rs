use std::{
    io::{self, Read, Write},
    net::{TcpListener, TcpStream},
    thread,
    time::{Duration, Instant},
};

use log::{info, warn};

use crate::{
    config::NodeConfig,
    display::RenderFrame,
    hal::{CharacterDisplay, ClimateSensor, DelayUs, DigitalOutput, HalError, PulseInput},
    router,
    sampler::SensorSampler,
    types::NodeState,
};

/// The cooperative loop. One thread of control runs every duty to
/// completion each iteration, so the shared [`NodeState`] needs no locks:
/// sample both sensors, advance the display, service at most one inbound
/// connection, reconcile the output pin.
pub struct SchedulerLoop<C, T, E, W, D, O> {
    sampler: SensorSampler<C, T, E, W>,
    display: D,
    output: O,
    state: NodeState,
    config: NodeConfig,
}

impl<C, T, E, W, D, O> SchedulerLoop<C, T, E, W, D, O>
where
    C: ClimateSensor,
    T: DigitalOutput,
    E: PulseInput,
    W: DelayUs,
    D: CharacterDisplay,
    O: DigitalOutput,
{
    pub fn new(
        sampler: SensorSampler<C, T, E, W>,
        display: D,
        output: O,
        mut config: NodeConfig,
    ) -> Self {
        config.sanitize();
        let state = NodeState::new(&config);
        Self {
            sampler,
            display,
            output,
            state,
            config,
        }
    }

    pub fn state(&self) -> &NodeState {
        &self.state
    }

    /// Runs forever. Monotonic seconds are derived from the process start;
    /// the fixed sleep caps the iteration rate and sets the marquee scroll
    /// speed.
    pub fn run(mut self, listener: TcpListener) -> ! {
        if let Err(err) = listener.set_nonblocking(true) {
            warn!("failed to make listener non-blocking: {err}");
        }

        info!("scheduler loop started");
        let started = Instant::now();
        loop {
            self.run_iteration(started.elapsed().as_secs(), &listener);
            thread::sleep(Duration::from_millis(self.config.loop_period_ms));
        }
    }

    /// One iteration, fixed order: refresh climate, refresh distance,
    /// repaint the display, accept and service at most one connection,
    /// apply the requested output level. Nothing in here takes the loop
    /// down; failures are logged and the next iteration retries naturally.
    pub fn run_iteration(&mut self, now_s: u64, listener: &TcpListener) {
        let (temperature, humidity) = self.sampler.refresh_climate();
        self.state.temperature = temperature;
        self.state.humidity = humidity;
        self.state.distance = self.sampler.refresh_distance();

        // The temperature mode samples again at repaint time, so the
        // painted value is as fresh as the repaint itself.
        if self.state.display.wants_climate_resample(now_s) {
            let (temperature, humidity) = self.sampler.refresh_climate();
            self.state.temperature = temperature;
            self.state.humidity = humidity;
        }

        let distance = self.state.distance.clone();
        let temperature = self.state.temperature.clone();
        if let Some(frame) = self.state.display.tick(now_s, &distance, &temperature) {
            if let Err(err) = self.paint(&frame) {
                warn!("display repaint failed: {err}");
            }
        }

        match listener.accept() {
            Ok((stream, peer)) => {
                if let Err(err) = self.service(stream) {
                    warn!("request from {peer} failed: {err}");
                }
            }
            Err(err) if err.kind() == io::ErrorKind::WouldBlock => {}
            Err(err) => warn!("accept failed: {err}"),
        }

        if self.output.is_set_high() != self.state.output_on {
            if let Err(err) = self.output.set(self.state.output_on) {
                warn!("output update failed: {err}");
            }
        }
    }

    /// Full repaint: the panel is small enough that clearing and rewriting
    /// beats tracking a diff.
    fn paint(&mut self, frame: &RenderFrame) -> Result<(), HalError> {
        self.display.clear()?;
        self.display.set_cursor(0, frame.row)?;
        self.display.write(&frame.text)
    }

    fn service(&mut self, mut stream: TcpStream) -> io::Result<()> {
        let timeout = Duration::from_millis(self.config.client_timeout_ms);
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;

        let mut request = vec![0_u8; self.config.recv_buffer_bytes];
        let read = stream.read(&mut request)?;
        let response = router::handle(&request[..read], &mut self.state);
        stream.write_all(&response.into_bytes())
        // Dropping the stream closes the connection.
    }
}
