use std::{
    net::TcpListener,
    thread,
    time::{Duration, Instant},
};

use anyhow::{anyhow, Context};
use dht_sensor::dht22;
use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_hal::{
    delay::Ets,
    gpio::{
        AnyIOPin, AnyInputPin, AnyOutputPin, IOPin, Input, InputOutput, InputPin, Output,
        OutputPin, PinDriver, Pull,
    },
    i2c::{I2cConfig, I2cDriver},
    units::FromValueType,
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    log::EspLogger,
    nvs::EspDefaultNvsPartition,
    wifi::{BlockingWifi, EspWifi},
};
use hd44780_driver::{bus::I2CBus, HD44780};
use log::{info, warn};

use roomsense_common::{
    hal::{
        CharacterDisplay, ClimateSample, ClimateSensor, DelayUs, DigitalOutput, HalError,
        PulseInput,
    },
    NodeConfig, SchedulerLoop, SensorSampler,
};

const LED_PIN: i32 = 2;
const DHT_PIN: i32 = 4;
const TRIGGER_PIN: i32 = 27;
const ECHO_PIN: i32 = 26;
const LCD_I2C_ADDR: u8 = 0x27;

const WIFI_CONNECT_ATTEMPTS: u32 = 5;
const WIFI_RETRY_DELAY_MS: u64 = 3_000;
const WIFI_RESTART_GRACE_MS: u64 = 300_000;
const WATCHDOG_TIMEOUT_SEC: u32 = 90;

/// DHT22 on a single open-drain line, released high between reads.
struct Dht22Sensor {
    pin: PinDriver<'static, AnyIOPin, InputOutput>,
    delay: Ets,
}

impl Dht22Sensor {
    fn new(pin: AnyIOPin) -> anyhow::Result<Self> {
        let mut pin = PinDriver::input_output_od(pin)?;
        pin.set_pull(Pull::Up)?;
        pin.set_high()?;
        Ok(Self { pin, delay: Ets })
    }
}

impl ClimateSensor for Dht22Sensor {
    fn measure(&mut self) -> Result<ClimateSample, HalError> {
        self.pin
            .set_high()
            .map_err(|err| HalError::SensorIo(format!("dht line release failed: {err}")))?;

        match dht22::blocking::read(&mut self.delay, &mut self.pin) {
            Ok(reading) => Ok(ClimateSample {
                temperature_c: reading.temperature,
                humidity_pct: reading.relative_humidity,
            }),
            Err(err) => Err(HalError::SensorIo(format!("dht22 read failed: {err:?}"))),
        }
    }
}

struct OutPin {
    pin: PinDriver<'static, AnyOutputPin, Output>,
}

impl OutPin {
    fn new(pin: AnyOutputPin) -> anyhow::Result<Self> {
        Ok(Self {
            pin: PinDriver::output(pin)?,
        })
    }
}

impl DigitalOutput for OutPin {
    fn set(&mut self, high: bool) -> Result<(), HalError> {
        self.pin
            .set_level(high.into())
            .map_err(|err| HalError::Gpio(format!("{err}")))
    }

    fn is_set_high(&self) -> bool {
        self.pin.is_set_high()
    }
}

struct EchoPin {
    pin: PinDriver<'static, AnyInputPin, Input>,
}

impl EchoPin {
    fn new(pin: AnyInputPin) -> anyhow::Result<Self> {
        Ok(Self {
            pin: PinDriver::input(pin)?,
        })
    }
}

impl PulseInput for EchoPin {
    // Wait for the level, then time how long the pin holds it. The timeout
    // applies to each phase separately.
    fn measure_pulse_us(&mut self, level: bool, timeout_us: u32) -> Result<Option<u32>, HalError> {
        let timeout = Duration::from_micros(u64::from(timeout_us));

        let wait_deadline = Instant::now() + timeout;
        while self.pin.is_high() != level {
            if Instant::now() >= wait_deadline {
                return Ok(None);
            }
        }

        let pulse_start = Instant::now();
        let pulse_deadline = pulse_start + timeout;
        while self.pin.is_high() == level {
            if Instant::now() >= pulse_deadline {
                return Ok(None);
            }
        }

        Ok(Some(pulse_start.elapsed().as_micros() as u32))
    }
}

struct EtsDelay;

impl DelayUs for EtsDelay {
    fn delay_us(&mut self, us: u32) {
        Ets::delay_us(us);
    }
}

/// 16x2 HD44780 panel behind a PCF8574 I2C backpack.
struct PanelDisplay {
    lcd: HD44780<I2CBus<I2cDriver<'static>>>,
    delay: Ets,
}

impl PanelDisplay {
    fn new(i2c: I2cDriver<'static>) -> anyhow::Result<Self> {
        let mut delay = Ets;
        let mut lcd = HD44780::new_i2c(i2c, LCD_I2C_ADDR, &mut delay)
            .map_err(|err| anyhow!("lcd init failed: {err:?}"))?;
        lcd.reset(&mut delay)
            .map_err(|err| anyhow!("lcd reset failed: {err:?}"))?;
        lcd.clear(&mut delay)
            .map_err(|err| anyhow!("lcd clear failed: {err:?}"))?;
        Ok(Self { lcd, delay })
    }
}

impl CharacterDisplay for PanelDisplay {
    fn clear(&mut self) -> Result<(), HalError> {
        self.lcd
            .clear(&mut self.delay)
            .map_err(|err| HalError::Display(format!("{err:?}")))
    }

    fn set_cursor(&mut self, col: u8, row: u8) -> Result<(), HalError> {
        self.lcd
            .set_cursor_xy((col, row), &mut self.delay)
            .map_err(|err| HalError::Display(format!("{err:?}")))
    }

    fn write(&mut self, text: &str) -> Result<(), HalError> {
        self.lcd
            .write_str(text, &mut self.delay)
            .map_err(|err| HalError::Display(format!("{err:?}")))
    }
}

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;
    let Peripherals {
        modem, pins, i2c0, ..
    } = Peripherals::take()?;

    let mut config = NodeConfig::default();
    config.sanitize();

    let wifi = connect_wifi(modem, sys_loop, nvs_partition).context("wifi startup failed")?;
    disable_wifi_power_save();

    init_watchdog(WATCHDOG_TIMEOUT_SEC)?;
    add_current_task_to_watchdog()?;

    let climate =
        Dht22Sensor::new(pins.gpio4.downgrade()).context("failed to initialize DHT22")?;
    let trigger = OutPin::new(pins.gpio27.downgrade_output())
        .context("failed to initialize ultrasonic trigger")?;
    let echo = EchoPin::new(pins.gpio26.downgrade_input())
        .context("failed to initialize ultrasonic echo")?;
    let led =
        OutPin::new(pins.gpio2.downgrade_output()).context("failed to initialize LED output")?;

    let i2c_config = I2cConfig::new().baudrate(400.kHz().into());
    let i2c = I2cDriver::new(i2c0, pins.gpio21, pins.gpio22, &i2c_config)
        .context("failed to initialize I2C bus")?;
    let display = PanelDisplay::new(i2c).context("failed to initialize LCD")?;

    let listener = TcpListener::bind(("0.0.0.0", config.http_port))
        .with_context(|| format!("failed to bind port {}", config.http_port))?;
    listener.set_nonblocking(true)?;

    info!(
        "node ready: led GPIO{LED_PIN}, dht GPIO{DHT_PIN}, trigger GPIO{TRIGGER_PIN}, echo GPIO{ECHO_PIN}, http port {}",
        config.http_port
    );

    let loop_period = Duration::from_millis(config.loop_period_ms);
    let sampler = SensorSampler::new(climate, trigger, echo, EtsDelay, config.echo_timeout_us);
    let mut scheduler = SchedulerLoop::new(sampler, display, led, config);

    // Keep the wifi driver alive for the program lifetime.
    let _wifi = wifi;
    let started = Instant::now();
    let mut wifi_disconnected_since: Option<Instant> = None;

    loop {
        feed_watchdog();
        maintain_wifi_health(&mut wifi_disconnected_since);
        scheduler.run_iteration(started.elapsed().as_secs(), &listener);
        thread::sleep(loop_period);
    }
}

fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
) -> anyhow::Result<EspWifi<'static>> {
    let ssid = option_env!("WIFI_SSID").unwrap_or("CHANGE_ME");
    let password = option_env!("WIFI_PASS").unwrap_or("");

    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sys_loop)?;

    let auth_method = if password.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: ssid.try_into().map_err(|_| anyhow!("wifi ssid too long"))?,
        password: password
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to `{ssid}`");

    let mut last_err = None;
    for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
        info!("wifi connect attempt {attempt}/{WIFI_CONNECT_ATTEMPTS}");
        match wifi.connect() {
            Ok(()) => match wifi.wait_netif_up() {
                Ok(()) => {
                    info!("wifi connected and netif up on attempt {attempt}");
                    last_err = None;
                    break;
                }
                Err(err) => {
                    warn!("wifi netif up failed on attempt {attempt}: {err:#}");
                    last_err = Some(err);
                }
            },
            Err(err) => {
                warn!("wifi connect failed on attempt {attempt}: {err:#}");
                last_err = Some(err);
            }
        }

        if attempt < WIFI_CONNECT_ATTEMPTS {
            let _ = wifi.disconnect();
            thread::sleep(Duration::from_millis(WIFI_RETRY_DELAY_MS));
        }
    }

    match last_err {
        None => Ok(esp_wifi),
        Some(err) => Err(anyhow::Error::from(err)
            .context(format!("all {WIFI_CONNECT_ATTEMPTS} wifi connect attempts failed"))),
    }
}

fn init_watchdog(timeout_sec: u32) -> anyhow::Result<()> {
    let config = esp_idf_svc::sys::esp_task_wdt_config_t {
        timeout_ms: timeout_sec.saturating_mul(1000),
        idle_core_mask: 0,
        trigger_panic: true,
    };
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_init(&config) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_init failed with code {}", rc))
}

fn add_current_task_to_watchdog() -> anyhow::Result<()> {
    let rc = unsafe { esp_idf_svc::sys::esp_task_wdt_add(core::ptr::null_mut()) };
    if rc == esp_idf_svc::sys::ESP_OK || rc == esp_idf_svc::sys::ESP_ERR_INVALID_STATE {
        return Ok(());
    }
    Err(anyhow!("esp_task_wdt_add failed with code {}", rc))
}

fn feed_watchdog() {
    let _ = unsafe { esp_idf_svc::sys::esp_task_wdt_reset() };
}

fn disable_wifi_power_save() {
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_set_ps(0) };
    if rc == esp_idf_svc::sys::ESP_OK {
        info!("wifi power save disabled");
    } else {
        warn!("failed to disable wifi power save: esp_err_t={rc}");
    }
}

fn is_wifi_station_connected() -> bool {
    let mut ap_info = esp_idf_svc::sys::wifi_ap_record_t::default();
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_sta_get_ap_info(&mut ap_info) };
    rc == esp_idf_svc::sys::ESP_OK
}

fn maintain_wifi_health(wifi_disconnected_since: &mut Option<Instant>) {
    if is_wifi_station_connected() {
        *wifi_disconnected_since = None;
        return;
    }

    match wifi_disconnected_since {
        Some(disconnected_since)
            if disconnected_since.elapsed().as_millis() as u64 >= WIFI_RESTART_GRACE_MS =>
        {
            warn!(
                "wifi disconnected for {}s; restarting device for recovery",
                WIFI_RESTART_GRACE_MS / 1000
            );
            thread::sleep(Duration::from_millis(100));
            unsafe { esp_idf_svc::sys::esp_restart() };
        }
        Some(_) => {}
        None => *wifi_disconnected_since = Some(Instant::now()),
    }
}
