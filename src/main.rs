//! SiteWatch firmware entry point.
//!
//! Wires the hexagonal core to the ESP32 peripherals and starts the three
//! station activities.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  SimulatedSensors  PanTiltServos  MqttPublisher  FileLogStore  │
//! │  (SensorSource)    (AimOutput)    (Publisher)    (LogStore)    │
//! │  JsonConfigFile    LogEventSink   WifiSupervisor StatusLed     │
//! │  (ConfigPort)      (EventSink)    (reconnect)    (renderer)    │
//! │  SystemWallClock + SntpService                                 │
//! │  (WallClock)                                                   │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │            StationService (pure logic)                 │    │
//! │  │  Filter · Alarm · Clog · ScanScheduler                 │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! │                                                                │
//! │  Uplink (publish-or-buffer) · DeliveryBuffer · LinkMonitor     │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Threads: `status` and `scan` on the APP core, `mqtt-rx` and the main
//! network loop on the PRO core next to the protocol stacks.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use anyhow::{Context, Result};
use log::{error, info, warn};

use esp_idf_hal::delay::FreeRtos;
use esp_idf_hal::gpio::{AnyOutputPin, PinDriver};
use esp_idf_hal::ledc::config::TimerConfig;
use esp_idf_hal::ledc::{LedcDriver, LedcTimerDriver, Resolution};
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::Hertz;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi};

use sitewatch::adapters::config_file::JsonConfigFile;
use sitewatch::adapters::file_log::FileLogStore;
use sitewatch::adapters::log_sink::LogEventSink;
use sitewatch::adapters::mqtt::{BrokerSettings, MqttPublisher};
use sitewatch::adapters::sntp::SntpService;
use sitewatch::adapters::time::{MonotonicClock, SystemWallClock};
use sitewatch::adapters::wifi::{EspWifiLink, WifiSupervisor};
use sitewatch::aim::CommandQueue;
use sitewatch::app::service::StationService;
use sitewatch::buffer::DeliveryBuffer;
use sitewatch::drivers::servo::PanTiltServos;
use sitewatch::drivers::status_led::StatusLed;
use sitewatch::drivers::task_pin::{self, Core};
use sitewatch::pins;
use sitewatch::runner;
use sitewatch::sensors::simulated::SimulatedSensors;
use sitewatch::status::StatusIndicator;
use sitewatch::topics;
use sitewatch::uplink::{Uplink, UplinkSink};

/// Cross-thread aim/config command queue.
static COMMANDS: CommandQueue = CommandQueue::new();
/// Raised to stop the worker threads.  Nothing raises it in production;
/// the station runs until reset.
static STOP: AtomicBool = AtomicBool::new(false);

const DEFAULT_BROKER_URL: &str = "mqtt://broker.local:1883";

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  SiteWatch v{}                       ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let clock = MonotonicClock::new();

    // ── 2. Storage + configuration ────────────────────────────
    if let Err(e) = mount_spiffs() {
        // Without a filesystem every enqueue fails; the station still runs,
        // it just cannot buffer.
        error!("SPIFFS mount failed ({}), running without delivery buffer", e);
    }
    let config = JsonConfigFile::new(pins::CONFIG_FILE).load_or_default();
    info!(
        "Config: site={} slow={}s distance={}s heartbeat={}s",
        config.site_id,
        config.slow_interval_secs,
        config.distance_interval_secs,
        config.heartbeat_interval_secs
    );

    // ── 3. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    // ── 4. WiFi ───────────────────────────────────────────────
    let esp_wifi = EspWifi::new(peripherals.modem, sys_loop.clone(), Some(nvs))?;
    let wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;
    let mut wifi = WifiSupervisor::new(
        EspWifiLink::new(wifi),
        option_env!("SITEWATCH_WIFI_SSID").unwrap_or("sitewatch"),
        option_env!("SITEWATCH_WIFI_PASS").unwrap_or(""),
    )?;
    if let Err(e) = wifi.connect(clock.now_ms()) {
        warn!("WiFi: initial connect failed ({}), retrying in background", e);
    }

    // Payloads go out without a timestamp until the first sync lands.
    let _sntp = match SntpService::start() {
        Ok(sntp) => {
            info!("SNTP: status {:?}", sntp.status());
            Some(sntp)
        }
        Err(e) => {
            warn!("SNTP: start failed ({}), payloads stay unstamped", e);
            None
        }
    };

    // ── 5. Uplink: MQTT + delivery buffer ─────────────────────
    let aim_topic = topics::aim_command(&config.site_id).map_err(sitewatch::error::Error::from)?;
    let client_id = format!("sitewatch-{}", config.site_id);
    let publisher = MqttPublisher::start(
        &BrokerSettings {
            url: option_env!("SITEWATCH_MQTT_URL").unwrap_or(DEFAULT_BROKER_URL),
            client_id: &client_id,
            username: option_env!("SITEWATCH_MQTT_USER"),
            password: option_env!("SITEWATCH_MQTT_PASS"),
        },
        &aim_topic,
        &COMMANDS,
    )
    .context("MQTT client start failed")?;

    let buffer = Arc::new(DeliveryBuffer::new(FileLogStore::new(pins::BUFFER_FILE)));
    let pending = buffer.pending();
    if pending > 0 {
        info!("Delivery buffer: {} record(s) survived reboot", pending);
    }
    let uplink = Uplink::new(publisher, buffer);

    // ── 6. Status LED renderer ────────────────────────────────
    let indicator = StatusIndicator::new();
    let led_pin = PinDriver::output(unsafe { AnyOutputPin::new(pins::STATUS_LED_GPIO) })?;
    let mut led = StatusLed::new(led_pin, FreeRtos, indicator.clone());
    task_pin::spawn_on_core(Core::App, 2, 3, "status\0", move || led.run(&STOP))?;

    // ── 7. Pan/tilt servos ────────────────────────────────────
    let timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::default()
            .frequency(Hertz(pins::SERVO_PWM_FREQ_HZ))
            // ~1.2 µs steps at 50 Hz
            .resolution(Resolution::Bits14),
    )?;
    // Both channels borrow the timer for the life of the program.
    let timer: &'static LedcTimerDriver<'static> = Box::leak(Box::new(timer));
    let pan = LedcDriver::new(peripherals.ledc.channel0, timer, unsafe {
        AnyOutputPin::new(pins::SERVO_PAN_GPIO)
    })?;
    let tilt = LedcDriver::new(peripherals.ledc.channel1, timer, unsafe {
        AnyOutputPin::new(pins::SERVO_TILT_GPIO)
    })?;
    let servos = PanTiltServos::new(pan, tilt);

    // ── 8. Scan thread ────────────────────────────────────────
    let service = StationService::new(config.clone(), SimulatedSensors::with_wobble(), clock.now_ms());
    let sink = (
        LogEventSink::new(),
        UplinkSink::new(uplink.clone(), &config).with_wall_clock(Arc::new(SystemWallClock)),
    );
    {
        let uplink = uplink.clone();
        let indicator = indicator.clone();
        task_pin::spawn_on_core(Core::App, 5, 8, "scan\0", move || {
            let clock = MonotonicClock::new();
            runner::run_scan(service, &COMMANDS, servos, sink, &indicator, &uplink, &clock, &STOP);
        })?;
    }

    // ── 9. Network loop (this thread) ─────────────────────────
    info!("System ready. Entering network loop.");
    runner::run_network(&uplink, &mut wifi, &clock, &STOP);
    Ok(())
}

/// Register the SPIFFS partition at [`pins::FS_BASE_PATH`].
fn mount_spiffs() -> Result<()> {
    let conf = esp_idf_svc::sys::esp_vfs_spiffs_conf_t {
        base_path: c"/spiffs".as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 4,
        format_if_mount_failed: true,
    };
    // SAFETY: `conf` points at 'static C strings and outlives the call.
    esp_idf_svc::sys::esp!(unsafe { esp_idf_svc::sys::esp_vfs_spiffs_register(&conf) })?;
    info!("SPIFFS mounted at {}", pins::FS_BASE_PATH);
    Ok(())
}
