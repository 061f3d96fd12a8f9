//! WiFi station-mode supervisor.
//!
//! [`WifiSupervisor`] owns the connection state machine and the reconnect
//! policy.  The radio itself sits behind [`WifiLink`] so the policy runs on
//! the host against a fake link.
//!
//! ## cfg gating
//!
//! - **`feature = "espidf"`**: [`EspWifiLink`] drives `esp_idf_svc::wifi`.
//! - **all builds**: the supervisor and credential validation.
//!
//! ## Reconnection policy
//!
//! On disconnect the supervisor waits an exponential backoff (2 s → 4 s →
//! 8 s … capped at 60 s) between attempts.  The MQTT client reconnects on
//! its own once the netif is back, which is what the uplink's link monitor
//! observes.

use core::fmt;
use log::{error, info, warn};

// ───────────────────────────────────────────────────────────────
// Errors
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityError {
    NoCredentials,
    InvalidSsid,
    InvalidPassword,
    ConnectionFailed,
}

impl fmt::Display for ConnectivityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no WiFi credentials configured"),
            Self::InvalidSsid => write!(f, "SSID invalid (must be 1-32 printable ASCII bytes)"),
            Self::InvalidPassword => write!(f, "password invalid (must be 8-64 bytes for WPA2, or empty for open)"),
            Self::ConnectionFailed => write!(f, "WiFi connection failed"),
        }
    }
}

impl std::error::Error for ConnectivityError {}

/// Radio operations the supervisor needs.
pub trait WifiLink {
    /// Configure, associate and wait for an IP.  Blocking.
    fn connect(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError>;
    fn is_connected(&self) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Connection state
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WifiState {
    Disconnected,
    Connected,
    Reconnecting { attempt: u32 },
}

const INITIAL_BACKOFF_SECS: u32 = 2;
const MAX_BACKOFF_SECS: u32 = 60;

// ───────────────────────────────────────────────────────────────
// Validation
// ───────────────────────────────────────────────────────────────

fn is_printable_ascii(s: &str) -> bool {
    s.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

fn validate_ssid(ssid: &str) -> Result<(), ConnectivityError> {
    if ssid.is_empty() || ssid.len() > 32 || !is_printable_ascii(ssid) {
        return Err(ConnectivityError::InvalidSsid);
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), ConnectivityError> {
    if password.is_empty() {
        return Ok(());
    }
    if password.len() < 8 || password.len() > 64 {
        return Err(ConnectivityError::InvalidPassword);
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Supervisor
// ───────────────────────────────────────────────────────────────

pub struct WifiSupervisor<L: WifiLink> {
    link: L,
    state: WifiState,
    ssid: heapless::String<32>,
    password: heapless::String<64>,
    backoff_secs: u32,
    next_attempt_ms: u64,
}

impl<L: WifiLink> WifiSupervisor<L> {
    pub fn new(link: L, ssid: &str, password: &str) -> Result<Self, ConnectivityError> {
        validate_ssid(ssid)?;
        validate_password(password)?;
        let mut s = heapless::String::new();
        s.push_str(ssid).map_err(|_| ConnectivityError::InvalidSsid)?;
        let mut p = heapless::String::new();
        p.push_str(password).map_err(|_| ConnectivityError::InvalidPassword)?;
        Ok(Self {
            link,
            state: WifiState::Disconnected,
            ssid: s,
            password: p,
            backoff_secs: INITIAL_BACKOFF_SECS,
            next_attempt_ms: 0,
        })
    }

    pub fn state(&self) -> WifiState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == WifiState::Connected && self.link.is_connected()
    }

    /// First connection attempt.  On failure the supervisor is left in
    /// `Reconnecting` and [`poll`](Self::poll) keeps trying.
    pub fn connect(&mut self, now_ms: u64) -> Result<(), ConnectivityError> {
        if self.ssid.is_empty() {
            return Err(ConnectivityError::NoCredentials);
        }
        info!("WiFi: connecting to '{}'", self.ssid);
        match self.link.connect(&self.ssid, &self.password) {
            Ok(()) => {
                self.on_connected();
                Ok(())
            }
            Err(e) => {
                error!("WiFi: connection failed: {}", e);
                self.schedule_retry(0, now_ms);
                Err(e)
            }
        }
    }

    /// Drive the reconnect state machine.  Cheap when connected.
    pub fn poll(&mut self, now_ms: u64) {
        match self.state {
            WifiState::Connected => {
                if !self.link.is_connected() {
                    warn!("WiFi: connection lost, entering reconnect");
                    self.backoff_secs = INITIAL_BACKOFF_SECS;
                    self.schedule_retry(0, now_ms);
                }
            }
            WifiState::Reconnecting { attempt } if now_ms >= self.next_attempt_ms => {
                info!("WiFi: reconnect attempt {} (backoff {}s)", attempt, self.backoff_secs);
                match self.link.connect(&self.ssid, &self.password) {
                    Ok(()) => self.on_connected(),
                    Err(_) => {
                        self.backoff_secs = (self.backoff_secs * 2).min(MAX_BACKOFF_SECS);
                        self.schedule_retry(attempt + 1, now_ms);
                    }
                }
            }
            _ => {}
        }
    }

    fn on_connected(&mut self) {
        self.state = WifiState::Connected;
        self.backoff_secs = INITIAL_BACKOFF_SECS;
        info!("WiFi: connected");
    }

    fn schedule_retry(&mut self, attempt: u32, now_ms: u64) {
        self.state = WifiState::Reconnecting { attempt };
        self.next_attempt_ms = now_ms + u64::from(self.backoff_secs) * 1000;
    }
}

// ───────────────────────────────────────────────────────────────
// ESP-IDF link
// ───────────────────────────────────────────────────────────────

#[cfg(feature = "espidf")]
pub use esp::EspWifiLink;

#[cfg(feature = "espidf")]
mod esp {
    use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};

    use super::{ConnectivityError, WifiLink};

    pub struct EspWifiLink {
        wifi: BlockingWifi<EspWifi<'static>>,
    }

    impl EspWifiLink {
        pub fn new(wifi: BlockingWifi<EspWifi<'static>>) -> Self {
            Self { wifi }
        }
    }

    impl WifiLink for EspWifiLink {
        fn connect(&mut self, ssid: &str, password: &str) -> Result<(), ConnectivityError> {
            let auth_method = if password.is_empty() {
                AuthMethod::None
            } else {
                AuthMethod::WPAWPA2Personal
            };
            let conf = Configuration::Client(ClientConfiguration {
                ssid: ssid.try_into().map_err(|_| ConnectivityError::InvalidSsid)?,
                password: password
                    .try_into()
                    .map_err(|_| ConnectivityError::InvalidPassword)?,
                auth_method,
                ..Default::default()
            });
            let fail = |e: esp_idf_svc::sys::EspError| {
                log::warn!("WiFi: {:?}", e);
                ConnectivityError::ConnectionFailed
            };
            self.wifi.set_configuration(&conf).map_err(fail)?;
            if !self.wifi.is_started().map_err(fail)? {
                self.wifi.start().map_err(fail)?;
            }
            let _ = self.wifi.disconnect();
            self.wifi.connect().map_err(fail)?;
            self.wifi.wait_netif_up().map_err(fail)
        }

        fn is_connected(&self) -> bool {
            self.wifi.is_connected().unwrap_or(false)
        }
    }
}
