//! SNTP time sync (device only).
//!
//! Keeps the system clock disciplined against `pool.ntp.org` so
//! [`SystemWallClock`](super::time::SystemWallClock) can stamp payloads.
//! The lwIP client re-polls on its own every [`RESYNC_INTERVAL_MS`]; the
//! service only has to stay alive.

use esp_idf_svc::sntp::{EspSntp, SyncStatus};
use esp_idf_svc::sys::EspError;
use log::info;

/// Resync period.
pub const RESYNC_INTERVAL_MS: u32 = 3_600_000;

/// Running SNTP client.  Dropping it stops time sync.
pub struct SntpService {
    sntp: EspSntp<'static>,
}

impl SntpService {
    /// Start the client.  Needs a network interface; sync completes in the
    /// background once WiFi is up.
    pub fn start() -> Result<Self, EspError> {
        // SAFETY: plain setter on the lwIP SNTP module, called before it starts.
        unsafe { esp_idf_svc::sys::sntp_set_sync_interval(RESYNC_INTERVAL_MS) };
        let sntp = EspSntp::new_default()?;
        info!("SNTP: started, resync every {} min", RESYNC_INTERVAL_MS / 60_000);
        Ok(Self { sntp })
    }

    /// Current lwIP sync status, for the boot log.
    pub fn status(&self) -> SyncStatus {
        self.sntp.get_sync_status()
    }
}
