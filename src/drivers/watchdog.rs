//! Task Watchdog Timer (TWDT) driver.
//!
//! Each long-running thread (scan loop, network loop) subscribes itself and
//! must call `feed()` more often than the timeout, otherwise the device
//! resets.  Sleeps in those loops are bounded well below the timeout.

#[cfg(feature = "espidf")]
use esp_idf_svc::sys::*;

/// Default reset timeout.
pub const WATCHDOG_TIMEOUT_MS: u32 = 10_000;

pub struct Watchdog {
    #[cfg(feature = "espidf")]
    subscribed: bool,
}

impl Watchdog {
    /// Subscribe the calling thread to the TWDT.
    pub fn subscribe(name: &str) -> Self {
        #[cfg(feature = "espidf")]
        {
            unsafe {
                let cfg = esp_task_wdt_config_t {
                    timeout_ms: WATCHDOG_TIMEOUT_MS,
                    idle_core_mask: 0,
                    trigger_panic: true,
                };
                let ret = esp_task_wdt_reconfigure(&cfg);
                if ret != ESP_OK {
                    log::debug!("TWDT reconfigure returned {} (already configured)", ret);
                }

                let ret = esp_task_wdt_add(core::ptr::null_mut());
                let subscribed = ret == ESP_OK;
                if subscribed {
                    log::info!("Watchdog: '{}' subscribed ({} ms)", name, WATCHDOG_TIMEOUT_MS);
                } else {
                    log::warn!("Watchdog: '{}' failed to subscribe ({})", name, ret);
                }
                Self { subscribed }
            }
        }

        #[cfg(not(feature = "espidf"))]
        {
            log::debug!("Watchdog(sim): '{}' no-op", name);
            Self {}
        }
    }

    pub fn feed(&self) {
        #[cfg(feature = "espidf")]
        {
            if self.subscribed {
                unsafe {
                    esp_task_wdt_reset();
                }
            }
        }
    }
}

#[cfg(feature = "espidf")]
impl Drop for Watchdog {
    fn drop(&mut self) {
        if self.subscribed {
            unsafe {
                esp_task_wdt_delete(core::ptr::null_mut());
            }
        }
    }
}
