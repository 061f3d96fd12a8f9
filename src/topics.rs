//! Broker topic assembly.
//!
//! ```text
//!   site/<site_id>/event/<channel>   alarm / clear transitions
//!   site/<site_id>/event/clog        clog detection
//!   site/<site_id>/heartbeat         periodic summary
//!   site/<site_id>/debug             diagnostics (debug_enable only)
//!   site/<site_id>/cmd/aim           inbound aim commands
//! ```
//!
//! Topics are built into fixed-capacity strings.  The site id is limited to
//! [`SITE_ID_MAX`](crate::config::SITE_ID_MAX) bytes, which always fits.

use core::fmt::Write;

use crate::error::CommsError;
use crate::sensors::Channel;

pub const TOPIC_MAX: usize = 64;

pub type Topic = heapless::String<TOPIC_MAX>;

fn build(site_id: &str, suffix: core::fmt::Arguments<'_>) -> Result<Topic, CommsError> {
    let mut t = Topic::new();
    write!(t, "site/{}/{}", site_id, suffix).map_err(|_| CommsError::EncodeFailed)?;
    Ok(t)
}

/// Alarm transitions for one channel.
pub fn event(site_id: &str, channel: Channel) -> Result<Topic, CommsError> {
    build(site_id, format_args!("event/{}", channel.name()))
}

pub fn clog(site_id: &str) -> Result<Topic, CommsError> {
    build(site_id, format_args!("event/clog"))
}

pub fn heartbeat(site_id: &str) -> Result<Topic, CommsError> {
    build(site_id, format_args!("heartbeat"))
}

pub fn debug(site_id: &str) -> Result<Topic, CommsError> {
    build(site_id, format_args!("debug"))
}

/// Inbound aim command topic (subscribed to by the broker adapter).
pub fn aim_command(site_id: &str) -> Result<Topic, CommsError> {
    build(site_id, format_args!("cmd/aim"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_layout() {
        assert_eq!(event("pit-3", Channel::Eco2).unwrap(), "site/pit-3/event/eco2");
        assert_eq!(clog("pit-3").unwrap(), "site/pit-3/event/clog");
        assert_eq!(heartbeat("UNDEF").unwrap(), "site/UNDEF/heartbeat");
        assert_eq!(debug("x").unwrap(), "site/x/debug");
        assert_eq!(aim_command("x").unwrap(), "site/x/cmd/aim");
    }

    #[test]
    fn longest_site_id_fits() {
        let site = "a".repeat(crate::config::SITE_ID_MAX);
        assert!(event(&site, Channel::Pressure).is_ok());
    }

    #[test]
    fn oversized_site_id_is_an_encode_error() {
        let site = "a".repeat(TOPIC_MAX);
        assert_eq!(heartbeat(&site), Err(CommsError::EncodeFailed));
    }
}
