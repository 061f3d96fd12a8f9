//! Fuzz target: inbound aim command parsing
//!
//! Feeds arbitrary broker payloads through `AimCommand::parse` and checks
//! that any accepted command lands inside the configured range.
//!
//! cargo fuzz run fuzz_aim_command

#![no_main]

use libfuzzer_sys::fuzz_target;
use sitewatch::aim::{Aim, AimCommand};

fuzz_target!(|data: &[u8]| {
    let Some(cmd) = AimCommand::parse(data) else {
        return;
    };
    let (lo, hi) = (20, 160);
    let aim = Aim::default().apply(cmd, lo, hi);
    assert!((lo..=hi).contains(&aim.pan));
    assert!((lo..=hi).contains(&aim.tilt));
});
