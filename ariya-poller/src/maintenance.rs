//! One-off adapter maintenance
//!
//! Some WiFi adapters (iCar Pro and clones) go to sleep shortly after the car
//! is parked, which makes every cycle report the adapter unreachable. Writing
//! programmable parameter 0x0E turns that power saving off.

use ariya_elm327_lib::commands::DISABLE_POWER_SAVING_SEQUENCE;
use log::info;

use crate::config::Timing;
use crate::error::PollError;
use crate::transport::{AdapterConnection, Endpoint, Transport};

/// Program the adapter's power-saving parameter
///
/// Returns each command with the adapter's reply. The new setting is applied
/// after the adapter is power-cycled.
pub fn disable_power_saving<T: Transport>(
    transport: &T,
    endpoint: &Endpoint,
    timing: &Timing,
) -> Result<Vec<(&'static str, Option<String>)>, PollError> {
    info!("Disabling power saving on adapter {endpoint}");
    let mut conn = transport.open(endpoint, timing.connect_timeout())?;

    let mut replies = Vec::with_capacity(DISABLE_POWER_SAVING_SEQUENCE.len());
    for cmd in DISABLE_POWER_SAVING_SEQUENCE {
        let reply = conn.send(cmd)?;
        replies.push((cmd, reply));
    }

    info!("Power saving parameter written; power-cycle the adapter to apply it");
    Ok(replies)
}
