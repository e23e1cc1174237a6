//! Finding SIM7600 modems among the serial ports the OS reports.
//!
//! A SIM7600 exposes several USB serial interfaces; only one of them answers
//! AT commands. Each candidate is opened, sent `AT`, and asked for `ATI`.

use crate::engine::AtEngine;
use crate::error::AtResult;
use crate::identity::DeviceIdentity;
use crate::lock::LockRegistry;
use crate::port::PortError;
use crate::transport::Transport;
use serde::Serialize;
use serialport::SerialPortType;
use std::time::Duration;
use tracing::{debug, info};

/// SIMCom's USB vendor id.
pub const SIMCOM_USB_VID: u16 = 0x1e0e;

/// A port that answered `ATI` as a SIMCom module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiscoveredDevice {
    pub port_name: String,
    /// `0x1e0e:0x9001`, for USB ports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usb_id: Option<String>,
    pub identity: DeviceIdentity,
}

/// Ask the modem behind an engine who it is.
///
/// `Ok(None)` means the port is not an AT port or not a SIMCom module.
pub fn probe_engine(engine: &AtEngine) -> AtResult<Option<DeviceIdentity>> {
    if !engine.verify()? {
        debug!(port = engine.port(), "no answer to AT");
        return Ok(None);
    }
    let identity = engine.identify()?;
    Ok(identity.is_simcom().then_some(identity))
}

/// Open `port` and probe it.
pub fn probe(
    port: &str,
    baud_rate: u32,
    registry: &LockRegistry,
    timeout: Duration,
) -> AtResult<Option<DeviceIdentity>> {
    let transport = Transport::open(port, baud_rate)?;
    let engine = AtEngine::with_registry(transport, registry)?.with_default_timeout(timeout);
    let identity = probe_engine(&engine);
    engine.close();
    identity
}

/// Probe every serial port the OS lists. Ports that fail to open or answer
/// are skipped.
pub fn discover(
    baud_rate: u32,
    registry: &LockRegistry,
    timeout: Duration,
) -> Result<Vec<DiscoveredDevice>, PortError> {
    let mut ports = serialport::available_ports()?;
    // SIMCom USB interfaces first.
    ports.sort_by_key(|p| !matches!(&p.port_type, SerialPortType::UsbPort(usb) if usb.vid == SIMCOM_USB_VID));
    info!(candidates = ports.len(), "scanning serial ports");

    let mut found = Vec::new();
    for info in ports {
        let usb_id = match &info.port_type {
            SerialPortType::UsbPort(usb) => Some(format!("0x{:04x}:0x{:04x}", usb.vid, usb.pid)),
            _ => None,
        };
        match probe(&info.port_name, baud_rate, registry, timeout) {
            Ok(Some(identity)) => {
                info!(port = %info.port_name, model = ?identity.model, "found modem");
                found.push(DiscoveredDevice {
                    port_name: info.port_name,
                    usb_id,
                    identity,
                });
            }
            Ok(None) => debug!(port = %info.port_name, "not a SIMCom AT port"),
            Err(e) => debug!(port = %info.port_name, error = %e, "probe failed"),
        }
    }
    Ok(found)
}
