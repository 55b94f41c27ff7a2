//! Simulated adapter plus vehicle, for the mock server and tests
//!
//! `MockVehicle` answers one connection's commands the way an ELM327 plugged
//! into an Ariya does: AT commands go through `ClientState`, `ATRV` reports
//! the 12V battery, and the two vendor reads are answered by the ECU the
//! current header addresses.

use crate::commands::{
    EXTENDED_SESSION, HEADER_FUNCTIONAL, HEADER_HV_ECU, READ_HV_VOLTAGE, READ_SOC, READ_VOLTAGE,
    TESTER_PRESENT,
};
use crate::ClientState;
use log::debug;
use std::io::{self, Read, Write};

/// Reply header of the BMS answering functional requests
const BMS_REPLY_HEADER: &str = "18DAF1DB";
/// Reply header of the ECU at 0xDA
const HV_ECU_REPLY_HEADER: &str = "18DAF1DA";

/// Values the simulated vehicle reports
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VehicleProfile {
    /// 12V auxiliary battery, reported by ATRV
    pub aux_voltage: f64,
    /// BMS state of charge in percent
    pub soc_percent: f64,
    /// HV pack voltage
    pub hv_voltage: f64,
    /// HV voltage reads answer NO DATA until an extended session was opened
    pub require_wakeup: bool,
}

impl Default for VehicleProfile {
    fn default() -> Self {
        Self {
            aux_voltage: 12.9,
            soc_percent: 80.0,
            hv_voltage: 360.0,
            require_wakeup: false,
        }
    }
}

/// One adapter connection to the simulated vehicle
#[derive(Debug, Clone)]
pub struct MockVehicle {
    profile: VehicleProfile,
    state: ClientState,
    awake: bool,
}

impl MockVehicle {
    pub fn new(profile: VehicleProfile) -> Self {
        Self {
            profile,
            state: ClientState::new(),
            awake: false,
        }
    }

    /// Adapter settings of this connection
    pub fn client_state(&self) -> &ClientState {
        &self.state
    }

    /// Whether an extended diagnostic session has been opened
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Process one command (without its terminator) and return the reply,
    /// including line endings and the trailing prompt
    pub fn process_command(&mut self, command: &str) -> String {
        let cmd = command.trim().to_uppercase();
        let le = self.state.line_ending();

        if cmd == READ_VOLTAGE {
            return format!("{le}{:.1}V{le}>", self.profile.aux_voltage);
        }
        if cmd.starts_with("AT") {
            return self.state.handle_at_command(&cmd);
        }

        let header = self
            .state
            .header
            .as_deref()
            .map(|h| format!("ATSH{h}"))
            .unwrap_or_default();

        let frame = match (header.as_str(), cmd.as_str()) {
            (HEADER_HV_ECU, EXTENDED_SESSION) => {
                self.awake = true;
                Some((HV_ECU_REPLY_HEADER, "5003003201F4".to_string()))
            }
            (HEADER_HV_ECU, TESTER_PRESENT) => Some((HV_ECU_REPLY_HEADER, "7E00".to_string())),
            (HEADER_HV_ECU, READ_HV_VOLTAGE) if self.awake || !self.profile.require_wakeup => {
                let raw = scaled_raw(self.profile.hv_voltage, 10.0);
                Some((HV_ECU_REPLY_HEADER, format!("6220FE{raw:04X}")))
            }
            (HEADER_FUNCTIONAL, READ_SOC) => {
                let raw = scaled_raw(self.profile.soc_percent, 100.0);
                Some((BMS_REPLY_HEADER, format!("629001{raw:04X}")))
            }
            _ => None,
        };

        match frame {
            Some((reply_header, payload)) => {
                let mut line = String::new();
                if self.state.headers_enabled {
                    line.push_str(reply_header);
                    // Single frame PCI: payload length in bytes
                    line.push_str(&format!("{:02X}", payload.len() / 2));
                }
                line.push_str(&payload);
                let formatted = self.state.format_response(line.as_bytes());
                format!("{}{le}{le}>", String::from_utf8_lossy(&formatted))
            }
            None => format!("NO DATA{le}{le}>"),
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // clamped to u16 range
fn scaled_raw(value: f64, scale: f64) -> u16 {
    (value * scale).round().clamp(0.0, f64::from(u16::MAX)) as u16
}

/// Serve one adapter connection until the peer disconnects
///
/// Characters are echoed while echo is on; a carriage return ends a command
/// and linefeeds are ignored.
pub fn serve<S: Read + Write>(mut stream: S, profile: VehicleProfile) -> io::Result<()> {
    let mut vehicle = MockVehicle::new(profile);
    let mut buffer = Vec::new();
    let mut byte = [0u8; 1];

    loop {
        if stream.read(&mut byte)? == 0 {
            debug!("Client disconnected");
            return Ok(());
        }
        if vehicle.client_state().echo_enabled {
            stream.write_all(&byte)?;
        }

        match byte[0] {
            b'\r' => {
                let command = String::from_utf8_lossy(&buffer).trim().to_uppercase();
                buffer.clear();
                if command.is_empty() {
                    continue;
                }
                debug!("RX: {command}");
                let reply = vehicle.process_command(&command);
                debug!("TX: {}", reply.escape_debug());
                stream.write_all(reply.as_bytes())?;
            }
            b'\n' => {}
            ch => buffer.push(ch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::{decode_hv_voltage, decode_scaled_value, parse_battery_voltage};

    fn initialized(profile: VehicleProfile) -> MockVehicle {
        let mut vehicle = MockVehicle::new(profile);
        for cmd in crate::commands::INIT_SEQUENCE {
            vehicle.process_command(cmd);
        }
        vehicle
    }

    #[test]
    fn test_voltage_reply() {
        let mut vehicle = initialized(VehicleProfile::default());
        let resp = vehicle.process_command("ATRV");
        assert_eq!(parse_battery_voltage(&resp), Some(12.9));
    }

    #[test]
    fn test_soc_reply_decodes() {
        let mut vehicle = initialized(VehicleProfile {
            soc_percent: 55.5,
            ..VehicleProfile::default()
        });
        vehicle.process_command(HEADER_FUNCTIONAL);
        let resp = vehicle.process_command(READ_SOC);
        assert!(resp.starts_with("18 DA F1 DB 05 62 90 01"));
        assert_eq!(decode_scaled_value(&resp, 100.0), Some(55.5));
    }

    #[test]
    fn test_hv_reply_decodes() {
        let mut vehicle = initialized(VehicleProfile::default());
        vehicle.process_command(HEADER_HV_ECU);
        let resp = vehicle.process_command(READ_HV_VOLTAGE);
        assert_eq!(decode_hv_voltage(&resp), Some(360.0));
    }

    #[test]
    fn test_wrong_header_is_no_data() {
        let mut vehicle = initialized(VehicleProfile::default());
        vehicle.process_command(HEADER_HV_ECU);
        let resp = vehicle.process_command(READ_SOC);
        assert!(resp.starts_with("NO DATA"));
    }

    #[test]
    fn test_requires_wakeup() {
        let mut vehicle = initialized(VehicleProfile {
            require_wakeup: true,
            ..VehicleProfile::default()
        });
        vehicle.process_command(HEADER_HV_ECU);
        assert!(vehicle.process_command(READ_HV_VOLTAGE).starts_with("NO DATA"));

        vehicle.process_command(EXTENDED_SESSION);
        assert!(vehicle.is_awake());
        assert_eq!(
            decode_hv_voltage(&vehicle.process_command(READ_HV_VOLTAGE)),
            Some(360.0)
        );
    }

    #[test]
    fn test_headers_off() {
        let mut vehicle = MockVehicle::new(VehicleProfile::default());
        vehicle.process_command(HEADER_FUNCTIONAL);
        let resp = vehicle.process_command(READ_SOC);
        assert!(resp.starts_with("62 90 01 1F 40"));
    }

    /// In-memory connection: scripted input, captured output
    struct ScriptedStream {
        input: io::Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_serve_echoes_until_echo_off() {
        let mut stream = ScriptedStream {
            input: io::Cursor::new(b"ate0\r\nATL0\r\rATRV\r".to_vec()),
            output: Vec::new(),
        };
        serve(&mut stream, VehicleProfile::default()).unwrap();

        let output = String::from_utf8(stream.output).unwrap();
        assert!(output.starts_with("ate0\r"));
        assert!(output.contains("OK"));
        assert!(output.ends_with("\r12.9V\r>"));
        assert!(!output.contains("ATL0"));
        assert!(!output.contains("ATRV"));
    }
}
