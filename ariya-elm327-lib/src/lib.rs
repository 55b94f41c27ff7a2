//! ELM327 protocol support for polling a Nissan Ariya over a WiFi adapter
//!
//! This library holds the pieces shared by the poller and the mock adapter:
//! the literal command strings, the pure response decoders, and an
//! adapter-side `ClientState` that tracks the AT settings of one connection.

pub mod commands;
pub mod decode;
pub mod mock;

pub use decode::{decode_hv_voltage, decode_scaled_value, parse_battery_voltage, round2};
pub use mock::{serve, MockVehicle, VehicleProfile};

/// Per-connection adapter state (ELM327 settings)
#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)] // These are independent ELM327 protocol flags
pub struct ClientState {
    /// Echo received characters back (ATE0/ATE1)
    pub echo_enabled: bool,
    /// Add linefeeds after carriage returns (ATL0/ATL1)
    pub linefeeds_enabled: bool,
    /// Print spaces between response bytes (ATS0/ATS1)
    pub spaces_enabled: bool,
    /// Show header bytes in responses (ATH0/ATH1)
    pub headers_enabled: bool,
    /// Selected protocol number (ATSPx), 0 = automatic
    pub protocol: char,
    /// Transmit header set with ATSH, as uppercase hex
    pub header: Option<String>,
    /// Receive address filter set with ATCRA, as uppercase hex
    pub receive_address: Option<String>,
}

impl Default for ClientState {
    fn default() -> Self {
        Self {
            echo_enabled: true,
            linefeeds_enabled: true,
            spaces_enabled: true,
            headers_enabled: false,
            protocol: '0',
            header: None,
            receive_address: None,
        }
    }
}

impl ClientState {
    /// Create a new client state with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Format a line ending based on current settings
    pub fn line_ending(&self) -> &'static str {
        if self.linefeeds_enabled {
            "\r\n"
        } else {
            "\r"
        }
    }

    /// Format a frame according to client settings
    /// Frames are built as compact hex (no spaces), so we add spaces if enabled
    pub fn format_response(&self, response: &[u8]) -> Vec<u8> {
        if !self.spaces_enabled {
            return response.to_vec();
        }

        let mut result = Vec::with_capacity(response.len() * 3 / 2);
        let mut hex_count = 0;

        for &byte in response {
            if byte.is_ascii_hexdigit() {
                // Space before every pair of hex digits (except the first)
                if hex_count > 0 && hex_count % 2 == 0 {
                    result.push(b' ');
                }
                hex_count += 1;
            } else {
                // Line endings and the prompt restart the grouping
                hex_count = 0;
            }

            result.push(byte);
        }

        result
    }

    /// Handle an AT command and return the response
    /// Mutates the state if the command changes settings
    pub fn handle_at_command(&mut self, command: &str) -> String {
        let cmd = command.to_uppercase();
        let le = self.line_ending();

        let response_text = match cmd.as_str() {
            "ATZ" => {
                *self = ClientState::default();
                let le = self.line_ending();
                return format!("{le}ELM327 v1.5{le}>");
            }
            "ATE0" => {
                self.echo_enabled = false;
                "OK"
            }
            "ATE1" => {
                self.echo_enabled = true;
                "OK"
            }
            "ATL0" => {
                self.linefeeds_enabled = false;
                "OK"
            }
            "ATL1" => {
                self.linefeeds_enabled = true;
                "OK"
            }
            "ATS0" => {
                self.spaces_enabled = false;
                "OK"
            }
            "ATS1" => {
                self.spaces_enabled = true;
                "OK"
            }
            "ATH0" => {
                self.headers_enabled = false;
                "OK"
            }
            "ATH1" => {
                self.headers_enabled = true;
                "OK"
            }
            _ if cmd.starts_with("ATSP") => match cmd[4..].chars().next() {
                Some(p) if p.is_ascii_hexdigit() => {
                    self.protocol = p;
                    "OK"
                }
                _ => "?",
            },
            _ if cmd.starts_with("ATSH") => {
                let header = &cmd[4..];
                if matches!(header.len(), 3 | 6 | 8) && is_hex(header) {
                    self.header = Some(header.to_string());
                    "OK"
                } else {
                    "?"
                }
            }
            _ if cmd.starts_with("ATCRA") => {
                let address = &cmd[5..];
                if address.is_empty() {
                    self.receive_address = None;
                    "OK"
                } else if is_hex(address) {
                    self.receive_address = Some(address.to_string());
                    "OK"
                } else {
                    "?"
                }
            }
            // Flow control and programmable parameters are accepted without effect
            _ if cmd.starts_with("ATFC") => "OK",
            _ if cmd.starts_with("ATPP") => "OK",
            _ if cmd.starts_with("ATST") => "OK",
            _ if cmd.starts_with("ATAT") => "OK",
            "ATI" => "ELM327 v1.5",
            "AT@1" => return self.device_description(),
            _ => "?",
        };

        // Note: for commands that change the linefeed setting, the OLD setting
        // is used since le was captured before the match
        format!("{le}{response_text}{le}>")
    }

    /// Override this to provide a custom device description for AT@1
    pub fn device_description(&self) -> String {
        let le = self.line_ending();
        format!("{le}ELM327{le}>")
    }
}

fn is_hex(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_hexdigit())
}
