//! Literal command strings sent to the adapter.
//!
//! The strings and the order they are sent in are what the adapter and the
//! vehicle expect; they must be reproduced exactly.

/// Reset the adapter
pub const RESET: &str = "ATZ";
pub const ECHO_OFF: &str = "ATE0";
pub const LINEFEEDS_OFF: &str = "ATL0";
pub const SPACES_OFF: &str = "ATS0";
pub const HEADERS_ON: &str = "ATH1";
/// ISO 15765-4 CAN, 29-bit identifiers, 500 kbaud
pub const PROTOCOL_CAN_29BIT_500K: &str = "ATSP7";
/// Flow control mode 1 (user-supplied header and data)
pub const FLOW_CONTROL_MODE_1: &str = "ATFCSM1";
/// Read the supply voltage seen on the OBD connector
pub const READ_VOLTAGE: &str = "ATRV";

/// Address requests to the ECU at 0xDA (HV voltage, wake-up target)
pub const HEADER_HV_ECU: &str = "ATSHDADAF1";
/// Functional addressing used for the BMS state-of-charge read
pub const HEADER_FUNCTIONAL: &str = "ATSHDB33F1";
/// Only accept replies from 0xDA to the tester
pub const RECEIVE_FILTER_HV_ECU: &str = "ATCRA18DAF1DA";

/// Diagnostic session control, extended session
pub const EXTENDED_SESSION: &str = "1003";
/// Tester present keep-alive
pub const TESTER_PRESENT: &str = "3E00";
/// Read data by identifier 0x9001: BMS state of charge
pub const READ_SOC: &str = "229001";
/// Read data by identifier 0x20FE: HV pack voltage
pub const READ_HV_VOLTAGE: &str = "2220FE";

/// Write 0x7A to programmable parameter 0x0E (power saving off)
pub const POWER_SAVING_WRITE: &str = "ATPP0ESV7A";
/// Enable programmable parameter 0x0E; takes effect after a power cycle
pub const POWER_SAVING_ENABLE: &str = "ATPP0EON";

/// Sent at the start of every polling session
pub const INIT_SEQUENCE: [&str; 5] = [
    RESET,
    ECHO_OFF,
    HEADERS_ON,
    PROTOCOL_CAN_29BIT_500K,
    FLOW_CONTROL_MODE_1,
];

/// Programs the adapter so it stops sleeping while the car is parked
pub const DISABLE_POWER_SAVING_SEQUENCE: [&str; 6] = [
    RESET,
    ECHO_OFF,
    LINEFEEDS_OFF,
    SPACES_OFF,
    POWER_SAVING_WRITE,
    POWER_SAVING_ENABLE,
];

/// Positive response service id for read data by identifier (0x22 + 0x40)
pub const POSITIVE_READ_RESPONSE: &str = "62";
/// Data identifier echoed back in the HV voltage reply
pub const HV_VOLTAGE_DID: [&str; 2] = ["20", "FE"];
