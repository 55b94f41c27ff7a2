use ariya_elm327_lib::round2;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Subtracted from the BMS SOC to get the corrected SOC
pub const SOC_CORRECTION: f64 = 6.0;

/// The three values surfaced by the poller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    /// Traction battery state of charge reported by the BMS
    Soc,
    /// 12V auxiliary battery, as seen on the OBD connector
    AuxVoltage,
    /// High-voltage traction pack
    HvVoltage,
}

impl Metric {
    pub const ALL: [Metric; 3] = [Metric::AuxVoltage, Metric::Soc, Metric::HvVoltage];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Soc => "SOC (BMS)",
            Self::AuxVoltage => "12V battery",
            Self::HvVoltage => "HV battery",
        }
    }

    pub const fn unit(self) -> &'static str {
        match self {
            Self::Soc => "%",
            Self::AuxVoltage | Self::HvVoltage => "V",
        }
    }
}

/// Result of one refresh: the newest value of each metric, or `None` if it
/// has never been read since the engine was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub soc_percent: Option<f64>,
    pub aux_voltage: Option<f64>,
    pub hv_voltage: Option<f64>,
}

impl MetricSnapshot {
    pub const fn get(&self, metric: Metric) -> Option<f64> {
        match metric {
            Metric::Soc => self.soc_percent,
            Metric::AuxVoltage => self.aux_voltage,
            Metric::HvVoltage => self.hv_voltage,
        }
    }

    /// BMS SOC with the fixed correction applied
    pub fn corrected_soc(&self) -> Option<f64> {
        self.soc_percent.map(|soc| round2(soc - SOC_CORRECTION))
    }
}

impl fmt::Display for MetricSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, metric) in Metric::ALL.into_iter().enumerate() {
            if i > 0 {
                write!(f, " | ")?;
            }
            match self.get(metric) {
                Some(value) => write!(f, "{}: {value:.2}{}", metric.name(), metric.unit())?,
                None => write!(f, "{}: unknown", metric.name())?,
            }
        }
        Ok(())
    }
}
