//! Polling engine with the conditional refresh policy.
//!
//! Each `refresh` is one cycle:
//! 1. probe the adapter; if unreachable, remember when and return cached values
//! 2. open a session and initialize the adapter
//! 3. read the 12V battery voltage
//! 4. decide whether SOC/HV reads are warranted (they keep the ECUs awake)
//! 5. optionally wake the ECU, then read SOC and HV voltage
//! 6. return the newest value of every metric
//!
//! Values are sticky: a failed read or an unreachable adapter never clears a
//! value that was decoded before.

use ariya_elm327_lib::commands::{
    EXTENDED_SESSION, HEADER_FUNCTIONAL, HEADER_HV_ECU, INIT_SEQUENCE, READ_HV_VOLTAGE, READ_SOC,
    READ_VOLTAGE, RECEIVE_FILTER_HV_ECU, TESTER_PRESENT,
};
use ariya_elm327_lib::{decode_hv_voltage, decode_scaled_value, parse_battery_voltage, round2};
use log::{debug, error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::config::Timing;
use crate::error::PollError;
use crate::snapshot::MetricSnapshot;
use crate::transport::{AdapterConnection, Endpoint, Transport};

/// Above this 12V reading the car is charging or awake, so reading the BMS
/// does not keep it from sleeping
pub const FULL_READ_VOLTAGE_THRESHOLD: f64 = 12.8;

/// An outage longer than this forces a full read once the adapter is back
pub const UNREACHABLE_FORCE_AFTER: Duration = Duration::from_secs(1800);

/// SOC is reported in hundredths of a percent
const SOC_DIVISOR: f64 = 100.0;

/// Source of the current time, replaceable in tests
pub trait Clock: Send {
    fn now(&self) -> Instant;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// What the most recent cycle did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// No cycle has run yet
    NotRun,
    /// The probe failed; nothing was sent
    Unreachable,
    /// The session ran to the end
    Completed {
        /// SOC/HV reads were attempted
        full_read: bool,
        /// The ECU wake-up sequence was sent
        woke_ecu: bool,
    },
    /// The session aborted on a transport error
    Failed(String),
}

/// One-shot "full read on the next cycle" flag, shareable across threads
#[derive(Debug, Clone, Default)]
pub struct ForceRefreshHandle(Arc<AtomicBool>);

impl ForceRefreshHandle {
    pub fn request(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn consume(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

/// Decision taken in step 4 of a cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FullRead {
    wake_ecu: bool,
}

pub struct PollingEngine<T: Transport, C: Clock = SystemClock> {
    endpoint: Endpoint,
    transport: T,
    clock: C,
    timing: Timing,
    /// Last successfully decoded value of every metric
    cache: MetricSnapshot,
    /// When the adapter was last seen unreachable, if it has not been
    /// reachable since
    unreachable_since: Option<Instant>,
    force_refresh: ForceRefreshHandle,
    first_run: bool,
    last_outcome: CycleOutcome,
}

impl<T: Transport> PollingEngine<T, SystemClock> {
    pub fn new(endpoint: Endpoint, transport: T, timing: Timing) -> Self {
        Self::with_clock(endpoint, transport, timing, SystemClock)
    }
}

impl<T: Transport, C: Clock> PollingEngine<T, C> {
    pub fn with_clock(endpoint: Endpoint, transport: T, timing: Timing, clock: C) -> Self {
        Self {
            endpoint,
            transport,
            clock,
            timing,
            cache: MetricSnapshot::default(),
            unreachable_since: None,
            force_refresh: ForceRefreshHandle::default(),
            first_run: true,
            last_outcome: CycleOutcome::NotRun,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Last known values without running a cycle
    pub fn cached(&self) -> MetricSnapshot {
        self.cache
    }

    pub fn last_outcome(&self) -> &CycleOutcome {
        &self.last_outcome
    }

    /// Make the next cycle read SOC/HV regardless of the 12V reading
    pub fn force_refresh(&self) {
        info!("Full SOC/HV read requested");
        self.force_refresh.request();
    }

    /// Handle for setting the force flag from another thread
    pub fn force_refresh_handle(&self) -> ForceRefreshHandle {
        self.force_refresh.clone()
    }

    /// Run one refresh cycle. Never fails: on any error the cached values of
    /// the metrics not freshly read are returned.
    pub fn refresh(&mut self) -> MetricSnapshot {
        if !self.transport.probe(&self.endpoint, self.timing.probe_timeout()) {
            if self.unreachable_since.is_none() {
                warn!("ELM327 at {} unreachable, keeping last values", self.endpoint);
            } else {
                debug!("ELM327 at {} still unreachable", self.endpoint);
            }
            self.unreachable_since = Some(self.clock.now());
            self.last_outcome = CycleOutcome::Unreachable;
            return self.cache;
        }

        self.last_outcome = match self.run_session() {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("ELM327 session with {} failed: {e}", self.endpoint);
                CycleOutcome::Failed(e.to_string())
            }
        };

        debug!("Snapshot after {:?}: {:?}", self.last_outcome, self.cache);
        self.cache
    }

    /// Steps 2 to 5; the connection is dropped (and closed) on every return
    fn run_session(&mut self) -> Result<CycleOutcome, PollError> {
        let mut conn = self
            .transport
            .open(&self.endpoint, self.timing.connect_timeout())?;

        for cmd in INIT_SEQUENCE {
            conn.send(cmd)?;
        }

        let voltage = self.read_aux_voltage(&mut conn)?;
        let force_due_to_timeout = self.take_outage_timeout();

        let Some(full_read) = self.decide_full_read(voltage, force_due_to_timeout) else {
            return Ok(CycleOutcome::Completed {
                full_read: false,
                woke_ecu: false,
            });
        };

        if full_read.wake_ecu {
            if let Err(e) = wake_ecu(&mut conn, self.timing.wakeup_pause()) {
                error!("ECU wake-up failed: {e}");
            }
        }

        self.read_soc(&mut conn)?;
        self.read_hv_voltage(&mut conn)?;

        Ok(CycleOutcome::Completed {
            full_read: true,
            woke_ecu: full_read.wake_ecu,
        })
    }

    /// Read the 12V battery; falls back to the cached value if the reply
    /// does not parse
    fn read_aux_voltage(&mut self, conn: &mut T::Connection) -> Result<Option<f64>, PollError> {
        let raw = conn.send(READ_VOLTAGE)?;
        debug!("Raw ATRV reply: {raw:?}");

        match raw.as_deref().and_then(parse_battery_voltage) {
            Some(volts) => {
                self.cache.aux_voltage = Some(volts);
                Ok(Some(volts))
            }
            None => {
                debug!("12V reading unavailable, using {:?}", self.cache.aux_voltage);
                Ok(self.cache.aux_voltage)
            }
        }
    }

    /// Whether the outage that just ended was long enough to force a full
    /// read. The outage timestamp is cleared either way.
    fn take_outage_timeout(&mut self) -> bool {
        let Some(since) = self.unreachable_since.take() else {
            return false;
        };
        let outage = self.clock.now().saturating_duration_since(since);
        if outage > UNREACHABLE_FORCE_AFTER {
            info!(
                "Adapter back after {}s, forcing SOC/HV read",
                outage.as_secs()
            );
            true
        } else {
            false
        }
    }

    /// Step 4: consumes the one-shot flags only when a full read will happen
    fn decide_full_read(
        &mut self,
        voltage: Option<f64>,
        force_due_to_timeout: bool,
    ) -> Option<FullRead> {
        let Some(volts) = voltage else {
            debug!("12V never read, skipping SOC/HV");
            return None;
        };

        // Read and cleared in one step; a forced request always reads
        let forced = self.force_refresh.consume();
        let first_run = self.first_run;
        if !(volts > FULL_READ_VOLTAGE_THRESHOLD || force_due_to_timeout || forced || first_run) {
            debug!("SOC/HV read skipped (12V={volts})");
            return None;
        }

        debug!(
            "SOC/HV read triggered (12V={volts}, timeout={force_due_to_timeout}, forced={forced}, first_run={first_run})"
        );
        self.first_run = false;

        Some(FullRead {
            wake_ecu: volts < FULL_READ_VOLTAGE_THRESHOLD || force_due_to_timeout || first_run,
        })
    }

    fn read_soc(&mut self, conn: &mut T::Connection) -> Result<(), PollError> {
        conn.send(HEADER_FUNCTIONAL)?;
        let raw = conn.send(READ_SOC)?;
        debug!("Raw SOC reply: {raw:?}");

        match raw
            .as_deref()
            .and_then(|r| decode_scaled_value(r, SOC_DIVISOR))
        {
            Some(soc) => self.cache.soc_percent = Some(round2(soc)),
            None => debug!("SOC reply did not decode, keeping {:?}", self.cache.soc_percent),
        }
        Ok(())
    }

    fn read_hv_voltage(&mut self, conn: &mut T::Connection) -> Result<(), PollError> {
        conn.send(HEADER_HV_ECU)?;
        conn.send(RECEIVE_FILTER_HV_ECU)?;
        let raw = conn.send(READ_HV_VOLTAGE)?;
        debug!("Raw HV reply: {raw:?}");

        match raw.as_deref().and_then(decode_hv_voltage) {
            Some(volts) => self.cache.hv_voltage = Some(volts),
            None => debug!("HV reply did not decode, keeping {:?}", self.cache.hv_voltage),
        }
        Ok(())
    }
}

/// Open an extended session on the ECU at 0xDA and keep it alive
fn wake_ecu(conn: &mut impl AdapterConnection, pause: Duration) -> Result<(), PollError> {
    conn.send(HEADER_HV_ECU)?;
    info!("Waking ECU: {EXTENDED_SESSION} + {TESTER_PRESENT}");
    conn.send(EXTENDED_SESSION)?;
    conn.pause(pause);
    conn.send(TESTER_PRESENT)?;
    Ok(())
}
