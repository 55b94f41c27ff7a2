//! Background poller with a dedicated worker thread.
//!
//! Architecture:
//! - Worker thread: owns the `PollingEngine`, runs one cycle at start-up and
//!   then one per interval or per request, so at most one cycle runs at a time
//! - `PollerHandle`: shared with callers; reads the latest snapshot and queues
//!   on-demand or forced refreshes via channel
//!
//! Requests that arrive while a cycle is running are coalesced into the next
//! cycle.

use log::{debug, info};
use std::io;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::engine::{Clock, ForceRefreshHandle, PollingEngine};
use crate::snapshot::MetricSnapshot;
use crate::transport::Transport;

/// Messages to the worker thread
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerMessage {
    /// Run a cycle now instead of waiting for the interval
    Refresh,
    Shutdown,
}

/// State shared between the worker and its handles
#[derive(Default)]
struct Shared {
    latest: Mutex<Option<MetricSnapshot>>,
    subscribers: Mutex<Vec<Sender<MetricSnapshot>>>,
}

impl Shared {
    fn publish(&self, snapshot: MetricSnapshot) {
        *self.latest.lock().unwrap() = Some(snapshot);
        // Drop subscribers whose receiver is gone
        self.subscribers
            .lock()
            .unwrap()
            .retain(|tx| tx.send(snapshot).is_ok());
    }
}

/// Caller-side handle of a running poller
pub struct PollerHandle {
    tx: Sender<PollerMessage>,
    force_refresh: ForceRefreshHandle,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl PollerHandle {
    /// Snapshot of the most recent cycle, `None` until the first one finished
    pub fn latest(&self) -> Option<MetricSnapshot> {
        *self.shared.latest.lock().unwrap()
    }

    /// Receive every snapshot published from now on
    pub fn subscribe(&self) -> Receiver<MetricSnapshot> {
        let (tx, rx) = mpsc::channel();
        self.shared.subscribers.lock().unwrap().push(tx);
        rx
    }

    /// Run a cycle as soon as possible
    pub fn request_refresh(&self) {
        let _ = self.tx.send(PollerMessage::Refresh);
    }

    /// Run a cycle as soon as possible and make it read SOC/HV
    pub fn request_forced_refresh(&self) {
        info!("Forced refresh requested");
        self.force_refresh.request();
        self.request_refresh();
    }

    /// Stop the worker after its current cycle and wait for it
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = self.tx.send(PollerMessage::Shutdown);
            let _ = worker.join();
        }
    }
}

impl Drop for PollerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Move `engine` onto a worker thread that refreshes every `interval`
pub fn spawn_poller<T, C>(engine: PollingEngine<T, C>, interval: Duration) -> io::Result<PollerHandle>
where
    T: Transport + Send + 'static,
    C: Clock + 'static,
{
    let (tx, rx) = mpsc::channel();
    let shared = Arc::new(Shared::default());
    let force_refresh = engine.force_refresh_handle();

    let worker_shared = shared.clone();
    let worker = std::thread::Builder::new()
        .name("ariya-poller".to_string())
        .spawn(move || poller_task(engine, &rx, interval, &worker_shared))?;

    Ok(PollerHandle {
        tx,
        force_refresh,
        shared,
        worker: Some(worker),
    })
}

fn poller_task<T: Transport, C: Clock>(
    mut engine: PollingEngine<T, C>,
    rx: &Receiver<PollerMessage>,
    interval: Duration,
    shared: &Shared,
) {
    info!(
        "Poller for {} started ({}s interval)",
        engine.endpoint(),
        interval.as_secs()
    );

    loop {
        shared.publish(engine.refresh());

        match rx.recv_timeout(interval) {
            Ok(PollerMessage::Refresh) => debug!("On-demand refresh"),
            Err(RecvTimeoutError::Timeout) => debug!("Scheduled refresh"),
            Ok(PollerMessage::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
        }

        // Coalesce requests queued while the last cycle ran
        loop {
            match rx.try_recv() {
                Ok(PollerMessage::Refresh) => {}
                Err(TryRecvError::Empty) => break,
                Ok(PollerMessage::Shutdown) | Err(TryRecvError::Disconnected) => {
                    info!("Poller shutting down");
                    return;
                }
            }
        }
    }

    info!("Poller shutting down");
}
