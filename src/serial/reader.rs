// src/serial/reader.rs  -  Timer-driven drain of a ByteSource
//
// A worker thread owns a crossbeam `tick` channel.  Each tick is one firing:
// ask the source how many bytes are waiting, read them, hand them to the
// handler on the worker thread.  Firings run one at a time because the worker
// only takes the next tick after the handler returns.
//
// Pausing does not touch the ticker, so the cadence keeps its original phase;
// ticks that arrive while paused are skipped.  Stopping drops the control
// sender, which ends the worker's select loop, then joins the thread so the
// source is never used after `stop()` returns.

use super::ByteSource;
use crate::error::PedalError;
use crossbeam_channel::{bounded, select, tick, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState { Stopped, Running, Paused }

/// Receives the outcome of each firing that produced data or failed.
pub trait ReadHandler: Send + Sync {
    fn on_bytes(&self, bytes: &[u8]);
    fn on_error(&self, err: PedalError);
}

// ── Pause/resume control surface ──────────────────────────────────────────────
/// Cheap clone of the reader's state cell.  Held by the dispatcher so it can
/// pause the reader it is being called from without owning it.
#[derive(Clone)]
pub struct ReaderHandle {
    state: Arc<Mutex<ReaderState>>,
}

impl Default for ReaderHandle {
    fn default() -> Self { Self::new() }
}

impl ReaderHandle {
    pub fn new() -> Self { Self { state: Arc::new(Mutex::new(ReaderState::Stopped)) } }

    pub fn state(&self) -> ReaderState { *self.state.lock() }

    /// Running → Paused.  No-op otherwise.
    pub fn pause(&self) {
        let mut s = self.state.lock();
        if *s == ReaderState::Running {
            *s = ReaderState::Paused;
            log::debug!("[reader] paused");
        }
    }

    /// Paused → Running.  No-op otherwise.
    pub fn resume(&self) {
        let mut s = self.state.lock();
        if *s == ReaderState::Paused {
            *s = ReaderState::Running;
            log::debug!("[reader] resumed");
        }
    }

    fn set(&self, state: ReaderState) { *self.state.lock() = state; }
}

// ── Reader ────────────────────────────────────────────────────────────────────
struct Worker {
    stop_tx: Sender<()>,
    thread:  JoinHandle<()>,
}

pub struct PollingReader {
    source:  Arc<Mutex<Box<dyn ByteSource>>>,
    handler: Arc<dyn ReadHandler>,
    handle:  ReaderHandle,
    worker:  Option<Worker>,
}

impl PollingReader {
    #[cfg(test)]
    pub fn new(source: Box<dyn ByteSource>, handler: Arc<dyn ReadHandler>) -> Self {
        Self::with_handle(source, handler, ReaderHandle::new())
    }

    /// Build around a handle created up front, so the handler can hold the
    /// pause/resume surface of the reader that will call it.
    pub fn with_handle(
        source:  Box<dyn ByteSource>,
        handler: Arc<dyn ReadHandler>,
        handle:  ReaderHandle,
    ) -> Self {
        handle.set(ReaderState::Stopped);
        Self { source: Arc::new(Mutex::new(source)), handler, handle, worker: None }
    }

    #[cfg(test)]
    pub fn handle(&self) -> ReaderHandle { self.handle.clone() }

    pub fn state(&self) -> ReaderState { self.handle.state() }

    /// Arm a fresh schedule firing every `interval`.  Restarts if already running.
    pub fn start(&mut self, interval: Duration) {
        self.stop();
        let interval = if interval.is_zero() { DEFAULT_INTERVAL } else { interval };

        let (stop_tx, stop_rx) = bounded::<()>(1);
        let ticker  = tick(interval);
        let source  = Arc::clone(&self.source);
        let handler = Arc::clone(&self.handler);
        let handle  = self.handle.clone();

        self.handle.set(ReaderState::Running);
        let thread = thread::Builder::new()
            .name("pedal-reader".into())
            .spawn(move || run(ticker, stop_rx, source, handler, handle));

        match thread {
            Ok(thread) => {
                log::info!("[reader] started, interval {:?}", interval);
                self.worker = Some(Worker { stop_tx, thread });
            }
            Err(e) => {
                log::error!("[reader] cannot spawn polling thread: {e}");
                self.handle.set(ReaderState::Stopped);
            }
        }
    }

    // Outside tests pause/resume go through the dispatcher's `ReaderHandle`.
    #[cfg(test)]
    pub fn pause(&self)  { self.handle.pause(); }
    #[cfg(test)]
    pub fn resume(&self) { self.handle.resume(); }

    /// Cancel future firings and wait for an in-flight one.  Idempotent.
    pub fn stop(&mut self) {
        self.handle.set(ReaderState::Stopped);
        let Some(Worker { stop_tx, thread }) = self.worker.take() else { return };
        drop(stop_tx);
        if thread.thread().id() == current_id() {
            // stop() from inside a handler: the loop exits once it returns
            return;
        }
        if thread.join().is_err() {
            log::error!("[reader] polling thread panicked");
        }
        log::info!("[reader] stopped");
    }
}

impl Drop for PollingReader {
    fn drop(&mut self) { self.stop(); }
}

fn current_id() -> ThreadId { thread::current().id() }

fn run(
    ticker:  Receiver<std::time::Instant>,
    stop_rx: Receiver<()>,
    source:  Arc<Mutex<Box<dyn ByteSource>>>,
    handler: Arc<dyn ReadHandler>,
    handle:  ReaderHandle,
) {
    loop {
        select! {
            recv(stop_rx) -> _ => break,
            recv(ticker) -> _ => {
                if handle.state() != ReaderState::Running { continue; }
                fire(&source, handler.as_ref());
            }
        }
    }
}

/// One firing.  Errors go to the handler; the schedule carries on.
fn fire(source: &Mutex<Box<dyn ByteSource>>, handler: &dyn ReadHandler) {
    let result = {
        let mut src = source.lock();
        match src.available() {
            Ok(0)  => return,
            Ok(n)  => src.read(n),
            Err(e) => Err(e),
        }
    };
    match result {
        Ok(bytes) if !bytes.is_empty() => handler.on_bytes(&bytes),
        Ok(_) => {}
        Err(e) => {
            log::warn!("[reader] firing abandoned: {e}");
            handler.on_error(e);
        }
    }
}
