// src/pedal/controller.rs  -  Configuration mutators + connection lifecycle
//
// Owns the shared trigger table and, while open, the polling reader for one
// serial connection.  The reader owns the byte source, so closing the
// connection stops the reader before the port is released.

use super::{ActionDispatcher, Callbacks, ModifierKey, Slot, TriggerTable};
use crate::error::PedalError;
use crate::inject::KeyInjector;
use crate::serial::{ByteSource, PollingReader, ReaderHandle, ReaderState, SerialSource};
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;

/// Transport settings fixed for the lifetime of the controller
#[derive(Debug, Clone, Copy)]
pub struct LinkSettings {
    pub baud:     u32,
    pub interval: Duration,
}

struct Connection {
    reader: PollingReader,
    name:   String,
}

pub struct PedalController {
    table:      Arc<RwLock<TriggerTable>>,
    callbacks:  Arc<Callbacks>,
    injector:   Arc<dyn KeyInjector>,
    link:       LinkSettings,
    connection: Option<Connection>,
}

impl PedalController {
    pub fn new(
        table:     TriggerTable,
        injector:  Arc<dyn KeyInjector>,
        callbacks: Callbacks,
        link:      LinkSettings,
    ) -> Self {
        Self {
            table: Arc::new(RwLock::new(table)),
            callbacks: Arc::new(callbacks),
            injector,
            link,
            connection: None,
        }
    }

    /// Snapshot of the current configuration
    pub fn table(&self) -> TriggerTable { self.table.read().clone() }

    // ── Configuration ────────────────────────────────────────────────────────
    pub fn set_trigger(&self, slot: Slot, value: &str) -> Result<(), PedalError> {
        let res = self.table.write().set_trigger(slot, value);
        self.report(slot, value, res)
    }

    pub fn set_key(&self, slot: Slot, value: &str) -> Result<(), PedalError> {
        let res = self.table.write().set_key(slot, value);
        self.report(slot, value, res)
    }

    pub fn set_modifiers(&self, slot: Slot, modifiers: &[ModifierKey]) {
        self.table.write().set_modifiers(slot, modifiers);
    }

    fn report(&self, slot: Slot, value: &str, res: Result<(), PedalError>) -> Result<(), PedalError> {
        if let Err(e) = &res {
            log::warn!("[pedal] {e}");
            self.callbacks.config_error(slot.name(), value);
        }
        res
    }

    // ── Connection lifecycle ─────────────────────────────────────────────────
    /// Open a serial port and start polling it.  Any open connection is
    /// closed first.
    pub fn open(&mut self, port: &str) -> Result<(), PedalError> {
        self.close();
        let source = SerialSource::open(port, self.link.baud)?;
        self.open_source(Box::new(source));
        Ok(())
    }

    /// Start polling an already opened byte source.
    pub fn open_source(&mut self, source: Box<dyn ByteSource>) {
        self.close();
        let name   = source.name().to_string();
        let handle = ReaderHandle::new();
        let dispatcher = Arc::new(ActionDispatcher::new(
            Arc::clone(&self.table),
            handle.clone(),
            Arc::clone(&self.injector),
            Arc::clone(&self.callbacks),
        ));
        let mut reader = PollingReader::with_handle(source, dispatcher, handle);
        reader.start(self.link.interval);
        log::info!("[pedal] listening on {} via {} injector", name, self.injector.name());
        self.connection = Some(Connection { reader, name });
    }

    /// Stop polling and release the port.  No-op when already closed.
    pub fn close(&mut self) {
        if let Some(mut conn) = self.connection.take() {
            conn.reader.stop();
            log::info!("[pedal] closed {}", conn.name);
        }
    }

    pub fn is_open(&self) -> bool { self.connection.is_some() }

    pub fn port(&self) -> Option<&str> { self.connection.as_ref().map(|c| c.name.as_str()) }

    pub fn reader_state(&self) -> ReaderState {
        self.connection.as_ref().map_or(ReaderState::Stopped, |c| c.reader.state())
    }
}

impl Drop for PedalController {
    fn drop(&mut self) { self.close(); }
}
