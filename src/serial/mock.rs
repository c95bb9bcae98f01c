// src/serial/mock.rs  -  Scripted byte source for tests
//
// Each `push` is one burst: `available()` reports the size of the burst at
// the front of the queue and `read()` hands it out.  Clones share the queue
// so a test can keep feeding a source the reader already owns.

use super::ByteSource;
use crate::error::PedalError;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

#[derive(Default)]
struct Script {
    bursts:    VecDeque<Vec<u8>>,
    fail_next: bool,
    phantom:   bool,
    reads:     usize,
}

#[derive(Clone, Default)]
pub struct ScriptedSource {
    inner: Arc<Mutex<Script>>,
}

impl ScriptedSource {
    pub fn new() -> Self { Self::default() }

    pub fn push(&self, bytes: &[u8]) {
        self.inner.lock().bursts.push_back(bytes.to_vec());
    }

    /// Report one byte available, then return nothing from `read`.
    pub fn push_phantom(&self) { self.inner.lock().phantom = true; }

    pub fn fail_next_read(&self) { self.inner.lock().fail_next = true; }

    pub fn reads(&self) -> usize { self.inner.lock().reads }
}

impl ByteSource for ScriptedSource {
    fn available(&mut self) -> Result<usize, PedalError> {
        let s = self.inner.lock();
        if s.phantom || s.fail_next { return Ok(1); }
        Ok(s.bursts.front().map_or(0, Vec::len))
    }

    fn read(&mut self, max: usize) -> Result<Vec<u8>, PedalError> {
        let mut s = self.inner.lock();
        s.reads += 1;
        if s.fail_next {
            s.fail_next = false;
            return Err(PedalError::TransportRead(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "device unplugged",
            )));
        }
        if s.phantom {
            s.phantom = false;
            return Ok(Vec::new());
        }
        let mut burst = s.bursts.pop_front().unwrap_or_default();
        burst.truncate(max);
        Ok(burst)
    }

    fn name(&self) -> &str { "scripted" }
}
