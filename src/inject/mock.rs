// src/inject/mock.rs  -  Recording injector for tests
//
// Every call is appended to `events` so tests can assert the exact
// press/release order.  `fail_on` makes the matching press fail.

use super::{Key, KeyInjector};
use crate::error::PedalError;
use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Press(Key),
    Release(Key),
}

#[derive(Default)]
pub struct MockInjector {
    pub events:  Mutex<Vec<Event>>,
    pub fail_on: Option<Key>,
}

impl MockInjector {
    pub fn new() -> Self { Self::default() }

    pub fn failing_on(key: Key) -> Self { Self { fail_on: Some(key), ..Self::default() } }

    pub fn take(&self) -> Vec<Event> { std::mem::take(&mut *self.events.lock()) }
}

impl KeyInjector for MockInjector {
    fn press(&self, key: Key) -> Result<(), PedalError> {
        if self.fail_on == Some(key) {
            return Err(PedalError::Injection(format!("mock failure pressing {key}")));
        }
        self.events.lock().push(Event::Press(key));
        Ok(())
    }

    fn release(&self, key: Key) -> Result<(), PedalError> {
        self.events.lock().push(Event::Release(key));
        Ok(())
    }

    fn name(&self) -> &str { "mock" }
}
