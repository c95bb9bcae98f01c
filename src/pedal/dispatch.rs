// src/pedal/dispatch.rs  -  Decoded byte → key combination, guarded by pause
//
// One dispatch cycle runs on the reader's worker thread:
//
//   pause reader → lookup → press/release → report → history → resume reader
//
// The resume lives in `PauseGuard::drop`, so it runs on every exit path,
// including an injection error.

use super::{Action, TriggerTable};
use crate::error::PedalError;
use crate::inject::{Key, KeyInjector};
use crate::serial::{ReadHandler, ReaderHandle};
use parking_lot::RwLock;
use std::sync::Arc;

// ── Observer callbacks ────────────────────────────────────────────────────────
type HistoryFn     = Box<dyn Fn(char) + Send + Sync>;
type ActionFn      = Box<dyn Fn(&str, &str) + Send + Sync>;
type ConfigErrorFn = Box<dyn Fn(&str, &str) + Send + Sync>;
type ErrorFn       = Box<dyn Fn(&PedalError) + Send + Sync>;

/// Named callback slots, registered once at construction.  All are optional
/// and invoked synchronously on whichever thread produced the event.
#[derive(Default)]
pub struct Callbacks {
    on_history:      Option<HistoryFn>,
    on_action_fired: Option<ActionFn>,
    on_config_error: Option<ConfigErrorFn>,
    on_error:        Option<ErrorFn>,
}

impl Callbacks {
    pub fn new() -> Self { Self::default() }

    /// Every decoded character, matched or not
    pub fn on_history(mut self, f: impl Fn(char) + Send + Sync + 'static) -> Self {
        self.on_history = Some(Box::new(f));
        self
    }

    /// `(slot_name, description)` after a successful injection
    pub fn on_action_fired(mut self, f: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_action_fired = Some(Box::new(f));
        self
    }

    /// `(slot_name, offending_value)` when a trigger/key update is rejected
    pub fn on_config_error(mut self, f: impl Fn(&str, &str) + Send + Sync + 'static) -> Self {
        self.on_config_error = Some(Box::new(f));
        self
    }

    /// Transport and injection failures
    pub fn on_error(mut self, f: impl Fn(&PedalError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub(crate) fn history(&self, c: char) {
        if let Some(f) = &self.on_history { f(c); }
    }

    pub(crate) fn action_fired(&self, slot: &str, description: &str) {
        if let Some(f) = &self.on_action_fired { f(slot, description); }
    }

    pub(crate) fn config_error(&self, slot: &str, value: &str) {
        if let Some(f) = &self.on_config_error { f(slot, value); }
    }

    pub(crate) fn error(&self, err: &PedalError) {
        if let Some(f) = &self.on_error { f(err); }
    }
}

// ── Pause guard ───────────────────────────────────────────────────────────────
/// Pauses the reader for its lifetime.
pub struct PauseGuard<'a> {
    reader: &'a ReaderHandle,
}

impl<'a> PauseGuard<'a> {
    pub fn new(reader: &'a ReaderHandle) -> Self {
        reader.pause();
        Self { reader }
    }
}

impl Drop for PauseGuard<'_> {
    fn drop(&mut self) { self.reader.resume(); }
}

// ── Dispatcher ────────────────────────────────────────────────────────────────
pub struct ActionDispatcher {
    table:     Arc<RwLock<TriggerTable>>,
    reader:    ReaderHandle,
    injector:  Arc<dyn KeyInjector>,
    callbacks: Arc<Callbacks>,
}

impl ActionDispatcher {
    pub fn new(
        table:     Arc<RwLock<TriggerTable>>,
        reader:    ReaderHandle,
        injector:  Arc<dyn KeyInjector>,
        callbacks: Arc<Callbacks>,
    ) -> Self {
        Self { table, reader, injector, callbacks }
    }

    /// Run one dispatch cycle for the first byte of `raw`; the rest of the
    /// burst is dropped.  Returns the fired action, if any.
    pub fn on_byte_received(&self, raw: &[u8]) -> Result<Option<Action>, PedalError> {
        let Some(&first) = raw.first() else { return Ok(None) };
        if !first.is_ascii() {
            log::warn!("[dispatch] non-ASCII byte 0x{first:02x} ignored");
            return Ok(None);
        }
        if raw.len() > 1 {
            log::debug!("[dispatch] {} trailing byte(s) dropped", raw.len() - 1);
        }
        let c = first as char;

        let _paused = PauseGuard::new(&self.reader);

        let action = self.table.read().lookup(c);
        let outcome = match &action {
            Some(a) => {
                let res = press_sequence(self.injector.as_ref(), a);
                if res.is_ok() {
                    let description = a.describe();
                    log::info!("[dispatch] {} pedal → {}", a.slot, description);
                    self.callbacks.action_fired(a.slot.name(), &description);
                }
                res
            }
            None => {
                log::debug!("[dispatch] no trigger for {c:?}");
                Ok(())
            }
        };

        self.callbacks.history(c);
        outcome.map(|()| action)
    }
}

impl ReadHandler for ActionDispatcher {
    fn on_bytes(&self, bytes: &[u8]) {
        if let Err(e) = self.on_byte_received(bytes) {
            log::error!("[dispatch] {e}");
            self.callbacks.error(&e);
        }
    }

    fn on_error(&self, err: PedalError) {
        self.callbacks.error(&err);
    }
}

/// Press modifiers in order, press + release the key, release modifiers in
/// the same order.  On failure everything already pressed is still released
/// and the first error is returned.
fn press_sequence(inj: &dyn KeyInjector, action: &Action) -> Result<(), PedalError> {
    let mods: Vec<Key> = action.modifiers.iter().map(|&m| Key::Modifier(m)).collect();
    let main = Key::Char(action.key);
    let mut first_err: Option<PedalError> = None;

    let mut held = 0;
    for &m in &mods {
        if let Err(e) = inj.press(m) {
            first_err = Some(e);
            break;
        }
        held += 1;
    }

    if first_err.is_none() {
        match inj.press(main) {
            Ok(()) => {
                if let Err(e) = inj.release(main) { first_err = Some(e); }
            }
            Err(e) => first_err = Some(e),
        }
    }

    for &m in &mods[..held] {
        if let Err(e) = inj.release(m) {
            log::error!("[dispatch] could not release {m}: {e}");
            first_err.get_or_insert(e);
        }
    }

    match first_err {
        Some(e) => Err(e),
        None    => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inject::mock::{Event, MockInjector};
    use crate::pedal::{ModifierKey, Slot};
    use crate::serial::mock::ScriptedSource;
    use crate::serial::{PollingReader, ReaderState};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};
    use Event::{Press, Release};
    use ModifierKey::*;

    #[derive(Default)]
    struct Seen {
        history: Mutex<Vec<char>>,
        fired:   Mutex<Vec<(String, String)>>,
        errors:  AtomicUsize,
    }

    fn callbacks(seen: &Arc<Seen>) -> Arc<Callbacks> {
        let (h, f, e) = (seen.clone(), seen.clone(), seen.clone());
        Arc::new(Callbacks::new()
            .on_history(move |c| h.history.lock().push(c))
            .on_action_fired(move |s, d| f.fired.lock().push((s.into(), d.into())))
            .on_error(move |_| { e.errors.fetch_add(1, Ordering::SeqCst); }))
    }

    /// A running reader on an idle source, so pause/resume have effect.
    fn running_reader() -> PollingReader {
        let idle = Arc::new(Recorderless);
        let mut r = PollingReader::new(Box::new(ScriptedSource::new()), idle);
        r.start(Duration::from_secs(60));
        r
    }

    struct Recorderless;
    impl ReadHandler for Recorderless {
        fn on_bytes(&self, _bytes: &[u8]) {}
        fn on_error(&self, _err: PedalError) {}
    }

    fn dispatcher(
        table: TriggerTable,
        reader: &PollingReader,
        inj: Arc<dyn KeyInjector>,
        seen: &Arc<Seen>,
    ) -> ActionDispatcher {
        ActionDispatcher::new(Arc::new(RwLock::new(table)), reader.handle(), inj, callbacks(seen))
    }

    #[test]
    fn symmetric_press_release_order() {
        let mut table = TriggerTable::default();
        table.set_key(Slot::Left, "X").unwrap();
        table.set_modifiers(Slot::Left, &[Ctrl, Shift]);
        let reader = running_reader();
        let inj = Arc::new(MockInjector::new());
        let seen = Arc::new(Seen::default());
        let d = dispatcher(table, &reader, inj.clone(), &seen);

        let fired = d.on_byte_received(b"l").unwrap().unwrap();
        assert_eq!(fired.slot, Slot::Left);
        assert_eq!(inj.take(), vec![
            Press(Key::Modifier(Ctrl)),
            Press(Key::Modifier(Shift)),
            Press(Key::Char('X')),
            Release(Key::Char('X')),
            Release(Key::Modifier(Ctrl)),
            Release(Key::Modifier(Shift)),
        ]);
        assert_eq!(*seen.fired.lock(), vec![("left".to_string(), "Ctrl+Shift-X".to_string())]);
        assert_eq!(*seen.history.lock(), vec!['l']);
    }

    #[test]
    fn unmatched_char_reports_history_only() {
        let reader = running_reader();
        let inj = Arc::new(MockInjector::new());
        let seen = Arc::new(Seen::default());
        let d = dispatcher(TriggerTable::default(), &reader, inj.clone(), &seen);

        for b in [b'z', b'L', b'0', b' '] {
            assert_eq!(d.on_byte_received(&[b]).unwrap(), None);
        }
        assert!(inj.take().is_empty());
        assert!(seen.fired.lock().is_empty());
        assert_eq!(*seen.history.lock(), vec!['z', 'L', '0', ' ']);
        assert_eq!(reader.state(), ReaderState::Running);
    }

    #[test]
    fn only_first_byte_of_a_burst_is_dispatched() {
        let reader = running_reader();
        let inj = Arc::new(MockInjector::new());
        let seen = Arc::new(Seen::default());
        let d = dispatcher(TriggerTable::default(), &reader, inj.clone(), &seen);

        d.on_byte_received(b"rl").unwrap();
        assert_eq!(inj.take(), vec![Press(Key::Char('R')), Release(Key::Char('R'))]);
        assert_eq!(*seen.history.lock(), vec!['r']);
    }

    #[test]
    fn empty_and_non_ascii_input_is_ignored() {
        let reader = running_reader();
        let inj = Arc::new(MockInjector::new());
        let seen = Arc::new(Seen::default());
        let d = dispatcher(TriggerTable::default(), &reader, inj.clone(), &seen);

        assert_eq!(d.on_byte_received(&[]).unwrap(), None);
        assert_eq!(d.on_byte_received(&[0xE9]).unwrap(), None);
        assert!(seen.history.lock().is_empty());
        assert!(inj.take().is_empty());
    }

    #[test]
    fn left_wins_when_triggers_collide() {
        let mut table = TriggerTable::default();
        table.set_trigger(Slot::Left, "x").unwrap();
        table.set_trigger(Slot::Right, "x").unwrap();
        let reader = running_reader();
        let inj = Arc::new(MockInjector::new());
        let seen = Arc::new(Seen::default());
        let d = dispatcher(table, &reader, inj.clone(), &seen);

        d.on_byte_received(b"x").unwrap();
        assert_eq!(*seen.fired.lock(), vec![("left".to_string(), "L".to_string())]);
        assert_eq!(inj.take(), vec![Press(Key::Char('L')), Release(Key::Char('L'))]);
    }

    #[test]
    fn injection_failure_releases_held_modifiers_and_resumes() {
        let mut table = TriggerTable::default();
        table.set_modifiers(Slot::Left, &[Ctrl, Alt]);
        let reader = running_reader();
        let inj = Arc::new(MockInjector::failing_on(Key::Char('L')));
        let seen = Arc::new(Seen::default());
        let d = dispatcher(table, &reader, inj.clone(), &seen);

        let err = d.on_byte_received(b"l").unwrap_err();
        assert!(matches!(err, PedalError::Injection(_)));
        assert_eq!(inj.take(), vec![
            Press(Key::Modifier(Ctrl)),
            Press(Key::Modifier(Alt)),
            Release(Key::Modifier(Ctrl)),
            Release(Key::Modifier(Alt)),
        ]);
        assert!(seen.fired.lock().is_empty());
        assert_eq!(*seen.history.lock(), vec!['l']);
        assert_eq!(reader.state(), ReaderState::Running);
    }

    #[test]
    fn failure_on_second_modifier_releases_only_the_first() {
        let mut table = TriggerTable::default();
        table.set_modifiers(Slot::Right, &[Super, Shift]);
        let reader = running_reader();
        let inj = Arc::new(MockInjector::failing_on(Key::Modifier(Shift)));
        let seen = Arc::new(Seen::default());
        let d = dispatcher(table, &reader, inj.clone(), &seen);

        assert!(d.on_byte_received(b"r").is_err());
        assert_eq!(inj.take(), vec![Press(Key::Modifier(Super)), Release(Key::Modifier(Super))]);
    }

    #[test]
    fn handler_errors_reach_the_error_callback() {
        let reader = running_reader();
        let inj = Arc::new(MockInjector::failing_on(Key::Char('R')));
        let seen = Arc::new(Seen::default());
        let d = dispatcher(TriggerTable::default(), &reader, inj, &seen);

        d.on_bytes(b"r");
        d.on_error(PedalError::Injection("x".into()));
        assert_eq!(seen.errors.load(Ordering::SeqCst), 2);
    }

    /// Records overlap and reader state from inside the injection step.
    struct Watchful {
        reader:      ReaderHandle,
        active:      AtomicUsize,
        overlaps:    AtomicUsize,
        not_paused:  AtomicUsize,
        presses:     AtomicUsize,
    }

    impl KeyInjector for Watchful {
        fn press(&self, _key: Key) -> Result<(), PedalError> {
            if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            if self.reader.state() != ReaderState::Paused {
                self.not_paused.fetch_add(1, Ordering::SeqCst);
            }
            thread::sleep(Duration::from_millis(10));
            self.active.fetch_sub(1, Ordering::SeqCst);
            self.presses.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn release(&self, _key: Key) -> Result<(), PedalError> { Ok(()) }
        fn name(&self) -> &str { "watchful" }
    }

    #[test]
    fn slow_injection_is_never_reentered() {
        let handle = ReaderHandle::new();
        let inj = Arc::new(Watchful {
            reader:     handle.clone(),
            active:     AtomicUsize::new(0),
            overlaps:   AtomicUsize::new(0),
            not_paused: AtomicUsize::new(0),
            presses:    AtomicUsize::new(0),
        });
        let seen = Arc::new(Seen::default());
        let d = Arc::new(ActionDispatcher::new(
            Arc::new(RwLock::new(TriggerTable::default())),
            handle.clone(),
            inj.clone(),
            callbacks(&seen),
        ));
        let src = ScriptedSource::new();
        for _ in 0..4 { src.push(b"l"); }
        let mut reader = PollingReader::with_handle(Box::new(src), d, handle);
        reader.start(Duration::from_millis(1));

        let deadline = Instant::now() + Duration::from_secs(3);
        while inj.presses.load(Ordering::SeqCst) < 4 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        reader.stop();

        assert_eq!(inj.presses.load(Ordering::SeqCst), 4);
        assert_eq!(inj.overlaps.load(Ordering::SeqCst), 0);
        assert_eq!(inj.not_paused.load(Ordering::SeqCst), 0);
        assert_eq!(seen.history.lock().len(), 4);
    }
}
