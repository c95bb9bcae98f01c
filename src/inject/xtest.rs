// src/inject/xtest.rs  -  XTest key injection (Linux / X11)
//
// Key → KeySym → XKeysymToKeycode → XTestFakeKeyEvent, then XFlush so the
// event leaves immediately.  Latin-1 characters map to the KeySym of the same
// value; anything else uses the 0x0100_0000 Unicode KeySym range.
//
// An uppercase letter has the same keycode as its lowercase form, so the
// backend wraps it in Shift_L itself.
//
// Needs a reachable X display (DISPLAY set, same user session).

use super::{Key, KeyInjector};
use crate::error::PedalError;
use crate::pedal::ModifierKey;
use parking_lot::Mutex;
use std::os::raw::{c_int, c_uint, c_ulong};
use std::ptr;
use x11::{keysym, xlib, xtest};

/// `CurrentTime`: let the server timestamp the event
const CURRENT_TIME: c_ulong = 0;

struct Display(*mut xlib::Display);

// The pointer is only touched while holding the mutex.
unsafe impl Send for Display {}

pub struct XTestInjector {
    display: Mutex<Display>,
}

impl XTestInjector {
    pub fn new() -> Result<Self, PedalError> {
        let display = unsafe { xlib::XOpenDisplay(ptr::null()) };
        if display.is_null() {
            return Err(PedalError::Injection("cannot open X display (is DISPLAY set?)".into()));
        }
        log::info!("[inject] XTest display opened");
        Ok(Self { display: Mutex::new(Display(display)) })
    }

    fn keysym(key: Key) -> c_ulong {
        match key {
            Key::Modifier(ModifierKey::Ctrl)  => keysym::XK_Control_L as c_ulong,
            Key::Modifier(ModifierKey::Alt)   => keysym::XK_Alt_L as c_ulong,
            Key::Modifier(ModifierKey::Shift) => keysym::XK_Shift_L as c_ulong,
            Key::Modifier(ModifierKey::Super) => keysym::XK_Super_L as c_ulong,
            Key::Char(c) => {
                let cp = c as u32;
                if (0x20..=0xFF).contains(&cp) { cp as c_ulong } else { (0x0100_0000 | cp) as c_ulong }
            }
        }
    }

    fn send(&self, key: Key, is_press: bool) -> Result<(), PedalError> {
        let shifted = matches!(key, Key::Char(c) if c.is_uppercase());
        let shift = Self::keysym(Key::Modifier(ModifierKey::Shift));
        let d = self.display.lock();
        if shifted && is_press { fake(d.0, shift, true, key)?; }
        fake(d.0, Self::keysym(key), is_press, key)?;
        if shifted && !is_press { fake(d.0, shift, false, key)?; }
        unsafe { xlib::XFlush(d.0) };
        Ok(())
    }
}

fn fake(display: *mut xlib::Display, sym: c_ulong, is_press: bool, key: Key) -> Result<(), PedalError> {
    let code = unsafe { xlib::XKeysymToKeycode(display, sym) };
    if code == 0 {
        return Err(PedalError::Injection(format!("no keycode for '{key}' in the current keymap")));
    }
    let ok = unsafe {
        xtest::XTestFakeKeyEvent(display, code as c_uint, is_press as c_int, CURRENT_TIME)
    };
    if ok == 0 {
        return Err(PedalError::Injection(format!("XTest rejected '{key}'")));
    }
    Ok(())
}

impl KeyInjector for XTestInjector {
    fn press(&self, key: Key) -> Result<(), PedalError>   { self.send(key, true) }
    fn release(&self, key: Key) -> Result<(), PedalError> { self.send(key, false) }
    fn name(&self) -> &str { "x11" }
}

impl Drop for XTestInjector {
    fn drop(&mut self) {
        let d = self.display.get_mut();
        unsafe { xlib::XCloseDisplay(d.0) };
    }
}
