// src/tui/form.rs  -  Setup form: focus, edit buffers, key → action
//
// The form never touches the controller.  `handle_key` turns a key press into
// zero or more `FormAction`s; the main loop applies them and calls `load`
// afterwards so rejected edits snap back to the last valid value.

use crate::pedal::{ModifierKey, Slot, TriggerTable};
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Port,
    Open,
    Trigger(Slot),
    Modifiers(Slot),
    Key(Slot),
}

/// Tab order, top to bottom, left column before right
pub const FIELDS: [Field; 8] = [
    Field::Port,
    Field::Open,
    Field::Trigger(Slot::Left),
    Field::Trigger(Slot::Right),
    Field::Modifiers(Slot::Left),
    Field::Modifiers(Slot::Right),
    Field::Key(Slot::Left),
    Field::Key(Slot::Right),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormAction {
    SelectPort(Option<usize>),
    ToggleOpen,
    SetTrigger(Slot, String),
    SetKey(Slot, String),
    SetModifiers(Slot, Vec<ModifierKey>),
    Quit,
}

#[derive(Debug, Clone, Default)]
struct PedalFields {
    trigger:       String,
    key:           String,
    modifiers:     Vec<ModifierKey>,
    mod_cursor:    usize,
    saved_trigger: String,
    saved_key:     String,
}

#[derive(Debug, Clone)]
pub struct Form {
    focus:      usize,
    port_count: usize,
    port:       Option<usize>,
    pedals:     [PedalFields; 2],
}

fn idx(slot: Slot) -> usize {
    match slot {
        Slot::Left  => 0,
        Slot::Right => 1,
    }
}

impl Form {
    pub fn new(table: &TriggerTable, port_count: usize) -> Self {
        let mut form = Self { focus: 0, port_count, port: None, pedals: Default::default() };
        form.load(table);
        form
    }

    /// Reset every edit buffer to what the table holds.
    pub fn load(&mut self, table: &TriggerTable) {
        for slot in Slot::ALL {
            let p = table.slot(slot);
            let f = &mut self.pedals[idx(slot)];
            f.trigger   = p.trigger.map(String::from).unwrap_or_default();
            f.key       = p.key.map(String::from).unwrap_or_default();
            f.modifiers = p.modifiers.clone();
            f.saved_trigger = f.trigger.clone();
            f.saved_key     = f.key.clone();
        }
    }

    pub fn focus(&self) -> Field { FIELDS[self.focus] }

    pub fn port(&self) -> Option<usize> { self.port }

    pub fn set_port(&mut self, port: Option<usize>) {
        self.port = port.filter(|&p| p < self.port_count);
    }

    pub fn trigger_text(&self, slot: Slot) -> &str { &self.pedals[idx(slot)].trigger }

    pub fn key_text(&self, slot: Slot) -> &str { &self.pedals[idx(slot)].key }

    pub fn modifiers(&self, slot: Slot) -> &[ModifierKey] { &self.pedals[idx(slot)].modifiers }

    pub fn mod_cursor(&self, slot: Slot) -> usize { self.pedals[idx(slot)].mod_cursor }

    pub fn handle_key(&mut self, key: KeyEvent) -> Vec<FormAction> {
        if key.kind == KeyEventKind::Release { return vec![]; }
        if key.code == KeyCode::Esc
            || (key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL))
        {
            return vec![FormAction::Quit];
        }

        match key.code {
            KeyCode::Tab | KeyCode::Down => return self.move_focus(1),
            KeyCode::BackTab | KeyCode::Up => return self.move_focus(FIELDS.len() - 1),
            _ => {}
        }

        match self.focus() {
            Field::Port         => self.edit_port(key.code),
            Field::Open         => self.edit_open(key.code),
            Field::Trigger(s)   => self.edit_text(s, false, key.code),
            Field::Key(s)       => self.edit_text(s, true, key.code),
            Field::Modifiers(s) => self.edit_modifiers(s, key.code),
        }
    }

    fn move_focus(&mut self, step: usize) -> Vec<FormAction> {
        let out = self.commit_if_dirty();
        self.focus = (self.focus + step) % FIELDS.len();
        out
    }

    /// Leaving a text field applies what was typed.
    fn commit_if_dirty(&mut self) -> Vec<FormAction> {
        match self.focus() {
            Field::Trigger(s) => {
                let f = &self.pedals[idx(s)];
                if f.trigger != f.saved_trigger { return vec![FormAction::SetTrigger(s, f.trigger.clone())]; }
            }
            Field::Key(s) => {
                let f = &self.pedals[idx(s)];
                if f.key != f.saved_key { return vec![FormAction::SetKey(s, f.key.clone())]; }
            }
            _ => {}
        }
        vec![]
    }

    fn edit_port(&mut self, code: KeyCode) -> Vec<FormAction> {
        if self.port_count == 0 { return vec![]; }
        let next = match code {
            KeyCode::Right | KeyCode::Char(' ') | KeyCode::Enter =>
                Some(self.port.map_or(0, |p| (p + 1) % self.port_count)),
            KeyCode::Left =>
                Some(self.port.map_or(self.port_count - 1, |p| (p + self.port_count - 1) % self.port_count)),
            KeyCode::Backspace | KeyCode::Delete => None,
            _ => return vec![],
        };
        if next == self.port { return vec![]; }
        self.port = next;
        vec![FormAction::SelectPort(next)]
    }

    fn edit_open(&mut self, code: KeyCode) -> Vec<FormAction> {
        match code {
            KeyCode::Char(' ') | KeyCode::Enter if self.port.is_some() => vec![FormAction::ToggleOpen],
            _ => vec![],
        }
    }

    fn edit_text(&mut self, slot: Slot, is_key: bool, code: KeyCode) -> Vec<FormAction> {
        let f = &mut self.pedals[idx(slot)];
        let buf = if is_key { &mut f.key } else { &mut f.trigger };
        match code {
            KeyCode::Char(c)   => { buf.push(c); vec![] }
            KeyCode::Backspace => { buf.pop(); vec![] }
            KeyCode::Enter if is_key => vec![FormAction::SetKey(slot, buf.clone())],
            KeyCode::Enter           => vec![FormAction::SetTrigger(slot, buf.clone())],
            _ => vec![],
        }
    }

    fn edit_modifiers(&mut self, slot: Slot, code: KeyCode) -> Vec<FormAction> {
        let f = &mut self.pedals[idx(slot)];
        let n = ModifierKey::ALL.len();
        match code {
            KeyCode::Right => { f.mod_cursor = (f.mod_cursor + 1) % n; vec![] }
            KeyCode::Left  => { f.mod_cursor = (f.mod_cursor + n - 1) % n; vec![] }
            KeyCode::Char(' ') | KeyCode::Enter => {
                let m = ModifierKey::ALL[f.mod_cursor];
                if let Some(pos) = f.modifiers.iter().position(|&x| x == m) {
                    f.modifiers.remove(pos);
                } else {
                    f.modifiers.push(m);
                }
                vec![FormAction::SetModifiers(slot, f.modifiers.clone())]
            }
            _ => vec![],
        }
    }
}
