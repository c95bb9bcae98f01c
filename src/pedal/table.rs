// src/pedal/table.rs  -  Trigger character → key combination lookup
//
// Pure data: no I/O, no locking.  The controller wraps the table in a
// single RwLock shared with the dispatcher.

use super::{ModifierKey, PedalSlot, Slot};
use crate::error::PedalError;
use std::fmt;

/// Resolved action for a matched trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Action {
    pub slot:      Slot,
    pub key:       char,
    pub modifiers: Vec<ModifierKey>,
}

impl Action {
    /// Human-readable combination: "L", "Ctrl-L", "Ctrl+Alt-X"
    pub fn describe(&self) -> String {
        if self.modifiers.is_empty() {
            return self.key.to_string();
        }
        let mods: Vec<&str> = self.modifiers.iter().map(|m| m.label()).collect();
        format!("{}-{}", mods.join("+"), self.key)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.describe()) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerTable {
    left:  PedalSlot,
    right: PedalSlot,
}

impl Default for TriggerTable {
    /// left: 'l' → L, right: 'r' → R, no modifiers
    fn default() -> Self {
        Self {
            left:  PedalSlot::new('l', 'L'),
            right: PedalSlot::new('r', 'R'),
        }
    }
}

impl TriggerTable {
    pub fn new(left: PedalSlot, right: PedalSlot) -> Self { Self { left, right } }

    pub fn slot(&self, slot: Slot) -> &PedalSlot {
        match slot {
            Slot::Left  => &self.left,
            Slot::Right => &self.right,
        }
    }

    fn slot_mut(&mut self, slot: Slot) -> &mut PedalSlot {
        match slot {
            Slot::Left  => &mut self.left,
            Slot::Right => &mut self.right,
        }
    }

    /// Store a trigger.  On error the previous trigger is kept.
    /// Only ASCII triggers are accepted: the pedal link is decoded as ASCII.
    pub fn set_trigger(&mut self, slot: Slot, value: &str) -> Result<(), PedalError> {
        let c = single_char(value)
            .filter(char::is_ascii)
            .ok_or_else(|| PedalError::InvalidTrigger { slot, value: value.to_string() })?;
        self.slot_mut(slot).trigger = Some(c);
        Ok(())
    }

    /// Store the output key.  On error the previous key is kept.
    pub fn set_key(&mut self, slot: Slot, value: &str) -> Result<(), PedalError> {
        let c = single_char(value)
            .ok_or_else(|| PedalError::InvalidKey { slot, value: value.to_string() })?;
        self.slot_mut(slot).key = Some(c);
        Ok(())
    }

    /// Replace the modifier list.  Names must already be resolved to
    /// `ModifierKey` (see its `FromStr`); duplicates keep their first position.
    pub fn set_modifiers(&mut self, slot: Slot, modifiers: &[ModifierKey]) {
        let mut out: Vec<ModifierKey> = Vec::with_capacity(modifiers.len());
        for m in modifiers {
            if !out.contains(m) { out.push(*m); }
        }
        self.slot_mut(slot).modifiers = out;
    }

    /// Find the action for a decoded character.  Left wins when both slots
    /// share a trigger.  A slot without a key never matches.
    pub fn lookup(&self, c: char) -> Option<Action> {
        Slot::ALL.iter().find_map(|&slot| {
            let p = self.slot(slot);
            if p.trigger != Some(c) { return None; }
            match p.key {
                Some(key) => Some(Action { slot, key, modifiers: p.modifiers.clone() }),
                None => {
                    log::warn!("[table] {slot} trigger '{c}' matched but no key is configured");
                    None
                }
            }
        })
    }
}

fn single_char(value: &str) -> Option<char> {
    let mut chars = value.trim().chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Some(c),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ModifierKey::*;

    #[test]
    fn defaults_match_l_and_r() {
        let t = TriggerTable::default();
        let left = t.lookup('l').unwrap();
        assert_eq!(left.slot, Slot::Left);
        assert_eq!(left.key, 'L');
        assert!(left.modifiers.is_empty());
        assert_eq!(t.lookup('r').unwrap().key, 'R');
    }

    #[test]
    fn unconfigured_chars_do_not_match() {
        let t = TriggerTable::default();
        for c in ['z', 'L', 'R', ' ', '0', '\n'] {
            assert_eq!(t.lookup(c), None, "{c:?}");
        }
    }

    #[test]
    fn trigger_is_trimmed() {
        let mut t = TriggerTable::default();
        t.set_trigger(Slot::Right, "  x \n").unwrap();
        assert_eq!(t.slot(Slot::Right).trigger, Some('x'));
    }

    #[test]
    fn bad_trigger_keeps_previous_value() {
        let mut t = TriggerTable::default();
        for bad in ["", "   ", "ab", " xy ", "lll"] {
            let err = t.set_trigger(Slot::Left, bad).unwrap_err();
            assert!(matches!(err, PedalError::InvalidTrigger { slot: Slot::Left, .. }));
            assert_eq!(t.slot(Slot::Left).trigger, Some('l'));
        }
    }

    #[test]
    fn bad_key_keeps_previous_value() {
        let mut t = TriggerTable::default();
        for bad in ["", "LL", "\t"] {
            let err = t.set_key(Slot::Right, bad).unwrap_err();
            assert!(matches!(err, PedalError::InvalidKey { slot: Slot::Right, .. }));
            assert_eq!(t.slot(Slot::Right).key, Some('R'));
        }
    }

    #[test]
    fn multibyte_character_counts_as_one() {
        let mut t = TriggerTable::default();
        t.set_key(Slot::Left, "é").unwrap();
        assert_eq!(t.slot(Slot::Left).key, Some('é'));
    }

    #[test]
    fn left_wins_on_shared_trigger() {
        let mut t = TriggerTable::default();
        t.set_trigger(Slot::Left, "x").unwrap();
        t.set_trigger(Slot::Right, "x").unwrap();
        let a = t.lookup('x').unwrap();
        assert_eq!(a.slot, Slot::Left);
        assert_eq!(a.key, 'L');
    }

    #[test]
    fn modifiers_keep_insertion_order_without_duplicates() {
        let mut t = TriggerTable::default();
        t.set_modifiers(Slot::Left, &[Shift, Ctrl, Shift, Super]);
        assert_eq!(t.slot(Slot::Left).modifiers, vec![Shift, Ctrl, Super]);
        t.set_modifiers(Slot::Left, &[]);
        assert!(t.slot(Slot::Left).modifiers.is_empty());
    }

    #[test]
    fn describe_formats_combination() {
        let a = Action { slot: Slot::Left, key: 'X', modifiers: vec![Ctrl, Alt] };
        assert_eq!(a.describe(), "Ctrl+Alt-X");
        let b = Action { slot: Slot::Right, key: 'R', modifiers: vec![] };
        assert_eq!(b.to_string(), "R");
    }

    #[test]
    fn slot_without_key_never_matches() {
        let mut left = PedalSlot::new('q', 'Q');
        left.key = None;
        let t = TriggerTable::new(left, PedalSlot::new('r', 'R'));
        assert_eq!(t.lookup('q'), None);
    }

    #[test]
    fn non_ascii_trigger_is_rejected() {
        let mut t = TriggerTable::default();
        let err = t.set_trigger(Slot::Right, "é").unwrap_err();
        assert!(matches!(err, PedalError::InvalidTrigger { slot: Slot::Right, .. }));
        assert_eq!(t.slot(Slot::Right).trigger, Some('r'));
    }
}
