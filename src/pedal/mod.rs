// src/pedal/mod.rs  -  Pedal slots, modifier keys, trigger table + dispatch
pub mod controller;
pub mod dispatch;
pub mod table;

pub use controller::PedalController;
pub use dispatch::{ActionDispatcher, Callbacks};
pub use table::{Action, TriggerTable};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ── Slot ──────────────────────────────────────────────────────────────────────
/// One logical pedal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot { Left, Right }

impl Slot {
    pub const ALL: [Slot; 2] = [Slot::Left, Slot::Right];

    pub fn name(self) -> &'static str {
        match self {
            Slot::Left  => "left",
            Slot::Right => "right",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.name()) }
}

// ── Modifier keys ─────────────────────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModifierKey { Ctrl, Alt, Shift, Super }

impl ModifierKey {
    /// Fixed order used by the setup form.
    pub const ALL: [ModifierKey; 4] =
        [ModifierKey::Ctrl, ModifierKey::Alt, ModifierKey::Shift, ModifierKey::Super];

    /// Label used in combination descriptions, e.g. "Ctrl+Alt-X".
    pub fn label(self) -> &'static str {
        match self {
            ModifierKey::Ctrl  => "Ctrl",
            ModifierKey::Alt   => "Alt",
            ModifierKey::Shift => "Shift",
            ModifierKey::Super => "Super",
        }
    }
}

impl fmt::Display for ModifierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.label()) }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownModifier(pub String);

impl fmt::Display for UnknownModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown modifier '{}' (expected ctrl, alt, shift or super)", self.0)
    }
}

impl std::error::Error for UnknownModifier {}

impl FromStr for ModifierKey {
    type Err = UnknownModifier;

    /// Case-insensitive; "cmd" and "meta" are accepted for Super.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ctrl" | "control"        => Ok(ModifierKey::Ctrl),
            "alt"                     => Ok(ModifierKey::Alt),
            "shift"                   => Ok(ModifierKey::Shift),
            "super" | "cmd" | "meta"  => Ok(ModifierKey::Super),
            _                         => Err(UnknownModifier(s.to_string())),
        }
    }
}

// ── PedalSlot ─────────────────────────────────────────────────────────────────
/// Configuration for one pedal. Only changed through `TriggerTable` setters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PedalSlot {
    pub trigger:   Option<char>,
    /// Press order = insertion order, no duplicates
    pub modifiers: Vec<ModifierKey>,
    pub key:       Option<char>,
}

impl PedalSlot {
    pub fn new(trigger: char, key: char) -> Self {
        Self { trigger: Some(trigger), modifiers: Vec::new(), key: Some(key) }
    }
}
