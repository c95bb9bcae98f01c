// src/config.rs  -  Runtime configuration (CLI + TOML)
use crate::pedal::{ModifierKey, PedalSlot, Slot, TriggerTable};
use crate::serial::DEFAULT_BAUD;
use anyhow::{Context, Result};
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// The example config is embedded directly in the binary at compile time.
/// Users can write it out with:  pedal-keys --write-config
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../config.toml.example");

// ── CLI ───────────────────────────────────────────────────────────────────────
#[derive(Parser, Debug, Default)]
#[command(
    name  = "pedal-keys",
    about = "Turn serial foot pedal presses into keyboard shortcuts",
    version,
)]
pub struct Cli {
    /// Config file path (default: ~/.config/pedal-keys/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Serial port of the pedal board (e.g. /dev/ttyUSB0, COM3)
    #[arg(short, long)]
    pub port: Option<String>,

    /// Baud rate (default: 9600)
    #[arg(long)]
    pub baud: Option<u32>,

    /// Polling interval in milliseconds (default: 100)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Key injection backend: auto | x11 | dry-run
    #[arg(long)]
    pub injector: Option<InjectorType>,

    /// Character the left pedal sends
    #[arg(long)]
    pub left_trigger: Option<String>,

    /// Key pressed for the left pedal
    #[arg(long)]
    pub left_key: Option<String>,

    /// Modifier held for the left pedal (repeatable, press order)
    #[arg(long = "left-mod", value_enum)]
    pub left_mods: Vec<ModifierKey>,

    /// Character the right pedal sends
    #[arg(long)]
    pub right_trigger: Option<String>,

    /// Key pressed for the right pedal
    #[arg(long)]
    pub right_key: Option<String>,

    /// Modifier held for the right pedal (repeatable, press order)
    #[arg(long = "right-mod", value_enum)]
    pub right_mods: Vec<ModifierKey>,

    /// Open the port immediately instead of waiting for the toggle
    #[arg(long, action)]
    pub open: bool,

    /// No setup form: open the port and log pedal activity until interrupted
    #[arg(long, action)]
    pub headless: bool,

    /// Write log output to this file instead of stderr
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// List available serial ports and exit
    #[arg(long, action)]
    pub list_ports: bool,

    /// Write the built-in default config.toml to the config path and exit.
    /// Use --config <PATH> to write to a custom location.
    #[arg(long, action)]
    pub write_config: bool,

    /// Print the built-in default config.toml to stdout and exit
    #[arg(long, action)]
    pub print_config: bool,
}

// ── Enums shared across CLI + TOML ────────────────────────────────────────────
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum InjectorType {
    /// XTest when available, dry-run otherwise
    Auto,
    /// XTest on Linux/X11 (needs the inject-x11 feature)
    X11,
    /// Log key events only
    DryRun,
}

// ── TOML file structure ───────────────────────────────────────────────────────
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    pub serial: Option<SerialCfg>,
    pub output: Option<OutputCfg>,
    pub left:   Option<PedalCfg>,
    pub right:  Option<PedalCfg>,
    pub ui:     Option<UiCfg>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialCfg {
    pub port:             Option<String>,
    pub baud:             Option<u32>,
    pub poll_interval_ms: Option<u64>,
    pub auto_open:        Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputCfg {
    pub injector: Option<InjectorType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PedalCfg {
    pub trigger:   Option<String>,
    pub key:       Option<String>,
    /// Any of "ctrl", "alt", "shift", "super", in press order
    pub modifiers: Option<Vec<ModifierKey>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiCfg {
    pub history_len: Option<usize>,
}

// ── Resolved / merged config ──────────────────────────────────────────────────
/// Raw pedal settings; validated when turned into a `TriggerTable`
#[derive(Debug, Clone, PartialEq)]
pub struct PedalSettings {
    pub trigger:   String,
    pub key:       String,
    pub modifiers: Vec<ModifierKey>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port:        String,
    pub baud:        u32,
    pub interval:    Duration,
    pub auto_open:   bool,
    pub injector:    InjectorType,
    pub left:        PedalSettings,
    pub right:       PedalSettings,
    /// Characters shown in the history line before it starts over
    pub history_len: usize,
    pub headless:    bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port:        String::new(),
            baud:        DEFAULT_BAUD,
            interval:    crate::serial::reader::DEFAULT_INTERVAL,
            auto_open:   false,
            injector:    InjectorType::Auto,
            left:        PedalSettings { trigger: "l".into(), key: "L".into(), modifiers: vec![] },
            right:       PedalSettings { trigger: "r".into(), key: "R".into(), modifiers: vec![] },
            history_len: 10,
            headless:    false,
        }
    }
}

// ── Config loader ─────────────────────────────────────────────────────────────
impl AppConfig {
    /// Write the embedded default config to disk.
    /// Returns the path it was written to.
    pub fn write_default_config(cli: &Cli) -> Result<PathBuf> {
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating config directory {:?}", parent))?;
        }
        std::fs::write(&path, DEFAULT_CONFIG_TOML)
            .with_context(|| format!("Writing config to {:?}", path))?;
        Ok(path)
    }

    pub fn load(cli: &Cli) -> Result<Self> {
        let mut cfg = Self::default();

        // 1. Load TOML file
        let path = cli.config.clone().unwrap_or_else(default_config_path);
        if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Reading config {:?}", path))?;
            cfg.apply_toml(&raw)
                .with_context(|| format!("Parsing config {:?}", path))?;
        } else {
            log::info!("No config file at {}, using defaults", path.display());
        }

        // 2. Apply CLI overrides
        cfg.apply_cli(cli);
        Ok(cfg)
    }

    fn apply_toml(&mut self, raw: &str) -> Result<()> {
        let fc: FileConfig = toml::from_str(raw)?;
        self.apply_file(&fc);
        Ok(())
    }

    fn apply_file(&mut self, fc: &FileConfig) {
        if let Some(s) = &fc.serial {
            if let Some(v) = &s.port            { self.port      = v.clone(); }
            if let Some(v) = s.baud             { self.baud      = v; }
            if let Some(v) = s.poll_interval_ms { self.interval  = Duration::from_millis(v); }
            if let Some(v) = s.auto_open        { self.auto_open = v; }
        }
        if let Some(o) = &fc.output {
            if let Some(v) = o.injector { self.injector = v; }
        }
        if let Some(p) = &fc.left  { apply_pedal(&mut self.left, p); }
        if let Some(p) = &fc.right { apply_pedal(&mut self.right, p); }
        if let Some(u) = &fc.ui {
            if let Some(v) = u.history_len { self.history_len = v.max(1); }
        }
    }

    fn apply_cli(&mut self, cli: &Cli) {
        if let Some(v) = &cli.port          { self.port        = v.clone(); }
        if let Some(v) = cli.baud           { self.baud        = v; }
        if let Some(v) = cli.interval_ms    { self.interval    = Duration::from_millis(v); }
        if let Some(v) = cli.injector       { self.injector    = v; }
        if let Some(v) = &cli.left_trigger  { self.left.trigger  = v.clone(); }
        if let Some(v) = &cli.left_key      { self.left.key      = v.clone(); }
        if !cli.left_mods.is_empty()        { self.left.modifiers  = cli.left_mods.clone(); }
        if let Some(v) = &cli.right_trigger { self.right.trigger = v.clone(); }
        if let Some(v) = &cli.right_key     { self.right.key     = v.clone(); }
        if !cli.right_mods.is_empty()       { self.right.modifiers = cli.right_mods.clone(); }
        if cli.open                         { self.auto_open   = true; }
        if cli.headless                     { self.headless    = true; }
    }

    pub fn pedal(&self, slot: Slot) -> &PedalSettings {
        match slot {
            Slot::Left  => &self.left,
            Slot::Right => &self.right,
        }
    }

    /// Validate the pedal settings through the table setters.
    pub fn trigger_table(&self) -> Result<TriggerTable> {
        let mut table = TriggerTable::new(PedalSlot::default(), PedalSlot::default());
        for slot in Slot::ALL {
            let p = self.pedal(slot);
            table.set_trigger(slot, &p.trigger).context("Invalid pedal configuration")?;
            table.set_key(slot, &p.key).context("Invalid pedal configuration")?;
            table.set_modifiers(slot, &p.modifiers);
        }
        Ok(table)
    }
}

fn apply_pedal(dst: &mut PedalSettings, src: &PedalCfg) {
    if let Some(v) = &src.trigger   { dst.trigger   = v.clone(); }
    if let Some(v) = &src.key       { dst.key       = v.clone(); }
    if let Some(v) = &src.modifiers { dst.modifiers = v.clone(); }
}

fn default_config_path() -> PathBuf {
    dirs_next().join("pedal-keys").join("config.toml")
}

fn dirs_next() -> PathBuf {
    if let Ok(v) = std::env::var("XDG_CONFIG_HOME") { return PathBuf::from(v); }
    if let Ok(v) = std::env::var("APPDATA")          { return PathBuf::from(v); }
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_default();
    PathBuf::from(home).join(".config")
}

#[cfg(test)]
mod tests {
    use super::*;
    use ModifierKey::*;

    #[test]
    fn embedded_example_parses_to_defaults() {
        let mut cfg = AppConfig::default();
        cfg.apply_toml(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(cfg.baud, 9_600);
        assert_eq!(cfg.interval, Duration::from_millis(100));
        assert_eq!(cfg.injector, InjectorType::Auto);
        assert_eq!(cfg.left, AppConfig::default().left);
        assert_eq!(cfg.trigger_table().unwrap(), TriggerTable::default());
    }

    #[test]
    fn file_values_override_defaults() {
        let mut cfg = AppConfig::default();
        cfg.apply_toml(r#"
            [serial]
            port = "/dev/ttyACM0"
            poll_interval_ms = 20
            [output]
            injector = "dry_run"
            [right]
            trigger = "b"
            key = "v"
            modifiers = ["ctrl", "shift"]
            [ui]
            history_len = 0
        "#).unwrap();
        assert_eq!(cfg.port, "/dev/ttyACM0");
        assert_eq!(cfg.interval, Duration::from_millis(20));
        assert_eq!(cfg.injector, InjectorType::DryRun);
        assert_eq!(cfg.right.modifiers, vec![Ctrl, Shift]);
        assert_eq!(cfg.history_len, 1);

        let t = cfg.trigger_table().unwrap();
        let a = t.lookup('b').unwrap();
        assert_eq!(a.describe(), "Ctrl+Shift-v");
    }

    #[test]
    fn unknown_modifier_is_rejected_by_the_parser() {
        let mut cfg = AppConfig::default();
        assert!(cfg.apply_toml("[left]\nmodifiers = [\"hyper\"]\n").is_err());
    }

    #[test]
    fn invalid_pedal_values_fail_validation() {
        let mut cfg = AppConfig::default();
        cfg.left.trigger = "ll".into();
        assert!(cfg.trigger_table().is_err());
    }

    #[test]
    fn cli_overrides_file() {
        let mut cfg = AppConfig::default();
        cfg.apply_toml("[serial]\nport = \"COM1\"\nbaud = 19200\n").unwrap();
        let cli = Cli::parse_from([
            "pedal-keys", "--port", "COM4", "--left-key", "k",
            "--left-mod", "alt", "--left-mod", "super", "--open", "--injector", "dry-run",
        ]);
        cfg.apply_cli(&cli);
        assert_eq!(cfg.port, "COM4");
        assert_eq!(cfg.baud, 19_200);
        assert_eq!(cfg.left.key, "k");
        assert_eq!(cfg.left.modifiers, vec![Alt, Super]);
        assert!(cfg.auto_open);
        assert_eq!(cfg.injector, InjectorType::DryRun);
    }
}
