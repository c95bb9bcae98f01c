// src/main.rs  -  pedal-keys  entry point
mod config;
mod error;
mod inject;
mod pedal;
mod serial;
mod tui;

use anyhow::{bail, Context, Result};
use clap::Parser;
use config::{AppConfig, Cli};
use inject::KeyInjector;
use pedal::controller::LinkSettings;
use pedal::{Callbacks, PedalController, TriggerTable};
use std::sync::Arc;
use std::thread;

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli)?;

    // ── --print-config  ───────────────────────────────────────────────────────
    if cli.print_config {
        print!("{}", config::DEFAULT_CONFIG_TOML);
        return Ok(());
    }

    // ── --write-config  ───────────────────────────────────────────────────────
    if cli.write_config {
        let path = AppConfig::write_default_config(&cli)?;
        println!("Config written to: {}", path.display());
        println!("Edit it to set your serial port and pedal keys.");
        return Ok(());
    }

    // ── --list-ports  ─────────────────────────────────────────────────────────
    if cli.list_ports {
        let ports = serial::list_ports();
        if ports.is_empty() {
            println!("No serial ports found.");
        } else {
            println!("Available serial ports:");
            for p in &ports { println!("  {}", p.label()); }
        }
        return Ok(());
    }

    // ── Load config ───────────────────────────────────────────────────────────
    let cfg   = AppConfig::load(&cli)?;
    let table = cfg.trigger_table()?;
    let link  = LinkSettings { baud: cfg.baud, interval: cfg.interval };

    // ── Key injection ─────────────────────────────────────────────────────────
    let injector: Arc<dyn KeyInjector> = Arc::from(inject::create_injector(cfg.injector));
    log::info!("Key injection backend: {}", injector.name());

    #[cfg(feature = "tui")]
    {
        if !cfg.headless {
            return run_tui(&cfg, table, injector, link);
        }
    }

    run_headless(&cfg, table, injector, link)
}

/// stderr in headless mode; silent under the TUI unless a log file is given.
fn init_logging(cli: &Cli) -> Result<()> {
    let tui_owns_terminal = cfg!(feature = "tui") && !cli.headless
        && !(cli.print_config || cli.write_config || cli.list_ports);
    let default = if tui_owns_terminal && cli.log_file.is_none() { "off" } else { "info" };

    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default));
    if let Some(path) = &cli.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Opening log file {:?}", path))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

// ── Headless ──────────────────────────────────────────────────────────────────
fn run_headless(
    cfg:      &AppConfig,
    table:    TriggerTable,
    injector: Arc<dyn KeyInjector>,
    link:     LinkSettings,
) -> Result<()> {
    if cfg.port.is_empty() {
        bail!(
            "No serial port configured.\n  \
             Use --port /dev/ttyUSB0 (Linux) or --port COM3 (Windows),\n  \
             or set `port` under [serial] in the config file.\n  \
             Run `pedal-keys --list-ports` to see all serial ports."
        );
    }

    let callbacks = Callbacks::new()
        .on_history(|c| log::info!("[history] {c:?}"))
        .on_action_fired(|slot, combo| {
            log::info!("Triggered the {slot} action, sending the combination {combo}");
        })
        .on_error(|e| log::error!("{e}"));

    let mut ctl = PedalController::new(table, injector, callbacks, link);
    ctl.open(&cfg.port)?;
    println!("Listening on {}  (Ctrl+C to quit)", ctl.port().unwrap_or(&cfg.port));

    loop {
        thread::park();
    }
}

// ── Setup form ────────────────────────────────────────────────────────────────
#[cfg(feature = "tui")]
const NOTICE_TTL: std::time::Duration = std::time::Duration::from_secs(3);

/// Placeholder shown in the history line while it is empty
#[cfg(feature = "tui")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus { NotConnected, Connecting, Disconnected }

#[cfg(feature = "tui")]
impl LinkStatus {
    fn placeholder(self) -> &'static str {
        match self {
            LinkStatus::NotConnected => "<not connected>",
            LinkStatus::Connecting   => "<connecting>",
            LinkStatus::Disconnected => "<disconnected>",
        }
    }
}

#[cfg(feature = "tui")]
#[derive(Debug, Clone)]
pub struct Notice {
    pub title:   String,
    pub message: String,
    pub shown:   std::time::Instant,
}

#[cfg(feature = "tui")]
impl Notice {
    fn new(title: &str, message: impl Into<String>) -> Self {
        Self { title: title.into(), message: message.into(), shown: std::time::Instant::now() }
    }
}

/// Events forwarded from the reader thread to the UI loop
#[cfg(feature = "tui")]
enum UiEvent {
    History(char),
    Fired { slot: String, combo: String },
    ConfigError { slot: String, value: String },
    Error(String),
}

// ── Shared UI state (passed to TUI draw) ─────────────────────────────────────
#[cfg(feature = "tui")]
pub struct AppState {
    pub ports:       Vec<serial::PortInfo>,
    pub history:     String,
    pub history_len: usize,
    pub link:        LinkStatus,
    pub open:        bool,
    pub injector:    String,
    pub interval_ms: u128,
    pub status:      String,
    pub notice:      Option<Notice>,
    /// Open port and what its reader is doing, for the title bar
    pub reader:      Option<(String, serial::ReaderState)>,
}

#[cfg(feature = "tui")]
impl AppState {
    /// Append a received character; the line starts over once it is full.
    pub fn push_history(&mut self, c: char) {
        if self.history.chars().count() >= self.history_len {
            self.history.clear();
        }
        self.history.push(c);
    }

    pub fn history_text(&self) -> String {
        if self.history.is_empty() {
            self.link.placeholder().to_string()
        } else {
            self.history.clone()
        }
    }

    fn apply(&mut self, ev: UiEvent) {
        match ev {
            UiEvent::History(c) => self.push_history(c),
            UiEvent::Fired { slot, combo } => {
                self.notice = Some(Notice::new(
                    "Triggered!",
                    format!("Triggered the {slot} action, sending the combination {combo}"),
                ));
            }
            UiEvent::ConfigError { slot, value } => {
                self.status = format!("Rejected {value:?} for the {slot} pedal");
            }
            UiEvent::Error(msg) => self.status = msg,
        }
    }
}

#[cfg(feature = "tui")]
fn ui_callbacks(tx: crossbeam_channel::Sender<UiEvent>) -> Callbacks {
    let (t1, t2, t3, t4) = (tx.clone(), tx.clone(), tx.clone(), tx);
    Callbacks::new()
        .on_history(move |c| { let _ = t1.send(UiEvent::History(c)); })
        .on_action_fired(move |slot, combo| {
            let _ = t2.send(UiEvent::Fired { slot: slot.into(), combo: combo.into() });
        })
        .on_config_error(move |slot, value| {
            let _ = t3.send(UiEvent::ConfigError { slot: slot.into(), value: value.into() });
        })
        .on_error(move |e| { let _ = t4.send(UiEvent::Error(e.to_string())); })
}

#[cfg(feature = "tui")]
fn run_tui(
    cfg:      &AppConfig,
    table:    TriggerTable,
    injector: Arc<dyn KeyInjector>,
    link:     LinkSettings,
) -> Result<()> {
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut ctl = PedalController::new(table, Arc::clone(&injector), ui_callbacks(tx), link);

    let mut ports = serial::list_ports();
    let configured = if cfg.port.is_empty() {
        None
    } else {
        match ports.iter().position(|p| p.device == cfg.port) {
            Some(i) => Some(i),
            None => {
                ports.push(serial::PortInfo { device: cfg.port.clone(), description: "Configured port".into() });
                Some(ports.len() - 1)
            }
        }
    };

    let mut form = tui::form::Form::new(&ctl.table(), ports.len());
    form.set_port(configured);

    let mut state = AppState {
        ports,
        history:     String::new(),
        history_len: cfg.history_len,
        link:        LinkStatus::NotConnected,
        open:        false,
        injector:    injector.name().to_string(),
        interval_ms: cfg.interval.as_millis(),
        status:      String::new(),
        notice:      None,
        reader:      None,
    };
    if cfg.auto_open && configured.is_some() {
        toggle_open(&mut ctl, &mut state, &form);
    }

    let mut tui = tui::Tui::new()?;
    let result = ui_loop(&mut tui, &mut ctl, &mut state, &mut form, &rx);
    tui.cleanup();
    ctl.close();
    result
}

#[cfg(feature = "tui")]
fn ui_loop(
    tui:   &mut tui::Tui,
    ctl:   &mut PedalController,
    state: &mut AppState,
    form:  &mut tui::form::Form,
    rx:    &crossbeam_channel::Receiver<UiEvent>,
) -> Result<()> {
    use crossterm::event::{self, Event, KeyEventKind};
    use std::time::Duration;
    use tui::form::FormAction;

    loop {
        // ── Input ─────────────────────────────────────────────────────────────
        while event::poll(Duration::from_millis(0))? {
            let Event::Key(key) = event::read()? else { continue };
            if key.kind == KeyEventKind::Release { continue; }
            // any key dismisses a notice
            if state.notice.take().is_some() { continue; }

            for action in form.handle_key(key) {
                match action {
                    FormAction::Quit => return Ok(()),
                    FormAction::SelectPort(_) => {
                        if ctl.is_open() {
                            ctl.close();
                            state.link = LinkStatus::Disconnected;
                            state.status = "Connection closed".into();
                        }
                        state.open = false;
                        state.history.clear();
                    }
                    FormAction::ToggleOpen => toggle_open(ctl, state, form),
                    FormAction::SetTrigger(slot, value) => {
                        if let Err(e) = ctl.set_trigger(slot, &value) {
                            reject(state, &e, "Can only trigger from one character!");
                        }
                        form.load(&ctl.table());
                    }
                    FormAction::SetKey(slot, value) => {
                        if let Err(e) = ctl.set_key(slot, &value) {
                            reject(state, &e, "Can only press one key at a time!");
                        }
                        form.load(&ctl.table());
                    }
                    FormAction::SetModifiers(slot, mods) => ctl.set_modifiers(slot, &mods),
                }
            }
        }

        // ── Reader events ─────────────────────────────────────────────────────
        while let Ok(ev) = rx.try_recv() {
            state.apply(ev);
        }
        if state.notice.as_ref().is_some_and(|n| n.shown.elapsed() >= NOTICE_TTL) {
            state.notice = None;
        }

        state.reader = ctl.port().map(|p| (p.to_string(), ctl.reader_state()));
        tui.draw(state, form)?;
        thread::sleep(Duration::from_millis(20));
    }
}

#[cfg(feature = "tui")]
fn reject(state: &mut AppState, err: &error::PedalError, notice: &str) {
    if err.is_config() {
        state.notice = Some(Notice::new("Input too long!", notice));
    } else {
        state.status = err.to_string();
    }
}

#[cfg(feature = "tui")]
fn toggle_open(ctl: &mut PedalController, state: &mut AppState, form: &tui::form::Form) {
    state.history.clear();
    if ctl.is_open() {
        ctl.close();
        state.open = false;
        state.link = LinkStatus::Disconnected;
        state.status = "Connection closed".into();
        return;
    }
    let Some(port) = form.port().and_then(|i| state.ports.get(i)) else { return };
    let device = port.device.clone();

    state.link = LinkStatus::Connecting;
    match ctl.open(&device) {
        Ok(()) => {
            state.open = true;
            state.status = format!("Listening on {device}");
        }
        Err(e) => {
            log::error!("{e}");
            state.open = false;
            state.link = LinkStatus::NotConnected;
            state.status = e.to_string();
            state.notice = Some(Notice::new("Cannot open port", e.to_string()));
        }
    }
}
