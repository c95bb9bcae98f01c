// src/inject/mod.rs  -  KeyInjector trait + backend registry
#[cfg(all(feature = "inject-x11", target_os = "linux"))]
pub mod xtest;
#[cfg(test)]
pub mod mock;

use crate::config::InjectorType;
use crate::error::PedalError;
use crate::pedal::ModifierKey;
use std::fmt;

/// A key the injector can press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Modifier(ModifierKey),
    Char(char),
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Modifier(m) => write!(f, "{m}"),
            Key::Char(c)     => write!(f, "{c}"),
        }
    }
}

/// Synthetic keyboard events on the host.
pub trait KeyInjector: Send + Sync {
    fn press(&self, key: Key) -> Result<(), PedalError>;
    fn release(&self, key: Key) -> Result<(), PedalError>;
    /// Human-readable backend name
    fn name(&self) -> &str;
}

/// Dry-run backend: logs the sequence, touches nothing
pub struct LogInjector;

impl KeyInjector for LogInjector {
    fn press(&self, key: Key) -> Result<(), PedalError> {
        log::info!("[inject] press   {key}");
        Ok(())
    }
    fn release(&self, key: Key) -> Result<(), PedalError> {
        log::info!("[inject] release {key}");
        Ok(())
    }
    fn name(&self) -> &str { "dry-run" }
}

/// Factory.  `Auto` tries XTest when compiled in and falls back to dry-run.
pub fn create_injector(kind: InjectorType) -> Box<dyn KeyInjector> {
    match kind {
        InjectorType::DryRun => Box::new(LogInjector),
        InjectorType::X11 | InjectorType::Auto => {
            #[cfg(all(feature = "inject-x11", target_os = "linux"))]
            {
                match xtest::XTestInjector::new() {
                    Ok(i)  => return Box::new(i),
                    Err(e) => log::warn!("[inject] XTest unavailable: {e}  →  dry-run"),
                }
            }
            #[cfg(not(all(feature = "inject-x11", target_os = "linux")))]
            {
                if kind == InjectorType::X11 {
                    log::warn!("[inject] injector = \"x11\" but this build has no XTest support  →  dry-run");
                } else {
                    log::warn!("[inject] no key injection backend compiled in  →  dry-run");
                }
            }
            Box::new(LogInjector)
        }
    }
}
