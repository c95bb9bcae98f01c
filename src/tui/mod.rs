// src/tui/mod.rs  -  ratatui setup form
#[cfg(feature = "tui")]
pub mod form;
#[cfg(feature = "tui")]
mod inner;
#[cfg(feature = "tui")]
pub use inner::Tui;
