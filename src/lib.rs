#[macro_use]
pub mod logging;

pub mod config;
pub mod content;
pub mod document;
pub mod filter;
pub mod portal;
pub mod scroll_spy;
pub mod tui;
