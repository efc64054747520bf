//! # PasteBox
//!
//! Clipboard history manager for macOS and other desktops.
//!
//! PasteBox watches the system pasteboard, keeps a bounded, de-duplicated
//! history of copied items (text, rich text, images, files, URLs and opaque
//! data) and writes entries back to the pasteboard on request.
#![allow(clippy::module_name_repetitions)]

pub mod automation;
pub mod cli;
pub mod clipboard;
pub mod config;
#[cfg(unix)]
pub mod daemon;
pub mod history;
pub mod hotkey;

pub use config::{Settings, SettingsStore};
pub use history::{ClipboardHistory, ClipboardItem, ItemType};

use std::time::Duration;

/// Result type alias for PasteBox operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for PasteBox operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Pasteboard operation error
    #[error("Clipboard error: {0}")]
    Clipboard(#[from] clipboard::ClipboardError),

    /// History file error
    #[error("Storage error: {0}")]
    Store(#[from] history::store::StoreError),

    /// Hotkey registration or parsing error
    #[error("Hotkey error: {0}")]
    Hotkey(#[from] hotkey::HotkeyError),

    /// Platform automation error
    #[error("Automation error: {0}")]
    Automation(#[from] automation::AutomationError),

    /// Background task failed to complete
    #[error("Task error: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Maximum number of items kept in history
pub const MAX_HISTORY_ITEMS: usize = 1000;

/// Maximum size of a single captured item (50MB)
pub const MAX_ITEM_SIZE: u64 = 50 * 1024 * 1024;

/// Aggregate history size that triggers memory cleanup (100MB)
pub const MAX_MEMORY_USAGE: u64 = 100 * 1024 * 1024;

/// Interval between pasteboard change checks
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
