use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::automation::platform_automation;
use crate::clipboard::{create_provider, MemoryPasteboard, Pasteboard};
use crate::config::{Settings, SettingsStore};
use crate::history::{
    format_size, ClipboardHistory, ClipboardItem, HistoryEvent, HistoryLimits, HistoryQuery,
    ItemType, PersistenceStore, SortOption,
};
use crate::hotkey::{HotKeyAction, HotKeyManager, HotkeyBinding};

/// Interval between scheduled expiry runs while running
const CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Parser)]
#[command(name = "pastebox")]
#[command(about = "Clipboard history manager")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Capture clipboard changes until interrupted")]
    Start {
        /// Do not register the global hotkey
        #[arg(long)]
        no_hotkey: bool,
    },

    #[command(about = "Stop the running capture process")]
    Stop,

    #[command(about = "Show PasteBox status")]
    Status,

    #[command(about = "Show clipboard history")]
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,

        /// Case-insensitive text to search for
        #[arg(short, long)]
        search: Option<String>,

        /// Only items of this type (text also matches richText)
        #[arg(short = 't', long = "type")]
        item_type: Option<ItemType>,

        /// Only favorites
        #[arg(short, long)]
        favorites: bool,

        #[arg(long, value_enum, default_value_t = SortOption::DateDesc)]
        sort: SortOption,
    },

    #[command(about = "Copy a history item back to the clipboard")]
    Copy { id: String },

    #[command(about = "Copy a history item and paste it into the frontmost app")]
    Paste { id: String },

    #[command(about = "Delete a history item")]
    Delete { id: String },

    #[command(about = "Toggle the favorite flag of a history item")]
    Favorite { id: String },

    #[command(about = "Delete all history items")]
    Clear,

    #[command(about = "Export history to a file")]
    Export { path: PathBuf },

    #[command(about = "Import history from an exported file")]
    Import { path: PathBuf },

    #[command(about = "Remove expired items")]
    Cleanup {
        /// Override the configured retention in days
        #[arg(long)]
        days: Option<u32>,

        /// Also remove every item of this type (repeatable)
        #[arg(short = 't', long = "type")]
        types: Vec<ItemType>,

        /// Also remove items larger than this many bytes
        #[arg(long, value_name = "BYTES")]
        larger_than: Option<u64>,
    },

    #[command(about = "Remove items with duplicate content from storage")]
    Optimize,

    #[command(about = "Show history usage statistics")]
    Stats,

    #[command(about = "Configuration management")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    #[command(about = "Show current configuration")]
    Show,

    #[command(about = "Generate example configuration")]
    Init {
        #[arg(long)]
        force: bool,
    },

    #[command(about = "Validate configuration")]
    Validate,
}

pub struct CliHandler {
    settings: Arc<SettingsStore>,
    config_path: Option<PathBuf>,
    history: Option<Arc<ClipboardHistory>>,
}

impl CliHandler {
    pub fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let settings = SettingsStore::load(config_path.as_deref()).with_context(|| match &config_path {
            Some(path) => format!("Failed to load settings from {}", path.display()),
            None => "Failed to load settings".to_string(),
        })?;

        Ok(Self {
            settings: Arc::new(settings),
            config_path,
            history: None,
        })
    }

    /// Configured log level
    pub fn log_level(&self) -> String {
        self.settings.get().log_level
    }

    /// Lazily build the engine and load the saved history
    async fn ensure_history(&mut self) -> Result<Arc<ClipboardHistory>> {
        if let Some(history) = &self.history {
            return Ok(Arc::clone(history));
        }

        let settings = self.settings.get();
        let pasteboard: Arc<dyn Pasteboard> = match create_provider() {
            Ok(provider) => provider,
            Err(e) => {
                warn!("System clipboard unavailable ({}), using an in-process one", e);
                Arc::new(MemoryPasteboard::new())
            }
        };
        let store = PersistenceStore::new(&settings.storage.data_dir).with_context(|| {
            format!("Failed to open data directory {}", settings.storage.data_dir.display())
        })?;

        let history = ClipboardHistory::new(
            pasteboard,
            store,
            Arc::clone(&self.settings),
            platform_automation(),
            HistoryLimits::from_settings(&settings),
        );
        history.load_items().await?;

        self.history = Some(Arc::clone(&history));
        Ok(history)
    }

    /// Find the item whose id starts with `prefix`
    async fn resolve_item(&mut self, prefix: &str) -> Result<ClipboardItem> {
        let history = self.ensure_history().await?;
        let prefix = prefix.trim().to_lowercase();
        if prefix.is_empty() {
            bail!("Item id must not be empty");
        }

        let mut matches: Vec<ClipboardItem> = history
            .items()
            .await
            .into_iter()
            .filter(|item| item.id().to_string().starts_with(&prefix))
            .collect();

        match matches.len() {
            0 => Err(anyhow!("No history item matches '{}'", prefix)),
            1 => Ok(matches.remove(0)),
            n => Err(anyhow!("'{}' matches {} items; use a longer prefix", prefix, n)),
        }
    }

    pub async fn handle_command(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Start { no_hotkey } => self.start(no_hotkey).await,
            Commands::Stop => self.stop(),
            Commands::Status => self.show_status().await,
            Commands::History {
                limit,
                search,
                item_type,
                favorites,
                sort,
            } => {
                let query = HistoryQuery {
                    search,
                    item_type,
                    favorites_only: favorites,
                    sort,
                    limit: Some(limit),
                };
                self.show_history(&query).await
            }
            Commands::Copy { id } => self.copy_item(&id).await,
            Commands::Paste { id } => self.paste_item(&id).await,
            Commands::Delete { id } => self.delete_item(&id).await,
            Commands::Favorite { id } => self.toggle_favorite(&id).await,
            Commands::Clear => self.clear().await,
            Commands::Export { path } => self.export(path).await,
            Commands::Import { path } => self.import(path).await,
            Commands::Cleanup {
                days,
                types,
                larger_than,
            } => self.cleanup(days, &types, larger_than).await,
            Commands::Optimize => self.optimize().await,
            Commands::Stats => self.show_stats().await,
            Commands::Config { action } => self.handle_config_action(action),
        }
    }

    async fn start(&mut self, no_hotkey: bool) -> Result<()> {
        #[cfg(unix)]
        let _pid_guard = crate::daemon::PidFile::default_location()?.acquire()?;

        let history = self.ensure_history().await?;
        info!("PasteBox started with {} items", history.len().await);

        let cleanup_task = {
            let history = Arc::clone(&history);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(CLEANUP_INTERVAL);
                loop {
                    ticker.tick().await;
                    if let Err(e) = history.perform_scheduled_cleanup().await {
                        warn!("Scheduled cleanup failed: {}", e);
                    }
                }
            })
        };

        let event_task = {
            let mut events = history.subscribe();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(HistoryEvent::Added(item)) => {
                            info!("Captured {} ({})", item.item_type(), item.display_content())
                        }
                        Ok(event) => debug!("History event: {:?}", event),
                        Err(RecvError::Lagged(n)) => debug!("Missed {} history events", n),
                        Err(RecvError::Closed) => break,
                    }
                }
            })
        };

        history.start_monitoring().await?;

        let hotkeys = if no_hotkey {
            None
        } else {
            self.start_hotkeys(&history)
        };

        #[cfg(unix)]
        crate::daemon::wait_for_shutdown().await?;
        #[cfg(not(unix))]
        tokio::signal::ctrl_c().await?;

        history.stop_monitoring();
        drop(hotkeys);
        cleanup_task.abort();
        event_task.abort();
        history.flush().await;
        info!("PasteBox stopped");
        Ok(())
    }

    /// Register the show-history hotkey; failures only disable the hotkey
    fn start_hotkeys(&self, history: &Arc<ClipboardHistory>) -> Option<HotKeyManager> {
        let binding_str = self.settings.get().hotkey.show_history;
        let result = HotkeyBinding::parse(&binding_str)
            .map_err(anyhow::Error::from)
            .and_then(|binding| {
                let mut manager = HotKeyManager::new()?;
                manager.register(binding, HotKeyAction::ShowHistory)?;
                Ok(manager)
            });

        let manager = match result {
            Ok(manager) => manager,
            Err(e) => {
                warn!("Global hotkey disabled: {}", e);
                return None;
            }
        };

        let mut actions = manager.subscribe();
        let history = Arc::clone(history);
        tokio::spawn(async move {
            while let Ok(action) = actions.recv().await {
                match action {
                    HotKeyAction::ShowHistory => {
                        let recent = history.query(&HistoryQuery::new().limit(10)).await;
                        let now = Utc::now();
                        for line in recent.iter().enumerate().map(|(i, item)| format_line(i, item, now)) {
                            info!("{}", line);
                        }
                    }
                }
            }
        });

        manager.start_event_loop();
        Some(manager)
    }

    fn stop(&self) -> Result<()> {
        #[cfg(unix)]
        {
            if crate::daemon::PidFile::default_location()?.stop()? {
                println!("PasteBox stopped");
            } else {
                println!("PasteBox is not running");
            }
            Ok(())
        }

        #[cfg(not(unix))]
        {
            bail!("stop is only supported on unix platforms")
        }
    }

    async fn show_status(&mut self) -> Result<()> {
        let settings = self.settings.get();
        let automation = platform_automation();

        println!("PasteBox Status:");
        println!("  Version: {}", crate::VERSION);
        println!("  Built: {} ({}, {})", env!("BUILD_DATE"), env!("TARGET"), env!("PROFILE"));
        println!(
            "  Config: {}",
            self.settings
                .path()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "Default".to_string())
        );
        println!("  Data: {}", settings.storage.data_dir.display());
        println!(
            "  Hotkey: {}",
            HotkeyBinding::parse(&settings.hotkey.show_history)
                .map(|b| b.display_string())
                .unwrap_or_else(|_| settings.hotkey.show_history.clone())
        );
        println!(
            "  Accessibility: {}",
            if automation.is_trusted() { "granted" } else { "not granted" }
        );

        #[cfg(unix)]
        match crate::daemon::PidFile::default_location()?.running_pid()? {
            Some(pid) => println!("  Running: yes (PID {})", pid),
            None => println!("  Running: no"),
        }

        let history = self.ensure_history().await?;
        println!(
            "  Items: {} ({})",
            history.len().await,
            format_size(history.total_size().await)
        );
        Ok(())
    }

    async fn show_history(&mut self, query: &HistoryQuery) -> Result<()> {
        let history = self.ensure_history().await?;
        let items = history.query(query).await;

        if items.is_empty() {
            println!("No clipboard history found");
            return Ok(());
        }

        println!("Clipboard History (showing {} entries):", items.len());
        let now = Utc::now();
        for (i, item) in items.iter().enumerate() {
            println!("{}", format_line(i, item, now));
        }
        Ok(())
    }

    async fn copy_item(&mut self, id: &str) -> Result<()> {
        let item = self.resolve_item(id).await?;
        let history = self.ensure_history().await?;
        history.copy_to_clipboard(&item).await?;
        println!("Copied {} to clipboard", item.display_content());
        Ok(())
    }

    async fn paste_item(&mut self, id: &str) -> Result<()> {
        let item = self.resolve_item(id).await?;
        let history = self.ensure_history().await?;
        history.paste_item(&item).await?;
        println!("Pasted {}", item.display_content());
        Ok(())
    }

    async fn delete_item(&mut self, id: &str) -> Result<()> {
        let item = self.resolve_item(id).await?;
        let history = self.ensure_history().await?;
        history.delete_item(item.id()).await;
        history.flush().await;
        println!("Deleted {}", short_id(&item));
        Ok(())
    }

    async fn toggle_favorite(&mut self, id: &str) -> Result<()> {
        let item = self.resolve_item(id).await?;
        let history = self.ensure_history().await?;
        let updated = history
            .toggle_favorite(item.id())
            .await
            .ok_or_else(|| anyhow!("Item {} disappeared", short_id(&item)))?;
        history.flush().await;

        if updated.is_favorite() {
            println!("Added {} to favorites", short_id(&updated));
        } else {
            println!("Removed {} from favorites", short_id(&updated));
        }
        Ok(())
    }

    async fn clear(&mut self) -> Result<()> {
        let history = self.ensure_history().await?;
        history.clear_all().await?;
        println!("Clipboard history cleared");
        Ok(())
    }

    async fn export(&mut self, path: PathBuf) -> Result<()> {
        let history = self.ensure_history().await?;
        history
            .export(&path)
            .await
            .with_context(|| format!("Failed to export to {}", path.display()))?;
        println!("Exported history to {}", path.display());
        Ok(())
    }

    async fn import(&mut self, path: PathBuf) -> Result<()> {
        let history = self.ensure_history().await?;
        let added = history
            .import_items(&path)
            .await
            .with_context(|| format!("Failed to import {}", path.display()))?;
        history.flush().await;
        println!("Imported {} items", added);
        Ok(())
    }

    async fn cleanup(
        &mut self,
        days: Option<u32>,
        types: &[ItemType],
        larger_than: Option<u64>,
    ) -> Result<()> {
        if let Some(days) = days {
            self.settings.update(|s| s.auto_delete_after_days = days)?;
        }
        let history = self.ensure_history().await?;
        let removed = history.perform_scheduled_cleanup().await?;
        println!(
            "Removed {} items older than {} days",
            removed,
            self.settings.get().auto_delete_after_days
        );

        if !types.is_empty() {
            let removed = history.cleanup_items_by_type(types).await?;
            let names: Vec<&str> = types.iter().map(ItemType::as_str).collect();
            println!("Removed {} items of type {}", removed, names.join(", "));
        }
        if let Some(max_size) = larger_than {
            let removed = history.cleanup_large_items(max_size).await?;
            println!("Removed {} items larger than {}", removed, format_size(max_size));
        }
        Ok(())
    }

    async fn optimize(&mut self) -> Result<()> {
        let history = self.ensure_history().await?;
        let removed = history.optimize_storage().await?;
        println!("Removed {} duplicate items", removed);
        Ok(())
    }

    async fn show_stats(&mut self) -> Result<()> {
        let history = self.ensure_history().await?;
        let report = history.report().await;

        println!("{}", report);
        if let Some(info) = history.data_file_info().await? {
            println!("File:       {} ({})", info.path.display(), format_size(info.size));
            if let Some(modified) = info.modified {
                println!("Saved:      {}", modified.format("%Y-%m-%d %H:%M:%S UTC"));
            }
        }
        for warning in report.warnings() {
            println!("Warning: {}", warning);
        }
        Ok(())
    }

    fn handle_config_action(&self, action: ConfigAction) -> Result<()> {
        match action {
            ConfigAction::Show => {
                println!("Current Configuration:");
                println!("{}", toml::to_string_pretty(&self.settings.get())?);
            }
            ConfigAction::Init { force } => {
                let path = self
                    .config_path
                    .clone()
                    .or_else(Settings::default_path)
                    .ok_or_else(|| anyhow!("Could not determine config directory"))?;
                Settings::generate_example_config(&path, force)?;
                println!("Example configuration written to {}", path.display());
            }
            ConfigAction::Validate => {
                // Loading in `new` already validated it
                println!("Configuration is valid");
            }
        }
        Ok(())
    }
}

fn short_id(item: &ClipboardItem) -> String {
    item.id().to_string()[..8].to_string()
}

/// One history listing line
fn format_line(index: usize, item: &ClipboardItem, now: chrono::DateTime<Utc>) -> String {
    let content = item.display_content().replace('\n', " ");
    let content = if content.chars().count() > 60 {
        format!("{}...", content.chars().take(60).collect::<String>())
    } else {
        content
    };

    format!(
        "{:>3}. {} {} [{}] {} ({})",
        index + 1,
        short_id(item),
        if item.is_favorite() { "★" } else { " " },
        item.item_type().display_name(),
        content,
        item.time_ago(now)
    )
}
