//! Clipboard history capture and retention
//!
//! [`ClipboardHistory`] owns the in-memory history (newest first), polls the
//! pasteboard for changes, applies the size, duplicate, capacity and memory
//! policies, and hands every new snapshot to a background writer task.

pub mod item;
pub mod query;
pub mod stats;
pub mod store;

pub use item::{format_size, ClipboardItem, ItemType};
pub use query::{HistoryQuery, SortOption};
pub use stats::HistoryReport;
pub use store::{DataFileInfo, PersistenceStore, StoreError};

use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex, MutexGuard as StdMutexGuard};

use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::automation::Automation;
use crate::clipboard::{classify, Pasteboard};
use crate::config::{Settings, SettingsStore};
use crate::{Result, MAX_HISTORY_ITEMS, MAX_ITEM_SIZE, MAX_MEMORY_USAGE, POLL_INTERVAL};

/// Bounds enforced by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryLimits {
    /// Items kept after each insert
    pub max_items: usize,
    /// Largest accepted item in bytes
    pub max_item_size: u64,
    /// Aggregate size above which memory cleanup trims the history
    pub max_memory_usage: u64,
}

impl Default for HistoryLimits {
    fn default() -> Self {
        Self {
            max_items: MAX_HISTORY_ITEMS,
            max_item_size: MAX_ITEM_SIZE,
            max_memory_usage: MAX_MEMORY_USAGE,
        }
    }
}

impl HistoryLimits {
    /// Defaults with the capacity taken from settings, never above 1000
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            max_items: settings.max_history_items.clamp(1, MAX_HISTORY_ITEMS),
            ..Self::default()
        }
    }
}

/// Result of offering an item to the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// Inserted at the head
    Added,
    /// Same type and content already present
    Duplicate,
    /// Over the single item size limit
    TooLarge,
}

/// Change notifications for front ends
#[derive(Debug, Clone)]
pub enum HistoryEvent {
    Added(ClipboardItem),
    Updated(ClipboardItem),
    Removed(Uuid),
    Cleared,
    /// History replaced wholesale (load, cleanup, import)
    Reloaded,
}

enum PersistCommand {
    Save(Vec<ClipboardItem>),
    Flush(oneshot::Sender<()>),
}

struct State {
    items: Vec<ClipboardItem>,
    last_change_count: i64,
}

/// Clipboard capture engine
pub struct ClipboardHistory {
    state: Mutex<State>,
    pasteboard: Arc<dyn Pasteboard>,
    store: PersistenceStore,
    settings: Arc<SettingsStore>,
    automation: Arc<dyn Automation>,
    limits: HistoryLimits,
    persister: mpsc::UnboundedSender<PersistCommand>,
    events: broadcast::Sender<HistoryEvent>,
    monitor: StdMutex<Option<JoinHandle<()>>>,
}

impl ClipboardHistory {
    /// Create the engine and spawn its writer task.
    ///
    /// Must be called from within a tokio runtime. The history starts empty;
    /// call [`Self::load_items`] to read the saved one.
    pub fn new(
        pasteboard: Arc<dyn Pasteboard>,
        store: PersistenceStore,
        settings: Arc<SettingsStore>,
        automation: Arc<dyn Automation>,
        limits: HistoryLimits,
    ) -> Arc<Self> {
        let (persister, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_persister(store.clone(), rx));
        let (events, _) = broadcast::channel(64);

        Arc::new(Self {
            state: Mutex::new(State {
                items: Vec::new(),
                last_change_count: 0,
            }),
            pasteboard,
            store,
            settings,
            automation,
            limits,
            persister,
            events,
            monitor: StdMutex::new(None),
        })
    }

    pub fn limits(&self) -> HistoryLimits {
        self.limits
    }

    /// Details of the saved history file, if it exists
    pub async fn data_file_info(&self) -> Result<Option<DataFileInfo>> {
        let store = self.store.clone();
        Ok(tokio::task::spawn_blocking(move || store.data_file_info()).await??)
    }

    /// Receive history change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<HistoryEvent> {
        self.events.subscribe()
    }

    /// Start polling the pasteboard. Does nothing if already polling.
    ///
    /// The current contents are treated as seen, so whatever is on the
    /// pasteboard at start is not captured.
    pub async fn start_monitoring(self: &Arc<Self>) -> Result<()> {
        if self.is_monitoring() {
            return Ok(());
        }

        {
            let mut state = self.state.lock().await;
            state.last_change_count = self.pasteboard.change_count().await?;
        }

        let mut slot = self.monitor_slot();
        if slot.is_some() {
            return Ok(());
        }

        let weak = Arc::downgrade(self);
        *slot = Some(tokio::spawn(async move {
            let mut ticker = interval(POLL_INTERVAL);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                let Some(engine) = weak.upgrade() else { break };
                if let Err(e) = engine.check_for_changes().await {
                    debug!("Pasteboard check failed: {}", e);
                }
            }
        }));

        info!("Started clipboard monitoring ({})", self.pasteboard.name());
        Ok(())
    }

    /// Stop polling. Does nothing if not polling.
    pub fn stop_monitoring(&self) {
        if let Some(handle) = self.monitor_slot().take() {
            handle.abort();
            info!("Stopped clipboard monitoring");
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor_slot().is_some()
    }

    /// Capture the pasteboard if it changed since the last check.
    ///
    /// Returns `None` when nothing changed, the frontmost application is
    /// excluded, or the contents could not be classified.
    pub async fn check_for_changes(&self) -> Result<Option<AddOutcome>> {
        {
            let mut state = self.state.lock().await;
            let current = self.pasteboard.change_count().await?;
            if current == state.last_change_count {
                return Ok(None);
            }
            state.last_change_count = current;
        }

        if let Some(app) = self.automation.frontmost_application() {
            if self.settings.get().is_app_excluded(&app) {
                debug!("Ignoring pasteboard change from excluded app {}", app);
                return Ok(None);
            }
        }

        let snapshot = self.pasteboard.read_snapshot().await?;
        match classify(&snapshot) {
            Some(item) => Ok(Some(self.add_item(item).await)),
            None => Ok(None),
        }
    }

    /// Offer an item to the history
    pub async fn add_item(&self, item: ClipboardItem) -> AddOutcome {
        if item.size() > self.limits.max_item_size {
            warn!(
                "Item too large ({}), skipping",
                format_size(item.size())
            );
            return AddOutcome::TooLarge;
        }

        let mut state = self.state.lock().await;
        if state.items.iter().any(|existing| existing.is_duplicate_of(&item)) {
            debug!("Duplicate {} item skipped", item.item_type());
            return AddOutcome::Duplicate;
        }

        state.items.insert(0, item.clone());
        if state.items.len() > self.limits.max_items {
            state.items.truncate(self.limits.max_items);
        }
        self.persist(&state.items);
        drop(state);

        debug!("Added {} item {}", item.item_type(), item.id());
        let _ = self.events.send(HistoryEvent::Added(item));
        AddOutcome::Added
    }

    /// Remove the item with `id`. Returns whether anything was removed.
    pub async fn delete_item(&self, id: Uuid) -> bool {
        let mut state = self.state.lock().await;
        let before = state.items.len();
        state.items.retain(|item| item.id() != id);
        let removed = state.items.len() != before;
        self.persist(&state.items);
        drop(state);

        if removed {
            let _ = self.events.send(HistoryEvent::Removed(id));
        }
        removed
    }

    /// Empty the history and delete the saved file
    pub async fn clear_all(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.items.clear();
        self.flush().await;

        let store = self.store.clone();
        tokio::task::spawn_blocking(move || store.clear_all_data()).await??;
        drop(state);

        info!("Cleared clipboard history");
        let _ = self.events.send(HistoryEvent::Cleared);
        Ok(())
    }

    /// Flip the favorite flag of the item with `id`, returning the new value
    pub async fn toggle_favorite(&self, id: Uuid) -> Option<ClipboardItem> {
        let mut state = self.state.lock().await;
        let slot = state.items.iter_mut().find(|item| item.id() == id)?;
        *slot = slot.toggled_favorite();
        let updated = slot.clone();
        self.persist(&state.items);
        drop(state);

        let _ = self.events.send(HistoryEvent::Updated(updated.clone()));
        Some(updated)
    }

    /// Put `item` back on the pasteboard without capturing it again
    pub async fn copy_to_clipboard(&self, item: &ClipboardItem) -> Result<()> {
        let mut state = self.state.lock().await;
        self.pasteboard.write(&item.to_payload()).await?;
        state.last_change_count = self.pasteboard.change_count().await?;
        debug!("Copied {} item {} to pasteboard", item.item_type(), item.id());
        Ok(())
    }

    /// Copy `item` and paste it into the frontmost application
    pub async fn paste_item(&self, item: &ClipboardItem) -> Result<()> {
        self.copy_to_clipboard(item).await?;
        self.automation.simulate_paste()?;
        Ok(())
    }

    /// Replace the history with the saved one, then apply memory cleanup
    pub async fn load_items(&self) -> Result<usize> {
        let mut state = self.state.lock().await;
        let store = self.store.clone();
        let items = stats::measure("load history", tokio::task::spawn_blocking(move || {
            store.load_items()
        }))
        .await?;

        state.items = items;
        if self.cleanup_for_memory(&mut state.items) > 0 {
            self.persist(&state.items);
        }
        let count = state.items.len();
        drop(state);

        info!("Loaded {} clipboard items", count);
        let _ = self.events.send(HistoryEvent::Reloaded);
        Ok(count)
    }

    /// Trim the history if it is over the memory limit. Returns the number removed.
    pub async fn perform_memory_cleanup(&self) -> usize {
        let mut state = self.state.lock().await;
        let removed = self.cleanup_for_memory(&mut state.items);
        if removed > 0 {
            self.persist(&state.items);
            drop(state);
            let _ = self.events.send(HistoryEvent::Reloaded);
        }
        removed
    }

    /// Expire items older than the configured retention. Returns the number removed.
    pub async fn perform_scheduled_cleanup(&self) -> Result<usize> {
        let days = self.settings.get().auto_delete_after_days;
        let removed = self
            .rewrite_store(move |store| store.cleanup_expired_items(days))
            .await?;
        if removed > 0 {
            info!("Scheduled cleanup removed {} expired items", removed);
        }
        Ok(removed)
    }

    /// Compact the saved history by content, then reload. Returns the number removed.
    pub async fn optimize_storage(&self) -> Result<usize> {
        self.rewrite_store(|store| store.optimize_storage()).await
    }

    /// Remove every item of the given types. Returns the number removed.
    pub async fn cleanup_items_by_type(&self, types: &[ItemType]) -> Result<usize> {
        let types = types.to_vec();
        self.rewrite_store(move |store| store.cleanup_items_by_type(&types))
            .await
    }

    /// Remove items larger than `max_size` bytes. Returns the number removed.
    pub async fn cleanup_large_items(&self, max_size: u64) -> Result<usize> {
        self.rewrite_store(move |store| store.cleanup_large_items(max_size))
            .await
    }

    /// Merge an exported file, oldest entries first. Returns the number added.
    pub async fn import_items(&self, path: impl AsRef<Path>) -> Result<usize> {
        let store = self.store.clone();
        let path = path.as_ref().to_path_buf();
        let items = tokio::task::spawn_blocking(move || store.import_data(path)).await??;

        let mut added = 0;
        for item in items.into_iter().rev() {
            if self.add_item(item).await == AddOutcome::Added {
                added += 1;
            }
        }
        info!("Imported {} items", added);
        Ok(added)
    }

    /// Write the saved history to `path`
    pub async fn export(&self, path: impl AsRef<Path>) -> Result<()> {
        self.flush().await;
        let store = self.store.clone();
        let path = path.as_ref().to_path_buf();
        tokio::task::spawn_blocking(move || store.export_data(path)).await??;
        Ok(())
    }

    /// Wait until every queued save has been written
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.persister.send(PersistCommand::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }

    /// Snapshot of the history, newest first
    pub async fn items(&self) -> Vec<ClipboardItem> {
        self.state.lock().await.items.clone()
    }

    pub async fn get(&self, id: Uuid) -> Option<ClipboardItem> {
        self.state
            .lock()
            .await
            .items
            .iter()
            .find(|item| item.id() == id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.state.lock().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.lock().await.items.is_empty()
    }

    /// Sum of item sizes in bytes
    pub async fn total_size(&self) -> u64 {
        self.state.lock().await.items.iter().map(ClipboardItem::size).sum()
    }

    pub async fn query(&self, query: &HistoryQuery) -> Vec<ClipboardItem> {
        query.apply(&self.state.lock().await.items)
    }

    pub async fn report(&self) -> HistoryReport {
        HistoryReport::from_items(&self.state.lock().await.items)
    }

    /// Run a blocking store rewrite with no saves in flight, then reload
    async fn rewrite_store<F>(&self, operation: F) -> Result<usize>
    where
        F: FnOnce(&PersistenceStore) -> std::result::Result<usize, StoreError> + Send + 'static,
    {
        let mut state = self.state.lock().await;
        self.flush().await;

        let store = self.store.clone();
        let (removed, items) = tokio::task::spawn_blocking(move || {
            let removed = operation(&store)?;
            Ok::<_, StoreError>((removed, store.load_items()))
        })
        .await??;

        state.items = items;
        if self.cleanup_for_memory(&mut state.items) > 0 {
            self.persist(&state.items);
        }
        drop(state);

        let _ = self.events.send(HistoryEvent::Reloaded);
        Ok(removed)
    }

    /// Keep favorites plus the newest other items that fit the memory budget
    fn cleanup_for_memory(&self, items: &mut Vec<ClipboardItem>) -> usize {
        let total: u64 = items.iter().map(ClipboardItem::size).sum();
        if total <= self.limits.max_memory_usage {
            return 0;
        }

        let before = items.len();
        let (mut kept, mut others): (Vec<_>, Vec<_>) =
            items.drain(..).partition(ClipboardItem::is_favorite);
        others.sort_by_key(|item| std::cmp::Reverse(item.created_at()));

        let mut used: u64 = kept.iter().map(ClipboardItem::size).sum();
        for item in others {
            if used + item.size() > self.limits.max_memory_usage {
                break;
            }
            used += item.size();
            kept.push(item);
        }

        kept.sort_by_key(|item| std::cmp::Reverse(item.created_at()));
        *items = kept;

        let removed = before - items.len();
        info!(
            "Memory cleanup removed {} items, {} retained",
            removed,
            format_size(used)
        );
        removed
    }

    fn persist(&self, items: &[ClipboardItem]) {
        if self.persister.send(PersistCommand::Save(items.to_vec())).is_err() {
            error!("History writer is gone, change not saved");
        }
    }

    fn monitor_slot(&self) -> StdMutexGuard<'_, Option<JoinHandle<()>>> {
        self.monitor.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for ClipboardHistory {
    fn drop(&mut self) {
        self.stop_monitoring();
    }
}

/// Background writer: saves the latest queued snapshot, answers flushes
async fn run_persister(store: PersistenceStore, mut rx: mpsc::UnboundedReceiver<PersistCommand>) {
    while let Some(command) = rx.recv().await {
        let mut pending = None;
        let mut waiters = Vec::new();

        let mut next = Some(command);
        while let Some(command) = next {
            match command {
                PersistCommand::Save(items) => pending = Some(items),
                PersistCommand::Flush(tx) => waiters.push(tx),
            }
            next = rx.try_recv().ok();
        }

        if let Some(items) = pending {
            let store = store.clone();
            match tokio::task::spawn_blocking(move || store.save_items(&items)).await {
                Ok(Ok(saved)) => debug!("Persisted {} items", saved),
                Ok(Err(e)) => error!("Failed to save history: {}", e),
                Err(e) => error!("History save task failed: {}", e),
            }
        }

        for waiter in waiters {
            let _ = waiter.send(());
        }
    }
}
