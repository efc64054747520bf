//! JSON file persistence for clipboard history
//!
//! The whole history is stored as one JSON array in
//! `<data_dir>/clipboard_history.json`. Writes go through a temporary file
//! and a rename so a crash never leaves a half-written document behind.
//! All methods are blocking; async callers wrap them in `spawn_blocking`.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::item::{ClipboardItem, ItemType};

/// File name of the history document inside the data directory
pub const HISTORY_FILE_NAME: &str = "clipboard_history.json";

/// Items written per save
pub const MAX_SAVED_ITEMS: usize = 1000;

/// Serialized size above which the save falls back to fewer items (100MB)
pub const MAX_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Item count used by the oversize fallback
pub const FALLBACK_SAVED_ITEMS: usize = 500;

/// Persistence errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// Export requested but nothing has been saved yet
    #[error("No data to export")]
    NoDataToExport,

    /// Document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Metadata about the history file
#[derive(Debug, Clone, PartialEq)]
pub struct DataFileInfo {
    pub path: PathBuf,
    pub size: u64,
    pub item_count: usize,
    pub modified: Option<DateTime<Utc>>,
}

/// History file store
#[derive(Debug, Clone)]
pub struct PersistenceStore {
    path: PathBuf,
    max_items: usize,
    max_file_size: u64,
}

impl PersistenceStore {
    /// Open the store in `data_dir`, creating the directory if needed
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        fs::create_dir_all(data_dir)?;
        Ok(Self {
            path: data_dir.join(HISTORY_FILE_NAME),
            max_items: MAX_SAVED_ITEMS,
            max_file_size: MAX_FILE_SIZE,
        })
    }

    /// Override the save bounds
    pub fn with_limits(mut self, max_items: usize, max_file_size: u64) -> Self {
        self.max_items = max_items;
        self.max_file_size = max_file_size;
        self
    }

    /// Path of the history document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Save the first `max_items` items.
    ///
    /// If the encoded document is larger than the file size ceiling, only the
    /// first 500 items are written instead. Returns the number of items saved.
    pub fn save_items(&self, items: &[ClipboardItem]) -> Result<usize, StoreError> {
        let mut to_save = &items[..items.len().min(self.max_items)];
        let mut encoded = serde_json::to_vec(to_save)?;

        if encoded.len() as u64 > self.max_file_size {
            let reduced = to_save.len().min(FALLBACK_SAVED_ITEMS);
            warn!(
                "History document is {} bytes, over the {} byte limit; saving only {} items",
                encoded.len(),
                self.max_file_size,
                reduced
            );
            to_save = &to_save[..reduced];
            encoded = serde_json::to_vec(to_save)?;
        }

        self.write_atomic(&encoded)?;
        debug!("Saved {} items to {}", to_save.len(), self.path.display());
        Ok(to_save.len())
    }

    /// Load saved items; a missing or unreadable file yields an empty history
    pub fn load_items(&self) -> Vec<ClipboardItem> {
        if !self.path.exists() {
            return Vec::new();
        }
        match self.read_items(&self.path) {
            Ok(items) => {
                debug!("Loaded {} items from {}", items.len(), self.path.display());
                items
            }
            Err(e) => {
                warn!("Failed to load history from {}: {}", self.path.display(), e);
                Vec::new()
            }
        }
    }

    /// Copy the history document to `destination`
    pub fn export_data(&self, destination: impl AsRef<Path>) -> Result<(), StoreError> {
        if !self.path.exists() {
            return Err(StoreError::NoDataToExport);
        }
        let destination = destination.as_ref();
        if let Some(parent) = destination.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&self.path, destination)?;
        info!("Exported history to {}", destination.display());
        Ok(())
    }

    /// Decode an exported document; merging is up to the caller
    pub fn import_data(&self, source: impl AsRef<Path>) -> Result<Vec<ClipboardItem>, StoreError> {
        let items = self.read_items(source.as_ref())?;
        info!("Read {} items from {}", items.len(), source.as_ref().display());
        Ok(items)
    }

    /// Drop items created more than `days` days ago. Returns the number removed.
    pub fn cleanup_expired_items(&self, days: u32) -> Result<usize, StoreError> {
        self.cleanup_expired_items_at(days, Utc::now())
    }

    /// [`Self::cleanup_expired_items`] relative to an explicit `now`
    pub fn cleanup_expired_items_at(
        &self,
        days: u32,
        now: DateTime<Utc>,
    ) -> Result<usize, StoreError> {
        let cutoff = now - Duration::days(i64::from(days));
        let removed = self.retain(|item| item.created_at() > cutoff)?;
        if removed > 0 {
            info!("Removed {} items older than {} days", removed, days);
        }
        Ok(removed)
    }

    /// Remove repeated content, keeping the first occurrence. Returns the number removed.
    pub fn optimize_storage(&self) -> Result<usize, StoreError> {
        let mut seen: HashSet<Bytes> = HashSet::new();
        let removed = self.retain(|item| seen.insert(item.content().clone()))?;
        if removed > 0 {
            info!("Storage optimized, removed {} duplicate items", removed);
        }
        Ok(removed)
    }

    /// Remove items of the given types. Returns the number removed.
    pub(crate) fn cleanup_items_by_type(&self, types: &[ItemType]) -> Result<usize, StoreError> {
        self.retain(|item| !types.contains(&item.item_type()))
    }

    /// Remove items larger than `max_size` bytes. Returns the number removed.
    pub(crate) fn cleanup_large_items(&self, max_size: u64) -> Result<usize, StoreError> {
        self.retain(|item| item.size() <= max_size)
    }

    /// Delete the history document
    pub(crate) fn clear_all_data(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                info!("Removed {}", self.path.display());
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Size, item count and modification time of the history document
    pub fn data_file_info(&self) -> Result<Option<DataFileInfo>, StoreError> {
        if !self.path.exists() {
            return Ok(None);
        }
        let metadata = fs::metadata(&self.path)?;
        let modified = metadata
            .modified()
            .ok()
            .map(|time: SystemTime| DateTime::<Utc>::from(time));

        Ok(Some(DataFileInfo {
            path: self.path.clone(),
            size: metadata.len(),
            item_count: self.load_items().len(),
            modified,
        }))
    }

    /// Keep items matching `keep`, re-saving only when something was removed
    fn retain<F>(&self, mut keep: F) -> Result<usize, StoreError>
    where
        F: FnMut(&ClipboardItem) -> bool,
    {
        let items = self.load_items();
        let before = items.len();
        let kept: Vec<ClipboardItem> = items.into_iter().filter(|item| keep(item)).collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.save_items(&kept)?;
        }
        Ok(removed)
    }

    fn read_items(&self, path: &Path) -> Result<Vec<ClipboardItem>, StoreError> {
        let data = fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }

    fn write_atomic(&self, data: &[u8]) -> Result<(), StoreError> {
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn setup_store() -> (PersistenceStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = PersistenceStore::new(temp_dir.path()).unwrap();
        (store, temp_dir)
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let (store, _dir) = setup_store();
        let items = vec![
            ClipboardItem::text("first").with_favorite(true),
            ClipboardItem::new(ItemType::Image, vec![1u8, 2, 3], "Image 1×1")
                .with_tags(vec!["work".to_string()]),
        ];

        assert_eq!(store.save_items(&items).unwrap(), 2);
        let loaded = store.load_items();

        assert_eq!(loaded.len(), 2);
        for (a, b) in items.iter().zip(&loaded) {
            assert_eq!(a.id(), b.id());
            assert_eq!(a.item_type(), b.item_type());
            assert_eq!(a.content(), b.content());
            assert_eq!(a.preview(), b.preview());
            assert_eq!(a.created_at(), b.created_at());
            assert_eq!(a.is_favorite(), b.is_favorite());
            assert_eq!(a.tags(), b.tags());
        }
    }

    #[test]
    fn test_missing_and_corrupt_file_load_empty() {
        let (store, _dir) = setup_store();
        assert!(store.load_items().is_empty());

        fs::write(store.path(), b"{not json").unwrap();
        assert!(store.load_items().is_empty());
    }

    #[test]
    fn test_save_caps_item_count() {
        let (store, _dir) = setup_store();
        let store = store.with_limits(3, MAX_FILE_SIZE);
        let items: Vec<_> = (0..5).map(|i| ClipboardItem::text(format!("item {}", i))).collect();

        assert_eq!(store.save_items(&items).unwrap(), 3);
        let loaded = store.load_items();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[0].id(), items[0].id());
    }

    #[test]
    fn test_oversize_document_falls_back() {
        let (store, _dir) = setup_store();
        let store = store.with_limits(MAX_SAVED_ITEMS, 10_000);
        let items: Vec<_> = (0..600)
            .map(|i| ClipboardItem::text(format!("entry number {}", i)))
            .collect();

        assert_eq!(store.save_items(&items).unwrap(), FALLBACK_SAVED_ITEMS);
        assert_eq!(store.load_items().len(), FALLBACK_SAVED_ITEMS);
    }

    #[test]
    fn test_export_requires_data() {
        let (store, dir) = setup_store();
        let target = dir.path().join("export.json");
        assert!(matches!(
            store.export_data(&target),
            Err(StoreError::NoDataToExport)
        ));

        store.save_items(&[ClipboardItem::text("x")]).unwrap();
        store.export_data(&target).unwrap();
        assert_eq!(store.import_data(&target).unwrap().len(), 1);
    }

    #[test]
    fn test_import_invalid_file_errors() {
        let (store, dir) = setup_store();
        let target = dir.path().join("bad.json");
        fs::write(&target, b"[1, 2").unwrap();
        assert!(matches!(
            store.import_data(&target),
            Err(StoreError::Serialization(_))
        ));
        assert!(matches!(
            store.import_data(dir.path().join("missing.json")),
            Err(StoreError::Io(_))
        ));
    }

    #[test]
    fn test_cleanup_expired_ignores_favorites() {
        let (store, _dir) = setup_store();
        let now = Utc::now();
        let items = vec![
            ClipboardItem::text("fresh").with_created_at(now - Duration::days(1)),
            ClipboardItem::text("old favorite")
                .with_created_at(now - Duration::days(40))
                .with_favorite(true),
            ClipboardItem::text("old").with_created_at(now - Duration::days(31)),
        ];
        store.save_items(&items).unwrap();

        assert_eq!(store.cleanup_expired_items_at(30, now).unwrap(), 2);
        let loaded = store.load_items();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].preview(), "fresh");

        assert_eq!(store.cleanup_expired_items_at(30, now).unwrap(), 0);
    }

    #[test]
    fn test_optimize_keeps_first_occurrence() {
        let (store, _dir) = setup_store();
        let first = ClipboardItem::text("same");
        let items = vec![
            first.clone(),
            ClipboardItem::text("other"),
            ClipboardItem::text("same"),
            ClipboardItem::new(ItemType::RichText, b"same".to_vec(), "same"),
        ];
        store.save_items(&items).unwrap();

        assert_eq!(store.optimize_storage().unwrap(), 2);
        let loaded = store.load_items();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id(), first.id());
    }

    #[test]
    fn test_cleanup_by_type_and_size() {
        let (store, _dir) = setup_store();
        let items = vec![
            ClipboardItem::text("short"),
            ClipboardItem::new(ItemType::Image, vec![0u8; 2048], "Image"),
            ClipboardItem::text("a".repeat(4096)),
        ];
        store.save_items(&items).unwrap();

        assert_eq!(store.cleanup_items_by_type(&[ItemType::Image]).unwrap(), 1);
        assert_eq!(store.cleanup_large_items(1024).unwrap(), 1);
        assert_eq!(store.load_items().len(), 1);
    }

    #[test]
    fn test_clear_and_info() {
        let (store, _dir) = setup_store();
        assert!(store.data_file_info().unwrap().is_none());

        store.save_items(&[ClipboardItem::text("x")]).unwrap();
        let info = store.data_file_info().unwrap().unwrap();
        assert_eq!(info.item_count, 1);
        assert!(info.size > 0);
        assert!(info.modified.is_some());

        store.clear_all_data().unwrap();
        store.clear_all_data().unwrap();
        assert!(store.load_items().is_empty());
    }
}
