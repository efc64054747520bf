//! In-process pasteboard
//!
//! Behaves like the system pasteboard: every write or simulated external copy
//! bumps the change counter. Used by tests and when no system pasteboard is
//! reachable.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ClipboardError, Pasteboard, PasteboardPayload, PasteboardSnapshot};

/// Number of recent writes remembered by [`MemoryPasteboard::writes`]
const RECORDED_WRITES: usize = 16;

#[derive(Debug, Default)]
struct State {
    change_count: i64,
    snapshot: PasteboardSnapshot,
    writes: VecDeque<PasteboardPayload>,
}

/// Pasteboard kept entirely in memory
#[derive(Debug, Default)]
pub struct MemoryPasteboard {
    state: Mutex<State>,
}

impl MemoryPasteboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the contents as if another application copied something
    pub fn set_snapshot(&self, snapshot: PasteboardSnapshot) {
        let mut state = self.lock();
        state.snapshot = snapshot;
        state.change_count += 1;
    }

    /// Shorthand for an external copy of a string
    pub fn set_text(&self, text: impl Into<String>) {
        self.set_snapshot(PasteboardSnapshot::from_text(text));
    }

    /// Current contents
    pub fn snapshot(&self) -> PasteboardSnapshot {
        self.lock().snapshot.clone()
    }

    /// The most recent payloads written through [`Pasteboard::write`], oldest first
    pub fn writes(&self) -> Vec<PasteboardPayload> {
        self.lock().writes.iter().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only means a test thread panicked mid-update
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Pasteboard for MemoryPasteboard {
    async fn change_count(&self) -> Result<i64, ClipboardError> {
        Ok(self.lock().change_count)
    }

    async fn read_snapshot(&self) -> Result<PasteboardSnapshot, ClipboardError> {
        Ok(self.snapshot())
    }

    async fn write(&self, payload: &PasteboardPayload) -> Result<(), ClipboardError> {
        let mut state = self.lock();
        state.snapshot = payload.to_snapshot();
        if state.writes.len() == RECORDED_WRITES {
            state.writes.pop_front();
        }
        state.writes.push_back(payload.clone());
        state.change_count += 1;
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_external_copy_bumps_count() {
        let pasteboard = MemoryPasteboard::new();
        assert_eq!(pasteboard.change_count().await.unwrap(), 0);

        pasteboard.set_text("first");
        pasteboard.set_text("second");
        assert_eq!(pasteboard.change_count().await.unwrap(), 2);

        let snapshot = pasteboard.read_snapshot().await.unwrap();
        assert_eq!(snapshot.text.as_deref(), Some("second"));
    }

    #[tokio::test]
    async fn test_write_records_payload() {
        let pasteboard = MemoryPasteboard::new();
        pasteboard
            .write(&PasteboardPayload::Text("hello".to_string()))
            .await
            .unwrap();

        assert_eq!(pasteboard.change_count().await.unwrap(), 1);
        assert_eq!(pasteboard.snapshot().text.as_deref(), Some("hello"));
        assert_eq!(
            pasteboard.writes(),
            vec![PasteboardPayload::Text("hello".to_string())]
        );
        assert_eq!(pasteboard.name(), "memory");
    }

    #[tokio::test]
    async fn test_write_log_is_bounded() {
        let pasteboard = MemoryPasteboard::new();
        for i in 0..(RECORDED_WRITES + 4) {
            pasteboard
                .write(&PasteboardPayload::Text(format!("write {}", i)))
                .await
                .unwrap();
        }

        let writes = pasteboard.writes();
        assert_eq!(writes.len(), RECORDED_WRITES);
        assert_eq!(writes[0], PasteboardPayload::Text("write 4".to_string()));
        assert_eq!(
            writes.last(),
            Some(&PasteboardPayload::Text(format!("write {}", RECORDED_WRITES + 3)))
        );
        assert_eq!(pasteboard.change_count().await.unwrap(), (RECORDED_WRITES + 4) as i64);
    }
}
