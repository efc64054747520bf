//! Property checks for classification and history bounds

use std::sync::Arc;

use pastebox::automation::NoopAutomation;
use pastebox::clipboard::{classify, classify::is_valid_url, MemoryPasteboard, PasteboardSnapshot};
use pastebox::config::{Settings, SettingsStore};
use pastebox::history::{ClipboardHistory, ClipboardItem, HistoryLimits, ItemType, PersistenceStore};
use proptest::prelude::*;
use tempfile::TempDir;

proptest! {
    #[test]
    fn text_preview_is_bounded(text in "\\PC{1,400}") {
        let item = classify(&PasteboardSnapshot::from_text(text.clone())).unwrap();
        prop_assert!(item.preview().chars().count() <= 100);
        prop_assert!(text.starts_with(item.preview()));
        prop_assert_eq!(item.size(), text.len() as u64);
        prop_assert_eq!(item.content().as_ref(), text.as_bytes());
    }

    #[test]
    fn text_with_whitespace_is_never_url(
        host in "[a-z]{1,12}",
        tail in "[ \t\n][a-z ]{0,10}",
    ) {
        let text = format!("https://{}.com{}", host, tail);
        prop_assert!(!is_valid_url(&text));
        let item = classify(&PasteboardSnapshot::from_text(text)).unwrap();
        prop_assert_eq!(item.item_type(), ItemType::Text);
    }

    #[test]
    fn web_urls_are_urls(
        scheme in prop::sample::select(vec!["http", "https", "ftp"]),
        host in "[a-z]{1,12}",
        path in "(/[a-z0-9]{1,8}){0,3}",
    ) {
        let text = format!("{}://{}.org{}", scheme, host, path);
        let item = classify(&PasteboardSnapshot::from_text(text)).unwrap();
        prop_assert_eq!(item.item_type(), ItemType::Url);
    }

    #[test]
    fn history_never_exceeds_capacity(
        texts in prop::collection::vec("[a-d]{1,2}", 1..60),
        capacity in 1usize..20,
    ) {
        let dir = TempDir::new().unwrap();
        let limits = HistoryLimits { max_items: capacity, ..Default::default() };
        let runtime = tokio::runtime::Runtime::new().unwrap();

        let items = runtime.block_on(async {
            let history = ClipboardHistory::new(
                Arc::new(MemoryPasteboard::new()),
                PersistenceStore::new(dir.path()).unwrap(),
                Arc::new(SettingsStore::in_memory(Settings::default())),
                Arc::new(NoopAutomation),
                limits,
            );
            for text in &texts {
                history.add_item(ClipboardItem::text(text.clone())).await;
            }
            history.flush().await;
            history.items().await
        });

        prop_assert!(items.len() <= capacity);
        for (i, a) in items.iter().enumerate() {
            for b in &items[i + 1..] {
                prop_assert!(!a.is_duplicate_of(b));
            }
        }
    }
}

#[test]
fn non_web_schemes_stay_text() {
    for text in ["mailto:someone@example.com", "file:///etc/hosts", "example.com", "ssh://host"] {
        assert!(!is_valid_url(text), "{}", text);
    }
}

#[test]
fn classify_from_blocking_context() {
    let pasteboard = MemoryPasteboard::new();
    pasteboard.set_text("https://example.com/a");
    let snapshot = tokio_test::block_on(async {
        use pastebox::clipboard::Pasteboard;
        pasteboard.read_snapshot().await.unwrap()
    });
    let item = classify(&snapshot).unwrap();
    assert_eq!(item.item_type(), ItemType::Url);
    assert_eq!(item.preview(), "https://example.com/a");
}
