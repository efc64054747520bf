//! Filtering and ordering of history snapshots

use std::cmp::Reverse;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use super::item::{ClipboardItem, ItemType};

/// Sort order for history listings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOption {
    /// Newest first
    #[default]
    DateDesc,
    /// Oldest first
    DateAsc,
    /// Largest first
    SizeDesc,
    /// Smallest first
    SizeAsc,
    /// Grouped by type name
    Type,
    /// Favorites, then newest first
    FavoritesFirst,
}

/// Filter and sort criteria applied to a history snapshot
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    pub search: Option<String>,
    pub item_type: Option<ItemType>,
    pub favorites_only: bool,
    pub sort: SortOption,
    pub limit: Option<usize>,
}

impl HistoryQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn search(mut self, text: impl Into<String>) -> Self {
        self.search = Some(text.into());
        self
    }

    pub fn item_type(mut self, item_type: ItemType) -> Self {
        self.item_type = Some(item_type);
        self
    }

    pub fn favorites_only(mut self, favorites_only: bool) -> Self {
        self.favorites_only = favorites_only;
        self
    }

    pub fn sort(mut self, sort: SortOption) -> Self {
        self.sort = sort;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `item` passes the filters
    pub fn matches(&self, item: &ClipboardItem) -> bool {
        if self.favorites_only && !item.is_favorite() {
            return false;
        }

        if let Some(wanted) = self.item_type {
            let actual = item.item_type();
            let type_ok = actual == wanted
                || (wanted == ItemType::Text && actual == ItemType::RichText);
            if !type_ok {
                return false;
            }
        }

        match self.search.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(needle) => {
                let needle = needle.to_lowercase();
                item.display_content().to_lowercase().contains(&needle)
                    || item
                        .tags()
                        .iter()
                        .any(|tag| tag.to_lowercase().contains(&needle))
            }
        }
    }

    /// Filter, sort and limit `items`
    pub fn apply(&self, items: &[ClipboardItem]) -> Vec<ClipboardItem> {
        let mut result: Vec<ClipboardItem> =
            items.iter().filter(|item| self.matches(item)).cloned().collect();

        match self.sort {
            SortOption::DateDesc => result.sort_by_key(|item| Reverse(item.created_at())),
            SortOption::DateAsc => result.sort_by_key(|item| item.created_at()),
            SortOption::SizeDesc => result.sort_by_key(|item| Reverse(item.size())),
            SortOption::SizeAsc => result.sort_by_key(|item| item.size()),
            SortOption::Type => result.sort_by(|a, b| {
                a.item_type()
                    .as_str()
                    .cmp(b.item_type().as_str())
                    .then_with(|| b.created_at().cmp(&a.created_at()))
            }),
            SortOption::FavoritesFirst => {
                result.sort_by_key(|item| (Reverse(item.is_favorite()), Reverse(item.created_at())))
            }
        }

        if let Some(limit) = self.limit {
            result.truncate(limit);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn sample() -> Vec<ClipboardItem> {
        let now = Utc::now();
        vec![
            ClipboardItem::text("Hello World").with_created_at(now),
            ClipboardItem::new(ItemType::RichText, b"{\\rtf1 hi}".to_vec(), "hello rich")
                .with_created_at(now - Duration::minutes(1)),
            ClipboardItem::new(ItemType::Url, b"https://rust-lang.org".to_vec(), "https://rust-lang.org")
                .with_created_at(now - Duration::minutes(2))
                .with_favorite(true),
            ClipboardItem::new(ItemType::Image, vec![0u8; 5000], "Image 10×10")
                .with_created_at(now - Duration::minutes(3))
                .with_tags(vec!["Screenshot".to_string()]),
        ]
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let items = sample();
        let found = HistoryQuery::new().search("HELLO").apply(&items);
        assert_eq!(found.len(), 2);

        let by_tag = HistoryQuery::new().search("screen").apply(&items);
        assert_eq!(by_tag.len(), 1);
        assert_eq!(by_tag[0].item_type(), ItemType::Image);

        assert_eq!(HistoryQuery::new().search("   ").apply(&items).len(), 4);
    }

    #[test]
    fn test_text_filter_includes_rich_text() {
        let items = sample();
        let found = HistoryQuery::new().item_type(ItemType::Text).apply(&items);
        assert_eq!(found.len(), 2);

        let rich = HistoryQuery::new().item_type(ItemType::RichText).apply(&items);
        assert_eq!(rich.len(), 1);
    }

    #[test]
    fn test_favorites_only() {
        let items = sample();
        let found = HistoryQuery::new().favorites_only(true).apply(&items);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].item_type(), ItemType::Url);
    }

    #[test]
    fn test_sort_options() {
        let items = sample();

        let asc = HistoryQuery::new().sort(SortOption::DateAsc).apply(&items);
        assert_eq!(asc[0].item_type(), ItemType::Image);

        let big = HistoryQuery::new().sort(SortOption::SizeDesc).apply(&items);
        assert_eq!(big[0].item_type(), ItemType::Image);

        let small = HistoryQuery::new().sort(SortOption::SizeAsc).apply(&items);
        assert_eq!(small[0].preview(), "hello rich");

        let favorites = HistoryQuery::new().sort(SortOption::FavoritesFirst).apply(&items);
        assert!(favorites[0].is_favorite());
        assert_eq!(favorites[1].preview(), "Hello World");

        let by_type = HistoryQuery::new().sort(SortOption::Type).apply(&items);
        let names: Vec<_> = by_type.iter().map(|i| i.item_type().as_str()).collect();
        assert_eq!(names, vec!["image", "richText", "text", "url"]);
    }

    #[test]
    fn test_limit() {
        let items = sample();
        let found = HistoryQuery::new().limit(2).apply(&items);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].preview(), "Hello World");
    }

    #[test]
    fn test_sort_value_names() {
        assert_eq!(
            SortOption::from_str("favorites-first", true).unwrap(),
            SortOption::FavoritesFirst
        );
        assert_eq!(SortOption::from_str("size-asc", true).unwrap(), SortOption::SizeAsc);
    }
}
