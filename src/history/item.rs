//! Clipboard history item model

use std::fmt;
use std::path::PathBuf;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clipboard::{PasteboardPayload, GENERIC_DATA_TYPE};

/// Kind of content held by a clipboard item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ItemType {
    /// Plain text
    Text,
    /// RTF markup
    RichText,
    /// Image bitmap
    Image,
    /// One or more file references
    File,
    /// Absolute http, https or ftp URL
    Url,
    /// Color value
    Color,
    /// Anything else, kept as opaque bytes
    Unknown,
}

impl ItemType {
    /// All item types in declaration order
    pub const ALL: [ItemType; 7] = [
        ItemType::Text,
        ItemType::RichText,
        ItemType::Image,
        ItemType::File,
        ItemType::Url,
        ItemType::Color,
        ItemType::Unknown,
    ];

    /// Serialized name, also used for type-grouped ordering
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Text => "text",
            ItemType::RichText => "richText",
            ItemType::Image => "image",
            ItemType::File => "file",
            ItemType::Url => "url",
            ItemType::Color => "color",
            ItemType::Unknown => "unknown",
        }
    }

    /// Human readable label
    pub fn display_name(&self) -> &'static str {
        match self {
            ItemType::Text => "Text",
            ItemType::RichText => "Rich text",
            ItemType::Image => "Image",
            ItemType::File => "File",
            ItemType::Url => "Link",
            ItemType::Color => "Color",
            ItemType::Unknown => "Other",
        }
    }

    /// Whether the content is UTF-8 text
    pub fn is_textual(&self) -> bool {
        matches!(self, ItemType::Text | ItemType::RichText | ItemType::Url)
    }
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown item type: {}", s))
    }
}

/// One captured clipboard entry.
///
/// Content, type, preview and capture time are fixed at construction; only
/// the favorite flag and tags change afterwards. Two items are the same item
/// when their ids match, and duplicates when type and content match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", from = "StoredItem")]
pub struct ClipboardItem {
    id: Uuid,
    #[serde(rename = "type")]
    item_type: ItemType,
    #[serde(with = "base64_bytes")]
    content: Bytes,
    preview: String,
    created_at: DateTime<Utc>,
    size: u64,
    is_favorite: bool,
    tags: Vec<String>,
}

/// On-disk shape; `size` is recomputed from the content on load
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredItem {
    id: Uuid,
    #[serde(rename = "type")]
    item_type: ItemType,
    #[serde(with = "base64_bytes")]
    content: Bytes,
    #[serde(default)]
    preview: String,
    created_at: DateTime<Utc>,
    #[serde(default)]
    is_favorite: bool,
    #[serde(default)]
    tags: Vec<String>,
}

impl From<StoredItem> for ClipboardItem {
    fn from(stored: StoredItem) -> Self {
        ClipboardItem::new(stored.item_type, stored.content, stored.preview)
            .with_id(stored.id)
            .with_created_at(stored.created_at)
            .with_favorite(stored.is_favorite)
            .with_tags(stored.tags)
    }
}

impl ClipboardItem {
    /// Create a new item captured now with a fresh id
    pub fn new(item_type: ItemType, content: impl Into<Bytes>, preview: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            id: Uuid::new_v4(),
            item_type,
            size: content.len() as u64,
            content,
            preview: preview.into(),
            created_at: Utc::now(),
            is_favorite: false,
            tags: Vec::new(),
        }
    }

    /// Create a plain text item with a truncated preview
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        let preview = truncate_preview(&text);
        Self::new(ItemType::Text, text.into_bytes(), preview)
    }

    /// Replace the id, used when restoring persisted items
    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    /// Replace the capture time
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Set the favorite flag
    pub fn with_favorite(mut self, is_favorite: bool) -> Self {
        self.is_favorite = is_favorite;
        self
    }

    /// Replace the tag list
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn item_type(&self) -> ItemType {
        self.item_type
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn preview(&self) -> &str {
        &self.preview
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Content length in bytes
    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_favorite(&self) -> bool {
        self.is_favorite
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    /// Add a tag unless already present
    pub fn add_tag(&mut self, tag: impl Into<String>) {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
    }

    /// Remove a tag, returning whether it was present
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        self.tags.len() != before
    }

    /// Copy of this item with the favorite flag flipped; id and content are kept
    pub fn toggled_favorite(&self) -> Self {
        Self {
            is_favorite: !self.is_favorite,
            ..self.clone()
        }
    }

    /// Whether `other` carries the same type and byte-identical content
    pub fn is_duplicate_of(&self, other: &ClipboardItem) -> bool {
        self.item_type == other.item_type && self.content == other.content
    }

    /// Text for list display
    pub fn display_content(&self) -> String {
        match self.item_type {
            ItemType::Text | ItemType::RichText | ItemType::File | ItemType::Url => {
                self.preview.clone()
            }
            ItemType::Image => format!("Image ({})", format_size(self.size)),
            ItemType::Color => format!("Color: {}", self.preview),
            ItemType::Unknown => format!("Unknown type ({})", format_size(self.size)),
        }
    }

    /// Relative age such as "5 minutes ago"
    pub fn time_ago(&self, now: DateTime<Utc>) -> String {
        let seconds = (now - self.created_at).num_seconds();
        if seconds < 0 {
            return "just now".to_string();
        }

        let (value, unit) = match seconds {
            0..=59 => return "just now".to_string(),
            60..=3_599 => (seconds / 60, "minute"),
            3_600..=86_399 => (seconds / 3_600, "hour"),
            86_400..=2_591_999 => (seconds / 86_400, "day"),
            2_592_000..=31_535_999 => (seconds / 2_592_000, "month"),
            _ => (seconds / 31_536_000, "year"),
        };

        if value == 1 {
            format!("1 {} ago", unit)
        } else {
            format!("{} {}s ago", value, unit)
        }
    }

    /// Content as text for text, rich text and URL items
    pub fn text_content(&self) -> Option<String> {
        if !self.item_type.is_textual() {
            return None;
        }
        String::from_utf8(self.content.to_vec()).ok()
    }

    /// File paths for file items
    pub fn file_paths(&self) -> Option<Vec<PathBuf>> {
        if self.item_type != ItemType::File {
            return None;
        }
        let joined = std::str::from_utf8(&self.content).ok()?;
        Some(
            joined
                .split('\n')
                .filter(|line| !line.is_empty())
                .map(PathBuf::from)
                .collect(),
        )
    }

    /// Encode this item for writing back to the pasteboard
    pub fn to_payload(&self) -> PasteboardPayload {
        let generic = || PasteboardPayload::Data {
            uti: GENERIC_DATA_TYPE.to_string(),
            bytes: self.content.clone(),
        };

        match self.item_type {
            ItemType::Text | ItemType::Url => match self.text_content() {
                Some(text) => PasteboardPayload::Text(text),
                None => generic(),
            },
            ItemType::RichText => PasteboardPayload::RichText(self.content.clone()),
            ItemType::Image => PasteboardPayload::Image(self.content.clone()),
            ItemType::File => match self.file_paths() {
                Some(paths) if !paths.is_empty() => PasteboardPayload::Files(paths),
                _ => generic(),
            },
            ItemType::Color | ItemType::Unknown => generic(),
        }
    }
}

impl PartialEq for ClipboardItem {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for ClipboardItem {}

/// Maximum preview length in characters
pub const PREVIEW_LENGTH: usize = 100;

/// First `PREVIEW_LENGTH` characters of `text`
pub fn truncate_preview(text: &str) -> String {
    text.chars().take(PREVIEW_LENGTH).collect()
}

/// Format a byte count as KB, MB or GB
pub fn format_size(bytes: u64) -> String {
    const KB: f64 = 1000.0;
    const MB: f64 = KB * 1000.0;
    const GB: f64 = MB * 1000.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GB", b / GB)
    } else if b >= MB {
        format!("{:.1} MB", b / MB)
    } else if bytes == 0 {
        "Zero KB".to_string()
    } else {
        format!("{} KB", ((b / KB).ceil() as u64).max(1))
    }
}

mod base64_bytes {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map(Bytes::from)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_item_creation() {
        let item = ClipboardItem::new(ItemType::Text, b"Test content".to_vec(), "Test content");
        assert_eq!(item.item_type(), ItemType::Text);
        assert_eq!(item.preview(), "Test content");
        assert_eq!(item.size(), 12);
        assert!(!item.is_favorite());
        assert!(item.tags().is_empty());
    }

    #[test]
    fn test_text_content() {
        let item = ClipboardItem::text("Hello, World!");
        assert_eq!(item.text_content(), Some("Hello, World!".to_string()));

        let image = ClipboardItem::new(ItemType::Image, vec![0u8; 16], "Image 4×4");
        assert_eq!(image.text_content(), None);
    }

    #[test]
    fn test_display_content() {
        let image = ClipboardItem::new(ItemType::Image, vec![0u8; 1024], "Test Image");
        assert!(image.display_content().starts_with("Image ("));

        let unknown = ClipboardItem::new(ItemType::Unknown, vec![1, 2, 3], "Unknown type: x");
        assert!(unknown.display_content().starts_with("Unknown type ("));

        let url = ClipboardItem::new(ItemType::Url, b"https://example.com".to_vec(), "https://example.com");
        assert_eq!(url.display_content(), "https://example.com");
    }

    #[test]
    fn test_identity_and_duplicates() {
        let a = ClipboardItem::text("same");
        let b = ClipboardItem::text("same");
        assert_ne!(a, b);
        assert!(a.is_duplicate_of(&b));

        let c = ClipboardItem::new(ItemType::Url, b"same".to_vec(), "same");
        assert!(!a.is_duplicate_of(&c));

        let restored = b.clone().with_id(a.id());
        assert_eq!(a, restored);
    }

    #[test]
    fn test_toggle_favorite_preserves_identity() {
        let item = ClipboardItem::text("keep me").with_tags(vec!["work".to_string()]);
        let toggled = item.toggled_favorite();
        assert_eq!(toggled.id(), item.id());
        assert_eq!(toggled.content(), item.content());
        assert!(toggled.is_favorite());
        assert_eq!(toggled.tags(), item.tags());

        let back = toggled.toggled_favorite();
        assert!(!back.is_favorite());
    }

    #[test]
    fn test_tags() {
        let mut item = ClipboardItem::text("tagged");
        item.add_tag("a");
        item.add_tag("a");
        item.add_tag("b");
        assert_eq!(item.tags(), &["a".to_string(), "b".to_string()]);
        assert!(item.remove_tag("a"));
        assert!(!item.remove_tag("a"));
    }

    #[test]
    fn test_file_paths() {
        let item = ClipboardItem::new(
            ItemType::File,
            b"/tmp/a.txt\n/tmp/b.txt".to_vec(),
            "2 files",
        );
        assert_eq!(
            item.file_paths(),
            Some(vec![PathBuf::from("/tmp/a.txt"), PathBuf::from("/tmp/b.txt")])
        );
        assert!(matches!(item.to_payload(), PasteboardPayload::Files(paths) if paths.len() == 2));
    }

    #[test]
    fn test_payload_encoding() {
        assert!(matches!(
            ClipboardItem::text("hi").to_payload(),
            PasteboardPayload::Text(t) if t == "hi"
        ));

        let unknown = ClipboardItem::new(ItemType::Unknown, vec![9, 9], "Unknown type: x");
        match unknown.to_payload() {
            PasteboardPayload::Data { uti, bytes } => {
                assert_eq!(uti, GENERIC_DATA_TYPE);
                assert_eq!(bytes.as_ref(), &[9, 9]);
            }
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_json_shape() {
        let item = ClipboardItem::new(ItemType::RichText, b"{\\rtf1 hi}".to_vec(), "hi").with_favorite(true);
        let value = serde_json::to_value(&item).unwrap();

        assert_eq!(value["type"], "richText");
        assert_eq!(value["isFavorite"], true);
        assert_eq!(value["size"], 10);
        assert!(value["createdAt"].as_str().unwrap().contains('T'));
        assert!(value["content"].is_string());
        assert!(value["tags"].is_array());
    }

    #[test]
    fn test_size_recomputed_on_load() {
        let item = ClipboardItem::text("four");
        let mut value = serde_json::to_value(&item).unwrap();
        value["size"] = serde_json::json!(999);

        let loaded: ClipboardItem = serde_json::from_value(value).unwrap();
        assert_eq!(loaded.size(), 4);
        assert_eq!(loaded.created_at(), item.created_at());
    }

    #[test]
    fn test_time_ago() {
        let now = Utc::now();
        let item = ClipboardItem::text("x").with_created_at(now - Duration::minutes(5));
        assert_eq!(item.time_ago(now), "5 minutes ago");

        let item = item.with_created_at(now - Duration::hours(1));
        assert_eq!(item.time_ago(now), "1 hour ago");

        let item = item.with_created_at(now - Duration::seconds(10));
        assert_eq!(item.time_ago(now), "just now");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "Zero KB");
        assert_eq!(format_size(1024), "2 KB");
        assert_eq!(format_size(5_000_000), "5.0 MB");
        assert_eq!(format_size(2_500_000_000), "2.50 GB");
    }

    #[test]
    fn test_truncate_preview_counts_chars() {
        let text = "é".repeat(150);
        assert_eq!(truncate_preview(&text).chars().count(), PREVIEW_LENGTH);
    }

    #[test]
    fn test_item_type_parse() {
        assert_eq!("richText".parse::<ItemType>().unwrap(), ItemType::RichText);
        assert_eq!("URL".parse::<ItemType>().unwrap(), ItemType::Url);
        assert!("nope".parse::<ItemType>().is_err());
    }
}
