//! Pasteboard abstraction layer
//!
//! This module provides a platform-agnostic interface over the system
//! pasteboard: a monotonically increasing change counter, a typed snapshot
//! of the current contents, and type-tagged writes. Implementations exist
//! for macOS (NSPasteboard), other desktops (arboard) and an in-process
//! pasteboard used by tests and headless runs.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

pub mod classify;
pub mod memory;

#[cfg(target_os = "macos")]
pub mod macos;

#[cfg(not(target_os = "macos"))]
pub mod generic;

pub use classify::classify;
pub use memory::MemoryPasteboard;

/// Uniform type identifiers used when talking to the pasteboard
pub const TEXT_TYPE: &str = "public.utf8-plain-text";
pub const RTF_TYPE: &str = "public.rtf";
pub const PNG_TYPE: &str = "public.png";
pub const TIFF_TYPE: &str = "public.tiff";
pub const FILE_URL_TYPE: &str = "public.file-url";
/// Fallback type for opaque data written back to the pasteboard
pub const GENERIC_DATA_TYPE: &str = "public.data";

/// Everything a single pasteboard read produced.
///
/// Fields are filled for every representation the pasteboard offered;
/// classification decides which one wins.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PasteboardSnapshot {
    /// File references, if any
    pub file_paths: Vec<PathBuf>,
    /// Encoded image data (PNG or TIFF)
    pub image: Option<Bytes>,
    /// RTF document bytes
    pub rtf: Option<Bytes>,
    /// Plain string
    pub text: Option<String>,
    /// First declared representation with its type identifier
    pub first_representation: Option<(String, Bytes)>,
}

impl PasteboardSnapshot {
    /// Snapshot holding only a string
    pub fn from_text(text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            first_representation: Some((TEXT_TYPE.to_string(), Bytes::from(text.clone()))),
            text: Some(text),
            ..Default::default()
        }
    }

    /// Whether nothing was read
    pub fn is_empty(&self) -> bool {
        self.file_paths.is_empty()
            && self.image.is_none()
            && self.rtf.is_none()
            && self.text.is_none()
            && self.first_representation.is_none()
    }
}

/// Type-tagged content written to the pasteboard
#[derive(Debug, Clone, PartialEq)]
pub enum PasteboardPayload {
    /// Plain string
    Text(String),
    /// RTF document bytes
    RichText(Bytes),
    /// Encoded image data
    Image(Bytes),
    /// File references
    Files(Vec<PathBuf>),
    /// Opaque data under an explicit type identifier
    Data { uti: String, bytes: Bytes },
}

impl PasteboardPayload {
    /// Snapshot a reader would observe after this payload is written
    pub fn to_snapshot(&self) -> PasteboardSnapshot {
        match self {
            PasteboardPayload::Text(text) => PasteboardSnapshot::from_text(text.clone()),
            PasteboardPayload::RichText(data) => PasteboardSnapshot {
                rtf: Some(data.clone()),
                first_representation: Some((RTF_TYPE.to_string(), data.clone())),
                ..Default::default()
            },
            PasteboardPayload::Image(data) => PasteboardSnapshot {
                image: Some(data.clone()),
                first_representation: Some((image_type_for(data).to_string(), data.clone())),
                ..Default::default()
            },
            PasteboardPayload::Files(paths) => {
                let joined = paths
                    .iter()
                    .map(|p| p.to_string_lossy().into_owned())
                    .collect::<Vec<_>>()
                    .join("\n");
                PasteboardSnapshot {
                    file_paths: paths.clone(),
                    first_representation: Some((FILE_URL_TYPE.to_string(), Bytes::from(joined))),
                    ..Default::default()
                }
            }
            PasteboardPayload::Data { uti, bytes } => PasteboardSnapshot {
                first_representation: Some((uti.clone(), bytes.clone())),
                ..Default::default()
            },
        }
    }
}

/// Pick the pasteboard image type matching the encoded data
pub fn image_type_for(data: &[u8]) -> &'static str {
    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];
    if data.starts_with(PNG_MAGIC) {
        PNG_TYPE
    } else {
        TIFF_TYPE
    }
}

/// Pasteboard provider trait
#[async_trait]
pub trait Pasteboard: Send + Sync {
    /// Current change counter; increases whenever the contents change
    async fn change_count(&self) -> Result<i64, ClipboardError>;

    /// Read the current contents
    async fn read_snapshot(&self) -> Result<PasteboardSnapshot, ClipboardError>;

    /// Replace the contents with `payload`
    async fn write(&self, payload: &PasteboardPayload) -> Result<(), ClipboardError>;

    /// Get provider name
    fn name(&self) -> &str;
}

/// Clipboard errors
#[derive(Debug, Error)]
pub enum ClipboardError {
    /// Platform-specific error
    #[error("Platform error: {0}")]
    Platform(String),

    /// Unsupported content type
    #[error("Unsupported content type: {0}")]
    UnsupportedType(String),

    /// Image could not be decoded or encoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Create a pasteboard provider for the current platform
pub fn create_provider() -> Result<Arc<dyn Pasteboard>, ClipboardError> {
    #[cfg(target_os = "macos")]
    {
        Ok(Arc::new(macos::MacOSPasteboard::new()?))
    }

    #[cfg(not(target_os = "macos"))]
    {
        Ok(Arc::new(generic::GenericPasteboard::new()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_from_text() {
        let snapshot = PasteboardSnapshot::from_text("Hello");
        assert_eq!(snapshot.text.as_deref(), Some("Hello"));
        assert!(!snapshot.is_empty());
        assert!(PasteboardSnapshot::default().is_empty());
    }

    #[test]
    fn test_payload_to_snapshot() {
        let payload = PasteboardPayload::Files(vec![PathBuf::from("/a"), PathBuf::from("/b")]);
        let snapshot = payload.to_snapshot();
        assert_eq!(snapshot.file_paths.len(), 2);
        assert_eq!(
            snapshot.first_representation.as_ref().map(|(t, _)| t.as_str()),
            Some(FILE_URL_TYPE)
        );

        let rtf = PasteboardPayload::RichText(Bytes::from_static(b"{\\rtf1 x}")).to_snapshot();
        assert!(rtf.rtf.is_some());
        assert!(rtf.text.is_none());
    }

    #[test]
    fn test_image_type_detection() {
        assert_eq!(image_type_for(&[0x89, b'P', b'N', b'G', 0x0D]), PNG_TYPE);
        assert_eq!(image_type_for(b"II*\0"), TIFF_TYPE);
    }
}
