//! Cross-platform pasteboard built on arboard
//!
//! arboard has no change counter, so one is synthesized: the counter moves
//! whenever a hash of the raw clipboard text and pixels differs from the
//! last one seen. arboard calls block, so they run on the blocking pool.

use std::borrow::Cow;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io::Cursor;
use std::sync::{Arc, Mutex};

use arboard::{Clipboard, ImageData};
use async_trait::async_trait;
use bytes::Bytes;
use image::{ImageBuffer, ImageFormat, Rgba};
use tracing::{debug, trace};

use super::{ClipboardError, Pasteboard, PasteboardPayload, PasteboardSnapshot, PNG_TYPE};

struct Inner {
    clipboard: Clipboard,
    last_hash: Option<u64>,
    change_count: i64,
}

impl Inner {
    /// Re-hash the contents, bumping the counter on a difference
    fn refresh(&mut self) -> i64 {
        let hash = current_fingerprint(&mut self.clipboard);
        if self.last_hash != Some(hash) {
            self.last_hash = Some(hash);
            self.change_count += 1;
        }
        self.change_count
    }
}

/// arboard-backed pasteboard
pub struct GenericPasteboard {
    inner: Arc<Mutex<Inner>>,
}

impl GenericPasteboard {
    pub fn new() -> Result<Self, ClipboardError> {
        let clipboard = Clipboard::new().map_err(platform)?;
        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                clipboard,
                last_hash: None,
                change_count: 0,
            })),
        })
    }

    /// Run `f` against the clipboard on the blocking pool
    async fn with_inner<T, F>(&self, f: F) -> Result<T, ClipboardError>
    where
        F: FnOnce(&mut Inner) -> Result<T, ClipboardError> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let mut guard = inner
                .lock()
                .map_err(|_| ClipboardError::Platform("clipboard lock poisoned".to_string()))?;
            f(&mut guard)
        })
        .await
        .map_err(|e| ClipboardError::Platform(format!("clipboard task failed: {}", e)))?
    }
}

fn platform(e: arboard::Error) -> ClipboardError {
    ClipboardError::Platform(e.to_string())
}

fn read(clipboard: &mut Clipboard) -> Result<PasteboardSnapshot, ClipboardError> {
    let mut snapshot = PasteboardSnapshot::default();

    if let Ok(text) = clipboard.get_text() {
        snapshot = PasteboardSnapshot::from_text(text);
    }

    match clipboard.get_image() {
        Ok(image) => {
            let png = rgba_to_png(&image)?;
            if snapshot.first_representation.is_none() {
                snapshot.first_representation = Some((PNG_TYPE.to_string(), png.clone()));
            }
            snapshot.image = Some(png);
        }
        Err(arboard::Error::ContentNotAvailable) => {}
        Err(e) => trace!("No image on clipboard: {}", e),
    }

    Ok(snapshot)
}

fn current_fingerprint(clipboard: &mut Clipboard) -> u64 {
    let text = clipboard.get_text().ok();
    let image = clipboard.get_image().ok();
    fingerprint(text.as_deref(), image.as_ref())
}

/// Hash of the unencoded contents
fn fingerprint(text: Option<&str>, image: Option<&ImageData<'_>>) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    match image {
        Some(image) => {
            (image.width, image.height).hash(&mut hasher);
            image.bytes.as_ref().hash(&mut hasher);
        }
        None => 0u8.hash(&mut hasher),
    }
    hasher.finish()
}

fn rgba_to_png(image: &ImageData<'_>) -> Result<Bytes, ClipboardError> {
    let buffer: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_raw(
        image.width as u32,
        image.height as u32,
        image.bytes.to_vec(),
    )
    .ok_or_else(|| ClipboardError::Platform("clipboard image has invalid dimensions".to_string()))?;

    let mut out = Cursor::new(Vec::new());
    buffer.write_to(&mut out, ImageFormat::Png)?;
    Ok(Bytes::from(out.into_inner()))
}

fn encoded_to_rgba(data: &[u8]) -> Result<ImageData<'static>, ClipboardError> {
    let decoded = image::load_from_memory(data)?.into_rgba8();
    Ok(ImageData {
        width: decoded.width() as usize,
        height: decoded.height() as usize,
        bytes: Cow::Owned(decoded.into_raw()),
    })
}

fn write_payload(clipboard: &mut Clipboard, payload: &PasteboardPayload) -> Result<(), ClipboardError> {
    match payload {
        PasteboardPayload::Text(text) => clipboard.set_text(text.clone()).map_err(platform),
        PasteboardPayload::Image(data) => {
            let image = encoded_to_rgba(data)?;
            clipboard.set_image(image).map_err(platform)
        }
        PasteboardPayload::RichText(data) => {
            // Plain text is all arboard can carry here
            let text = super::classify::rtf_plain_text(data)
                .unwrap_or_else(|| String::from_utf8_lossy(data).into_owned());
            clipboard.set_text(text).map_err(platform)
        }
        PasteboardPayload::Files(paths) => {
            debug!("Writing {} file reference(s) as text", paths.len());
            let joined = paths
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("\n");
            clipboard.set_text(joined).map_err(platform)
        }
        PasteboardPayload::Data { uti, .. } => Err(ClipboardError::UnsupportedType(uti.clone())),
    }
}

#[async_trait]
impl Pasteboard for GenericPasteboard {
    async fn change_count(&self) -> Result<i64, ClipboardError> {
        self.with_inner(|inner| Ok(inner.refresh())).await
    }

    async fn read_snapshot(&self) -> Result<PasteboardSnapshot, ClipboardError> {
        self.with_inner(|inner| read(&mut inner.clipboard)).await
    }

    async fn write(&self, payload: &PasteboardPayload) -> Result<(), ClipboardError> {
        let payload = payload.clone();
        self.with_inner(move |inner| {
            write_payload(&mut inner.clipboard, &payload)?;
            // Our own write always counts as a change, even if the contents match
            inner.last_hash = Some(current_fingerprint(&mut inner.clipboard));
            inner.change_count += 1;
            Ok(())
        })
        .await
    }

    fn name(&self) -> &str {
        "arboard"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_png_conversion() {
        let image = ImageData {
            width: 2,
            height: 1,
            bytes: Cow::Owned(vec![255, 0, 0, 255, 0, 255, 0, 255]),
        };
        let png = rgba_to_png(&image).unwrap();
        assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));

        let back = encoded_to_rgba(&png).unwrap();
        assert_eq!((back.width, back.height), (2, 1));
        assert_eq!(back.bytes.as_ref(), image.bytes.as_ref());
    }

    #[test]
    fn test_fingerprint_tracks_content() {
        let pixels = |p: u8| ImageData {
            width: 1,
            height: 1,
            bytes: Cow::Owned(vec![p, p, p, 255]),
        };

        assert_eq!(fingerprint(Some("a"), None), fingerprint(Some("a"), None));
        assert_ne!(fingerprint(Some("a"), None), fingerprint(Some("b"), None));
        assert_ne!(fingerprint(Some("a"), None), fingerprint(Some("a"), Some(&pixels(0))));
        assert_eq!(
            fingerprint(None, Some(&pixels(9))),
            fingerprint(None, Some(&pixels(9)))
        );
        assert_ne!(
            fingerprint(None, Some(&pixels(9))),
            fingerprint(None, Some(&pixels(10)))
        );
    }

    #[test]
    fn test_fingerprint_sees_dimensions() {
        let wide = ImageData {
            width: 2,
            height: 1,
            bytes: Cow::Owned(vec![0; 8]),
        };
        let tall = ImageData {
            width: 1,
            height: 2,
            bytes: Cow::Owned(vec![0; 8]),
        };
        assert_ne!(fingerprint(None, Some(&wide)), fingerprint(None, Some(&tall)));
    }
}
