//! Turn a pasteboard snapshot into a history item
//!
//! Priority, first match wins: file references, image data, RTF markup,
//! plain string, then whatever representation the pasteboard listed first.

use std::io::Cursor;

use bytes::Bytes;
use image::{GenericImageView, ImageFormat};
use tracing::{debug, warn};

use super::PasteboardSnapshot;
use crate::history::item::{truncate_preview, ClipboardItem, ItemType};

/// Images wider or taller than this are scaled down before storing
pub const MAX_IMAGE_DIMENSION: u32 = 2048;

/// URL schemes that turn a string into a link item
const URL_SCHEMES: [&str; 3] = ["http", "https", "ftp"];

/// Classify the snapshot and build a candidate item.
///
/// Returns `None` when the winning representation is empty or unreadable.
pub fn classify(snapshot: &PasteboardSnapshot) -> Option<ClipboardItem> {
    if !snapshot.file_paths.is_empty() {
        return Some(file_item(snapshot));
    }
    if let Some(data) = &snapshot.image {
        return image_item(data);
    }
    if let Some(rtf) = &snapshot.rtf {
        return Some(rich_text_item(rtf));
    }
    if let Some(text) = &snapshot.text {
        return text_item(text);
    }
    snapshot
        .first_representation
        .as_ref()
        .map(|(uti, data)| {
            ClipboardItem::new(ItemType::Unknown, data.clone(), format!("Unknown type: {}", uti))
        })
}

/// Whether the string is an absolute http, https or ftp URL
pub fn is_valid_url(text: &str) -> bool {
    if text.is_empty() || text.chars().any(char::is_whitespace) {
        return false;
    }
    match url::Url::parse(text) {
        Ok(url) => URL_SCHEMES.contains(&url.scheme()),
        Err(_) => false,
    }
}

fn text_item(text: &str) -> Option<ClipboardItem> {
    if text.is_empty() {
        return None;
    }
    let item_type = if is_valid_url(text) {
        ItemType::Url
    } else {
        ItemType::Text
    };
    Some(ClipboardItem::new(
        item_type,
        text.as_bytes().to_vec(),
        truncate_preview(text),
    ))
}

fn rich_text_item(rtf: &Bytes) -> ClipboardItem {
    let preview = rtf_plain_text(rtf)
        .map(|text| truncate_preview(text.trim()))
        .filter(|text| !text.is_empty())
        .unwrap_or_else(|| "Rich text".to_string());
    ClipboardItem::new(ItemType::RichText, rtf.clone(), preview)
}

fn file_item(snapshot: &PasteboardSnapshot) -> ClipboardItem {
    let paths = &snapshot.file_paths;
    let joined = paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("\n");

    let preview = if paths.len() == 1 {
        paths[0]
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| paths[0].to_string_lossy().into_owned())
    } else {
        format!("{} files", paths.len())
    };

    ClipboardItem::new(ItemType::File, joined.into_bytes(), preview)
}

fn image_item(data: &Bytes) -> Option<ClipboardItem> {
    if data.is_empty() {
        return None;
    }

    let decoded = match image::load_from_memory(data) {
        Ok(img) => img,
        Err(e) => {
            debug!("Image data could not be decoded, storing as-is: {}", e);
            return Some(ClipboardItem::new(ItemType::Image, data.clone(), "Image"));
        }
    };

    let (width, height) = decoded.dimensions();
    let preview = format!("Image {}×{}", width, height);

    if width <= MAX_IMAGE_DIMENSION && height <= MAX_IMAGE_DIMENSION {
        return Some(ClipboardItem::new(ItemType::Image, data.clone(), preview));
    }

    let resized = decoded.resize(
        MAX_IMAGE_DIMENSION,
        MAX_IMAGE_DIMENSION,
        image::imageops::FilterType::Lanczos3,
    );
    let mut output = Cursor::new(Vec::new());
    match resized.write_to(&mut output, ImageFormat::Png) {
        Ok(()) => {
            debug!(
                "Scaled image {}x{} down to {}x{}",
                width,
                height,
                resized.width(),
                resized.height()
            );
            Some(ClipboardItem::new(ItemType::Image, output.into_inner(), preview))
        }
        Err(e) => {
            warn!("Failed to re-encode scaled image, keeping original: {}", e);
            Some(ClipboardItem::new(ItemType::Image, data.clone(), preview))
        }
    }
}

/// Destinations whose text is not part of the document body
const SKIPPED_DESTINATIONS: [&str; 8] = [
    "fonttbl",
    "colortbl",
    "stylesheet",
    "info",
    "pict",
    "header",
    "footer",
    "expandedcolortbl",
];

/// Extract the visible text of an RTF document.
///
/// Handles groups, control words, `\'hh` escapes, `\uN` unicode escapes and
/// skips font/color tables and `{\*...}` destinations. Returns `None` when the
/// data does not look like RTF.
pub fn rtf_plain_text(data: &[u8]) -> Option<String> {
    let source = std::str::from_utf8(data).ok()?;
    if !source.trim_start().starts_with("{\\rtf") {
        return None;
    }

    let chars: Vec<char> = source.chars().collect();
    let mut out = String::new();
    // Depth at which an ignored destination started
    let mut skip_from: Option<usize> = None;
    let mut depth = 0usize;
    let mut unicode_skip = 0usize;
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' => {
                depth += 1;
                if skip_from.is_none() && chars.get(i + 1) == Some(&'\\') && chars.get(i + 2) == Some(&'*') {
                    skip_from = Some(depth);
                }
                i += 1;
            }
            '}' => {
                if skip_from == Some(depth) {
                    skip_from = None;
                }
                depth = depth.saturating_sub(1);
                i += 1;
            }
            '\\' => {
                i += 1;
                let Some(&next) = chars.get(i) else { break };
                if next.is_ascii_alphabetic() {
                    let start = i;
                    while i < chars.len() && chars[i].is_ascii_alphabetic() {
                        i += 1;
                    }
                    let word: String = chars[start..i].iter().collect();
                    let num_start = i;
                    if i < chars.len() && (chars[i] == '-' || chars[i].is_ascii_digit()) {
                        i += 1;
                        while i < chars.len() && chars[i].is_ascii_digit() {
                            i += 1;
                        }
                    }
                    let param: Option<i32> = chars[num_start..i].iter().collect::<String>().parse().ok();
                    if chars.get(i) == Some(&' ') {
                        i += 1;
                    }

                    if SKIPPED_DESTINATIONS.contains(&word.as_str()) && skip_from.is_none() {
                        skip_from = Some(depth);
                        continue;
                    }
                    if skip_from.is_some() {
                        continue;
                    }
                    match word.as_str() {
                        "par" | "line" => out.push('\n'),
                        "tab" => out.push('\t'),
                        "u" => {
                            if let Some(code) = param {
                                let code = if code < 0 { code + 65_536 } else { code };
                                if let Some(ch) = char::from_u32(code as u32) {
                                    out.push(ch);
                                }
                                unicode_skip = 1;
                            }
                        }
                        _ => {}
                    }
                } else if next == '\'' {
                    let hex: String = chars.iter().skip(i + 1).take(2).collect();
                    i += 1 + hex.len();
                    if unicode_skip > 0 {
                        unicode_skip -= 1;
                        continue;
                    }
                    if skip_from.is_none() {
                        if let Ok(byte) = u8::from_str_radix(&hex, 16) {
                            out.push(char::from(byte));
                        }
                    }
                } else {
                    i += 1;
                    if skip_from.is_none() && matches!(next, '\\' | '{' | '}') {
                        out.push(next);
                    }
                }
            }
            '\r' | '\n' => i += 1,
            _ => {
                i += 1;
                if unicode_skip > 0 {
                    unicode_skip -= 1;
                    continue;
                }
                if skip_from.is_none() {
                    out.push(c);
                }
            }
        }
    }

    Some(out)
}
