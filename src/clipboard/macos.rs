//! macOS pasteboard implementation using NSPasteboard

use std::ffi::CStr;
use std::os::raw::c_char;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use cocoa::base::{id, nil, BOOL, YES};
use cocoa::foundation::{NSArray, NSAutoreleasePool, NSString, NSUInteger};
use objc::{class, msg_send, sel, sel_impl};
use tracing::trace;

use super::{
    image_type_for, ClipboardError, Pasteboard, PasteboardPayload, PasteboardSnapshot,
    FILE_URL_TYPE, PNG_TYPE, RTF_TYPE, TEXT_TYPE, TIFF_TYPE,
};

const FILE_URLS_ONLY_KEY: &str = "NSPasteboardURLReadingFileURLsOnlyKey";

/// macOS pasteboard provider
pub struct MacOSPasteboard {
    pasteboard: id,
}

impl MacOSPasteboard {
    /// Attach to the general pasteboard
    pub fn new() -> Result<Self, ClipboardError> {
        unsafe {
            let pasteboard: id = msg_send![class!(NSPasteboard), generalPasteboard];
            if pasteboard == nil {
                return Err(ClipboardError::Platform(
                    "Failed to get general pasteboard".to_string(),
                ));
            }

            Ok(Self { pasteboard })
        }
    }

    unsafe fn ns_string(value: &str) -> id {
        NSString::alloc(nil).init_str(value)
    }

    unsafe fn rust_string(value: id) -> Option<String> {
        if value == nil {
            return None;
        }
        let utf8_ptr: *const c_char = msg_send![value, UTF8String];
        if utf8_ptr.is_null() {
            return None;
        }
        Some(CStr::from_ptr(utf8_ptr).to_string_lossy().into_owned())
    }

    unsafe fn data_bytes(data: id) -> Option<Bytes> {
        if data == nil {
            return None;
        }
        let length: NSUInteger = msg_send![data, length];
        let bytes: *const u8 = msg_send![data, bytes];
        if bytes.is_null() || length == 0 {
            return None;
        }
        Some(Bytes::copy_from_slice(std::slice::from_raw_parts(
            bytes,
            length as usize,
        )))
    }

    unsafe fn has_type(&self, uti: &str) -> bool {
        let types = NSArray::arrayWithObject(nil, Self::ns_string(uti));
        let available: id = msg_send![self.pasteboard, availableTypeFromArray: types];
        available != nil
    }

    unsafe fn read_data(&self, uti: &str) -> Option<Bytes> {
        if !self.has_type(uti) {
            return None;
        }
        let data: id = msg_send![self.pasteboard, dataForType: Self::ns_string(uti)];
        Self::data_bytes(data)
    }

    unsafe fn read_string(&self) -> Option<String> {
        if !self.has_type(TEXT_TYPE) {
            return None;
        }
        let value: id = msg_send![self.pasteboard, stringForType: Self::ns_string(TEXT_TYPE)];
        Self::rust_string(value)
    }

    unsafe fn read_file_paths(&self) -> Vec<PathBuf> {
        if !self.has_type(FILE_URL_TYPE) {
            return Vec::new();
        }

        let classes = NSArray::arrayWithObject(nil, class!(NSURL) as *const _ as id);
        let yes: id = msg_send![class!(NSNumber), numberWithBool: YES];
        let options: id = msg_send![class!(NSDictionary),
            dictionaryWithObject: yes
            forKey: Self::ns_string(FILE_URLS_ONLY_KEY)];
        let urls: id = msg_send![self.pasteboard, readObjectsForClasses: classes options: options];
        if urls == nil {
            return Vec::new();
        }

        let count: NSUInteger = msg_send![urls, count];
        (0..count)
            .filter_map(|i| {
                let url: id = msg_send![urls, objectAtIndex: i];
                let path: id = msg_send![url, path];
                Self::rust_string(path).map(PathBuf::from)
            })
            .collect()
    }

    unsafe fn read_first_representation(&self) -> Option<(String, Bytes)> {
        let types: id = msg_send![self.pasteboard, types];
        if types == nil {
            return None;
        }
        let count: NSUInteger = msg_send![types, count];
        if count == 0 {
            return None;
        }
        let first: id = msg_send![types, objectAtIndex: 0 as NSUInteger];
        let uti = Self::rust_string(first)?;
        let data: id = msg_send![self.pasteboard, dataForType: first];
        Some((uti, Self::data_bytes(data).unwrap_or_default()))
    }

    unsafe fn set_data(&self, bytes: &[u8], uti: &str) -> bool {
        let data: id = msg_send![class!(NSData),
            dataWithBytes: bytes.as_ptr() as *const std::ffi::c_void
            length: bytes.len() as NSUInteger];
        let ok: BOOL = msg_send![self.pasteboard, setData: data forType: Self::ns_string(uti)];
        ok == YES
    }
}

#[async_trait]
impl Pasteboard for MacOSPasteboard {
    async fn change_count(&self) -> Result<i64, ClipboardError> {
        let count: i64 = unsafe { msg_send![self.pasteboard, changeCount] };
        Ok(count)
    }

    async fn read_snapshot(&self) -> Result<PasteboardSnapshot, ClipboardError> {
        unsafe {
            let pool = NSAutoreleasePool::new(nil);

            let snapshot = PasteboardSnapshot {
                file_paths: self.read_file_paths(),
                image: self
                    .read_data(PNG_TYPE)
                    .or_else(|| self.read_data(TIFF_TYPE)),
                rtf: self.read_data(RTF_TYPE),
                text: self.read_string(),
                first_representation: self.read_first_representation(),
            };

            let _: () = msg_send![pool, drain];
            trace!(
                files = snapshot.file_paths.len(),
                image = snapshot.image.is_some(),
                rtf = snapshot.rtf.is_some(),
                text = snapshot.text.is_some(),
                "Read pasteboard"
            );
            Ok(snapshot)
        }
    }

    async fn write(&self, payload: &PasteboardPayload) -> Result<(), ClipboardError> {
        unsafe {
            let pool = NSAutoreleasePool::new(nil);
            let _: () = msg_send![self.pasteboard, clearContents];

            let ok = match payload {
                PasteboardPayload::Text(text) => {
                    let ok: BOOL = msg_send![self.pasteboard,
                        setString: Self::ns_string(text)
                        forType: Self::ns_string(TEXT_TYPE)];
                    ok == YES
                }
                PasteboardPayload::RichText(data) => self.set_data(data, RTF_TYPE),
                PasteboardPayload::Image(data) => self.set_data(data, image_type_for(data)),
                PasteboardPayload::Files(paths) => {
                    let urls: Vec<id> = paths
                        .iter()
                        .map(|p| {
                            let url: id = msg_send![class!(NSURL),
                                fileURLWithPath: Self::ns_string(&p.to_string_lossy())];
                            url
                        })
                        .collect();
                    let array = NSArray::arrayWithObjects(nil, &urls);
                    let ok: BOOL = msg_send![self.pasteboard, writeObjects: array];
                    ok == YES
                }
                PasteboardPayload::Data { uti, bytes } => self.set_data(bytes, uti),
            };

            let _: () = msg_send![pool, drain];

            if ok {
                Ok(())
            } else {
                Err(ClipboardError::Platform(
                    "Failed to write to pasteboard".to_string(),
                ))
            }
        }
    }

    fn name(&self) -> &str {
        "macOS (NSPasteboard)"
    }
}

// Safety: NSPasteboard is thread-safe according to Apple documentation
unsafe impl Send for MacOSPasteboard {}
unsafe impl Sync for MacOSPasteboard {}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    #[ignore = "touches the user's pasteboard"]
    async fn test_macos_pasteboard_text() {
        let pasteboard = MacOSPasteboard::new().unwrap();
        let before = pasteboard.change_count().await.unwrap();

        pasteboard
            .write(&PasteboardPayload::Text("Hello from macOS!".to_string()))
            .await
            .unwrap();

        let snapshot = pasteboard.read_snapshot().await.unwrap();
        assert_eq!(snapshot.text.as_deref(), Some("Hello from macOS!"));
        assert!(pasteboard.change_count().await.unwrap() > before);
    }

    #[test]
    fn test_macos_pasteboard_name() {
        let pasteboard = MacOSPasteboard::new().unwrap();
        assert_eq!(pasteboard.name(), "macOS (NSPasteboard)");
    }
}
