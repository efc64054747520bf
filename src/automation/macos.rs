//! macOS automation via NSWorkspace, CGEvent and the Accessibility API

use std::ffi::CStr;
use std::os::raw::c_char;

use cocoa::base::{id, nil};
use core_graphics::event::{CGEvent, CGEventFlags, CGEventTapLocation, CGKeyCode};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use objc::{class, msg_send, sel, sel_impl};
use tracing::debug;

use super::{Automation, AutomationError};

// ANSI "V"
const KEY_CODE_V: CGKeyCode = 0x09;

#[link(name = "ApplicationServices", kind = "framework")]
extern "C" {
    fn AXIsProcessTrusted() -> bool;
}

/// macOS automation adapter
#[derive(Debug, Default)]
pub struct MacOSAutomation;

impl MacOSAutomation {
    pub fn new() -> Self {
        Self
    }

    fn post_key(key_code: CGKeyCode, flags: CGEventFlags) -> Result<(), AutomationError> {
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| AutomationError::Platform("Failed to create CGEventSource".to_string()))?;

        for key_down in [true, false] {
            let event = CGEvent::new_keyboard_event(source.clone(), key_code, key_down)
                .map_err(|_| AutomationError::Platform("Failed to create key event".to_string()))?;
            event.set_flags(flags);
            event.post(CGEventTapLocation::HID);
        }
        Ok(())
    }
}

impl Automation for MacOSAutomation {
    fn frontmost_application(&self) -> Option<String> {
        unsafe {
            let workspace: id = msg_send![class!(NSWorkspace), sharedWorkspace];
            let app: id = msg_send![workspace, frontmostApplication];
            if app == nil {
                return None;
            }
            let bundle_id: id = msg_send![app, bundleIdentifier];
            if bundle_id == nil {
                return None;
            }
            let ptr: *const c_char = msg_send![bundle_id, UTF8String];
            if ptr.is_null() {
                return None;
            }
            Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
        }
    }

    fn simulate_paste(&self) -> Result<(), AutomationError> {
        if !self.is_trusted() {
            return Err(AutomationError::NotTrusted);
        }
        Self::post_key(KEY_CODE_V, CGEventFlags::CGEventFlagCommand)?;
        debug!("Posted Cmd+V");
        Ok(())
    }

    fn is_trusted(&self) -> bool {
        unsafe { AXIsProcessTrusted() }
    }
}
