//! Global hotkey binding and registration

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use global_hotkey::{
    hotkey::{Code, HotKey, Modifiers},
    GlobalHotKeyEvent, GlobalHotKeyManager, HotKeyState,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Hotkey errors
#[derive(Debug, Error)]
pub enum HotkeyError {
    /// Binding string could not be understood
    #[error("Invalid hotkey '{0}': {1}")]
    Parse(String, String),

    /// The OS refused the registration
    #[error("Failed to register hotkey: {0}")]
    Registration(String),
}

/// Key combination such as `Cmd+Shift+V`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HotkeyBinding {
    modifiers: Modifiers,
    code: Code,
}

impl HotkeyBinding {
    pub fn new(modifiers: Modifiers, code: Code) -> Self {
        Self { modifiers, code }
    }

    /// Parse `Modifier+...+Key`, case-insensitive
    pub fn parse(binding: &str) -> Result<Self, HotkeyError> {
        let err = |reason: &str| HotkeyError::Parse(binding.to_string(), reason.to_string());

        let parts: Vec<&str> = binding.split('+').map(str::trim).collect();
        let (key, modifier_parts) = match parts.split_last() {
            Some((key, rest)) if !key.is_empty() => (*key, rest),
            _ => return Err(err("missing key")),
        };

        let mut modifiers = Modifiers::empty();
        for part in modifier_parts {
            let modifier = match part.to_lowercase().as_str() {
                "cmd" | "command" | "super" | "meta" => Modifiers::META,
                "shift" => Modifiers::SHIFT,
                "alt" | "option" | "opt" => Modifiers::ALT,
                "ctrl" | "control" => Modifiers::CONTROL,
                _ => return Err(err(&format!("unknown modifier '{}'", part))),
            };
            modifiers |= modifier;
        }

        let code = parse_key(key).ok_or_else(|| err(&format!("unknown key '{}'", key)))?;
        Ok(Self { modifiers, code })
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn code(&self) -> Code {
        self.code
    }

    /// macOS style rendering, e.g. `⌘⇧V`
    pub fn display_string(&self) -> String {
        let mut out = String::new();
        for (modifier, glyph) in [
            (Modifiers::META, '⌘'),
            (Modifiers::ALT, '⌥'),
            (Modifiers::CONTROL, '⌃'),
            (Modifiers::SHIFT, '⇧'),
        ] {
            if self.modifiers.contains(modifier) {
                out.push(glyph);
            }
        }
        out.push_str(key_label(self.code));
        out
    }

    fn to_hotkey(self) -> HotKey {
        let modifiers = (!self.modifiers.is_empty()).then_some(self.modifiers);
        HotKey::new(modifiers, self.code)
    }
}

impl fmt::Display for HotkeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_string())
    }
}

impl std::str::FromStr for HotkeyBinding {
    type Err = HotkeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

const KEYS: &[(&str, Code, &str)] = &[
    ("a", Code::KeyA, "A"),
    ("b", Code::KeyB, "B"),
    ("c", Code::KeyC, "C"),
    ("d", Code::KeyD, "D"),
    ("e", Code::KeyE, "E"),
    ("f", Code::KeyF, "F"),
    ("g", Code::KeyG, "G"),
    ("h", Code::KeyH, "H"),
    ("i", Code::KeyI, "I"),
    ("j", Code::KeyJ, "J"),
    ("k", Code::KeyK, "K"),
    ("l", Code::KeyL, "L"),
    ("m", Code::KeyM, "M"),
    ("n", Code::KeyN, "N"),
    ("o", Code::KeyO, "O"),
    ("p", Code::KeyP, "P"),
    ("q", Code::KeyQ, "Q"),
    ("r", Code::KeyR, "R"),
    ("s", Code::KeyS, "S"),
    ("t", Code::KeyT, "T"),
    ("u", Code::KeyU, "U"),
    ("v", Code::KeyV, "V"),
    ("w", Code::KeyW, "W"),
    ("x", Code::KeyX, "X"),
    ("y", Code::KeyY, "Y"),
    ("z", Code::KeyZ, "Z"),
    ("0", Code::Digit0, "0"),
    ("1", Code::Digit1, "1"),
    ("2", Code::Digit2, "2"),
    ("3", Code::Digit3, "3"),
    ("4", Code::Digit4, "4"),
    ("5", Code::Digit5, "5"),
    ("6", Code::Digit6, "6"),
    ("7", Code::Digit7, "7"),
    ("8", Code::Digit8, "8"),
    ("9", Code::Digit9, "9"),
    ("space", Code::Space, "Space"),
    ("tab", Code::Tab, "⇥"),
    ("return", Code::Enter, "↩"),
    ("enter", Code::Enter, "↩"),
    ("escape", Code::Escape, "⎋"),
    ("esc", Code::Escape, "⎋"),
    ("delete", Code::Backspace, "⌫"),
    ("backspace", Code::Backspace, "⌫"),
    ("[", Code::BracketLeft, "["),
    ("]", Code::BracketRight, "]"),
    ("-", Code::Minus, "-"),
    ("=", Code::Equal, "="),
    (";", Code::Semicolon, ";"),
    ("'", Code::Quote, "'"),
    (",", Code::Comma, ","),
    (".", Code::Period, "."),
    ("/", Code::Slash, "/"),
    ("\\", Code::Backslash, "\\"),
    ("`", Code::Backquote, "`"),
];

fn parse_key(key: &str) -> Option<Code> {
    let key = key.to_lowercase();
    KEYS.iter()
        .find(|(name, _, _)| *name == key)
        .map(|(_, code, _)| *code)
}

fn key_label(code: Code) -> &'static str {
    KEYS.iter()
        .find(|(_, c, _)| *c == code)
        .map(|(_, _, label)| *label)
        .unwrap_or("?")
}

/// Actions a hotkey can trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HotKeyAction {
    ShowHistory,
}

/// Registers global hotkeys and broadcasts their presses
pub struct HotKeyManager {
    manager: GlobalHotKeyManager,
    hotkeys: HashMap<u32, (HotKey, HotKeyAction)>,
    event_sender: broadcast::Sender<HotKeyAction>,
    running: Arc<AtomicBool>,
}

impl HotKeyManager {
    pub fn new() -> Result<Self, HotkeyError> {
        let manager =
            GlobalHotKeyManager::new().map_err(|e| HotkeyError::Registration(e.to_string()))?;
        let (event_sender, _) = broadcast::channel(16);

        Ok(Self {
            manager,
            hotkeys: HashMap::new(),
            event_sender,
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Register `binding` for `action`
    pub fn register(&mut self, binding: HotkeyBinding, action: HotKeyAction) -> Result<(), HotkeyError> {
        let hotkey = binding.to_hotkey();
        self.manager
            .register(hotkey)
            .map_err(|e| HotkeyError::Registration(e.to_string()))?;
        self.hotkeys.insert(hotkey.id(), (hotkey, action));

        info!("Registered {} for {:?}", binding, action);
        Ok(())
    }

    /// Forward hotkey presses to subscribers until [`Self::stop`] is called
    pub fn start_event_loop(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }

        let actions: HashMap<u32, HotKeyAction> = self
            .hotkeys
            .iter()
            .map(|(id, (_, action))| (*id, *action))
            .collect();
        let event_sender = self.event_sender.clone();
        let running = Arc::clone(&self.running);

        tokio::task::spawn_blocking(move || {
            let receiver = GlobalHotKeyEvent::receiver();
            while running.load(Ordering::SeqCst) {
                let Ok(event) = receiver.recv_timeout(Duration::from_millis(100)) else {
                    continue;
                };
                if event.state != HotKeyState::Pressed {
                    continue;
                }
                if let Some(action) = actions.get(&event.id) {
                    debug!("Hotkey pressed: {:?}", action);
                    if event_sender.send(*action).is_err() {
                        debug!("No hotkey subscribers");
                    }
                }
            }
            debug!("Hotkey event loop stopped");
        });
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HotKeyAction> {
        self.event_sender.subscribe()
    }

    pub fn unregister_all(&mut self) {
        for (_, (hotkey, _)) in self.hotkeys.drain() {
            if let Err(e) = self.manager.unregister(hotkey) {
                warn!("Failed to unregister hotkey: {}", e);
            }
        }
    }
}

impl Drop for HotKeyManager {
    fn drop(&mut self) {
        self.stop();
        self.unregister_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_default_binding() {
        let binding = HotkeyBinding::parse("Cmd+Shift+V").unwrap();
        assert_eq!(binding.modifiers(), Modifiers::META | Modifiers::SHIFT);
        assert_eq!(binding.code(), Code::KeyV);
        assert_eq!(binding.display_string(), "⌘⇧V");
    }

    #[test]
    fn test_parse_aliases() {
        let a = HotkeyBinding::parse("command + option + ctrl + space").unwrap();
        assert_eq!(
            a.modifiers(),
            Modifiers::META | Modifiers::ALT | Modifiers::CONTROL
        );
        assert_eq!(a.code(), Code::Space);
        assert_eq!(a.to_string(), "⌘⌥⌃Space");

        let b: HotkeyBinding = "Ctrl+Shift+[".parse().unwrap();
        assert_eq!(b.display_string(), "⌃⇧[");
    }

    #[test]
    fn test_glyph_order_is_fixed() {
        let binding = HotkeyBinding::parse("Shift+Ctrl+Alt+Cmd+Return").unwrap();
        assert_eq!(binding.display_string(), "⌘⌥⌃⇧↩");
    }

    #[test]
    fn test_parse_errors() {
        assert!(HotkeyBinding::parse("").is_err());
        assert!(HotkeyBinding::parse("Cmd+").is_err());
        assert!(HotkeyBinding::parse("Hyper+V").is_err());
        assert!(HotkeyBinding::parse("Cmd+F13").is_err());
    }

    #[test]
    fn test_bare_key() {
        let binding = HotkeyBinding::parse("Esc").unwrap();
        assert!(binding.modifiers().is_empty());
        assert_eq!(binding.display_string(), "⎋");
    }
}
