//! Platform automation capability
//!
//! The capture engine only needs three things from the desktop: which
//! application is in front, a way to send a paste keystroke, and whether
//! the process is allowed to do so. Implementations are injected.

use std::sync::Arc;

use thiserror::Error;

#[cfg(target_os = "macos")]
pub mod macos;

/// Automation errors
#[derive(Debug, Error)]
pub enum AutomationError {
    /// Accessibility permission has not been granted
    #[error("Accessibility permission not granted; enable it in System Settings > Privacy & Security > Accessibility")]
    NotTrusted,

    /// Platform call failed
    #[error("Platform error: {0}")]
    Platform(String),
}

/// Desktop automation used by the capture engine
pub trait Automation: Send + Sync {
    /// Bundle identifier of the frontmost application
    fn frontmost_application(&self) -> Option<String>;

    /// Send a paste keystroke to the frontmost application
    fn simulate_paste(&self) -> Result<(), AutomationError>;

    /// Whether the process may synthesize input events
    fn is_trusted(&self) -> bool;
}

/// Automation that reports no frontmost application and cannot paste
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAutomation;

impl Automation for NoopAutomation {
    fn frontmost_application(&self) -> Option<String> {
        None
    }

    fn simulate_paste(&self) -> Result<(), AutomationError> {
        Err(AutomationError::Platform(
            "paste simulation is not available on this platform".to_string(),
        ))
    }

    fn is_trusted(&self) -> bool {
        false
    }
}

/// Automation for the current platform
pub fn platform_automation() -> Arc<dyn Automation> {
    #[cfg(target_os = "macos")]
    {
        Arc::new(macos::MacOSAutomation::new())
    }

    #[cfg(not(target_os = "macos"))]
    {
        Arc::new(NoopAutomation)
    }
}
