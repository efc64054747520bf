//! Basic functionality tests to ensure the build is working

use pastebox::config::Settings;
use pastebox::history::HistoryLimits;

#[test]
fn test_version() {
    assert_eq!(pastebox::VERSION, "0.1.0");
}

#[test]
fn test_bounds() {
    assert_eq!(pastebox::MAX_HISTORY_ITEMS, 1000);
    assert_eq!(pastebox::MAX_ITEM_SIZE, 50 * 1024 * 1024);
    assert_eq!(pastebox::MAX_MEMORY_USAGE, 100 * 1024 * 1024);
    assert_eq!(pastebox::POLL_INTERVAL.as_millis(), 500);
}

#[test]
fn test_default_settings_give_default_limits() {
    let settings = Settings::default();
    assert_eq!(HistoryLimits::from_settings(&settings), HistoryLimits::default());
}

#[test]
fn test_settings_paths() {
    let settings = Settings::default();
    assert!(!settings.storage.data_dir.as_os_str().is_empty());
    assert!(settings.storage.data_dir.ends_with("pastebox"));
}
