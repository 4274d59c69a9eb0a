// smartmarks platform paths
// Where settings.json and the session database live on each OS.
//
// Selected at compile time with `cfg(target_os)`.

use std::path::PathBuf;

#[cfg(target_os = "linux")]
mod linux;

#[cfg(target_os = "macos")]
mod macos;

#[cfg(target_os = "windows")]
mod windows;

/// Directory name used under the OS application directories.
pub const APP_DIR_NAME: &str = "smartmarks";

/// Directory holding `settings.json`.
///
/// - **Linux**: `$XDG_CONFIG_HOME/smartmarks`, else `~/.config/smartmarks`
/// - **macOS**: `~/Library/Application Support/smartmarks`
/// - **Windows**: `%APPDATA%/smartmarks`
pub fn get_config_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_config_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_config_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_config_dir()
    }
}

/// Directory holding the session database.
///
/// - **Linux**: `$XDG_DATA_HOME/smartmarks`, else `~/.local/share/smartmarks`
/// - **macOS**: same as the config dir
/// - **Windows**: `%LOCALAPPDATA%/smartmarks`
pub fn get_data_dir() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        linux::get_data_dir()
    }
    #[cfg(target_os = "macos")]
    {
        macos::get_data_dir()
    }
    #[cfg(target_os = "windows")]
    {
        windows::get_data_dir()
    }
}
