// Windows: roaming AppData for settings, local AppData for the session database.

use std::env;
use std::path::PathBuf;

use super::APP_DIR_NAME;

fn known_folder(var: &str, fallback: &str) -> PathBuf {
    PathBuf::from(env::var(var).unwrap_or_else(|_| fallback.to_string())).join(APP_DIR_NAME)
}

pub fn get_config_dir() -> PathBuf {
    known_folder("APPDATA", "C:\\Users\\Default\\AppData\\Roaming")
}

pub fn get_data_dir() -> PathBuf {
    known_folder("LOCALAPPDATA", "C:\\Users\\Default\\AppData\\Local")
}
