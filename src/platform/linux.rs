// Linux: XDG base directories, falling back to the usual dot-dirs under $HOME.

use std::env;
use std::path::PathBuf;

use super::APP_DIR_NAME;

fn resolve(xdg: Option<String>, home: Option<String>, fallback: &[&str]) -> PathBuf {
    let base = match xdg.filter(|v| !v.is_empty()) {
        Some(dir) => PathBuf::from(dir),
        None => fallback
            .iter()
            .fold(PathBuf::from(home.unwrap_or_else(|| "/tmp".to_string())), |p, seg| p.join(seg)),
    };
    base.join(APP_DIR_NAME)
}

pub fn get_config_dir() -> PathBuf {
    resolve(env::var("XDG_CONFIG_HOME").ok(), env::var("HOME").ok(), &[".config"])
}

pub fn get_data_dir() -> PathBuf {
    resolve(env::var("XDG_DATA_HOME").ok(), env::var("HOME").ok(), &[".local", "share"])
}
