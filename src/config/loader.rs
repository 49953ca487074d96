use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use crate::config::types::AppConfig;
use crate::util::is_valid_date_format;

/// Discover and load the app config.
///
/// Priority:
/// 1. `--config` flag (explicit path)
/// 2. `$ACTIONS_BOARD_CONFIG` environment variable
/// 3. `$XDG_CONFIG_HOME/actions-board/config.toml`
/// 4. `~/.config/actions-board/config.toml`
///
/// With no config file anywhere, defaults are used.
pub fn load_config(explicit_path: Option<&Path>) -> Result<AppConfig> {
    let path = match explicit_path {
        Some(path) => Some(path.to_path_buf()),
        None => find_global_config(),
    };
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };

    let contents =
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let config: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("parsing TOML from {}", path.display()))?;
    if !is_valid_date_format(&config.display.date_format) {
        bail!(
            "invalid display.date_format {:?} in {}",
            config.display.date_format,
            path.display()
        );
    }
    tracing::debug!("config: loaded {}", path.display());
    Ok(config)
}

/// Where the key-value state file lives when `[storage] path` is unset.
///
/// `$XDG_DATA_HOME/actions-board/state.json`, else
/// `~/.local/share/actions-board/state.json`, else `./actions-board.json`.
pub fn default_state_path() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME")
        && !xdg.is_empty()
    {
        return PathBuf::from(xdg).join("actions-board/state.json");
    }
    if let Some(home) = dirs_fallback() {
        return home.join(".local/share/actions-board/state.json");
    }
    PathBuf::from("actions-board.json")
}

/// Resolve the state file path from config, expanding a leading `~`.
pub fn state_path(config: &AppConfig) -> PathBuf {
    config
        .storage
        .path
        .as_deref()
        .and_then(Path::to_str)
        .map_or_else(default_state_path, expand_tilde)
}

fn find_global_config() -> Option<PathBuf> {
    // $ACTIONS_BOARD_CONFIG
    if let Ok(path) = std::env::var("ACTIONS_BOARD_CONFIG") {
        let p = PathBuf::from(&path);
        if p.is_file() {
            return Some(p);
        }
    }

    // $XDG_CONFIG_HOME/actions-board/config.toml
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        let p = PathBuf::from(xdg).join("actions-board/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    // ~/.config/actions-board/config.toml
    if let Some(home) = dirs_fallback() {
        let p = home.join(".config/actions-board/config.toml");
        if p.is_file() {
            return Some(p);
        }
    }

    None
}

fn dirs_fallback() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/")
        && let Some(home) = dirs_fallback()
    {
        return home.join(rest);
    }
    PathBuf::from(path)
}
