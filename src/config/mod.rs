// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Configuration for the daemon and its vault accounts.
//!
//! Stored as JSON at `~/.photopull/config.json`. The global section is
//! display-read by the web front end through the exchange; the per-user
//! entries drive the worker's sync passes.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Destination root for downloaded assets
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// Seconds between watch-mode sync passes
    #[serde(default = "default_watch_interval")]
    pub watch_interval_secs: u64,
    /// Port for the local web front end
    #[serde(default = "default_server_port")]
    pub server_port: u16,
    /// Bind address for the web front end; keep 127.0.0.1 unless the UI
    /// must be reachable from other hosts
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Base URL of the photo vault API
    #[serde(default = "default_vault_url")]
    pub vault_url: String,
}

fn default_directory() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join("Photos").join("photopull"))
        .unwrap_or_else(|| PathBuf::from("photos"))
}

fn default_watch_interval() -> u64 {
    3600
}

fn default_server_port() -> u16 {
    8484
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

fn default_vault_url() -> String {
    crate::remote::DEFAULT_VAULT_URL.to_string()
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            watch_interval_secs: default_watch_interval(),
            server_port: default_server_port(),
            bind_address: default_bind_address(),
            vault_url: default_vault_url(),
        }
    }
}

/// One vault account to sync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    pub username: String,
    /// Stored password. When absent the worker asks for one through the
    /// web front end instead.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Library to sync from
    #[serde(default = "default_library")]
    pub library: String,
    /// Folder names to sync on each pass
    #[serde(default)]
    pub folders: Vec<String>,
    /// Album names to sync on each pass
    #[serde(default)]
    pub albums: Vec<String>,
}

fn default_library() -> String {
    "primary".to_string()
}

/// The password-free view handed to the web front end.
#[derive(Debug, Clone, Serialize)]
pub struct UserConfigView {
    pub username: String,
    pub library: String,
    pub folders: Vec<String>,
    pub albums: Vec<String>,
    pub has_password: bool,
}

impl UserConfig {
    /// Strip the password before anything leaves the process.
    pub fn public_view(&self) -> UserConfigView {
        UserConfigView {
            username: self.username.clone(),
            library: self.library.clone(),
            folders: self.folders.clone(),
            albums: self.albums.clone(),
            has_password: self.password.is_some(),
        }
    }
}

/// The on-disk config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub global: GlobalConfig,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

fn get_config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    let config_dir = home.join(".photopull");
    if !config_dir.exists() {
        fs::create_dir_all(&config_dir)?;
    }
    Ok(config_dir)
}

fn config_path() -> Result<PathBuf> {
    Ok(get_config_dir()?.join("config.json"))
}

pub fn load() -> Result<Config> {
    load_from(&config_path()?)
}

pub fn load_from(path: &Path) -> Result<Config> {
    if path.exists() {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file {:?}", path))
    } else {
        Ok(Config::default())
    }
}

pub fn save(config: &Config) -> Result<()> {
    save_to(config, &config_path()?)
}

pub fn save_to(config: &Config, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    fs::write(path, content).with_context(|| format!("Failed to write config file {:?}", path))?;
    Ok(())
}
