// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sync request record carried through the exchange's single-slot queue.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A download/sync job enqueued by the web front end and drained by the
/// worker.
///
/// At most one request is pending at a time; a newer request overwrites an
/// undrained one (last write wins, no backpressure).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncRequest {
    /// Folder names to pull from the selected library
    #[serde(default)]
    pub folders: Vec<String>,
    /// Album names to pull from the selected library
    #[serde(default)]
    pub albums: Vec<String>,
    /// Destination directory on the local filesystem
    pub directory: PathBuf,
    /// Library to pull from
    #[serde(default = "default_library")]
    pub library: String,
}

fn default_library() -> String {
    "primary".to_string()
}

impl SyncRequest {
    /// Check the request is actionable: a non-empty destination and at least
    /// one folder or album selected.
    ///
    /// The front end calls this before the request ever reaches the
    /// exchange; the worker treats a pending request as already validated.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.directory.as_os_str().is_empty() {
            return Err("destination directory is required");
        }
        if self.folders.is_empty() && self.albums.is_empty() {
            return Err("select at least one folder or album");
        }
        Ok(())
    }

    /// Total number of selected targets.
    pub fn target_count(&self) -> usize {
        self.folders.len() + self.albums.len()
    }
}
