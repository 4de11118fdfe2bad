// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Sync engine: turns one [`SyncRequest`] into downloaded files.
//!
//! For each selected folder and album the engine lists the vault's assets,
//! skips files that already exist locally with the expected size, and
//! streams the rest to disk. Downloads land in a `.part` file first and are
//! renamed into place, so an interrupted run never leaves a truncated asset
//! under its final name. When the vault reports a SHA-256 for an asset the
//! downloaded bytes are verified against it.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use futures_util::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;

use crate::exchange::SyncRequest;
use crate::remote::{Asset, CollectionKind, VaultSession};

/// Outcome of one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    /// Assets fetched this pass
    pub downloaded: usize,
    /// Assets already present locally
    pub skipped: usize,
    /// Assets that failed to download or verify
    pub failed: usize,
}

impl SyncReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }

    pub fn summary(&self) -> String {
        format!(
            "{} downloaded, {} skipped, {} failed",
            self.downloaded, self.skipped, self.failed
        )
    }

    fn absorb(&mut self, other: SyncReport) {
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
        self.failed += other.failed;
    }
}

/// Run a sync pass for every target in the request.
///
/// Individual asset failures are counted and logged, not propagated; only
/// setup failures (destination not writable, listing unreachable) abort the
/// pass.
pub async fn run(
    session: &VaultSession,
    request: &SyncRequest,
    show_progress: bool,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    for folder in &request.folders {
        let partial = sync_collection(
            session,
            &request.library,
            CollectionKind::Folder,
            folder,
            &request.directory,
            show_progress,
        )
        .await?;
        report.absorb(partial);
    }
    for album in &request.albums {
        let partial = sync_collection(
            session,
            &request.library,
            CollectionKind::Album,
            album,
            &request.directory,
            show_progress,
        )
        .await?;
        report.absorb(partial);
    }

    tracing::info!(
        library = %request.library,
        targets = request.target_count(),
        downloaded = report.downloaded,
        skipped = report.skipped,
        failed = report.failed,
        "sync pass finished"
    );
    Ok(report)
}

async fn sync_collection(
    session: &VaultSession,
    library: &str,
    kind: CollectionKind,
    name: &str,
    destination: &Path,
    show_progress: bool,
) -> Result<SyncReport> {
    let assets = session
        .assets(library, kind, name)
        .await
        .with_context(|| format!("Failed to list assets for {:?} in {}", name, library))?;

    let dest_dir = destination.join(safe_component(name));
    tokio::fs::create_dir_all(&dest_dir)
        .await
        .with_context(|| format!("Failed to create destination directory {:?}", dest_dir))?;

    let bar = if show_progress {
        let bar = ProgressBar::new(assets.len() as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg} [{bar:30}] {pos}/{len}")
                .unwrap(),
        );
        bar.set_message(name.to_string());
        Some(bar)
    } else {
        None
    };

    let mut report = SyncReport::default();
    for asset in &assets {
        if let Some(bar) = &bar {
            bar.inc(1);
        }

        let path = dest_dir.join(safe_component(&asset.filename));
        if already_present(&path, asset.size).await {
            report.skipped += 1;
            continue;
        }

        match fetch_asset(session, asset, &path).await {
            Ok(()) => report.downloaded += 1,
            Err(e) => {
                tracing::warn!(asset = %asset.id, file = %asset.filename, "download failed: {}", e);
                report.failed += 1;
            }
        }
    }

    if let Some(bar) = &bar {
        bar.finish_and_clear();
    }
    Ok(report)
}

/// Stream one asset to disk via a `.part` file, verifying the checksum when
/// the vault supplied one.
async fn fetch_asset(session: &VaultSession, asset: &Asset, path: &Path) -> Result<()> {
    let part_path = path.with_extension("part");
    let response = session.download(&asset.id).await?;

    let mut file = tokio::fs::File::create(&part_path)
        .await
        .with_context(|| format!("Failed to create {:?}", part_path))?;
    let mut hasher = Sha256::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Download stream interrupted")?;
        hasher.update(&chunk);
        file.write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write {:?}", part_path))?;
    }
    file.flush().await?;
    drop(file);

    if let Some(expected) = &asset.sha256 {
        let digest = hex::encode(hasher.finalize());
        if !digest.eq_ignore_ascii_case(expected) {
            let _ = tokio::fs::remove_file(&part_path).await;
            anyhow::bail!(
                "checksum mismatch for {}: expected {}, got {}",
                asset.filename,
                expected,
                digest
            );
        }
    }

    tokio::fs::rename(&part_path, path)
        .await
        .with_context(|| format!("Failed to move {:?} into place", path))?;
    Ok(())
}

/// A file counts as already synced when it exists with the expected size.
/// Zero-size listings carry no usable signal, so those are always re-fetched.
async fn already_present(path: &Path, expected_size: u64) -> bool {
    if expected_size == 0 {
        return false;
    }
    match tokio::fs::metadata(path).await {
        Ok(meta) => meta.is_file() && meta.len() == expected_size,
        Err(_) => false,
    }
}

/// Flatten a vault-supplied name into a single path component.
fn safe_component(name: &str) -> PathBuf {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    // ".." would climb out of the destination root
    if cleaned == ".." || cleaned == "." || cleaned.is_empty() {
        PathBuf::from("_")
    } else {
        PathBuf::from(cleaned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_report_summary_and_absorb() {
        let mut report = SyncReport {
            downloaded: 2,
            skipped: 1,
            failed: 0,
        };
        report.absorb(SyncReport {
            downloaded: 1,
            skipped: 0,
            failed: 3,
        });
        assert_eq!(report.summary(), "3 downloaded, 1 skipped, 3 failed");
        assert!(!report.is_clean());
    }

    #[test]
    fn test_safe_component_flattens_separators() {
        assert_eq!(safe_component("Camera Roll"), PathBuf::from("Camera Roll"));
        assert_eq!(safe_component("a/b\\c:d"), PathBuf::from("a_b_c_d"));
        assert_eq!(safe_component(".."), PathBuf::from("_"));
        assert_eq!(safe_component(""), PathBuf::from("_"));
    }

    #[tokio::test]
    async fn test_already_present_matches_on_size() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let path = dir.path().join("IMG_0001.HEIC");
        tokio::fs::write(&path, b"12345").await.unwrap();

        assert!(already_present(&path, 5).await);
        assert!(!already_present(&path, 6).await);
        // Zero expected size never skips
        assert!(!already_present(&path, 0).await);
        assert!(!already_present(&dir.path().join("missing"), 5).await);
    }
}
