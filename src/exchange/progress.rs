// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Advisory resume/cancel flags shared between the web handlers and the
//! worker loop.
//!
//! These are best-effort signals, not part of the handshake protocol: the
//! handlers set them, the worker polls and resets them at its own cadence.
//! They carry no ordering relationship to the handshake status.

use std::sync::atomic::{AtomicBool, Ordering};

/// The resume/cancel flag pair.
///
/// Handed out by [`StatusExchange::progress`](super::StatusExchange::progress)
/// as a shared `Arc`; setters are used by the front end, the `take_*` methods
/// by the worker only.
#[derive(Debug, Default)]
pub struct Progress {
    resume: AtomicBool,
    cancel: AtomicBool,
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the worker to start the next sync pass without waiting out the
    /// watch interval.
    pub fn request_resume(&self) {
        self.resume.store(true, Ordering::SeqCst);
    }

    /// Ask the worker to wind down after its current operation.
    pub fn request_cancel(&self) {
        self.cancel.store(true, Ordering::SeqCst);
    }

    pub fn resume_requested(&self) -> bool {
        self.resume.load(Ordering::SeqCst)
    }

    pub fn cancel_requested(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Consume a pending resume request. Returns whether one was pending.
    pub fn take_resume(&self) -> bool {
        self.resume.swap(false, Ordering::SeqCst)
    }

    /// Consume a pending cancel request. Returns whether one was pending.
    pub fn take_cancel(&self) -> bool {
        self.cancel.swap(false, Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_start_clear() {
        let progress = Progress::new();
        assert!(!progress.resume_requested());
        assert!(!progress.cancel_requested());
    }

    #[test]
    fn test_take_resets_flag() {
        let progress = Progress::new();
        progress.request_resume();
        assert!(progress.resume_requested());
        assert!(progress.take_resume());
        assert!(!progress.resume_requested());
        assert!(!progress.take_resume());
    }

    #[test]
    fn test_flags_independent() {
        let progress = Progress::new();
        progress.request_cancel();
        assert!(!progress.take_resume());
        assert!(progress.take_cancel());
    }
}
