// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Poisoning-recovering lock helpers.
//!
//! A thread that panics while holding a lock poisons it. The credential
//! exchange is shared between the worker task and every request handler; if
//! one handler panics mid-operation, the rest of the process must keep
//! serving rather than propagate the panic on every later acquisition. These
//! helpers log the event and recover the guard.

use std::sync::{Mutex, MutexGuard};

/// Acquire a mutex, recovering from poisoning if necessary.
///
/// On a poisoned lock this logs an error and returns the guard anyway; the
/// protected data may be mid-update from the panicked thread, but for the
/// exchange every field is independently meaningful and stale data is
/// preferable to a wedged handshake.
#[inline]
pub fn resilient_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::error!(
                target: "security::locks",
                event = "LOCK_POISONED",
                "mutex was poisoned; a thread panicked while holding it. \
                 Recovering the guard. Investigate the panic cause in logs."
            );
            poisoned.into_inner()
        }
    }
}
