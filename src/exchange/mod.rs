// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Credential exchange between the sync worker and the web front end.
//!
//! The worker and the HTTP handlers run on independent threads with no
//! shared call stack. When the worker needs a human-supplied secret (an MFA
//! code or a password) it parks the handshake state here; a handler thread
//! later stores the secret and the worker picks it up on its next poll.
//!
//! One [`StatusExchange`] instance is created at startup and threaded
//! through both sides. All mutable state lives behind a single `Mutex`;
//! every operation is a short, bounded critical section with no I/O and no
//! nested locking.
//!
//! # Handshake protocol
//!
//! ```text
//! no_input_needed --(worker)--------> need_password
//! need_password   --(set_payload)---> supplied_password
//! supplied_password --(worker CAS)--> checking_password
//! checking_password --(worker CAS)--> no_input_needed      auth ok
//! checking_password --(set_error)---> no_input_needed      auth failed
//!
//! no_input_needed --(worker)--------> need_mfa
//! need_mfa        --(set_payload)---> supplied_mfa
//! supplied_mfa    --(worker CAS)----> checking_mfa
//! checking_mfa    --(worker CAS)----> no_input_needed      code ok
//! checking_mfa    --(set_error)-----> need_mfa             bad code, re-prompt
//! ```
//!
//! A rejected operation returns `false` and mutates nothing; two racing
//! submissions see exactly one winner.

pub mod progress;
pub mod request;
pub mod status;

use std::sync::{Arc, Mutex};

use crate::config::{GlobalConfig, UserConfig};
use crate::remote::VaultSession;
use crate::security::locks::resilient_lock;

pub use progress::Progress;
pub use request::SyncRequest;
pub use status::Status;

/// Shared rendezvous point between the sync worker and the web handlers.
///
/// Construct once, wrap in an `Arc`, hand a clone to each side.
pub struct StatusExchange {
    inner: Mutex<Inner>,
}

struct Inner {
    status: Status,
    /// Submitted secret. Only overwritten on the next accepted submission,
    /// never cleared eagerly; `payload()` gates visibility by status.
    payload: Option<String>,
    /// Recorded auth failure, cleared when a new secret is accepted.
    error: Option<String>,
    progress: Arc<Progress>,
    global_config: Option<GlobalConfig>,
    user_configs: Vec<UserConfig>,
    current_user: Option<String>,
    session: Option<Arc<VaultSession>>,
    pending_request: Option<SyncRequest>,
}

impl StatusExchange {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                status: Status::NoInputNeeded,
                payload: None,
                error: None,
                progress: Arc::new(Progress::new()),
                global_config: None,
                user_configs: Vec::new(),
                current_user: None,
                session: None,
                pending_request: None,
            }),
        }
    }

    /// Current handshake status.
    pub fn status(&self) -> Status {
        resilient_lock(&self.inner).status
    }

    /// Compare-and-swap the status.
    ///
    /// Succeeds only if the current status equals `expected`. This is the
    /// sole mechanism by which the worker advances the handshake out of the
    /// `supplied_*` and `checking_*` states; losing the race is an ordinary
    /// outcome, not an error.
    pub fn replace_status(&self, expected: Status, next: Status) -> bool {
        let mut inner = resilient_lock(&self.inner);
        if inner.status == expected {
            inner.status = next;
            true
        } else {
            false
        }
    }

    /// Store a submitted secret.
    ///
    /// Accepted only while the worker is asking for one (`need_mfa` or
    /// `need_password`); acceptance stores the payload, advances to the
    /// matching `supplied_*` state and clears any recorded error, all
    /// atomically. Returns `false` without mutating anything otherwise —
    /// that is how a stale or duplicate form submission loses.
    pub fn set_payload(&self, payload: &str) -> bool {
        let mut inner = resilient_lock(&self.inner);
        if !inner.status.accepts_payload() {
            return false;
        }
        inner.payload = Some(payload.to_string());
        inner.status = if inner.status == Status::NeedMfa {
            Status::SuppliedMfa
        } else {
            Status::SuppliedPassword
        };
        inner.error = None;
        true
    }

    /// The stored secret, visible only while the handshake is in a
    /// `supplied_*` or `checking_*` state.
    ///
    /// A value left over from an earlier handshake is never exposed.
    pub fn payload(&self) -> Option<String> {
        let inner = resilient_lock(&self.inner);
        if !inner.status.payload_visible() {
            return None;
        }
        inner.payload.clone()
    }

    /// Record an authentication failure.
    ///
    /// Accepted only from the `checking_*` states. A password failure
    /// abandons the round back to `no_input_needed`; an MFA failure loops
    /// back to `need_mfa` to re-prompt.
    pub fn set_error(&self, error: &str) -> bool {
        let mut inner = resilient_lock(&self.inner);
        if inner.status != Status::CheckingMfa && inner.status != Status::CheckingPassword {
            return false;
        }
        inner.error = Some(error.to_string());
        inner.status = if inner.status == Status::CheckingPassword {
            Status::NoInputNeeded
        } else {
            Status::NeedMfa
        };
        true
    }

    /// The recorded failure, visible only in the states where the front end
    /// should surface it (`no_input_needed`, `need_password`, `need_mfa`).
    pub fn error(&self) -> Option<String> {
        let inner = resilient_lock(&self.inner);
        if !inner.status.error_visible() {
            return None;
        }
        inner.error.clone()
    }

    /// Handle to the shared resume/cancel flag pair.
    ///
    /// Handlers set the flags through the handle; the worker polls and
    /// resets them. The flags are advisory and carry no ordering
    /// relationship to the handshake status.
    pub fn progress(&self) -> Arc<Progress> {
        resilient_lock(&self.inner).progress.clone()
    }

    pub fn set_global_config(&self, config: GlobalConfig) {
        resilient_lock(&self.inner).global_config = Some(config);
    }

    pub fn global_config(&self) -> Option<GlobalConfig> {
        resilient_lock(&self.inner).global_config.clone()
    }

    pub fn set_user_configs(&self, configs: Vec<UserConfig>) {
        resilient_lock(&self.inner).user_configs = configs;
    }

    pub fn user_configs(&self) -> Vec<UserConfig> {
        resilient_lock(&self.inner).user_configs.clone()
    }

    /// Name the user whose handshake is in progress. Display-only; not
    /// enforced to stay consistent with the handshake status.
    pub fn set_current_user(&self, username: impl Into<String>) {
        resilient_lock(&self.inner).current_user = Some(username.into());
    }

    pub fn current_user(&self) -> Option<String> {
        resilient_lock(&self.inner).current_user.clone()
    }

    pub fn clear_current_user(&self) {
        resilient_lock(&self.inner).current_user = None;
    }

    /// Cache the authenticated vault session so listing endpoints can use
    /// it without re-authenticating. Overwrite-only; never cleared.
    pub fn set_session(&self, session: Arc<VaultSession>) {
        resilient_lock(&self.inner).session = Some(session);
    }

    pub fn session(&self) -> Option<Arc<VaultSession>> {
        resilient_lock(&self.inner).session.clone()
    }

    /// Enqueue a sync job. Unconditionally overwrites any pending request;
    /// the slot has depth one and no backpressure.
    pub fn set_sync_request(&self, request: SyncRequest) {
        resilient_lock(&self.inner).pending_request = Some(request);
    }

    /// Atomically read and clear the pending sync job. The sole consumption
    /// path; requests cannot be peeked without clearing.
    pub fn take_sync_request(&self) -> Option<SyncRequest> {
        resilient_lock(&self.inner).pending_request.take()
    }
}

impl Default for StatusExchange {
    fn default() -> Self {
        Self::new()
    }
}
