// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Background worker: authenticates each configured account and keeps its
//! library synced.
//!
//! The worker owns the forward side of the credential handshake. When it
//! needs a secret it flips the exchange into a `need_*` state, polls until a
//! web handler stores one, claims it with a compare-and-swap into the
//! matching `checking_*` state, and reports the verification outcome back
//! through the exchange. In watch mode it then loops, polling the advisory
//! resume/cancel flags and draining the single-slot sync request queue.
//!
//! Exchange calls are short synchronous critical sections; all waiting
//! happens out here in the worker's own poll loops.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::time::{sleep, Instant};

use crate::config::{Config, UserConfig};
use crate::exchange::{Status, StatusExchange, SyncRequest};
use crate::remote::{AuthAttempt, VaultClient, VaultError, VaultSession};
use crate::sync::{self, SyncReport};

/// How often to poll for a submitted secret while a `need_*` prompt is up.
const PAYLOAD_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How often the watch loop checks flags and the request slot.
const WATCH_TICK: Duration = Duration::from_secs(1);

/// Run the worker: one sync pass per configured user, then (in watch mode)
/// the watch loop until cancelled.
pub async fn run(
    exchange: Arc<StatusExchange>,
    config: Config,
    watch: bool,
    show_progress: bool,
) -> Result<()> {
    let client = VaultClient::new(&config.global.vault_url);
    let mut authenticated: Vec<(UserConfig, Arc<VaultSession>)> = Vec::new();

    for user in &config.users {
        match process_user(&exchange, &client, user, &config, show_progress).await {
            Ok(Some(session)) => authenticated.push((user.clone(), session)),
            Ok(None) => {
                tracing::info!("cancel requested, worker stopping");
                return Ok(());
            }
            Err(e) => {
                tracing::error!(username = %user.username, "skipping account: {}", e);
            }
        }
    }

    if watch {
        let interval = Duration::from_secs(config.global.watch_interval_secs);
        watch_loop(&exchange, &config, &authenticated, interval, show_progress).await?;
    }
    Ok(())
}

/// Authenticate one account and run its configured sync.
///
/// Returns `None` when the user asked to cancel mid-handshake.
async fn process_user(
    exchange: &StatusExchange,
    client: &VaultClient,
    user: &UserConfig,
    config: &Config,
    show_progress: bool,
) -> Result<Option<Arc<VaultSession>>> {
    exchange.set_current_user(&user.username);
    let session = match authenticate(exchange, client, user).await? {
        Some(session) => Arc::new(session),
        None => {
            exchange.clear_current_user();
            return Ok(None);
        }
    };

    tracing::info!(username = %user.username, "authenticated");
    exchange.set_session(Arc::clone(&session));

    let request = SyncRequest {
        folders: user.folders.clone(),
        albums: user.albums.clone(),
        directory: config.global.directory.clone(),
        library: user.library.clone(),
    };
    if request.validate().is_ok() {
        let report = sync::run(&session, &request, show_progress).await?;
        tracing::info!(username = %user.username, "initial sync: {}", report.summary());
    } else {
        tracing::debug!(username = %user.username, "no sync targets configured, skipping initial pass");
    }

    exchange.clear_current_user();
    Ok(Some(session))
}

/// Obtain a working session for one account, prompting through the exchange
/// as needed.
async fn authenticate(
    exchange: &StatusExchange,
    client: &VaultClient,
    user: &UserConfig,
) -> Result<Option<VaultSession>> {
    // A stored password gets one silent attempt before we fall back to
    // prompting through the front end.
    let mut stored_password = user.password.clone();

    loop {
        let (password, interactive) = match stored_password.take() {
            Some(password) => (password, false),
            None => match collect_password(exchange).await {
                Some(password) => (password, true),
                None => return Ok(None),
            },
        };

        match client.authenticate(&user.username, &password).await {
            Ok(AuthAttempt::Authenticated(session)) => {
                if interactive {
                    exchange.replace_status(Status::CheckingPassword, Status::NoInputNeeded);
                }
                return Ok(Some(session));
            }
            Ok(AuthAttempt::MfaRequired(challenge)) => {
                if interactive {
                    exchange.replace_status(Status::CheckingPassword, Status::NoInputNeeded);
                }
                return complete_mfa(exchange, challenge).await;
            }
            Err(e) if e.is_credential_rejection() => {
                tracing::warn!(username = %user.username, "password rejected");
                if interactive {
                    // checking_password -> no_input_needed with the error
                    // recorded; the next loop iteration opens a fresh round
                    exchange.set_error("Incorrect password");
                }
            }
            Err(e) => {
                if interactive {
                    exchange.replace_status(Status::CheckingPassword, Status::NoInputNeeded);
                }
                return Err(e.into());
            }
        }
    }
}

/// Drive the MFA round(s) until a code is accepted, the user cancels, or
/// the vault faults.
async fn complete_mfa(
    exchange: &StatusExchange,
    challenge: crate::remote::MfaChallenge,
) -> Result<Option<VaultSession>> {
    loop {
        let code = match collect_code(exchange).await {
            Some(code) => code,
            None => return Ok(None),
        };

        match challenge.submit_code(&code).await {
            Ok(session) => {
                exchange.replace_status(Status::CheckingMfa, Status::NoInputNeeded);
                return Ok(Some(session));
            }
            Err(VaultError::InvalidCode(_)) => {
                tracing::warn!(username = %challenge.username(), "verification code rejected");
                // checking_mfa -> need_mfa; the front end re-prompts
                exchange.set_error("Incorrect verification code");
            }
            Err(e) => {
                exchange.replace_status(Status::CheckingMfa, Status::NoInputNeeded);
                return Err(e.into());
            }
        }
    }
}

/// Put up the password prompt and poll until a handler stores one.
///
/// Claims the submission by swapping `supplied_password` to
/// `checking_password`; the payload read is gated on that state. Returns
/// `None` on cancel, resetting the prompt.
async fn collect_password(exchange: &StatusExchange) -> Option<String> {
    exchange.replace_status(Status::NoInputNeeded, Status::NeedPassword);
    loop {
        if exchange.progress().take_cancel() {
            exchange.replace_status(Status::NeedPassword, Status::NoInputNeeded);
            return None;
        }
        if exchange.replace_status(Status::SuppliedPassword, Status::CheckingPassword) {
            return exchange.payload();
        }
        sleep(PAYLOAD_POLL_INTERVAL).await;
    }
}

/// Put up the MFA prompt and poll until a handler stores a code.
///
/// The entry CAS is a no-op when a rejected code already moved the exchange
/// back to `need_mfa`.
async fn collect_code(exchange: &StatusExchange) -> Option<String> {
    exchange.replace_status(Status::NoInputNeeded, Status::NeedMfa);
    loop {
        if exchange.progress().take_cancel() {
            exchange.replace_status(Status::NeedMfa, Status::NoInputNeeded);
            return None;
        }
        if exchange.replace_status(Status::SuppliedMfa, Status::CheckingMfa) {
            return exchange.payload();
        }
        sleep(PAYLOAD_POLL_INTERVAL).await;
    }
}

/// Watch mode: wake every tick, honour cancel, and run a sync pass when the
/// interval elapses, a resume is requested, or the front end enqueued a job.
async fn watch_loop(
    exchange: &StatusExchange,
    config: &Config,
    authenticated: &[(UserConfig, Arc<VaultSession>)],
    interval: Duration,
    show_progress: bool,
) -> Result<()> {
    let progress = exchange.progress();
    let mut next_pass = Instant::now() + interval;

    tracing::info!(interval_secs = interval.as_secs(), "watching for changes");
    loop {
        if progress.take_cancel() {
            tracing::info!("cancel requested, leaving watch mode");
            return Ok(());
        }

        if let Some(request) = exchange.take_sync_request() {
            run_requested_sync(exchange, &request, show_progress).await;
            // A resume raised alongside the request is satisfied by serving it
            progress.take_resume();
            next_pass = Instant::now() + interval;
        } else if progress.take_resume() || Instant::now() >= next_pass {
            for (user, session) in authenticated {
                let request = SyncRequest {
                    folders: user.folders.clone(),
                    albums: user.albums.clone(),
                    directory: config.global.directory.clone(),
                    library: user.library.clone(),
                };
                if request.validate().is_err() {
                    continue;
                }
                match sync::run(session, &request, show_progress).await {
                    Ok(report) => {
                        tracing::info!(username = %user.username, "watch sync: {}", report.summary())
                    }
                    Err(e) => tracing::error!(username = %user.username, "watch sync failed: {}", e),
                }
            }
            next_pass = Instant::now() + interval;
        }

        sleep(WATCH_TICK).await;
    }
}

/// Serve one front-end-enqueued sync job using the cached session.
async fn run_requested_sync(exchange: &StatusExchange, request: &SyncRequest, show_progress: bool) {
    let Some(session) = exchange.session() else {
        tracing::warn!("sync request dropped: no authenticated session yet");
        return;
    };
    match sync::run(&session, request, show_progress).await {
        Ok(report) => log_requested_sync(request, &report),
        Err(e) => tracing::error!("requested sync failed: {}", e),
    }
}

fn log_requested_sync(request: &SyncRequest, report: &SyncReport) {
    tracing::info!(
        library = %request.library,
        directory = %request.directory.display(),
        "requested sync: {}",
        report.summary()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    const TEST_TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_collect_password_hands_over_submission() {
        let exchange = Arc::new(StatusExchange::new());

        let collector = {
            let exchange = Arc::clone(&exchange);
            tokio::spawn(async move { collect_password(&exchange).await })
        };

        // Front-end side: wait for the prompt, then submit
        let submitted = timeout(TEST_TIMEOUT, async {
            loop {
                if exchange.status() == Status::NeedPassword && exchange.set_payload("hunter2") {
                    return;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        assert!(submitted.is_ok(), "worker never put up the prompt");

        let collected = timeout(TEST_TIMEOUT, collector)
            .await
            .expect("collector timed out")
            .expect("collector panicked");
        assert_eq!(collected, Some("hunter2".to_string()));
        assert_eq!(exchange.status(), Status::CheckingPassword);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_collect_code_honours_cancel() {
        let exchange = Arc::new(StatusExchange::new());

        let collector = {
            let exchange = Arc::clone(&exchange);
            tokio::spawn(async move { collect_code(&exchange).await })
        };

        timeout(TEST_TIMEOUT, async {
            loop {
                if exchange.status() == Status::NeedMfa {
                    exchange.progress().request_cancel();
                    return;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("worker never put up the prompt");

        let collected = timeout(TEST_TIMEOUT, collector)
            .await
            .expect("collector timed out")
            .expect("collector panicked");
        assert_eq!(collected, None);
        // Prompt is withdrawn and the cancel flag was consumed
        assert_eq!(exchange.status(), Status::NoInputNeeded);
        assert!(!exchange.progress().cancel_requested());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_collect_code_reuses_open_reprompt() {
        let exchange = Arc::new(StatusExchange::new());

        // Simulate the state after a rejected code: need_mfa with an error
        exchange.replace_status(Status::NoInputNeeded, Status::NeedMfa);
        exchange.set_payload("000000");
        exchange.replace_status(Status::SuppliedMfa, Status::CheckingMfa);
        exchange.set_error("Incorrect verification code");
        assert_eq!(exchange.status(), Status::NeedMfa);

        let collector = {
            let exchange = Arc::clone(&exchange);
            tokio::spawn(async move { collect_code(&exchange).await })
        };

        timeout(TEST_TIMEOUT, async {
            loop {
                if exchange.set_payload("123456") {
                    return;
                }
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("submission never accepted");

        let collected = timeout(TEST_TIMEOUT, collector)
            .await
            .expect("collector timed out")
            .expect("collector panicked");
        assert_eq!(collected, Some("123456".to_string()));
        assert_eq!(exchange.status(), Status::CheckingMfa);
    }
}
