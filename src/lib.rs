// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! photopull - Photo vault sync daemon library
//!
//! Pulls your library in the background, asks for codes in the browser.
//!
//! A long-running worker syncs photo libraries from a remote vault. When the
//! vault wants a password or a one-time MFA code, the worker cannot prompt
//! anywhere itself; the local web front end collects the secret and relays
//! it through a shared, lock-guarded [`exchange::StatusExchange`].
//!
//! # Core Modules
//!
//! - [`exchange`] - Credential handshake coordination between worker and web front end
//! - [`worker`] - Background authentication + sync driver
//! - [`server`] - Local web front end (status, code/password submission, sync jobs)
//! - [`remote`] - Photo vault API client
//! - [`sync`] - Download engine with checksum verification
//! - [`config`] - On-disk configuration
//! - [`errors`] - User-facing API errors with reference codes

pub mod colors;
pub mod config;
pub mod errors;
pub mod exchange;
pub mod remote;
pub mod security;
pub mod server;
pub mod sync;
pub mod utils;
pub mod worker;

// Re-export the exchange surface; both sides of the handshake live on it
pub use exchange::{Progress, Status, StatusExchange, SyncRequest};

// Re-export commonly used types from the other modules
pub use config::{Config, GlobalConfig, UserConfig};
pub use errors::{ApiResult, ErrorResponse, UserError};
pub use remote::{AuthAttempt, VaultClient, VaultError, VaultSession};
pub use server::Server;
pub use sync::SyncReport;
pub use utils::mask_sensitive;
