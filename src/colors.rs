// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! ANSI color code definitions for CLI output.
//!
//! Single source of truth so styling stays consistent across commands.
//!
//! Color usage conventions:
//! - RED = Errors/failures
//! - GREEN = Success/confirmations
//! - YELLOW = Warnings, fallbacks
//! - CYAN = Info messages, prompts, branding

/// Reset all formatting
pub const RESET: &str = "\x1b[0m";

/// Bold text
pub const BOLD: &str = "\x1b[1m";

/// Dimmed/faint text
pub const DIM: &str = "\x1b[2m";

/// Red text (errors, failures)
pub const RED: &str = "\x1b[31m";

/// Green text (success, confirmations)
pub const GREEN: &str = "\x1b[32m";

/// Yellow text (warnings, fallbacks)
pub const YELLOW: &str = "\x1b[33m";

/// Cyan text (info messages, prompts, branding)
pub const CYAN: &str = "\x1b[36m";
