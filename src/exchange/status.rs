// Copyright (c) 2024-2025 Jesse Morgan / Morgan Forge
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Handshake status for the credential exchange.

use serde::{Deserialize, Serialize};

/// Where the interactive credential handshake currently stands.
///
/// The worker moves the status forward (`Need* -> ... -> NoInputNeeded`) via
/// compare-and-swap; the web handlers move it only through
/// [`StatusExchange::set_payload`](super::StatusExchange::set_payload).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    /// Idle; no credential is being collected
    NoInputNeeded,
    /// Worker is waiting for a one-time MFA code
    NeedMfa,
    /// Front end stored an MFA code, worker has not picked it up yet
    SuppliedMfa,
    /// Worker is verifying the MFA code with the vault
    CheckingMfa,
    /// Worker is waiting for a password
    NeedPassword,
    /// Front end stored a password, worker has not picked it up yet
    SuppliedPassword,
    /// Worker is verifying the password with the vault
    CheckingPassword,
}

impl Status {
    /// True while a stored payload is meaningful.
    ///
    /// Outside these states a payload slot may still hold a value left over
    /// from an earlier handshake; readers must not see it.
    pub fn payload_visible(&self) -> bool {
        matches!(
            self,
            Status::SuppliedMfa
                | Status::CheckingMfa
                | Status::SuppliedPassword
                | Status::CheckingPassword
        )
    }

    /// True while a recorded error is meaningful to the front end.
    pub fn error_visible(&self) -> bool {
        matches!(
            self,
            Status::NoInputNeeded | Status::NeedPassword | Status::NeedMfa
        )
    }

    /// True when the front end may submit a credential.
    pub fn accepts_payload(&self) -> bool {
        matches!(self, Status::NeedMfa | Status::NeedPassword)
    }

    /// Wire/display name, matching the serde form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::NoInputNeeded => "no_input_needed",
            Status::NeedMfa => "need_mfa",
            Status::SuppliedMfa => "supplied_mfa",
            Status::CheckingMfa => "checking_mfa",
            Status::NeedPassword => "need_password",
            Status::SuppliedPassword => "supplied_password",
            Status::CheckingPassword => "checking_password",
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_visibility_set() {
        assert!(Status::SuppliedMfa.payload_visible());
        assert!(Status::CheckingMfa.payload_visible());
        assert!(Status::SuppliedPassword.payload_visible());
        assert!(Status::CheckingPassword.payload_visible());

        assert!(!Status::NoInputNeeded.payload_visible());
        assert!(!Status::NeedMfa.payload_visible());
        assert!(!Status::NeedPassword.payload_visible());
    }

    #[test]
    fn test_error_visibility_set() {
        assert!(Status::NoInputNeeded.error_visible());
        assert!(Status::NeedMfa.error_visible());
        assert!(Status::NeedPassword.error_visible());

        assert!(!Status::SuppliedMfa.error_visible());
        assert!(!Status::CheckingMfa.error_visible());
        assert!(!Status::SuppliedPassword.error_visible());
        assert!(!Status::CheckingPassword.error_visible());
    }

    #[test]
    fn test_display_matches_wire_form() {
        assert_eq!(Status::NoInputNeeded.to_string(), "no_input_needed");
        assert_eq!(Status::CheckingMfa.to_string(), "checking_mfa");
        let json = serde_json::to_string(&Status::NeedPassword).unwrap();
        assert_eq!(json, "\"need_password\"");
    }
}
