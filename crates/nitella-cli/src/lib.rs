//! Nitella CLI - local trust management
//!
//! This crate provides a command-line interface for:
//! - Creating, recovering and importing the root CA identity
//! - Generating and checking pairing codes
//! - Offline pairing: inspecting and signing QR payloads
//! - Managing signed node certificates

pub mod cli;
pub mod identity;
pub mod nodes;
pub mod output;
pub mod qr;

#[cfg(test)]
mod proptests;

pub use cli::Cli;
pub use output::{JsonResponse, OutputFormat, OutputFormatter};

use nitella_core::{IdentityError, OfflineError, QrError, StoreError};
use nitella_crypto::wordlist::CodeError;

/// Exit codes for CLI operations
///
/// - 0: Success
/// - 1: General error
/// - 2: Authentication failed (wrong or missing passphrase)
/// - 5: Invalid input (bad code, QR payload or CSR)
/// - 6: Not found (no identity, unknown node)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    GeneralError = 1,
    AuthenticationFailed = 2,
    InvalidInput = 5,
    NotFound = 6,
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}

impl ExitCode {
    pub fn to_exit_code(self) -> std::process::ExitCode {
        std::process::ExitCode::from(self as u8)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ExitCode::Success => "SUCCESS",
            ExitCode::GeneralError => "GENERAL_ERROR",
            ExitCode::AuthenticationFailed => "AUTH_FAILED",
            ExitCode::InvalidInput => "INVALID_INPUT",
            ExitCode::NotFound => "NOT_FOUND",
        }
    }

    /// Pick the exit code for an error returned by a command.
    pub fn for_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(e) = cause.downcast_ref::<IdentityError>() {
                if e.is_passphrase_error() {
                    return ExitCode::AuthenticationFailed;
                }
                if matches!(e, IdentityError::NotFound(_)) {
                    return ExitCode::NotFound;
                }
                if matches!(e, IdentityError::InvalidMnemonic) {
                    return ExitCode::InvalidInput;
                }
            }
            if let Some(StoreError::NotFound(_)) = cause.downcast_ref::<StoreError>() {
                return ExitCode::NotFound;
            }
            if cause.downcast_ref::<CodeError>().is_some() || cause.downcast_ref::<QrError>().is_some() {
                return ExitCode::InvalidInput;
            }
            if let Some(e) = cause.downcast_ref::<OfflineError>() {
                return match e {
                    OfflineError::Store(_) => ExitCode::GeneralError,
                    _ => ExitCode::InvalidInput,
                };
            }
        }
        ExitCode::GeneralError
    }
}

#[cfg(test)]
mod exit_code_tests {
    use super::*;
    use nitella_crypto::keystore::KeystoreError;
    use std::path::PathBuf;

    #[test]
    fn test_exit_code_values() {
        assert_eq!(ExitCode::Success as i32, 0);
        assert_eq!(ExitCode::GeneralError as i32, 1);
        assert_eq!(ExitCode::AuthenticationFailed as i32, 2);
        assert_eq!(ExitCode::InvalidInput as i32, 5);
        assert_eq!(ExitCode::NotFound as i32, 6);
        assert_eq!(ExitCode::NotFound.name(), "NOT_FOUND");
    }

    #[test]
    fn test_exit_code_for_errors() {
        let err = anyhow::Error::new(IdentityError::Keystore(KeystoreError::DecryptionFailed))
            .context("loading identity");
        assert_eq!(ExitCode::for_error(&err), ExitCode::AuthenticationFailed);

        let err = anyhow::Error::new(IdentityError::NotFound(PathBuf::from("/tmp/x")));
        assert_eq!(ExitCode::for_error(&err), ExitCode::NotFound);

        let err = anyhow::Error::new(StoreError::NotFound("node-1".into()));
        assert_eq!(ExitCode::for_error(&err), ExitCode::NotFound);

        let err = anyhow::Error::new(CodeError::InvalidFormat).context("checking code");
        assert_eq!(ExitCode::for_error(&err), ExitCode::InvalidInput);

        let err = anyhow::Error::new(OfflineError::Qr(QrError::Empty));
        assert_eq!(ExitCode::for_error(&err), ExitCode::InvalidInput);

        let err = anyhow::anyhow!("something else");
        assert_eq!(ExitCode::for_error(&err), ExitCode::GeneralError);
    }
}
