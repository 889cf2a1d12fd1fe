//! Authentication and identity logic.
//!
//! Provides password hashing, session tokens, lockout bookkeeping, the OTP
//! and password login flows, and token-to-principal resolution. HTTP concerns
//! live in `atrium_api`.

pub mod identity;
pub mod jwt;
pub mod lockout;
pub mod login;
pub mod otp;
pub mod password;
pub mod phone;

use thiserror::Error;

use crate::sms::SmsError;
use crate::store::StoreError;

/// Authentication errors.
///
/// Variants are coarse: callers must not be able to tell a wrong
/// password from an unknown email, or a deactivated principal from a missing
/// one.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid or expired OTP")]
    InvalidChallenge,

    #[error("Token error: {0}")]
    Token(String),

    #[error("No user found for token")]
    NoPrincipal,

    #[error("Account has been deactivated")]
    Deactivated,

    #[error("Too many attempts. Please try again later")]
    ChallengeLocked,

    #[error("Account temporarily locked. Please try again later")]
    LoginLocked,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("OTP delivery failed: {0}")]
    Delivery(#[from] SmsError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}
