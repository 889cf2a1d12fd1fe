//! # atrium_core
//!
//! Identity and session logic for Atrium: principal storage, OTP and
//! password login flows, session tokens and token-to-principal resolution.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod sms;
pub mod store;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
