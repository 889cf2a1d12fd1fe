//! Session token domain models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::principal::Principal;

/// JWT claims embedded in session tokens. Carries no role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Subject: principal ID (standard JWT `sub` claim).
    pub sub: String,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiry (unix timestamp).
    pub exp: i64,
}

/// A freshly minted bearer token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Result of a successful login on any channel.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: IssuedToken,
    pub principal: Principal,
}
