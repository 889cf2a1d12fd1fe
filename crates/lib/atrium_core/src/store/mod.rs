//! Principal storage abstraction.
//!
//! Each principal kind owns an independent table. Backends implement
//! `PrincipalStore` so the login flows and identity resolution never depend on
//! a specific database engine.
//!
//! Lockout counters are only ever changed through the `record_*_failure`
//! methods, which apply `LockoutState::after_failure` as a single atomic
//! update and hand back the resulting state.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::lockout::{LockoutPolicy, LockoutState};
use crate::models::principal::{
    ClientWithCredential, NewStaff, Principal, PrincipalKind, PrincipalRef, StaffWithCredential,
};

pub use memory::MemoryPrincipalStore;
pub use postgres::PgPrincipalStore;

/// Principal ids are UUIDv7, generated app-side by every backend.
pub(crate) fn new_id() -> Uuid {
    Uuid::now_v7()
}

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,

    #[error("already exists")]
    AlreadyExists,

    #[error("unsupported for {0}")]
    Unsupported(PrincipalKind),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

#[async_trait]
pub trait PrincipalStore: Send + Sync {
    /// Fetch a principal's public attributes, active or not.
    async fn find_principal(&self, reference: PrincipalRef)
    -> Result<Option<Principal>, StoreError>;

    /// Fetch a staff principal of `kind` by (lower-cased) email, with its
    /// password material.
    async fn find_staff_by_email(
        &self,
        kind: PrincipalKind,
        email: &str,
    ) -> Result<Option<StaffWithCredential>, StoreError>;

    /// Fetch a client by canonical phone number, with its OTP material.
    async fn find_client_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<ClientWithCredential>, StoreError>;

    /// Create an active client with no outstanding challenge.
    async fn create_client(
        &self,
        phone: &str,
        name: &str,
    ) -> Result<ClientWithCredential, StoreError>;

    /// Create an active staff principal.
    async fn create_staff(&self, staff: NewStaff) -> Result<Principal, StoreError>;

    /// Number of principals of a staff kind.
    async fn count_staff(&self, kind: PrincipalKind) -> Result<i64, StoreError>;

    /// Replace the client's challenge, resetting the OTP counter and lock.
    async fn store_otp_challenge(
        &self,
        client_id: Uuid,
        otp_hash: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError>;

    /// Count one failed OTP verification. Returns the new OTP lockout state.
    async fn record_otp_failure(
        &self,
        client_id: Uuid,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutState, StoreError>;

    /// Clear the challenge and every lockout counter, stamp `last_login`.
    async fn complete_otp_login(
        &self,
        client_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Principal, StoreError>;

    /// Count one failed password login. Returns the new account lockout state.
    async fn record_login_failure(
        &self,
        reference: PrincipalRef,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutState, StoreError>;

    /// Reset the account lockout and stamp `last_login`.
    async fn record_login_success(
        &self,
        reference: PrincipalRef,
        now: DateTime<Utc>,
    ) -> Result<Principal, StoreError>;

    /// Flip the `is_active` flag. Lockout counters are left as they are.
    async fn set_active(
        &self,
        reference: PrincipalRef,
        active: bool,
    ) -> Result<Principal, StoreError>;

    /// Administrative unlock: clears account and (for clients) OTP lockout.
    async fn clear_lockout(&self, reference: PrincipalRef) -> Result<Principal, StoreError>;

    /// Cheap reachability probe for health checks.
    async fn ping(&self) -> Result<(), StoreError>;
}
