//! PostgreSQL principal store.
//!
//! One table per principal kind. Lockout counters are incremented by a single
//! `UPDATE … RETURNING` whose `CASE` arms mirror `LockoutState::after_failure`,
//! and the `WHERE` clause refuses to touch a row that is currently locked.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::{PrincipalStore, StoreError, new_id};
use crate::auth::lockout::{LockoutPolicy, LockoutState};
use crate::models::principal::{
    ClientCredential, ClientWithCredential, NewStaff, Principal, PrincipalKind, PrincipalRef,
    StaffCredential, StaffWithCredential,
};

const PRINCIPAL_COLUMNS: &str = "id, name, email, phone, is_active, last_login, created_at";

/// Table backing each principal kind.
fn table(kind: PrincipalKind) -> &'static str {
    match kind {
        PrincipalKind::MasterAdmin => "master_admins",
        PrincipalKind::Admin => "admins",
        PrincipalKind::ProjectManager => "project_managers",
        PrincipalKind::Sales => "salespeople",
        PrincipalKind::Employee => "employees",
        PrincipalKind::Client => "clients",
    }
}

#[derive(Debug, sqlx::FromRow)]
struct PrincipalRow {
    id: Uuid,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    is_active: bool,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl PrincipalRow {
    fn into_principal(self, kind: PrincipalKind) -> Principal {
        Principal {
            id: self.id,
            kind,
            name: self.name,
            email: self.email,
            phone: self.phone,
            is_active: self.is_active,
            last_login: self.last_login,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StaffRow {
    #[sqlx(flatten)]
    principal: PrincipalRow,
    password_hash: String,
    login_attempts: i32,
    lock_until: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct ClientRow {
    #[sqlx(flatten)]
    principal: PrincipalRow,
    otp: Option<String>,
    otp_expires: Option<DateTime<Utc>>,
    otp_attempts: i32,
    otp_lock_until: Option<DateTime<Utc>>,
    login_attempts: i32,
    lock_until: Option<DateTime<Utc>>,
}

impl ClientRow {
    fn into_client(self) -> ClientWithCredential {
        ClientWithCredential {
            principal: self.principal.into_principal(PrincipalKind::Client),
            credential: ClientCredential {
                otp_hash: self.otp,
                otp_expires: self.otp_expires,
                otp: LockoutState {
                    attempts: self.otp_attempts,
                    lock_until: self.otp_lock_until,
                },
                account: LockoutState {
                    attempts: self.login_attempts,
                    lock_until: self.lock_until,
                },
            },
        }
    }
}

fn map_insert_error(e: sqlx::Error) -> StoreError {
    match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::AlreadyExists,
        _ => StoreError::Db(e),
    }
}

/// `PrincipalStore` over a PostgreSQL pool.
#[derive(Debug, Clone)]
pub struct PgPrincipalStore {
    pool: PgPool,
}

impl PgPrincipalStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Increment an attempts/lock column pair atomically, returning the state
    /// after the update (or the untouched state if the row is locked).
    async fn bump_counter(
        &self,
        kind: PrincipalKind,
        id: Uuid,
        attempts_col: &str,
        lock_col: &str,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutState, StoreError> {
        let table = table(kind);
        let sql = format!(
            "UPDATE {table} SET \
               {attempts_col} = CASE WHEN {lock_col} IS NULL THEN {attempts_col} + 1 ELSE 1 END, \
               {lock_col} = CASE \
                 WHEN (CASE WHEN {lock_col} IS NULL THEN {attempts_col} + 1 ELSE 1 END) >= $2 \
                 THEN $3 ELSE NULL END \
             WHERE id = $1 AND ({lock_col} IS NULL OR {lock_col} <= $4) \
             RETURNING {attempts_col}, {lock_col}"
        );
        let updated = sqlx::query_as::<_, (i32, Option<DateTime<Utc>>)>(&sql)
            .bind(id)
            .bind(policy.max_attempts)
            .bind(now + policy.lock_for)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?;
        if let Some((attempts, lock_until)) = updated {
            return Ok(LockoutState {
                attempts,
                lock_until,
            });
        }

        let current = sqlx::query_as::<_, (i32, Option<DateTime<Utc>>)>(&format!(
            "SELECT {attempts_col}, {lock_col} FROM {table} WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        Ok(LockoutState {
            attempts: current.0,
            lock_until: current.1,
        })
    }

    async fn update_returning(
        &self,
        kind: PrincipalKind,
        assignments: &str,
        id: Uuid,
        now: Option<DateTime<Utc>>,
    ) -> Result<Principal, StoreError> {
        let sql = format!(
            "UPDATE {} SET {assignments} WHERE id = $1 RETURNING {PRINCIPAL_COLUMNS}",
            table(kind)
        );
        let mut query = sqlx::query_as::<_, PrincipalRow>(&sql).bind(id);
        if let Some(now) = now {
            query = query.bind(now);
        }
        query
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row.into_principal(kind))
            .ok_or(StoreError::NotFound)
    }
}

#[async_trait]
impl PrincipalStore for PgPrincipalStore {
    async fn find_principal(
        &self,
        reference: PrincipalRef,
    ) -> Result<Option<Principal>, StoreError> {
        let kind = reference.kind();
        let sql = format!(
            "SELECT {PRINCIPAL_COLUMNS} FROM {} WHERE id = $1",
            table(kind)
        );
        let row = sqlx::query_as::<_, PrincipalRow>(&sql)
            .bind(reference.id())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.into_principal(kind)))
    }

    async fn find_staff_by_email(
        &self,
        kind: PrincipalKind,
        email: &str,
    ) -> Result<Option<StaffWithCredential>, StoreError> {
        if !kind.is_staff() {
            return Err(StoreError::Unsupported(kind));
        }
        let sql = format!(
            "SELECT {PRINCIPAL_COLUMNS}, password_hash, login_attempts, lock_until \
             FROM {} WHERE email = $1",
            table(kind)
        );
        let row = sqlx::query_as::<_, StaffRow>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| StaffWithCredential {
            principal: r.principal.into_principal(kind),
            credential: StaffCredential {
                password_hash: r.password_hash,
                lockout: LockoutState {
                    attempts: r.login_attempts,
                    lock_until: r.lock_until,
                },
            },
        }))
    }

    async fn find_client_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<ClientWithCredential>, StoreError> {
        let sql = format!(
            "SELECT {PRINCIPAL_COLUMNS}, otp, otp_expires, otp_attempts, otp_lock_until, \
             login_attempts, lock_until FROM clients WHERE phone = $1"
        );
        let row = sqlx::query_as::<_, ClientRow>(&sql)
            .bind(phone)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(ClientRow::into_client))
    }

    async fn create_client(
        &self,
        phone: &str,
        name: &str,
    ) -> Result<ClientWithCredential, StoreError> {
        let sql = format!(
            "INSERT INTO clients (id, name, phone) VALUES ($1, $2, $3) \
             RETURNING {PRINCIPAL_COLUMNS}, otp, otp_expires, otp_attempts, otp_lock_until, \
             login_attempts, lock_until"
        );
        let row = sqlx::query_as::<_, ClientRow>(&sql)
            .bind(new_id())
            .bind(name)
            .bind(phone)
            .fetch_one(&self.pool)
            .await
            .map_err(map_insert_error)?;
        Ok(row.into_client())
    }

    async fn create_staff(&self, staff: NewStaff) -> Result<Principal, StoreError> {
        if !staff.kind.is_staff() {
            return Err(StoreError::Unsupported(staff.kind));
        }
        let sql = format!(
            "INSERT INTO {} (id, name, email, phone, password_hash) VALUES ($1, $2, $3, $4, $5) \
             RETURNING {PRINCIPAL_COLUMNS}",
            table(staff.kind)
        );
        let row = sqlx::query_as::<_, PrincipalRow>(&sql)
            .bind(new_id())
            .bind(&staff.name)
            .bind(&staff.email)
            .bind(&staff.phone)
            .bind(&staff.password_hash)
            .fetch_one(&self.pool)
            .await
            .map_err(map_insert_error)?;
        Ok(row.into_principal(staff.kind))
    }

    async fn count_staff(&self, kind: PrincipalKind) -> Result<i64, StoreError> {
        let count = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM {}", table(kind)))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn store_otp_challenge(
        &self,
        client_id: Uuid,
        otp_hash: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE clients SET otp = $2, otp_expires = $3, otp_attempts = 0, \
             otp_lock_until = NULL WHERE id = $1",
        )
        .bind(client_id)
        .bind(otp_hash)
        .bind(expires)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn record_otp_failure(
        &self,
        client_id: Uuid,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutState, StoreError> {
        self.bump_counter(
            PrincipalKind::Client,
            client_id,
            "otp_attempts",
            "otp_lock_until",
            policy,
            now,
        )
        .await
    }

    async fn complete_otp_login(
        &self,
        client_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Principal, StoreError> {
        self.update_returning(
            PrincipalKind::Client,
            "otp = NULL, otp_expires = NULL, otp_attempts = 0, otp_lock_until = NULL, \
             login_attempts = 0, lock_until = NULL, last_login = $2",
            client_id,
            Some(now),
        )
        .await
    }

    async fn record_login_failure(
        &self,
        reference: PrincipalRef,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutState, StoreError> {
        self.bump_counter(
            reference.kind(),
            reference.id(),
            "login_attempts",
            "lock_until",
            policy,
            now,
        )
        .await
    }

    async fn record_login_success(
        &self,
        reference: PrincipalRef,
        now: DateTime<Utc>,
    ) -> Result<Principal, StoreError> {
        self.update_returning(
            reference.kind(),
            "login_attempts = 0, lock_until = NULL, last_login = $2",
            reference.id(),
            Some(now),
        )
        .await
    }

    async fn set_active(
        &self,
        reference: PrincipalRef,
        active: bool,
    ) -> Result<Principal, StoreError> {
        let assignments = if active {
            "is_active = TRUE"
        } else {
            "is_active = FALSE"
        };
        self.update_returning(reference.kind(), assignments, reference.id(), None)
            .await
    }

    async fn clear_lockout(&self, reference: PrincipalRef) -> Result<Principal, StoreError> {
        let assignments = match reference.kind() {
            PrincipalKind::Client => {
                "login_attempts = 0, lock_until = NULL, otp_attempts = 0, otp_lock_until = NULL"
            }
            _ => "login_attempts = 0, lock_until = NULL",
        };
        self.update_returning(reference.kind(), assignments, reference.id(), None)
            .await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
