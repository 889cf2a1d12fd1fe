//! Email/password login for staff principals, with account lockout.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use super::AuthError;
use super::jwt::TokenIssuer;
use super::lockout::LockoutPolicy;
use super::password::{verify_dummy, verify_password};
use crate::models::auth::Session;
use crate::models::principal::{PrincipalKind, StaffWithCredential};
use crate::store::PrincipalStore;

/// Tunables for the password channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoginPolicy {
    pub lockout: LockoutPolicy,
}

/// Authenticates staff against their own table.
#[derive(Clone)]
pub struct PasswordLogin {
    store: Arc<dyn PrincipalStore>,
    issuer: TokenIssuer,
    policy: LoginPolicy,
}

impl PasswordLogin {
    pub fn new(store: Arc<dyn PrincipalStore>, issuer: TokenIssuer, policy: LoginPolicy) -> Self {
        Self {
            store,
            issuer,
            policy,
        }
    }

    /// Check `email`/`password` for a principal of `kind`.
    ///
    /// An unknown email and a wrong password produce the same error. The
    /// failure that reaches the threshold is still reported as invalid
    /// credentials; only later attempts see `LoginLocked`.
    pub async fn login(
        &self,
        kind: PrincipalKind,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        if !kind.is_staff() {
            return Err(AuthError::Validation(format!(
                "{kind} accounts do not sign in with a password"
            )));
        }
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "Email and password are required".into(),
            ));
        }

        let Some(StaffWithCredential {
            principal,
            credential,
        }) = self.store.find_staff_by_email(kind, &email).await?
        else {
            verify_dummy(password);
            warn!(%kind, "login attempt for unknown email");
            return Err(AuthError::InvalidCredentials);
        };

        if credential.lockout.is_locked(now) {
            warn!(principal = %principal.reference(), "login attempt while locked");
            return Err(AuthError::LoginLocked);
        }
        if !principal.is_active {
            return Err(AuthError::Deactivated);
        }

        if !verify_password(password, &credential.password_hash)? {
            let state = self
                .store
                .record_login_failure(principal.reference(), &self.policy.lockout, now)
                .await?;
            if state.is_locked(now) {
                warn!(
                    principal = %principal.reference(),
                    attempts = state.attempts,
                    "password attempts exhausted, account locked"
                );
            } else {
                warn!(principal = %principal.reference(), attempts = state.attempts, "wrong password");
            }
            return Err(AuthError::InvalidCredentials);
        }

        let principal = self
            .store
            .record_login_success(principal.reference(), now)
            .await?;
        let token = self.issuer.issue(principal.id, now)?;
        info!(principal = %principal.reference(), "staff logged in");
        Ok(Session { token, principal })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::auth::lockout::LockoutState;
    use crate::auth::password::hash_password;
    use crate::models::principal::NewStaff;
    use crate::store::MemoryPrincipalStore;

    struct Fixture {
        store: Arc<MemoryPrincipalStore>,
        login: PasswordLogin,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(MemoryPrincipalStore::new());
        let login = PasswordLogin::new(
            store.clone(),
            TokenIssuer::new(b"login-secret", Duration::days(7)),
            LoginPolicy::default(),
        );
        Fixture { store, login }
    }

    async fn seed(store: &MemoryPrincipalStore, kind: PrincipalKind) -> crate::models::principal::Principal {
        store
            .create_staff(NewStaff {
                kind,
                name: "Priya".into(),
                email: "priya@example.com".into(),
                phone: None,
                password_hash: hash_password("correct horse").unwrap(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn correct_password_issues_session() {
        let f = fixture();
        let seeded = seed(&f.store, PrincipalKind::Admin).await;
        let now = Utc::now();
        let session = f
            .login
            .login(PrincipalKind::Admin, " Priya@Example.com ", "correct horse", now)
            .await
            .unwrap();
        assert_eq!(session.principal.id, seeded.id);
        assert_eq!(session.principal.last_login, Some(now));
        assert_eq!(session.token.expires_at, now + Duration::days(7));
    }

    #[tokio::test]
    async fn lock_after_five_failures_then_423() {
        let f = fixture();
        let seeded = seed(&f.store, PrincipalKind::Sales).await;
        let now = Utc::now();

        for _ in 0..5 {
            let err = f
                .login
                .login(PrincipalKind::Sales, "priya@example.com", "wrong", now)
                .await
                .unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
        }
        let state = f.store.account_lockout(seeded.reference()).unwrap();
        assert_eq!(state.attempts, 5);
        assert_eq!(state.lock_until, Some(now + Duration::minutes(15)));

        let locked = f
            .login
            .login(PrincipalKind::Sales, "priya@example.com", "correct horse", now)
            .await
            .unwrap_err();
        assert!(matches!(locked, AuthError::LoginLocked));

        let later = now + Duration::minutes(16);
        assert!(
            f.login
                .login(PrincipalKind::Sales, "priya@example.com", "correct horse", later)
                .await
                .is_ok()
        );
        assert_eq!(
            f.store.account_lockout(seeded.reference()).unwrap(),
            LockoutState::default()
        );
    }

    #[tokio::test]
    async fn success_resets_partial_count() {
        let f = fixture();
        let seeded = seed(&f.store, PrincipalKind::Employee).await;
        let now = Utc::now();
        for _ in 0..3 {
            let _ = f
                .login
                .login(PrincipalKind::Employee, "priya@example.com", "nope", now)
                .await;
        }
        f.login
            .login(PrincipalKind::Employee, "priya@example.com", "correct horse", now)
            .await
            .unwrap();
        assert_eq!(
            f.store.account_lockout(seeded.reference()).unwrap().attempts,
            0
        );
    }

    #[tokio::test]
    async fn unknown_email_matches_wrong_password() {
        let f = fixture();
        seed(&f.store, PrincipalKind::Admin).await;
        let unknown = f
            .login
            .login(PrincipalKind::Admin, "nobody@example.com", "x", Utc::now())
            .await
            .unwrap_err();
        let wrong = f
            .login
            .login(PrincipalKind::Admin, "priya@example.com", "x", Utc::now())
            .await
            .unwrap_err();
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn email_is_scoped_to_the_channel_table() {
        let f = fixture();
        seed(&f.store, PrincipalKind::Admin).await;
        let err = f
            .login
            .login(PrincipalKind::Employee, "priya@example.com", "correct horse", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::InvalidCredentials));
    }

    #[tokio::test]
    async fn deactivated_staff_cannot_log_in() {
        let f = fixture();
        let seeded = seed(&f.store, PrincipalKind::ProjectManager).await;
        f.store.set_active(seeded.reference(), false).await.unwrap();
        let err = f
            .login
            .login(
                PrincipalKind::ProjectManager,
                "priya@example.com",
                "correct horse",
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Deactivated));
    }

    #[tokio::test]
    async fn clients_have_no_password_channel() {
        let f = fixture();
        let err = f
            .login
            .login(PrincipalKind::Client, "a@b.c", "pw", Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::Validation(_)));
    }
}
