//! One-time-passcode login for the client channel.
//!
//! A challenge moves `NoChallenge → Issued → Verified | Expired | Locked`.
//! Attempts and locks are persisted on the client record itself, so they
//! survive restarts and need no separate cache.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rand::{Rng, rng};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::AuthError;
use super::jwt::TokenIssuer;
use super::lockout::LockoutPolicy;
use super::phone::{OTP_LENGTH, default_client_name, mask_phone, normalize_phone, validate_otp_format};
use crate::models::auth::Session;
use crate::models::principal::{ClientWithCredential, Principal};
use crate::sms::{SmsError, SmsGateway};
use crate::store::{PrincipalStore, StoreError};

/// Default challenge lifetime: 5 minutes.
pub const DEFAULT_OTP_TTL_SECS: i64 = 300;

/// Default SMS template for login codes.
pub const DEFAULT_TEMPLATE_ID: &str = "otp-login";

/// Fixed phone/code pair for demos and store review, never honoured in
/// production.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DemoLogin {
    pub phone: String,
    pub code: String,
}

/// Tunables for the OTP channel.
#[derive(Debug, Clone)]
pub struct OtpPolicy {
    pub code_ttl: Duration,
    pub lockout: LockoutPolicy,
    pub template_id: String,
    /// Production makes SMS failures fatal and disables the demo login.
    pub is_production: bool,
    pub demo: Option<DemoLogin>,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self {
            code_ttl: Duration::seconds(DEFAULT_OTP_TTL_SECS),
            lockout: LockoutPolicy::default(),
            template_id: DEFAULT_TEMPLATE_ID.to_string(),
            is_production: false,
            demo: None,
        }
    }
}

impl OtpPolicy {
    /// The demo login for `phone`, if one applies in this environment.
    pub fn demo_for(&self, phone: &str) -> Option<&DemoLogin> {
        if self.is_production {
            return None;
        }
        self.demo.as_ref().filter(|d| d.phone == phone)
    }
}

/// What happened to the SMS for an issued challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    Sent { message_id: Option<String> },
    Failed { error: String },
    /// Demo login: nothing was sent.
    Skipped,
}

/// Result of requesting or resending a challenge.
#[derive(Debug, Clone)]
pub struct ChallengeIssued {
    pub principal: Principal,
    /// True when the client was provisioned by this request.
    pub created: bool,
    pub delivery: Delivery,
}

impl ChallengeIssued {
    pub fn sms_sent(&self) -> bool {
        matches!(self.delivery, Delivery::Sent { .. })
    }
}

/// Issues and verifies client OTP challenges.
#[derive(Clone)]
pub struct OtpManager {
    store: Arc<dyn PrincipalStore>,
    sms: Arc<dyn SmsGateway>,
    issuer: TokenIssuer,
    policy: OtpPolicy,
}

impl OtpManager {
    pub fn new(
        store: Arc<dyn PrincipalStore>,
        sms: Arc<dyn SmsGateway>,
        issuer: TokenIssuer,
        policy: OtpPolicy,
    ) -> Self {
        Self {
            store,
            sms,
            issuer,
            policy,
        }
    }

    pub fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    /// Issue a challenge, provisioning the client on first contact.
    pub async fn request_challenge(
        &self,
        raw_phone: &str,
        now: DateTime<Utc>,
    ) -> Result<ChallengeIssued, AuthError> {
        let phone = normalize_phone(raw_phone)?;
        let (client, created) = match self.store.find_client_by_phone(&phone).await? {
            Some(client) => (client, false),
            None => (self.provision(&phone).await?, true),
        };
        self.issue(client, created, now).await
    }

    /// Issue a fresh challenge for an existing client.
    pub async fn resend_challenge(
        &self,
        raw_phone: &str,
        now: DateTime<Utc>,
    ) -> Result<ChallengeIssued, AuthError> {
        let phone = normalize_phone(raw_phone)?;
        let client = self
            .store
            .find_client_by_phone(&phone)
            .await?
            .ok_or_else(|| AuthError::NotFound("No account found for this phone number".into()))?;
        self.issue(client, false, now).await
    }

    /// Check a submitted code and, on success, open a session.
    pub async fn verify_challenge(
        &self,
        raw_phone: &str,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<Session, AuthError> {
        validate_otp_format(code)?;
        let phone = normalize_phone(raw_phone)?;
        let demo = self.policy.demo_for(&phone);

        let client = match self.store.find_client_by_phone(&phone).await? {
            Some(client) => client,
            None if demo.is_some() => self.provision(&phone).await?,
            None => {
                return Err(AuthError::NotFound(
                    "No account found for this phone number".into(),
                ));
            }
        };
        let ClientWithCredential {
            principal,
            credential,
        } = client;

        if !principal.is_active {
            return Err(AuthError::Deactivated);
        }

        if let Some(demo) = demo
            && demo.code == code
        {
            debug!(client = %principal.id, "demo login accepted");
            return self.complete(principal.id, now).await;
        }

        if credential.account.is_locked(now) || credential.otp.is_locked(now) {
            warn!(client = %principal.id, phone = %mask_phone(&phone), "OTP verification while locked");
            return Err(AuthError::ChallengeLocked);
        }

        let unexpired = match credential.otp_expires {
            Some(expires) => now < expires,
            None => demo.is_some(),
        };
        let matches = credential
            .otp_hash
            .as_deref()
            .is_some_and(|stored| {
                stored
                    .as_bytes()
                    .ct_eq(otp_digest(principal.id, code).as_bytes())
                    .into()
            });

        if matches && unexpired {
            return self.complete(principal.id, now).await;
        }

        let state = self
            .store
            .record_otp_failure(principal.id, &self.policy.lockout, now)
            .await?;
        if state.is_locked(now) {
            warn!(
                client = %principal.id,
                attempts = state.attempts,
                "OTP attempts exhausted, challenge locked"
            );
            return Err(AuthError::ChallengeLocked);
        }
        warn!(client = %principal.id, attempts = state.attempts, "invalid or expired OTP");
        Err(AuthError::InvalidChallenge)
    }

    async fn provision(&self, phone: &str) -> Result<ClientWithCredential, AuthError> {
        match self
            .store
            .create_client(phone, &default_client_name(phone))
            .await
        {
            Ok(client) => {
                info!(client = %client.principal.id, phone = %mask_phone(phone), "provisioned client");
                Ok(client)
            }
            // Lost a race with a concurrent first request for the same number.
            Err(StoreError::AlreadyExists) => self
                .store
                .find_client_by_phone(phone)
                .await?
                .ok_or_else(|| AuthError::Internal("client vanished after conflict".into())),
            Err(e) => Err(e.into()),
        }
    }

    async fn issue(
        &self,
        client: ClientWithCredential,
        created: bool,
        now: DateTime<Utc>,
    ) -> Result<ChallengeIssued, AuthError> {
        let ClientWithCredential {
            principal,
            credential,
        } = client;
        let phone = principal.phone.clone().unwrap_or_default();

        if !principal.is_active {
            return Err(AuthError::Deactivated);
        }
        if let Some(demo) = self.policy.demo_for(&phone) {
            self.store
                .store_otp_challenge(principal.id, &otp_digest(principal.id, &demo.code), None)
                .await?;
            debug!(client = %principal.id, "demo challenge stored, SMS skipped");
            return Ok(ChallengeIssued {
                principal,
                created,
                delivery: Delivery::Skipped,
            });
        }

        if credential.account.is_locked(now) || credential.otp.is_locked(now) {
            warn!(client = %principal.id, "OTP requested while locked");
            return Err(AuthError::ChallengeLocked);
        }

        let code = generate_code();
        let expires = now + self.policy.code_ttl;
        self.store
            .store_otp_challenge(principal.id, &otp_digest(principal.id, &code), Some(expires))
            .await?;
        info!(client = %principal.id, phone = %mask_phone(&phone), created, "OTP challenge issued");

        let dispatch = self
            .sms
            .send(&phone, &code, &self.policy.template_id)
            .await;
        let delivery = if dispatch.success {
            Delivery::Sent {
                message_id: dispatch.message_id,
            }
        } else {
            let reason = dispatch
                .error
                .unwrap_or_else(|| "gateway reported failure".to_string());
            if self.policy.is_production {
                error!(client = %principal.id, "OTP delivery failed: {reason}");
                return Err(AuthError::Delivery(SmsError(reason)));
            }
            warn!(client = %principal.id, "OTP delivery failed, challenge kept: {reason}");
            Delivery::Failed { error: reason }
        };

        Ok(ChallengeIssued {
            principal,
            created,
            delivery,
        })
    }

    async fn complete(&self, client_id: Uuid, now: DateTime<Utc>) -> Result<Session, AuthError> {
        let principal = self.store.complete_otp_login(client_id, now).await?;
        let token = self.issuer.issue(principal.id, now)?;
        info!(client = %principal.id, "client logged in via OTP");
        Ok(Session { token, principal })
    }
}

/// Uniformly random code of `OTP_LENGTH` digits.
fn generate_code() -> String {
    let upper = 10u32.pow(OTP_LENGTH as u32);
    format!("{:0width$}", rng().random_range(0..upper), width = OTP_LENGTH)
}

/// Stored form of a code: SHA-256 over the client id and the code.
fn otp_digest(client_id: Uuid, code: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(client_id.as_bytes());
    hasher.update(b":");
    hasher.update(code.as_bytes());
    format!("{:x}", hasher.finalize())
}
