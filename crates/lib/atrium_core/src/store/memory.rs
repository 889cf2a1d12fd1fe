//! In-memory principal store for local development and tests.
//!
//! Records are keyed by `PrincipalRef`, so the same id may exist under more
//! than one kind exactly as it could across the real tables. Mutations go
//! through `DashMap::get_mut`, which holds the shard write lock for the whole
//! read-modify-write.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use super::{PrincipalStore, StoreError, new_id};
use crate::auth::lockout::{LockoutPolicy, LockoutState};
use crate::models::principal::{
    ClientCredential, ClientWithCredential, NewStaff, Principal, PrincipalKind, PrincipalRef,
    StaffCredential, StaffWithCredential,
};

#[derive(Debug, Clone)]
enum Credential {
    Staff(StaffCredential),
    Client(ClientCredential),
}

#[derive(Debug, Clone)]
struct Record {
    principal: Principal,
    credential: Credential,
}

impl Record {
    fn account_lockout_mut(&mut self) -> &mut LockoutState {
        match &mut self.credential {
            Credential::Staff(c) => &mut c.lockout,
            Credential::Client(c) => &mut c.account,
        }
    }

    fn client_mut(&mut self) -> Result<&mut ClientCredential, StoreError> {
        match &mut self.credential {
            Credential::Client(c) => Ok(c),
            Credential::Staff(_) => Err(StoreError::Unsupported(self.principal.kind)),
        }
    }
}

/// `DashMap`-backed `PrincipalStore`.
#[derive(Debug, Default)]
pub struct MemoryPrincipalStore {
    records: DashMap<PrincipalRef, Record>,
}

impl MemoryPrincipalStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn update<T>(
        &self,
        reference: PrincipalRef,
        f: impl FnOnce(&mut Record) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut entry = self.records.get_mut(&reference).ok_or(StoreError::NotFound)?;
        f(entry.value_mut())
    }

    #[cfg(test)]
    pub(crate) fn insert_staff(&self, principal: Principal, password_hash: &str) {
        self.records.insert(
            principal.reference(),
            Record {
                principal,
                credential: Credential::Staff(StaffCredential {
                    password_hash: password_hash.to_string(),
                    lockout: LockoutState::default(),
                }),
            },
        );
    }

    #[cfg(test)]
    pub(crate) fn insert_client(&self, principal: Principal) {
        self.records.insert(
            principal.reference(),
            Record {
                principal,
                credential: Credential::Client(ClientCredential::default()),
            },
        );
    }

    #[cfg(test)]
    pub(crate) fn set_account_lock(
        &self,
        reference: PrincipalRef,
        lock_until: Option<DateTime<Utc>>,
    ) {
        if let Some(mut entry) = self.records.get_mut(&reference) {
            entry.account_lockout_mut().lock_until = lock_until;
        }
    }

    #[cfg(test)]
    pub(crate) fn client_credential(&self, client_id: Uuid) -> Option<ClientCredential> {
        self.records
            .get(&PrincipalRef::Client(client_id))
            .and_then(|r| match &r.credential {
                Credential::Client(c) => Some(c.clone()),
                Credential::Staff(_) => None,
            })
    }

    #[cfg(test)]
    pub(crate) fn account_lockout(&self, reference: PrincipalRef) -> Option<LockoutState> {
        self.records.get(&reference).map(|r| match &r.credential {
            Credential::Staff(c) => c.lockout,
            Credential::Client(c) => c.account,
        })
    }
}

fn new_principal(
    kind: PrincipalKind,
    name: &str,
    email: Option<String>,
    phone: Option<String>,
) -> Principal {
    Principal {
        id: new_id(),
        kind,
        name: name.to_string(),
        email,
        phone,
        is_active: true,
        last_login: None,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl PrincipalStore for MemoryPrincipalStore {
    async fn find_principal(
        &self,
        reference: PrincipalRef,
    ) -> Result<Option<Principal>, StoreError> {
        Ok(self.records.get(&reference).map(|r| r.principal.clone()))
    }

    async fn find_staff_by_email(
        &self,
        kind: PrincipalKind,
        email: &str,
    ) -> Result<Option<StaffWithCredential>, StoreError> {
        if !kind.is_staff() {
            return Err(StoreError::Unsupported(kind));
        }
        Ok(self.records.iter().find_map(|entry| {
            let record = entry.value();
            match &record.credential {
                Credential::Staff(credential)
                    if record.principal.kind == kind
                        && record.principal.email.as_deref() == Some(email) =>
                {
                    Some(StaffWithCredential {
                        principal: record.principal.clone(),
                        credential: credential.clone(),
                    })
                }
                _ => None,
            }
        }))
    }

    async fn find_client_by_phone(
        &self,
        phone: &str,
    ) -> Result<Option<ClientWithCredential>, StoreError> {
        Ok(self.records.iter().find_map(|entry| {
            let record = entry.value();
            match &record.credential {
                Credential::Client(credential)
                    if record.principal.phone.as_deref() == Some(phone) =>
                {
                    Some(ClientWithCredential {
                        principal: record.principal.clone(),
                        credential: credential.clone(),
                    })
                }
                _ => None,
            }
        }))
    }

    async fn create_client(
        &self,
        phone: &str,
        name: &str,
    ) -> Result<ClientWithCredential, StoreError> {
        if self.find_client_by_phone(phone).await?.is_some() {
            return Err(StoreError::AlreadyExists);
        }
        let principal = new_principal(PrincipalKind::Client, name, None, Some(phone.to_string()));
        let credential = ClientCredential::default();
        self.records.insert(
            principal.reference(),
            Record {
                principal: principal.clone(),
                credential: Credential::Client(credential.clone()),
            },
        );
        Ok(ClientWithCredential {
            principal,
            credential,
        })
    }

    async fn create_staff(&self, staff: NewStaff) -> Result<Principal, StoreError> {
        if !staff.kind.is_staff() {
            return Err(StoreError::Unsupported(staff.kind));
        }
        if self
            .find_staff_by_email(staff.kind, &staff.email)
            .await?
            .is_some()
        {
            return Err(StoreError::AlreadyExists);
        }
        let principal = new_principal(staff.kind, &staff.name, Some(staff.email), staff.phone);
        self.records.insert(
            principal.reference(),
            Record {
                principal: principal.clone(),
                credential: Credential::Staff(StaffCredential {
                    password_hash: staff.password_hash,
                    lockout: LockoutState::default(),
                }),
            },
        );
        Ok(principal)
    }

    async fn count_staff(&self, kind: PrincipalKind) -> Result<i64, StoreError> {
        let count = self.records.iter().filter(|r| r.key().kind() == kind).count();
        Ok(count as i64)
    }

    async fn store_otp_challenge(
        &self,
        client_id: Uuid,
        otp_hash: &str,
        expires: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        self.update(PrincipalRef::Client(client_id), |record| {
            let client = record.client_mut()?;
            client.otp_hash = Some(otp_hash.to_string());
            client.otp_expires = expires;
            client.otp = LockoutState::cleared();
            Ok(())
        })
    }

    async fn record_otp_failure(
        &self,
        client_id: Uuid,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutState, StoreError> {
        self.update(PrincipalRef::Client(client_id), |record| {
            let client = record.client_mut()?;
            client.otp = client.otp.after_failure(policy, now);
            Ok(client.otp)
        })
    }

    async fn complete_otp_login(
        &self,
        client_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Principal, StoreError> {
        self.update(PrincipalRef::Client(client_id), |record| {
            let client = record.client_mut()?;
            client.otp_hash = None;
            client.otp_expires = None;
            client.otp = LockoutState::cleared();
            client.account = LockoutState::cleared();
            record.principal.last_login = Some(now);
            Ok(record.principal.clone())
        })
    }

    async fn record_login_failure(
        &self,
        reference: PrincipalRef,
        policy: &LockoutPolicy,
        now: DateTime<Utc>,
    ) -> Result<LockoutState, StoreError> {
        self.update(reference, |record| {
            let lockout = record.account_lockout_mut();
            *lockout = lockout.after_failure(policy, now);
            Ok(*lockout)
        })
    }

    async fn record_login_success(
        &self,
        reference: PrincipalRef,
        now: DateTime<Utc>,
    ) -> Result<Principal, StoreError> {
        self.update(reference, |record| {
            *record.account_lockout_mut() = LockoutState::cleared();
            record.principal.last_login = Some(now);
            Ok(record.principal.clone())
        })
    }

    async fn set_active(
        &self,
        reference: PrincipalRef,
        active: bool,
    ) -> Result<Principal, StoreError> {
        self.update(reference, |record| {
            record.principal.is_active = active;
            Ok(record.principal.clone())
        })
    }

    async fn clear_lockout(&self, reference: PrincipalRef) -> Result<Principal, StoreError> {
        self.update(reference, |record| {
            *record.account_lockout_mut() = LockoutState::cleared();
            if let Credential::Client(client) = &mut record.credential {
                client.otp = LockoutState::cleared();
            }
            Ok(record.principal.clone())
        })
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
