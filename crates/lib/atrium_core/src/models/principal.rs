//! Principal domain models.
//!
//! Every principal kind lives in its own table. A `PrincipalRef` names a row
//! in exactly one of them; role is never stored on the token, it is derived
//! from which table the id resolves in.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::lockout::LockoutState;

/// The six principal kinds the platform can bind a request to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PrincipalKind {
    MasterAdmin,
    Admin,
    ProjectManager,
    Sales,
    Employee,
    Client,
}

impl PrincipalKind {
    /// Order in which identity resolution probes the principal tables.
    pub const RESOLUTION_ORDER: [PrincipalKind; 6] = [
        PrincipalKind::MasterAdmin,
        PrincipalKind::Admin,
        PrincipalKind::ProjectManager,
        PrincipalKind::Sales,
        PrincipalKind::Employee,
        PrincipalKind::Client,
    ];

    /// Kinds that authenticate with a password.
    pub const STAFF: [PrincipalKind; 5] = [
        PrincipalKind::MasterAdmin,
        PrincipalKind::Admin,
        PrincipalKind::ProjectManager,
        PrincipalKind::Sales,
        PrincipalKind::Employee,
    ];

    /// Wire name, as used in routes and response bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            PrincipalKind::MasterAdmin => "master-admin",
            PrincipalKind::Admin => "admin",
            PrincipalKind::ProjectManager => "project-manager",
            PrincipalKind::Sales => "sales",
            PrincipalKind::Employee => "employee",
            PrincipalKind::Client => "client",
        }
    }

    pub fn is_staff(&self) -> bool {
        !matches!(self, PrincipalKind::Client)
    }

    /// Wraps an id into the matching `PrincipalRef` variant.
    pub fn with_id(self, id: Uuid) -> PrincipalRef {
        match self {
            PrincipalKind::MasterAdmin => PrincipalRef::MasterAdmin(id),
            PrincipalKind::Admin => PrincipalRef::Admin(id),
            PrincipalKind::ProjectManager => PrincipalRef::ProjectManager(id),
            PrincipalKind::Sales => PrincipalRef::Sales(id),
            PrincipalKind::Employee => PrincipalRef::Employee(id),
            PrincipalKind::Client => PrincipalRef::Client(id),
        }
    }
}

impl fmt::Display for PrincipalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a wire name does not match any principal kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown principal kind '{0}'")]
pub struct UnknownKind(pub String);

impl FromStr for PrincipalKind {
    type Err = UnknownKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "master-admin" => Ok(PrincipalKind::MasterAdmin),
            "admin" | "hr" => Ok(PrincipalKind::Admin),
            "project-manager" | "pm" => Ok(PrincipalKind::ProjectManager),
            "sales" => Ok(PrincipalKind::Sales),
            "employee" => Ok(PrincipalKind::Employee),
            "client" => Ok(PrincipalKind::Client),
            other => Err(UnknownKind(other.to_string())),
        }
    }
}

/// A reference to one row in one principal table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrincipalRef {
    MasterAdmin(Uuid),
    Admin(Uuid),
    ProjectManager(Uuid),
    Sales(Uuid),
    Employee(Uuid),
    Client(Uuid),
}

impl PrincipalRef {
    pub fn kind(&self) -> PrincipalKind {
        match self {
            PrincipalRef::MasterAdmin(_) => PrincipalKind::MasterAdmin,
            PrincipalRef::Admin(_) => PrincipalKind::Admin,
            PrincipalRef::ProjectManager(_) => PrincipalKind::ProjectManager,
            PrincipalRef::Sales(_) => PrincipalKind::Sales,
            PrincipalRef::Employee(_) => PrincipalKind::Employee,
            PrincipalRef::Client(_) => PrincipalKind::Client,
        }
    }

    pub fn id(&self) -> Uuid {
        match *self {
            PrincipalRef::MasterAdmin(id)
            | PrincipalRef::Admin(id)
            | PrincipalRef::ProjectManager(id)
            | PrincipalRef::Sales(id)
            | PrincipalRef::Employee(id)
            | PrincipalRef::Client(id) => id,
        }
    }
}

impl fmt::Display for PrincipalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind(), self.id())
    }
}

/// Public attributes shared by every principal kind. Never carries
/// credential material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Principal {
    pub id: Uuid,
    pub kind: PrincipalKind,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Principal {
    pub fn reference(&self) -> PrincipalRef {
        self.kind.with_id(self.id)
    }
}

/// Password material for staff principals.
#[derive(Debug, Clone)]
pub struct StaffCredential {
    pub password_hash: String,
    pub lockout: LockoutState,
}

/// OTP material for client principals.
#[derive(Debug, Clone, Default)]
pub struct ClientCredential {
    /// Salted SHA-256 digest of the outstanding code.
    pub otp_hash: Option<String>,
    /// `None` with a stored code means the code never expires.
    pub otp_expires: Option<DateTime<Utc>>,
    pub otp: LockoutState,
    /// Account-level lock, shared in shape with the staff password lock.
    pub account: LockoutState,
}

/// Principal together with its hidden password fields.
#[derive(Debug, Clone)]
pub struct StaffWithCredential {
    pub principal: Principal,
    pub credential: StaffCredential,
}

/// Client together with its hidden OTP fields.
#[derive(Debug, Clone)]
pub struct ClientWithCredential {
    pub principal: Principal,
    pub credential: ClientCredential,
}

/// Input for administrative creation of a staff principal.
#[derive(Debug, Clone)]
pub struct NewStaff {
    pub kind: PrincipalKind,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
}
