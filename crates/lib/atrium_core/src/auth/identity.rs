//! Token-to-principal resolution.
//!
//! Tokens carry only an id. The role is whichever table, probed in
//! `PrincipalKind::RESOLUTION_ORDER`, first holds an active row with that id.
//! Inactive rows are skipped exactly like missing ones.

use tracing::debug;
use uuid::Uuid;

use super::AuthError;
use super::jwt::TokenIssuer;
use crate::models::principal::{Principal, PrincipalKind};
use crate::store::{PrincipalStore, StoreError};

/// First active principal with `id`, in resolution order.
pub async fn resolve_principal(
    store: &dyn PrincipalStore,
    id: Uuid,
) -> Result<Option<Principal>, StoreError> {
    for kind in PrincipalKind::RESOLUTION_ORDER {
        if let Some(principal) = store.find_principal(kind.with_id(id)).await?
            && principal.is_active
        {
            return Ok(Some(principal));
        }
    }
    Ok(None)
}

/// Verify a bearer token and bind it to a principal.
pub async fn authenticate_token(
    issuer: &TokenIssuer,
    store: &dyn PrincipalStore,
    token: &str,
) -> Result<Principal, AuthError> {
    let id = issuer.verify(token)?;
    match resolve_principal(store, id).await? {
        Some(principal) => {
            debug!(principal = %principal.reference(), "token resolved");
            Ok(principal)
        }
        None => {
            debug!(%id, "no active principal for token");
            Err(AuthError::NoPrincipal)
        }
    }
}
