//! Port trait for role-based recipient lookup.

use async_trait::async_trait;

use crate::models::RoleTag;

/// Resolves a role to the wallets currently holding it in the room.
///
/// Called once per submission and never cached, so the result reflects the
/// roster at the moment of payment. Returned strings are raw addresses;
/// invalid entries are filtered by the engine.
#[async_trait]
pub trait RosterResolver: Send + Sync {
    async fn resolve_role(&self, role: &RoleTag) -> Vec<String>;
}
