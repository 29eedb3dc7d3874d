//! The external policy store boundary.
//!
//! The store only knows principals and flat role names; scope is a
//! local concept. Each call may fail independently.

use crate::error::OrgIamResult;
use crate::roles::RoleSet;

pub trait PolicyStore: Send + Sync {
    /// Grant `role` to `principal`. Granting a held role is a no-op.
    fn grant(&self, principal: &str, role: &str)
    -> impl Future<Output = OrgIamResult<()>> + Send;

    /// Revoke every role held by `principal`. Safe to repeat.
    fn revoke_all(&self, principal: &str) -> impl Future<Output = OrgIamResult<()>> + Send;

    /// Roles the store currently holds for `principal`.
    fn roles_of(&self, principal: &str) -> impl Future<Output = OrgIamResult<RoleSet>> + Send;
}
