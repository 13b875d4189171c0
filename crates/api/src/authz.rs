//! API-side access checks.
//!
//! Every admin handler checks its access level before touching the store.

use shopdesk_auth::{AccessLevel, AuthzError, Principal, authorize};

use crate::context::PrincipalContext;

/// Check that the request principal holds `level` on the product admin.
pub fn require_access(principal: &PrincipalContext, level: AccessLevel) -> Result<(), AuthzError> {
    let principal = Principal::from_roles(principal.principal_id(), principal.roles().to_vec());
    authorize(&principal, &level.products_permission())
}

#[cfg(test)]
mod tests {
    use super::*;
    use shopdesk_auth::{PrincipalId, Role};

    #[test]
    fn editor_writes_viewer_reads() {
        let editor = PrincipalContext::new(PrincipalId::new(), vec![Role::CATALOG_EDITOR]);
        assert!(require_access(&editor, AccessLevel::Write).is_ok());

        let viewer = PrincipalContext::new(PrincipalId::new(), vec![Role::CATALOG_VIEWER]);
        assert!(require_access(&viewer, AccessLevel::Read).is_ok());
        assert!(require_access(&viewer, AccessLevel::Write).is_err());
    }
}
