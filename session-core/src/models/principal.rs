use serde::{Deserialize, Serialize};

use super::Role;

/// Account status. Principals are never physically deleted; deactivation is a
/// status change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrincipalStatus {
    #[default]
    Active,
    Suspended,
    Deactivated,
}

/// An authenticated actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    /// Opaque identifier
    pub id: String,
    pub tenant_id: String,
    pub email: String,
    /// Default role within the principal's home organization
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub is_super_admin: bool,
    #[serde(default)]
    pub status: PrincipalStatus,
}

impl Principal {
    pub fn new(id: impl Into<String>, tenant_id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            tenant_id: tenant_id.into(),
            email: email.into(),
            role: None,
            is_super_admin: false,
            status: PrincipalStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == PrincipalStatus::Active
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_principal_is_active() {
        let p = Principal::new("user_1", "tenant_1", "a@example.com");
        assert!(p.is_active());
        assert!(!p.is_super_admin);
    }

    #[test]
    fn test_suspended_principal_is_not_active() {
        let mut p = Principal::new("user_1", "tenant_1", "a@example.com");
        p.status = PrincipalStatus::Suspended;
        assert!(!p.is_active());
    }
}
