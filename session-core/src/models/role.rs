//! Role model - the ordered role set used for privilege comparisons.

use serde::{Deserialize, Serialize};

/// Organization role. Declaration order defines the privilege order, so the
/// derived `Ord` agrees with [`Role::level`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Member,
    Admin,
    Owner,
    SuperAdmin,
}

impl Role {
    /// Numeric privilege level.
    pub fn level(&self) -> u8 {
        match self {
            Role::Viewer => 0,
            Role::Member => 1,
            Role::Admin => 2,
            Role::Owner => 3,
            Role::SuperAdmin => 4,
        }
    }

    /// True when this role meets or exceeds `required`.
    pub fn satisfies(&self, required: Role) -> bool {
        self.level() >= required.level()
    }

    /// Static permission patterns granted to the role.
    ///
    /// Patterns use `resource:action` segments; a trailing `*` matches the
    /// remaining suffix. Each set is exclusive to its role tier, so first
    /// match wins without precedence rules.
    pub fn permission_patterns(&self) -> &'static [&'static str] {
        match self {
            Role::Viewer => &["users:read", "orgs:read"],
            Role::Member => &[
                "users:read",
                "users:update:self",
                "orgs:read",
                "sessions:read:self",
                "sessions:revoke:self",
            ],
            Role::Admin => &[
                "users:*",
                "orgs:read",
                "orgs:update",
                "policies:*",
                "sessions:*",
                "webhooks:*",
            ],
            Role::Owner => &[
                "users:*",
                "orgs:*",
                "policies:*",
                "sessions:*",
                "webhooks:*",
                "billing:*",
            ],
            Role::SuperAdmin => &["*"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Member => "member",
            Role::Admin => "admin",
            Role::Owner => "owner",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "member" => Ok(Role::Member),
            "admin" => Ok(Role::Admin),
            "owner" => Ok(Role::Owner),
            "super_admin" => Ok(Role::SuperAdmin),
            _ => Err(format!("Invalid role: {}", s)),
        }
    }
}
