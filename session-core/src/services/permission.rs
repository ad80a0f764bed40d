//! Permission engine - role hierarchy and conditional policy evaluation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;

use crate::db::{PolicyStore, RoleDirectory};
use crate::models::Role;
use crate::services::{AuthError, KeyValueStore};

/// True when `actual` meets or exceeds `required` in the role order.
pub fn has_sufficient_role(actual: Role, required: Role) -> bool {
    actual.satisfies(required)
}

/// Anchored wildcard match over `:`-separated segments. A `*` segment matches
/// the remaining non-empty suffix, so `users:*` covers `users:read` and
/// `users:update:self` but not `users` itself.
pub fn permission_matches(pattern: &str, permission: &str) -> bool {
    if pattern == "*" {
        return true;
    }

    let mut pattern_segments = pattern.split(':');
    let mut permission_segments = permission.split(':');

    loop {
        match (pattern_segments.next(), permission_segments.next()) {
            (Some("*"), Some(_)) => return true,
            (Some(expected), Some(actual)) if expected == actual => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Evaluates whether a principal may perform a permission, combining the
/// role's static pattern set with org-scoped conditional policies. Decisions
/// are cached per (principal, org, permission) under an org generation key.
#[derive(Clone)]
pub struct PermissionEngine {
    roles: Arc<dyn RoleDirectory>,
    policies: Arc<dyn PolicyStore>,
    cache: Arc<dyn KeyValueStore>,
    cache_ttl_seconds: i64,
}

impl PermissionEngine {
    pub fn new(
        roles: Arc<dyn RoleDirectory>,
        policies: Arc<dyn PolicyStore>,
        cache: Arc<dyn KeyValueStore>,
        cache_ttl_seconds: i64,
    ) -> Self {
        Self {
            roles,
            policies,
            cache,
            cache_ttl_seconds,
        }
    }

    /// Decide whether `principal_id` may perform `permission` in `org_id`.
    ///
    /// Cache failures fall back to a fresh evaluation; they cost latency, not
    /// correctness.
    pub async fn check_permission(
        &self,
        principal_id: &str,
        org_id: Option<&str>,
        permission: &str,
        resource_id: Option<&str>,
        context: Option<&HashMap<String, String>>,
    ) -> Result<bool, AuthError> {
        if self.roles.is_super_admin(principal_id).await? {
            return Ok(true);
        }

        let org_id = match org_id {
            Some(org_id) => org_id,
            None => return Ok(false),
        };

        let cache_key = self.cache_key(org_id, principal_id, permission).await;
        if let Some(key) = &cache_key {
            match self.cache.get(key).await {
                Ok(Some(cached)) => return Ok(cached == "1"),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "Permission cache read failed, evaluating fresh")
                }
            }
        }

        let allowed = self
            .evaluate(principal_id, org_id, permission, resource_id, context)
            .await?;

        if let Some(key) = &cache_key {
            let value = if allowed { "1" } else { "0" };
            if let Err(e) = self.cache.set(key, value, self.cache_ttl_seconds).await {
                tracing::warn!(error = %e, "Permission cache write failed");
            }
        }

        Ok(allowed)
    }

    /// Like [`check_permission`](Self::check_permission) but surfaces a deny
    /// as an error. The error carries nothing beyond "denied", so callers
    /// cannot learn whether the org or resource exists.
    pub async fn enforce_permission(
        &self,
        principal_id: &str,
        org_id: Option<&str>,
        permission: &str,
        resource_id: Option<&str>,
        context: Option<&HashMap<String, String>>,
    ) -> Result<(), AuthError> {
        if self
            .check_permission(principal_id, org_id, permission, resource_id, context)
            .await?
        {
            Ok(())
        } else {
            tracing::debug!(
                principal_id = %principal_id,
                permission = %permission,
                "Permission denied"
            );
            Err(AuthError::PermissionDenied)
        }
    }

    /// Require at least `required` role in the org. Distinguishes
    /// non-membership from insufficient privilege for internal callers.
    pub async fn require_role(
        &self,
        principal_id: &str,
        org_id: &str,
        required: Role,
    ) -> Result<Role, AuthError> {
        if self.roles.is_super_admin(principal_id).await? {
            return Ok(Role::SuperAdmin);
        }
        let role = self
            .roles
            .get_role(principal_id, org_id)
            .await?
            .ok_or(AuthError::NotAMember)?;
        if role.satisfies(required) {
            Ok(role)
        } else {
            Err(AuthError::PermissionDenied)
        }
    }

    /// Invalidate every cached decision for an org. Call on role assignment
    /// changes and policy create/update/delete.
    pub async fn invalidate_org(&self, org_id: &str) {
        if let Err(e) = self.cache.incr(&generation_key(org_id)).await {
            tracing::warn!(error = %e, org_id = %org_id, "Failed to bump permission cache generation");
        }
    }

    async fn evaluate(
        &self,
        principal_id: &str,
        org_id: &str,
        permission: &str,
        resource_id: Option<&str>,
        context: Option<&HashMap<String, String>>,
    ) -> Result<bool, AuthError> {
        let role = match self.roles.get_role(principal_id, org_id).await? {
            Some(role) => role,
            // Not a member of the org: policies are not consulted
            None => return Ok(false),
        };

        if role
            .permission_patterns()
            .iter()
            .any(|pattern| permission_matches(pattern, permission))
        {
            return Ok(true);
        }

        let now = Utc::now();
        let policies = self.policies.find_active_policies(org_id, permission).await?;
        Ok(policies
            .iter()
            .any(|policy| policy.matches(principal_id, resource_id, context, now)))
    }

    /// Cache key embedding the org generation; bumping the generation orphans
    /// every previous key, which then ages out via TTL. A generation lookup
    /// failure disables caching for the call (fail open).
    async fn cache_key(&self, org_id: &str, principal_id: &str, permission: &str) -> Option<String> {
        match self.cache.get(&generation_key(org_id)).await {
            Ok(generation) => Some(format!(
                "perm:{}:{}:{}:{}",
                org_id,
                generation.unwrap_or_else(|| "0".to_string()),
                principal_id,
                permission
            )),
            Err(e) => {
                tracing::warn!(error = %e, "Permission cache generation read failed");
                None
            }
        }
    }
}

fn generation_key(org_id: &str) -> String {
    format!("permgen:{}", org_id)
}
