//! Policy model - organization-scoped conditional grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Attribute predicates attached to a policy. A policy grants only when every
/// present condition passes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PolicyConditions {
    /// Grant only to this principal
    #[serde(default)]
    pub subject_id: Option<String>,
    /// Grant only for this resource
    #[serde(default)]
    pub resource_id: Option<String>,
    /// Grant only from this instant
    #[serde(default)]
    pub valid_from: Option<DateTime<Utc>>,
    /// Grant only until this instant
    #[serde(default)]
    pub valid_until: Option<DateTime<Utc>>,
    /// Key/value equality checks against the caller-supplied context
    #[serde(default)]
    pub attributes: HashMap<String, String>,
}

/// Conditional grant evaluated when a role's static patterns do not already
/// allow a permission. Created and soft-deleted by admins, read-only at
/// request time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub policy_id: String,
    pub org_id: String,
    pub permission: String,
    #[serde(default)]
    pub conditions: PolicyConditions,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Policy {
    pub fn new(
        org_id: impl Into<String>,
        permission: impl Into<String>,
        conditions: PolicyConditions,
    ) -> Self {
        let now = Utc::now();
        Self {
            policy_id: Uuid::new_v4().to_string(),
            org_id: org_id.into(),
            permission: permission.into(),
            conditions,
            is_active: true,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Active and not soft-deleted.
    pub fn is_live(&self) -> bool {
        self.is_active && self.deleted_at.is_none()
    }

    pub fn deactivate(&mut self) {
        self.is_active = false;
        self.updated_at = Utc::now();
    }

    pub fn soft_delete(&mut self) {
        self.deleted_at = Some(Utc::now());
        self.updated_at = Utc::now();
    }

    /// Evaluate every present condition against the request.
    pub fn matches(
        &self,
        subject_id: &str,
        resource_id: Option<&str>,
        context: Option<&HashMap<String, String>>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.is_live() {
            return false;
        }

        if let Some(expected) = &self.conditions.subject_id {
            if expected != subject_id {
                return false;
            }
        }

        if let Some(expected) = &self.conditions.resource_id {
            match resource_id {
                Some(actual) if actual == expected => {}
                _ => return false,
            }
        }

        if let Some(from) = self.conditions.valid_from {
            if now < from {
                return false;
            }
        }

        if let Some(until) = self.conditions.valid_until {
            if now > until {
                return false;
            }
        }

        if !self.conditions.attributes.is_empty() {
            let ctx = match context {
                Some(ctx) => ctx,
                None => return false,
            };
            for (key, value) in &self.conditions.attributes {
                if ctx.get(key) != Some(value) {
                    return false;
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn subject_policy() -> Policy {
        Policy::new(
            "org_1",
            "policies:create",
            PolicyConditions {
                subject_id: Some("user_123".to_string()),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_subject_condition() {
        let policy = subject_policy();
        let now = Utc::now();
        assert!(policy.matches("user_123", None, None, now));
        assert!(!policy.matches("user_456", None, None, now));
    }

    #[test]
    fn test_resource_condition_requires_resource() {
        let policy = Policy::new(
            "org_1",
            "documents:read",
            PolicyConditions {
                resource_id: Some("doc_9".to_string()),
                ..Default::default()
            },
        );
        let now = Utc::now();
        assert!(policy.matches("anyone", Some("doc_9"), None, now));
        assert!(!policy.matches("anyone", Some("doc_8"), None, now));
        assert!(!policy.matches("anyone", None, None, now));
    }

    #[test]
    fn test_time_window() {
        let now = Utc::now();
        let policy = Policy::new(
            "org_1",
            "reports:export",
            PolicyConditions {
                valid_from: Some(now - Duration::hours(1)),
                valid_until: Some(now + Duration::hours(1)),
                ..Default::default()
            },
        );
        assert!(policy.matches("anyone", None, None, now));
        assert!(!policy.matches("anyone", None, None, now + Duration::hours(2)));
        assert!(!policy.matches("anyone", None, None, now - Duration::hours(2)));
    }

    #[test]
    fn test_attribute_conditions_need_context() {
        let mut attributes = HashMap::new();
        attributes.insert("department".to_string(), "finance".to_string());
        let policy = Policy::new(
            "org_1",
            "reports:export",
            PolicyConditions {
                attributes,
                ..Default::default()
            },
        );
        let now = Utc::now();

        let mut ctx = HashMap::new();
        ctx.insert("department".to_string(), "finance".to_string());
        assert!(policy.matches("anyone", None, Some(&ctx), now));

        ctx.insert("department".to_string(), "sales".to_string());
        assert!(!policy.matches("anyone", None, Some(&ctx), now));
        assert!(!policy.matches("anyone", None, None, now));
    }

    #[test]
    fn test_inactive_and_deleted_policies_never_match() {
        let now = Utc::now();

        let mut policy = subject_policy();
        policy.deactivate();
        assert!(!policy.matches("user_123", None, None, now));

        let mut policy = subject_policy();
        policy.soft_delete();
        assert!(!policy.matches("user_123", None, None, now));
    }
}
