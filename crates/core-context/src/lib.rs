// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 P47H Team <https://p47h.com>

//! # context
//!
//! The acting principal behind a registry request.
//!
//! A [`RequesterContext`] carries the role set used by property protection
//! rules, plus the identity fields (tenant, user, admin flag) consulted by the
//! ownership, visibility and sharing checks that sit next to it. The rule
//! engine itself only reads [`RequesterContext::roles`]; everything else is
//! forwarded untouched to the policy oracle.
//!
//! ## Example
//!
//! ```
//! use core_context::RequesterContext;
//!
//! let ctx = RequesterContext::new(["member", " reader "])
//!     .with_tenant("tenant-a")
//!     .unwrap();
//!
//! assert!(ctx.has_role("reader"));
//! assert_eq!(ctx.tenant(), Some("tenant-a"));
//! assert!(!ctx.is_admin());
//! ```

mod error;

pub use error::{ContextError, Result};

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Separator used by role headers (`X-Roles: admin,member`)
pub const ROLE_SEPARATOR: char = ',';

/// Identity and role set of the principal performing an operation
///
/// Roles are kept in a `BTreeSet` so iteration order (and anything derived
/// from it, such as log lines or oracle payloads) is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequesterContext {
    #[serde(default)]
    roles: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tenant: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,
    #[serde(default)]
    is_admin: bool,
}

impl RequesterContext {
    /// Create a context holding the given roles
    ///
    /// Role names are trimmed; blank entries are dropped.
    #[must_use]
    pub fn new<I, S>(roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let roles = roles
            .into_iter()
            .map(|r| r.as_ref().trim().to_string())
            .filter(|r| !r.is_empty())
            .collect();

        Self {
            roles,
            ..Self::default()
        }
    }

    /// Anonymous context: no roles, no tenant, not admin
    #[must_use]
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build a context from a comma-separated role header
    ///
    /// # Errors
    ///
    /// Returns `ContextError::InvalidRole` if a role contains whitespace
    /// or control characters after trimming.
    pub fn from_role_header(header: &str) -> Result<Self> {
        let mut roles = BTreeSet::new();
        for raw in header.split(ROLE_SEPARATOR) {
            let role = raw.trim();
            if role.is_empty() {
                continue;
            }
            if role.chars().any(|c| c.is_whitespace() || c.is_control()) {
                return Err(ContextError::InvalidRole(role.to_string()));
            }
            roles.insert(role.to_string());
        }

        Ok(Self {
            roles,
            ..Self::default()
        })
    }

    /// Attach the owning tenant (project) of the requester
    ///
    /// # Errors
    ///
    /// Returns `ContextError::InvalidTenant` if the identifier is blank.
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Result<Self> {
        let tenant = tenant.into();
        if tenant.trim().is_empty() {
            return Err(ContextError::InvalidTenant(tenant));
        }
        self.tenant = Some(tenant);
        Ok(self)
    }

    /// Attach the user identifier
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Mark the requester as a cloud administrator
    #[must_use]
    pub const fn with_admin(mut self, is_admin: bool) -> Self {
        self.is_admin = is_admin;
        self
    }

    /// Add a single role
    #[must_use]
    pub fn with_role(mut self, role: impl AsRef<str>) -> Self {
        let role = role.as_ref().trim();
        if !role.is_empty() {
            self.roles.insert(role.to_string());
        }
        self
    }

    /// Roles held by the requester
    #[must_use]
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Check membership of a single role
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }

    /// True if the requester holds at least one of `candidates`
    pub fn has_any_role<'a, I>(&self, candidates: I) -> bool
    where
        I: IntoIterator<Item = &'a str>,
    {
        candidates.into_iter().any(|c| self.roles.contains(c))
    }

    /// Tenant (owner identity) of the requester, if authenticated
    #[must_use]
    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    /// User identifier, if known
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    /// Whether the requester is an administrator
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Authenticated means either a tenant is attached or the requester is admin
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.tenant.is_some() || self.is_admin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_trims_and_drops_blank_roles() {
        let ctx = RequesterContext::new([" admin", "", "member ", "   "]);
        assert_eq!(ctx.roles().len(), 2);
        assert!(ctx.has_role("admin"));
        assert!(ctx.has_role("member"));
    }

    #[test]
    fn test_role_header_parsing() {
        let ctx = RequesterContext::from_role_header("admin, member,,reader").unwrap();
        let roles: Vec<_> = ctx.roles().iter().map(String::as_str).collect();
        assert_eq!(roles, vec!["admin", "member", "reader"]);
    }

    #[test]
    fn test_role_header_rejects_embedded_whitespace() {
        let err = RequesterContext::from_role_header("admin,bad role").unwrap_err();
        assert_eq!(err, ContextError::InvalidRole("bad role".into()));
    }

    #[test]
    fn test_blank_tenant_rejected() {
        let err = RequesterContext::anonymous().with_tenant("  ").unwrap_err();
        assert!(matches!(err, ContextError::InvalidTenant(_)));
    }

    #[test]
    fn test_authenticated() {
        assert!(!RequesterContext::anonymous().is_authenticated());
        assert!(RequesterContext::anonymous().with_admin(true).is_authenticated());
        assert!(RequesterContext::anonymous()
            .with_tenant("t1")
            .unwrap()
            .is_authenticated());
    }

    #[test]
    fn test_has_any_role() {
        let ctx = RequesterContext::new(["member"]);
        assert!(ctx.has_any_role(["admin", "member"]));
        assert!(!ctx.has_any_role(["admin"]));
        assert!(!ctx.has_any_role(Vec::<&str>::new()));
    }

    #[test]
    fn test_serde_defaults() {
        let ctx: RequesterContext = serde_json::from_str(r#"{"roles":["admin"]}"#).unwrap();
        assert!(ctx.has_role("admin"));
        assert!(ctx.tenant().is_none());
        assert!(!ctx.is_admin());
    }
}
