//! Rule definitions
//!
//! This module provides the core domain types of property protection:
//! - `Action`: the four CRUD operations a rule governs
//! - `Permission`: who may perform one action (role list or policy delegation)
//! - `Permissions`: the four permissions of one section
//! - `Rule`: a compiled property-name pattern plus its permissions
//!
//! ## Security Constraints
//!
//! - `MAX_PATTERN_LENGTH` (256): maximum pattern length
//! - `REGEX_SIZE_LIMIT`: compiled program size cap for each pattern

use crate::error::{ConfigurationError, UnknownAction};
use crate::{MAX_PATTERN_LENGTH, POLICY_PREFIX, REGEX_SIZE_LIMIT};
use core::fmt;
use core::str::FromStr;
use core_context::RequesterContext;
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

/// Action that can be performed on a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Add a property that does not exist yet
    Create,
    /// See a property and its value
    Read,
    /// Change the value of an existing property
    Update,
    /// Remove a property
    Delete,
}

impl Action {
    /// All actions in configuration order
    pub const ALL: [Action; 4] = [Action::Create, Action::Read, Action::Update, Action::Delete];

    /// Configuration key for this action
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Read => "read",
            Action::Update => "update",
            Action::Delete => "delete",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Action::Create),
            "read" => Ok(Action::Read),
            "update" => Ok(Action::Update),
            "delete" => Ok(Action::Delete),
            other => Err(UnknownAction(other.to_string())),
        }
    }
}

/// Who may perform one action on matching properties
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Permission {
    /// Any of these roles grants the action. Empty means nobody.
    Roles(Vec<String>),
    /// The decision is delegated to the named policy rule
    Policy(String),
}

impl Permission {
    /// Parse a configuration value
    ///
    /// `policy:<name>` becomes a delegation; anything else is a
    /// comma-separated role list whose entries are trimmed, with blank
    /// entries dropped.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(rule) = raw.strip_prefix(POLICY_PREFIX) {
            return Permission::Policy(rule.trim().to_string());
        }

        Permission::Roles(
            raw.split(',')
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// No role is permitted
    #[must_use]
    pub const fn deny_all() -> Self {
        Permission::Roles(Vec::new())
    }

    /// Policy rule name if this is a delegation
    #[must_use]
    pub fn policy_rule(&self) -> Option<&str> {
        match self {
            Permission::Policy(rule) => Some(rule),
            Permission::Roles(_) => None,
        }
    }

    /// True if one of the requester's roles appears in the role list.
    /// Always false for a delegation; those are decided by the oracle.
    #[must_use]
    pub fn grants(&self, requester: &RequesterContext) -> bool {
        match self {
            Permission::Roles(roles) => roles.iter().any(|r| requester.has_role(r)),
            Permission::Policy(_) => false,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Permission::Roles(roles) if roles.is_empty() => f.write_str("(nobody)"),
            Permission::Roles(roles) => f.write_str(&roles.join(",")),
            Permission::Policy(rule) => write!(f, "{}{}", POLICY_PREFIX, rule),
        }
    }
}

/// The four permissions of a section
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Permissions {
    /// Create permission
    pub create: Permission,
    /// Read permission
    pub read: Permission,
    /// Update permission
    pub update: Permission,
    /// Delete permission
    pub delete: Permission,
}

impl Permissions {
    /// Same permission for every action
    #[must_use]
    pub fn uniform(permission: Permission) -> Self {
        Self {
            create: permission.clone(),
            read: permission.clone(),
            update: permission.clone(),
            delete: permission,
        }
    }

    /// Permission for one action
    #[must_use]
    pub const fn get(&self, action: Action) -> &Permission {
        match action {
            Action::Create => &self.create,
            Action::Read => &self.read,
            Action::Update => &self.update,
            Action::Delete => &self.delete,
        }
    }

    /// Iterate `(action, permission)` pairs in configuration order
    pub fn iter(&self) -> impl Iterator<Item = (Action, &Permission)> {
        Action::ALL.into_iter().map(move |a| (a, self.get(a)))
    }
}

/// A compiled property pattern with its permissions
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Regex,
    permissions: Permissions,
}

impl Rule {
    /// Compile a rule
    ///
    /// # Errors
    ///
    /// - `ConfigurationError::PatternTooLong` if the pattern exceeds `MAX_PATTERN_LENGTH`
    /// - `ConfigurationError::InvalidPattern` if the pattern does not compile
    pub fn new(pattern: &str, permissions: Permissions) -> Result<Self, ConfigurationError> {
        if pattern.len() > MAX_PATTERN_LENGTH {
            return Err(ConfigurationError::PatternTooLong {
                max: MAX_PATTERN_LENGTH,
                length: pattern.len(),
            });
        }

        let compiled = RegexBuilder::new(pattern)
            .size_limit(REGEX_SIZE_LIMIT)
            .build()
            .map_err(|source| ConfigurationError::InvalidPattern {
                pattern: pattern.to_string(),
                source,
            })?;

        Ok(Self {
            pattern: compiled,
            permissions,
        })
    }

    /// Source text of the pattern
    #[must_use]
    pub fn pattern_text(&self) -> &str {
        self.pattern.as_str()
    }

    /// Unanchored search of the pattern in `property_name`
    #[must_use]
    pub fn matches(&self, property_name: &str) -> bool {
        self.pattern.is_match(property_name)
    }

    /// Permission configured for `action`
    #[must_use]
    pub const fn permission(&self, action: Action) -> &Permission {
        self.permissions.get(action)
    }

    /// All four permissions
    #[must_use]
    pub const fn permissions(&self) -> &Permissions {
        &self.permissions
    }

    /// Oracle rule name for a delegated action: `"<pattern>:<action>"`
    #[must_use]
    pub fn delegated_rule_name(&self, action: Action) -> String {
        delegated_rule_name(self.pattern_text(), action)
    }
}

/// Derived oracle rule name for a pattern/action pair
#[must_use]
pub fn delegated_rule_name(pattern_text: &str, action: Action) -> String {
    format!("{}:{}", pattern_text, action)
}
