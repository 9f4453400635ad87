//! Rule file loading
//!
//! A rule file is TOML. Every top-level table is one section whose name is a
//! regular expression matched against property names; tables are evaluated
//! in the order they appear in the file.
//!
//! ```toml
//! ["^x_owner_.*"]
//! create = "admin,member"
//! read = "admin,member"
//! update = "admin"
//! delete = "admin"
//!
//! [".*"]
//! create = ["admin"]
//! read = "policy:context_is_admin"
//! update = ["admin"]
//! delete = []
//! ```
//!
//! ## Strictness
//!
//! Loading is strict: a section missing any of `create`, `read`, `update`
//! or `delete` aborts the load. A key that is present but empty is valid and
//! permits no role. Unknown keys are rejected.

use crate::error::{ConfigurationError, ProtectionError, Result};
use crate::oracle::PolicyOracle;
use crate::rule::{Action, Permission, Permissions, Rule};
use crate::rule_set::RuleSet;
use crate::{MAX_RULES, POLICY_PREFIX};
use indexmap::IndexMap;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Raw section as written in the file (internal use only)
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawSection {
    create: Option<RawPermission>,
    read: Option<RawPermission>,
    update: Option<RawPermission>,
    delete: Option<RawPermission>,
}

/// Either `"a,b"` or `["a", "b"]`
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPermission {
    Text(String),
    List(Vec<String>),
}

impl RawSection {
    fn take(&mut self, action: Action) -> Option<RawPermission> {
        match action {
            Action::Create => self.create.take(),
            Action::Read => self.read.take(),
            Action::Update => self.update.take(),
            Action::Delete => self.delete.take(),
        }
    }
}

/// Loads rule files into [`RuleSet`]s
///
/// # Example
///
/// ```
/// use core_protection::RuleSetLoader;
/// use core_context::RequesterContext;
///
/// let rules = RuleSetLoader::new()
///     .load_str(r#"
/// ["^x_.*$"]
/// create = "admin"
/// read = "admin,member"
/// update = "admin"
/// delete = "admin"
/// "#)
///     .unwrap();
///
/// let member = RequesterContext::new(["member"]);
/// assert!(rules.check("x_note", "read", &member).unwrap());
/// assert!(!rules.check("x_note", "create", &member).unwrap());
/// ```
#[derive(Clone, Default)]
pub struct RuleSetLoader {
    oracle: Option<Arc<dyn PolicyOracle>>,
}

impl std::fmt::Debug for RuleSetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleSetLoader")
            .field("oracle", &self.oracle.is_some())
            .finish()
    }
}

impl RuleSetLoader {
    /// Loader without a policy oracle; `policy:` values are rejected
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Back `policy:` delegations with `oracle`
    #[must_use]
    pub fn with_oracle(mut self, oracle: Arc<dyn PolicyOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Load a rule file from disk
    ///
    /// # Errors
    ///
    /// - `ConfigurationError::FileNotFound` if `path` does not exist
    /// - `ConfigurationError::Unreadable` for other I/O failures
    /// - any error of [`RuleSetLoader::load_str`]
    pub fn load(&self, path: impl AsRef<Path>) -> Result<RuleSet> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                ConfigurationError::FileNotFound {
                    path: path.to_path_buf(),
                }
            } else {
                ConfigurationError::Unreadable {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let rules = self.load_str(&source)?;
        info!(
            path = %path.display(),
            rules = rules.len(),
            delegations = rules.delegations().len(),
            "loaded property protection rules"
        );
        Ok(rules)
    }

    /// Parse rule file contents
    ///
    /// # Errors
    ///
    /// - `ConfigurationError::Toml` on syntax errors or unknown keys
    /// - `ConfigurationError::TooManyRules` past `MAX_RULES` sections
    /// - `ConfigurationError::MissingAction` when a section omits an action
    /// - `ConfigurationError::InvalidPermission` for malformed values
    /// - `ConfigurationError::InvalidPattern` / `PatternTooLong` for bad patterns
    /// - `ConfigurationError::OracleRequired` for `policy:` without an oracle
    /// - `ProtectionError::Oracle` if the oracle rejects the delegated rules
    pub fn load_str(&self, source: &str) -> Result<RuleSet> {
        let sections: IndexMap<String, RawSection> =
            toml::from_str(source).map_err(ConfigurationError::from)?;

        if sections.len() > MAX_RULES {
            return Err(ConfigurationError::TooManyRules {
                max: MAX_RULES,
                attempted: sections.len(),
            }
            .into());
        }
        if sections.is_empty() {
            warn!("rule file defines no sections; property protection is disabled");
        }

        let mut rules = Vec::with_capacity(sections.len());
        for (pattern, raw) in sections {
            let permissions = compile_permissions(&pattern, raw)?;
            debug!(
                %pattern,
                create = %permissions.create,
                read = %permissions.read,
                update = %permissions.update,
                delete = %permissions.delete,
                "compiled protection section"
            );
            rules.push(Rule::new(&pattern, permissions)?);
        }

        match &self.oracle {
            Some(oracle) => RuleSet::with_oracle(rules, Arc::clone(oracle)),
            None => RuleSet::new(rules),
        }
    }
}

/// Load a rule file without a policy oracle
///
/// # Errors
///
/// See [`RuleSetLoader::load`].
pub fn load(path: impl AsRef<Path>) -> Result<RuleSet> {
    RuleSetLoader::new().load(path)
}

fn compile_permissions(section: &str, mut raw: RawSection) -> Result<Permissions> {
    let mut next = |action: Action| -> Result<Permission> {
        let value = raw.take(action).ok_or_else(|| {
            warn!(section, %action, "section is missing an action key");
            ProtectionError::from(ConfigurationError::MissingAction {
                section: section.to_string(),
                action,
            })
        })?;
        compile_permission(section, action, value)
    };

    Ok(Permissions {
        create: next(Action::Create)?,
        read: next(Action::Read)?,
        update: next(Action::Update)?,
        delete: next(Action::Delete)?,
    })
}

fn compile_permission(section: &str, action: Action, raw: RawPermission) -> Result<Permission> {
    let invalid = |reason: &str| {
        ProtectionError::from(ConfigurationError::InvalidPermission {
            section: section.to_string(),
            action,
            reason: reason.to_string(),
        })
    };

    // Both forms reduce to one list of comma-separated entries.
    let entries: Vec<&str> = match &raw {
        RawPermission::Text(text) => text.split(',').collect(),
        RawPermission::List(items) => items.iter().flat_map(|item| item.split(',')).collect(),
    };
    let entries: Vec<&str> = entries
        .into_iter()
        .map(str::trim)
        .filter(|e| !e.is_empty())
        .collect();

    let delegated = entries.iter().filter(|e| e.starts_with(POLICY_PREFIX)).count();
    let permission = match (delegated, entries.len()) {
        (0, _) => Permission::parse(&entries.join(",")),
        (1, 1) => Permission::parse(entries[0]),
        _ => return Err(invalid("a policy reference cannot be combined with roles")),
    };

    if let Permission::Policy(rule) = &permission {
        if rule.is_empty() {
            return Err(invalid("empty policy rule name"));
        }
    }
    Ok(permission)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_SECTION: &str = r#"
["^x_.*$"]
create = "admin"
read = "admin,member"
update = "admin"
delete = "admin"
"#;

    #[test]
    fn test_load_str_compiles_sections_in_order() {
        let source = format!(
            "{}\n{}",
            FULL_SECTION,
            r#"
[".*"]
create = []
read = ["admin", " member "]
update = ""
delete = ""
"#
        );
        let rules = RuleSetLoader::new().load_str(&source).unwrap();
        let patterns: Vec<_> = rules.rules().iter().map(Rule::pattern_text).collect();
        assert_eq!(patterns, vec!["^x_.*$", ".*"]);
        assert_eq!(
            rules.rules()[1].permission(Action::Read),
            &Permission::Roles(vec!["admin".into(), "member".into()])
        );
        assert_eq!(rules.rules()[1].permission(Action::Create), &Permission::deny_all());
    }

    #[test]
    fn test_missing_action_is_fatal() {
        let source = r#"
["^x_"]
create = "admin"
read = "admin"
update = "admin"
"#;
        let err = RuleSetLoader::new().load_str(source).unwrap_err();
        match err {
            ProtectionError::Configuration(ConfigurationError::MissingAction { section, action }) => {
                assert_eq!(section, "^x_");
                assert_eq!(action, Action::Delete);
            }
            other => panic!("expected MissingAction, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_key_rejected() {
        let source = format!("{}write = \"admin\"\n", FULL_SECTION);
        let err = RuleSetLoader::new().load_str(&source).unwrap_err();
        assert!(matches!(
            err,
            ProtectionError::Configuration(ConfigurationError::Toml(_))
        ));
    }

    #[test]
    fn test_mixed_policy_list_rejected() {
        let source = r#"
["^x_"]
create = ["admin", "policy:creator"]
read = ""
update = ""
delete = ""
"#;
        let err = RuleSetLoader::new().load_str(source).unwrap_err();
        assert!(matches!(
            err,
            ProtectionError::Configuration(ConfigurationError::InvalidPermission { .. })
        ));
    }

    #[test]
    fn test_empty_policy_name_rejected() {
        let source = r#"
["^x_"]
create = "policy:"
read = ""
update = ""
delete = ""
"#;
        let err = RuleSetLoader::new().load_str(source).unwrap_err();
        assert!(matches!(
            err,
            ProtectionError::Configuration(ConfigurationError::InvalidPermission { .. })
        ));
    }

    #[test]
    fn test_empty_file_disables_protection() {
        let rules = RuleSetLoader::new().load_str("").unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_too_many_rules() {
        let mut source = String::new();
        for i in 0..=MAX_RULES {
            source.push_str(&format!(
                "[\"^p{}$\"]\ncreate = \"\"\nread = \"\"\nupdate = \"\"\ndelete = \"\"\n",
                i
            ));
        }
        let err = RuleSetLoader::new().load_str(&source).unwrap_err();
        assert!(matches!(
            err,
            ProtectionError::Configuration(ConfigurationError::TooManyRules { .. })
        ));
    }

    #[test]
    fn test_policy_mixed_with_roles_rejected_in_both_forms() {
        let loader = RuleSetLoader::new();
        for read in [
            r#""admin, policy:x""#,
            r#""policy:x,admin""#,
            r#"["admin", "policy:x"]"#,
            r#"["admin,policy:x"]"#,
        ] {
            let source = format!(
                "[\"^x_\"]\ncreate = \"admin\"\nread = {}\nupdate = \"admin\"\ndelete = \"admin\"\n",
                read
            );
            let err = loader.load_str(&source).unwrap_err();
            assert!(
                matches!(
                    err,
                    ProtectionError::Configuration(ConfigurationError::InvalidPermission {
                        action: Action::Read,
                        ..
                    })
                ),
                "read = {} gave {:?}",
                read,
                err
            );
        }
    }
}
