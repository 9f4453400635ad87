//! Property protection decisions
//!
//! [`RuleSet`] answers one question: may this requester perform this action
//! on this property name?
//!
//! ## Decision order
//!
//! 1. No rules at all: allow. An absent rule file means no protection.
//! 2. Unknown action name: deny.
//! 3. Scan rules in file order. For each rule whose pattern is found in the
//!    property name:
//!    - a `policy:` delegation returns the oracle's verdict immediately;
//!    - a role list grants if it shares a role with the requester, otherwise
//!      the scan moves on to the next matching rule.
//! 4. Nothing granted: deny.
//!
//! Step 3 is an OR across matching rules, not "first match wins". A
//! property matched by a restrictive rule and a permissive later rule is
//! granted by the later one.

use crate::error::{ConfigurationError, ProtectionError, Result};
use crate::oracle::{PolicyDelegations, PolicyOracle, PolicyTarget, TARGET_PROPERTY};
use crate::rule::{Action, Permission, Rule};
use core_context::RequesterContext;
use std::fmt;
use std::sync::Arc;
use tracing::trace;

/// Ordered, immutable collection of compiled rules
///
/// Built once per configuration load. Share it behind an `Arc`; a reload
/// produces a new `RuleSet` instead of mutating this one.
#[derive(Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
    delegations: PolicyDelegations,
    oracle: Option<Arc<dyn PolicyOracle>>,
}

impl fmt::Debug for RuleSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleSet")
            .field("rules", &self.rules)
            .field("delegations", &self.delegations)
            .field("oracle", &self.oracle.as_ref().map(|_| "<dyn PolicyOracle>"))
            .finish()
    }
}

impl RuleSet {
    /// Rule set with no rules: every valid check is allowed
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a rule set from role-list rules only
    ///
    /// # Errors
    ///
    /// Returns `ConfigurationError::OracleRequired` if any rule delegates
    /// to a policy rule; use [`RuleSet::with_oracle`] for those.
    pub fn new(rules: Vec<Rule>) -> Result<Self> {
        for rule in &rules {
            if let Some((action, policy_rule)) = first_delegation(rule) {
                return Err(ConfigurationError::OracleRequired {
                    section: rule.pattern_text().to_string(),
                    action,
                    rule: policy_rule.to_string(),
                }
                .into());
            }
        }

        Ok(Self {
            rules,
            delegations: PolicyDelegations::new(),
            oracle: None,
        })
    }

    /// Build a rule set whose `policy:` delegations are decided by `oracle`
    ///
    /// Every delegation is registered and pushed to the oracle in a single
    /// bulk update before the rule set is returned.
    ///
    /// # Errors
    ///
    /// Returns `ProtectionError::Oracle` if the oracle rejects the update.
    pub fn with_oracle(rules: Vec<Rule>, oracle: Arc<dyn PolicyOracle>) -> Result<Self> {
        let mut delegations = PolicyDelegations::new();
        for rule in &rules {
            for (action, permission) in rule.permissions().iter() {
                if let Permission::Policy(policy_rule) = permission {
                    delegations.register(rule.pattern_text(), action, policy_rule.as_str());
                }
            }
        }
        delegations.reload(oracle.as_ref())?;

        Ok(Self {
            rules,
            delegations,
            oracle: Some(oracle),
        })
    }

    /// Decide `action` (by name) on `property_name` for `requester`
    ///
    /// # Errors
    ///
    /// Returns `ProtectionError::Oracle` when a delegated decision fails for
    /// a reason other than denial.
    pub fn check(
        &self,
        property_name: &str,
        action: &str,
        requester: &RequesterContext,
    ) -> Result<bool> {
        if self.rules.is_empty() {
            return Ok(true);
        }

        match action.parse::<Action>() {
            Ok(action) => self.evaluate(property_name, action, requester),
            Err(e) => {
                trace!(property = property_name, error = %e, "unknown action denied");
                Ok(false)
            }
        }
    }

    /// Decide a typed `action` on `property_name` for `requester`
    ///
    /// # Errors
    ///
    /// See [`RuleSet::check`].
    pub fn is_allowed(
        &self,
        property_name: &str,
        action: Action,
        requester: &RequesterContext,
    ) -> Result<bool> {
        if self.rules.is_empty() {
            return Ok(true);
        }
        self.evaluate(property_name, action, requester)
    }

    fn evaluate(
        &self,
        property_name: &str,
        action: Action,
        requester: &RequesterContext,
    ) -> Result<bool> {
        for rule in self.matching_rules(property_name) {
            let permission = rule.permission(action);

            if let Permission::Policy(policy_rule) = permission {
                let oracle = self.oracle.as_deref().ok_or_else(|| {
                    ProtectionError::from(ConfigurationError::OracleRequired {
                        section: rule.pattern_text().to_string(),
                        action,
                        rule: policy_rule.clone(),
                    })
                })?;
                let mut target = PolicyTarget::new();
                target.insert(TARGET_PROPERTY.to_string(), property_name.to_string());

                let verdict = self.delegations.evaluate(
                    oracle,
                    rule.pattern_text(),
                    action,
                    requester,
                    &target,
                )?;
                trace!(
                    property = property_name,
                    %action,
                    pattern = rule.pattern_text(),
                    verdict,
                    "delegated decision"
                );
                return Ok(verdict);
            }

            if permission.grants(requester) {
                trace!(
                    property = property_name,
                    %action,
                    pattern = rule.pattern_text(),
                    "granted by role"
                );
                return Ok(true);
            }
        }

        trace!(property = property_name, %action, "no rule granted access");
        Ok(false)
    }

    /// Rules whose pattern is found in `property_name`, in file order
    pub fn matching_rules<'a>(&'a self, property_name: &'a str) -> impl Iterator<Item = &'a Rule> + 'a {
        self.rules.iter().filter(move |r| r.matches(property_name))
    }

    /// Compiled rules in file order
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Delegations registered with the oracle
    #[must_use]
    pub fn delegations(&self) -> &PolicyDelegations {
        &self.delegations
    }

    /// Number of rules
    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no protection is configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

fn first_delegation(rule: &Rule) -> Option<(Action, &str)> {
    rule.permissions()
        .iter()
        .find_map(|(action, p)| p.policy_rule().map(|name| (action, name)))
}

/// Anything that can decide property access (DIP seam for the proxies)
pub trait PropertyAuthorizer: Send + Sync {
    /// Decide `action` on `property_name` for `requester`
    ///
    /// # Errors
    ///
    /// Implementation specific; see [`RuleSet::is_allowed`].
    fn is_allowed(
        &self,
        property_name: &str,
        action: Action,
        requester: &RequesterContext,
    ) -> Result<bool>;
}

impl PropertyAuthorizer for RuleSet {
    fn is_allowed(
        &self,
        property_name: &str,
        action: Action,
        requester: &RequesterContext,
    ) -> Result<bool> {
        RuleSet::is_allowed(self, property_name, action, requester)
    }
}

impl<T: PropertyAuthorizer + ?Sized> PropertyAuthorizer for Arc<T> {
    fn is_allowed(
        &self,
        property_name: &str,
        action: Action,
        requester: &RequesterContext,
    ) -> Result<bool> {
        (**self).is_allowed(property_name, action, requester)
    }
}
