//! Policy oracle seam
//!
//! A section may hand an action over to an external policy engine with
//! `policy:<rule-name>`. The engine is modelled by [`PolicyOracle`]; the
//! bookkeeping that ties a rule-set section to an oracle rule lives in
//! [`PolicyDelegations`].
//!
//! Each delegated action is registered under a derived name,
//! `"<pattern>:<action>"`, mapped to `rule:<rule-name>`. All records of one
//! configuration load are pushed to the oracle in a single
//! [`PolicyOracle::load_rules`] call so the oracle never sees half a rule set.

use crate::error::{OracleError, ProtectionError, Result};
use crate::rule::{delegated_rule_name, Action};
use core_context::RequesterContext;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Target attributes handed to the oracle alongside the rule name
pub type PolicyTarget = BTreeMap<String, String>;

/// Target key carrying the property name being checked
pub const TARGET_PROPERTY: &str = "property";

/// External engine that evaluates named policy rules
///
/// Implementations must be safe to share across request threads.
pub trait PolicyOracle: Send + Sync {
    /// Evaluate `rule_name` for `requester`
    ///
    /// Return `Ok(false)` or `Err(OracleError::Forbidden)` to deny. Any other
    /// error is treated as a failure of the enclosing request.
    fn enforce(
        &self,
        requester: &RequesterContext,
        rule_name: &str,
        target: &PolicyTarget,
    ) -> core::result::Result<bool, OracleError>;

    /// Replace the delegated rules known to the oracle
    ///
    /// `rules` maps each derived rule name to its policy expression.
    fn load_rules(&self, rules: BTreeMap<String, String>) -> core::result::Result<(), OracleError>;
}

/// One `policy:` indirection found while loading a rule file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegationRecord {
    /// Source text of the section pattern
    pub pattern: String,
    /// Delegated action
    pub action: Action,
    /// Name of the policy rule that decides
    pub policy_rule: String,
}

impl DelegationRecord {
    /// Derived oracle rule name
    #[must_use]
    pub fn rule_name(&self) -> String {
        delegated_rule_name(&self.pattern, self.action)
    }

    /// Oracle expression the derived rule resolves to
    #[must_use]
    pub fn expression(&self) -> String {
        format!("rule:{}", self.policy_rule)
    }
}

/// Accumulated delegation records of one rule set
#[derive(Debug, Clone, Default)]
pub struct PolicyDelegations {
    records: Vec<DelegationRecord>,
}

impl PolicyDelegations {
    /// Create an empty record list
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a delegation
    pub fn register(
        &mut self,
        pattern_text: impl Into<String>,
        action: Action,
        policy_rule: impl Into<String>,
    ) {
        let record = DelegationRecord {
            pattern: pattern_text.into(),
            action,
            policy_rule: policy_rule.into(),
        };
        debug!(
            rule = %record.rule_name(),
            policy_rule = %record.policy_rule,
            "registered policy delegation"
        );
        self.records.push(record);
    }

    /// Recorded delegations in registration order
    #[must_use]
    pub fn records(&self) -> &[DelegationRecord] {
        &self.records
    }

    /// Number of recorded delegations
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True if nothing was delegated
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Bulk mapping pushed to the oracle
    #[must_use]
    pub fn bulk_rules(&self) -> BTreeMap<String, String> {
        self.records
            .iter()
            .map(|r| (r.rule_name(), r.expression()))
            .collect()
    }

    /// Push every record to `oracle` in one update
    ///
    /// # Errors
    ///
    /// Returns `ProtectionError::Oracle` if the oracle rejects the update.
    pub fn reload(&self, oracle: &dyn PolicyOracle) -> Result<()> {
        oracle.load_rules(self.bulk_rules()).map_err(|e| {
            warn!(error = %e, "policy oracle rejected delegated rules");
            ProtectionError::Oracle(e)
        })
    }

    /// Ask `oracle` whether `requester` may perform the delegated action
    ///
    /// A denial (`Ok(false)` or `OracleError::Forbidden`) yields `Ok(false)`.
    ///
    /// # Errors
    ///
    /// Any other oracle error is returned as `ProtectionError::Oracle`.
    pub fn evaluate(
        &self,
        oracle: &dyn PolicyOracle,
        pattern_text: &str,
        action: Action,
        requester: &RequesterContext,
        target: &PolicyTarget,
    ) -> Result<bool> {
        let rule_name = delegated_rule_name(pattern_text, action);
        match oracle.enforce(requester, &rule_name, target) {
            Ok(verdict) => Ok(verdict),
            Err(OracleError::Forbidden(reason)) => {
                debug!(rule = %rule_name, %reason, "policy oracle denied");
                Ok(false)
            }
            Err(e) => {
                warn!(rule = %rule_name, error = %e, "policy oracle failed");
                Err(ProtectionError::Oracle(e))
            }
        }
    }
}
