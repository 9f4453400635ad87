// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 P47H Team <https://p47h.com>

//! # core-protection
//!
//! Property protection rule engine: decides which requester roles may
//! create, read, update or delete individual named properties of a resource.
//!
//! This crate provides:
//! - Rule file loading (TOML sections keyed by property-name patterns)
//! - Ordered rule evaluation with OR semantics across matching rules
//! - Delegation of individual actions to a policy oracle (`policy:<name>`)
//! - An in-process oracle built on a small rule-expression language
//! - An atomically replaceable rule set for configuration reloads
//!
//! ## Security
//!
//! - Deny by default: a property no rule grants is inaccessible
//! - Strict limits on rule files to prevent algorithmic DoS
//!   - MAX_RULES = 1024
//!   - MAX_PATTERN_LENGTH = 256
//!   - REGEX_SIZE_LIMIT = 1 MiB compiled program per pattern

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod oracle;
pub mod rule;
pub mod rule_expr;
pub mod rule_set;
pub mod shared;

/// Re-export commonly used types
pub use error::{ConfigurationError, OracleError, ProtectionError, Result, UnknownAction};
pub use loader::{load, RuleSetLoader};
pub use oracle::{DelegationRecord, PolicyDelegations, PolicyOracle, PolicyTarget, TARGET_PROPERTY};
pub use rule::{delegated_rule_name, Action, Permission, Permissions, Rule};
pub use rule_expr::{RuleExpr, RuleExprOracle, MAX_EXPR_DEPTH, MAX_EXPR_LENGTH};
pub use rule_set::{PropertyAuthorizer, RuleSet};
pub use shared::SharedRuleSet;

/// Maximum number of sections in one rule file
pub const MAX_RULES: usize = 1024;

/// Maximum length of a section pattern
pub const MAX_PATTERN_LENGTH: usize = 256;

/// Compiled size limit for one section pattern
pub const REGEX_SIZE_LIMIT: usize = 1 << 20;

/// Prefix marking a permission value as a policy delegation
pub const POLICY_PREFIX: &str = "policy:";
