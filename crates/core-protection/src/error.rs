//! Error types for core-protection
//!
//! Three outcomes matter to callers and are kept apart on purpose:
//! configuration problems (fatal at load), `Forbidden` (an enforcement
//! context that must not exist), and `KeyNotFound` (a protected or absent
//! property, deliberately indistinguishable). Oracle failures other than a
//! denial travel as [`OracleError`] and are never turned into a verdict.

use crate::rule::Action;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for protection operations
pub type Result<T> = std::result::Result<T, ProtectionError>;

/// Errors raised by the rule engine and the enforcing proxies
#[derive(Error, Debug)]
pub enum ProtectionError {
    /// Malformed or incomplete rule configuration
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Operation not permitted in this enforcement context
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Property is absent or not visible to the requester
    #[error("Property not found: {0}")]
    KeyNotFound(String),

    /// Policy oracle failed for a reason other than denial
    #[error("Policy oracle failure: {0}")]
    Oracle(#[from] OracleError),
}

/// Reasons a rule file or policy file cannot be loaded
#[derive(Error, Debug)]
pub enum ConfigurationError {
    /// Rule file does not exist
    #[error("Rule file not found: {}", path.display())]
    FileNotFound {
        /// Path that was looked up
        path: PathBuf,
    },

    /// Rule file exists but could not be read
    #[error("Unable to read {}: {source}", path.display())]
    Unreadable {
        /// Path that failed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// TOML syntax or shape error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// A section omits one of the four action keys
    #[error("Section {section:?} does not define the '{action}' action")]
    MissingAction {
        /// Section (pattern) name
        section: String,
        /// Missing action key
        action: Action,
    },

    /// A permission value could not be interpreted
    #[error("Section {section:?} has an invalid '{action}' value: {reason}")]
    InvalidPermission {
        /// Section (pattern) name
        section: String,
        /// Offending action key
        action: Action,
        /// What is wrong with it
        reason: String,
    },

    /// Section name is not a valid regular expression
    #[error("Invalid property pattern {pattern:?}: {source}")]
    InvalidPattern {
        /// Pattern text
        pattern: String,
        /// Regex compilation error
        #[source]
        source: regex::Error,
    },

    /// Pattern exceeds `MAX_PATTERN_LENGTH`
    #[error("Property pattern exceeds maximum {max} characters (length: {length})")]
    PatternTooLong {
        /// Maximum allowed length
        max: usize,
        /// Actual pattern length
        length: usize,
    },

    /// Rule file exceeds `MAX_RULES`
    #[error("Rule file exceeds maximum {max} sections (attempted: {attempted})")]
    TooManyRules {
        /// Maximum allowed sections
        max: usize,
        /// Sections found
        attempted: usize,
    },

    /// A `policy:` delegation was configured without an oracle to back it
    #[error("Section {section:?} delegates '{action}' to policy rule {rule:?} but no policy oracle is configured")]
    OracleRequired {
        /// Section (pattern) name
        section: String,
        /// Delegated action
        action: Action,
        /// Policy rule name
        rule: String,
    },

    /// Policy rule expression syntax error
    #[error("Invalid policy rule expression: {0}")]
    InvalidExpression(String),

    /// Policy rule expression nests too deeply
    #[error("Policy rule expression exceeds maximum depth of {max}")]
    ExpressionTooDeep {
        /// Maximum allowed depth
        max: usize,
    },

    /// Policy rule expression string is too long
    #[error("Policy rule expression exceeds maximum {max} characters (length: {length})")]
    ExpressionTooLong {
        /// Maximum allowed length
        max: usize,
        /// Actual expression length
        length: usize,
    },
}

/// Errors reported by a policy oracle
///
/// `Forbidden` is the only variant the rule engine folds into a `false`
/// verdict. Every other variant propagates to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// The oracle evaluated the rule and denied access
    #[error("Policy denied access: {0}")]
    Forbidden(String),

    /// The oracle does not know the requested rule
    #[error("Unknown policy rule: {0}")]
    UnknownRule(String),

    /// The oracle could not be reached
    #[error("Policy oracle unavailable: {0}")]
    Unavailable(String),

    /// The oracle failed while evaluating
    #[error("Policy oracle internal error: {0}")]
    Internal(String),
}

/// Error returned when parsing an unknown action name
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown action: {0:?}")]
pub struct UnknownAction(pub String);
