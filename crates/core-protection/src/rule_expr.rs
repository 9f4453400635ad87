//! # Policy Rule Expressions
//!
//! A small policy language and an in-process [`PolicyOracle`] built on it,
//! for deployments that delegate property decisions with `policy:<name>`
//! but do not run a separate policy engine.
//!
//! ## Syntax
//!
//! ```text
//! role:admin
//! role:admin or role:spl_creator
//! (role:member and not is_admin:True) or rule:context_is_admin
//! tenant:team-a and user:alice
//! @        (always)
//! !        (never)
//! ```
//!
//! An empty expression is `@`.
//!
//! ## Policy file
//!
//! ```toml
//! [rules]
//! context_is_admin = "role:admin"
//! spl_reader = "role:spl_role or rule:context_is_admin"
//! ```
//!
//! ## Security
//!
//! - Maximum expression length: 1024 characters
//! - Maximum nesting depth: 32, for parsing and for `rule:` chains (which
//!   also stops reference cycles)

use crate::error::{ConfigurationError, OracleError, ProtectionError, Result};
use crate::oracle::{PolicyOracle, PolicyTarget};
use core_context::RequesterContext;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};
use tracing::debug;

/// Maximum nesting depth of an expression or a `rule:` chain
pub const MAX_EXPR_DEPTH: usize = 32;

/// Maximum length of an expression string
pub const MAX_EXPR_LENGTH: usize = 1024;

/// Parsed policy rule expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleExpr {
    /// `@`
    Always,
    /// `!`
    Never,
    /// `role:<name>`: requester holds the role
    Role(String),
    /// `rule:<name>`: another named rule passes
    Rule(String),
    /// `is_admin:True` / `is_admin:False`
    IsAdmin(bool),
    /// `tenant:<id>`: requester tenant equals the value
    Tenant(String),
    /// `user:<id>`: requester user equals the value
    User(String),
    /// Both operands pass
    And(Box<RuleExpr>, Box<RuleExpr>),
    /// At least one operand passes
    Or(Box<RuleExpr>, Box<RuleExpr>),
    /// Operand fails
    Not(Box<RuleExpr>),
}

impl RuleExpr {
    /// Parse an expression
    ///
    /// # Errors
    ///
    /// * `ConfigurationError::ExpressionTooLong` - input exceeds `MAX_EXPR_LENGTH`
    /// * `ConfigurationError::ExpressionTooDeep` - nesting exceeds `MAX_EXPR_DEPTH`
    /// * `ConfigurationError::InvalidExpression` - syntax error
    pub fn parse(input: &str) -> Result<Self> {
        if input.len() > MAX_EXPR_LENGTH {
            return Err(ConfigurationError::ExpressionTooLong {
                max: MAX_EXPR_LENGTH,
                length: input.len(),
            }
            .into());
        }

        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Ok(RuleExpr::Always);
        }

        let mut parser = Parser::new(&tokens);
        let expr = parser.parse_or(0)?;
        match parser.current() {
            None => Ok(expr),
            Some(token) => Err(invalid(format!("unexpected trailing {:?}", token))),
        }
    }

    /// Evaluate against `requester`, resolving `rule:` references via `lookup`
    ///
    /// `depth` counts `rule:` hops only. Nesting within one expression is
    /// already bounded by [`RuleExpr::parse`].
    ///
    /// # Errors
    ///
    /// * `OracleError::UnknownRule` - a referenced rule does not exist
    /// * `OracleError::Internal` - `rule:` chain deeper than `MAX_EXPR_DEPTH`
    pub fn evaluate<'a, F>(
        &'a self,
        requester: &RequesterContext,
        lookup: &F,
        depth: usize,
    ) -> core::result::Result<bool, OracleError>
    where
        F: Fn(&str) -> Option<&'a RuleExpr>,
    {
        if depth > MAX_EXPR_DEPTH {
            return Err(OracleError::Internal(format!(
                "policy rule chain exceeds depth {}",
                MAX_EXPR_DEPTH
            )));
        }

        match self {
            RuleExpr::Always => Ok(true),
            RuleExpr::Never => Ok(false),
            RuleExpr::Role(role) => Ok(requester.has_role(role)),
            RuleExpr::IsAdmin(expected) => Ok(requester.is_admin() == *expected),
            RuleExpr::Tenant(tenant) => Ok(requester.tenant() == Some(tenant.as_str())),
            RuleExpr::User(user) => Ok(requester.user() == Some(user.as_str())),
            RuleExpr::Rule(name) => match lookup(name) {
                Some(expr) => expr.evaluate(requester, lookup, depth + 1),
                None => Err(OracleError::UnknownRule(name.clone())),
            },
            RuleExpr::And(left, right) => {
                if !left.evaluate(requester, lookup, depth)? {
                    return Ok(false);
                }
                right.evaluate(requester, lookup, depth)
            }
            RuleExpr::Or(left, right) => {
                if left.evaluate(requester, lookup, depth)? {
                    return Ok(true);
                }
                right.evaluate(requester, lookup, depth)
            }
            RuleExpr::Not(inner) => Ok(!inner.evaluate(requester, lookup, depth)?),
        }
    }
}

fn invalid(msg: impl Into<String>) -> ProtectionError {
    ConfigurationError::InvalidExpression(msg.into()).into()
}

// ===== TOKENIZER =====

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    And,
    Or,
    Not,
    Always,
    Never,
    LeftParen,
    RightParen,
    Check { kind: String, value: String },
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&ch) = chars.peek() {
        match ch {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                tokens.push(Token::LeftParen);
                chars.next();
            }
            ')' => {
                tokens.push(Token::RightParen);
                chars.next();
            }
            _ => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_whitespace() || c == '(' || c == ')' {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                tokens.push(word_token(word)?);
            }
        }
    }

    Ok(tokens)
}

fn word_token(word: String) -> Result<Token> {
    match word.as_str() {
        "and" => return Ok(Token::And),
        "or" => return Ok(Token::Or),
        "not" => return Ok(Token::Not),
        "@" => return Ok(Token::Always),
        "!" => return Ok(Token::Never),
        _ => {}
    }

    match word.split_once(':') {
        Some((kind, value)) if !kind.is_empty() && !value.is_empty() => Ok(Token::Check {
            kind: kind.to_string(),
            value: value.to_string(),
        }),
        _ => Err(invalid(format!("expected kind:value, got {:?}", word))),
    }
}

// ===== PARSER =====

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        self.pos += 1;
        token
    }

    fn guard(depth: usize) -> Result<()> {
        if depth > MAX_EXPR_DEPTH {
            return Err(ConfigurationError::ExpressionTooDeep {
                max: MAX_EXPR_DEPTH,
            }
            .into());
        }
        Ok(())
    }

    // or ::= and ("or" and)*
    fn parse_or(&mut self, depth: usize) -> Result<RuleExpr> {
        Self::guard(depth)?;
        let mut left = self.parse_and(depth)?;
        while matches!(self.current(), Some(Token::Or)) {
            self.advance();
            let right = self.parse_and(depth)?;
            left = RuleExpr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // and ::= not ("and" not)*
    fn parse_and(&mut self, depth: usize) -> Result<RuleExpr> {
        let mut left = self.parse_not(depth)?;
        while matches!(self.current(), Some(Token::And)) {
            self.advance();
            let right = self.parse_not(depth)?;
            left = RuleExpr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    // not ::= "not" not | atom
    fn parse_not(&mut self, depth: usize) -> Result<RuleExpr> {
        if matches!(self.current(), Some(Token::Not)) {
            Self::guard(depth + 1)?;
            self.advance();
            let inner = self.parse_not(depth + 1)?;
            return Ok(RuleExpr::Not(Box::new(inner)));
        }
        self.parse_atom(depth)
    }

    // atom ::= "(" or ")" | "@" | "!" | kind:value
    fn parse_atom(&mut self, depth: usize) -> Result<RuleExpr> {
        match self.advance() {
            Some(Token::LeftParen) => {
                let expr = self.parse_or(depth + 1)?;
                match self.advance() {
                    Some(Token::RightParen) => Ok(expr),
                    Some(other) => Err(invalid(format!("expected ')', got {:?}", other))),
                    None => Err(invalid("expected ')', got end of input")),
                }
            }
            Some(Token::Always) => Ok(RuleExpr::Always),
            Some(Token::Never) => Ok(RuleExpr::Never),
            Some(Token::Check { kind, value }) => check_expr(kind, value),
            Some(other) => Err(invalid(format!("unexpected {:?}", other))),
            None => Err(invalid("unexpected end of input")),
        }
    }
}

fn check_expr(kind: &str, value: &str) -> Result<RuleExpr> {
    match kind {
        "role" => Ok(RuleExpr::Role(value.to_string())),
        "rule" => Ok(RuleExpr::Rule(value.to_string())),
        "tenant" => Ok(RuleExpr::Tenant(value.to_string())),
        "user" => Ok(RuleExpr::User(value.to_string())),
        "is_admin" => match value {
            "True" | "true" => Ok(RuleExpr::IsAdmin(true)),
            "False" | "false" => Ok(RuleExpr::IsAdmin(false)),
            other => Err(invalid(format!("is_admin expects True or False, got {:?}", other))),
        },
        other => Err(invalid(format!("unknown check kind {:?}", other))),
    }
}

// ===== ORACLE =====

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PolicyFile {
    #[serde(default)]
    rules: BTreeMap<String, String>,
}

/// In-process [`PolicyOracle`] evaluating [`RuleExpr`] rules
///
/// Holds two rule tables: the named rules from the policy file, and the
/// delegated rules pushed by the rule-set loader through
/// [`PolicyOracle::load_rules`]. Delegated names shadow file names.
#[derive(Debug, Default)]
pub struct RuleExprOracle {
    named: BTreeMap<String, RuleExpr>,
    delegated: RwLock<BTreeMap<String, RuleExpr>>,
}

impl RuleExprOracle {
    /// Oracle with no named rules
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Oracle from a map of rule name to expression text
    ///
    /// # Errors
    ///
    /// Returns the first expression parse error.
    pub fn from_rules(rules: BTreeMap<String, String>) -> Result<Self> {
        Ok(Self {
            named: parse_all(rules)?,
            delegated: RwLock::new(BTreeMap::new()),
        })
    }

    /// Oracle from policy file contents
    ///
    /// # Errors
    ///
    /// TOML errors and expression parse errors.
    pub fn from_toml(source: &str) -> Result<Self> {
        let file: PolicyFile = toml::from_str(source).map_err(ConfigurationError::from)?;
        Self::from_rules(file.rules)
    }

    /// Oracle from a policy file on disk
    ///
    /// # Errors
    ///
    /// I/O, TOML and expression parse errors.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
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
        let oracle = Self::from_toml(&source)?;
        debug!(path = %path.display(), rules = oracle.named.len(), "loaded policy rules");
        Ok(oracle)
    }

    /// Names of the rules loaded from the policy file
    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.named.keys().map(String::as_str)
    }
}

fn parse_all(rules: BTreeMap<String, String>) -> Result<BTreeMap<String, RuleExpr>> {
    rules
        .into_iter()
        .map(|(name, text)| RuleExpr::parse(&text).map(|expr| (name, expr)))
        .collect()
}

impl PolicyOracle for RuleExprOracle {
    fn enforce(
        &self,
        requester: &RequesterContext,
        rule_name: &str,
        _target: &PolicyTarget,
    ) -> core::result::Result<bool, OracleError> {
        let delegated = self.delegated.read().unwrap_or_else(PoisonError::into_inner);
        let lookup = |name: &str| delegated.get(name).or_else(|| self.named.get(name));

        let expr = lookup(rule_name).ok_or_else(|| OracleError::UnknownRule(rule_name.to_string()))?;
        if expr.evaluate(requester, &lookup, 0)? {
            Ok(true)
        } else {
            Err(OracleError::Forbidden(rule_name.to_string()))
        }
    }

    fn load_rules(&self, rules: BTreeMap<String, String>) -> core::result::Result<(), OracleError> {
        let parsed = parse_all(rules).map_err(|e| OracleError::Internal(e.to_string()))?;
        let mut delegated = self.delegated.write().unwrap_or_else(PoisonError::into_inner);
        *delegated = parsed;
        Ok(())
    }
}
