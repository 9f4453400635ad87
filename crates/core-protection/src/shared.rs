//! Reloadable rule set handle
//!
//! A [`RuleSet`] is immutable. Reloading configuration builds a new one and
//! swaps the `Arc` inside [`SharedRuleSet`]; requests that already took a
//! snapshot keep evaluating against the old rules until they finish.

use crate::error::Result;
use crate::loader::RuleSetLoader;
use crate::rule::Action;
use crate::rule_set::{PropertyAuthorizer, RuleSet};
use core_context::RequesterContext;
use std::path::Path;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{info, warn};

/// Thread-safe, swappable reference to the active rule set
#[derive(Debug, Clone, Default)]
pub struct SharedRuleSet {
    inner: Arc<RwLock<Arc<RuleSet>>>,
}

impl SharedRuleSet {
    /// Wrap an initial rule set
    #[must_use]
    pub fn new(rules: RuleSet) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(rules))),
        }
    }

    /// Snapshot of the active rule set
    #[must_use]
    pub fn current(&self) -> Arc<RuleSet> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Install `rules`, returning the previous rule set
    pub fn replace(&self, rules: RuleSet) -> Arc<RuleSet> {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, Arc::new(rules))
    }

    /// Reload from `path` with `loader`
    ///
    /// On failure the active rule set is left untouched.
    ///
    /// # Errors
    ///
    /// Any error of [`RuleSetLoader::load`].
    pub fn reload(&self, loader: &RuleSetLoader, path: impl AsRef<Path>) -> Result<Arc<RuleSet>> {
        let path = path.as_ref();
        match loader.load(path) {
            Ok(rules) => {
                let count = rules.len();
                let previous = self.replace(rules);
                info!(path = %path.display(), rules = count, previous = previous.len(), "rule set reloaded");
                Ok(self.current())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "rule set reload failed; keeping active rules");
                Err(e)
            }
        }
    }
}

impl From<RuleSet> for SharedRuleSet {
    fn from(rules: RuleSet) -> Self {
        Self::new(rules)
    }
}

impl PropertyAuthorizer for SharedRuleSet {
    fn is_allowed(
        &self,
        property_name: &str,
        action: Action,
        requester: &RequesterContext,
    ) -> Result<bool> {
        self.current().is_allowed(property_name, action, requester)
    }
}
