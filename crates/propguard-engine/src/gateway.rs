//! Per-request wiring of repositories and proxies

use crate::members::MemberRepository;
use crate::repo::{InMemoryImageRepo, ProtectedImageRepo};
use crate::store::MemoryStore;
use core_context::RequesterContext;
use core_protection::{PropertyAuthorizer, RuleSet, SharedRuleSet};
use std::sync::Arc;

/// Hands out repositories bound to one requester
///
/// Each `image_repo` call takes a snapshot of the active rule set, so one
/// request is evaluated against one rule set even across a reload.
#[derive(Debug, Clone, Default)]
pub struct Gateway {
    store: Arc<MemoryStore>,
    rules: SharedRuleSet,
}

impl Gateway {
    /// Gateway over `store` enforcing `rules`
    #[must_use]
    pub const fn new(store: Arc<MemoryStore>, rules: SharedRuleSet) -> Self {
        Self { store, rules }
    }

    /// Gateway over a fresh store with a fixed rule set
    #[must_use]
    pub fn with_rules(rules: RuleSet) -> Self {
        Self::new(Arc::new(MemoryStore::new()), SharedRuleSet::new(rules))
    }

    /// Protected image repository for `requester`
    #[must_use]
    pub fn image_repo(&self, requester: &RequesterContext) -> ProtectedImageRepo<InMemoryImageRepo> {
        let authorizer: Arc<dyn PropertyAuthorizer> = self.rules.current();
        ProtectedImageRepo::new(
            InMemoryImageRepo::new(Arc::clone(&self.store), requester.clone()),
            requester.clone(),
            authorizer,
        )
    }

    /// Member repository for `requester`
    #[must_use]
    pub fn member_repo(&self, requester: &RequesterContext) -> MemberRepository {
        MemberRepository::new(Arc::clone(&self.store), requester.clone())
    }

    /// Shared rule set handle, for reloads
    #[must_use]
    pub const fn rules(&self) -> &SharedRuleSet {
        &self.rules
    }

    /// Backing store
    #[must_use]
    pub const fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}
