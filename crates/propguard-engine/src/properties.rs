//! # Enforcing Property Map
//!
//! [`ProtectedProperties`] wraps a property collection and routes every
//! read, write and delete through a [`PropertyAuthorizer`] before the
//! backing collection is touched.
//!
//! ## Operation modes
//!
//! A map is opened either to read existing properties ([`Action::Read`]) or
//! to create new ones ([`Action::Create`]). Any other mode is `Forbidden`:
//! update and delete only make sense on properties first obtained through
//! one of those two paths.
//!
//! - Read mode: entries failing the `read` check are hidden. They stay in
//!   the backing collection and are handed back unchanged by
//!   [`ProtectedProperties::into_inner`].
//! - Create mode: entries failing the `create` check are discarded from the
//!   backing collection.
//!
//! ## Protect by omission
//!
//! A hidden property is reported as `KeyNotFound`, exactly like an absent
//! one. Unauthorized `set` and `delete` calls do nothing and return
//! `Ok(false)`.

use core_context::RequesterContext;
use core_protection::{Action, PropertyAuthorizer, ProtectionError, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Backing property collection
pub trait PropertyStore {
    /// Value type
    type Value;

    /// All keys, visible or not
    fn keys(&self) -> Vec<String>;

    /// Value for `key`
    fn get(&self, key: &str) -> Option<&Self::Value>;

    /// Insert or replace `key`
    fn insert(&mut self, key: String, value: Self::Value);

    /// Remove `key`
    fn remove(&mut self, key: &str) -> Option<Self::Value>;
}

impl<V> PropertyStore for BTreeMap<String, V> {
    type Value = V;

    fn keys(&self) -> Vec<String> {
        BTreeMap::keys(self).cloned().collect()
    }

    fn get(&self, key: &str) -> Option<&V> {
        BTreeMap::get(self, key)
    }

    fn insert(&mut self, key: String, value: V) {
        BTreeMap::insert(self, key, value);
    }

    fn remove(&mut self, key: &str) -> Option<V> {
        BTreeMap::remove(self, key)
    }
}

impl<V> PropertyStore for HashMap<String, V> {
    type Value = V;

    fn keys(&self) -> Vec<String> {
        HashMap::keys(self).cloned().collect()
    }

    fn get(&self, key: &str) -> Option<&V> {
        HashMap::get(self, key)
    }

    fn insert(&mut self, key: String, value: V) {
        HashMap::insert(self, key, value);
    }

    fn remove(&mut self, key: &str) -> Option<V> {
        HashMap::remove(self, key)
    }
}

/// Request-scoped property map enforcing a rule set
///
/// # Example
///
/// ```
/// use core_context::RequesterContext;
/// use core_protection::{Action, PropertyAuthorizer, RuleSetLoader};
/// use propguard_engine::ProtectedProperties;
/// use std::collections::BTreeMap;
/// use std::sync::Arc;
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
/// let authorizer: Arc<dyn PropertyAuthorizer> = Arc::new(rules);
///
/// let mut props = ProtectedProperties::new(
///     RequesterContext::new(["member"]),
///     BTreeMap::<String, String>::new(),
///     authorizer,
///     Action::Read,
/// )
/// .unwrap();
///
/// // member may not create x_note: silently dropped
/// assert!(!props.set("x_note", "v".to_string()).unwrap());
/// assert!(props.get("x_note").is_err());
/// ```
pub struct ProtectedProperties<S: PropertyStore> {
    store: S,
    visible: BTreeSet<String>,
    requester: RequesterContext,
    authorizer: Arc<dyn PropertyAuthorizer>,
    mode: Action,
}

impl<S> fmt::Debug for ProtectedProperties<S>
where
    S: PropertyStore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedProperties")
            .field("visible", &self.visible)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl<S: PropertyStore> ProtectedProperties<S> {
    /// Wrap `store` for `requester` in the given operation mode
    ///
    /// # Errors
    ///
    /// * `ProtectionError::Forbidden` - `mode` is `Update` or `Delete`
    /// * `ProtectionError::Oracle` - a delegated check failed
    pub fn new(
        requester: RequesterContext,
        mut store: S,
        authorizer: Arc<dyn PropertyAuthorizer>,
        mode: Action,
    ) -> Result<Self> {
        if !matches!(mode, Action::Create | Action::Read) {
            return Err(ProtectionError::Forbidden(format!(
                "properties must be created or read before they can be edited (mode: {})",
                mode
            )));
        }

        let mut visible = BTreeSet::new();
        for key in store.keys() {
            if authorizer.is_allowed(&key, mode, &requester)? {
                visible.insert(key);
            } else if mode == Action::Create {
                debug!(property = %key, "discarding property the requester may not create");
                store.remove(&key);
            }
        }

        Ok(Self {
            store,
            visible,
            requester,
            authorizer,
            mode,
        })
    }

    fn allowed(&self, key: &str, action: Action) -> Result<bool> {
        self.authorizer.is_allowed(key, action, &self.requester)
    }

    /// Value of a visible property
    ///
    /// # Errors
    ///
    /// * `ProtectionError::KeyNotFound` - absent, hidden or not readable
    /// * `ProtectionError::Oracle` - a delegated check failed
    pub fn get(&self, key: &str) -> Result<&S::Value> {
        let not_found = || ProtectionError::KeyNotFound(key.to_string());
        if !self.visible.contains(key) || !self.allowed(key, Action::Read)? {
            return Err(not_found());
        }
        self.store.get(key).ok_or_else(not_found)
    }

    /// Update a visible property or create a new one
    ///
    /// A key that `get` can see is updated under the `update` permission;
    /// any other key is created under the `create` permission. Returns
    /// whether the write was applied.
    ///
    /// # Errors
    ///
    /// `ProtectionError::Oracle` if a delegated check failed.
    pub fn set(&mut self, key: impl Into<String>, value: S::Value) -> Result<bool> {
        let key = key.into();
        let action = match self.get(&key) {
            Ok(_) => Action::Update,
            Err(ProtectionError::KeyNotFound(_)) => Action::Create,
            Err(e) => return Err(e),
        };

        if !self.allowed(&key, action)? {
            debug!(property = %key, %action, "write dropped");
            return Ok(false);
        }

        self.visible.insert(key.clone());
        self.store.insert(key, value);
        Ok(true)
    }

    /// Remove a visible property
    ///
    /// Returns `Ok(false)` without touching the collection when the
    /// requester may not delete `key`.
    ///
    /// # Errors
    ///
    /// * `ProtectionError::KeyNotFound` - deletion is permitted but `key` is
    ///   absent or hidden
    /// * `ProtectionError::Oracle` - a delegated check failed
    pub fn delete(&mut self, key: &str) -> Result<bool> {
        if !self.allowed(key, Action::Delete)? {
            debug!(property = key, "delete dropped");
            return Ok(false);
        }
        if !self.visible.remove(key) {
            return Err(ProtectionError::KeyNotFound(key.to_string()));
        }
        self.store.remove(key);
        Ok(true)
    }

    /// True if `get(key)` would succeed
    ///
    /// # Errors
    ///
    /// `ProtectionError::Oracle` if a delegated check failed.
    pub fn contains_key(&self, key: &str) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(ProtectionError::KeyNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Visible keys in sorted order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.visible.iter().map(String::as_str)
    }

    /// Visible entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &S::Value)> {
        self.visible
            .iter()
            .filter_map(|k| self.store.get(k).map(|v| (k.as_str(), v)))
    }

    /// Number of visible entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.visible.len()
    }

    /// True when nothing is visible
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.visible.is_empty()
    }

    /// Operation mode the map was opened in
    #[must_use]
    pub const fn mode(&self) -> Action {
        self.mode
    }

    /// Requester the map enforces for
    #[must_use]
    pub const fn requester(&self) -> &RequesterContext {
        &self.requester
    }

    pub(crate) const fn authorizer(&self) -> &Arc<dyn PropertyAuthorizer> {
        &self.authorizer
    }

    /// Backing collection, hidden entries included
    pub fn into_inner(self) -> S {
        self.store
    }
}
