//! Image repositories
//!
//! - [`ImageRepository`]: the repository seam
//! - [`InMemoryImageRepo`]: per-request view of a [`MemoryStore`] applying
//!   visibility and mutability checks
//! - [`ProtectedImageRepo`]: authorization proxy that hands out
//!   [`ProtectedImage`]s, read mode for `get`/`list` and create mode for `add`.
//!   `save` only takes back proxies it handed out from `get`/`list`.

use crate::authorization::is_image_mutable;
use crate::error::{EngineError, Result};
use crate::image::{Image, ImageStatus, ProtectedImage};
use crate::store::{is_visible, now, MemoryStore};
use core_context::RequesterContext;
use core_protection::{Action, PropertyAuthorizer};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Sort direction on `created_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    /// Oldest first
    Asc,
    /// Newest first
    #[default]
    Desc,
}

/// Listing parameters
///
/// Results are ordered by `created_at`, ties broken by id. `marker` is the
/// id of the last item of the previous page; `limit` caps the page size.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    /// Start after this id
    #[serde(default)]
    pub marker: Option<String>,
    /// Maximum number of items
    #[serde(default)]
    pub limit: Option<usize>,
    /// Sort direction
    #[serde(default)]
    pub sort_dir: SortDir,
}

impl ListQuery {
    /// Default query: everything, newest first
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start after `marker`
    #[must_use]
    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.marker = Some(marker.into());
        self
    }

    /// Return at most `limit` items
    #[must_use]
    pub const fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Sort direction
    #[must_use]
    pub const fn with_sort_dir(mut self, sort_dir: SortDir) -> Self {
        self.sort_dir = sort_dir;
        self
    }

    /// Sort `items` and cut out the requested page
    ///
    /// # Errors
    ///
    /// `EngineError::NotFound` if the marker is not among `items`.
    pub(crate) fn apply<T, K>(&self, mut items: Vec<T>, key: K) -> Result<Vec<T>>
    where
        K: Fn(&T) -> (u64, &str),
    {
        items.sort_by(|a, b| key(a).cmp(&key(b)));
        if self.sort_dir == SortDir::Desc {
            items.reverse();
        }

        let start = match &self.marker {
            None => 0,
            Some(marker) => {
                let position = items
                    .iter()
                    .position(|item| key(item).1 == marker.as_str())
                    .ok_or_else(|| EngineError::NotFound(format!("marker {}", marker)))?;
                position + 1
            }
        };

        let page = items.into_iter().skip(start);
        Ok(match self.limit {
            Some(limit) => page.take(limit).collect(),
            None => page.collect(),
        })
    }
}

/// Image repository seam
pub trait ImageRepository {
    /// Item handed out and accepted by the repository
    type Item;

    /// Fetch one image
    ///
    /// # Errors
    ///
    /// `EngineError::NotFound` if absent, removed or invisible.
    fn get(&self, id: &str) -> Result<Self::Item>;

    /// List images
    ///
    /// # Errors
    ///
    /// `EngineError::NotFound` on an unknown marker.
    fn list(&self, query: &ListQuery) -> Result<Vec<Self::Item>>;

    /// Store a new image
    ///
    /// # Errors
    ///
    /// `EngineError::Duplicate` if the id is taken.
    fn add(&self, image: Self::Item) -> Result<()>;

    /// Persist changes to an existing image
    ///
    /// # Errors
    ///
    /// `EngineError::NotFound` or `EngineError::Forbidden`.
    fn save(&self, image: Self::Item) -> Result<()>;

    /// Remove an image
    ///
    /// # Errors
    ///
    /// `EngineError::NotFound` or `EngineError::Forbidden`.
    fn remove(&self, image: Self::Item) -> Result<()>;
}

/// Image repository over a [`MemoryStore`], bound to one requester
#[derive(Debug, Clone)]
pub struct InMemoryImageRepo {
    store: Arc<MemoryStore>,
    requester: RequesterContext,
}

impl InMemoryImageRepo {
    /// Bind `store` to `requester`
    #[must_use]
    pub const fn new(store: Arc<MemoryStore>, requester: RequesterContext) -> Self {
        Self { store, requester }
    }

    /// Requester this repository acts for
    #[must_use]
    pub const fn requester(&self) -> &RequesterContext {
        &self.requester
    }

    /// Checks shared by `save` and `remove`; returns the stored record
    fn mutable_image(&self, id: &str) -> Result<Image> {
        let stored = self.store.visible_image(&self.requester, id)?;
        if !is_image_mutable(&self.requester, &stored) {
            return Err(EngineError::Forbidden(format!(
                "image {} cannot be modified by this requester",
                id
            )));
        }
        Ok(stored)
    }
}

impl ImageRepository for InMemoryImageRepo {
    type Item = Image;

    fn get(&self, id: &str) -> Result<Image> {
        self.store.visible_image(&self.requester, id)
    }

    fn list(&self, query: &ListQuery) -> Result<Vec<Image>> {
        let visible: Vec<Image> = {
            let images = self.store.images();
            let members = self.store.members();
            images
                .values()
                .filter(|image| is_visible(&self.requester, image, &members))
                .cloned()
                .collect()
        };
        query.apply(visible, |image| (image.created_at, image.id.as_str()))
    }

    fn add(&self, mut image: Image) -> Result<()> {
        let mut images = self.store.images_mut();
        if images.contains_key(&image.id) {
            return Err(EngineError::Duplicate(format!("image {}", image.id)));
        }

        if image.created_at == 0 {
            image.created_at = now();
        }
        image.updated_at = image.created_at;
        debug!(image = %image.id, owner = ?image.owner, "image added");
        images.insert(image.id.clone(), image);
        Ok(())
    }

    fn save(&self, mut image: Image) -> Result<()> {
        let stored = self.mutable_image(&image.id)?;
        image.created_at = stored.created_at;
        image.updated_at = now().max(stored.created_at);
        debug!(image = %image.id, "image saved");
        self.store.images_mut().insert(image.id.clone(), image);
        Ok(())
    }

    fn remove(&self, image: Image) -> Result<()> {
        let mut stored = self.mutable_image(&image.id)?;
        stored.status = ImageStatus::Deleted;
        stored.updated_at = now().max(stored.created_at);
        debug!(image = %stored.id, "image removed");
        self.store.images_mut().insert(stored.id.clone(), stored);
        Ok(())
    }
}

/// Authorization proxy applying property protection to an inner repository
pub struct ProtectedImageRepo<R> {
    inner: R,
    requester: RequesterContext,
    authorizer: Arc<dyn PropertyAuthorizer>,
}

impl<R: fmt::Debug> fmt::Debug for ProtectedImageRepo<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedImageRepo")
            .field("inner", &self.inner)
            .field("requester", &self.requester)
            .finish_non_exhaustive()
    }
}

impl<R> ProtectedImageRepo<R>
where
    R: ImageRepository<Item = Image>,
{
    /// Wrap `inner` for `requester`
    pub fn new(inner: R, requester: RequesterContext, authorizer: Arc<dyn PropertyAuthorizer>) -> Self {
        Self {
            inner,
            requester,
            authorizer,
        }
    }

    /// Create-mode proxy for a new image, ready for [`ImageRepository::add`]
    ///
    /// # Errors
    ///
    /// `EngineError::Protection` if a delegated check fails.
    pub fn new_image(&self, image: Image) -> Result<ProtectedImage> {
        self.wrap(image, Action::Create)
    }

    fn wrap(&self, image: Image, mode: Action) -> Result<ProtectedImage> {
        Ok(ProtectedImage::new(
            image,
            self.requester.clone(),
            Arc::clone(&self.authorizer),
            mode,
        )?)
    }

    /// Inner repository
    pub const fn inner(&self) -> &R {
        &self.inner
    }
}

impl<R> ImageRepository for ProtectedImageRepo<R>
where
    R: ImageRepository<Item = Image>,
{
    type Item = ProtectedImage;

    fn get(&self, id: &str) -> Result<ProtectedImage> {
        self.wrap(self.inner.get(id)?, Action::Read)
    }

    fn list(&self, query: &ListQuery) -> Result<Vec<ProtectedImage>> {
        self.inner
            .list(query)?
            .into_iter()
            .map(|image| self.wrap(image, Action::Read))
            .collect()
    }

    fn add(&self, image: ProtectedImage) -> Result<()> {
        let checked = self.wrap(image.into_image(), Action::Create)?;
        self.inner.add(checked.into_image())
    }

    fn save(&self, image: ProtectedImage) -> Result<()> {
        if !image.is_bound_to(&self.requester, &self.authorizer) {
            return Err(EngineError::Forbidden(format!(
                "image {} was not read through this repository",
                image.id()
            )));
        }
        self.inner.save(image.into_image())
    }

    fn remove(&self, image: ProtectedImage) -> Result<()> {
        self.inner.remove(image.into_image())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_protection::RuleSet;

    fn ids(images: &[Image]) -> Vec<&str> {
        images.iter().map(|i| i.id.as_str()).collect()
    }

    fn seeded() -> InMemoryImageRepo {
        let admin = RequesterContext::anonymous().with_admin(true);
        let repo = InMemoryImageRepo::new(Arc::new(MemoryStore::new()), admin);
        for (id, created_at) in [("a", 10), ("b", 30), ("c", 20), ("d", 20)] {
            repo.add(Image::new(id).with_owner("t1").with_created_at(created_at))
                .unwrap();
        }
        repo
    }

    #[test]
    fn test_list_sorting() {
        let repo = seeded();
        let desc = repo.list(&ListQuery::new()).unwrap();
        assert_eq!(ids(&desc), vec!["b", "d", "c", "a"]);

        let asc = repo
            .list(&ListQuery::new().with_sort_dir(SortDir::Asc))
            .unwrap();
        assert_eq!(ids(&asc), vec!["a", "c", "d", "b"]);
    }

    #[test]
    fn test_list_paging() {
        let repo = seeded();
        let page = repo
            .list(&ListQuery::new().with_marker("d").with_limit(1))
            .unwrap();
        assert_eq!(ids(&page), vec!["c"]);

        let err = repo.list(&ListQuery::new().with_marker("zz")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_duplicate_add() {
        let repo = seeded();
        let err = repo.add(Image::new("a")).unwrap_err();
        assert!(matches!(err, EngineError::Duplicate(_)));
    }

    #[test]
    fn test_save_rejects_proxy_under_other_rules() {
        let rules: Arc<dyn PropertyAuthorizer> = Arc::new(
            core_protection::RuleSetLoader::new()
                .load_str(
                    r#"
["^x_"]
create = "admin"
read = "admin,member"
update = "admin"
delete = "admin"
"#,
                )
                .unwrap(),
        );
        let store = Arc::new(MemoryStore::new());
        let member = RequesterContext::new(["member"]).with_tenant("t1").unwrap();
        InMemoryImageRepo::new(Arc::clone(&store), member.clone())
            .add(Image::new("img").with_owner("t1").with_property("x_a", "orig"))
            .unwrap();
        let repo = ProtectedImageRepo::new(
            InMemoryImageRepo::new(Arc::clone(&store), member.clone()),
            member.clone(),
            Arc::clone(&rules),
        );

        // Same requester and mode, but an unrestricted rule set.
        let stored = repo.inner().get("img").unwrap();
        let mut rewrapped =
            ProtectedImage::new(stored, member, Arc::new(RuleSet::empty()), Action::Read).unwrap();
        assert!(rewrapped.properties_mut().set("x_a", "changed".to_string()).unwrap());

        let err = repo.save(rewrapped).unwrap_err();
        assert!(matches!(err, EngineError::Forbidden(_)));
        assert_eq!(repo.inner().get("img").unwrap().extra_properties["x_a"], "orig");
    }

    #[test]
    fn test_removed_image_not_found() {
        let repo = seeded();
        let image = repo.get("a").unwrap();
        repo.remove(image).unwrap();
        assert!(matches!(repo.get("a"), Err(EngineError::NotFound(_))));
        assert_eq!(repo.list(&ListQuery::new()).unwrap().len(), 3);
    }
}
