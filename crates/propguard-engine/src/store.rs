//! In-memory image and membership tables
//!
//! One [`MemoryStore`] backs both the image repository and the member
//! repository, since image visibility depends on memberships. Locks are
//! always taken images first, then members.

use crate::authorization::is_image_visible;
use crate::error::{EngineError, Result};
use crate::image::Image;
use crate::members::ImageMember;
use core_context::RequesterContext;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{SystemTime, UNIX_EPOCH};

/// Shared tables behind the in-memory repositories
#[derive(Debug, Default)]
pub struct MemoryStore {
    images: RwLock<BTreeMap<String, Image>>,
    members: RwLock<Vec<ImageMember>>,
}

impl MemoryStore {
    /// Empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored images, removed ones included
    #[must_use]
    pub fn image_count(&self) -> usize {
        self.images().len()
    }

    pub(crate) fn images(&self) -> RwLockReadGuard<'_, BTreeMap<String, Image>> {
        self.images.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn images_mut(&self) -> RwLockWriteGuard<'_, BTreeMap<String, Image>> {
        self.images.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn members(&self) -> RwLockReadGuard<'_, Vec<ImageMember>> {
        self.members.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn members_mut(&self) -> RwLockWriteGuard<'_, Vec<ImageMember>> {
        self.members.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Live image `id` if `requester` may see it
    pub(crate) fn visible_image(&self, requester: &RequesterContext, id: &str) -> Result<Image> {
        let images = self.images();
        let members = self.members();
        match images.get(id) {
            Some(image) if is_visible(requester, image, &members) => Ok(image.clone()),
            _ => Err(EngineError::NotFound(format!("image {}", id))),
        }
    }
}

/// Membership record of `member_id` on `image_id`
pub(crate) fn find_membership<'a>(
    members: &'a [ImageMember],
    image_id: &str,
    member_id: &str,
) -> Option<&'a ImageMember> {
    members
        .iter()
        .find(|m| m.image_id == image_id && m.member_id == member_id)
}

/// Membership of the requester's tenant on `image`
pub(crate) fn requester_membership<'a>(
    requester: &RequesterContext,
    image: &Image,
    members: &'a [ImageMember],
) -> Option<&'a ImageMember> {
    requester
        .tenant()
        .and_then(|tenant| find_membership(members, &image.id, tenant))
}

/// Not removed and visible to `requester`
pub(crate) fn is_visible(requester: &RequesterContext, image: &Image, members: &[ImageMember]) -> bool {
    !image.is_deleted() && is_image_visible(requester, image, requester_membership(requester, image, members))
}

/// Current time in seconds since the Unix epoch
pub(crate) fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
