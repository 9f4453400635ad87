//! Image memberships
//!
//! A membership shares a private image with another tenant. Members see the
//! image; members whose record carries `can_share` may share it onwards.

use crate::authorization::is_image_sharable;
use crate::error::{EngineError, Result};
use crate::image::Image;
use crate::repo::ListQuery;
use crate::store::{find_membership, now, requester_membership, MemoryStore};
use core_context::RequesterContext;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Sharing of one image with one tenant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageMember {
    /// Shared image
    pub image_id: String,
    /// Tenant the image is shared with
    pub member_id: String,
    /// Member may share the image onwards
    #[serde(default)]
    pub can_share: bool,
    /// Creation time, seconds since the Unix epoch
    #[serde(default)]
    pub created_at: u64,
    /// Last update time, seconds since the Unix epoch
    #[serde(default)]
    pub updated_at: u64,
    /// Soft-deleted
    #[serde(default)]
    pub deleted: bool,
}

impl ImageMember {
    /// Live membership of `member_id` on `image_id`
    #[must_use]
    pub fn new(image_id: impl Into<String>, member_id: impl Into<String>, can_share: bool) -> Self {
        Self {
            image_id: image_id.into(),
            member_id: member_id.into(),
            can_share,
            created_at: 0,
            updated_at: 0,
            deleted: false,
        }
    }
}

/// Membership repository over a [`MemoryStore`], bound to one requester
#[derive(Debug, Clone)]
pub struct MemberRepository {
    store: Arc<MemoryStore>,
    requester: RequesterContext,
}

impl MemberRepository {
    /// Bind `store` to `requester`
    #[must_use]
    pub const fn new(store: Arc<MemoryStore>, requester: RequesterContext) -> Self {
        Self { store, requester }
    }

    fn require_authenticated(&self) -> Result<()> {
        if self.requester.is_authenticated() {
            Ok(())
        } else {
            Err(EngineError::Unauthorized("no authenticated tenant".to_string()))
        }
    }

    /// Visible image that the requester may share
    fn sharable_image(&self, image_id: &str) -> Result<Image> {
        let image = self.store.visible_image(&self.requester, image_id)?;
        let members = self.store.members();
        let membership = requester_membership(&self.requester, &image, &members);
        if !is_image_sharable(&self.requester, &image, membership) {
            return Err(EngineError::Forbidden(format!(
                "image {} cannot be shared by this requester",
                image_id
            )));
        }
        Ok(image)
    }

    /// Share `image_id` with `member_id`
    ///
    /// # Errors
    ///
    /// * `EngineError::Unauthorized` - requester has no tenant and is not admin
    /// * `EngineError::NotFound` - image absent or invisible
    /// * `EngineError::Forbidden` - requester may not share the image
    /// * `EngineError::Duplicate` - the tenant already is a member
    pub fn add(&self, image_id: &str, member_id: &str, can_share: bool) -> Result<ImageMember> {
        self.require_authenticated()?;
        self.sharable_image(image_id)?;

        let mut members = self.store.members_mut();
        let existing = members
            .iter()
            .position(|m| m.image_id == image_id && m.member_id == member_id);

        let mut member = ImageMember::new(image_id, member_id, can_share);
        member.created_at = now();
        member.updated_at = member.created_at;

        match existing {
            Some(index) if !members[index].deleted => {
                return Err(EngineError::Duplicate(format!(
                    "member {} of image {}",
                    member_id, image_id
                )));
            }
            Some(index) => members[index] = member.clone(),
            None => members.push(member.clone()),
        }

        debug!(image = image_id, member = member_id, can_share, "image shared");
        Ok(member)
    }

    /// Membership of `member_id` on `image_id`
    ///
    /// # Errors
    ///
    /// `EngineError::NotFound` if the image is invisible or the tenant is
    /// not a member.
    pub fn get(&self, image_id: &str, member_id: &str) -> Result<ImageMember> {
        self.store.visible_image(&self.requester, image_id)?;
        let members = self.store.members();
        find_membership(&members, image_id, member_id)
            .filter(|m| !m.deleted)
            .cloned()
            .ok_or_else(|| EngineError::NotFound(format!("member {} of image {}", member_id, image_id)))
    }

    /// Live memberships of `image_id`
    ///
    /// # Errors
    ///
    /// `EngineError::NotFound` if the image is invisible or the marker
    /// unknown.
    pub fn list(&self, image_id: &str, query: &ListQuery) -> Result<Vec<ImageMember>> {
        self.store.visible_image(&self.requester, image_id)?;
        let live: Vec<ImageMember> = self
            .store
            .members()
            .iter()
            .filter(|m| m.image_id == image_id && !m.deleted)
            .cloned()
            .collect();
        query.apply(live, |m| (m.created_at, m.member_id.as_str()))
    }

    /// Stop sharing `image_id` with `member_id`
    ///
    /// # Errors
    ///
    /// Same as [`MemberRepository::add`], with `NotFound` for a tenant that
    /// is not a member.
    pub fn remove(&self, image_id: &str, member_id: &str) -> Result<()> {
        self.require_authenticated()?;
        self.sharable_image(image_id)?;

        let mut members = self.store.members_mut();
        let member = members
            .iter_mut()
            .find(|m| m.image_id == image_id && m.member_id == member_id && !m.deleted)
            .ok_or_else(|| EngineError::NotFound(format!("member {} of image {}", member_id, image_id)))?;
        member.deleted = true;
        member.updated_at = now().max(member.created_at);

        debug!(image = image_id, member = member_id, "image unshared");
        Ok(())
    }
}
