//! Whole-image ownership, visibility and sharing checks
//!
//! These decide access to an image as a whole and sit next to property
//! protection, which only governs individual extra properties. Each check
//! takes the requester's membership on the image, if any, so the functions
//! stay pure.

use crate::image::Image;
use crate::members::ImageMember;
use core_context::RequesterContext;

/// True if `requester` may see `image`
///
/// Admins see everything. Unowned and public images are visible to all.
/// Otherwise the requester's tenant must own the image or hold a live
/// membership on it.
#[must_use]
pub fn is_image_visible(
    requester: &RequesterContext,
    image: &Image,
    membership: Option<&ImageMember>,
) -> bool {
    if requester.is_admin() || image.owner.is_none() || image.is_public() {
        return true;
    }

    match requester.tenant() {
        Some(tenant) if image.owner.as_deref() == Some(tenant) => true,
        Some(_) => membership.is_some_and(|m| !m.deleted),
        None => false,
    }
}

/// True if `requester` may change or remove `image`
#[must_use]
pub fn is_image_mutable(requester: &RequesterContext, image: &Image) -> bool {
    if requester.is_admin() {
        return true;
    }

    match (image.owner.as_deref(), requester.tenant()) {
        (Some(owner), Some(tenant)) => owner == tenant,
        _ => false,
    }
}

/// True if `requester` may share `image` with other tenants
///
/// A requester without a tenant can never share. Admins and the owner can;
/// a member can when its membership carries `can_share`.
#[must_use]
pub fn is_image_sharable(
    requester: &RequesterContext,
    image: &Image,
    membership: Option<&ImageMember>,
) -> bool {
    let Some(tenant) = requester.tenant() else {
        return false;
    };
    if requester.is_admin() || image.owner.as_deref() == Some(tenant) {
        return true;
    }
    membership.is_some_and(|m| !m.deleted && m.can_share)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::Visibility;

    fn tenant(id: &str) -> RequesterContext {
        RequesterContext::new(["member"]).with_tenant(id).unwrap()
    }

    fn private_of(owner: &str) -> Image {
        Image::new("img-1").with_owner(owner)
    }

    #[test]
    fn test_visibility() {
        let image = private_of("t1");
        assert!(is_image_visible(&tenant("t1"), &image, None));
        assert!(!is_image_visible(&tenant("t2"), &image, None));
        assert!(!is_image_visible(&RequesterContext::anonymous(), &image, None));
        assert!(is_image_visible(&RequesterContext::anonymous().with_admin(true), &image, None));

        let public = private_of("t1").with_visibility(Visibility::Public);
        assert!(is_image_visible(&RequesterContext::anonymous(), &public, None));
        assert!(is_image_visible(&RequesterContext::anonymous(), &Image::new("x"), None));
    }

    #[test]
    fn test_visibility_through_membership() {
        let image = private_of("t1");
        let mut member = ImageMember::new("img-1", "t2", false);
        assert!(is_image_visible(&tenant("t2"), &image, Some(&member)));

        member.deleted = true;
        assert!(!is_image_visible(&tenant("t2"), &image, Some(&member)));
    }

    #[test]
    fn test_mutability() {
        let image = private_of("t1");
        assert!(is_image_mutable(&tenant("t1"), &image));
        assert!(!is_image_mutable(&tenant("t2"), &image));
        assert!(!is_image_mutable(&tenant("t1"), &Image::new("unowned")));
        assert!(is_image_mutable(&RequesterContext::anonymous().with_admin(true), &Image::new("unowned")));
    }

    #[test]
    fn test_sharing() {
        let image = private_of("t1");
        assert!(is_image_sharable(&tenant("t1"), &image, None));
        assert!(!is_image_sharable(&tenant("t2"), &image, None));
        assert!(!is_image_sharable(&RequesterContext::anonymous().with_admin(true), &image, None));

        let member = ImageMember::new("img-1", "t2", true);
        assert!(is_image_sharable(&tenant("t2"), &image, Some(&member)));
        let member = ImageMember::new("img-1", "t2", false);
        assert!(!is_image_sharable(&tenant("t2"), &image, Some(&member)));
    }
}
