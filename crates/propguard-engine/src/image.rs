//! Image domain types
//!
//! [`Image`] is the plain record kept by repositories. [`ProtectedImage`]
//! is the same record with its extra properties behind a
//! [`ProtectedProperties`] map, as handed out by the authorization proxy.

use crate::properties::ProtectedProperties;
use core_context::RequesterContext;
use core_protection::{Action, PropertyAuthorizer, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// Extra (free-form) image properties
pub type ExtraProperties = BTreeMap<String, String>;

/// Who can see an image without being its owner or a member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Everyone
    Public,
    /// Owner, members and admins
    #[default]
    Private,
}

/// Lifecycle state of an image
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// Registered, no data yet
    #[default]
    Queued,
    /// Data upload in progress
    Saving,
    /// Usable
    Active,
    /// Removed; invisible to repositories
    Deleted,
}

/// Image metadata record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Unique identifier
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Owning tenant; `None` means unowned
    #[serde(default)]
    pub owner: Option<String>,
    /// Visibility
    #[serde(default)]
    pub visibility: Visibility,
    /// Lifecycle status
    #[serde(default)]
    pub status: ImageStatus,
    /// Tags
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Free-form properties subject to property protection
    #[serde(default)]
    pub extra_properties: ExtraProperties,
    /// Creation time, seconds since the Unix epoch
    #[serde(default)]
    pub created_at: u64,
    /// Last update time, seconds since the Unix epoch
    #[serde(default)]
    pub updated_at: u64,
}

impl Image {
    /// New private, unowned image
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            owner: None,
            visibility: Visibility::Private,
            status: ImageStatus::Queued,
            tags: BTreeSet::new(),
            extra_properties: ExtraProperties::new(),
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Set the display name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the owning tenant
    #[must_use]
    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Set the visibility
    #[must_use]
    pub const fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Add an extra property
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_properties.insert(key.into(), value.into());
        self
    }

    /// Set the creation time
    #[must_use]
    pub const fn with_created_at(mut self, created_at: u64) -> Self {
        self.created_at = created_at;
        self
    }

    /// True for public images
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.visibility == Visibility::Public
    }

    /// True once removed
    #[must_use]
    pub fn is_deleted(&self) -> bool {
        self.status == ImageStatus::Deleted
    }
}

/// Image whose extra properties are enforced against a rule set
///
/// Core fields are reachable through [`ProtectedImage::image`] and
/// [`ProtectedImage::image_mut`]; the record's `extra_properties` there are
/// always empty while the proxy holds them.
pub struct ProtectedImage {
    image: Image,
    source_id: String,
    properties: ProtectedProperties<ExtraProperties>,
}

impl fmt::Debug for ProtectedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtectedImage")
            .field("id", &self.image.id)
            .field("properties", &self.properties)
            .finish_non_exhaustive()
    }
}

impl ProtectedImage {
    /// Wrap `image` for `requester` in the given operation mode
    ///
    /// # Errors
    ///
    /// See [`ProtectedProperties::new`].
    pub(crate) fn new(
        mut image: Image,
        requester: RequesterContext,
        authorizer: Arc<dyn PropertyAuthorizer>,
        mode: Action,
    ) -> Result<Self> {
        let extra = std::mem::take(&mut image.extra_properties);
        let properties = ProtectedProperties::new(requester, extra, authorizer, mode)?;
        Ok(Self {
            source_id: image.id.clone(),
            image,
            properties,
        })
    }

    /// Read-mode proxy for the same image, requester and rule set
    pub(crate) fn is_bound_to(
        &self,
        requester: &RequesterContext,
        authorizer: &Arc<dyn PropertyAuthorizer>,
    ) -> bool {
        self.properties.mode() == Action::Read
            && self.image.id == self.source_id
            && self.properties.requester() == requester
            && Arc::ptr_eq(self.properties.authorizer(), authorizer)
    }

    /// Image identifier
    #[must_use]
    pub fn id(&self) -> &str {
        &self.image.id
    }

    /// Core fields
    #[must_use]
    pub const fn image(&self) -> &Image {
        &self.image
    }

    /// Mutable core fields
    pub fn image_mut(&mut self) -> &mut Image {
        &mut self.image
    }

    /// Enforced extra properties
    #[must_use]
    pub const fn properties(&self) -> &ProtectedProperties<ExtraProperties> {
        &self.properties
    }

    /// Mutable enforced extra properties
    pub fn properties_mut(&mut self) -> &mut ProtectedProperties<ExtraProperties> {
        &mut self.properties
    }

    /// Plain record with every backing property restored, hidden ones included
    #[must_use]
    pub fn into_image(self) -> Image {
        let mut image = self.image;
        image.extra_properties = self.properties.into_inner();
        image
    }

    /// Plain record holding only the visible properties
    #[must_use]
    pub fn to_view(&self) -> Image {
        let mut image = self.image.clone();
        image.extra_properties = self
            .properties
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        image
    }
}
