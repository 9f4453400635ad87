// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 P47H Team <https://p47h.com>

//! # propguard-engine
//!
//! Enforcement side of property protection for an image registry.
//!
//! This crate wraps image metadata so every access to an extra property is
//! checked against a [`core_protection::RuleSet`], and composes that with
//! the whole-image ownership, visibility and sharing checks:
//!
//! - [`ProtectedProperties`]: the enforcing property map
//! - [`ProtectedImage`] / [`ProtectedImageRepo`]: the authorization proxy chain
//! - [`InMemoryImageRepo`] / [`MemberRepository`]: in-memory repositories
//! - [`Gateway`]: per-request wiring

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod authorization;
pub mod error;
pub mod gateway;
pub mod image;
pub mod members;
pub mod properties;
pub mod repo;
pub mod store;

// Re-export main types
pub use authorization::{is_image_mutable, is_image_sharable, is_image_visible};
pub use error::{EngineError, Result};
pub use gateway::Gateway;
pub use image::{ExtraProperties, Image, ImageStatus, ProtectedImage, Visibility};
pub use members::{ImageMember, MemberRepository};
pub use properties::{PropertyStore, ProtectedProperties};
pub use repo::{ImageRepository, InMemoryImageRepo, ListQuery, ProtectedImageRepo, SortDir};
pub use store::MemoryStore;
