// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 P47H Team <https://p47h.com>

//! # propguard
//!
//! Property protection and membership authorization for an image registry.
//!
//! This crate provides a unified API over the workspace crates:
//!
//! - **Requester Context**: roles, tenant, user and admin flag of the caller
//! - **Protection Engine**: rule files mapping property-name patterns to the
//!   roles allowed to create, read, update or delete them
//! - **Enforcement**: property maps and image repositories that apply the
//!   rules on every access
//!
//! ## Quick Start
//!
//! ```rust
//! use propguard::context::RequesterContext;
//! use propguard::protection::RuleSetLoader;
//!
//! let rules = RuleSetLoader::new()
//!     .load_str(r#"
//! ["^x_.*$"]
//! create = "admin"
//! read = "admin,member"
//! update = "admin"
//! delete = "admin"
//! "#)
//!     .unwrap();
//!
//! let member = RequesterContext::new(["member"]);
//! assert!(rules.check("x_note", "read", &member).unwrap());
//! assert!(!rules.check("x_note", "create", &member).unwrap());
//! ```
//!
//! ## Architecture
//!
//! This facade crate re-exports the following modules:
//!
//! - [`context`] - requester identity (from `core-context`)
//! - [`protection`] - rule loading and decisions (from `core-protection`)
//! - [`engine`] - enforcing proxies and repositories (from `propguard-engine`)
//!
//! ## Security
//!
//! - Deny by default once any rule is configured
//! - Hidden properties are indistinguishable from absent ones
//! - Policy oracle failures propagate, never turning into an allow

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Requester context module.
///
/// Re-exports `core_context`.
pub mod context {
    pub use core_context::*;
}

/// Protection engine module.
///
/// Re-exports `core_protection` for rule loading and property decisions.
pub mod protection {
    pub use core_protection::*;
}

/// Enforcement module.
///
/// Re-exports `propguard_engine` for protected images and repositories.
pub mod engine {
    pub use propguard_engine::*;
}

// Convenience re-exports at root level
pub use core_context::RequesterContext;
pub use core_protection::{Action, RuleSet, RuleSetLoader, SharedRuleSet};
pub use propguard_engine::{Gateway, ProtectedImageRepo, ProtectedProperties};
