//! Resource scope parsing and formatting
//!
//! Scopes identify where a permission applies: a subscription, a resource
//! group, or an individual resource.
//!
//! # Examples
//!
//! ```
//! use azfiles_authz::scope::ResourceScope;
//!
//! let scope: ResourceScope =
//!     "/subscriptions/S/resourceGroups/G/providers/Microsoft.Storage/storageAccounts/A"
//!         .parse()
//!         .unwrap();
//!
//! assert_eq!(scope.resource_group(), Some("G"));
//! assert!(scope.is_within(&scope.subscription_root().unwrap()));
//! ```

mod types;


pub use types::{ResourceScope, ScopeError, ScopeResult, ScopeSegment};
