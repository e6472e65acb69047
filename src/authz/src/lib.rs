//! # Azure effective-permission evaluator
//!
//! Answers "does principal P effectively hold operation O on scope S?" from
//! data supplied by a directory backend.
//!
//! ## Features
//!
//! - **Classic administrator bypass** discovered at the subscription root
//! - **Role assignment grants** with `Actions` / `NotActions` and
//!   `DataActions` / `NotDataActions` wildcard lists
//! - **Deny assignments** that override any grant
//! - **Evaluator-owned caches** for role definitions and privileged principals
//! - **Deadlines** on whole evaluations
//!
//! ## Example
//!
//! ```rust
//! use azfiles_authz::{
//!     GrantSet, InMemoryDirectory, Operation, PermissionEvaluator, RoleAssignment,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let scope = "/subscriptions/S/resourceGroups/G/providers/Microsoft.Storage/storageAccounts/A";
//!
//!     let directory = InMemoryDirectory::new();
//!     directory
//!         .add_role_definition("contributor", GrantSet::with_actions(["Microsoft.Storage/storageAccounts/*"]))
//!         .await;
//!     directory
//!         .add_role_assignment(RoleAssignment::new("contributor", "Contributor", scope, "alice@contoso.com"))
//!         .await;
//!
//!     let evaluator = PermissionEvaluator::new(Arc::new(directory));
//!     let listkeys = Operation::action("Microsoft.Storage/storageAccounts/listkeys/action");
//!
//!     let result = evaluator.evaluate(scope, &[listkeys], "alice@contoso.com", false).await?;
//!     assert!(result.all_allowed());
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod pattern;
pub mod provider;
pub mod scope;
pub mod types;

// Re-export commonly used types
pub use cache::{canonicalize_principal, PrivilegedPrincipalRegistry, RoleDefinitionCache};
pub use config::EvaluatorConfig;
pub use engine::{AssertionGate, PermissionEvaluator};
pub use error::{AuthzError, ProviderError, Result};
pub use pattern::{PatternMatcher, WildcardMatcher};
pub use provider::{DirectoryProvider, DirectorySnapshot, InMemoryDirectory};
pub use scope::{ResourceScope, ScopeError};
pub use types::{DenyAssignment, EvaluationResult, GrantSet, Operation, RoleAssignment, Verdict};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
