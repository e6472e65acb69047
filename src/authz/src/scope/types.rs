//! Resource scope type definitions and parsing
//!
//! A resource scope is a `/`-delimited path of alternating
//! resource-type and identifier segments:
//!
//! `/subscriptions/S/resourceGroups/G/providers/Microsoft.Storage/storageAccounts/A`

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Result type for scope operations
pub type ScopeResult<T> = Result<T, ScopeError>;

/// Errors that can occur while parsing or deriving scopes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    /// Empty scope string provided
    #[error("Scope cannot be empty")]
    EmptyScope,

    /// Scope does not start with `/`
    #[error("Malformed scope '{0}': must start with '/'")]
    MissingLeadingSlash(String),

    /// A segment between two separators is empty
    #[error("Malformed scope '{scope}': segment {position} is empty")]
    EmptySegment { scope: String, position: usize },

    /// A resource-type segment has no identifier
    #[error("Malformed scope '{scope}': segment '{segment}' has no identifier")]
    UnpairedSegment { scope: String, segment: String },

    /// Scope is not rooted at a subscription
    #[error("Scope '{0}' is not under a subscription")]
    NotSubscriptionScope(String),
}

/// One (resource type, identifier) pair of a scope
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeSegment {
    /// Resource-type segment (e.g. `resourceGroups`)
    pub kind: String,
    /// Identifier segment (e.g. the resource group name)
    pub name: String,
}

impl ScopeSegment {
    fn eq_ignore_case(&self, other: &ScopeSegment) -> bool {
        self.kind.eq_ignore_ascii_case(&other.kind) && self.name.eq_ignore_ascii_case(&other.name)
    }
}

/// Hierarchical resource scope
///
/// # Examples
///
/// ```
/// use azfiles_authz::scope::ResourceScope;
///
/// let scope = ResourceScope::parse("/subscriptions/S/resourceGroups/G").unwrap();
/// assert_eq!(scope.depth(), 2);
/// assert_eq!(scope.subscription_root().unwrap().to_string(), "/subscriptions/S");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceScope {
    segments: Vec<ScopeSegment>,
}

impl ResourceScope {
    /// Parses a scope string
    ///
    /// The string must start with `/`, and the tokens after it must be
    /// non-empty and come in (type, identifier) pairs.
    pub fn parse(s: &str) -> ScopeResult<Self> {
        if s.is_empty() {
            return Err(ScopeError::EmptyScope);
        }

        let Some(rest) = s.strip_prefix('/') else {
            return Err(ScopeError::MissingLeadingSlash(s.to_string()));
        };

        let tokens: Vec<&str> = rest.split('/').collect();

        if let Some(position) = tokens.iter().position(|t| t.is_empty()) {
            return Err(ScopeError::EmptySegment {
                scope: s.to_string(),
                position: position + 1,
            });
        }

        if tokens.len() % 2 != 0 {
            return Err(ScopeError::UnpairedSegment {
                scope: s.to_string(),
                segment: tokens[tokens.len() - 1].to_string(),
            });
        }

        let segments = tokens
            .chunks_exact(2)
            .map(|pair| ScopeSegment {
                kind: pair[0].to_string(),
                name: pair[1].to_string(),
            })
            .collect();

        Ok(Self { segments })
    }

    /// Builds a scope from already-split pairs
    pub fn from_segments(segments: Vec<ScopeSegment>) -> ScopeResult<Self> {
        let scope = Self { segments };
        // Round-trip through the parser so the same invariants apply.
        Self::parse(&scope.format())
    }

    /// Returns the (type, identifier) pairs
    pub fn segments(&self) -> &[ScopeSegment] {
        &self.segments
    }

    /// Number of (type, identifier) pairs
    pub fn depth(&self) -> usize {
        self.segments.len()
    }

    /// Formats the scope back into its string form
    pub fn format(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push('/');
            out.push_str(&segment.kind);
            out.push('/');
            out.push_str(&segment.name);
        }
        out
    }

    /// Subscription identifier, if the scope is rooted at a subscription
    pub fn subscription_id(&self) -> Option<&str> {
        self.segments
            .first()
            .filter(|s| s.kind.eq_ignore_ascii_case("subscriptions"))
            .map(|s| s.name.as_str())
    }

    /// The `/subscriptions/{id}` scope this scope lives under
    pub fn subscription_root(&self) -> ScopeResult<Self> {
        match self.segments.first() {
            Some(first) if first.kind.eq_ignore_ascii_case("subscriptions") => Ok(Self {
                segments: vec![first.clone()],
            }),
            _ => Err(ScopeError::NotSubscriptionScope(self.format())),
        }
    }

    /// Resource group name, if present
    pub fn resource_group(&self) -> Option<&str> {
        self.segments
            .iter()
            .find(|s| s.kind.eq_ignore_ascii_case("resourceGroups"))
            .map(|s| s.name.as_str())
    }

    /// Returns the parent scope if it exists
    pub fn parent(&self) -> Option<Self> {
        if self.segments.len() <= 1 {
            return None;
        }

        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Root-to-leaf chain of this scope and all its ancestors
    ///
    /// `/subscriptions/S/resourceGroups/G` yields
    /// `[/subscriptions/S, /subscriptions/S/resourceGroups/G]`.
    pub fn chain(&self) -> Vec<Self> {
        (1..=self.segments.len())
            .map(|i| Self {
                segments: self.segments[..i].to_vec(),
            })
            .collect()
    }

    /// Whether this scope equals `ancestor` or lies beneath it
    ///
    /// Comparison is case-insensitive, as resource identifiers are.
    pub fn is_within(&self, ancestor: &ResourceScope) -> bool {
        ancestor.segments.len() <= self.segments.len()
            && ancestor
                .segments
                .iter()
                .zip(self.segments.iter())
                .all(|(a, s)| a.eq_ignore_case(s))
    }
}

impl FromStr for ResourceScope {
    type Err = ScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ResourceScope {
    type Error = ScopeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<ResourceScope> for String {
    fn from(scope: ResourceScope) -> Self {
        scope.format()
    }
}

impl fmt::Display for ResourceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}
