//! Core evaluation types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Role definition identifier
pub type RoleDefinitionId = String;

/// Operation being checked
///
/// Control-plane actions and data-plane actions are matched against disjoint
/// pattern lists of a [`GrantSet`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Operation {
    /// Operation identifier (e.g. `Microsoft.Storage/storageAccounts/listkeys/action`)
    pub name: String,

    /// Whether this is a data-plane action
    #[serde(default)]
    pub is_data_action: bool,
}

impl Operation {
    /// Create a control-plane operation
    pub fn action(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_data_action: false,
        }
    }

    /// Create a data-plane operation
    pub fn data_action(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_data_action: true,
        }
    }
}

/// Wildcard pattern lists attached to a role definition or deny assignment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct GrantSet {
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub not_actions: Vec<String>,
    #[serde(default)]
    pub data_actions: Vec<String>,
    #[serde(default)]
    pub not_data_actions: Vec<String>,
}

impl GrantSet {
    /// Grant set allowing the given control-plane patterns
    pub fn with_actions<I, S>(actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            actions: actions.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Grant set allowing the given data-plane patterns
    pub fn with_data_actions<I, S>(data_actions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data_actions: data_actions.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn not_actions<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.not_actions = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn not_data_actions<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.not_data_actions = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Allow and exclusion lists that apply to `operation`
    pub fn lists_for(&self, operation: &Operation) -> (&[String], &[String]) {
        if operation.is_data_action {
            (&self.data_actions, &self.not_data_actions)
        } else {
            (&self.actions, &self.not_actions)
        }
    }
}

/// Binding of a principal to a role definition at a scope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleAssignment {
    pub role_definition_id: RoleDefinitionId,

    /// Role name; classic administrator entries carry several names
    /// separated by `;` (e.g. `ServiceAdministrator;AccountAdministrator`)
    #[serde(default)]
    pub role_definition_name: String,

    pub scope: String,

    /// Sign-in name of the assigned principal
    #[serde(rename = "SignInName")]
    pub principal: String,
}

impl RoleAssignment {
    pub fn new(
        role_definition_id: impl Into<String>,
        role_definition_name: impl Into<String>,
        scope: impl Into<String>,
        principal: impl Into<String>,
    ) -> Self {
        Self {
            role_definition_id: role_definition_id.into(),
            role_definition_name: role_definition_name.into(),
            scope: scope.into(),
            principal: principal.into(),
        }
    }

    /// Individual role names in the `;`-delimited name field
    pub fn role_names(&self) -> impl Iterator<Item = &str> {
        self.role_definition_name
            .split(';')
            .map(str::trim)
            .filter(|name| !name.is_empty())
    }
}

/// Assignment revoking the operations matched by its embedded grant set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct DenyAssignment {
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub scope: String,

    #[serde(rename = "SignInName")]
    pub principal: String,

    #[serde(flatten)]
    pub grants: GrantSet,
}

impl DenyAssignment {
    pub fn new(scope: impl Into<String>, principal: impl Into<String>, grants: GrantSet) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: String::new(),
            scope: scope.into(),
            principal: principal.into(),
            grants,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// Why an operation ended up allowed or not
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Principal holds the classic administrator bypass
    Privileged,
    /// At least one role assignment grants the operation
    Granted,
    /// A deny assignment revoked the operation
    Denied,
    /// No role assignment grants the operation
    NotGranted,
}

impl Verdict {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Privileged | Self::Granted)
    }
}

/// Verdict for a single requested operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationVerdict {
    pub operation: Operation,
    pub verdict: Verdict,
}

impl OperationVerdict {
    pub fn allowed(&self) -> bool {
        self.verdict.is_allowed()
    }
}

/// Result of a permission evaluation
///
/// Holds exactly one entry per distinct operation name, in the order the
/// operations were requested. Every entry starts as [`Verdict::NotGranted`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Unique evaluation identifier (also recorded on the tracing span)
    pub id: Uuid,

    pub principal: String,

    pub scope: String,

    pub evaluated_at: DateTime<Utc>,

    entries: Vec<OperationVerdict>,
}

impl EvaluationResult {
    pub(crate) fn new(
        id: Uuid,
        principal: impl Into<String>,
        scope: impl Into<String>,
        operations: &[Operation],
    ) -> Self {
        let mut entries: Vec<OperationVerdict> = Vec::with_capacity(operations.len());
        for operation in operations {
            if entries.iter().any(|e| e.operation.name == operation.name) {
                continue;
            }
            entries.push(OperationVerdict {
                operation: operation.clone(),
                verdict: Verdict::NotGranted,
            });
        }

        Self {
            id,
            principal: principal.into(),
            scope: scope.into(),
            evaluated_at: Utc::now(),
            entries,
        }
    }

    pub(crate) fn entries_mut(&mut self) -> &mut [OperationVerdict] {
        &mut self.entries
    }

    pub(crate) fn set_all(&mut self, verdict: Verdict) {
        for entry in &mut self.entries {
            entry.verdict = verdict;
        }
    }

    /// Verdict for an operation name, `None` if it was not requested
    pub fn get(&self, operation: &str) -> Option<bool> {
        self.verdict(operation).map(Verdict::is_allowed)
    }

    /// Detailed verdict for an operation name
    pub fn verdict(&self, operation: &str) -> Option<Verdict> {
        self.entries
            .iter()
            .find(|e| e.operation.name == operation)
            .map(|e| e.verdict)
    }

    /// Whether `operation` was requested and allowed
    pub fn is_allowed(&self, operation: &str) -> bool {
        self.get(operation).unwrap_or(false)
    }

    pub fn all_allowed(&self) -> bool {
        self.entries.iter().all(OperationVerdict::allowed)
    }

    /// Names of operations that were not allowed, in request order
    pub fn missing(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| !e.allowed())
            .map(|e| e.operation.name.clone())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationVerdict> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Operation name to allow/deny map
    pub fn to_map(&self) -> HashMap<String, bool> {
        self.entries
            .iter()
            .map(|e| (e.operation.name.clone(), e.allowed()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grant_set_list_selection() {
        let grants = GrantSet::with_actions(["Microsoft.Storage/*"])
            .not_actions(["Microsoft.Storage/*/delete"])
            .not_data_actions(["Microsoft.Storage/*/blobs/delete"]);

        let (allow, deny) = grants.lists_for(&Operation::action("x"));
        assert_eq!(allow, ["Microsoft.Storage/*"]);
        assert_eq!(deny, ["Microsoft.Storage/*/delete"]);

        let (allow, deny) = grants.lists_for(&Operation::data_action("x"));
        assert!(allow.is_empty());
        assert_eq!(deny, ["Microsoft.Storage/*/blobs/delete"]);
    }

    #[test]
    fn test_role_names_split() {
        let assignment = RoleAssignment::new(
            "",
            "ServiceAdministrator; AccountAdministrator;",
            "/subscriptions/S",
            "admin@contoso.com",
        );
        let names: Vec<_> = assignment.role_names().collect();
        assert_eq!(names, vec!["ServiceAdministrator", "AccountAdministrator"]);
    }

    #[test]
    fn test_result_defaults_to_not_granted_and_dedupes() {
        let ops = vec![
            Operation::action("a/read"),
            Operation::action("b/write"),
            Operation::action("a/read"),
        ];
        let result = EvaluationResult::new(Uuid::new_v4(), "p", "/subscriptions/S", &ops);

        assert_eq!(result.len(), 2);
        assert_eq!(result.get("a/read"), Some(false));
        assert_eq!(result.verdict("b/write"), Some(Verdict::NotGranted));
        assert_eq!(result.get("c/delete"), None);
        assert_eq!(result.missing(), vec!["a/read", "b/write"]);
    }

    #[test]
    fn test_deny_assignment_json_shape() {
        let json = r#"{
            "Scope": "/subscriptions/S",
            "SignInName": "bob@contoso.com",
            "Actions": ["Microsoft.Storage/storageAccounts/listkeys/action"]
        }"#;

        let deny: DenyAssignment = serde_json::from_str(json).unwrap();
        assert_eq!(deny.principal, "bob@contoso.com");
        assert_eq!(deny.grants.actions.len(), 1);
        assert!(deny.grants.not_actions.is_empty());
    }
}
