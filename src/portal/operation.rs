use std::any::TypeId;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::criteria::Criteria;
use super::object::BusinessObject;

/// The lifecycle operation a dispatch performs.
///
/// `Create` and `Fetch` allocate a fresh instance through the activator.
/// `Insert`, `Update` and `Delete` run against an instance the caller already holds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Create,
    Fetch,
    Insert,
    Update,
    Delete,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Fetch => "fetch",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "create" => Some(Self::Create),
            "fetch" => Some(Self::Fetch),
            "insert" => Some(Self::Insert),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            _ => None,
        }
    }

    /// Whether the portal allocates the target instance for this operation.
    pub fn allocates(&self) -> bool {
        matches!(self, Self::Create | Self::Fetch)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an operation targets a root object or a child inside a parent's graph.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Root,
    Child,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Root => "root",
            Self::Child => "child",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Describes one dispatch: which type, which operation, at which scope, with what criteria.
///
/// Built fresh for every call and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Operation {
    type_id: TypeId,
    type_name: &'static str,
    kind: OperationKind,
    scope: Scope,
    criteria: Criteria,
}

impl Operation {
    pub fn new<T: BusinessObject>(kind: OperationKind, scope: Scope, criteria: Criteria) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            kind,
            scope,
            criteria,
        }
    }

    pub fn root<T: BusinessObject>(kind: OperationKind, criteria: Criteria) -> Self {
        Self::new::<T>(kind, Scope::Root, criteria)
    }

    pub fn child<T: BusinessObject>(kind: OperationKind, criteria: Criteria) -> Self {
        Self::new::<T>(kind, Scope::Child, criteria)
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Fully qualified Rust type name, used in errors before the type is resolved.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn criteria(&self) -> &Criteria {
        &self.criteria
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_create_and_fetch_allocate() {
        assert!(OperationKind::Create.allocates());
        assert!(OperationKind::Fetch.allocates());
        assert!(!OperationKind::Insert.allocates());
        assert!(!OperationKind::Update.allocates());
        assert!(!OperationKind::Delete.allocates());
    }
}
