//! Operation types for resource reconciliation

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Kind of non-field mutation a resource may need
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffectKind {
    /// Attach a volume to a server
    Attach,
    /// Detach a volume from its server
    Detach,
    /// Route a floating IP to a server
    Target,
    /// Remove a floating IP route
    Untarget,
    /// Reprovision a server's operating system
    Reinstall,
    /// Grow a volume; the provider answers with a new ID
    Resize,
}

impl SideEffectKind {
    pub fn phase(self) -> Phase {
        match self {
            SideEffectKind::Detach | SideEffectKind::Untarget => Phase::Detach,
            SideEffectKind::Reinstall => Phase::Disruptive,
            SideEffectKind::Attach | SideEffectKind::Target => Phase::Attach,
            SideEffectKind::Resize => Phase::Reissue,
        }
    }

    /// Whether the caller must opt in before this runs
    pub fn is_disruptive(self) -> bool {
        matches!(self, SideEffectKind::Reinstall)
    }

    /// Whether the resource has a different ID afterwards
    pub fn reissues_identity(self) -> bool {
        matches!(self, SideEffectKind::Resize)
    }
}

impl std::fmt::Display for SideEffectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SideEffectKind::Attach => write!(f, "attach"),
            SideEffectKind::Detach => write!(f, "detach"),
            SideEffectKind::Target => write!(f, "target"),
            SideEffectKind::Untarget => write!(f, "untarget"),
            SideEffectKind::Reinstall => write!(f, "reinstall"),
            SideEffectKind::Resize => write!(f, "resize"),
        }
    }
}

/// Execution phase; operations run in ascending phase order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Create,
    Detach,
    Disruptive,
    Basic,
    Attach,
    Reissue,
    Delete,
}

/// A single planned mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operation {
    /// Create the resource
    Create { payload: Map<String, Value> },
    /// Update plain fields in place
    BasicUpdate { payload: Map<String, Value> },
    /// Run a dedicated side-effect endpoint
    SideEffect {
        kind: SideEffectKind,
        payload: Map<String, Value>,
    },
    /// Delete the resource
    Delete,
}

impl Operation {
    pub fn side_effect(kind: SideEffectKind, payload: Map<String, Value>) -> Self {
        Operation::SideEffect { kind, payload }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Operation::Create { .. } => Phase::Create,
            Operation::BasicUpdate { .. } => Phase::Basic,
            Operation::SideEffect { kind, .. } => kind.phase(),
            Operation::Delete => Phase::Delete,
        }
    }

    /// Request body, if the operation carries one
    pub fn payload(&self) -> Option<&Map<String, Value>> {
        match self {
            Operation::Create { payload }
            | Operation::BasicUpdate { payload }
            | Operation::SideEffect { payload, .. } => Some(payload),
            Operation::Delete => None,
        }
    }

    pub fn side_effect_kind(&self) -> Option<SideEffectKind> {
        match self {
            Operation::SideEffect { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    pub fn is_disruptive(&self) -> bool {
        self.side_effect_kind().is_some_and(SideEffectKind::is_disruptive)
    }

    /// Whether the resource ID must be re-read from the response
    pub fn yields_new_id(&self) -> bool {
        match self {
            Operation::Create { .. } => true,
            Operation::SideEffect { kind, .. } => kind.reissues_identity(),
            _ => false,
        }
    }

    /// Short name used in logs and error context
    pub fn label(&self) -> String {
        match self {
            Operation::Create { .. } => "create".to_string(),
            Operation::BasicUpdate { .. } => "update".to_string(),
            Operation::SideEffect { kind, .. } => kind.to_string(),
            Operation::Delete => "delete".to_string(),
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.payload() {
            Some(payload) if !payload.is_empty() => {
                let keys: Vec<&str> = payload.keys().map(String::as_str).collect();
                write!(f, "{} ({})", self.label(), keys.join(", "))
            }
            _ => write!(f, "{}", self.label()),
        }
    }
}

/// Ordered list of operations that takes a resource to its desired state
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct OperationPlan {
    /// Operations in execution order
    pub operations: Vec<Operation>,

    /// Whether the plan has any changes
    pub changed: bool,
}

impl OperationPlan {
    /// Order operations by phase; ties keep the order they were planned in.
    pub fn new(mut operations: Vec<Operation>) -> Self {
        operations.sort_by_key(Operation::phase);
        let changed = !operations.is_empty();
        Self {
            operations,
            changed,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Operation> {
        self.operations.iter()
    }

    /// Whether any operation needs the caller's explicit consent
    pub fn requires_opt_in(&self) -> bool {
        self.operations.iter().any(Operation::is_disruptive)
    }

    /// Get operations in a phase
    pub fn operations_in(&self, phase: Phase) -> Vec<&Operation> {
        self.operations
            .iter()
            .filter(|op| op.phase() == phase)
            .collect()
    }

    /// Summary of the plan
    pub fn summary(&self) -> PlanSummary {
        let mut summary = PlanSummary::default();
        for op in &self.operations {
            match op {
                Operation::Create { .. } => summary.create += 1,
                Operation::BasicUpdate { .. } => summary.update += 1,
                Operation::SideEffect { .. } => summary.side_effect += 1,
                Operation::Delete => summary.delete += 1,
            }
        }
        summary
    }
}

/// Summary of planned operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub create: usize,
    pub update: usize,
    pub side_effect: usize,
    pub delete: usize,
}

impl std::fmt::Display for PlanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} to create, {} to update, {} side effect(s), {} to delete",
            self.create, self.update, self.side_effect, self.delete
        )
    }
}
