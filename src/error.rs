use std::fmt;
use std::time::Duration;

use crate::capability::Capability;
use crate::data::{BaseId, SlotId, WorkerId};
use crate::solver::Backend;

/// A reference the input tables should have contained but did not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MissingReference {
    /// A worker id used in `table` has no row in the skills table.
    UnknownWorker { table: &'static str, worker: WorkerId },
    /// No cost for moving `worker` to a scheduled `base`.
    MissingCost { worker: WorkerId, base: BaseId },
    DuplicateWorker { worker: WorkerId },
    DuplicateSlot { slot: SlotId },
}

impl fmt::Display for MissingReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingReference::UnknownWorker { table, worker } => {
                write!(f, "worker {worker} referenced in {table} table is not in the skills table")
            }
            MissingReference::MissingCost { worker, base } => {
                write!(f, "no cost entry for worker {worker} at base {base}")
            }
            MissingReference::DuplicateWorker { worker } => {
                write!(f, "worker {worker} appears more than once in the skills table")
            }
            MissingReference::DuplicateSlot { slot } => {
                write!(f, "{slot} appears more than once in the schedule table")
            }
        }
    }
}

/// The solution property a post-solve check found broken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invariant {
    /// Solver output does not match the model's variable layout.
    Bindings,
    SingleAssignment,
    SkillCoverage,
    InspectorCoverage,
    InspectorSupervision,
    Avoidance,
    Cost,
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Invariant::Bindings => "variable binding",
            Invariant::SingleAssignment => "single assignment",
            Invariant::SkillCoverage => "skill coverage",
            Invariant::InspectorCoverage => "inspector coverage",
            Invariant::InspectorSupervision => "inspector supervision",
            Invariant::Avoidance => "avoidance",
            Invariant::Cost => "cost",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RosterError {
    #[error("data integrity error: {0}")]
    DataIntegrity(MissingReference),

    #[error("invalid value in {table} row {row}, column '{column}': {reason}")]
    DataValue {
        table: &'static str,
        row: usize,
        column: String,
        reason: String,
    },

    #[error("{slot} requires {capability} but no worker has it")]
    UnsatisfiableRequirement { slot: SlotId, capability: Capability },

    #[error("{backend} reported the model infeasible")]
    Infeasible { backend: Backend },

    #[error("{backend} failed: {message}")]
    Solver { backend: Backend, message: String },

    /// The backend hit the configured time limit before any roster was found.
    #[error("{backend} reached the {limit:?} time limit without finding a roster")]
    TimeLimit { backend: Backend, limit: Duration },

    #[error("solution violates {invariant} invariant: {entity}")]
    InvariantViolation { invariant: Invariant, entity: String },
}

impl RosterError {
    pub(crate) fn value(
        table: &'static str,
        row: usize,
        column: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        RosterError::DataValue {
            table,
            row,
            column: column.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn violation(invariant: Invariant, entity: impl Into<String>) -> Self {
        RosterError::InvariantViolation {
            invariant,
            entity: entity.into(),
        }
    }

    /// Stable name of the failure class, for callers that render their own message.
    pub fn kind(&self) -> &'static str {
        match self {
            RosterError::DataIntegrity(_) => "DataIntegrityError",
            RosterError::DataValue { .. } => "DataValueError",
            RosterError::UnsatisfiableRequirement { .. } => "UnsatisfiableRequirementError",
            RosterError::Infeasible { .. } => "Infeasible",
            RosterError::Solver { .. } => "SolverError",
            RosterError::TimeLimit { .. } => "TimeLimitReached",
            RosterError::InvariantViolation { .. } => "SolutionInvariantViolation",
        }
    }
}

impl From<MissingReference> for RosterError {
    fn from(missing: MissingReference) -> Self {
        RosterError::DataIntegrity(missing)
    }
}

pub type Result<T> = std::result::Result<T, RosterError>;
