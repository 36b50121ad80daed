use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use crate::capability::{AircraftType, CapabilitySet};
use crate::solver::{Backend, SolveStatus};

// Type aliases for clarity
pub type WorkerId = u32;
pub type BaseId = u32;
pub type Period = u32;
pub type Shift = u32;

/// A single spreadsheet cell as handed over by the data loader.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Flag(bool),
    Number(f64),
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Flag(value)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Flag(b) => write!(f, "{b}"),
            CellValue::Number(n) => write!(f, "{n}"),
        }
    }
}

/// One row of the worker skills table. Every column other than the id is
/// expected to be a capability header such as `aw139_af`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkillRow {
    pub worker_id: WorkerId,
    #[serde(flatten)]
    pub flags: BTreeMap<String, CellValue>,
}

impl SkillRow {
    pub fn new(worker_id: WorkerId) -> Self {
        Self { worker_id, flags: BTreeMap::new() }
    }

    pub fn with_flag(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.flags.insert(column.into(), value.into());
        self
    }
}

/// One row of the base schedule: a (base, period, shift) triple with
/// aircraft counts and optional inspector requirement counts.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRow {
    pub base_id: BaseId,
    pub period: Period,
    pub shift: Shift,
    #[serde(flatten)]
    pub counts: BTreeMap<String, CellValue>,
}

impl ScheduleRow {
    pub fn new(base_id: BaseId, period: Period, shift: Shift) -> Self {
        Self { base_id, period, shift, counts: BTreeMap::new() }
    }

    pub fn with_count(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.counts.insert(column.into(), value.into());
        self
    }
}

/// One row of the cost matrix: relocation cost of a worker per base column.
/// Columns are labelled either with the base id (`"2"`) or a spreadsheet
/// letter (`"B"`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CostRow {
    pub worker_id: WorkerId,
    #[serde(flatten)]
    pub costs: BTreeMap<String, CellValue>,
}

impl CostRow {
    pub fn new(worker_id: WorkerId) -> Self {
        Self { worker_id, costs: BTreeMap::new() }
    }

    pub fn with_cost(mut self, column: impl Into<String>, value: impl Into<CellValue>) -> Self {
        self.costs.insert(column.into(), value.into());
        self
    }
}

/// Two workers that must never share a slot.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvoidanceRow {
    pub worker_id: WorkerId,
    pub avoid_worker_id: WorkerId,
    /// Accepted for compatibility with older avoidance sheets; avoidance is
    /// enforced as a hard constraint so the value is not used.
    #[serde(default)]
    pub penalty: Option<f64>,
}

impl AvoidanceRow {
    pub fn new(worker_id: WorkerId, avoid_worker_id: WorkerId) -> Self {
        Self { worker_id, avoid_worker_id, penalty: None }
    }
}

/// The complete input for one roster run.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterInput {
    pub skills: Vec<SkillRow>,
    pub schedule: Vec<ScheduleRow>,
    pub costs: Vec<CostRow>,
    #[serde(default)]
    pub avoidance: Option<Vec<AvoidanceRow>>,
}

/// A (base, period, shift) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotId {
    pub base_id: BaseId,
    pub period: Period,
    pub shift: Shift,
}

impl SlotId {
    pub fn new(base_id: BaseId, period: Period, shift: Shift) -> Self {
        Self { base_id, period, shift }
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "base {} period {} shift {}", self.base_id, self.period, self.shift)
    }
}

/// A validated worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Worker {
    pub id: WorkerId,
    pub capabilities: CapabilitySet,
}

/// A validated slot with its derived requirement flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    pub id: SlotId,
    pub aircraft: BTreeMap<AircraftType, u32>,
    /// Regular and inspector capabilities that must be present at this slot.
    pub requirements: CapabilitySet,
}

/// Relocation cost per (worker, base).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostTable {
    entries: HashMap<(WorkerId, BaseId), f64>,
}

impl CostTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, worker: WorkerId, base: BaseId, cost: f64) {
        self.entries.insert((worker, base), cost);
    }

    pub fn get(&self, worker: WorkerId, base: BaseId) -> Option<f64> {
        self.entries.get(&(worker, base)).copied()
    }
}

/// Unordered worker pairs, stored as (lower id, higher id).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvoidanceSet {
    pairs: BTreeSet<(WorkerId, WorkerId)>,
}

impl AvoidanceSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the pair was already present (in either order).
    pub fn insert(&mut self, a: WorkerId, b: WorkerId) -> bool {
        self.pairs.insert((a.min(b), a.max(b)))
    }

    pub fn contains(&self, a: WorkerId, b: WorkerId) -> bool {
        self.pairs.contains(&(a.min(b), a.max(b)))
    }

    pub fn pairs(&self) -> impl Iterator<Item = (WorkerId, WorkerId)> + '_ {
        self.pairs.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

/// A worker placed on a slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub worker_id: WorkerId,
    pub base_id: BaseId,
    pub period: Period,
    pub shift: Shift,
    pub cost: f64,
}

impl Assignment {
    pub fn slot(&self) -> SlotId {
        SlotId::new(self.base_id, self.period, self.shift)
    }
}

impl fmt::Display for Assignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker {} -> {} (cost {:.2})", self.worker_id, self.slot(), self.cost)
    }
}

/// What the extractor hands to reporting.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterSolution {
    pub assignments: Vec<Assignment>,
    pub total_cost: f64,
    pub unassigned_workers: usize,
}

/// The final output of one optimisation run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterReport {
    pub status: SolveStatus,
    pub backend: Option<Backend>,
    pub fallback_used: bool,
    pub variables: usize,
    pub constraints: usize,
    pub solve_time_ms: u128,
    #[serde(flatten)]
    pub solution: RosterSolution,
}
