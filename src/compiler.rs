//! Requirement compiler.
//!
//! Turns the raw rows handed over by the data loader into validated,
//! immutable domain records. Nothing downstream ever sees a raw row: every
//! id, flag, count and cost is checked here, and every column header is
//! mapped onto the fixed [`Capability`] enumeration.

use itertools::Itertools;
use log::{debug, info};
use std::collections::{BTreeMap, HashSet};

use crate::capability::{AircraftType, Capability, CapabilitySet};
use crate::data::{
    AvoidanceRow, AvoidanceSet, BaseId, CellValue, CostRow, CostTable, RosterInput, ScheduleRow,
    SkillRow, Slot, SlotId, Worker, WorkerId,
};
use crate::error::{MissingReference, Result, RosterError};

const SKILLS: &str = "skills";
const SCHEDULE: &str = "schedule";
const COSTS: &str = "costs";
const AVOIDANCE: &str = "avoidance";

/// Validated input for one optimisation run.
#[derive(Debug, Clone)]
pub struct CompiledRoster {
    /// Sorted by id.
    pub workers: Vec<Worker>,
    /// Sorted by (base, period, shift).
    pub slots: Vec<Slot>,
    /// Distinct bases of the schedule, ascending.
    pub bases: Vec<BaseId>,
    pub costs: CostTable,
    pub avoidance: AvoidanceSet,
}

impl CompiledRoster {
    pub fn worker_index(&self, id: WorkerId) -> Option<usize> {
        self.workers.binary_search_by_key(&id, |w| w.id).ok()
    }

    pub fn slot_index(&self, id: SlotId) -> Option<usize> {
        self.slots.binary_search_by_key(&id, |s| s.id).ok()
    }

    pub fn worker(&self, id: WorkerId) -> Option<&Worker> {
        self.worker_index(id).map(|i| &self.workers[i])
    }

    /// Relocation cost of `worker` for the base of `slot`.
    pub fn cost(&self, worker: WorkerId, slot: SlotId) -> Option<f64> {
        self.costs.get(worker, slot.base_id)
    }

    pub fn holders(&self, capability: Capability) -> impl Iterator<Item = &Worker> + '_ {
        self.workers
            .iter()
            .filter(move |w| w.capabilities.contains(capability))
    }
}

/// Validates and normalises the four input tables.
pub fn compile(input: &RosterInput) -> Result<CompiledRoster> {
    info!(
        "Compiling roster input: {} skill rows, {} schedule rows, {} cost rows, {} avoidance rows",
        input.skills.len(),
        input.schedule.len(),
        input.costs.len(),
        input.avoidance.as_ref().map_or(0, Vec::len)
    );

    let workers = compile_workers(&input.skills)?;
    let slots = compile_slots(&input.schedule)?;
    let bases: Vec<BaseId> = slots.iter().map(|s| s.id.base_id).unique().sorted().collect();
    let costs = compile_costs(&input.costs, &workers, &bases)?;
    let avoidance = match &input.avoidance {
        Some(rows) => compile_avoidance(rows, &workers)?,
        None => AvoidanceSet::new(),
    };

    info!(
        "Compiled {} workers, {} slots across {} bases, {} avoidance pairs",
        workers.len(),
        slots.len(),
        bases.len(),
        avoidance.len()
    );

    Ok(CompiledRoster {
        workers,
        slots,
        bases,
        costs,
        avoidance,
    })
}

fn compile_workers(rows: &[SkillRow]) -> Result<Vec<Worker>> {
    let mut seen = HashSet::new();
    let mut workers = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let row_no = i + 1;
        if !seen.insert(row.worker_id) {
            return Err(MissingReference::DuplicateWorker { worker: row.worker_id }.into());
        }

        let mut capabilities = CapabilitySet::new();
        for (column, cell) in &row.flags {
            let capability = Capability::parse(column)
                .ok_or_else(|| RosterError::value(SKILLS, row_no, column, "unrecognized column"))?;
            if flag_value(SKILLS, row_no, column, *cell)? {
                capabilities.insert(capability);
            }
        }

        if capabilities.is_empty() {
            debug!("Worker {} holds no capabilities", row.worker_id);
        }
        workers.push(Worker {
            id: row.worker_id,
            capabilities,
        });
    }

    workers.sort_by_key(|w| w.id);
    Ok(workers)
}

fn compile_slots(rows: &[ScheduleRow]) -> Result<Vec<Slot>> {
    let mut seen = HashSet::new();
    let mut slots = Vec::with_capacity(rows.len());

    for (i, row) in rows.iter().enumerate() {
        let row_no = i + 1;
        let id = SlotId::new(row.base_id, row.period, row.shift);
        if !seen.insert(id) {
            return Err(MissingReference::DuplicateSlot { slot: id }.into());
        }

        let mut aircraft = BTreeMap::new();
        let mut requirements = CapabilitySet::new();
        for (column, cell) in &row.counts {
            if let Some(kind) = AircraftType::from_column(column) {
                let count = count_value(SCHEDULE, row_no, column, *cell)?;
                aircraft.insert(kind, count);
                // an aircraft present needs every skill category covered
                if count > 0 {
                    requirements.extend(Capability::for_aircraft(kind));
                }
            } else if let Some(capability) = Capability::parse(column).filter(|c| c.inspector) {
                if count_value(SCHEDULE, row_no, column, *cell)? > 0 {
                    requirements.insert(capability);
                }
            } else {
                return Err(RosterError::value(SCHEDULE, row_no, column, "unrecognized column"));
            }
        }

        slots.push(Slot {
            id,
            aircraft,
            requirements,
        });
    }

    slots.sort_by_key(|s| s.id);
    Ok(slots)
}

fn compile_costs(rows: &[CostRow], workers: &[Worker], bases: &[BaseId]) -> Result<CostTable> {
    let known: HashSet<WorkerId> = workers.iter().map(|w| w.id).collect();
    let mut costs = CostTable::new();

    for (i, row) in rows.iter().enumerate() {
        let row_no = i + 1;
        if !known.contains(&row.worker_id) {
            return Err(MissingReference::UnknownWorker {
                table: COSTS,
                worker: row.worker_id,
            }
            .into());
        }
        for (column, cell) in &row.costs {
            let base = parse_base_label(column)
                .ok_or_else(|| RosterError::value(COSTS, row_no, column, "unrecognized base column"))?;
            let cost = cost_value(COSTS, row_no, column, *cell)?;
            if costs.get(row.worker_id, base).is_some() {
                return Err(RosterError::value(
                    COSTS,
                    row_no,
                    column,
                    format!("duplicate cost for worker {} at base {}", row.worker_id, base),
                ));
            }
            costs.insert(row.worker_id, base, cost);
        }
    }

    for worker in workers {
        for &base in bases {
            if costs.get(worker.id, base).is_none() {
                return Err(MissingReference::MissingCost {
                    worker: worker.id,
                    base,
                }
                .into());
            }
        }
    }

    Ok(costs)
}

fn compile_avoidance(rows: &[AvoidanceRow], workers: &[Worker]) -> Result<AvoidanceSet> {
    let known: HashSet<WorkerId> = workers.iter().map(|w| w.id).collect();
    let mut avoidance = AvoidanceSet::new();

    for (i, row) in rows.iter().enumerate() {
        if row.worker_id == row.avoid_worker_id {
            return Err(RosterError::value(
                AVOIDANCE,
                i + 1,
                "avoidWorkerId",
                format!("worker {} cannot avoid themselves", row.worker_id),
            ));
        }
        for worker in [row.worker_id, row.avoid_worker_id] {
            if !known.contains(&worker) {
                return Err(MissingReference::UnknownWorker {
                    table: AVOIDANCE,
                    worker,
                }
                .into());
            }
        }
        if !avoidance.insert(row.worker_id, row.avoid_worker_id) {
            debug!(
                "Duplicate avoidance pair ({}, {}) ignored",
                row.worker_id, row.avoid_worker_id
            );
        }
    }

    Ok(avoidance)
}

/// Base column labels are either the numeric base id or a spreadsheet
/// letter where `A` is base 1.
fn parse_base_label(label: &str) -> Option<BaseId> {
    let label = label.trim();
    if !label.is_empty() && label.bytes().all(|b| b.is_ascii_digit()) {
        return label.parse().ok();
    }
    match label.as_bytes() {
        [letter @ b'A'..=b'Z'] => Some(BaseId::from(letter - b'A') + 1),
        _ => None,
    }
}

fn flag_value(table: &'static str, row: usize, column: &str, cell: CellValue) -> Result<bool> {
    match cell {
        CellValue::Flag(flag) => Ok(flag),
        CellValue::Number(n) if n == 0.0 => Ok(false),
        CellValue::Number(n) if n == 1.0 => Ok(true),
        CellValue::Number(n) => Err(RosterError::value(
            table,
            row,
            column,
            format!("skill flag must be 0 or 1, got {n}"),
        )),
    }
}

fn count_value(table: &'static str, row: usize, column: &str, cell: CellValue) -> Result<u32> {
    match cell {
        CellValue::Number(n) if n.is_finite() && n >= 0.0 && n.fract() == 0.0 && n <= u32::MAX as f64 => {
            Ok(n as u32)
        }
        other => Err(RosterError::value(
            table,
            row,
            column,
            format!("count must be a non-negative integer, got {other}"),
        )),
    }
}

fn cost_value(table: &'static str, row: usize, column: &str, cell: CellValue) -> Result<f64> {
    match cell {
        CellValue::Number(n) if n.is_finite() && n >= 0.0 => Ok(n),
        other => Err(RosterError::value(
            table,
            row,
            column,
            format!("cost must be a non-negative number, got {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::SkillCategory;

    fn full_skills(id: WorkerId) -> SkillRow {
        SkillRow::new(id)
            .with_flag("aw139_af", 1.0)
            .with_flag("aw139_r", 1.0)
            .with_flag("aw139_av", 1.0)
    }

    fn sample_input() -> RosterInput {
        RosterInput {
            skills: vec![
                full_skills(2),
                SkillRow::new(1)
                    .with_flag("aw139_af", 1.0)
                    .with_flag("aw139_r", 0.0)
                    .with_flag("aw139_av", true)
                    .with_flag("aw139_af_inspec", 1.0),
            ],
            schedule: vec![
                ScheduleRow::new(2, 1, 2).with_count("h175", 0.0),
                ScheduleRow::new(1, 1, 1)
                    .with_count("aw139", 2.0)
                    .with_count("aw139_af_inspec", 1.0),
            ],
            costs: vec![
                CostRow::new(1).with_cost("A", 10.0).with_cost("B", 15.0),
                CostRow::new(2).with_cost("1", 20.0).with_cost("2", 25.0),
            ],
            avoidance: Some(vec![AvoidanceRow::new(2, 1), AvoidanceRow::new(1, 2)]),
        }
    }

    #[test]
    fn test_compile_sorts_and_normalises() {
        let compiled = compile(&sample_input()).unwrap();

        assert_eq!(compiled.workers.iter().map(|w| w.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(
            compiled.slots.iter().map(|s| s.id).collect::<Vec<_>>(),
            vec![SlotId::new(1, 1, 1), SlotId::new(2, 1, 2)]
        );
        assert_eq!(compiled.bases, vec![1, 2]);
        assert_eq!(compiled.costs.get(1, 2), Some(15.0));
        assert_eq!(compiled.costs.get(2, 1), Some(20.0));
        assert_eq!(compiled.avoidance.len(), 1);
        assert!(compiled.avoidance.contains(2, 1));
    }

    #[test]
    fn test_worker_capabilities_from_flags() {
        let compiled = compile(&sample_input()).unwrap();
        let worker = compiled.worker(1).unwrap();
        let caps: Vec<String> = worker.capabilities.iter().map(|c| c.column_name()).collect();
        assert_eq!(caps, vec!["aw139_af", "aw139_av", "aw139_af_inspec"]);
    }

    #[test]
    fn test_aircraft_presence_derives_requirements() {
        let compiled = compile(&sample_input()).unwrap();
        let busy = &compiled.slots[0];
        assert_eq!(busy.aircraft.get(&AircraftType::Aw139), Some(&2));
        assert_eq!(busy.requirements.len(), 4);
        for skill in SkillCategory::ALL {
            assert!(busy.requirements.contains(Capability::new(AircraftType::Aw139, skill)));
        }
        assert!(busy.requirements.contains(Capability::inspector(
            AircraftType::Aw139,
            SkillCategory::Airframe
        )));

        let idle = &compiled.slots[1];
        assert!(idle.requirements.is_empty());
    }

    #[test]
    fn test_missing_cost_is_integrity_error() {
        let mut input = sample_input();
        input.skills.push(full_skills(5));
        input.costs.push(CostRow::new(5).with_cost("A", 3.0));

        match compile(&input) {
            Err(RosterError::DataIntegrity(MissingReference::MissingCost { worker, base })) => {
                assert_eq!((worker, base), (5, 2));
            }
            other => panic!("expected missing cost, got {other:?}"),
        }
    }

    #[test]
    fn test_cost_for_unknown_worker_rejected() {
        let mut input = sample_input();
        input.costs.push(CostRow::new(9).with_cost("A", 1.0));
        assert!(matches!(
            compile(&input),
            Err(RosterError::DataIntegrity(MissingReference::UnknownWorker {
                table: "costs",
                worker: 9
            }))
        ));
    }

    #[test]
    fn test_avoidance_for_unknown_worker_rejected() {
        let mut input = sample_input();
        input.avoidance = Some(vec![AvoidanceRow::new(1, 7)]);
        assert!(matches!(
            compile(&input),
            Err(RosterError::DataIntegrity(MissingReference::UnknownWorker {
                table: "avoidance",
                worker: 7
            }))
        ));
    }

    #[test]
    fn test_self_avoidance_rejected() {
        let mut input = sample_input();
        input.avoidance = Some(vec![AvoidanceRow::new(2, 2)]);
        assert!(matches!(
            compile(&input),
            Err(RosterError::DataValue { table: "avoidance", row: 1, .. })
        ));
    }

    #[test]
    fn test_duplicate_worker_and_slot_rejected() {
        let mut input = sample_input();
        input.skills.push(full_skills(2));
        assert!(matches!(
            compile(&input),
            Err(RosterError::DataIntegrity(MissingReference::DuplicateWorker { worker: 2 }))
        ));

        let mut input = sample_input();
        input.schedule.push(ScheduleRow::new(1, 1, 1));
        assert!(matches!(
            compile(&input),
            Err(RosterError::DataIntegrity(MissingReference::DuplicateSlot { .. }))
        ));
    }

    #[test]
    fn test_non_binary_flag_rejected() {
        let mut input = sample_input();
        input.skills[0] = full_skills(2).with_flag("sk92_r", 2.0);
        match compile(&input) {
            Err(RosterError::DataValue { table, row, column, .. }) => {
                assert_eq!((table, row, column.as_str()), ("skills", 1, "sk92_r"));
            }
            other => panic!("expected value error, got {other:?}"),
        }
    }

    #[test]
    fn test_bad_counts_rejected() {
        for bad in [CellValue::Number(-1.0), CellValue::Number(1.5), CellValue::Flag(true)] {
            let mut input = sample_input();
            input.schedule.push(ScheduleRow::new(1, 2, 1).with_count("sk92", bad));
            assert!(
                matches!(compile(&input), Err(RosterError::DataValue { table: "schedule", row: 3, .. })),
                "count {bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_negative_cost_rejected() {
        let mut input = sample_input();
        input.costs[1] = CostRow::new(2).with_cost("A", -4.0).with_cost("B", 1.0);
        assert!(matches!(
            compile(&input),
            Err(RosterError::DataValue { table: "costs", row: 2, .. })
        ));
    }

    #[test]
    fn test_unrecognized_columns_rejected() {
        let mut input = sample_input();
        input.skills[0] = full_skills(2).with_flag("a320_af", 1.0);
        assert!(matches!(compile(&input), Err(RosterError::DataValue { table: "skills", .. })));

        let mut input = sample_input();
        input.schedule[0] = ScheduleRow::new(2, 1, 2).with_count("aw139_af", 1.0);
        assert!(matches!(compile(&input), Err(RosterError::DataValue { table: "schedule", .. })));

        let mut input = sample_input();
        input.costs[0] = CostRow::new(1).with_cost("AA", 1.0);
        assert!(matches!(compile(&input), Err(RosterError::DataValue { table: "costs", .. })));
    }

    #[test]
    fn test_duplicate_cost_entry_rejected() {
        let mut input = sample_input();
        input.costs.push(CostRow::new(1).with_cost("1", 3.0));
        assert!(matches!(
            compile(&input),
            Err(RosterError::DataValue { table: "costs", row: 3, .. })
        ));
    }

    #[test]
    fn test_base_labels() {
        assert_eq!(parse_base_label("A"), Some(1));
        assert_eq!(parse_base_label("C"), Some(3));
        assert_eq!(parse_base_label("12"), Some(12));
        assert_eq!(parse_base_label("a"), None);
        assert_eq!(parse_base_label("-1"), None);
        assert_eq!(parse_base_label(""), None);
    }

    #[test]
    fn test_no_avoidance_table() {
        let mut input = sample_input();
        input.avoidance = None;
        let compiled = compile(&input).unwrap();
        assert!(compiled.avoidance.is_empty());
    }
}
