//! Solution extractor.
//!
//! Reads the solver's 0/1 bindings back into assignments and re-checks
//! every roster invariant against them without trusting the backend.

use itertools::Itertools;
use log::info;
use std::collections::{BTreeMap, HashSet};

use crate::compiler::CompiledRoster;
use crate::data::{Assignment, RosterSolution, SlotId, Worker};
use crate::error::{Invariant, Result, RosterError};
use crate::solver::VariableBindings;

/// Builds the assignment list, total cost and unassigned count from the
/// solver's bindings, then validates the result.
pub fn extract(compiled: &CompiledRoster, bindings: &VariableBindings) -> Result<RosterSolution> {
    let expected = compiled.workers.len() * compiled.slots.len();
    if bindings.len() != expected {
        return Err(RosterError::violation(
            Invariant::Bindings,
            format!("expected {expected} variables, solver returned {}", bindings.len()),
        ));
    }

    let mut assignments = Vec::new();
    for (w, s) in bindings.assigned() {
        let worker = &compiled.workers[w];
        let slot = compiled.slots[s].id;
        let cost = compiled.cost(worker.id, slot).ok_or_else(|| {
            RosterError::violation(
                Invariant::Cost,
                format!("no cost for worker {} at base {}", worker.id, slot.base_id),
            )
        })?;
        assignments.push(Assignment {
            worker_id: worker.id,
            base_id: slot.base_id,
            period: slot.period,
            shift: slot.shift,
            cost,
        });
    }
    assignments.sort_by_key(|a| (a.slot(), a.worker_id));

    validate(compiled, &assignments)?;

    let total_cost = assignments.iter().map(|a| a.cost).sum();
    let placed: HashSet<_> = assignments.iter().map(|a| a.worker_id).collect();
    let unassigned_workers = compiled.workers.len() - placed.len();

    info!(
        "Extracted solution: {} assignments, total cost: {:.2}, unassigned workers: {}",
        assignments.len(),
        total_cost,
        unassigned_workers
    );

    Ok(RosterSolution {
        assignments,
        total_cost,
        unassigned_workers,
    })
}

/// Checks an assignment list against the compiled roster: known entities,
/// single assignment, exact costs, coverage, supervision and avoidance.
pub fn validate(compiled: &CompiledRoster, assignments: &[Assignment]) -> Result<()> {
    let mut by_slot: BTreeMap<SlotId, Vec<&Worker>> = BTreeMap::new();

    let placements = assignments.iter().counts_by(|a| a.worker_id);
    if let Some((worker_id, placed)) = placements.into_iter().filter(|(_, n)| *n > 1).min() {
        return Err(RosterError::violation(
            Invariant::SingleAssignment,
            format!("worker {worker_id} is assigned to {placed} slots"),
        ));
    }

    for assignment in assignments {
        let slot = assignment.slot();
        let worker = compiled.worker(assignment.worker_id).ok_or_else(|| {
            RosterError::violation(
                Invariant::Bindings,
                format!("worker {} is not part of the roster", assignment.worker_id),
            )
        })?;
        if compiled.slot_index(slot).is_none() {
            return Err(RosterError::violation(
                Invariant::Bindings,
                format!("{slot} is not part of the schedule"),
            ));
        }
        if assignment.cost < 0.0 || compiled.cost(worker.id, slot) != Some(assignment.cost) {
            return Err(RosterError::violation(
                Invariant::Cost,
                format!("{assignment} does not match the cost table"),
            ));
        }
        by_slot.entry(slot).or_default().push(worker);
    }

    for slot in &compiled.slots {
        let here = by_slot.get(&slot.id).map(Vec::as_slice).unwrap_or_default();

        for capability in slot.requirements.iter() {
            if !here.iter().any(|w| w.capabilities.contains(capability)) {
                let invariant = if capability.inspector {
                    Invariant::InspectorCoverage
                } else {
                    Invariant::SkillCoverage
                };
                return Err(RosterError::violation(
                    invariant,
                    format!("no worker holding {capability} is assigned to {}", slot.id),
                ));
            }
        }

        for capability in slot.requirements.iter().filter(|c| c.inspector) {
            let regular = capability.regular();
            for inspector in here.iter().filter(|w| w.capabilities.contains(capability)) {
                let others_exist = compiled.holders(regular).any(|w| w.id != inspector.id);
                let supervised = here
                    .iter()
                    .any(|w| w.id != inspector.id && w.capabilities.contains(regular));
                if others_exist && !supervised {
                    return Err(RosterError::violation(
                        Invariant::InspectorSupervision,
                        format!(
                            "worker {} inspects {} at {} without another {} holder assigned",
                            inspector.id, regular, slot.id, regular
                        ),
                    ));
                }
            }
        }

        for (a, b) in here.iter().tuple_combinations() {
            if compiled.avoidance.contains(a.id, b.id) {
                return Err(RosterError::violation(
                    Invariant::Avoidance,
                    format!("workers {} and {} share {}", a.id, b.id, slot.id),
                ));
            }
        }
    }

    Ok(())
}
