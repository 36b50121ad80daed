use good_lp::solvers::SolutionStatus;
use good_lp::{
    Constraint, Expression, ProblemVariables, ResolutionError, Solution, SolverModel, Variable,
    constraint, highs, microlp, variable,
};
use log::{Level, debug, info, log_enabled, trace, warn};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use crate::compiler::CompiledRoster;
use crate::error::{MissingReference, Result, RosterError};

/// MIP engines the roster can be solved with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Backend {
    /// HiGHS branch-and-cut.
    Highs,
    /// Pure Rust simplex with branch-and-bound.
    MicroLp,
}

impl Backend {
    pub fn name(self) -> &'static str {
        match self {
            Backend::Highs => "HIGHS",
            Backend::MicroLp => "MICROLP",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HIGHS" => Ok(Backend::Highs),
            "MICROLP" => Ok(Backend::MicroLp),
            other => Err(format!("unknown solver backend '{other}'")),
        }
    }
}

/// How a solve should be run.
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub primary: Backend,
    /// Tried once if the primary backend errors. Never used for infeasible models.
    pub fallback: Option<Backend>,
    /// Wall-clock budget honoured by the backend itself.
    pub time_limit: Option<Duration>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            primary: Backend::Highs,
            fallback: Some(Backend::MicroLp),
            time_limit: None,
        }
    }
}

/// A usable solve outcome. Infeasible and errored solves are reported as
/// [`RosterError`] instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SolveStatus {
    /// Proven optimal.
    Optimal,
    /// Stopped on a time or gap limit with an incumbent; may not be optimal.
    Feasible,
}

/// 0/1 value of every decision variable, laid out worker-major in the
/// order of [`CompiledRoster::workers`] and [`CompiledRoster::slots`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableBindings {
    slots: usize,
    values: Vec<bool>,
}

impl VariableBindings {
    /// All variables bound to 0.
    pub fn new(workers: usize, slots: usize) -> Self {
        Self {
            slots,
            values: vec![false; workers * slots],
        }
    }

    pub fn get(&self, worker: usize, slot: usize) -> bool {
        self.values[worker * self.slots + slot]
    }

    pub fn set(&mut self, worker: usize, slot: usize, value: bool) {
        self.values[worker * self.slots + slot] = value;
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// (worker index, slot index) of every variable bound to 1.
    pub fn assigned(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, on)| **on)
            .map(move |(i, _)| (i / self.slots, i % self.slots))
    }
}

#[derive(Debug, Clone)]
pub struct SolveResult {
    pub status: SolveStatus,
    /// `None` when the model was empty and no backend was needed.
    pub backend: Option<Backend>,
    pub fallback_used: bool,
    pub variables: usize,
    pub constraints: usize,
    pub elapsed: Duration,
    pub bindings: VariableBindings,
}

/// What a backend run produces before it is attached to a run report.
#[derive(Debug, Clone)]
pub(crate) struct BackendSolution {
    pub status: SolveStatus,
    pub values: Vec<bool>,
}

/// A single-use MIP over one compiled roster. Built fresh for every backend
/// attempt since good_lp consumes the variables when the objective is set.
pub(crate) struct RosterModel {
    problem: ProblemVariables,
    grid: Vec<Variable>,
    objective: Expression,
    constraints: Vec<Constraint>,
}

impl RosterModel {
    pub(crate) fn build(compiled: &CompiledRoster) -> Result<Self> {
        let n_slots = compiled.slots.len();
        info!(
            "Setting up ILP model with {} workers and {} slots...",
            compiled.workers.len(),
            n_slots
        );

        // x_ws = 1 if worker w is assigned to slot s
        //        0 otherwise
        let mut problem = ProblemVariables::new();
        let grid = problem.add_vector(variable().binary(), compiled.workers.len() * n_slots);
        let x = |w: usize, s: usize| grid[w * n_slots + s];
        let mut constraints = Vec::new();

        info!("Adding 'worker assigned at most once' constraints...");
        for w in 0..compiled.workers.len() {
            let assigned: Expression = (0..n_slots).map(|s| x(w, s)).sum();
            constraints.push(constraint!(assigned <= 1));
        }

        info!("Adding 'skill coverage' constraints...");
        for (s, slot) in compiled.slots.iter().enumerate() {
            for capability in slot.requirements.iter() {
                let covered: Expression = compiled
                    .workers
                    .iter()
                    .enumerate()
                    .filter(|(_, worker)| worker.capabilities.contains(capability))
                    .map(|(w, _)| x(w, s))
                    .sum();
                constraints.push(constraint!(covered >= 1));
            }
        }

        // an inspector needs someone else doing the work they sign off
        info!("Adding 'no self-inspection' constraints...");
        for (s, slot) in compiled.slots.iter().enumerate() {
            for capability in slot.requirements.iter().filter(|c| c.inspector) {
                let regular = capability.regular();
                for (i, inspector) in compiled.workers.iter().enumerate() {
                    if !inspector.capabilities.contains(capability) {
                        continue;
                    }
                    let others: Vec<usize> = compiled
                        .workers
                        .iter()
                        .enumerate()
                        .filter(|(m, worker)| *m != i && worker.capabilities.contains(regular))
                        .map(|(m, _)| m)
                        .collect();
                    if others.is_empty() {
                        debug!(
                            "Worker {} is the only holder of {} at {}; self-inspection allowed",
                            inspector.id, regular, slot.id
                        );
                        continue;
                    }
                    let supervised: Expression = others.iter().map(|&m| x(m, s)).sum();
                    constraints.push(constraint!(x(i, s) <= supervised));
                }
            }
        }

        if !compiled.avoidance.is_empty() {
            info!("Adding 'avoidance' constraints...");
            for (a, b) in compiled.avoidance.pairs() {
                let (Some(wa), Some(wb)) = (compiled.worker_index(a), compiled.worker_index(b))
                else {
                    return Err(MissingReference::UnknownWorker {
                        table: "avoidance",
                        worker: if compiled.worker_index(a).is_none() { a } else { b },
                    }
                    .into());
                };
                for s in 0..n_slots {
                    constraints.push(constraint!(x(wa, s) + x(wb, s) <= 1));
                }
            }
        }

        let mut objective = Expression::from(0.0);
        for (w, worker) in compiled.workers.iter().enumerate() {
            for (s, slot) in compiled.slots.iter().enumerate() {
                let cost = compiled.cost(worker.id, slot.id).ok_or(MissingReference::MissingCost {
                    worker: worker.id,
                    base: slot.id.base_id,
                })?;
                objective += cost * x(w, s);
            }
        }
        info!("Objective function defined as total relocation cost.");
        trace!(
            "Model has {} variables and {} constraints",
            grid.len(),
            constraints.len()
        );

        Ok(Self {
            problem,
            grid,
            objective,
            constraints,
        })
    }

    pub(crate) fn variables(&self) -> usize {
        self.grid.len()
    }

    pub(crate) fn constraints(&self) -> usize {
        self.constraints.len()
    }
}

/// Fails fast when a slot needs a capability nobody in the pool has.
pub fn check_supply(compiled: &CompiledRoster) -> Result<()> {
    for slot in &compiled.slots {
        for capability in slot.requirements.iter() {
            if compiled.holders(capability).next().is_none() {
                return Err(RosterError::UnsatisfiableRequirement {
                    slot: slot.id,
                    capability,
                });
            }
        }
    }
    Ok(())
}

/// Solves the roster with the configured backend, falling back once on a
/// backend error.
pub fn solve(compiled: &CompiledRoster, options: &SolverOptions) -> Result<SolveResult> {
    solve_with(compiled, options, run_backend)
}

pub(crate) fn solve_with<F>(
    compiled: &CompiledRoster,
    options: &SolverOptions,
    mut run: F,
) -> Result<SolveResult>
where
    F: FnMut(RosterModel, Backend, &SolverOptions) -> std::result::Result<BackendSolution, ResolutionError>,
{
    let start_time = Instant::now();
    check_supply(compiled)?;

    if compiled.slots.is_empty() {
        info!("Schedule has no slots; nothing to solve.");
        return Ok(SolveResult {
            status: SolveStatus::Optimal,
            backend: None,
            fallback_used: false,
            variables: 0,
            constraints: 0,
            elapsed: start_time.elapsed(),
            bindings: VariableBindings::new(compiled.workers.len(), 0),
        });
    }

    let mut backend = options.primary;
    let mut fallback_used = false;
    loop {
        let model = RosterModel::build(compiled)?;
        let (variables, constraints) = (model.variables(), model.constraints());

        info!("Starting {backend} solver...");
        match run(model, backend, options) {
            Ok(solution) => {
                let elapsed = start_time.elapsed();
                info!("{:?} solution found by {} in {:.2?}", solution.status, backend, elapsed);
                if solution.status == SolveStatus::Feasible {
                    warn!("{backend} stopped on a limit; the roster is feasible but not proven optimal");
                }
                return Ok(SolveResult {
                    status: solution.status,
                    backend: Some(backend),
                    fallback_used,
                    variables,
                    constraints,
                    elapsed,
                    bindings: VariableBindings {
                        slots: compiled.slots.len(),
                        values: solution.values,
                    },
                });
            }
            Err(ResolutionError::Infeasible) => {
                info!("{backend} proved the model infeasible");
                return Err(RosterError::Infeasible { backend });
            }
            Err(e) => {
                if let Some(limit) = stopped_on_limit(&e, options) {
                    warn!("{backend} reached the {limit:?} time limit with no incumbent");
                    return Err(RosterError::TimeLimit { backend, limit });
                }
                match options.fallback.filter(|next| *next != backend) {
                    Some(next) if !fallback_used => {
                        warn!("{backend} failed ({e}); falling back to {next}");
                        backend = next;
                        fallback_used = true;
                    }
                    _ => {
                        return Err(RosterError::Solver {
                            backend,
                            message: e.to_string(),
                        });
                    }
                }
            }
        }
    }
}

/// good_lp reports a limit stop without an incumbent as this error.
const NO_SOLUTION_FOUND: &str = "NoSolutionFound";

/// The configured limit, when `error` is the backend giving up on it.
fn stopped_on_limit(error: &ResolutionError, options: &SolverOptions) -> Option<Duration> {
    match error {
        ResolutionError::Other(message) if *message == NO_SOLUTION_FOUND => options.time_limit,
        _ => None,
    }
}

fn run_backend(
    model: RosterModel,
    backend: Backend,
    options: &SolverOptions,
) -> std::result::Result<BackendSolution, ResolutionError> {
    let RosterModel {
        problem,
        grid,
        objective,
        constraints,
    } = model;

    match backend {
        Backend::Highs => {
            let console = if log_enabled!(Level::Trace) { "true" } else { "false" };
            let mut solver = problem
                .minimise(objective)
                .using(highs)
                .set_option("threads", 1) // limit to 1 thread for reproducibility
                .set_option("random_seed", 1234)
                // no relative gap: OPTIMAL means proven optimal
                .set_option("mip_rel_gap", 0.0)
                .set_option("log_to_console", console);
            if let Some(limit) = options.time_limit {
                solver = solver.set_option("time_limit", limit.as_secs_f64());
            }
            finish(solver, constraints, &grid)
        }
        Backend::MicroLp => {
            if options.time_limit.is_some() {
                warn!("{backend} has no time limit option; solving to optimality");
            }
            finish(problem.minimise(objective).using(microlp), constraints, &grid)
        }
    }
}

fn finish<M>(
    mut model: M,
    constraints: Vec<Constraint>,
    grid: &[Variable],
) -> std::result::Result<BackendSolution, ResolutionError>
where
    M: SolverModel<Error = ResolutionError>,
{
    for c in constraints {
        model.add_constraint(c);
    }
    let solution = model.solve()?;
    let status = match solution.status() {
        SolutionStatus::Optimal => SolveStatus::Optimal,
        _ => SolveStatus::Feasible,
    };
    let values = grid.iter().map(|v| solution.value(*v) > 0.5).collect();
    Ok(BackendSolution { status, values })
}
