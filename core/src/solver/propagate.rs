use smallvec::SmallVec;
use std::collections::VecDeque;

use super::*;

/// Result of the single-equation deduction pass.
#[derive(Clone, Debug, PartialEq)]
pub struct Propagation {
    /// Per variable id: `Some(true)` mine, `Some(false)` safe, `None` unresolved.
    pub values: Vec<Option<bool>>,
    /// Variables deduced safe, in deduction order.
    pub not_mine: Vec<usize>,
    /// Variables deduced mined, in deduction order. Strict flags are not listed.
    pub is_mine: Vec<usize>,
    pub contradictions: Vec<Contradiction>,
}

impl Propagation {
    pub fn known_mines(&self) -> usize {
        self.values.iter().filter(|value| **value == Some(true)).count()
    }
}

/// Resolves every equation whose target is `0` or equals its open cell count, until nothing changes.
pub fn propagate(problem: &ConstraintProblem, cfg: AnalysisConfig) -> Propagation {
    let mut values: Vec<Option<bool>> = problem
        .variables
        .iter()
        .map(|var| (cfg.strict_flags() && var.flagged).then_some(true))
        .collect();

    let mut var_equations: Vec<SmallVec<[usize; 9]>> =
        vec![SmallVec::new(); problem.variables.len()];
    for equation in &problem.equations {
        for &var in &equation.variable_ids {
            var_equations[var].push(equation.id);
        }
    }

    let mut not_mine = Vec::new();
    let mut is_mine = Vec::new();
    let mut contradictions = Vec::new();
    let mut broken = vec![false; problem.equations.len()];
    let mut queued = vec![true; problem.equations.len()];
    let mut queue: VecDeque<usize> = (0..problem.equations.len()).collect();

    while let Some(eq_id) = queue.pop_front() {
        queued[eq_id] = false;
        if broken[eq_id] {
            continue;
        }

        let equation = &problem.equations[eq_id];
        let mut open: SmallVec<[usize; 8]> = SmallVec::new();
        let mut mines = 0i32;
        for &var in &equation.variable_ids {
            match values[var] {
                None => open.push(var),
                Some(true) => mines += 1,
                Some(false) => {}
            }
        }

        let remaining = i32::from(equation.target_mines) - mines;
        if remaining < 0 || remaining as usize > open.len() {
            log::debug!("equation {eq_id} cannot be satisfied, dropping it");
            broken[eq_id] = true;
            contradictions.push(Contradiction::Inconsistent { equation: eq_id });
            continue;
        }

        if open.is_empty() {
            continue;
        }

        let forced = if remaining == 0 {
            false
        } else if remaining as usize == open.len() {
            true
        } else {
            continue;
        };

        for var in open {
            values[var] = Some(forced);
            if forced {
                is_mine.push(var);
            } else {
                not_mine.push(var);
            }

            for &next in &var_equations[var] {
                if !queued[next] {
                    queued[next] = true;
                    queue.push_back(next);
                }
            }
        }
    }

    Propagation {
        values,
        not_mine,
        is_mine,
        contradictions,
    }
}
