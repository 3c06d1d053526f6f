use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;
pub use constraints::*;
pub use enumerate::*;
pub use observation::*;
pub use probability::*;
pub use propagate::*;
pub use solvable::*;
pub use structure::*;

mod constraints;
mod enumerate;
mod observation;
mod probability;
mod propagate;
mod solvable;
mod structure;

/// What the solver knows about every hidden cell of one observation.
///
/// The four deduced sets are disjoint. Every covered cell outside them, and outside the strict
/// flags, is listed in `uncertain`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub basic_not_mine: Vec<Coord2>,
    pub basic_is_mine: Vec<Coord2>,
    pub enum_not_mine: Vec<Coord2>,
    pub enum_is_mine: Vec<Coord2>,
    pub uncertain: Vec<Coord2>,
    /// Cells of islands too large to enumerate, a subset of `uncertain`.
    pub undetermined: Vec<Coord2>,
    /// `P(mine)` per cell: `0` for revealed and proven safe cells, `1` for proven mines and strict flags.
    pub probabilities: Array2<f64>,
    pub contradictions: Vec<Contradiction>,
}

impl Classification {
    pub fn safe(&self) -> impl Iterator<Item = Coord2> + '_ {
        self.basic_not_mine
            .iter()
            .chain(&self.enum_not_mine)
            .copied()
    }

    pub fn mines(&self) -> impl Iterator<Item = Coord2> + '_ {
        self.basic_is_mine.iter().chain(&self.enum_is_mine).copied()
    }

    pub fn is_consistent(&self) -> bool {
        self.contradictions.is_empty()
    }
}

/// Runs propagation, island enumeration and probability weighting over one observation.
pub fn classify(obs: &Observation, cfg: AnalysisConfig) -> Classification {
    let ConstraintBuildOutput {
        problem,
        mut contradictions,
        ..
    } = build_constraints(obs, cfg);
    let basic = propagate(&problem, cfg);
    contradictions.extend(basic.contradictions.iter().cloned());

    let report = enumerate_islands(&problem, &basic.values, cfg.limits);
    contradictions.extend(report.contradictions.iter().cloned());
    let (enum_not_mine, enum_is_mine) = report.forced();

    let remaining_mines = match (cfg.mine_count_usage, obs.mine_count) {
        (MineCountUsage::UseIfKnown, Some(total)) => {
            (total as usize).checked_sub(basic.known_mines())
        }
        _ => None,
    };
    let (island_probabilities, contradiction) =
        mine_probabilities(&report, remaining_mines, problem.variables.len());
    contradictions.extend(contradiction);

    let mut probabilities = Array2::zeros(obs.size.to_nd_index());
    let mut resolved = basic.values.clone();
    for &var in &enum_not_mine {
        resolved[var] = Some(false);
    }
    for &var in &enum_is_mine {
        resolved[var] = Some(true);
    }

    let mut uncertain = Vec::new();
    for var in &problem.variables {
        let probability = match resolved[var.id] {
            Some(true) => 1.0,
            Some(false) => 0.0,
            None => {
                uncertain.push(var.coords);
                island_probabilities[var.id].unwrap_or(probability::FALLBACK_DENSITY)
            }
        };
        probabilities[var.coords.to_nd_index()] = probability;
    }

    let coords_of = |ids: &[usize]| -> Vec<Coord2> {
        let mut coords: Vec<_> = ids.iter().map(|&id| problem.variables[id].coords).collect();
        coords.sort_unstable();
        coords
    };

    Classification {
        basic_not_mine: coords_of(&basic.not_mine),
        basic_is_mine: coords_of(&basic.is_mine),
        enum_not_mine: coords_of(&enum_not_mine),
        enum_is_mine: coords_of(&enum_is_mine),
        uncertain,
        undetermined: coords_of(&report.undetermined),
        probabilities,
        contradictions,
    }
}

/// Every covered cell of `board` that is provably safe, in row-major order.
pub fn solve_all_safe(board: &Board, cfg: AnalysisConfig) -> Vec<Coord2> {
    let classification = classify(&Observation::from_board(board), cfg);
    let mut safe: Vec<_> = classification.safe().collect();
    safe.sort_unstable();
    safe
}
