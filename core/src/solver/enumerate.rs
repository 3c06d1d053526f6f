use hashbrown::HashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use super::*;

/// An island was too large, or took too many search steps, to enumerate.
#[derive(Error, Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("island of {variables} cells exceeded its budget after {nodes} search nodes")]
pub struct BoundExceeded {
    pub variables: usize,
    pub nodes: u64,
}

/// Every satisfying assignment of one island, tallied by how many mines it places.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IslandSolutions {
    pub variable_ids: Vec<usize>,
    /// `by_mines[k]`: assignments placing exactly `k` mines.
    pub by_mines: Vec<u64>,
    /// `mine_counts[i][k]`: assignments placing `k` mines that put one on `variable_ids[i]`.
    pub mine_counts: Vec<Vec<u64>>,
}

impl IslandSolutions {
    pub fn total(&self) -> u64 {
        self.by_mines.iter().sum()
    }

    pub fn always_mine(&self, index: usize) -> bool {
        self.mine_counts[index].iter().sum::<u64>() == self.total()
    }

    pub fn never_mine(&self, index: usize) -> bool {
        self.mine_counts[index].iter().all(|&count| count == 0)
    }
}

/// Unresolved part of a problem after propagation, split into islands.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct IslandReport {
    pub solved: Vec<IslandSolutions>,
    /// Cells of islands that could not be enumerated.
    pub undetermined: Vec<usize>,
    /// Unresolved cells touched by no clue.
    pub free: Vec<usize>,
    pub contradictions: Vec<Contradiction>,
}

impl IslandReport {
    /// Ids forced to one value in every assignment: `(not_mine, is_mine)`.
    pub fn forced(&self) -> (Vec<usize>, Vec<usize>) {
        let mut not_mine = Vec::new();
        let mut is_mine = Vec::new();
        for island in &self.solved {
            for (index, &var) in island.variable_ids.iter().enumerate() {
                if island.never_mine(index) {
                    not_mine.push(var);
                } else if island.always_mine(index) {
                    is_mine.push(var);
                }
            }
        }
        (not_mine, is_mine)
    }
}

/// Substitutes the propagated values into the clue equations and enumerates each remaining island.
pub fn enumerate_islands(
    problem: &ConstraintProblem,
    values: &[Option<bool>],
    limits: SolverLimits,
) -> IslandReport {
    let reduced = reduce_equations(problem, values);
    let (components, untouched) = build_components(problem.variables.len(), &reduced);

    let mut report = IslandReport {
        free: untouched
            .into_iter()
            .filter(|&var| values[var].is_none())
            .collect(),
        ..Default::default()
    };

    for component in &components {
        match enumerate_island(component, &reduced, limits) {
            Ok(island) if island.total() == 0 => {
                log::debug!(
                    "island of {} cells has no consistent assignment",
                    component.variable_ids.len()
                );
                report.contradictions.push(Contradiction::IslandUnsatisfiable {
                    variables: component.variable_ids.len(),
                });
                report.undetermined.extend(&component.variable_ids);
            }
            Ok(island) => report.solved.push(island),
            Err(err) => {
                log::warn!("{err}, leaving its cells undetermined");
                report.undetermined.extend(&component.variable_ids);
            }
        }
    }

    report
}

/// Clue equations over unresolved cells only, renumbered by position.
fn reduce_equations(
    problem: &ConstraintProblem,
    values: &[Option<bool>],
) -> Vec<ConstraintEquation> {
    let mut reduced = Vec::new();

    for equation in &problem.equations {
        if !matches!(equation.kind, EquationKind::LocalClue { .. }) {
            continue;
        }

        let mut variable_ids = VarList::new();
        let mut mines = 0;
        for &var in &equation.variable_ids {
            match values[var] {
                None => variable_ids.push(var),
                Some(true) => mines += 1,
                Some(false) => {}
            }
        }

        if variable_ids.is_empty() || mines > equation.target_mines {
            continue;
        }

        reduced.push(ConstraintEquation {
            id: reduced.len(),
            kind: equation.kind.clone(),
            variable_ids,
            target_mines: equation.target_mines - mines,
        });
    }

    reduced
}

/// Depth-first search over one island's cells, pruning on every clue as soon as it can no longer be met.
pub fn enumerate_island(
    component: &ConstraintComponent,
    equations: &[ConstraintEquation],
    limits: SolverLimits,
) -> core::result::Result<IslandSolutions, BoundExceeded> {
    let variables = component.variable_ids.len();
    if variables > limits.max_island_variables {
        return Err(BoundExceeded {
            variables,
            nodes: 0,
        });
    }

    // visit cells clue by clue so constraints close early
    let mut order: Vec<usize> = Vec::with_capacity(variables);
    let mut local: HashMap<usize, usize> = HashMap::with_capacity(variables);
    for &eq_id in &component.equation_ids {
        for &var in &equations[eq_id].variable_ids {
            if !local.contains_key(&var) {
                local.insert(var, order.len());
                order.push(var);
            }
        }
    }

    let clues: Vec<Clue> = component
        .equation_ids
        .iter()
        .map(|&eq_id| {
            let equation = &equations[eq_id];
            Clue {
                target: equation.target_mines as i32,
                mines: 0,
                open: equation.variable_ids.len() as i32,
            }
        })
        .collect();

    let mut var_clues: Vec<SmallVec<[usize; 8]>> = vec![SmallVec::new(); order.len()];
    for (clue_index, &eq_id) in component.equation_ids.iter().enumerate() {
        for var in &equations[eq_id].variable_ids {
            if let Some(&index) = local.get(var) {
                var_clues[index].push(clue_index);
            }
        }
    }

    let mut search = Search {
        clues,
        var_clues,
        assignment: vec![false; order.len()],
        nodes: 0,
        max_nodes: limits.max_nodes,
        by_mines: vec![0; order.len() + 1],
        mine_counts: vec![vec![0; order.len() + 1]; order.len()],
    };

    if !search.descend(0, 0) {
        return Err(BoundExceeded {
            variables,
            nodes: search.nodes,
        });
    }

    Ok(IslandSolutions {
        variable_ids: order,
        by_mines: search.by_mines,
        mine_counts: search.mine_counts,
    })
}

#[derive(Copy, Clone, Debug)]
struct Clue {
    target: i32,
    mines: i32,
    open: i32,
}

impl Clue {
    fn feasible(&self) -> bool {
        self.mines <= self.target && self.mines + self.open >= self.target
    }
}

struct Search {
    clues: Vec<Clue>,
    var_clues: Vec<SmallVec<[usize; 8]>>,
    assignment: Vec<bool>,
    nodes: u64,
    max_nodes: u64,
    by_mines: Vec<u64>,
    mine_counts: Vec<Vec<u64>>,
}

impl Search {
    /// Returns `false` once the node budget runs out.
    fn descend(&mut self, index: usize, mines: usize) -> bool {
        if index == self.assignment.len() {
            self.by_mines[mines] += 1;
            for (var, &is_mine) in self.assignment.iter().enumerate() {
                if is_mine {
                    self.mine_counts[var][mines] += 1;
                }
            }
            return true;
        }

        for is_mine in [false, true] {
            self.nodes += 1;
            if self.nodes > self.max_nodes {
                return false;
            }

            if self.assign(index, is_mine) {
                self.assignment[index] = is_mine;
                if !self.descend(index + 1, mines + usize::from(is_mine)) {
                    return false;
                }
            }
            self.unassign(index, is_mine);
        }

        true
    }

    fn assign(&mut self, index: usize, is_mine: bool) -> bool {
        let mut feasible = true;
        for &clue in &self.var_clues[index] {
            let clue = &mut self.clues[clue];
            clue.open -= 1;
            clue.mines += i32::from(is_mine);
            feasible &= clue.feasible();
        }
        feasible
    }

    fn unassign(&mut self, index: usize, is_mine: bool) {
        for &clue in &self.var_clues[index] {
            let clue = &mut self.clues[clue];
            clue.open += 1;
            clue.mines -= i32::from(is_mine);
        }
    }
}
