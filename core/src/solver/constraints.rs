use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::Observation;
use crate::*;

/// How player flags enter the equations.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlagSemantics {
    /// Flags are ordinary covered cells.
    Soft,
    /// Flags are mines: they leave the problem and reduce every clue around them.
    #[default]
    Strict,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum MineCountUsage {
    #[default]
    UseIfKnown,
    Ignore,
}

/// Hard caps on island enumeration.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverLimits {
    /// Islands with more unresolved cells than this are not enumerated.
    pub max_island_variables: usize,
    /// Search nodes one island may visit before giving up.
    pub max_nodes: u64,
}

impl Default for SolverLimits {
    fn default() -> Self {
        Self {
            max_island_variables: 55,
            max_nodes: 2_000_000,
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisConfig {
    pub flag_semantics: FlagSemantics,
    pub mine_count_usage: MineCountUsage,
    pub limits: SolverLimits,
}

impl AnalysisConfig {
    pub(crate) fn strict_flags(&self) -> bool {
        self.flag_semantics == FlagSemantics::Strict
    }

    fn uses_mine_count(&self) -> bool {
        self.mine_count_usage == MineCountUsage::UseIfKnown
    }
}

pub type VarList = SmallVec<[usize; 8]>;

/// One covered cell of the observation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintVariable {
    pub id: usize,
    pub coords: Coord2,
    pub flagged: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EquationKind {
    LocalClue { clue: Coord2 },
    GlobalMineCount,
}

impl EquationKind {
    pub fn is_local(&self) -> bool {
        matches!(self, Self::LocalClue { .. })
    }
}

/// `sum(variable_ids) == target_mines`; `id` is the position in its equation list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintEquation {
    pub id: usize,
    pub kind: EquationKind,
    pub variable_ids: VarList,
    pub target_mines: CellCount,
}

/// Variables joined through shared clue equations, with those equations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintComponent {
    pub variable_ids: Vec<usize>,
    pub equation_ids: Vec<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintProblem {
    pub variables: Vec<ConstraintVariable>,
    pub equations: Vec<ConstraintEquation>,
}

impl ConstraintProblem {
    pub fn local_equations(&self) -> impl Iterator<Item = &ConstraintEquation> + '_ {
        self.equations.iter().filter(|equation| equation.kind.is_local())
    }

    pub fn global_equation(&self) -> Option<&ConstraintEquation> {
        self.equations
            .iter()
            .find(|equation| equation.kind == EquationKind::GlobalMineCount)
    }

    pub fn components(&self) -> Vec<ConstraintComponent> {
        build_components(self.variables.len(), &self.equations).0
    }
}

/// Observation facts that no assignment can satisfy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Contradiction {
    InvalidObservationShape,
    InvalidMineCount {
        mine_count: CellCount,
        max_cells: CellCount,
    },
    LocalClueImpossible {
        clue: Coord2,
        target_mines: i16,
        available_variables: usize,
    },
    GlobalMineCountImpossible {
        target_mines: i32,
        available_variables: usize,
    },
    /// Propagation forced an equation past what its cells can hold.
    Inconsistent { equation: usize },
    /// An island has no assignment satisfying all of its clues.
    IslandUnsatisfiable { variables: usize },
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConstraintBuildOutput {
    pub problem: ConstraintProblem,
    pub contradictions: Vec<Contradiction>,
}

/// Turns every revealed number (and the mine total, when used) into an equation over covered cells.
pub fn build_constraints(obs: &Observation, cfg: AnalysisConfig) -> ConstraintBuildOutput {
    if let Err(err) = obs.validate() {
        let contradiction = match (err, obs.mine_count) {
            (GameError::TooManyMines, Some(mine_count)) => Contradiction::InvalidMineCount {
                mine_count,
                max_cells: mult(obs.size.0, obs.size.1),
            },
            _ => Contradiction::InvalidObservationShape,
        };
        return ConstraintBuildOutput {
            problem: ConstraintProblem::default(),
            contradictions: vec![contradiction],
        };
    }

    let mut builder = Builder::new(obs, cfg.strict_flags());
    for clue in iter_coords(obs.size) {
        if let Some(number) = obs.revealed[clue.to_nd_index()] {
            builder.add_clue(clue, number);
        }
    }
    if cfg.uses_mine_count() {
        if let Some(total) = obs.mine_count {
            builder.add_mine_count(total);
        }
    }

    log::trace!(
        "{} variables, {} equations, {} contradictions",
        builder.problem.variables.len(),
        builder.problem.equations.len(),
        builder.contradictions.len()
    );
    ConstraintBuildOutput {
        problem: builder.problem,
        contradictions: builder.contradictions,
    }
}

struct Builder<'a> {
    obs: &'a Observation,
    strict_flags: bool,
    variable_at: Array2<Option<usize>>,
    problem: ConstraintProblem,
    contradictions: Vec<Contradiction>,
}

impl<'a> Builder<'a> {
    fn new(obs: &'a Observation, strict_flags: bool) -> Self {
        let mut variable_at = Array2::from_elem(obs.size.to_nd_index(), None);
        let variables = iter_coords(obs.size)
            .filter(|&coords| obs.is_covered(coords))
            .enumerate()
            .map(|(id, coords)| {
                variable_at[coords.to_nd_index()] = Some(id);
                ConstraintVariable {
                    id,
                    coords,
                    flagged: obs.flags[coords.to_nd_index()],
                }
            })
            .collect();

        Self {
            obs,
            strict_flags,
            variable_at,
            problem: ConstraintProblem {
                variables,
                equations: Vec::new(),
            },
            contradictions: Vec::new(),
        }
    }

    /// Splits `ids` into the open variables and the count of flags taken as mines.
    fn open_and_flagged(&self, ids: impl Iterator<Item = usize>) -> (VarList, usize) {
        let mut open = VarList::new();
        let mut flagged = 0;
        for id in ids {
            if self.strict_flags && self.problem.variables[id].flagged {
                flagged += 1;
            } else {
                open.push(id);
            }
        }
        (open, flagged)
    }

    fn add_clue(&mut self, clue: Coord2, number: u8) {
        let neighbors = self
            .obs
            .revealed
            .iter_neighbors(clue)
            .filter_map(|pos| self.variable_at[pos.to_nd_index()]);
        let (open, flagged) = self.open_and_flagged(neighbors);
        let target = i16::from(number) - flagged as i16;

        if open.is_empty() && target == 0 {
            return;
        }
        if !(0..=open.len() as i16).contains(&target) {
            self.contradictions.push(Contradiction::LocalClueImpossible {
                clue,
                target_mines: target,
                available_variables: open.len(),
            });
            return;
        }
        self.push(EquationKind::LocalClue { clue }, open, target as CellCount);
    }

    fn add_mine_count(&mut self, total: CellCount) {
        let (open, flagged) = self.open_and_flagged(0..self.problem.variables.len());
        let target = i32::from(total) - flagged as i32;

        if !(0..=open.len() as i32).contains(&target) {
            self.contradictions
                .push(Contradiction::GlobalMineCountImpossible {
                    target_mines: target,
                    available_variables: open.len(),
                });
            return;
        }
        self.push(EquationKind::GlobalMineCount, open, target as CellCount);
    }

    fn push(&mut self, kind: EquationKind, variable_ids: VarList, target_mines: CellCount) {
        let id = self.problem.equations.len();
        self.problem.equations.push(ConstraintEquation {
            id,
            kind,
            variable_ids,
            target_mines,
        });
    }
}

/// Islands of variables linked through clue equations, plus the ids no clue mentions.
///
/// Equation ids in the result index `equations`. The global mine-count equation never links cells.
pub(crate) fn build_components(
    variable_count: usize,
    equations: &[ConstraintEquation],
) -> (Vec<ConstraintComponent>, Vec<usize>) {
    let mut clues_of: Vec<SmallVec<[usize; 8]>> = vec![SmallVec::new(); variable_count];
    for (index, equation) in equations.iter().enumerate() {
        if equation.kind.is_local() {
            for &var in &equation.variable_ids {
                clues_of[var].push(index);
            }
        }
    }

    let mut seen = vec![false; variable_count];
    let mut used_equation = vec![false; equations.len()];
    let mut components = Vec::new();
    let mut unconstrained = Vec::new();

    for start in 0..variable_count {
        if seen[start] {
            continue;
        }
        seen[start] = true;
        if clues_of[start].is_empty() {
            unconstrained.push(start);
            continue;
        }

        let mut component = ConstraintComponent::default();
        let mut stack = vec![start];
        while let Some(var) = stack.pop() {
            component.variable_ids.push(var);
            for &eq in &clues_of[var] {
                if std::mem::replace(&mut used_equation[eq], true) {
                    continue;
                }
                component.equation_ids.push(eq);
                for &other in &equations[eq].variable_ids {
                    if !std::mem::replace(&mut seen[other], true) {
                        stack.push(other);
                    }
                }
            }
        }

        component.variable_ids.sort_unstable();
        component.equation_ids.sort_unstable();
        components.push(component);
    }

    (components, unconstrained)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observe(raw: Array2<i8>, mine_count: Option<CellCount>) -> Observation {
        Observation::from_raw(&raw, mine_count).unwrap()
    }

    fn config(flags: FlagSemantics, mine_count: MineCountUsage) -> AnalysisConfig {
        AnalysisConfig {
            flag_semantics: flags,
            mine_count_usage: mine_count,
            ..AnalysisConfig::default()
        }
    }

    #[test]
    fn corner_clue_covers_its_three_neighbours() {
        let layout = MineLayout::from_mine_coords((3, 3), &[(0, 0)]).unwrap();
        let mut board = Board::new(layout);
        board.reveal((1, 1)).unwrap();

        let out = build_constraints(&Observation::from_board(&board), AnalysisConfig::default());
        let clue = out
            .problem
            .local_equations()
            .find(|eq| eq.kind == EquationKind::LocalClue { clue: (1, 1) })
            .unwrap();
        assert_eq!(clue.target_mines, 1);
        assert_eq!(clue.variable_ids.len(), 8);

        let global = out.problem.global_equation().unwrap();
        assert_eq!(global.target_mines, 1);
        assert_eq!(global.variable_ids.len(), 8);
    }

    #[test]
    fn flagged_neighbour_lowers_the_target_only_when_strict() {
        let raw = ndarray::array![[RAW_FLAGGED, 1, RAW_COVERED]];
        let obs = observe(raw, None);

        let strict = build_constraints(&obs, config(FlagSemantics::Strict, MineCountUsage::Ignore));
        let soft = build_constraints(&obs, config(FlagSemantics::Soft, MineCountUsage::Ignore));

        assert_eq!(strict.problem.equations[0].target_mines, 0);
        assert_eq!(strict.problem.equations[0].variable_ids.as_slice(), &[1]);
        assert_eq!(soft.problem.equations[0].target_mines, 1);
        assert_eq!(soft.problem.equations[0].variable_ids.as_slice(), &[0, 1]);
    }

    #[test]
    fn zero_beside_a_flag_is_contradictory_under_strict_flags() {
        let raw = ndarray::array![[RAW_FLAGGED], [0]];
        let obs = observe(raw, None);

        let strict = build_constraints(&obs, config(FlagSemantics::Strict, MineCountUsage::Ignore));
        assert_eq!(
            strict.contradictions,
            vec![Contradiction::LocalClueImpossible {
                clue: (1, 0),
                target_mines: -1,
                available_variables: 0,
            }]
        );

        let soft = build_constraints(&obs, config(FlagSemantics::Soft, MineCountUsage::Ignore));
        assert!(soft.contradictions.is_empty());
    }

    #[test]
    fn mine_total_needs_to_be_known_and_used() {
        let raw = ndarray::array![[RAW_COVERED, 1]];

        let unknown = build_constraints(&observe(raw.clone(), None), AnalysisConfig::default());
        assert!(unknown.problem.global_equation().is_none());

        let ignored = build_constraints(
            &observe(raw.clone(), Some(1)),
            config(FlagSemantics::Strict, MineCountUsage::Ignore),
        );
        assert!(ignored.problem.global_equation().is_none());

        let used = build_constraints(&observe(raw, Some(1)), AnalysisConfig::default());
        assert_eq!(used.problem.equations.len(), 2);
    }

    #[test]
    fn too_many_flags_break_the_mine_total() {
        let raw = ndarray::array![[RAW_FLAGGED, RAW_FLAGGED, RAW_COVERED]];
        let out = build_constraints(&observe(raw, Some(1)), AnalysisConfig::default());
        assert_eq!(
            out.contradictions,
            vec![Contradiction::GlobalMineCountImpossible {
                target_mines: -1,
                available_variables: 1,
            }]
        );
    }

    #[test]
    fn oversized_mine_total_yields_an_empty_problem() {
        let obs = Observation {
            size: (1, 2),
            mine_count: Some(3),
            revealed: Array2::from_elem([1, 2], None),
            flags: Array2::from_elem([1, 2], false),
        };
        let out = build_constraints(&obs, AnalysisConfig::default());
        assert!(out.problem.variables.is_empty());
        assert!(matches!(
            out.contradictions[..],
            [Contradiction::InvalidMineCount { mine_count: 3, max_cells: 2 }]
        ));
    }

    #[test]
    fn islands_are_split_by_revealed_gaps() {
        // the zero only sees the bottom covered cell
        let raw = ndarray::array![[RAW_COVERED], [1], [RAW_COVERED], [RAW_COVERED], [0]];
        let out = build_constraints(
            &observe(raw, Some(1)),
            config(FlagSemantics::Soft, MineCountUsage::UseIfKnown),
        );

        let components = out.problem.components();
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].variable_ids, vec![0, 1]);
        assert_eq!(components[1].variable_ids, vec![2]);
        assert!(components.iter().all(|c| c.equation_ids.len() == 1));
    }

    #[test]
    fn cells_without_clues_are_unconstrained() {
        let raw = ndarray::array![[RAW_COVERED, 1, RAW_COVERED, RAW_COVERED, RAW_COVERED]];
        let out = build_constraints(&observe(raw, Some(1)), AnalysisConfig::default());
        let (components, unconstrained) =
            build_components(out.problem.variables.len(), &out.problem.equations);
        assert_eq!(components.len(), 1);
        assert_eq!(unconstrained, vec![2, 3]);
    }
}
