use super::*;

/// Whether the layout can be cleared from `open` without ever guessing.
///
/// Each round deduces what it can with propagation, falls back to island enumeration when
/// propagation is stuck, then reveals every safe cell and flags every mine it found. The board is
/// solvable when this reaches a win, and not when a round finds nothing new.
///
/// The total mine count only enters through propagation. Island enumeration works on the local
/// clues, so a position that needs the count to split mines between islands counts as a guess.
pub fn is_solvable(layout: &MineLayout, open: Coord2, limits: SolverLimits) -> bool {
    if !layout.contains(open) || layout.contains_mine(open) {
        return false;
    }

    let mut board = Board::new(layout.clone());
    if board.reveal(open).is_err() {
        return false;
    }

    let cfg = AnalysisConfig {
        flag_semantics: FlagSemantics::Strict,
        mine_count_usage: MineCountUsage::UseIfKnown,
        limits,
    };

    loop {
        match board.state() {
            BoardState::Won => return true,
            BoardState::Lost => return false,
            BoardState::Ready | BoardState::Playing => {}
        }

        let obs = Observation::from_board(&board);
        let problem = build_constraints(&obs, cfg).problem;
        let basic = propagate(&problem, cfg);

        let (safe, mines) = if basic.not_mine.is_empty() && basic.is_mine.is_empty() {
            enumerate_islands(&problem, &basic.values, limits).forced()
        } else {
            (basic.not_mine, basic.is_mine)
        };

        if safe.is_empty() && mines.is_empty() {
            return false;
        }

        let mut progressed = false;
        for var in mines {
            let coords = problem.variables[var].coords;
            progressed |= matches!(board.flag(coords), Ok(MarkOutcome::Flagged));
        }
        for var in safe {
            let coords = problem.variables[var].coords;
            if let Ok(outcome) = board.reveal(coords) {
                progressed |= outcome.has_update();
            }
        }

        if !progressed {
            return false;
        }
    }
}
