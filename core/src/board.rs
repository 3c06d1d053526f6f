use core::num::Saturating;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, VecDeque};

use crate::*;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoardState {
    #[default]
    Ready,
    Playing,
    Won,
    Lost,
}

impl BoardState {
    pub const fn is_finished(self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

pub type OperationResult<T> = core::result::Result<T, InvalidOperation>;

/// A board being played: the hidden layout plus what the player currently sees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Board {
    mine_layout: MineLayout,
    numbers: Array2<i8>,
    cells: Array2<CellState>,
    revealed_count: Saturating<CellCount>,
    flagged_count: Saturating<CellCount>,
    state: BoardState,
    triggered_mine: Option<Coord2>,
}

impl Board {
    pub fn new(mine_layout: MineLayout) -> Self {
        let size = mine_layout.size();
        let numbers = mine_layout.numbers();
        Self {
            mine_layout,
            numbers,
            cells: Array2::default(size.to_nd_index()),
            revealed_count: Saturating(0),
            flagged_count: Saturating(0),
            state: Default::default(),
            triggered_mine: None,
        }
    }

    /// Builds a fresh board from a raw grid where `-1` marks a mine.
    pub fn from_raw(raw: &Array2<i8>) -> Result<Self> {
        Ok(Self::new(MineLayout::from_raw(raw)?))
    }

    pub fn state(&self) -> BoardState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_finished()
    }

    pub fn size(&self) -> Coord2 {
        self.mine_layout.size()
    }

    pub fn layout(&self) -> &MineLayout {
        &self.mine_layout
    }

    pub fn total_mines(&self) -> CellCount {
        self.mine_layout.mine_count()
    }

    pub fn mines_left(&self) -> isize {
        (self.mine_layout.mine_count() as isize) - (self.flagged_count.0 as isize)
    }

    pub fn revealed_count(&self) -> CellCount {
        self.revealed_count.0
    }

    pub fn flagged_count(&self) -> CellCount {
        self.flagged_count.0
    }

    pub fn contains(&self, coords: Coord2) -> bool {
        self.mine_layout.contains(coords)
    }

    pub fn cell_at(&self, coords: Coord2) -> CellState {
        self.cells[coords.to_nd_index()]
    }

    pub fn cells(&self) -> &Array2<CellState> {
        &self.cells
    }

    /// Ground-truth number of a cell, [`RAW_MINE`] for mines.
    pub fn number_at(&self, coords: Coord2) -> i8 {
        self.numbers[coords.to_nd_index()]
    }

    pub fn numbers(&self) -> &Array2<i8> {
        &self.numbers
    }

    pub fn has_mine_at(&self, coords: Coord2) -> bool {
        self.mine_layout.contains_mine(coords)
    }

    pub fn triggered_mine(&self) -> Option<Coord2> {
        self.triggered_mine
    }

    /// Player view as a raw grid.
    pub fn to_raw(&self) -> Array2<i8> {
        self.cells.mapv(CellState::to_raw)
    }

    pub fn iter_neighbors(&self, coords: Coord2) -> NeighborIter {
        self.mine_layout.iter_neighbors(coords)
    }

    pub fn count_flagged_neighbors(&self, coords: Coord2) -> u8 {
        self.iter_neighbors(coords)
            .filter(|&pos| self.cell_at(pos).is_flagged())
            .count() as u8
    }

    pub fn covered_neighbors(&self, coords: Coord2) -> impl Iterator<Item = Coord2> + '_ {
        self.iter_neighbors(coords)
            .filter(|&pos| self.cell_at(pos).is_covered())
    }

    /// Whether a chord at `coords` would reveal anything.
    pub fn can_chord_at(&self, coords: Coord2) -> bool {
        if self.state.is_finished() || !self.contains(coords) {
            return false;
        }

        match self.cell_at(coords) {
            CellState::Revealed(count) if count > 0 => {
                count == self.count_flagged_neighbors(coords)
                    && self.covered_neighbors(coords).next().is_some()
            }
            _ => false,
        }
    }

    pub fn flag(&mut self, coords: Coord2) -> OperationResult<MarkOutcome> {
        let coords = self.check_operable(coords)?;

        match self.cell_at(coords) {
            CellState::Covered => {
                self.cells[coords.to_nd_index()] = CellState::Flagged;
                self.flagged_count += 1;
                Ok(MarkOutcome::Flagged)
            }
            CellState::Flagged => Ok(MarkOutcome::NoChange),
            _ => Err(InvalidOperation::AlreadyRevealed(coords)),
        }
    }

    pub fn unflag(&mut self, coords: Coord2) -> OperationResult<MarkOutcome> {
        let coords = self.check_operable(coords)?;

        match self.cell_at(coords) {
            CellState::Flagged => {
                self.cells[coords.to_nd_index()] = CellState::Covered;
                self.flagged_count -= 1;
                Ok(MarkOutcome::Unflagged)
            }
            CellState::Covered => Ok(MarkOutcome::NoChange),
            _ => Err(InvalidOperation::AlreadyRevealed(coords)),
        }
    }

    pub fn toggle_flag(&mut self, coords: Coord2) -> OperationResult<MarkOutcome> {
        let coords = self.check_operable(coords)?;

        if self.cell_at(coords).is_flagged() {
            self.unflag(coords)
        } else {
            self.flag(coords)
        }
    }

    pub fn reveal(&mut self, coords: Coord2) -> OperationResult<RevealOutcome> {
        let coords = self.check_operable(coords)?;

        match self.cell_at(coords) {
            CellState::Covered => Ok(self.reveal_single_cell(coords)),
            CellState::Flagged => Ok(RevealOutcome::NoChange),
            _ => Err(InvalidOperation::AlreadyRevealed(coords)),
        }
    }

    /// Reveals every covered neighbour of a satisfied number.
    pub fn chord(&mut self, coords: Coord2) -> OperationResult<RevealOutcome> {
        let coords = self.check_operable(coords)?;

        if !self.can_chord_at(coords) {
            return Err(InvalidOperation::NotChordable(coords));
        }

        let targets: Vec<_> = self.covered_neighbors(coords).collect();
        Ok(targets
            .into_iter()
            .map(|pos| self.reveal_single_cell(pos))
            .fold(RevealOutcome::NoChange, core::ops::BitOr::bitor))
    }

    fn reveal_single_cell(&mut self, coords: Coord2) -> RevealOutcome {
        if !self.cell_at(coords).is_covered() {
            return RevealOutcome::NoChange;
        }

        if self.mine_layout[coords] {
            self.cells[coords.to_nd_index()] = CellState::Mine;
            if self.triggered_mine.is_none() {
                self.triggered_mine = Some(coords);
            }
            self.end_game(false);
            return RevealOutcome::HitMine;
        }

        self.open_cell(coords);
        if self.number_at(coords) == 0 {
            self.flood_from(coords);
        }

        if self.state == BoardState::Lost {
            RevealOutcome::HitMine
        } else if self.revealed_count == Saturating(self.mine_layout.safe_cell_count()) {
            self.end_game(true);
            RevealOutcome::Won
        } else {
            self.mark_started();
            RevealOutcome::Revealed
        }
    }

    fn open_cell(&mut self, coords: Coord2) {
        self.cells[coords.to_nd_index()] = CellState::Revealed(self.number_at(coords) as u8);
        self.revealed_count += 1;
    }

    fn flood_from(&mut self, start: Coord2) {
        let mut visited = BTreeSet::from([start]);
        let mut to_visit: VecDeque<_> = self.covered_neighbors(start).collect();

        while let Some(visit_coords) = to_visit.pop_front() {
            if !visited.insert(visit_coords) {
                continue;
            }

            if !self.cell_at(visit_coords).is_covered() {
                continue;
            }

            self.open_cell(visit_coords);

            if self.number_at(visit_coords) == 0 {
                let next: Vec<_> = self
                    .covered_neighbors(visit_coords)
                    .filter(|pos| !visited.contains(pos))
                    .collect();
                to_visit.extend(next);
            }
        }
    }

    fn mark_started(&mut self) {
        if matches!(self.state, BoardState::Ready) {
            self.state = BoardState::Playing;
        }
    }

    fn end_game(&mut self, won: bool) {
        if self.state.is_finished() {
            return;
        }

        self.state = if won {
            BoardState::Won
        } else {
            BoardState::Lost
        };
        if won {
            self.triggered_mine = None;
        }
    }

    fn check_operable(&self, coords: Coord2) -> OperationResult<Coord2> {
        if !self.contains(coords) {
            return Err(InvalidOperation::OutOfBounds(coords));
        }
        if self.state.is_finished() {
            return Err(InvalidOperation::GameFinished);
        }
        Ok(coords)
    }
}
