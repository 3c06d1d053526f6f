use core::ops::{BitOr, Index};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

pub use board::*;
pub use cell::*;
pub use error::*;
pub use generator::*;
pub use metrics::*;
pub use replay::*;
pub use session::*;
pub use solver::*;
pub use types::*;
pub use validity::*;

mod board;
mod cell;
mod error;
mod generator;
mod metrics;
mod replay;
mod session;
mod solver;
mod types;
mod validity;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// `(rows, cols)`
    pub size: Coord2,
    pub mines: CellCount,
}

impl GameConfig {
    pub const BEGINNER: Self = Self::new_unchecked((8, 8), 10);
    pub const INTERMEDIATE: Self = Self::new_unchecked((16, 16), 40);
    pub const EXPERT: Self = Self::new_unchecked((16, 30), 99);

    pub const fn new_unchecked(size: Coord2, mines: CellCount) -> Self {
        Self { size, mines }
    }

    pub fn new((rows, cols): Coord2, mines: CellCount) -> Self {
        let rows = rows.clamp(1, Coord::MAX);
        let cols = cols.clamp(1, Coord::MAX);
        let mines = mines.clamp(1, mult(rows, cols));
        Self::new_unchecked((rows, cols), mines)
    }

    pub const fn total_cells(&self) -> CellCount {
        mult(self.size.0, self.size.1)
    }
}

/// Ground truth of a board: where the mines are.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MineLayout {
    mine_mask: Array2<bool>,
    mine_count: CellCount,
}

impl MineLayout {
    pub fn from_mine_mask(mine_mask: Array2<bool>) -> Result<Self> {
        let (rows, cols) = mine_mask.dim();
        if rows == 0 || cols == 0 || rows > Coord::MAX as usize || cols > Coord::MAX as usize {
            return Err(GameError::InvalidBoardShape);
        }
        let mine_count = mine_mask.iter().filter(|&&is_mine| is_mine).count() as CellCount;
        Ok(Self {
            mine_mask,
            mine_count,
        })
    }

    pub fn from_mine_coords(size: Coord2, mine_coords: &[Coord2]) -> Result<Self> {
        let mut mine_mask: Array2<bool> = Array2::default(size.to_nd_index());

        for &coords in mine_coords {
            if coords.0 >= size.0 || coords.1 >= size.1 {
                return Err(GameError::InvalidCoords);
            }
            mine_mask[coords.to_nd_index()] = true;
        }

        Self::from_mine_mask(mine_mask)
    }

    /// Reads a raw grid where negative values mark mines and anything else is safe.
    pub fn from_raw(raw: &Array2<i8>) -> Result<Self> {
        Self::from_mine_mask(raw.mapv(|value| value < 0))
    }

    pub fn game_config(&self) -> GameConfig {
        GameConfig {
            size: self.size(),
            mines: self.mine_count,
        }
    }

    pub fn contains(&self, coords: Coord2) -> bool {
        let size = self.size();
        coords.0 < size.0 && coords.1 < size.1
    }

    pub fn size(&self) -> Coord2 {
        grid_size(&self.mine_mask)
    }

    pub fn safe_cell_count(&self) -> CellCount {
        self.total_cells() - self.mine_count
    }

    pub fn total_cells(&self) -> CellCount {
        self.mine_mask.len() as CellCount
    }

    pub fn mine_count(&self) -> CellCount {
        self.mine_count
    }

    pub fn contains_mine(&self, coords: Coord2) -> bool {
        self[coords]
    }

    pub fn adjacent_mine_count(&self, coords: Coord2) -> u8 {
        self.mine_mask
            .iter_neighbors(coords)
            .filter(|&pos| self[pos])
            .count() as u8
    }

    /// Number of every cell, with [`RAW_MINE`] on mines.
    pub fn numbers(&self) -> Array2<i8> {
        Array2::from_shape_fn(self.mine_mask.dim(), |(row, col)| {
            let coords = (row as Coord, col as Coord);
            match self[coords] {
                true => RAW_MINE,
                false => self.adjacent_mine_count(coords) as i8,
            }
        })
    }

    pub fn mine_coords(&self) -> impl Iterator<Item = Coord2> + '_ {
        iter_coords(self.size()).filter(|&coords| self[coords])
    }

    pub(crate) fn iter_neighbors(&self, coords: Coord2) -> NeighborIter {
        self.mine_mask.iter_neighbors(coords)
    }
}

impl Index<Coord2> for MineLayout {
    type Output = bool;

    fn index(&self, (row, col): Coord2) -> &Self::Output {
        &self.mine_mask[(row as usize, col as usize)]
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum MarkOutcome {
    NoChange,
    Flagged,
    Unflagged,
}

/// Result of opening cells, ordered by how much it decides the game.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum RevealOutcome {
    NoChange,
    Revealed,
    Won,
    HitMine,
}

impl RevealOutcome {
    pub const fn has_update(self) -> bool {
        !matches!(self, Self::NoChange)
    }
}

/// Combines the outcomes of a chord: the most decisive one wins.
impl BitOr for RevealOutcome {
    type Output = RevealOutcome;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.max(rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_count_adjacent_mines() {
        let layout = MineLayout::from_mine_coords((2, 3), &[(0, 0), (1, 2)]).unwrap();
        let numbers = layout.numbers();

        assert_eq!(numbers[(0, 0)], RAW_MINE);
        assert_eq!(numbers[(0, 1)], 2);
        assert_eq!(numbers[(1, 0)], 1);
        assert_eq!(numbers[(0, 2)], 1);
        assert_eq!(layout.mine_count(), 2);
    }

    #[test]
    fn raw_grid_round_trips_mines() {
        let layout = MineLayout::from_mine_coords((3, 3), &[(1, 1)]).unwrap();
        let rebuilt = MineLayout::from_raw(&layout.numbers()).unwrap();
        assert_eq!(rebuilt, layout);
    }

    #[test]
    fn rejects_out_of_range_mine() {
        assert_eq!(
            MineLayout::from_mine_coords((2, 2), &[(2, 0)]),
            Err(GameError::InvalidCoords)
        );
    }

    #[test]
    fn reveal_outcome_prefers_mine_hit() {
        assert_eq!(
            RevealOutcome::Won | RevealOutcome::HitMine,
            RevealOutcome::HitMine
        );
        assert_eq!(
            RevealOutcome::NoChange | RevealOutcome::Revealed,
            RevealOutcome::Revealed
        );
    }
}
