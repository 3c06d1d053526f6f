use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::*;

/// What a player can see: revealed numbers, flags and possibly the mine count.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub size: Coord2,
    pub mine_count: Option<CellCount>,
    pub revealed: Array2<Option<u8>>,
    pub flags: Array2<bool>,
}

impl Observation {
    pub fn new(
        size: Coord2,
        mine_count: Option<CellCount>,
        revealed: Array2<Option<u8>>,
        flags: Array2<bool>,
    ) -> Result<Self> {
        let obs = Self {
            size,
            mine_count,
            revealed,
            flags,
        };
        obs.validate()?;
        Ok(obs)
    }

    pub fn from_board(board: &Board) -> Self {
        Self::from_board_with_mine_count(board, Some(board.total_mines()))
    }

    pub fn from_board_with_mine_count(board: &Board, mine_count: Option<CellCount>) -> Self {
        let size = board.size();
        let mut revealed = Array2::from_elem(size.to_nd_index(), None);
        let mut flags = Array2::from_elem(size.to_nd_index(), false);

        for coords in iter_coords(size) {
            match board.cell_at(coords) {
                CellState::Covered | CellState::Mine => {}
                CellState::Revealed(count) => revealed[coords.to_nd_index()] = Some(count),
                CellState::Flagged => flags[coords.to_nd_index()] = true,
            }
        }

        Self {
            size,
            mine_count,
            revealed,
            flags,
        }
    }

    /// Reads a raw player view: `0..=8` revealed, [`RAW_FLAGGED`] flagged, anything else covered.
    pub fn from_raw(raw: &Array2<i8>, mine_count: Option<CellCount>) -> Result<Self> {
        let size = grid_size(raw);
        let revealed = raw.mapv(|value| (0..=8).contains(&value).then_some(value as u8));
        let flags = raw.mapv(|value| value == RAW_FLAGGED);
        Self::new(size, mine_count, revealed, flags)
    }

    pub fn is_covered(&self, coords: Coord2) -> bool {
        self.revealed[coords.to_nd_index()].is_none()
    }

    pub fn validate(&self) -> Result<()> {
        let expected = (self.size.0 as usize, self.size.1 as usize);
        if self.revealed.dim() != expected || self.flags.dim() != expected {
            return Err(GameError::InvalidBoardShape);
        }

        if let Some(mine_count) = self.mine_count {
            if mine_count > mult(self.size.0, self.size.1) {
                return Err(GameError::TooManyMines);
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn player_view_hides_unrevealed_mines() {
        let layout = MineLayout::from_mine_coords((1, 4), &[(0, 0), (0, 3)]).unwrap();
        let mut board = Board::new(layout);
        board.reveal((0, 1)).unwrap();
        board.toggle_flag((0, 3)).unwrap();

        let obs = Observation::from_board_with_mine_count(&board, None);
        assert_eq!(obs.mine_count, None);
        assert_eq!(obs.revealed.row(0).to_vec(), vec![None, Some(1), None, None]);
        assert_eq!(obs.flags.row(0).to_vec(), vec![false, false, false, true]);
        assert!(obs.is_covered((0, 0)));
    }

    #[test]
    fn raw_view_treats_mines_as_covered() {
        let raw = ndarray::array![[RAW_MINE, 2, RAW_FLAGGED]];
        let obs = Observation::from_raw(&raw, Some(2)).unwrap();

        assert!(obs.is_covered((0, 0)));
        assert!(!obs.flags[(0, 0)]);
        assert_eq!(obs.revealed[(0, 1)], Some(2));
        assert!(obs.flags[(0, 2)]);
    }

    #[test]
    fn inconsistent_views_are_rejected() {
        let raw = ndarray::array![[RAW_COVERED, RAW_COVERED]];
        assert_eq!(
            Observation::from_raw(&raw, Some(3)),
            Err(GameError::TooManyMines)
        );

        let obs = Observation {
            size: (2, 2),
            mine_count: None,
            revealed: Array2::from_elem([2, 2], None),
            flags: Array2::from_elem([2, 1], false),
        };
        assert_eq!(obs.validate(), Err(GameError::InvalidBoardShape));
    }
}
