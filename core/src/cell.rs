use serde::{Deserialize, Serialize};

/// Player-visible state of a single board cell.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CellState {
    Covered,
    Flagged,
    Revealed(u8),
    /// A mine uncovered by the click that lost the game.
    Mine,
}

impl CellState {
    pub const fn is_unrevealed(self) -> bool {
        matches!(self, Self::Covered | Self::Flagged)
    }

    pub const fn is_covered(self) -> bool {
        matches!(self, Self::Covered)
    }

    pub const fn is_flagged(self) -> bool {
        matches!(self, Self::Flagged)
    }

    pub const fn number(self) -> Option<u8> {
        match self {
            Self::Revealed(count) => Some(count),
            _ => None,
        }
    }

    /// Numeric code used by raw grids: `0..=8` revealed, [`RAW_COVERED`], [`RAW_FLAGGED`], [`RAW_MINE`].
    pub const fn to_raw(self) -> i8 {
        match self {
            Self::Covered => RAW_COVERED,
            Self::Flagged => RAW_FLAGGED,
            Self::Revealed(count) => count as i8,
            Self::Mine => RAW_MINE,
        }
    }
}

impl Default for CellState {
    fn default() -> Self {
        Self::Covered
    }
}

/// Raw-grid value of a mine.
pub const RAW_MINE: i8 = -1;
/// Raw-grid value of a covered cell.
pub const RAW_COVERED: i8 = 10;
/// Raw-grid value of a flagged cell.
pub const RAW_FLAGGED: i8 = 11;
